#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // errors are fine; reading out of bounds is not
    let _ = ntfs_ea::decode_all(data, data.len());

    if let Some((&split, rest)) = data.split_first() {
        let used = usize::from(split).min(rest.len());
        let _ = ntfs_ea::decode_by_name(rest, used, b"NAME");
    }
});
