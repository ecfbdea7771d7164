use ntfs_ea::encode::encode_chain;
use ntfs_ea::raw;
use ntfs_ea::{decode_all, decode_by_name, encode, EaError, EaRecord};

/// xorshift, so the inputs are varied but the test is repeatable
struct Noise(u64);

impl Noise {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next() as u8).collect()
    }
}

#[test]
fn round_trip() {
    let mut noise = Noise(0x5eed_1234_abcd_0001);
    for _ in 0..200 {
        let name_len = 1 + (noise.next() % 255) as usize;
        let value_len = match noise.next() % 4 {
            0 => 0,
            1 => 65535,
            _ => (noise.next() % 2048) as usize,
        };

        // any byte but zero can appear in a name
        let name: Vec<u8> = noise.bytes(name_len).into_iter().map(|b| b | 1).collect();
        let value = noise.bytes(value_len);

        let data = encode(&name, &value).expect("valid lengths");
        assert_eq!(raw::record_size(name_len, value_len), data.len());
        assert_eq!(0, data[raw::header_size() + name_len]);

        let record = decode_by_name(&data, data.len(), &name)
            .expect("decodes")
            .expect("found");
        assert_eq!(name, record.name);
        assert_eq!(value, record.value);
        assert_eq!(0, record.flags);
        assert!(record.is_last());
    }
}

#[test]
fn name_length_boundary() {
    assert!(encode(&[b'x'; 255], b"").is_ok());

    let e = encode(&[b'x'; 256], b"").expect_err("too long");
    match e.downcast_ref::<EaError>() {
        Some(EaError::NameTooLong { len }) => assert_eq!(256, *len),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn empty_buffer() {
    assert_eq!(Vec::<EaRecord>::new(), decode_all(&[], 0).expect("empty"));
    assert_eq!(None, decode_by_name(&[], 0, b"anything").expect("empty"));
}

fn record(name: &[u8], value: &[u8]) -> EaRecord {
    EaRecord {
        next_entry_offset: 0,
        flags: 0,
        name: name.to_vec(),
        value: value.to_vec(),
    }
}

#[test]
fn three_chained() {
    let data = encode_chain(&[
        record(b"ALPHA", b"a"),
        record(b"BETA", b"bb"),
        record(b"GAMMA", b"ccc"),
    ])
    .expect("valid");

    let all = decode_all(&data, data.len()).expect("valid");
    let names: Vec<&[u8]> = all.iter().map(|r| r.name.as_slice()).collect();
    assert_eq!(vec![&b"ALPHA"[..], &b"BETA"[..], &b"GAMMA"[..]], names);

    // with the third record's header destroyed, only a full walk notices
    let third = all[0].next_entry_offset as usize + all[1].next_entry_offset as usize;
    let mut broken = data.clone();
    for b in &mut broken[third..third + raw::header_size()] {
        *b = 0xff;
    }

    let beta = decode_by_name(&broken, broken.len(), b"BETA")
        .expect("third record untouched")
        .expect("found");
    assert_eq!(b"bb", beta.value.as_slice());
    assert!(decode_all(&broken, broken.len()).is_err());
}

#[test]
fn offset_past_used_length() {
    let data = encode_chain(&[record(b"ONE", b"1"), record(b"TWO", b"2")]).expect("valid");

    // cut the buffer off before the second record
    let first_len = raw::aligned_record_size(3, 1);
    let e = decode_all(&data, first_len).expect_err("points past the end");
    assert!(
        matches!(
            e.downcast_ref::<EaError>(),
            Some(EaError::MalformedRecord { .. })
        ),
        "{:?}",
        e
    );
}

#[test]
fn capacity_beyond_used_length() {
    let mut data = encode(b"ONLY", b"value").expect("valid");
    let used = data.len();
    data.resize(8192, 0xcc);

    let all = decode_all(&data, used).expect("valid");
    assert_eq!(1, all.len());
    assert_eq!(b"value", all[0].value.as_slice());
}
