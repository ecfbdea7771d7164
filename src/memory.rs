/*!
EA primitives backed by memory instead of a filesystem.

[`MemoryVolume`] answers queries and applies sets the way NTFS does, closely
enough to drive an [`EaService`](crate::EaService) in tests or on machines
without NTFS: query results are chained and aligned, a value of zero length
removes the attribute, and a buffer that's too small is reported with the
same status codes.

NTFS stores names upper-cased and matches them without regard to case. A
volume from [`MemoryVolume::upper_case_names`] does the same; one from
[`MemoryVolume::new`] keeps names as written and matches them exactly.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::debug;

use crate::encode::encode_chain;
use crate::parse::{decode_all, EaRecord};
use crate::raw;
use crate::service::{QueryEa, QueryOutcome, SetEa};
use crate::status::NtStatus;

/// A handle to a file on a [`MemoryVolume`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoryFile(usize);

#[derive(Debug, Default)]
pub struct MemoryVolume {
    files: Mutex<HashMap<usize, Vec<EaRecord>>>,
    next_id: AtomicUsize,
    upper_case_names: bool,
}

impl MemoryVolume {
    pub fn new() -> MemoryVolume {
        MemoryVolume::default()
    }

    /// A volume that upper-cases names as they are set, like NTFS.
    pub fn upper_case_names() -> MemoryVolume {
        MemoryVolume {
            upper_case_names: true,
            ..MemoryVolume::default()
        }
    }

    /// A new file with no EAs.
    pub fn create_file(&self) -> MemoryFile {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Vec::new());
        MemoryFile(id)
    }

    /// The file's EAs, in query order. Unknown handles have none.
    pub fn attributes(&self, file: &MemoryFile) -> Vec<EaRecord> {
        self.lock().get(&file.0).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<HashMap<usize, Vec<EaRecord>>> {
        // nothing in here panics while holding the lock
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QueryEa<MemoryFile> for MemoryVolume {
    fn query_ea(&self, handle: &MemoryFile, buffer: &mut [u8]) -> QueryOutcome {
        let files = self.lock();
        let eas = match files.get(&handle.0) {
            Some(eas) => eas,
            None => return QueryOutcome::Failed(NtStatus::INVALID_HANDLE),
        };

        if eas.is_empty() {
            return QueryOutcome::NoAttributes;
        }

        let data = match encode_chain(eas) {
            Ok(data) => data,
            Err(e) => {
                debug!("stored EAs don't encode: {:?}", e);
                return QueryOutcome::Failed(NtStatus::EA_LIST_INCONSISTENT);
            }
        };

        if data.len() > buffer.len() {
            let first = &eas[0];
            let first_size = raw::record_size(first.name.len(), first.value.len());
            return QueryOutcome::Failed(if first_size > buffer.len() {
                NtStatus::BUFFER_TOO_SMALL
            } else {
                NtStatus::BUFFER_OVERFLOW
            });
        }

        buffer[..data.len()].copy_from_slice(&data);
        QueryOutcome::Filled(data.len())
    }
}

impl SetEa<MemoryFile> for MemoryVolume {
    fn set_ea(&self, handle: &MemoryFile, record: &[u8]) -> Result<(), NtStatus> {
        let incoming = decode_all(record, record.len()).map_err(|e| {
            debug!("rejecting EA set: {:?}", e);
            NtStatus::EA_LIST_INCONSISTENT
        })?;

        if incoming.is_empty() || incoming.iter().any(|ea| ea.name.is_empty()) {
            return Err(NtStatus::INVALID_EA_NAME);
        }

        let mut files = self.lock();
        let eas = files.get_mut(&handle.0).ok_or(NtStatus::INVALID_HANDLE)?;

        for mut ea in incoming {
            if self.upper_case_names {
                ea.name.make_ascii_uppercase();
            }
            let existing = eas.iter().position(|stored| stored.name == ea.name);
            match (existing, ea.value.is_empty()) {
                (Some(pos), true) => {
                    eas.remove(pos);
                }
                (None, true) => (),
                (Some(pos), false) => eas[pos] = stored(ea),
                (None, false) => eas.push(stored(ea)),
            }
        }

        Ok(())
    }
}

fn stored(ea: EaRecord) -> EaRecord {
    EaRecord {
        next_entry_offset: 0,
        ..ea
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;

    #[test]
    fn insert_replace_remove() {
        let volume = MemoryVolume::new();
        let file = volume.create_file();

        volume.set_ea(&file, &encode(b"A", b"1").unwrap()).unwrap();
        volume.set_ea(&file, &encode(b"B", b"2").unwrap()).unwrap();
        volume.set_ea(&file, &encode(b"A", b"3").unwrap()).unwrap();

        let eas = volume.attributes(&file);
        assert_eq!(2, eas.len());
        assert_eq!(b"A", eas[0].name.as_slice());
        assert_eq!(b"3", eas[0].value.as_slice());
        assert_eq!(b"B", eas[1].name.as_slice());

        volume.set_ea(&file, &encode(b"A", b"").unwrap()).unwrap();
        let eas = volume.attributes(&file);
        assert_eq!(1, eas.len());
        assert_eq!(b"B", eas[0].name.as_slice());
    }

    #[test]
    fn query() {
        let volume = MemoryVolume::new();
        let file = volume.create_file();

        let mut buf = [0u8; 64];
        assert_eq!(QueryOutcome::NoAttributes, volume.query_ea(&file, &mut buf));

        volume.set_ea(&file, &encode(b"NAME", b"value").unwrap()).unwrap();
        volume.set_ea(&file, &encode(b"X", b"").unwrap()).unwrap();
        volume.set_ea(&file, &encode(b"Y", b"1").unwrap()).unwrap();

        // 8 + 4 + 1 + 5 = 18 -> 20, then 8 + 1 + 1 + 1 = 11
        assert_eq!(QueryOutcome::Filled(31), volume.query_ea(&file, &mut buf));
        let eas = decode_all(&buf, 31).unwrap();
        assert_eq!(2, eas.len());
        assert_eq!(20, eas[0].next_entry_offset);

        let mut small = [0u8; 24];
        assert_eq!(
            QueryOutcome::Failed(NtStatus::BUFFER_OVERFLOW),
            volume.query_ea(&file, &mut small)
        );

        let mut tiny = [0u8; 4];
        assert_eq!(
            QueryOutcome::Failed(NtStatus::BUFFER_TOO_SMALL),
            volume.query_ea(&file, &mut tiny)
        );
    }

    #[test]
    fn upper_case_names() {
        let volume = MemoryVolume::upper_case_names();
        let file = volume.create_file();

        volume.set_ea(&file, &encode(b"secret", b"1").unwrap()).unwrap();
        volume.set_ea(&file, &encode(b"Secret", b"2").unwrap()).unwrap();

        let eas = volume.attributes(&file);
        assert_eq!(1, eas.len());
        assert_eq!(b"SECRET", eas[0].name.as_slice());
        assert_eq!(b"2", eas[0].value.as_slice());

        volume.set_ea(&file, &encode(b"sEcReT", b"").unwrap()).unwrap();
        assert!(volume.attributes(&file).is_empty());

        let plain = MemoryVolume::new();
        let file = plain.create_file();
        plain.set_ea(&file, &encode(b"secret", b"1").unwrap()).unwrap();
        assert_eq!(b"secret", plain.attributes(&file)[0].name.as_slice());
    }

    #[test]
    fn bad_input() {
        let volume = MemoryVolume::new();
        let file = volume.create_file();

        assert_eq!(
            Err(NtStatus::EA_LIST_INCONSISTENT),
            volume.set_ea(&file, &[1, 2, 3])
        );
        assert_eq!(Err(NtStatus::INVALID_EA_NAME), volume.set_ea(&file, &[]));

        let other = MemoryVolume::new();
        let mut buf = [0u8; 16];
        let stranger = MemoryFile(42);
        assert_eq!(
            QueryOutcome::Failed(NtStatus::INVALID_HANDLE),
            other.query_ea(&stranger, &mut buf)
        );
        assert_eq!(
            Err(NtStatus::INVALID_HANDLE),
            other.set_ea(&stranger, &encode(b"A", b"1").unwrap())
        );
    }
}
