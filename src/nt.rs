/*!
The real primitives: `NtQueryEaFile` and `NtSetEaFile` from `ntdll`.

Files are plain `std::fs::File`s, so handles are closed however the caller's
code exits. Querying needs read access; setting needs write access.
*/

use std::convert::TryFrom;
use std::fs;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::ptr;

use anyhow::Error;
use log::debug;
use ntapi::ntioapi::{NtQueryEaFile, NtSetEaFile, IO_STATUS_BLOCK};
use winapi::shared::ntdef::{BOOLEAN, FALSE, HANDLE, NTSTATUS, PVOID, TRUE, ULONG};

use crate::file_open_failed;
use crate::service::{QueryEa, QueryOutcome, SetEa};
use crate::status::NtStatus;

/// Both EA primitives, for files opened through `std`.
#[derive(Copy, Clone, Debug, Default)]
pub struct NtEa;

pub fn open_read<P: AsRef<Path>>(path: P) -> Result<fs::File, Error> {
    let path = path.as_ref();
    fs::File::open(path).map_err(|e| file_open_failed(path.display(), e))
}

pub fn open_read_write<P: AsRef<Path>>(path: P) -> Result<fs::File, Error> {
    let path = path.as_ref();
    fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| file_open_failed(path.display(), e))
}

fn raw_handle(file: &fs::File) -> HANDLE {
    file.as_raw_handle() as HANDLE
}

impl QueryEa<fs::File> for NtEa {
    fn query_ea(&self, handle: &fs::File, buffer: &mut [u8]) -> QueryOutcome {
        let length = match ULONG::try_from(buffer.len()) {
            Ok(length) => length,
            Err(_) => return QueryOutcome::Failed(NtStatus::INSUFFICIENT_RESOURCES),
        };

        // SAFETY: an all-zero IO_STATUS_BLOCK is valid; the kernel writes it.
        let mut isb: IO_STATUS_BLOCK = unsafe { std::mem::zeroed() };

        // SAFETY: the handle is open for the life of `handle`, and the kernel
        // writes at most `length` bytes into `buffer`.
        let status: NTSTATUS = unsafe {
            NtQueryEaFile(
                raw_handle(handle),
                &mut isb,
                buffer.as_mut_ptr() as PVOID,
                length,
                FALSE as BOOLEAN, // every entry, not just one
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                TRUE as BOOLEAN, // from the first entry
            )
        };

        let status = NtStatus::from(status);
        debug!(
            "NtQueryEaFile({} bytes): {}, {} bytes returned",
            length, status, isb.Information
        );

        if NtStatus::NO_EAS_ON_FILE == status {
            return QueryOutcome::NoAttributes;
        }

        if !status.is_success() {
            return QueryOutcome::Failed(status);
        }

        QueryOutcome::Filled(isb.Information)
    }
}

impl SetEa<fs::File> for NtEa {
    fn set_ea(&self, handle: &fs::File, record: &[u8]) -> Result<(), NtStatus> {
        let length = ULONG::try_from(record.len()).map_err(|_| NtStatus::INSUFFICIENT_RESOURCES)?;

        // SAFETY: as above.
        let mut isb: IO_STATUS_BLOCK = unsafe { std::mem::zeroed() };

        // SAFETY: the kernel only reads `length` bytes from `record`.
        let status: NTSTATUS = unsafe {
            NtSetEaFile(
                raw_handle(handle),
                &mut isb,
                record.as_ptr() as PVOID,
                length,
            )
        };

        let status = NtStatus::from(status);
        debug!("NtSetEaFile({} bytes): {}", length, status);

        if status.is_success() {
            Ok(())
        } else {
            Err(status)
        }
    }
}
