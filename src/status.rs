use std::fmt;

/// An `NTSTATUS` as returned by the EA primitives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);
    pub const BUFFER_OVERFLOW: NtStatus = NtStatus(0x8000_0005);
    pub const INVALID_EA_NAME: NtStatus = NtStatus(0x8000_0013);
    pub const EA_LIST_INCONSISTENT: NtStatus = NtStatus(0x8000_0014);
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008);
    pub const BUFFER_TOO_SMALL: NtStatus = NtStatus(0xC000_0023);
    pub const EAS_NOT_SUPPORTED: NtStatus = NtStatus(0xC000_004F);
    pub const NO_EAS_ON_FILE: NtStatus = NtStatus(0xC000_0052);
    pub const INSUFFICIENT_RESOURCES: NtStatus = NtStatus(0xC000_009A);

    /// Success and informational codes; the top bit is clear.
    pub fn is_success(self) -> bool {
        0 == self.0 >> 31
    }

    /// The query primitive's way of saying "make the buffer bigger".
    pub fn wants_bigger_buffer(self) -> bool {
        NtStatus::BUFFER_OVERFLOW == self || NtStatus::BUFFER_TOO_SMALL == self
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            NtStatus::SUCCESS => "STATUS_SUCCESS",
            NtStatus::BUFFER_OVERFLOW => "STATUS_BUFFER_OVERFLOW",
            NtStatus::INVALID_EA_NAME => "STATUS_INVALID_EA_NAME",
            NtStatus::EA_LIST_INCONSISTENT => "STATUS_EA_LIST_INCONSISTENT",
            NtStatus::INVALID_HANDLE => "STATUS_INVALID_HANDLE",
            NtStatus::BUFFER_TOO_SMALL => "STATUS_BUFFER_TOO_SMALL",
            NtStatus::EAS_NOT_SUPPORTED => "STATUS_EAS_NOT_SUPPORTED",
            NtStatus::NO_EAS_ON_FILE => "STATUS_NO_EAS_ON_FILE",
            NtStatus::INSUFFICIENT_RESOURCES => "STATUS_INSUFFICIENT_RESOURCES",
            _ => return None,
        })
    }
}

impl From<i32> for NtStatus {
    fn from(raw: i32) -> NtStatus {
        NtStatus(raw as u32)
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#010x} {}", self.0, name),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity() {
        assert!(NtStatus::SUCCESS.is_success());
        assert!(!NtStatus::BUFFER_OVERFLOW.is_success());
        assert!(NtStatus(0x4000_0000).is_success());
        assert!(!NtStatus::NO_EAS_ON_FILE.is_success());
        assert!(!NtStatus::BUFFER_TOO_SMALL.is_success());
    }

    #[test]
    fn from_ntstatus() {
        assert_eq!(NtStatus::NO_EAS_ON_FILE, NtStatus::from(0xC000_0052u32 as i32));
    }

    #[test]
    fn display() {
        assert_eq!("0xc0000052 STATUS_NO_EAS_ON_FILE", NtStatus::NO_EAS_ON_FILE.to_string());
        assert_eq!("0x12345678", NtStatus(0x1234_5678).to_string());
    }
}
