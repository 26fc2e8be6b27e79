use super::AccountTypeFacility;

/// The host's native account-type facility.
///
/// On Windows this is `LsaLookupUserAccountType`. Other targets report OS
/// version 0, so the classifier never gets past the version gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFacility;

#[cfg(windows)]
mod sys {
    use windows_sys::{
        Wdk::System::SystemServices::RtlGetVersion, Win32::Foundation::NTSTATUS,
        Win32::System::SystemInformation::OSVERSIONINFOW,
    };

    #[link(name = "sspicli")]
    unsafe extern "system" {
        fn LsaLookupUserAccountType(sid: *const core::ffi::c_void, account_type: *mut i32)
        -> NTSTATUS;
    }

    pub fn os_major_version() -> u32 {
        // SAFETY: zero is a valid bit pattern for OSVERSIONINFOW and the size
        // field is set before the call, as RtlGetVersion requires.
        let mut info: OSVERSIONINFOW = unsafe { std::mem::zeroed() };
        info.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOW>() as u32;
        // SAFETY: `info` is a valid, writable OSVERSIONINFOW.
        let status = unsafe { RtlGetVersion(&mut info) };
        if status < 0 { 0 } else { info.dwMajorVersion }
    }

    pub fn lookup_account_type(sid: &[u8]) -> Result<u32, i32> {
        let mut account_type: i32 = 0;
        // SAFETY: `sid` holds a complete self-relative SID and outlives the
        // call; the facility only reads it.
        let status = unsafe { LsaLookupUserAccountType(sid.as_ptr().cast(), &mut account_type) };
        if status < 0 {
            Err(status)
        } else {
            u32::try_from(account_type).map_err(|_| status)
        }
    }
}

#[cfg(windows)]
impl AccountTypeFacility for NativeFacility {
    fn os_major_version(&self) -> u32 {
        sys::os_major_version()
    }

    fn lookup_account_type(&self, sid: &[u8]) -> Result<u32, i32> {
        sys::lookup_account_type(sid)
    }
}

#[cfg(not(windows))]
impl AccountTypeFacility for NativeFacility {
    fn os_major_version(&self) -> u32 {
        0
    }

    fn lookup_account_type(&self, _sid: &[u8]) -> Result<u32, i32> {
        // STATUS_NOT_SUPPORTED
        Err(0xC000_00BB_u32 as i32)
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_non_windows_reports_no_facility() {
        assert_eq!(NativeFacility.os_major_version(), 0);
        assert!(NativeFacility.lookup_account_type(&[1, 0, 0, 0, 0, 0, 0, 5]).is_err());
    }
}
