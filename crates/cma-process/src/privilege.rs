//! Privilege query.

/// Check whether the current process runs elevated.
///
/// On Windows this reads `TokenElevation` from the process token; on Unix it
/// checks for an effective uid of 0. Any failure to query counts as "not
/// elevated". Nothing is cached and no handle outlives the call.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
        use tracing::debug;
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::Security::{
            GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
        };
        use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

        unsafe {
            let mut token = HANDLE::default();
            if let Err(e) = OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) {
                debug!(error = %e, "OpenProcessToken failed, assuming not elevated");
                return false;
            }
            // Closed on every return below.
            let token = OwnedHandle::from_raw_handle(token.0);

            let mut elevation = TOKEN_ELEVATION::default();
            let mut size = 0u32;
            match GetTokenInformation(
                HANDLE(token.as_raw_handle()),
                TokenElevation,
                Some((&mut elevation as *mut TOKEN_ELEVATION).cast()),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut size,
            ) {
                Ok(()) => elevation.TokenIsElevated != 0,
                Err(e) => {
                    debug!(error = %e, "GetTokenInformation failed, assuming not elevated");
                    false
                }
            }
        }
    }
}
