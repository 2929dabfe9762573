//! One-shot pipe client for the command channel.

use crate::{to_wide, ChannelError, ChannelResult};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, GENERIC_WRITE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, WriteFile, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_MODE, OPEN_EXISTING,
};

/// Open the named endpoint, write one UTF-8 command, close.
///
/// Fire-and-forget: no response is read and nothing is retried. When no
/// server is listening the command is simply lost; the caller decides how
/// loudly to say so.
pub fn send_command(name: &str, command: &str) -> ChannelResult<()> {
    let wide = to_wide(name);
    unsafe {
        let handle = CreateFileW(
            PCWSTR(wide.as_ptr()),
            GENERIC_WRITE.0,
            FILE_SHARE_MODE(0),
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(0),
            None,
        )
        .map_err(ChannelError::NotListening)?;

        let mut written = 0u32;
        let result = WriteFile(handle, Some(command.as_bytes()), Some(&mut written), None);
        let _ = CloseHandle(handle);
        result.map_err(ChannelError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_listener_reports_failure_without_retry() {
        let result = send_command(r"\\.\pipe\BlenderWebOverlayNoSuchPipe", "SCRIPT_LOAD:x");
        assert!(matches!(result, Err(ChannelError::NotListening(_))));
    }
}
