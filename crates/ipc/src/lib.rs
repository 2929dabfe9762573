//! Named-pipe channels between the overlay and its host process.
//!
//! Two well-known endpoints exist: the layout channel (host to overlay) is
//! served by [`PipeListener`]; the command channel (overlay to host) is
//! written through [`send_command`]. Both are deliberately best-effort; see
//! the error taxonomy on [`ChannelError`].

pub mod client;
pub mod server;

pub use client::send_command;
pub use server::{wake_listener, PipeListener};

use thiserror::Error;

/// Layout channel, host to overlay.
pub const LAYOUT_PIPE_NAME: &str = r"\\.\pipe\BlenderWebViewPipe";

/// Command channel, overlay to host.
pub const SCRIPT_PIPE_NAME: &str = r"\\.\pipe\BlenderScriptPipe";

/// In/out buffer size for one pipe message.
pub const MESSAGE_BUFFER_SIZE: u32 = 8192;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to create pipe endpoint: {0}")]
    Create(windows::core::Error),

    #[error("client connect failed: {0}")]
    Connect(windows::core::Error),

    #[error("pipe read failed: {0}")]
    Read(windows::core::Error),

    #[error("pipe write failed: {0}")]
    Write(windows::core::Error),

    #[error("no endpoint is listening: {0}")]
    NotListening(windows::core::Error),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// NUL-terminated UTF-16 for Win32 name parameters.
pub(crate) fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_names_are_nul_terminated() {
        let wide = to_wide(LAYOUT_PIPE_NAME);
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide.len(), LAYOUT_PIPE_NAME.chars().count() + 1);
    }
}
