//! Overlay window for the Blender web UI.
//!
//! Owns the layered click-through window, the input-passthrough poll, the
//! position synchronizer, and the relay that marshals layout frames from
//! the pipe thread onto the event loop.

pub mod passthrough;
pub mod relay;
pub mod sync;
pub mod window;

pub use passthrough::{Passthrough, PassthroughTracker};
pub use relay::LayoutRelay;
pub use window::{
    post_renderer_message, OverlayWindow, TRANS_COLOR_RGB, WM_APP_COMMAND, WM_APP_LAYOUT,
    WM_APP_RECTS_CHANGED,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Sink for data pushed into the embedded renderer.
///
/// Implemented by the WebView2 host in the application crate; tests use
/// plain doubles.
pub trait RendererBridge {
    /// Forward one opaque payload as a web message.
    fn post_message(&self, text: &str);

    /// Track the overlay client area.
    fn resize(&self, width: i32, height: i32);
}

/// Outbound command channel toward the host process.
pub trait CommandSink {
    fn send_command(&self, command: &str);
}
