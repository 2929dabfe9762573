//! Wire formats shared by the overlay and its host.
//!
//! Everything in this crate is a pure transform; no Windows types leak in.

pub mod controls;
pub mod layout;
pub mod rect;

pub use controls::{classify_message, parse_rects, RendererNotice, SCRIPT_COMMAND_PREFIX};
pub use layout::{encode_frame, parse_frame, LayoutFrame, LAYOUT_PREFIX, PAYLOAD_DELIMITER};
pub use rect::{hit_test, Rect};

use thiserror::Error;

/// Reasons a layout frame is rejected.
///
/// A rejected frame is dropped in its entirety; no field is ever applied
/// partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("buffer shorter than the frame prefix")]
    TooShort,

    #[error("frame prefix mismatch")]
    BadPrefix,

    #[error("missing payload delimiter")]
    MissingDelimiter,

    #[error("expected 4 geometry fields, found {0}")]
    BadFieldCount(usize),

    #[error("geometry field {0:?} is not an integer")]
    BadInteger(String),

    #[error("payload is not valid UTF-8")]
    BadPayload,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
