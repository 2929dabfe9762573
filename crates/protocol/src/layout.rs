//! Layout frame codec.
//!
//! One frame per pipe message: `LAYOUT:<x>,<y>,<w>,<h>|<payload>`. The
//! geometry block holds exactly four decimal integers; everything after the
//! delimiter is carried verbatim as the payload and never re-split, so the
//! payload may itself contain `|` or `,`.

use crate::rect::Rect;
use crate::{ProtocolError, ProtocolResult};

pub const LAYOUT_PREFIX: &[u8] = b"LAYOUT:";
pub const PAYLOAD_DELIMITER: u8 = b'|';

/// One parsed message from the layout channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutFrame {
    /// Host client-area geometry the overlay should mirror.
    pub geometry: Rect,
    /// Opaque text forwarded to the renderer, untouched.
    pub payload: String,
}

/// Parse one pipe message into a frame.
///
/// An explicit scanner over the fixed grammar; any deviation rejects the
/// whole frame with the first failure found.
pub fn parse_frame(buffer: &[u8]) -> ProtocolResult<LayoutFrame> {
    if buffer.len() < LAYOUT_PREFIX.len() {
        return Err(ProtocolError::TooShort);
    }
    if &buffer[..LAYOUT_PREFIX.len()] != LAYOUT_PREFIX {
        return Err(ProtocolError::BadPrefix);
    }

    let body = &buffer[LAYOUT_PREFIX.len()..];
    let delimiter = body
        .iter()
        .position(|&b| b == PAYLOAD_DELIMITER)
        .ok_or(ProtocolError::MissingDelimiter)?;

    let geometry = parse_geometry(&body[..delimiter])?;
    let payload = std::str::from_utf8(&body[delimiter + 1..])
        .map_err(|_| ProtocolError::BadPayload)?
        .to_owned();

    Ok(LayoutFrame { geometry, payload })
}

/// Serialize a frame back onto the wire. Inverse of [`parse_frame`].
pub fn encode_frame(geometry: &Rect, payload: &str) -> Vec<u8> {
    format!(
        "LAYOUT:{},{},{},{}|{}",
        geometry.x, geometry.y, geometry.width, geometry.height, payload
    )
    .into_bytes()
}

fn parse_geometry(block: &[u8]) -> ProtocolResult<Rect> {
    let block = std::str::from_utf8(block)
        .map_err(|_| ProtocolError::BadInteger(String::from_utf8_lossy(block).into_owned()))?;

    let tokens: Vec<&str> = block.split(',').collect();
    if tokens.len() != 4 {
        return Err(ProtocolError::BadFieldCount(tokens.len()));
    }

    let mut fields = [0i32; 4];
    for (field, token) in fields.iter_mut().zip(&tokens) {
        *field = token
            .parse()
            .map_err(|_| ProtocolError::BadInteger((*token).to_owned()))?;
    }

    Ok(Rect::new(fields[0], fields[1], fields[2], fields[3]))
}
