//! Messages arriving from the embedded renderer.
//!
//! The renderer speaks one string channel. A `SCRIPT_LOAD:` prefix marks a
//! command for the host process; any other string is a clickable-rect list
//! of `[x,y,w,h]` tuples.

use crate::rect::Rect;

pub const SCRIPT_COMMAND_PREFIX: &str = "SCRIPT_LOAD:";

/// A classified renderer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererNotice {
    /// Tagged command destined for the host process, prefix included.
    Command(String),
    /// Raw clickable-rect list, parsed lazily by the consumer.
    RectSet(String),
}

pub fn classify_message(message: String) -> RendererNotice {
    if message.starts_with(SCRIPT_COMMAND_PREFIX) {
        RendererNotice::Command(message)
    } else {
        RendererNotice::RectSet(message)
    }
}

/// Extract every well-formed `[x,y,w,h]` tuple from the input.
///
/// Malformed tuples are skipped, not fatal; the renderer may interleave
/// whitespace or separators between tuples.
pub fn parse_rects(input: &str) -> Vec<Rect> {
    let bytes = input.as_bytes();
    let mut rects = Vec::new();
    let mut pos = 0;

    while let Some(open) = find_byte(bytes, b'[', pos) {
        let Some(close) = find_byte(bytes, b']', open + 1) else {
            break;
        };
        match parse_tuple(&input[open + 1..close]) {
            Some(rect) => {
                rects.push(rect);
                pos = close + 1;
            }
            // Re-scan from just past the bracket so a tuple opening inside
            // a malformed one is still found.
            None => pos = open + 1,
        }
    }

    rects
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

fn parse_tuple(body: &str) -> Option<Rect> {
    let mut fields = [0i32; 4];
    let mut count = 0;

    for token in body.split(',') {
        if count == fields.len() {
            return None;
        }
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        fields[count] = token.parse().ok()?;
        count += 1;
    }

    (count == fields.len()).then(|| Rect::new(fields[0], fields[1], fields[2], fields[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_prefix_marks_a_command() {
        let notice = classify_message("SCRIPT_LOAD:render.py".into());
        assert_eq!(notice, RendererNotice::Command("SCRIPT_LOAD:render.py".into()));
    }

    #[test]
    fn anything_else_is_a_rect_set() {
        let notice = classify_message("[1,2,3,4]".into());
        assert_eq!(notice, RendererNotice::RectSet("[1,2,3,4]".into()));
    }

    #[test]
    fn parses_two_adjacent_tuples() {
        let rects = parse_rects("[10,10,50,20][70,70,30,30]");
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::new(10, 10, 50, 20));
        assert_eq!(rects[0].right(), 60);
        assert_eq!(rects[0].bottom(), 30);
        assert_eq!(rects[1], Rect::new(70, 70, 30, 30));
        assert_eq!(rects[1].right(), 100);
        assert_eq!(rects[1].bottom(), 100);
    }

    #[test]
    fn separators_between_tuples_are_ignored() {
        let rects = parse_rects("[1,2,3,4], [5,6,7,8]");
        assert_eq!(rects.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_rects() {
        assert!(parse_rects("").is_empty());
        assert!(parse_rects("no brackets here").is_empty());
    }

    #[test]
    fn malformed_tuples_are_skipped() {
        assert!(parse_rects("[1,2,3]").is_empty());
        assert!(parse_rects("[1,2,3,4,5]").is_empty());
        assert!(parse_rects("[a,2,3,4]").is_empty());
        assert!(parse_rects("[-1,2,3,4]").is_empty());
        assert_eq!(parse_rects("[1,2,3][4,5,6,7]"), vec![Rect::new(4, 5, 6, 7)]);
    }

    #[test]
    fn tuple_nested_in_garbage_is_recovered() {
        assert_eq!(parse_rects("[[1,2,3,4]"), vec![Rect::new(1, 2, 3, 4)]);
    }
}
