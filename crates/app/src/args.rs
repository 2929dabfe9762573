//! Startup-argument parsing.

use protocol::Rect;

pub const DEFAULT_GEOMETRY: Rect = Rect {
    x: 100,
    y: 100,
    width: 800,
    height: 600,
};

/// Parse the optional `x,y,w,h` startup argument.
///
/// Fields apply positionally; a missing or unparsable field silently keeps
/// its default so a partial argument still positions what it can.
pub fn parse_initial_geometry(arg: Option<&str>) -> Rect {
    let mut geometry = DEFAULT_GEOMETRY;
    let Some(arg) = arg else {
        return geometry;
    };

    let fields = [
        &mut geometry.x,
        &mut geometry.y,
        &mut geometry.width,
        &mut geometry.height,
    ];
    for (field, token) in fields.into_iter().zip(arg.split(',')) {
        if let Ok(value) = token.trim().parse::<i32>() {
            *field = value;
        }
    }

    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_argument_keeps_defaults() {
        assert_eq!(parse_initial_geometry(None), DEFAULT_GEOMETRY);
    }

    #[test]
    fn full_argument_overrides_every_field() {
        let geometry = parse_initial_geometry(Some("10,20,300,200"));
        assert_eq!(geometry, Rect::new(10, 20, 300, 200));
    }

    #[test]
    fn partial_argument_keeps_trailing_defaults() {
        let geometry = parse_initial_geometry(Some("10,20"));
        assert_eq!(geometry, Rect::new(10, 20, 800, 600));
    }

    #[test]
    fn bad_fields_fall_back_individually() {
        let geometry = parse_initial_geometry(Some("10,abc,300"));
        assert_eq!(geometry, Rect::new(10, 100, 300, 600));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let geometry = parse_initial_geometry(Some("1,2,3,4,5"));
        assert_eq!(geometry, Rect::new(1, 2, 3, 4));
    }
}
