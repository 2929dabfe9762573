//! Overlay position synchronizer.
//!
//! Purely reactive: geometry arrives from the host over the layout channel
//! and is applied only when it differs from what the window already has, so
//! a steady stream of identical frames costs no compositor work.

use protocol::Rect;
use tracing::warn;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    GetWindowRect, SetWindowPos, SWP_NOACTIVATE, SWP_NOZORDER,
};

/// Decide whether a window move is needed.
///
/// `None` when the target already matches; applying the same target twice
/// is a no-op the second time by construction.
pub fn plan_update(current: Rect, target: Rect) -> Option<Rect> {
    (current != target).then_some(target)
}

/// Current outer geometry of the window. Borderless popup, so outer and
/// client extents coincide.
pub fn window_geometry(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(Rect::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    ))
}

/// Move/resize the overlay to `target` when anything differs. Returns
/// whether an update was applied; degenerate targets keep the previous
/// geometry.
pub fn sync_overlay_position(hwnd: HWND, target: Rect) -> bool {
    if target.width <= 0 || target.height <= 0 {
        warn!(?target, "skipping degenerate overlay geometry");
        return false;
    }

    let Some(current) = window_geometry(hwnd) else {
        return false;
    };
    let Some(goal) = plan_update(current, target) else {
        return false;
    };

    unsafe {
        SetWindowPos(
            hwnd,
            None,
            goal.x,
            goal.y,
            goal.width,
            goal.height,
            SWP_NOZORDER | SWP_NOACTIVATE,
        )
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differing_geometry_plans_an_update() {
        let current = Rect::new(0, 0, 100, 100);
        let target = Rect::new(10, 20, 300, 200);
        assert_eq!(plan_update(current, target), Some(target));
    }

    #[test]
    fn second_application_is_a_no_op() {
        let current = Rect::new(0, 0, 100, 100);
        let target = Rect::new(10, 20, 300, 200);
        let applied = plan_update(current, target).unwrap();
        assert_eq!(plan_update(applied, target), None);
    }

    #[test]
    fn single_component_change_is_enough() {
        let current = Rect::new(10, 20, 300, 200);
        for target in [
            Rect::new(11, 20, 300, 200),
            Rect::new(10, 21, 300, 200),
            Rect::new(10, 20, 301, 200),
            Rect::new(10, 20, 300, 201),
        ] {
            assert_eq!(plan_update(current, target), Some(target));
        }
    }
}
