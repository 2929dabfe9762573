//! Input passthrough: reclassify the overlay as interactive or transparent.

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    GetWindowLongPtrW, SetWindowLongPtrW, GWL_EXSTYLE, WS_EX_TRANSPARENT,
};

/// Input mode of the overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passthrough {
    /// The overlay receives mouse input.
    Interactive,
    /// Input falls through to whatever lies beneath.
    Transparent,
}

/// Debounces mode flips: each poll tick yields at most one transition, and
/// only when the derived mode actually changes.
#[derive(Debug)]
pub struct PassthroughTracker {
    state: Passthrough,
}

impl PassthroughTracker {
    /// A freshly created overlay window carries no WS_EX_TRANSPARENT bit,
    /// so its tracker starts [`Passthrough::Interactive`].
    pub fn new(initial: Passthrough) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> Passthrough {
        self.state
    }

    /// Fold in one cursor observation. Returns the new mode only when it
    /// differs from the current one.
    pub fn observe(&mut self, over_clickable: bool) -> Option<Passthrough> {
        let target = if over_clickable {
            Passthrough::Interactive
        } else {
            Passthrough::Transparent
        };
        if target == self.state {
            None
        } else {
            self.state = target;
            Some(target)
        }
    }
}

/// Flip WS_EX_TRANSPARENT on the window to match the requested mode.
pub fn apply(hwnd: HWND, mode: Passthrough) {
    unsafe {
        let style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
        let updated = match mode {
            Passthrough::Interactive => style & !(WS_EX_TRANSPARENT.0 as isize),
            Passthrough::Transparent => style | WS_EX_TRANSPARENT.0 as isize,
        };
        if updated != style {
            SetWindowLongPtrW(hwnd, GWL_EXSTYLE, updated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staying_outside_emits_no_transition() {
        let mut tracker = PassthroughTracker::new(Passthrough::Transparent);
        for _ in 0..5 {
            assert_eq!(tracker.observe(false), None);
        }
        assert_eq!(tracker.state(), Passthrough::Transparent);
    }

    #[test]
    fn entering_a_rect_emits_exactly_one_transition() {
        let mut tracker = PassthroughTracker::new(Passthrough::Transparent);
        assert_eq!(tracker.observe(true), Some(Passthrough::Interactive));
        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(true), None);
    }

    #[test]
    fn leaving_again_emits_exactly_one_transition() {
        let mut tracker = PassthroughTracker::new(Passthrough::Transparent);
        tracker.observe(true);
        assert_eq!(tracker.observe(false), Some(Passthrough::Transparent));
        assert_eq!(tracker.observe(false), None);
    }

    #[test]
    fn fresh_window_starts_interactive_and_settles() {
        let mut tracker = PassthroughTracker::new(Passthrough::Interactive);
        assert_eq!(tracker.observe(false), Some(Passthrough::Transparent));
        assert_eq!(tracker.observe(false), None);
    }
}
