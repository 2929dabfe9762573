//! Cross-thread handoff of layout frames into the event loop.
//!
//! A bounded single-slot channel owns each payload until the event loop
//! takes it; the posted window message carries no data, it only says "the
//! slot is ready". The sending side blocks while a frame is unconsumed, so
//! at most one frame is ever outstanding and the consumer can never observe
//! a buffer the producer is still writing.

use crate::window::WM_APP_LAYOUT;
use crossbeam_channel::{bounded, Receiver, Sender};
use protocol::LayoutFrame;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::PostMessageW;

/// Producer half, held by the pipe listener thread. The window handle is
/// kept raw; this thread never dereferences it.
pub struct LayoutRelay {
    tx: Sender<LayoutFrame>,
    hwnd: isize,
}

impl LayoutRelay {
    /// The receiver half goes into the window state on the event-loop
    /// thread.
    pub fn new(hwnd: isize) -> (Self, Receiver<LayoutFrame>) {
        let (tx, rx) = bounded(1);
        (Self { tx, hwnd }, rx)
    }

    /// Hand one frame to the event loop, blocking while the previous one is
    /// still unconsumed. Returns false once the consumer is gone.
    pub fn deliver(&self, frame: LayoutFrame) -> bool {
        if self.tx.send(frame).is_err() {
            return false;
        }
        unsafe {
            let _ = PostMessageW(
                HWND(self.hwnd as *mut std::ffi::c_void),
                WM_APP_LAYOUT,
                WPARAM(0),
                LPARAM(0),
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Rect;
    use std::thread;

    fn frame(n: i32) -> LayoutFrame {
        LayoutFrame {
            geometry: Rect::new(n, n, 10, 10),
            payload: format!("p{n}"),
        }
    }

    #[test]
    fn frames_arrive_in_order() {
        let (relay, rx) = LayoutRelay::new(0);
        let producer = thread::spawn(move || {
            assert!(relay.deliver(frame(1)));
            assert!(relay.deliver(frame(2)));
        });
        assert_eq!(rx.recv().unwrap().payload, "p1");
        assert_eq!(rx.recv().unwrap().payload, "p2");
        producer.join().unwrap();
    }

    #[test]
    fn slot_holds_at_most_one_frame() {
        let (relay, rx) = LayoutRelay::new(0);
        assert!(relay.deliver(frame(1)));
        assert!(relay.tx.is_full());
        let _ = rx.recv().unwrap();
        assert!(relay.tx.is_empty());
    }

    #[test]
    fn deliver_fails_once_the_consumer_is_gone() {
        let (relay, rx) = LayoutRelay::new(0);
        drop(rx);
        assert!(!relay.deliver(frame(1)));
    }
}
