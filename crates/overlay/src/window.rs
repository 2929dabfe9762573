//! The overlay window and its event routing.
//!
//! All window state lives on the thread that runs the message loop; the
//! pipe listener only ever posts notifications at it through the relay.

use crate::passthrough::{self, Passthrough, PassthroughTracker};
use crate::sync;
use crate::{CommandSink, OverlayResult, RendererBridge};
use crossbeam_channel::Receiver;
use protocol::{classify_message, hit_test, parse_rects, LayoutFrame, Rect, RendererNotice};
use std::cell::RefCell;
use std::sync::Once;
use tracing::debug;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{CreateSolidBrush, ScreenToClient, UpdateWindow};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetClientRect, GetCursorPos, GetMessageW,
    KillTimer, LoadCursorW, PostMessageW, PostQuitMessage, RegisterClassExW,
    SetLayeredWindowAttributes, SetTimer, SetWindowPos, ShowWindow, TranslateMessage, CS_HREDRAW,
    CS_VREDRAW, HWND_NOTOPMOST, IDC_ARROW, LWA_COLORKEY, MSG, SWP_NOMOVE, SWP_NOSIZE, SW_SHOW,
    WM_DESTROY, WM_PARENTNOTIFY, WM_SIZE, WM_TIMER, WM_USER, WNDCLASSEXW, WS_EX_LAYERED,
    WS_EX_TOOLWINDOW, WS_POPUP,
};

/// Color keyed out of the layered window; page regions painted with it show
/// the host application underneath.
pub const TRANS_COLOR_RGB: (u8, u8, u8) = (0xDF, 0xFE, 0xEF);

/// Renderer replaced the clickable-rect set.
pub const WM_APP_RECTS_CHANGED: u32 = WM_USER + 100;
/// Renderer posted a command string for the host.
pub const WM_APP_COMMAND: u32 = WM_USER + 101;
/// A layout frame is waiting in the relay slot.
pub const WM_APP_LAYOUT: u32 = WM_USER + 102;

const PASSTHROUGH_TIMER_ID: usize = 1;
const PASSTHROUGH_POLL_MS: u32 = 50;

pub(crate) fn trans_colorref() -> COLORREF {
    let (r, g, b) = TRANS_COLOR_RGB;
    COLORREF(r as u32 | (g as u32) << 8 | (b as u32) << 16)
}

thread_local! {
    static OVERLAY_STATE: RefCell<Option<Box<OverlayState>>> = RefCell::new(None);
}

struct OverlayState {
    renderer: Box<dyn RendererBridge>,
    commands: Box<dyn CommandSink>,
    layout_rx: Receiver<LayoutFrame>,
    clickable_rects: Vec<Rect>,
    passthrough: PassthroughTracker,
    pending_rects: Option<String>,
    pending_command: Option<String>,
}

fn with_state<R>(f: impl FnOnce(&mut OverlayState) -> R) -> Option<R> {
    OVERLAY_STATE.with(|cell| cell.borrow_mut().as_mut().map(|state| f(state)))
}

/// Route one renderer-originated string onto the event loop.
///
/// Must be called on the window's own thread; the WebView2 event contract
/// already delivers messages there. The string is parked in event-loop
/// state so the posted tag carries no payload.
pub fn post_renderer_message(hwnd: HWND, message: String) {
    let tag = match classify_message(message) {
        RendererNotice::Command(command) => {
            with_state(|state| state.pending_command = Some(command));
            WM_APP_COMMAND
        }
        RendererNotice::RectSet(raw) => {
            with_state(|state| state.pending_rects = Some(raw));
            WM_APP_RECTS_CHANGED
        }
    };
    unsafe {
        let _ = PostMessageW(hwnd, tag, WPARAM(0), LPARAM(0));
    }
}

/// The layered overlay positioned over the host window.
pub struct OverlayWindow {
    hwnd: HWND,
}

impl OverlayWindow {
    const CLASS_NAME: PCWSTR = w!("BlenderWebOverlayClass");

    /// Create and show the overlay above the host window. The window comes
    /// up interactive; the passthrough poll starts at [`OverlayWindow::attach`].
    pub fn create(initial: Rect, host: HWND) -> OverlayResult<Self> {
        register_class()?;

        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOOLWINDOW,
                Self::CLASS_NAME,
                PCWSTR::null(),
                WS_POPUP,
                initial.x,
                initial.y,
                initial.width,
                initial.height,
                host,
                None,
                hinstance,
                None,
            )?;

            SetLayeredWindowAttributes(hwnd, trans_colorref(), 0, LWA_COLORKEY)?;

            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = UpdateWindow(hwnd);
            // Drop below topmost siblings; stacking follows the host owner.
            let _ = SetWindowPos(hwnd, HWND_NOTOPMOST, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE);

            Ok(Self { hwnd })
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// Raw handle for threads that must not touch the window directly.
    pub fn hwnd_raw(&self) -> isize {
        self.hwnd.0 as isize
    }

    /// Install the collaborators and start the passthrough poll. Must run
    /// on the thread that created the window.
    pub fn attach(
        &self,
        renderer: Box<dyn RendererBridge>,
        commands: Box<dyn CommandSink>,
        layout_rx: Receiver<LayoutFrame>,
    ) {
        let state = Box::new(OverlayState {
            renderer,
            commands,
            layout_rx,
            clickable_rects: Vec::new(),
            passthrough: PassthroughTracker::new(Passthrough::Interactive),
            pending_rects: None,
            pending_command: None,
        });
        OVERLAY_STATE.with(|cell| {
            *cell.borrow_mut() = Some(state);
        });

        unsafe {
            let _ = SetTimer(self.hwnd, PASSTHROUGH_TIMER_ID, PASSTHROUGH_POLL_MS, None);
        }
    }

    /// Pump until WM_QUIT, returning the posted exit code.
    pub fn run_message_loop() -> i32 {
        unsafe {
            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            msg.wParam.0 as i32
        }
    }

    unsafe extern "system" fn wnd_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_TIMER => {
                if wparam.0 == PASSTHROUGH_TIMER_ID {
                    Self::handle_poll_tick(hwnd);
                }
                LRESULT(0)
            }

            WM_SIZE => {
                Self::handle_size(hwnd);
                LRESULT(0)
            }

            WM_APP_RECTS_CHANGED => {
                Self::handle_rects_changed();
                LRESULT(0)
            }

            WM_APP_COMMAND => {
                Self::handle_command();
                LRESULT(0)
            }

            WM_APP_LAYOUT => {
                Self::handle_layout_ready(hwnd);
                LRESULT(0)
            }

            WM_PARENTNOTIFY => {
                // The embedded browser child going down means the session is
                // over; follow it.
                if (wparam.0 as u32 & 0xFFFF) == WM_DESTROY {
                    PostQuitMessage(0);
                }
                LRESULT(0)
            }

            WM_DESTROY => {
                let _ = KillTimer(hwnd, PASSTHROUGH_TIMER_ID);
                // Dropping state closes the relay receiver, which unblocks a
                // listener thread waiting in deliver().
                OVERLAY_STATE.with(|cell| {
                    *cell.borrow_mut() = None;
                });
                PostQuitMessage(0);
                LRESULT(0)
            }

            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }

    unsafe fn handle_poll_tick(hwnd: HWND) {
        let mut point = POINT::default();
        if GetCursorPos(&mut point).is_err() {
            return;
        }
        // The renderer reports control bounds in client coordinates.
        let _ = ScreenToClient(hwnd, &mut point);

        let transition = with_state(|state| {
            let over = hit_test(&state.clickable_rects, point.x, point.y);
            state.passthrough.observe(over)
        })
        .flatten();

        // Style writes re-enter the window procedure; flip outside the borrow.
        if let Some(mode) = transition {
            passthrough::apply(hwnd, mode);
        }
    }

    unsafe fn handle_size(hwnd: HWND) {
        let mut bounds = RECT::default();
        let _ = GetClientRect(hwnd, &mut bounds);
        with_state(|state| state.renderer.resize(bounds.right, bounds.bottom));
    }

    fn handle_rects_changed() {
        let Some(raw) = with_state(|state| state.pending_rects.take()).flatten() else {
            return;
        };
        let rects = parse_rects(&raw);
        debug!(count = rects.len(), "clickable rect set replaced");
        with_state(|state| state.clickable_rects = rects);
    }

    fn handle_command() {
        with_state(|state| {
            if let Some(command) = state.pending_command.take() {
                state.commands.send_command(&command);
            }
        });
    }

    unsafe fn handle_layout_ready(hwnd: HWND) {
        let Some(frame) = with_state(|state| state.layout_rx.try_recv().ok()).flatten() else {
            return;
        };
        // SetWindowPos dispatches WM_SIZE synchronously; the borrow must be
        // released before the move.
        let moved = sync::sync_overlay_position(hwnd, frame.geometry);
        if moved {
            with_state(|state| state.renderer.post_message(&frame.payload));
        }
    }
}

static REGISTER: Once = Once::new();

fn register_class() -> OverlayResult<()> {
    let mut result: OverlayResult<()> = Ok(());
    REGISTER.call_once(|| unsafe {
        let hmodule = match GetModuleHandleW(None) {
            Ok(h) => h,
            Err(e) => {
                result = Err(e.into());
                return;
            }
        };
        let hinstance = HINSTANCE(hmodule.0);
        let cursor = match LoadCursorW(None, IDC_ARROW) {
            Ok(c) => c,
            Err(e) => {
                result = Err(e.into());
                return;
            }
        };

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(OverlayWindow::wnd_proc),
            hInstance: hinstance,
            hCursor: cursor,
            hbrBackground: CreateSolidBrush(trans_colorref()),
            lpszClassName: OverlayWindow::CLASS_NAME,
            ..Default::default()
        };

        let _ = RegisterClassExW(&wc);
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct RecordingRenderer(Rc<RefCell<Vec<String>>>);

    impl RendererBridge for RecordingRenderer {
        fn post_message(&self, text: &str) {
            self.0.borrow_mut().push(text.to_owned());
        }

        fn resize(&self, _width: i32, _height: i32) {}
    }

    struct RecordingSink(Rc<RefCell<Vec<String>>>);

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: &str) {
            self.0.borrow_mut().push(command.to_owned());
        }
    }

    fn install_doubles() -> (Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<String>>>) {
        let posted = Rc::new(RefCell::new(Vec::new()));
        let sent = Rc::new(RefCell::new(Vec::new()));
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let state = Box::new(OverlayState {
            renderer: Box::new(RecordingRenderer(posted.clone())),
            commands: Box::new(RecordingSink(sent.clone())),
            layout_rx: rx,
            clickable_rects: Vec::new(),
            passthrough: PassthroughTracker::new(Passthrough::Interactive),
            pending_rects: None,
            pending_command: None,
        });
        OVERLAY_STATE.with(|cell| *cell.borrow_mut() = Some(state));
        (posted, sent)
    }

    fn null_hwnd() -> HWND {
        HWND(std::ptr::null_mut())
    }

    #[test]
    fn rect_update_replaces_the_clickable_set() {
        let (_posted, sent) = install_doubles();

        post_renderer_message(null_hwnd(), "[1,2,3,4][5,6,7,8]".into());
        OverlayWindow::handle_rects_changed();

        let rects = with_state(|state| state.clickable_rects.clone()).unwrap();
        assert_eq!(rects, vec![Rect::new(1, 2, 3, 4), Rect::new(5, 6, 7, 8)]);
        assert!(sent.borrow().is_empty());

        OVERLAY_STATE.with(|cell| *cell.borrow_mut() = None);
    }

    #[test]
    fn command_reaches_the_sink_with_its_tag() {
        let (_posted, sent) = install_doubles();

        post_renderer_message(null_hwnd(), "SCRIPT_LOAD:render.py".into());
        OverlayWindow::handle_command();

        assert_eq!(*sent.borrow(), ["SCRIPT_LOAD:render.py"]);
        let rects = with_state(|state| state.clickable_rects.clone()).unwrap();
        assert!(rects.is_empty());

        OVERLAY_STATE.with(|cell| *cell.borrow_mut() = None);
    }

    #[test]
    fn messages_before_attach_are_dropped_quietly() {
        OVERLAY_STATE.with(|cell| *cell.borrow_mut() = None);
        post_renderer_message(null_hwnd(), "[1,2,3,4]".into());
        OverlayWindow::handle_rects_changed();
        OverlayWindow::handle_command();
    }
}
