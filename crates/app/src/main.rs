//! Transparent WebView2 overlay mirrored onto Blender's main window.

#![windows_subsystem = "windows"]

mod args;
mod logging;
mod webview;

use crate::webview::WebViewBridge;
use anyhow::{bail, Context, Result};
use ipc::{PipeListener, LAYOUT_PIPE_NAME, SCRIPT_PIPE_NAME};
use overlay::{CommandSink, LayoutRelay, OverlayWindow};
use protocol::parse_frame;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};
use windows::Win32::UI::WindowsAndMessaging::FindWindowW;

const HOST_WINDOW_CLASS: PCWSTR = w!("GHOST_WindowClass");

/// Renderer commands go out over the script pipe. Delivery is at-most-once:
/// a missing listener just drops the command.
struct PipeCommandSink;

impl CommandSink for PipeCommandSink {
    fn send_command(&self, command: &str) {
        if let Err(e) = ipc::send_command(SCRIPT_PIPE_NAME, command) {
            debug!("script command dropped: {e}");
        }
    }
}

fn main() -> Result<()> {
    logging::init();

    let initial = args::parse_initial_geometry(std::env::args().nth(1).as_deref());

    unsafe {
        CoInitializeEx(None, COINIT_APARTMENTTHREADED)
            .ok()
            .context("COM initialization failed")?;
    }

    let host = find_host_window().context("Blender window (GHOST_WindowClass) not found")?;
    let content = content_file().context("web_ui/index.html not found next to the executable")?;

    let window = OverlayWindow::create(initial, host)?;

    let (relay, layout_rx) = LayoutRelay::new(window.hwnd_raw());
    let stop = Arc::new(AtomicBool::new(false));
    let listener = spawn_layout_listener(relay, stop.clone());

    let bridge = WebViewBridge::create(window.hwnd())?;
    window.attach(Box::new(bridge.clone()), Box::new(PipeCommandSink), layout_rx);
    bridge.navigate(&file_uri(&content))?;
    info!("overlay attached over host window");

    let exit_code = OverlayWindow::run_message_loop();

    stop.store(true, Ordering::SeqCst);
    ipc::wake_listener(LAYOUT_PIPE_NAME);
    let _ = listener.join();

    unsafe {
        CoUninitialize();
    }

    if exit_code != 0 {
        bail!("event loop exited with code {exit_code}");
    }
    Ok(())
}

/// Receive layout frames on a dedicated thread and hand them to the event
/// loop through the relay. Malformed frames are dropped where they land,
/// with a running count so desync is at least visible in the log.
fn spawn_layout_listener(relay: LayoutRelay, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut dropped: u64 = 0;
        PipeListener::new(LAYOUT_PIPE_NAME).run(&stop, |raw| match parse_frame(raw) {
            Ok(frame) => {
                let _ = relay.deliver(frame);
            }
            Err(e) => {
                dropped += 1;
                warn!(dropped, "discarding malformed layout frame: {e}");
            }
        });
    })
}

fn find_host_window() -> Option<HWND> {
    unsafe { FindWindowW(HOST_WINDOW_CLASS, None) }
        .ok()
        .filter(|hwnd| !hwnd.is_invalid())
}

fn content_file() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let path = exe.parent()?.join("web_ui").join("index.html");
    path.is_file().then_some(path)
}

fn file_uri(path: &std::path::Path) -> String {
    format!("file:///{}", path.display().to_string().replace('\\', "/"))
}
