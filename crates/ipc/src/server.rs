//! Blocking single-client pipe server.
//!
//! The pipe technology allows one active client per endpoint instance, so
//! the listener re-creates the endpoint every cycle: create, accept one
//! client, read one message, disconnect, repeat. All failures are non-fatal
//! and roll into the next cycle.

use crate::{to_wide, ChannelError, ChannelResult, MESSAGE_BUFFER_SIZE};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_PIPE_CONNECTED, GENERIC_WRITE, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_MODE, OPEN_EXISTING,
};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_ACCESS_INBOUND,
    PIPE_READMODE_MESSAGE, PIPE_TYPE_MESSAGE, PIPE_WAIT,
};

/// Server end of a well-known inbound pipe.
pub struct PipeListener {
    name: Vec<u16>,
}

impl PipeListener {
    pub fn new(name: &str) -> Self {
        Self { name: to_wide(name) }
    }

    /// Accept clients until `stop` is observed set.
    ///
    /// The stop flag is checked between cycles only; a blocking accept in
    /// flight finishes its cycle first. [`wake_listener`] unblocks it.
    pub fn run<F>(&self, stop: &AtomicBool, mut on_message: F)
    where
        F: FnMut(&[u8]),
    {
        let mut failed_cycles: u64 = 0;
        let mut buffer = vec![0u8; MESSAGE_BUFFER_SIZE as usize];

        while !stop.load(Ordering::SeqCst) {
            let endpoint = match ServerEndpoint::create(PCWSTR(self.name.as_ptr())) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    failed_cycles += 1;
                    warn!(failed_cycles, "pipe cycle failed: {e}");
                    continue;
                }
            };

            if let Err(e) = endpoint.accept() {
                failed_cycles += 1;
                warn!(failed_cycles, "pipe cycle failed: {e}");
                continue;
            }

            match endpoint.read_message(&mut buffer) {
                Ok(0) => trace!("client connected without sending"),
                Ok(len) => on_message(&buffer[..len]),
                Err(e) => {
                    failed_cycles += 1;
                    warn!(failed_cycles, "pipe cycle failed: {e}");
                }
            }
        }
    }
}

/// Connect and immediately hang up so a listener blocked in accept can
/// observe its stop flag.
///
/// Retries briefly: the listener may be between cycles, in which case the
/// endpoint does not exist yet and the first connect fails.
pub fn wake_listener(name: &str) {
    let wide = to_wide(name);
    for _ in 0..5 {
        unsafe {
            if let Ok(handle) = CreateFileW(
                PCWSTR(wide.as_ptr()),
                GENERIC_WRITE.0,
                FILE_SHARE_MODE(0),
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            ) {
                let _ = CloseHandle(handle);
                return;
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

/// One endpoint instance; disconnects and closes on drop.
struct ServerEndpoint {
    handle: HANDLE,
}

impl ServerEndpoint {
    fn create(name: PCWSTR) -> ChannelResult<Self> {
        let handle = unsafe {
            CreateNamedPipeW(
                name,
                PIPE_ACCESS_INBOUND,
                PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT,
                1,
                MESSAGE_BUFFER_SIZE,
                MESSAGE_BUFFER_SIZE,
                0,
                None,
            )
        }
        .map_err(ChannelError::Create)?;
        Ok(Self { handle })
    }

    /// Block until one client connects.
    fn accept(&self) -> ChannelResult<()> {
        match unsafe { ConnectNamedPipe(self.handle, None) } {
            Ok(()) => Ok(()),
            // The client raced the connect call; the pipe is usable.
            Err(e) if e.code() == ERROR_PIPE_CONNECTED.to_hresult() => Ok(()),
            Err(e) => Err(ChannelError::Connect(e)),
        }
    }

    /// Block until one message arrives, returning its length in bytes.
    fn read_message(&self, buffer: &mut [u8]) -> ChannelResult<usize> {
        let mut read = 0u32;
        unsafe { ReadFile(self.handle, Some(buffer), Some(&mut read), None) }
            .map_err(ChannelError::Read)?;
        Ok(read as usize)
    }
}

impl Drop for ServerEndpoint {
    fn drop(&mut self) {
        unsafe {
            let _ = DisconnectNamedPipe(self.handle);
            let _ = CloseHandle(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send_command;
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    const TEST_PIPE: &str = r"\\.\pipe\BlenderWebOverlayListenerTest";

    #[test]
    fn listener_receives_one_message_per_connection() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        let listener_stop = stop.clone();
        let listener = thread::spawn(move || {
            PipeListener::new(TEST_PIPE).run(&listener_stop, |raw| {
                let _ = tx.send(raw.to_vec());
            });
        });

        // The endpoint comes up asynchronously; retry until it listens.
        let mut sent = false;
        for _ in 0..50 {
            if send_command(TEST_PIPE, "hello").is_ok() {
                sent = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(sent, "listener never came up");
        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, b"hello");

        stop.store(true, Ordering::SeqCst);
        wake_listener(TEST_PIPE);
        listener.join().unwrap();
    }
}
