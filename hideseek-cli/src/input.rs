//! Line-based terminal input read on a dedicated thread.
//!
//! Lines arrive over a crossbeam channel, so the game can poll for an answer
//! while a note is still sounding and stop playback as soon as one arrives.

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::debug;

pub struct Keyboard {
    lines: Receiver<String>,
}

impl Keyboard {
    /// Starts the stdin reader thread.
    pub fn spawn() -> Self {
        let (sender, lines) = crossbeam_channel::unbounded();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
            debug!("[INPUT] stdin closed");
        });
        Self { lines }
    }

    /// Blocks for the next line. `None` once stdin is closed.
    pub fn next_line(&self) -> Option<String> {
        self.lines.recv().ok()
    }

    /// Waits up to `timeout` for a line.
    ///
    /// Returns `Ok(None)` on timeout and an error once stdin is closed.
    pub fn poll(&self, timeout: Duration) -> Result<Option<String>, RecvTimeoutError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Discards lines typed before the current prompt.
    pub fn discard_pending(&self) {
        while self.lines.try_recv().is_ok() {}
    }

    /// Waits for Enter.
    pub fn wait_for_enter(&self) {
        let _ = self.next_line();
    }
}
