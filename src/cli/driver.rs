use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bank::{lock_bank, SharedBank};
use crate::security::auth::TickOutcome;

/// Background thread that drives the session countdown and applies due
/// loan credits once per interval. Stops when dropped.
pub struct ClockDriver {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ClockDriver {
    pub fn spawn(bank: SharedBank, interval: Duration) -> Result<Self> {
        let (stop, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("bankist-clock".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        drive_once(&bank);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("Clock driver stopping");
                        break;
                    }
                }
            })
            .context("Failed to spawn clock driver thread")?;

        info!("Clock driver started, ticking every {:?}", interval);

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to finish
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One clock step: tick the session, then credit due loans, both under
/// the same lock as user operations.
pub fn drive_once(bank: &SharedBank) -> TickOutcome {
    let mut bank = lock_bank(bank);
    let outcome = bank.tick();
    bank.process_scheduled_credits();
    outcome
}
