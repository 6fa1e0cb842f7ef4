use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::host::AmbientError;

/// Cooperative stop flag handed to one forcing session.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcingOutcome {
    Elapsed,
    Cancelled,
    Failed,
}

/// Re-applies one ambient value on a fixed interval until the duration runs
/// out or the session is cancelled.
#[derive(Debug, Clone)]
pub struct ForcingLoop {
    pub label: &'static str,
    pub interval: Duration,
    pub duration: Duration,
}

impl ForcingLoop {
    pub fn new(label: &'static str, interval: Duration, duration: Duration) -> Self {
        Self {
            label,
            interval,
            duration,
        }
    }

    pub fn spawn<F>(self, write: F) -> io::Result<ForcingSession>
    where
        F: FnMut() -> Result<(), AmbientError> + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let label = self.label;
        let handle = thread::Builder::new()
            .name(format!("forcing-{label}"))
            .spawn(move || self.run(&worker_token, write))?;
        Ok(ForcingSession {
            label,
            token,
            handle: Some(handle),
        })
    }

    /// Runs the loop on the calling thread.
    pub fn run<F>(&self, token: &CancellationToken, mut write: F) -> ForcingOutcome
    where
        F: FnMut() -> Result<(), AmbientError>,
    {
        let started = Instant::now();
        let outcome = loop {
            if token.is_cancelled() {
                break ForcingOutcome::Cancelled;
            }
            if let Err(err) = write() {
                error!(label = self.label, error = %err, "forcing_write_failed");
                break ForcingOutcome::Failed;
            }
            thread::sleep(self.interval);
            if started.elapsed() >= self.duration {
                break ForcingOutcome::Elapsed;
            }
        };
        debug!(
            label = self.label,
            outcome = ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "forcing_done"
        );
        outcome
    }
}

/// Handle to a running forcing loop. Dropping it cancels the loop without
/// waiting for the thread.
#[derive(Debug)]
pub struct ForcingSession {
    label: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<ForcingOutcome>>,
}

impl ForcingSession {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the worker. A panicking worker reports as failed.
    pub fn join(mut self) -> ForcingOutcome {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(ForcingOutcome::Failed),
            None => ForcingOutcome::Cancelled,
        }
    }
}

impl Drop for ForcingSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.token.cancel();
        }
    }
}
