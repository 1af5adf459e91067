// One-shot shutdown signal shared by every pipeline thread.
//
// Any thread may raise it. Pipeline loops poll `is_raised` once per
// iteration and return straight away without draining queued samples; the
// supervisor (the monitor handle) waits on it, joins the threads and moves
// to a terminal state. There is no way to lower the signal again.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why the pipeline was shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownCause {
    /// A window or pool slot could not be allocated at startup
    AllocationFailure,
    /// The sample source stopped delivering data within its timeout
    SensorTimeout,
    /// Stopped on request (not a failure)
    Requested,
    /// The sample source ran out and the last window was processed
    EndOfInput,
}

impl ShutdownCause {
    pub fn is_fatal(self) -> bool {
        !matches!(self, ShutdownCause::Requested | ShutdownCause::EndOfInput)
    }
}

impl std::fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ShutdownCause::AllocationFailure => "allocation failure",
            ShutdownCause::SensorTimeout => "sensor timeout",
            ShutdownCause::Requested => "requested",
            ShutdownCause::EndOfInput => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Default)]
pub struct ShutdownSignal {
    raised: AtomicBool,
    cause: Mutex<Option<ShutdownCause>>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Only the first cause is kept.
    pub fn raise(&self, cause: ShutdownCause) {
        let mut current = self.cause.lock();
        if current.is_some() {
            return;
        }
        *current = Some(cause);
        self.raised.store(true, Ordering::Release);

        match cause {
            ShutdownCause::Requested => log::info!("Shutdown requested"),
            ShutdownCause::EndOfInput => log::info!("Sample stream ended, stopping pipeline"),
            _ => log::error!("Program fatal error ({}), terminating all tasks", cause),
        }
        self.condvar.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn cause(&self) -> Option<ShutdownCause> {
        *self.cause.lock()
    }

    /// Block until the signal is raised.
    pub fn wait(&self) -> ShutdownCause {
        let mut cause = self.cause.lock();
        loop {
            if let Some(cause) = *cause {
                return cause;
            }
            self.condvar.wait(&mut cause);
        }
    }

    /// Block until the signal is raised or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownCause> {
        let mut cause = self.cause.lock();
        if cause.is_none() {
            self.condvar.wait_for(&mut cause, timeout);
        }
        *cause
    }
}
