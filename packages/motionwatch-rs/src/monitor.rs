//! Threaded monitor.
//!
//! [`Monitor::start`] wires the pipeline together and spawns three named
//! threads:
//!
//! ```text
//! acquisition --(bounded queue)--> spectral --(result pool)--> classifier
//! ```
//!
//! The returned [`MonitorHandle`] exposes the debounced decisions through a
//! [`StatusBoard`] and acts as the supervisor: once the shutdown signal is
//! raised it joins every thread and reports a terminal [`MonitorState`].
//! A stopped monitor cannot be restarted; start a new one instead.

use crate::acquisition::{run_acquisition_task, AcquisitionStats};
use crate::classifier::{run_classifier_task, Classifier, StatusBoard};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::result_pool::ResultPool;
use crate::source::SampleSource;
use crate::spectral::{engine_or_shutdown, run_spectral_task};
use crate::supervisor::{ShutdownCause, ShutdownSignal};
use crate::types::MonitorStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Running,
    /// Stopped on request or at the end of the input
    Stopped,
    /// Terminal failure; requires a fresh start
    Fatal(ShutdownCause),
}

impl MonitorState {
    fn from_cause(cause: Option<ShutdownCause>) -> Self {
        match cause {
            None => MonitorState::Running,
            Some(cause) if cause.is_fatal() => MonitorState::Fatal(cause),
            Some(_) => MonitorState::Stopped,
        }
    }
}

/// Final report of a monitor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub session_id: String,
    pub state: MonitorState,
    pub cause: Option<ShutdownCause>,
    pub status: MonitorStatus,
    pub acquisition: AcquisitionStats,
    pub elapsed_ms: u64,
}

pub struct Monitor;

impl Monitor {
    /// Validate `config`, allocate the result pool and spawn the pipeline.
    pub fn start<S>(config: MonitorConfig, source: S) -> Result<MonitorHandle>
    where
        S: SampleSource + 'static,
    {
        config.validate()?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let pool = Arc::new(ResultPool::from_config(&config.spectral)?);
        let shutdown = Arc::new(ShutdownSignal::new());
        let classifier = Classifier::new(&config);
        let board = classifier.status_board();
        let (tx, rx) = crossbeam::channel::bounded(config.timing.sample_queue_capacity);

        log::info!(
            "Starting monitor {} (N={}, Fs={} Hz, P={})",
            session_id,
            config.spectral.window_size,
            config.spectral.sample_rate_hz,
            config.spectral.pool_size
        );

        let mut handle = MonitorHandle {
            session_id,
            shutdown: Arc::clone(&shutdown),
            board,
            acquisition: None,
            workers: Vec::new(),
            started_at: Instant::now(),
        };

        let spectral = {
            let spectral_config = config.spectral.clone();
            let pool = Arc::clone(&pool);
            let shutdown = Arc::clone(&shutdown);
            let timing = config.timing.clone();
            spawn("spectral", move || {
                if let Some(engine) = engine_or_shutdown(&spectral_config, &shutdown) {
                    run_spectral_task(engine, rx, pool, shutdown, timing);
                }
            })
        };
        handle.register_worker("spectral", spectral)?;

        let classifier_thread = {
            let pool = Arc::clone(&pool);
            let shutdown = Arc::clone(&shutdown);
            let timing = config.timing.clone();
            spawn("classifier", move || {
                run_classifier_task(classifier, pool, shutdown, timing)
            })
        };
        handle.register_worker("classifier", classifier_thread)?;

        let acquisition = {
            let shutdown = Arc::clone(&shutdown);
            let timeout = config.timing.sensor_timeout();
            spawn("acquisition", move || {
                run_acquisition_task(source, tx, shutdown, timeout)
            })
        };
        match acquisition {
            Ok(thread) => handle.acquisition = Some(thread),
            Err(e) => {
                handle.shutdown.raise(ShutdownCause::Requested);
                return Err(e);
            }
        }

        Ok(handle)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn spawn<F, T>(name: &str, body: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| MonitorError::ThreadSpawn(name.to_string(), e))
}

/// Control and status handle of a running monitor.
///
/// Dropping the handle without calling [`MonitorHandle::stop`] or
/// [`MonitorHandle::wait`] requests a stop and joins the threads.
pub struct MonitorHandle {
    session_id: String,
    shutdown: Arc<ShutdownSignal>,
    board: StatusBoard,
    acquisition: Option<JoinHandle<AcquisitionStats>>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
    started_at: Instant,
}

impl MonitorHandle {
    fn register_worker(&mut self, name: &'static str, thread: Result<JoinHandle<()>>) -> Result<()> {
        match thread {
            Ok(thread) => {
                self.workers.push((name, thread));
                Ok(())
            }
            Err(e) => {
                self.shutdown.raise(ShutdownCause::Requested);
                Err(e)
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Shared view of the debounced decisions.
    pub fn status(&self) -> StatusBoard {
        self.board.clone()
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_cause(self.shutdown.cause())
    }

    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Request a stop and join the pipeline.
    pub fn stop(mut self) -> Result<MonitorOutcome> {
        self.shutdown.raise(ShutdownCause::Requested);
        self.join()
    }

    /// Block until the pipeline shuts down on its own, then join it.
    pub fn wait(mut self) -> Result<MonitorOutcome> {
        self.shutdown.wait();
        self.join()
    }

    /// Block until shutdown or `timeout`. Returns the cause if the pipeline
    /// has shut down.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownCause> {
        self.shutdown.wait_timeout(timeout)
    }

    fn join(&mut self) -> Result<MonitorOutcome> {
        let mut panicked = None;

        let acquisition = match self.acquisition.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                panicked = Some("acquisition");
                AcquisitionStats::default()
            }
            None => AcquisitionStats::default(),
        };

        for (name, thread) in self.workers.drain(..) {
            if thread.join().is_err() {
                log::error!("{} thread panicked", name);
                panicked.get_or_insert(name);
            }
        }

        if let Some(name) = panicked {
            return Err(MonitorError::ThreadPanicked(name.to_string()));
        }

        let cause = self.shutdown.cause();
        let outcome = MonitorOutcome {
            session_id: self.session_id.clone(),
            state: MonitorState::from_cause(cause),
            cause,
            status: self.board.snapshot(),
            acquisition,
            elapsed_ms: saturating_millis(self.started_at.elapsed()),
        };

        log::info!(
            "Monitor {} finished: {:?} after {} ms",
            outcome.session_id,
            outcome.state,
            outcome.elapsed_ms
        );
        Ok(outcome)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if self.acquisition.is_none() && self.workers.is_empty() {
            return;
        }
        self.shutdown.raise(ShutdownCause::Requested);
        if let Err(e) = self.join() {
            log::error!("Monitor shutdown on drop failed: {}", e);
        }
    }
}
