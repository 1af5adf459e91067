use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample source error: {0}")]
    Source(#[from] SourceError),

    #[error("Spectral transform failed: {0}")]
    Transform(String),

    #[error("Failed to spawn {0} thread: {1}")]
    ThreadSpawn(String, std::io::Error),

    #[error("Thread {0} panicked")]
    ThreadPanicked(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors reported by a [`crate::source::SampleSource`].
///
/// The acquisition loop treats these differently: a timeout is a sensor
/// failure and raises the shutdown signal, a read failure drops one sample,
/// and an exhausted source ends acquisition cleanly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("No sample within {0} ms")]
    Timeout(u64),

    #[error("Failed to read sample: {0}")]
    ReadFailed(String),

    #[error("Sample source exhausted")]
    Exhausted,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
