// Acquisition task: pulls samples from the source and hands them to the
// spectral task over a bounded queue.
//
// The loop never blocks on the queue. A full queue drops the sample. A
// source timeout is treated as a sensor failure and shuts the pipeline down.
// Dropping the sender on exit disconnects the queue, which is how the
// spectral task learns that the input has ended.

use crate::error::SourceError;
use crate::source::SampleSource;
use crate::supervisor::{ShutdownCause, ShutdownSignal};
use crate::types::Sample;
use crossbeam::channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Counters reported when the acquisition task returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub delivered: u64,
    pub dropped: u64,
    pub read_failures: u64,
}

pub fn run_acquisition_task<S: SampleSource>(
    mut source: S,
    samples: Sender<Sample>,
    shutdown: Arc<ShutdownSignal>,
    timeout: Duration,
) -> AcquisitionStats {
    log::info!("Acquisition task started");
    let mut stats = AcquisitionStats::default();

    while !shutdown.is_raised() {
        let sample = match source.next_sample(timeout) {
            Ok(sample) => sample,
            Err(SourceError::Timeout(ms)) => {
                log::error!("No sample from source within {} ms, assuming sensor failure", ms);
                shutdown.raise(ShutdownCause::SensorTimeout);
                break;
            }
            Err(SourceError::ReadFailed(reason)) => {
                log::warn!("Dropping unreadable sample: {}", reason);
                stats.read_failures += 1;
                continue;
            }
            Err(SourceError::Exhausted) => {
                log::info!("Sample source exhausted after {} samples", stats.delivered);
                break;
            }
        };

        match samples.try_send(sample) {
            Ok(()) => stats.delivered += 1,
            Err(TrySendError::Full(_)) => {
                stats.dropped += 1;
                log::warn!("Sample queue full, dropping sample ({} dropped)", stats.dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Sample queue closed, acquisition task exiting");
                break;
            }
        }
    }

    log::info!(
        "Acquisition task stopped: {} delivered, {} dropped, {} unreadable",
        stats.delivered,
        stats.dropped,
        stats.read_failures
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CsvReplaySource, SyntheticSource};

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn test_exhausted_source_disconnects_queue() {
        let source = SyntheticSource::new(52.0).with_limit(5);
        let (tx, rx) = crossbeam::channel::bounded(10);
        let shutdown = Arc::new(ShutdownSignal::new());

        let stats = run_acquisition_task(source, tx, Arc::clone(&shutdown), TIMEOUT);

        assert_eq!(stats.delivered, 5);
        assert_eq!(rx.iter().count(), 5);
        assert!(!shutdown.is_raised());
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let source = SyntheticSource::new(52.0).with_limit(8);
        let (tx, rx) = crossbeam::channel::bounded(3);
        let shutdown = Arc::new(ShutdownSignal::new());

        let stats = run_acquisition_task(source, tx, shutdown, TIMEOUT);

        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.dropped, 5);
        // The first samples are the ones kept
        let kept: Vec<Duration> = rx.iter().map(|s| s.timestamp).collect();
        assert_eq!(kept[0], Duration::ZERO);
    }

    #[test]
    fn test_timeout_raises_shutdown() {
        let source = SyntheticSource::new(52.0).paced(0.001);
        let (tx, rx) = crossbeam::channel::bounded(10);
        let shutdown = Arc::new(ShutdownSignal::new());

        let stats = run_acquisition_task(source, tx, Arc::clone(&shutdown), Duration::from_millis(5));

        assert_eq!(stats.delivered, 1);
        assert_eq!(rx.len(), 1);
        assert_eq!(shutdown.cause(), Some(ShutdownCause::SensorTimeout));
    }

    #[test]
    fn test_read_failures_are_skipped() {
        let data = "timestamp,ax,ay,az,gx,gy,gz\n\
                    0.00,0,0,0,0,0,0\n\
                    bad,0,0,0,0,0,0\n\
                    0.04,0,0,0,0,0,0\n";
        let source = CsvReplaySource::from_reader(data.as_bytes());
        let (tx, rx) = crossbeam::channel::bounded(10);
        let shutdown = Arc::new(ShutdownSignal::new());

        let stats = run_acquisition_task(source, tx, shutdown, TIMEOUT);

        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.read_failures, 1);
        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn test_raised_signal_stops_before_reading() {
        let source = SyntheticSource::new(52.0);
        let (tx, rx) = crossbeam::channel::bounded(10);
        let shutdown = Arc::new(ShutdownSignal::new());
        shutdown.raise(ShutdownCause::Requested);

        let stats = run_acquisition_task(source, tx, shutdown, TIMEOUT);

        assert_eq!(stats, AcquisitionStats::default());
        assert!(rx.is_empty());
    }
}
