//! Movement classifier.
//!
//! Every cycle the classifier reads the freshest spectral result and runs
//! three detectors on each axis:
//!
//! - **Tremor** and **dyskinesia**: a peak-in-band test on the gyroscope
//!   power spectrum, relative to a shared context band.
//! - **Freezing of gait (FOG)**: a freeze index on the accelerometer power
//!   spectrum, only armed while the wearer is walking.
//!
//! Per-axis decisions are OR-combined, passed through one [`DebounceFilter`]
//! per condition and published on a [`StatusBoard`].

use crate::config::{Band, DetectorConfig, MonitorConfig, SpectralConfig, TimingConfig};
use crate::debounce::DebounceFilter;
use crate::result_pool::{ResultPool, SpectralResult};
use crate::supervisor::{ShutdownCause, ShutdownSignal};
use crate::types::{Axis, Channel, Condition, MonitorStatus, Sensor};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bin index of `freq_hz`, truncated and clamped to the last kept bin.
pub fn bin_index(freq_hz: f32, spectral: &SpectralConfig) -> usize {
    let index = (freq_hz * spectral.window_size as f32 / spectral.sample_rate_hz) as usize;
    index.min(spectral.bins().saturating_sub(1))
}

fn band_bins(band: Band, spectral: &SpectralConfig) -> std::ops::RangeInclusive<usize> {
    bin_index(band.lo_hz, spectral)..=bin_index(band.hi_hz, spectral)
}

/// Largest power bin inside `band` and its frequency.
///
/// Returns `(0.0, lo_freq)` for an all-zero band.
pub fn find_peak_power(psd: &[f32], band: Band, spectral: &SpectralConfig) -> (f32, f32) {
    let bins = band_bins(band, spectral);
    let mut peak_index = *bins.start();
    let mut peak_power = 0.0f32;

    for index in bins {
        let power = psd.get(index).copied().unwrap_or(0.0);
        if power > peak_power {
            peak_power = power;
            peak_index = index;
        }
    }

    (peak_power, peak_index as f32 * spectral.resolution_hz())
}

/// Sum of power bins inside `band` (both edges included).
pub fn band_power(psd: &[f32], band: Band, spectral: &SpectralConfig) -> f32 {
    let bins = band_bins(band, spectral);
    psd.get(bins).map(|bins| bins.iter().sum::<f32>()).unwrap_or(0.0)
}

/// Outcome of one peak-in-band test on one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandAnalysis {
    pub peak_freq: f32,
    pub peak_power: f32,
    pub target_power: f32,
    pub context_power: f32,
    pub relative_power: f32,
    /// `sqrt(peak_power)`, in the units of the input signal
    pub intensity: f32,
    pub detected: bool,
}

pub fn detect_band(
    psd: &[f32],
    target: Band,
    detector: &DetectorConfig,
    spectral: &SpectralConfig,
) -> BandAnalysis {
    let context = detector.context_band;
    let (peak_power, peak_freq) = find_peak_power(psd, context, spectral);
    let target_power = band_power(psd, target, spectral);
    let context_power = band_power(psd, context, spectral);
    let relative_power = target_power / (context_power + detector.epsilon);

    let detected = target.contains(peak_freq)
        && relative_power > detector.relative_power_threshold
        && peak_power > detector.min_peak_power_threshold;

    BandAnalysis {
        peak_freq,
        peak_power,
        target_power,
        context_power,
        relative_power,
        intensity: peak_power.sqrt(),
        detected,
    }
}

/// Walking-state estimator for one axis.
///
/// Entry needs `history` consecutive high-locomotion cycles; a low cycle
/// before entry discards the progress. Once walking, each low cycle only
/// decrements the counter, and the state drops when it reaches zero.
#[derive(Debug, Clone)]
pub struct WalkingState {
    counter: u32,
    history: u32,
    walking: bool,
}

impl WalkingState {
    pub fn new(history: u32) -> Self {
        Self {
            counter: 0,
            history,
            walking: false,
        }
    }

    pub fn update(&mut self, locomotion_high: bool) -> bool {
        if locomotion_high {
            self.counter = (self.counter + 1).min(self.history);
            if self.counter >= self.history {
                self.walking = true;
            }
        } else if self.walking {
            self.counter = self.counter.saturating_sub(1);
            if self.counter == 0 {
                self.walking = false;
            }
        } else {
            self.counter = 0;
        }
        self.walking
    }

    pub fn is_walking(&self) -> bool {
        self.walking
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }
}

/// Outcome of the freeze-index test on one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FreezeAnalysis {
    pub freeze_power: f32,
    pub locomotion_power: f32,
    pub freeze_index: f32,
    pub walking: bool,
    pub detected: bool,
}

/// Run the FOG test on one axis, advancing its walking estimator.
pub fn detect_fog(
    psd: &[f32],
    walking: &mut WalkingState,
    detector: &DetectorConfig,
    spectral: &SpectralConfig,
) -> FreezeAnalysis {
    let freeze_power = band_power(psd, detector.fog_freeze_band, spectral);
    let locomotion_power = band_power(psd, detector.fog_locomotion_band, spectral);

    let is_walking = walking.update(locomotion_power > detector.locomotion_power_threshold);
    let freeze_index = freeze_power / (locomotion_power + detector.epsilon);

    let detected = freeze_index > detector.freeze_index_threshold
        && is_walking
        && freeze_power > detector.min_freeze_power;

    FreezeAnalysis {
        freeze_power,
        locomotion_power,
        freeze_index,
        walking: is_walking,
        detected,
    }
}

#[derive(Debug, Default)]
struct StatusFlags {
    tremor: AtomicBool,
    dyskinesia: AtomicBool,
    fog: AtomicBool,
}

/// Shared read side of the debounced decisions.
///
/// Cloning is cheap; all clones observe the same flags. Only the classifier
/// writes them.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    flags: Arc<StatusFlags>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tremor_status(&self) -> bool {
        self.flags.tremor.load(Ordering::Acquire)
    }

    pub fn dyskinesia_status(&self) -> bool {
        self.flags.dyskinesia.load(Ordering::Acquire)
    }

    pub fn fog_status(&self) -> bool {
        self.flags.fog.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MonitorStatus {
        MonitorStatus {
            tremor: self.tremor_status(),
            dyskinesia: self.dyskinesia_status(),
            fog: self.fog_status(),
        }
    }

    fn publish(&self, status: MonitorStatus) {
        self.flags.tremor.store(status.tremor, Ordering::Release);
        self.flags.dyskinesia.store(status.dyskinesia, Ordering::Release);
        self.flags.fog.store(status.fog, Ordering::Release);
    }
}

/// Everything one classification cycle saw and decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub cycle: u64,
    /// Timestamp of the newest sample in the analysed window, in seconds
    pub timestamp_s: f64,
    pub result_sequence: u64,
    pub tremor: [BandAnalysis; 3],
    pub dyskinesia: [BandAnalysis; 3],
    pub fog: [FreezeAnalysis; 3],
    /// OR across axes, before debouncing
    pub raw: MonitorStatus,
    /// Debounced output
    pub status: MonitorStatus,
}

pub struct Classifier {
    detector: DetectorConfig,
    spectral: SpectralConfig,
    tremor_filter: DebounceFilter,
    dyskinesia_filter: DebounceFilter,
    fog_filter: DebounceFilter,
    walking: [WalkingState; 3],
    board: StatusBoard,
    cycles: u64,
}

impl Classifier {
    pub fn new(config: &MonitorConfig) -> Self {
        let detector = config.detector.clone();
        let threshold = detector.debounce_threshold;
        let history = detector.walking_history;

        Self {
            spectral: config.spectral.clone(),
            tremor_filter: DebounceFilter::new(threshold),
            dyskinesia_filter: DebounceFilter::new(threshold),
            fog_filter: DebounceFilter::new(threshold),
            walking: [
                WalkingState::new(history),
                WalkingState::new(history),
                WalkingState::new(history),
            ],
            board: StatusBoard::new(),
            cycles: 0,
            detector,
        }
    }

    /// A handle on the published decisions.
    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            tremor: self.tremor_filter.state(),
            dyskinesia: self.dyskinesia_filter.state(),
            fog: self.fog_filter.state(),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one classification cycle over `result` and publish the outcome.
    pub fn classify(&mut self, result: &SpectralResult) -> ClassificationReport {
        let mut tremor = [BandAnalysis::default(); 3];
        let mut dyskinesia = [BandAnalysis::default(); 3];
        let mut fog = [FreezeAnalysis::default(); 3];

        for axis in Axis::ALL {
            let i = axis.index();
            let gyro = result.psd(Channel::new(Sensor::Gyro, axis));
            let accel = result.psd(Channel::new(Sensor::Accel, axis));

            tremor[i] = detect_band(gyro, self.detector.tremor_band, &self.detector, &self.spectral);
            dyskinesia[i] =
                detect_band(gyro, self.detector.dyskinesia_band, &self.detector, &self.spectral);
            fog[i] = detect_fog(accel, &mut self.walking[i], &self.detector, &self.spectral);

            log::trace!(
                "{:?}: tremor {:.2} Hz rel {:.2} pk {:.3}, dysk {:.2} Hz rel {:.2}, FI {:.2} walking {}",
                axis,
                tremor[i].peak_freq,
                tremor[i].relative_power,
                tremor[i].peak_power,
                dyskinesia[i].peak_freq,
                dyskinesia[i].relative_power,
                fog[i].freeze_index,
                fog[i].walking
            );
        }

        let raw = MonitorStatus {
            tremor: tremor.iter().any(|a| a.detected),
            dyskinesia: dyskinesia.iter().any(|a| a.detected),
            fog: fog.iter().any(|a| a.detected),
        };

        let previous = self.status();
        let status = MonitorStatus {
            tremor: self.tremor_filter.update(raw.tremor),
            dyskinesia: self.dyskinesia_filter.update(raw.dyskinesia),
            fog: self.fog_filter.update(raw.fog),
        };
        self.board.publish(status);

        for condition in Condition::ALL {
            if status.get(condition) && !previous.get(condition) {
                log::info!("{} detected!", condition.label());
            } else if !status.get(condition) && previous.get(condition) {
                log::debug!("{} cleared", condition.label());
            }
        }

        self.cycles += 1;
        log::debug!(
            "Cycle {}: raw {:?} -> status {:?}",
            self.cycles,
            raw,
            status
        );

        ClassificationReport {
            cycle: self.cycles,
            timestamp_s: result.sample_timestamp.as_secs_f64(),
            result_sequence: result.sequence,
            tremor,
            dyskinesia,
            fog,
            raw,
            status,
        }
    }
}

/// Classifier task body.
///
/// Classifies the freshest readable result, then sleeps one cycle. When no
/// slot can be locked it sleeps only the retry quantum and tries again. On
/// [`ShutdownCause::EndOfInput`] one last cycle runs so the final window is
/// not lost; any other cause returns immediately.
pub fn run_classifier_task(
    mut classifier: Classifier,
    pool: Arc<ResultPool>,
    shutdown: Arc<ShutdownSignal>,
    timing: TimingConfig,
) {
    log::info!("Classifier task started");

    loop {
        if shutdown.is_raised() {
            if shutdown.cause() == Some(ShutdownCause::EndOfInput) {
                if let Some(slot) = pool.acquire_freshest_for_read() {
                    classifier.classify(&slot);
                }
            }
            log::info!("Classifier task exiting after {} cycles", classifier.cycles());
            return;
        }

        match pool.acquire_freshest_for_read() {
            Some(slot) => {
                classifier.classify(&slot);
                drop(slot);
                std::thread::sleep(timing.classifier_cycle());
            }
            None => {
                if pool.committed() > 0 {
                    log::warn!("No spectral result available");
                } else {
                    log::debug!("No spectral result available yet");
                }
                std::thread::sleep(timing.classifier_retry());
            }
        }
    }
}
