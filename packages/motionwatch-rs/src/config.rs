//! Pipeline configuration.
//!
//! Every tunable lives here as a `const` default. The structs below only
//! group those defaults so that each component receives its parameters
//! explicitly (and tests can shrink timings) instead of reading globals.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Analysis window length in samples (FFT length).
pub const WINDOW_SIZE: usize = 256;
/// IMU output data rate in Hz.
pub const SAMPLE_RATE_HZ: f32 = 52.0;
/// Number of spectral result slots shared by writer and reader.
pub const RESULT_POOL_SIZE: usize = 2;

pub const TREMOR_BAND_HZ: (f32, f32) = (3.0, 5.0);
pub const DYSKINESIA_BAND_HZ: (f32, f32) = (5.0, 7.0);
pub const CONTEXT_BAND_HZ: (f32, f32) = (3.0, 12.0);
pub const FOG_FREEZE_BAND_HZ: (f32, f32) = (3.0, 8.0);
pub const FOG_LOCOMOTION_BAND_HZ: (f32, f32) = (0.5, 3.0);

pub const RELATIVE_POWER_THRESHOLD: f32 = 0.75;
pub const MIN_PEAK_POWER_THRESHOLD: f32 = 1.0;
pub const FREEZE_INDEX_THRESHOLD: f32 = 2.0;
pub const MIN_FREEZE_POWER: f32 = 0.05;
pub const LOCOMOTION_POWER_THRESHOLD: f32 = 0.5;
/// Consecutive high-locomotion cycles needed to enter the walking state.
pub const WALKING_STATE_HISTORY: u32 = 5;
pub const DEBOUNCE_THRESHOLD: u8 = 2;
/// Guards band-power ratios against a silent denominator.
pub const POWER_EPSILON: f32 = 1e-6;

pub const SAMPLE_QUEUE_CAPACITY: usize = 10;
pub const SENSOR_TIMEOUT_MS: u64 = 1000;
pub const SPECTRAL_IDLE_MS: u64 = 1;
pub const CLASSIFIER_CYCLE_MS: u64 = 100;
pub const CLASSIFIER_RETRY_MS: u64 = 1;

/// A closed frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lo_hz: f32,
    pub hi_hz: f32,
}

impl Band {
    pub const fn new(lo_hz: f32, hi_hz: f32) -> Self {
        Self { lo_hz, hi_hz }
    }

    pub fn contains(&self, freq_hz: f32) -> bool {
        freq_hz >= self.lo_hz && freq_hz <= self.hi_hz
    }
}

impl From<(f32, f32)> for Band {
    fn from((lo_hz, hi_hz): (f32, f32)) -> Self {
        Self { lo_hz, hi_hz }
    }
}

/// Window length, sample rate and pool size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    pub window_size: usize,
    pub sample_rate_hz: f32,
    pub pool_size: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            sample_rate_hz: SAMPLE_RATE_HZ,
            pool_size: RESULT_POOL_SIZE,
        }
    }
}

impl SpectralConfig {
    /// Number of single-sided bins kept per channel.
    pub fn bins(&self) -> usize {
        self.window_size / 2
    }

    /// Width of one bin in Hz (`Fs / N`).
    pub fn resolution_hz(&self) -> f32 {
        self.sample_rate_hz / self.window_size as f32
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate_hz / 2.0
    }

    /// Normalization applied to every power bin: `1 / (N * Fs)`.
    pub fn power_scale(&self) -> f32 {
        1.0 / (self.window_size as f32 * self.sample_rate_hz)
    }
}

/// Band edges and decision thresholds for the three detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub tremor_band: Band,
    pub dyskinesia_band: Band,
    pub context_band: Band,
    pub fog_freeze_band: Band,
    pub fog_locomotion_band: Band,
    pub relative_power_threshold: f32,
    pub min_peak_power_threshold: f32,
    pub freeze_index_threshold: f32,
    pub min_freeze_power: f32,
    pub locomotion_power_threshold: f32,
    pub walking_history: u32,
    pub debounce_threshold: u8,
    pub epsilon: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tremor_band: TREMOR_BAND_HZ.into(),
            dyskinesia_band: DYSKINESIA_BAND_HZ.into(),
            context_band: CONTEXT_BAND_HZ.into(),
            fog_freeze_band: FOG_FREEZE_BAND_HZ.into(),
            fog_locomotion_band: FOG_LOCOMOTION_BAND_HZ.into(),
            relative_power_threshold: RELATIVE_POWER_THRESHOLD,
            min_peak_power_threshold: MIN_PEAK_POWER_THRESHOLD,
            freeze_index_threshold: FREEZE_INDEX_THRESHOLD,
            min_freeze_power: MIN_FREEZE_POWER,
            locomotion_power_threshold: LOCOMOTION_POWER_THRESHOLD,
            walking_history: WALKING_STATE_HISTORY,
            debounce_threshold: DEBOUNCE_THRESHOLD,
            epsilon: POWER_EPSILON,
        }
    }
}

/// Queue depth, timeouts and sleep quanta of the pipeline threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub sample_queue_capacity: usize,
    pub sensor_timeout_ms: u64,
    pub spectral_idle_ms: u64,
    pub classifier_cycle_ms: u64,
    pub classifier_retry_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_queue_capacity: SAMPLE_QUEUE_CAPACITY,
            sensor_timeout_ms: SENSOR_TIMEOUT_MS,
            spectral_idle_ms: SPECTRAL_IDLE_MS,
            classifier_cycle_ms: CLASSIFIER_CYCLE_MS,
            classifier_retry_ms: CLASSIFIER_RETRY_MS,
        }
    }
}

impl TimingConfig {
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn spectral_idle(&self) -> Duration {
        Duration::from_millis(self.spectral_idle_ms)
    }

    pub fn classifier_cycle(&self) -> Duration {
        Duration::from_millis(self.classifier_cycle_ms)
    }

    pub fn classifier_retry(&self) -> Duration {
        Duration::from_millis(self.classifier_retry_ms)
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub spectral: SpectralConfig,
    pub detector: DetectorConfig,
    pub timing: TimingConfig,
}

impl MonitorConfig {
    /// Samples between two classification cycles of the offline analyzer.
    pub fn samples_per_cycle(&self) -> usize {
        let samples = self.timing.classifier_cycle_ms as f32 * self.spectral.sample_rate_hz / 1000.0;
        (samples.round() as usize).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let spectral = &self.spectral;
        if spectral.window_size < 8 || !spectral.window_size.is_power_of_two() {
            return Err(MonitorError::InvalidConfig(format!(
                "window_size must be a power of two >= 8, got {}",
                spectral.window_size
            )));
        }
        if !(spectral.sample_rate_hz.is_finite() && spectral.sample_rate_hz > 0.0) {
            return Err(MonitorError::InvalidConfig(format!(
                "sample_rate_hz must be positive, got {}",
                spectral.sample_rate_hz
            )));
        }
        if spectral.pool_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }

        let detector = &self.detector;
        let nyquist = spectral.nyquist_hz();
        for (name, band) in [
            ("tremor_band", detector.tremor_band),
            ("dyskinesia_band", detector.dyskinesia_band),
            ("context_band", detector.context_band),
            ("fog_freeze_band", detector.fog_freeze_band),
            ("fog_locomotion_band", detector.fog_locomotion_band),
        ] {
            if band.lo_hz < 0.0 || band.lo_hz > band.hi_hz {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} is inverted or negative: [{}, {}] Hz",
                    name, band.lo_hz, band.hi_hz
                )));
            }
            if band.hi_hz >= nyquist {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} upper edge {} Hz is not below Nyquist ({} Hz)",
                    name, band.hi_hz, nyquist
                )));
            }
        }
        if detector.debounce_threshold == 0 {
            return Err(MonitorError::InvalidConfig(
                "debounce_threshold must be at least 1".to_string(),
            ));
        }
        if detector.walking_history == 0 {
            return Err(MonitorError::InvalidConfig(
                "walking_history must be at least 1".to_string(),
            ));
        }

        if self.timing.sample_queue_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "sample_queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
