//! Offline analysis.
//!
//! Runs the spectral engine and the classifier in lock-step on the calling
//! thread, so a recording always yields the same reports. The summary adds
//! per-condition counts and the debounced transitions.

use crate::classifier::{ClassificationReport, Classifier};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result, SourceError};
use crate::result_pool::SpectralResult;
use crate::source::SampleSource;
use crate::spectral::SpectralEngine;
use crate::types::{Condition, MonitorStatus, Sample};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A debounced status change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub cycle: u64,
    pub timestamp_s: f64,
    pub condition: Condition,
    pub active: bool,
}

/// Debounced cycles per condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCounts {
    pub tremor: u64,
    pub dyskinesia: u64,
    pub fog: u64,
}

impl ConditionCounts {
    fn add(&mut self, status: MonitorStatus) {
        self.tremor += status.tremor as u64;
        self.dyskinesia += status.dyskinesia as u64;
        self.fog += status.fog as u64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub window_size: usize,
    pub sample_rate_hz: f32,
    pub samples: u64,
    pub skipped_samples: u64,
    pub cycles: u64,
    /// Cycles with the debounced flag set
    pub detected_cycles: ConditionCounts,
    /// Cycles with the raw (pre-debounce) decision set
    pub raw_detections: ConditionCounts,
    pub final_status: MonitorStatus,
    pub dominant: Option<Condition>,
    pub transitions: Vec<TransitionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<ClassificationReport>>,
}

/// Single-threaded, deterministic driver of the spectral engine and the
/// classifier.
///
/// Classification runs once the windows are primed and then every
/// `samples_per_cycle` samples, so the result does not depend on thread
/// timing.
pub struct OfflineAnalyzer {
    config: MonitorConfig,
    engine: SpectralEngine,
    result: SpectralResult,
    classifier: Classifier,
    samples_per_cycle: u64,
    keep_reports: bool,
    reports: Vec<ClassificationReport>,
    transitions: Vec<TransitionEvent>,
    detected_cycles: ConditionCounts,
    raw_detections: ConditionCounts,
    skipped_samples: u64,
    source: Option<String>,
}

impl OfflineAnalyzer {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let engine = SpectralEngine::new(&config.spectral)?;
        let result = SpectralResult::new(config.spectral.bins())?;
        let classifier = Classifier::new(&config);
        let samples_per_cycle = config.samples_per_cycle() as u64;

        Ok(Self {
            config,
            engine,
            result,
            classifier,
            samples_per_cycle,
            keep_reports: false,
            reports: Vec::new(),
            transitions: Vec::new(),
            detected_cycles: ConditionCounts::default(),
            raw_detections: ConditionCounts::default(),
            skipped_samples: 0,
            source: None,
        })
    }

    /// Keep every cycle report in the summary.
    pub fn with_reports(mut self, keep: bool) -> Self {
        self.keep_reports = keep;
        self
    }

    /// Label the summary with where the samples came from.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }

    pub fn status(&self) -> MonitorStatus {
        self.classifier.status()
    }

    /// Fold one sample in, running a classification cycle when one is due.
    pub fn push(&mut self, sample: &Sample) -> Result<Option<ClassificationReport>> {
        self.engine.push_sample(sample);
        if !self.engine.is_primed() {
            return Ok(None);
        }

        let since_primed = self.engine.samples_folded() - self.config.spectral.window_size as u64;
        if since_primed % self.samples_per_cycle != 0 {
            return Ok(None);
        }

        self.engine.compute_into(&mut self.result)?;
        self.result.sequence += 1;

        let previous = self.classifier.status();
        let report = self.classifier.classify(&self.result);
        self.record(previous, &report);

        if self.keep_reports {
            self.reports.push(report.clone());
        }
        Ok(Some(report))
    }

    fn record(&mut self, previous: MonitorStatus, report: &ClassificationReport) {
        self.detected_cycles.add(report.status);
        self.raw_detections.add(report.raw);

        for condition in Condition::ALL {
            let active = report.status.get(condition);
            if active != previous.get(condition) {
                self.transitions.push(TransitionEvent {
                    cycle: report.cycle,
                    timestamp_s: report.timestamp_s,
                    condition,
                    active,
                });
            }
        }
    }

    /// Drain `source` until it is exhausted.
    ///
    /// Unreadable samples are counted and skipped; a timeout is an error.
    pub fn consume<S: SampleSource>(&mut self, source: &mut S, timeout: Duration) -> Result<()> {
        loop {
            match source.next_sample(timeout) {
                Ok(sample) => {
                    self.push(&sample)?;
                }
                Err(SourceError::ReadFailed(reason)) => {
                    log::warn!("Skipping sample: {}", reason);
                    self.skipped_samples += 1;
                }
                Err(SourceError::Exhausted) => return Ok(()),
                Err(e @ SourceError::Timeout(_)) => return Err(MonitorError::Source(e)),
            }
        }
    }

    pub fn finish(self) -> AnalysisSummary {
        let final_status = self.classifier.status();
        AnalysisSummary {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339(),
            source: self.source,
            window_size: self.config.spectral.window_size,
            sample_rate_hz: self.config.spectral.sample_rate_hz,
            samples: self.engine.samples_folded(),
            skipped_samples: self.skipped_samples,
            cycles: self.classifier.cycles(),
            detected_cycles: self.detected_cycles,
            raw_detections: self.raw_detections,
            final_status,
            dominant: final_status.dominant(),
            transitions: self.transitions,
            reports: self.keep_reports.then_some(self.reports),
        }
    }
}

/// Analyze everything `source` yields with a fresh analyzer.
pub fn analyze_source<S: SampleSource>(
    config: MonitorConfig,
    source: &mut S,
    keep_reports: bool,
) -> Result<AnalysisSummary> {
    let timeout = config.timing.sensor_timeout();
    let mut analyzer = OfflineAnalyzer::new(config)?.with_reports(keep_reports);
    analyzer.consume(source, timeout)?;
    Ok(analyzer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;

    #[test]
    fn test_no_cycles_before_priming() {
        let config = MonitorConfig::default();
        let mut source = SyntheticSource::tremor(52.0, 4.0, 3.0).with_limit(255);
        let summary = analyze_source(config, &mut source, false).unwrap();
        assert_eq!(summary.samples, 255);
        assert_eq!(summary.cycles, 0);
        assert!(summary.reports.is_none());
    }

    #[test]
    fn test_cycle_schedule() {
        let config = MonitorConfig::default();
        // Priming cycle at 256, then every 5 samples: 256, 261, 266
        let mut source = SyntheticSource::new(52.0).with_limit(270);
        let summary = analyze_source(config, &mut source, true).unwrap();
        assert_eq!(summary.cycles, 3);
        let reports = summary.reports.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].result_sequence, 3);
    }

    #[test]
    fn test_tremor_transition_is_recorded() {
        let config = MonitorConfig::default();
        let mut source = SyntheticSource::tremor(52.0, 4.0, 3.0).with_limit(256 + 5 * 4);
        let summary = analyze_source(config, &mut source, false).unwrap();

        assert!(summary.final_status.tremor);
        assert_eq!(summary.dominant, Some(Condition::Tremor));
        assert_eq!(summary.transitions.len(), 1);
        let event = summary.transitions[0];
        assert_eq!(event.condition, Condition::Tremor);
        assert!(event.active);
        // Debounce threshold 2: raw on from cycle 1, flag from cycle 2
        assert_eq!(event.cycle, 2);
        assert_eq!(summary.raw_detections.tremor, summary.cycles);
        assert_eq!(summary.detected_cycles.tremor, summary.cycles - 1);
    }

    #[test]
    fn test_silence_detects_nothing() {
        let config = MonitorConfig::default();
        let mut source = SyntheticSource::new(52.0).with_limit(400);
        let summary = analyze_source(config, &mut source, false).unwrap();
        assert!(summary.cycles > 0);
        assert_eq!(summary.final_status, MonitorStatus::default());
        assert!(summary.transitions.is_empty());
        assert_eq!(summary.dominant, None);
    }
}
