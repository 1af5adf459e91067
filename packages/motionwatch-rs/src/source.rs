//! Sample sources feeding the acquisition loop.
//!
//! [`SampleSource`] is the single seam between the pipeline and whatever
//! produces IMU data. Two implementations ship with the crate:
//!
//! - [`SyntheticSource`] generates sums of sinusoids per channel, optionally
//!   paced in (scaled) real time.
//! - [`CsvReplaySource`] replays a recording with the header
//!   `timestamp,ax,ay,az,gx,gy,gz` (timestamp in seconds).

use crate::error::{MonitorError, Result, SourceError};
use crate::types::{Channel, Sample, Sensor};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

pub trait SampleSource: Send {
    /// Block for the next sample, for at most `timeout`.
    fn next_sample(&mut self, timeout: Duration) -> std::result::Result<Sample, SourceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self, timeout: Duration) -> std::result::Result<Sample, SourceError> {
        (**self).next_sample(timeout)
    }
}

/// Sleep until `deadline`, or fail with a timeout if it lies further away.
fn wait_until(deadline: Instant, timeout: Duration) -> std::result::Result<(), SourceError> {
    let now = Instant::now();
    if deadline <= now {
        return Ok(());
    }
    let wait = deadline - now;
    if wait > timeout {
        std::thread::sleep(timeout);
        return Err(SourceError::Timeout(
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        ));
    }
    std::thread::sleep(wait);
    Ok(())
}

/// One sinusoidal component of a synthetic channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub freq_hz: f32,
    pub amplitude: f32,
    /// Phase in radians
    #[serde(default)]
    pub phase: f32,
}

impl Tone {
    pub fn new(freq_hz: f32, amplitude: f32) -> Self {
        Self {
            freq_hz,
            amplitude,
            phase: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ChannelSignal {
    offset: f32,
    tones: Vec<Tone>,
}

impl ChannelSignal {
    fn value_at(&self, t: f64) -> f32 {
        let sum: f64 = self
            .tones
            .iter()
            .map(|tone| {
                tone.amplitude as f64 * (2.0 * PI * tone.freq_hz as f64 * t + tone.phase as f64).sin()
            })
            .sum();
        self.offset + sum as f32
    }
}

/// Deterministic signal generator.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    sample_rate_hz: f32,
    signals: [ChannelSignal; 6],
    limit: Option<u64>,
    speed: Option<f32>,
    index: u64,
    started: Option<Instant>,
}

impl SyntheticSource {
    /// A silent, unpaced, endless source.
    pub fn new(sample_rate_hz: f32) -> Self {
        Self {
            sample_rate_hz,
            signals: Default::default(),
            limit: None,
            speed: None,
            index: 0,
            started: None,
        }
    }

    /// `amplitude * sin(2*pi*freq*t)` on all three gyroscope axes.
    pub fn tremor(sample_rate_hz: f32, freq_hz: f32, amplitude: f32) -> Self {
        Channel::ALL
            .into_iter()
            .filter(|c| c.sensor == Sensor::Gyro)
            .fold(Self::new(sample_rate_hz), |source, channel| {
                source.with_tone(channel, Tone::new(freq_hz, amplitude))
            })
    }

    pub fn with_tone(mut self, channel: Channel, tone: Tone) -> Self {
        self.signals[channel.index()].tones.push(tone);
        self
    }

    pub fn with_offset(mut self, channel: Channel, offset: f32) -> Self {
        self.signals[channel.index()].offset = offset;
        self
    }

    /// Report [`SourceError::Exhausted`] after `samples` samples.
    pub fn with_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    /// Deliver samples in real time, sped up by `speed` (1.0 = `Fs`).
    pub fn paced(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn samples_generated(&self) -> u64 {
        self.index
    }
}

impl SampleSource for SyntheticSource {
    fn next_sample(&mut self, timeout: Duration) -> std::result::Result<Sample, SourceError> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return Err(SourceError::Exhausted);
        }

        let t = self.index as f64 / self.sample_rate_hz as f64;

        if let Some(speed) = self.speed {
            let started = *self.started.get_or_insert_with(Instant::now);
            let deadline = started + Duration::from_secs_f64(t / speed as f64);
            wait_until(deadline, timeout)?;
        }

        let mut values = [0.0f32; 6];
        for (value, signal) in values.iter_mut().zip(&self.signals) {
            *value = signal.value_at(t);
        }
        self.index += 1;

        Ok(Sample::new(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            Duration::from_secs_f64(t),
        ))
    }
}

/// One row of a CSV recording
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CsvRow {
    pub timestamp: f64,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl CsvRow {
    fn into_sample(self) -> std::result::Result<Sample, SourceError> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(SourceError::ReadFailed(format!(
                "invalid timestamp {}",
                self.timestamp
            )));
        }
        Ok(Sample::new(
            [self.ax, self.ay, self.az],
            [self.gx, self.gy, self.gz],
            Duration::from_secs_f64(self.timestamp),
        ))
    }
}

impl From<&Sample> for CsvRow {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp.as_secs_f64(),
            ax: sample.accel[0],
            ay: sample.accel[1],
            az: sample.accel[2],
            gx: sample.gyro[0],
            gy: sample.gyro[1],
            gz: sample.gyro[2],
        }
    }
}

/// Replays a CSV recording, optionally at (scaled) recorded speed.
pub struct CsvReplaySource<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, CsvRow>,
    speed: Option<f32>,
    origin: Option<(Instant, Duration)>,
    line: u64,
}

impl CsvReplaySource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MonitorError::Source(SourceError::ReadFailed(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        log::debug!("Replaying recording {}", path.display());
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvReplaySource<R> {
    pub fn from_reader(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self {
            rows: reader.into_deserialize(),
            speed: None,
            origin: None,
            line: 1,
        }
    }

    /// Deliver rows at their recorded timestamps, sped up by `speed`.
    pub fn paced(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }
}

impl<R: Read + Send> SampleSource for CsvReplaySource<R> {
    fn next_sample(&mut self, timeout: Duration) -> std::result::Result<Sample, SourceError> {
        let row = match self.rows.next() {
            None => return Err(SourceError::Exhausted),
            Some(row) => row,
        };
        self.line += 1;

        let sample = row
            .map_err(|e| SourceError::ReadFailed(format!("line {}: {}", self.line, e)))?
            .into_sample()
            .map_err(|e| SourceError::ReadFailed(format!("line {}: {}", self.line, e)))?;

        if let Some(speed) = self.speed {
            let (started, first) = *self
                .origin
                .get_or_insert_with(|| (Instant::now(), sample.timestamp));
            let offset = sample.timestamp.saturating_sub(first).as_secs_f64() / speed as f64;
            wait_until(started + Duration::from_secs_f64(offset), timeout)?;
        }

        Ok(sample)
    }
}

/// Write `samples` as a CSV recording readable by [`CsvReplaySource`].
pub fn write_csv<P: AsRef<Path>>(path: P, samples: &[Sample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .map_err(|e| MonitorError::IoError(std::io::Error::other(e)))?;
    for sample in samples {
        writer
            .serialize(CsvRow::from(sample))
            .map_err(|e| MonitorError::IoError(std::io::Error::other(e)))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Axis;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_synthetic_tremor_on_gyro_only() {
        let mut source = SyntheticSource::tremor(52.0, 4.0, 3.0);
        let samples: Vec<Sample> = (0..52).map(|_| source.next_sample(TIMEOUT).unwrap()).collect();

        assert!(samples.iter().all(|s| s.accel == [0.0; 3]));
        let peak = samples.iter().map(|s| s.gyro[0].abs()).fold(0.0f32, f32::max);
        assert!(peak > 2.5 && peak <= 3.0);
        assert!(samples.iter().all(|s| s.gyro[0] == s.gyro[2]));
        assert_eq!(samples[26].timestamp, Duration::from_millis(500));
    }

    #[test]
    fn test_synthetic_offset_and_limit() {
        let accel_z = Channel::new(Sensor::Accel, Axis::Z);
        let mut source = SyntheticSource::new(10.0)
            .with_offset(accel_z, 9.81)
            .with_limit(3);

        for _ in 0..3 {
            let sample = source.next_sample(TIMEOUT).unwrap();
            assert_eq!(sample.accel[2], 9.81);
        }
        assert_eq!(source.next_sample(TIMEOUT), Err(SourceError::Exhausted));
        assert_eq!(source.samples_generated(), 3);
    }

    #[test]
    fn test_slow_paced_source_times_out() {
        let mut source = SyntheticSource::new(52.0).paced(0.001);
        assert!(source.next_sample(Duration::from_millis(10)).is_ok());
        assert_eq!(
            source.next_sample(Duration::from_millis(10)),
            Err(SourceError::Timeout(10))
        );
    }

    #[test]
    fn test_csv_replay() {
        let data = "timestamp,ax,ay,az,gx,gy,gz\n\
                    0.0,0.1,0.2,9.8,1.0,2.0,3.0\n\
                    0.02,0.1,0.2,9.8,-1.0,-2.0,-3.0\n";
        let mut source = CsvReplaySource::from_reader(data.as_bytes());

        let first = source.next_sample(TIMEOUT).unwrap();
        assert_eq!(first.accel, [0.1, 0.2, 9.8]);
        assert_eq!(first.gyro, [1.0, 2.0, 3.0]);

        let second = source.next_sample(TIMEOUT).unwrap();
        assert_eq!(second.timestamp, Duration::from_secs_f64(0.02));
        assert_eq!(second.gyro, [-1.0, -2.0, -3.0]);

        assert_eq!(source.next_sample(TIMEOUT), Err(SourceError::Exhausted));
    }

    #[test]
    fn test_csv_malformed_row_is_transient() {
        let data = "timestamp,ax,ay,az,gx,gy,gz\n\
                    0.0,0,0,0,0,0,0\n\
                    0.02,oops,0,0,0,0,0\n\
                    0.04,1,1,1,1,1,1\n";
        let mut source = CsvReplaySource::from_reader(data.as_bytes());

        assert!(source.next_sample(TIMEOUT).is_ok());
        assert!(matches!(
            source.next_sample(TIMEOUT),
            Err(SourceError::ReadFailed(msg)) if msg.contains("line 3")
        ));
        assert_eq!(source.next_sample(TIMEOUT).unwrap().accel, [1.0; 3]);
    }

    #[test]
    fn test_csv_negative_timestamp_rejected() {
        let data = "timestamp,ax,ay,az,gx,gy,gz\n-1.0,0,0,0,0,0,0\n";
        let mut source = CsvReplaySource::from_reader(data.as_bytes());
        assert!(matches!(
            source.next_sample(TIMEOUT),
            Err(SourceError::ReadFailed(_))
        ));
    }

    #[test]
    fn test_write_then_replay_file() {
        let mut source = SyntheticSource::tremor(52.0, 4.0, 1.0).with_limit(10);
        let samples: Vec<Sample> = (0..10).map(|_| source.next_sample(TIMEOUT).unwrap()).collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        write_csv(&path, &samples).unwrap();

        let mut replay = CsvReplaySource::open(&path).unwrap();
        for expected in &samples {
            let sample = replay.next_sample(TIMEOUT).unwrap();
            assert_eq!(sample.gyro, expected.gyro);
        }
        assert_eq!(replay.next_sample(TIMEOUT), Err(SourceError::Exhausted));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(CsvReplaySource::open("/nonexistent/rec.csv").is_err());
    }

    #[test]
    fn test_header_only_file_is_exhausted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,ax,ay,az,gx,gy,gz").unwrap();
        let mut source = CsvReplaySource::open(file.path()).unwrap();
        assert_eq!(source.next_sample(TIMEOUT), Err(SourceError::Exhausted));
    }
}
