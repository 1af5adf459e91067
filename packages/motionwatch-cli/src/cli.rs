use clap::{Args, Parser, Subcommand, ValueEnum};
use motionwatch_rs::config::{
    MonitorConfig, CLASSIFIER_CYCLE_MS, SAMPLE_RATE_HZ, SENSOR_TIMEOUT_MS,
};
use motionwatch_rs::{Axis, Sensor};

#[derive(Parser)]
#[command(
    name = "motionwatch",
    version,
    about = "Tremor, dyskinesia and freezing-of-gait monitor for IMU recordings",
    long_about = "Runs the motionwatch spectral pipeline over recorded or synthetic IMU data.\n\
                  Recordings are CSV files with the header timestamp,ax,ay,az,gx,gy,gz\n\
                  (timestamp in seconds, one row per sample at the configured rate)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the threaded monitor over a recording and stream status changes
    Replay(ReplayArgs),
    /// Analyze a synthetic sinusoid
    Simulate(SimulateArgs),
    /// Analyze a recording offline and print a summary
    Analyze(AnalyzeArgs),
    /// Analyze many recordings in parallel
    Batch(BatchArgs),
    /// Print the default configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ReplayArgs {
    /// CSV recording
    #[arg(long)]
    pub file: String,

    /// Playback speed relative to the recorded timestamps
    #[arg(long, default_value_t = 1.0)]
    pub speed: f32,

    /// Classifier period in milliseconds
    #[arg(long, default_value_t = CLASSIFIER_CYCLE_MS)]
    pub cycle_ms: u64,

    /// Sensor timeout in milliseconds
    #[arg(long, default_value_t = SENSOR_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AxisArg {
    X,
    Y,
    Z,
    All,
}

impl AxisArg {
    pub fn axes(self) -> Vec<Axis> {
        match self {
            AxisArg::X => vec![Axis::X],
            AxisArg::Y => vec![Axis::Y],
            AxisArg::Z => vec![Axis::Z],
            AxisArg::All => Axis::ALL.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignalArg {
    Gyro,
    Accel,
}

impl From<SignalArg> for Sensor {
    fn from(signal: SignalArg) -> Self {
        match signal {
            SignalArg::Gyro => Sensor::Gyro,
            SignalArg::Accel => Sensor::Accel,
        }
    }
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Frequency of the sinusoid in Hz
    #[arg(long, default_value_t = 4.0)]
    pub tremor_hz: f32,

    /// Peak amplitude (deg/s for gyro, m/s^2 for accel)
    #[arg(long, default_value_t = 3.0)]
    pub amplitude: f32,

    /// Length of the signal in seconds
    #[arg(long, default_value_t = 10.0)]
    pub seconds: f32,

    /// Axes carrying the sinusoid
    #[arg(long, value_enum, default_value_t = AxisArg::All)]
    pub axis: AxisArg,

    /// Sensor carrying the sinusoid
    #[arg(long, value_enum, default_value_t = SignalArg::Gyro)]
    pub signal: SignalArg,

    /// Include every cycle report
    #[arg(long, default_value_t = false)]
    pub reports: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// CSV recording
    #[arg(long)]
    pub file: String,

    /// Include every cycle report
    #[arg(long, default_value_t = false)]
    pub reports: bool,

    /// Classifier period in milliseconds
    #[arg(long, default_value_t = CLASSIFIER_CYCLE_MS)]
    pub cycle_ms: u64,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern selecting recordings (e.g. "data/*.csv")
    #[arg(long, conflicts_with = "files")]
    pub glob: Option<String>,

    /// Explicit list of recordings
    #[arg(long, num_args = 1..)]
    pub files: Option<Vec<String>>,

    /// Classifier period in milliseconds
    #[arg(long, default_value_t = CLASSIFIER_CYCLE_MS)]
    pub cycle_ms: u64,

    /// Write one <stem>_summary.json per input here instead of JSONL on stdout
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Keep going after a failed input
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Compact JSON in output files
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

/// Default configuration with the operational knobs of the CLI applied.
pub fn monitor_config(cycle_ms: u64, timeout_ms: Option<u64>) -> Result<MonitorConfig, String> {
    if cycle_ms == 0 {
        return Err("--cycle-ms must be at least 1".to_string());
    }
    let mut config = MonitorConfig::default();
    config.timing.classifier_cycle_ms = cycle_ms;
    if let Some(timeout_ms) = timeout_ms {
        if timeout_ms == 0 {
            return Err("--timeout-ms must be at least 1".to_string());
        }
        config.timing.sensor_timeout_ms = timeout_ms;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Reject speeds that would stall or overflow the pacing clock.
pub fn validate_speed(speed: f32) -> Result<(), String> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(format!("--speed must be a positive number, got {}", speed))
    }
}

/// Number of samples in `seconds` of signal at the default rate.
pub fn sample_count(seconds: f32) -> Result<u64, String> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(format!("--seconds must be positive, got {}", seconds));
    }
    Ok((seconds * SAMPLE_RATE_HZ).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_config_applies_knobs() {
        let config = monitor_config(50, Some(200)).unwrap();
        assert_eq!(config.timing.classifier_cycle_ms, 50);
        assert_eq!(config.timing.sensor_timeout_ms, 200);
    }

    #[test]
    fn test_monitor_config_rejects_zero() {
        assert!(monitor_config(0, None).is_err());
        assert!(monitor_config(100, Some(0)).is_err());
    }

    #[test]
    fn test_validate_speed() {
        assert!(validate_speed(2.0).is_ok());
        assert!(validate_speed(0.0).is_err());
        assert!(validate_speed(f32::NAN).is_err());
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(10.0).unwrap(), 520);
        assert!(sample_count(-1.0).is_err());
    }

    #[test]
    fn test_axis_arg() {
        assert_eq!(AxisArg::All.axes().len(), 3);
        assert_eq!(AxisArg::Y.axes(), vec![Axis::Y]);
    }
}
