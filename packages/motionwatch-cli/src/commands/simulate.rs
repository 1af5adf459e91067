use crate::cli::{self, SimulateArgs};
use crate::exit_codes;
use crate::output;
use motionwatch_rs::config::SAMPLE_RATE_HZ;
use motionwatch_rs::{analyze_source, Channel, MonitorConfig, Sensor, SyntheticSource, Tone};

pub fn execute(args: SimulateArgs) -> i32 {
    let samples = match cli::sample_count(args.seconds) {
        Ok(n) => n,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    if !(args.tremor_hz.is_finite() && args.tremor_hz >= 0.0 && args.tremor_hz < SAMPLE_RATE_HZ / 2.0)
    {
        eprintln!(
            "Error: --tremor-hz must be in [0, {}) Hz, got {}",
            SAMPLE_RATE_HZ / 2.0,
            args.tremor_hz
        );
        return exit_codes::INPUT_ERROR;
    }

    let sensor = Sensor::from(args.signal);
    let mut source = args
        .axis
        .axes()
        .into_iter()
        .fold(SyntheticSource::new(SAMPLE_RATE_HZ), |source, axis| {
            source.with_tone(
                Channel::new(sensor, axis),
                Tone::new(args.tremor_hz, args.amplitude),
            )
        })
        .with_limit(samples);

    log::info!(
        "Simulating {} Hz, amplitude {} on {:?} {:?} for {} s ({} samples)",
        args.tremor_hz,
        args.amplitude,
        args.signal,
        args.axis,
        args.seconds,
        samples
    );

    let mut summary = match analyze_source(MonitorConfig::default(), &mut source, args.reports) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    summary.source = Some(format!(
        "synthetic {} Hz {:?}",
        args.tremor_hz, args.signal
    ));

    match output::emit(&summary, args.compact, None) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
