use crate::cli::{self, AnalyzeArgs};
use crate::exit_codes;
use crate::output;
use motionwatch_rs::{AnalysisSummary, CsvReplaySource, MonitorConfig, OfflineAnalyzer};

pub fn execute(args: AnalyzeArgs) -> i32 {
    let config = match cli::monitor_config(args.cycle_ms, None) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let summary = match analyze_file(&args.file, config, args.reports) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    log::info!(
        "{}: {} samples, {} cycles, final status {:?}",
        args.file,
        summary.samples,
        summary.cycles,
        summary.final_status
    );

    match output::emit(&summary, args.compact, args.output.as_deref()) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}

/// Run the offline analyzer over one CSV recording.
pub fn analyze_file(
    path: &str,
    config: MonitorConfig,
    keep_reports: bool,
) -> Result<AnalysisSummary, String> {
    let mut source = CsvReplaySource::open(path).map_err(|e| e.to_string())?;
    let timeout = config.timing.sensor_timeout();

    let mut analyzer = OfflineAnalyzer::new(config)
        .map_err(|e| e.to_string())?
        .with_reports(keep_reports)
        .with_source_name(path);
    analyzer
        .consume(&mut source, timeout)
        .map_err(|e| format!("{}: {}", path, e))?;

    let summary = analyzer.finish();
    if summary.samples == 0 {
        return Err(format!("{}: recording contains no readable samples", path));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn recording(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,ax,ay,az,gx,gy,gz").unwrap();
        for i in 0..rows {
            let t = i as f32 / 52.0;
            let g = 3.0 * (2.0 * std::f32::consts::PI * 4.0 * t).sin();
            writeln!(file, "{},0,0,9.81,{},{},{}", t, g, g, g).unwrap();
        }
        file
    }

    #[test]
    fn test_analyze_file_detects_tremor() {
        let file = recording(400);
        let summary = analyze_file(file.path().to_str().unwrap(), MonitorConfig::default(), false)
            .unwrap();
        assert_eq!(summary.samples, 400);
        assert!(summary.final_status.tremor);
    }

    #[test]
    fn test_empty_recording_is_an_error() {
        let file = recording(0);
        let err = analyze_file(file.path().to_str().unwrap(), MonitorConfig::default(), false)
            .unwrap_err();
        assert!(err.contains("no readable samples"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(analyze_file("/nonexistent.csv", MonitorConfig::default(), false).is_err());
    }
}
