use crate::cli::{self, ReplayArgs};
use crate::exit_codes;
use crate::output;
use motionwatch_rs::{Condition, CsvReplaySource, Monitor, MonitorState, MonitorStatus};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Serialize)]
struct StatusChange {
    elapsed_ms: u64,
    condition: Condition,
    active: bool,
    status: MonitorStatus,
}

fn status_changes(
    previous: MonitorStatus,
    current: MonitorStatus,
    elapsed: Duration,
) -> Vec<StatusChange> {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    Condition::ALL
        .into_iter()
        .filter(|&c| previous.get(c) != current.get(c))
        .map(|condition| StatusChange {
            elapsed_ms,
            condition,
            active: current.get(condition),
            status: current,
        })
        .collect()
}

fn emit_changes(changes: &[StatusChange]) -> Result<(), String> {
    changes.iter().try_for_each(output::write_json_line)
}

pub fn execute(args: ReplayArgs) -> i32 {
    if let Err(msg) = cli::validate_speed(args.speed) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }
    let config = match cli::monitor_config(args.cycle_ms, Some(args.timeout_ms)) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let source = match CsvReplaySource::open(&args.file) {
        Ok(s) => s.paced(args.speed),
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let poll = config.timing.classifier_cycle();
    let handle = match Monitor::start(config, source) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let board = handle.status();
    let started = Instant::now();
    let mut last = board.snapshot();

    loop {
        let finished = handle.wait_timeout(poll).is_some();
        let current = board.snapshot();
        if let Err(e) = emit_changes(&status_changes(last, current, started.elapsed())) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
        last = current;
        if finished {
            break;
        }
    }

    let outcome = match handle.wait() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    // The classifier runs one last cycle at the end of the input
    if let Err(e) = emit_changes(&status_changes(last, outcome.status, started.elapsed())) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    if let Err(e) = output::write_json_line(&outcome) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    match outcome.state {
        MonitorState::Fatal(cause) => {
            eprintln!("Error: monitor stopped on {}", cause);
            exit_codes::FATAL_SHUTDOWN
        }
        _ => exit_codes::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changes_lists_only_flipped_conditions() {
        let previous = MonitorStatus::default();
        let current = MonitorStatus {
            tremor: true,
            dyskinesia: false,
            fog: true,
        };
        let changes = status_changes(previous, current, Duration::from_millis(1500));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].condition, Condition::Tremor);
        assert_eq!(changes[1].condition, Condition::FreezingOfGait);
        assert!(changes.iter().all(|c| c.active && c.elapsed_ms == 1500));
    }

    #[test]
    fn test_elapsed_saturates_instead_of_wrapping() {
        let current = MonitorStatus {
            tremor: true,
            ..MonitorStatus::default()
        };
        let changes = status_changes(MonitorStatus::default(), current, Duration::MAX);
        assert_eq!(changes[0].elapsed_ms, u64::MAX);
    }

    #[test]
    fn test_no_changes_for_equal_status() {
        let status = MonitorStatus::default();
        assert!(status_changes(status, status, Duration::ZERO).is_empty());
    }
}
