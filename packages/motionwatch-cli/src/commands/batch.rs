use crate::cli::{self, BatchArgs};
use crate::commands::analyze::analyze_file;
use crate::exit_codes;
use crate::output;
use motionwatch_rs::AnalysisSummary;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

pub fn execute(args: BatchArgs) -> i32 {
    let files = match resolve_files(&args) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching files found");
        return exit_codes::INPUT_ERROR;
    }

    let config = match cli::monitor_config(args.cycle_ms, None) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if let Some(ref dir) = args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Error: Failed to create output directory '{}': {}", dir, e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    let total = files.len();
    let start_time = Instant::now();
    if !args.quiet {
        eprintln!("Analyzing {} file(s)...", total);
    }

    let results: Vec<(String, Result<AnalysisSummary, String>)> = files
        .into_par_iter()
        .map(|file| {
            let result = analyze_file(&file, config.clone(), false);
            (file, result)
        })
        .collect();

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (i, (file_path, result)) in results.iter().enumerate() {
        if !args.quiet {
            eprintln!("[{}/{}] {}", i + 1, total, file_path);
        }

        let written = result
            .as_ref()
            .map_err(|e| format!("  Analysis failed: {}", e))
            .and_then(|summary| write_summary(summary, file_path, &args));

        match written {
            Ok(()) => succeeded += 1,
            Err(msg) => {
                eprintln!("{}", msg);
                failed += 1;
                if !args.continue_on_error {
                    break;
                }
            }
        }
    }

    if !args.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            start_time.elapsed().as_secs_f64()
        );
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

fn write_summary(summary: &AnalysisSummary, file_path: &str, args: &BatchArgs) -> Result<(), String> {
    match args.output_dir {
        Some(ref dir) => {
            let stem = Path::new(file_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            let out_path = Path::new(dir).join(format!("{}_summary.json", stem));
            output::emit(summary, args.compact, out_path.to_str())
                .map_err(|e| format!("  Error writing output: {}", e))
        }
        None => output::write_json_line(summary)
            .map_err(|e| format!("  Error writing to stdout: {}", e)),
    }
}

fn resolve_files(args: &BatchArgs) -> Result<Vec<String>, String> {
    if let Some(ref pattern) = args.glob {
        resolve_glob(pattern)
    } else if let Some(ref files) = args.files {
        Ok(files.clone())
    } else {
        Err("One of --glob or --files must be specified".to_string())
    }
}

fn resolve_glob(pattern: &str) -> Result<Vec<String>, String> {
    let paths = glob::glob(pattern)
        .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;

    let mut files: Vec<String> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => {
                if let Some(s) = path.to_str() {
                    files.push(s.to_string());
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("glob error: {}", e),
        }
    }
    files.sort();
    Ok(files)
}
