use std::io::Write;
use std::path::Path;

/// Write `json` plus a trailing newline to `output_path`, or to stdout.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => {
            let mut contents = String::with_capacity(json.len() + 1);
            contents.push_str(json);
            contents.push('\n');
            std::fs::write(Path::new(path), contents)
                .map_err(|e| format!("Failed to write output file '{}': {}", path, e))
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json)
                .and_then(|_| handle.flush())
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Serialize and write in one step, for commands with a single result.
pub fn emit<T: serde::Serialize>(
    value: &T,
    compact: bool,
    output_path: Option<&str>,
) -> Result<(), String> {
    let json = to_json(value, compact)?;
    write_output(&json, output_path)
}

/// One compact JSON line on stdout (JSONL streams).
pub fn write_json_line<T: serde::Serialize>(value: &T) -> Result<(), String> {
    emit(value, true, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json_compact_and_pretty() {
        let value = serde_json::json!({ "tremor": true });
        assert_eq!(to_json(&value, true).unwrap(), r#"{"tremor":true}"#);
        assert!(to_json(&value, false).unwrap().contains('\n'));
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_output("{}", path.to_str()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_write_output_to_missing_dir_fails() {
        let err = write_output("{}", Some("/nonexistent/dir/out.json")).unwrap_err();
        assert!(err.contains("Failed to write output file"));
    }
}
