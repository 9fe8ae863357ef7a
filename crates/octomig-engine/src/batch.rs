use crate::error::MigrateError;
use crate::executor::Executor;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Result-directory files that are not benchmark results.
const EXCLUDED_FILES: &[&str] = &["benchmarks.json", "machine.json"];

/// What happened to a batch of result files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub migrated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Walk a results directory and migrate every result file in place.
///
/// Unreadable or malformed files are skipped with a warning; registry and
/// IO failures abort the batch. Files already at the target are left
/// untouched on disk.
pub fn migrate_results_dir(
    results_dir: &Path,
    executor: &Executor,
) -> Result<BatchReport, MigrateError> {
    let mut report = BatchReport::default();

    for entry in WalkDir::new(results_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || EXCLUDED_FILES.contains(&name) {
            continue;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("cannot read {}, skipping: {err}", path.display());
                report.skipped += 1;
                continue;
            }
        };
        let parsed: Value = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("cannot parse {}, skipping: {err}", path.display());
                report.skipped += 1;
                continue;
            }
        };

        match executor.migrate_file(path, &parsed) {
            Ok(migrated) if migrated == parsed => {
                report.unchanged += 1;
            }
            Ok(migrated) => {
                write_json_atomic(path, &migrated)?;
                info!("migrated {} to {}", path.display(), executor.target_name());
                report.migrated += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("cannot migrate {}, skipping: {err}", path.display());
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

/// Write to a sibling temp file, fsync, then rename over the original so a
/// crash mid-write never leaves a truncated result file.
fn write_json_atomic(path: &Path, value: &Value) -> Result<(), std::io::Error> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("result.json");
    let tmp = path.with_file_name(format!(
        ".{name}.tmp.{}.{}",
        std::process::id(),
        chrono::Utc::now().timestamp_micros()
    ));
    let mut file = File::create(&tmp)?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}
