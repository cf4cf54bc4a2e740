//! Best-effort removal of old generated documents.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Outcome of one sweep. File names only, never full paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// Deletes regular files in `dir` last modified more than `max_age` ago.
///
/// Never fails: unreadable entries and failed deletions are logged and
/// recorded in the report. A missing directory yields an empty report.
pub fn sweep_older_than(dir: &Path, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            log::warn!(
                "Cannot sweep output directory {}: {}",
                crate::sanitize::redact_path(dir),
                e
            );
            return report;
        }
    };

    let now = SystemTime::now();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let modified = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", name, e);
                report.failed.push(name);
                continue;
            }
        };
        let age = match modified {
            Ok(time) => now.duration_since(time).unwrap_or_default(),
            Err(e) => {
                log::warn!("No modification time for {}: {}", name, e);
                report.failed.push(name);
                continue;
            }
        };
        if age <= max_age {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Removed old document {} (age {}s)", name, age.as_secs());
                report.removed.push(name);
            }
            Err(e) => {
                log::warn!("Failed to remove old document {}: {}", name, e);
                report.failed.push(name);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn age_file(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.docx");
        let fresh = dir.path().join("fresh.docx");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&fresh, b"fresh").unwrap();
        age_file(&old, Duration::from_secs(3600));

        let report = sweep_older_than(dir.path(), Duration::from_secs(600));

        assert_eq!(report.removed, vec!["old.docx".to_string()]);
        assert!(report.failed.is_empty());
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let report = sweep_older_than(dir.path(), Duration::ZERO);

        assert!(report.removed.is_empty());
        assert!(dir.path().join("sub").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = sweep_older_than(&dir.path().join("gone"), Duration::ZERO);
        assert_eq!(report, SweepReport::default());
    }
}
