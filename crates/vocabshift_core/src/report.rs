use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub path: String,
    pub replacements: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Audit record of one migration run. Built once after the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migration_date: String,
    #[serde(default)]
    pub migration_type: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(alias = "files_processed")]
    pub total_files_scanned: usize,
    #[serde(default, alias = "files_with_supabase")]
    pub files_with_markers: usize,
    pub files_modified: usize,
    pub total_replacements: usize,
    pub modified_files: Vec<ModifiedFile>,
    #[serde(default)]
    pub skipped_files: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl MigrationReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize migration report")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse migration report {}", path.display()))
    }

    /// Paths of every file this run modified, in report order.
    pub fn modified_paths(&self) -> Vec<PathBuf> {
        self.modified_files
            .iter()
            .map(|file| PathBuf::from(&file.path))
            .collect()
    }

    pub fn sum_of_replacements(&self) -> usize {
        self.modified_files
            .iter()
            .map(|file| file.replacements)
            .sum()
    }
}

pub const REPORT_FILE_SUFFIX: &str = "_migration_report.json";

pub fn default_report_path(report_dir: &Path, profile_name: &str) -> PathBuf {
    report_dir.join(format!("{profile_name}{REPORT_FILE_SUFFIX}"))
}

/// Reports are never migration targets, whichever directory they land in.
pub fn is_report_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(REPORT_FILE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn loads_reports_written_with_legacy_keys() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("firebase_migration_report.json");
        fs::write(
            &path,
            r#"{
  "migration_date": "2025-07-16T21:13:51.123456",
  "total_files_scanned": 3,
  "files_with_supabase": 3,
  "files_modified": 2,
  "total_replacements": 7,
  "modified_files": [
    {"path": "/srv/app/src/a.ts", "replacements": 5},
    {"path": "/srv/app/src/b.ts", "replacements": 2}
  ],
  "skipped_files": ["/srv/app/src/c.ts"],
  "errors": []
}"#,
        )
        .expect("write");

        let report = MigrationReport::load(&path).expect("load");
        assert_eq!(report.files_with_markers, 3);
        assert_eq!(report.sum_of_replacements(), report.total_replacements);
        assert_eq!(
            report.modified_paths(),
            vec![
                PathBuf::from("/srv/app/src/a.ts"),
                PathBuf::from("/srv/app/src/b.ts")
            ]
        );
    }

    #[test]
    fn accepts_files_processed_alias() {
        let report: MigrationReport = serde_json::from_str(
            r#"{"migration_date": "x", "migration_type": "smart_replacement", "files_processed": 4,
                "files_modified": 0, "total_replacements": 0, "modified_files": [], "errors": []}"#,
        )
        .expect("parse");
        assert_eq!(report.total_files_scanned, 4);
        assert!(report.skipped_files.is_empty());
    }

    #[test]
    fn write_then_load_preserves_backup_paths() {
        let temp = tempdir().expect("tempdir");
        let report = MigrationReport {
            migration_date: "2025-07-16T21:13:51".to_string(),
            migration_type: "plain".to_string(),
            dry_run: false,
            total_files_scanned: 1,
            files_with_markers: 1,
            files_modified: 1,
            total_replacements: 2,
            modified_files: vec![ModifiedFile {
                path: "a.ts".to_string(),
                replacements: 2,
                backup_path: Some("backup/a_supabase_backup_20250716_211351.ts".to_string()),
            }],
            skipped_files: Vec::new(),
            errors: Vec::new(),
        };
        let path = default_report_path(&temp.path().join("logs"), "plain");
        report.write(&path).expect("write");
        assert!(path.ends_with("logs/plain_migration_report.json"));
        assert!(is_report_file(&path));
        assert!(is_report_file(Path::new("firebase_migration_report.json")));
        assert!(!is_report_file(Path::new("migration_report.md")));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(json["modified_files"][0]["replacements"], 2);
        assert_eq!(MigrationReport::load(&path).expect("load"), report);
    }
}
