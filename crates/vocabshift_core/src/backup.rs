use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;

pub const BACKUP_DIR_NAME: &str = "backup";

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `<parent>/backup` for the given file.
pub fn backup_dir_for(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    Ok(parent.join(BACKUP_DIR_NAME))
}

/// `<stem>_<marker>_<YYYYMMDD_HHMMSS><ext>`
pub fn backup_file_name(path: &Path, marker: &str, at: NaiveDateTime) -> Result<String> {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
    let suffix = extension_suffix(path);
    Ok(format!(
        "{stem}_{marker}_{}{suffix}",
        at.format(BACKUP_TIMESTAMP_FORMAT)
    ))
}

/// Copy `path` into its sibling backup directory. Returns the backup path.
pub fn create_backup(path: &Path, marker: &str, at: NaiveDateTime) -> Result<PathBuf> {
    let directory = backup_dir_for(path)?;
    fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create backup dir {}", directory.display()))?;
    let target = directory.join(backup_file_name(path, marker, at)?);
    fs::copy(path, &target).with_context(|| {
        format!(
            "failed to copy {} to {}",
            path.display(),
            target.display()
        )
    })?;
    Ok(target)
}

/// Newest backup of `path` written under `marker`, if any.
pub fn find_latest_backup(path: &Path, marker: &str) -> Result<Option<PathBuf>> {
    let directory = backup_dir_for(path)?;
    if !directory.is_dir() {
        return Ok(None);
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{stem}_{marker}_");
    let suffix = extension_suffix(path);

    let mut matches = Vec::new();
    let entries = fs::read_dir(&directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Some(timestamp) = rest.strip_suffix(suffix.as_str()) else {
            continue;
        };
        let Ok(parsed) = NaiveDateTime::parse_from_str(timestamp, BACKUP_TIMESTAMP_FORMAT) else {
            continue;
        };
        matches.push((parsed, entry.path()));
    }
    matches.sort();
    Ok(matches.pop().map(|(_, path)| path))
}

/// Overwrite `path` with its newest backup for `marker`. Returns the backup
/// that was restored, or `None` when no backup exists.
pub fn restore_latest(path: &Path, marker: &str) -> Result<Option<PathBuf>> {
    let Some(backup) = find_latest_backup(path, marker)? else {
        return Ok(None);
    };
    if backup == path {
        bail!("refusing to restore {} onto itself", path.display());
    }
    fs::copy(&backup, path).with_context(|| {
        format!(
            "failed to restore {} from {}",
            path.display(),
            backup.display()
        )
    })?;
    Ok(Some(backup))
}

fn extension_suffix(path: &Path) -> String {
    path.extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 16)
            .expect("date")
            .and_hms_opt(hour, minute, second)
            .expect("time")
    }

    #[test]
    fn backup_name_embeds_stem_marker_and_timestamp() {
        let name = backup_file_name(Path::new("scripts/test-all-services.js"), "smart_backup", at(21, 13, 51))
            .expect("name");
        assert_eq!(name, "test-all-services_smart_backup_20250716_211351.js");
    }

    #[test]
    fn backup_name_for_dotfile_has_no_extension() {
        let name = backup_file_name(Path::new(".env"), "supabase_backup", at(8, 0, 0)).expect("name");
        assert_eq!(name, ".env_supabase_backup_20250716_080000");
    }

    #[test]
    fn create_backup_copies_into_sibling_dir() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("client.ts");
        fs::write(&file, "original").expect("write");

        let backup = create_backup(&file, "supabase_backup", at(10, 0, 0)).expect("backup");
        assert_eq!(
            backup,
            temp.path()
                .join("backup")
                .join("client_supabase_backup_20250716_100000.ts")
        );
        assert_eq!(fs::read_to_string(&backup).expect("read"), "original");
    }

    #[test]
    fn restore_latest_picks_newest_matching_backup() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("client.ts");
        fs::write(&file, "v1").expect("write");
        create_backup(&file, "supabase_backup", at(9, 0, 0)).expect("backup v1");
        fs::write(&file, "v2").expect("write");
        create_backup(&file, "supabase_backup", at(11, 0, 0)).expect("backup v2");
        fs::write(&file, "v3").expect("write");
        create_backup(&file, "smart_backup", at(12, 0, 0)).expect("backup v3");
        fs::write(&file, "current").expect("write");

        let restored = restore_latest(&file, "supabase_backup")
            .expect("restore")
            .expect("backup exists");
        assert!(restored.ends_with("client_supabase_backup_20250716_110000.ts"));
        assert_eq!(fs::read_to_string(&file).expect("read"), "v2");
    }

    #[test]
    fn restore_latest_without_backup_is_noop() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("client.ts");
        fs::write(&file, "current").expect("write");
        assert!(restore_latest(&file, "supabase_backup").expect("restore").is_none());
        assert_eq!(fs::read_to_string(&file).expect("read"), "current");
    }
}
