use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::profile::Profile;

#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    pub files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Collect every file under `root` the profile accepts. Excluded directories
/// are pruned before descent, so nothing beneath them is ever opened.
pub fn collect_files(root: &Path, profile: &Profile) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_pruned_dir(entry, profile));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let location = err
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                outcome
                    .errors
                    .push(format!("Error walking {location}: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !profile.accepts_file_name(&name) {
            continue;
        }
        outcome.files.push(entry.into_path());
    }
    outcome
}

fn is_pruned_dir(entry: &DirEntry, profile: &Profile) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && profile.is_skipped_dir(&entry.file_name().to_string_lossy())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn collect_files_prunes_and_filters() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/lib")).expect("src");
        fs::create_dir_all(root.join("node_modules/pkg")).expect("node_modules");
        fs::create_dir_all(root.join("src/backup")).expect("backup");
        fs::write(root.join("src/lib/client.ts"), "x").expect("write");
        fs::write(root.join("src/readme.md"), "x").expect("write");
        fs::write(root.join("src/tool.py"), "x").expect("write");
        fs::write(root.join("package-lock.json"), "{}").expect("write");
        fs::write(root.join("node_modules/pkg/index.js"), "x").expect("write");
        fs::write(root.join("src/backup/client_old.ts"), "x").expect("write");
        fs::write(root.join(".env"), "A=1").expect("write");

        let profile = Profile::plain().expect("profile");
        let outcome = collect_files(root, &profile);
        assert!(outcome.errors.is_empty());

        let relative: Vec<String> = outcome
            .files
            .iter()
            .map(|path| {
                path.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(relative, vec![".env", "src/lib/client.ts", "src/readme.md"]);
    }

    #[test]
    fn collect_files_keeps_excluded_name_as_root() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("build");
        fs::create_dir_all(&root).expect("root");
        fs::write(root.join("app.js"), "x").expect("write");

        let profile = Profile::plain().expect("profile");
        let outcome = collect_files(&root, &profile);
        assert_eq!(outcome.files, vec![root.join("app.js")]);
    }

    #[test]
    fn collect_files_reports_missing_root() {
        let temp = tempdir().expect("tempdir");
        let profile = Profile::plain().expect("profile");
        let outcome = collect_files(&temp.path().join("absent"), &profile);
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }
}
