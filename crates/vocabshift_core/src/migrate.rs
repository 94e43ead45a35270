use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use similar::TextDiff;

use crate::backup::{create_backup, restore_latest};
use crate::journal::{Journal, Level};
use crate::profile::Profile;
use crate::report::{MigrationReport, ModifiedFile, is_report_file};
use crate::walk::collect_files;

#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Process exactly these files instead of walking `root`.
    pub targets: Option<Vec<PathBuf>>,
    /// Restore each file from its newest backup with this marker first.
    pub restore_marker: Option<String>,
    pub capture_diffs: bool,
    /// Files never processed, such as the report this run will write.
    pub exclude: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub unified: String,
}

#[derive(Debug, Clone)]
pub struct MigrateOutcome {
    pub report: MigrationReport,
    pub diffs: Vec<FileDiff>,
}

enum FileResult {
    NotText,
    NotCandidate,
    Unchanged,
    Modified {
        replacements: usize,
        backup_path: Option<PathBuf>,
        diff: Option<String>,
    },
}

/// Rewrite every candidate file the profile selects and build the report.
/// Per-file failures are recorded in `report.errors`; the run keeps going.
pub fn run_migration(
    profile: &Profile,
    options: &MigrateOptions,
    journal: &dyn Journal,
) -> Result<MigrateOutcome> {
    journal.action(&format!(
        "Starting {} migration under {}{}",
        profile.name,
        options.root.display(),
        if options.dry_run { " (dry run)" } else { "" }
    ));

    let mut errors = Vec::new();
    let files = match &options.targets {
        Some(targets) => select_targets(profile, targets, journal),
        None => {
            let walked = collect_files(&options.root, profile);
            for error in &walked.errors {
                journal.log(Level::Warning, error);
            }
            errors.extend(walked.errors);
            walked.files
        }
    };
    let files: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            let excluded = is_report_file(path)
                || options.exclude.iter().any(|other| same_path(other, path));
            if excluded {
                journal.action(&format!("Skipping report file: {}", path.display()));
            }
            !excluded
        })
        .collect();

    let mut total_files_scanned = 0usize;
    let mut files_with_markers = 0usize;
    let mut modified_files = Vec::new();
    let mut skipped_files = Vec::new();
    let mut diffs = Vec::new();

    for path in &files {
        let display = normalize_path(path);
        match process_file(profile, options, path, journal) {
            Ok(FileResult::NotText) => {}
            Ok(FileResult::NotCandidate) => total_files_scanned += 1,
            Ok(FileResult::Unchanged) => {
                total_files_scanned += 1;
                files_with_markers += 1;
                skipped_files.push(display);
            }
            Ok(FileResult::Modified {
                replacements,
                backup_path,
                diff,
            }) => {
                total_files_scanned += 1;
                files_with_markers += 1;
                journal.action(&format!(
                    "Modified {display} with {replacements} replacements"
                ));
                if let Some(unified) = diff {
                    diffs.push(FileDiff {
                        path: display.clone(),
                        unified,
                    });
                }
                modified_files.push(ModifiedFile {
                    path: display,
                    replacements,
                    backup_path: backup_path.as_deref().map(normalize_path),
                });
            }
            Err(err) => {
                let message = format!("Error processing {display}: {err:#}");
                journal.log(Level::Error, &message);
                errors.push(message);
            }
        }
    }

    let report = MigrationReport {
        migration_date: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        migration_type: profile.name.clone(),
        dry_run: options.dry_run,
        total_files_scanned,
        files_with_markers,
        files_modified: modified_files.len(),
        total_replacements: modified_files.iter().map(|file| file.replacements).sum(),
        modified_files,
        skipped_files,
        errors,
    };

    journal.action(&format!(
        "{} migration finished: {} scanned, {} modified, {} replacements, {} errors",
        profile.name,
        report.total_files_scanned,
        report.files_modified,
        report.total_replacements,
        report.errors.len()
    ));
    if !options.dry_run {
        journal.progress(
            "MIGRATION",
            &format!(
                "{} migration: {} files modified, {} replacements",
                profile.name, report.files_modified, report.total_replacements
            ),
        );
    }

    Ok(MigrateOutcome { report, diffs })
}

fn select_targets(profile: &Profile, targets: &[PathBuf], journal: &dyn Journal) -> Vec<PathBuf> {
    let mut selected = Vec::new();
    for path in targets {
        if !path.is_file() {
            journal.action(&format!("File no longer exists: {}", path.display()));
            continue;
        }
        if !profile.accepts_path(path) {
            journal.action(&format!("Skipping: {}", path.display()));
            continue;
        }
        selected.push(path.clone());
    }
    selected
}

fn process_file(
    profile: &Profile,
    options: &MigrateOptions,
    path: &Path,
    journal: &dyn Journal,
) -> Result<FileResult> {
    if let Some(marker) = &options.restore_marker
        && !options.dry_run
    {
        match restore_latest(path, marker)? {
            Some(backup) => journal.action(&format!(
                "Restored {} from {}",
                path.display(),
                backup.display()
            )),
            None => journal.action(&format!(
                "No backup found for {}, processing current version",
                path.display()
            )),
        }
    }

    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let Ok(original) = String::from_utf8(bytes) else {
        journal.log(
            Level::Info,
            &format!("Skipping non-UTF-8 file: {}", path.display()),
        );
        return Ok(FileResult::NotText);
    };

    if !profile.is_candidate(&original) {
        return Ok(FileResult::NotCandidate);
    }

    let (rewritten, replacements) = profile.rewrite(path, &original);
    if rewritten == original {
        return Ok(FileResult::Unchanged);
    }

    let diff = options.capture_diffs.then(|| {
        let display = normalize_path(path);
        TextDiff::from_lines(&original, &rewritten)
            .unified_diff()
            .context_radius(2)
            .header(&display, &display)
            .to_string()
    });

    if options.dry_run {
        return Ok(FileResult::Modified {
            replacements,
            backup_path: None,
            diff,
        });
    }

    let backup_path = create_backup(path, &profile.backup_marker, Local::now().naive_local())?;
    journal.action(&format!("Created backup: {}", backup_path.display()));
    fs::write(path, rewritten).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(FileResult::Modified {
        replacements,
        backup_path: Some(backup_path),
        diff,
    })
}

fn same_path(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
