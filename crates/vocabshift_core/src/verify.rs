use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::profile::Profile;
use crate::walk::collect_files;

pub const DEFAULT_VERIFY_TERMS: &[&str] = &["supabase", "postgres", "rls"];
pub const DEFAULT_MAX_RESULTS: usize = 20;

pub const ENV_FILE_NAMES: &[&str] = &[".env", ".env.local", ".env.production"];
pub const LEGACY_ENV_KEYS: &[&str] = &[
    "SUPABASE_URL",
    "SUPABASE_ANON_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
];
pub const EXPECTED_ENV_KEYS: &[&str] = &["FIREBASE_CONFIG", "FIREBASE_API_KEY"];

const SOURCE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];
const LEGACY_IMPORT: &str = "@supabase/supabase-js";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualReference {
    pub file: String,
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub files_checked: usize,
    pub references: Vec<ResidualReference>,
    pub truncated: bool,
    pub env_issues: Vec<String>,
    pub import_issues: Vec<String>,
    pub errors: Vec<String>,
}

impl VerifyReport {
    pub fn issue_count(&self) -> usize {
        self.references.len() + self.env_issues.len() + self.import_issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}

/// Run every post-migration check against `root`: residual terms, dotenv
/// keys and leftover client imports.
pub fn verify_tree(
    root: &Path,
    profile: &Profile,
    terms: &[String],
    max_results: usize,
) -> VerifyReport {
    let mut report = find_residual_references(root, profile, terms, max_results);
    report.env_issues = check_env_files(root);
    report.import_issues = check_imports(root, profile);
    report
}

/// Find lines that still mention any of `terms` (case-insensitive) in files
/// the profile would migrate. Stops after `max_results` hits.
pub fn find_residual_references(
    root: &Path,
    profile: &Profile,
    terms: &[String],
    max_results: usize,
) -> VerifyReport {
    let lowered_terms: Vec<String> = terms.iter().map(|term| term.to_lowercase()).collect();
    let walked = collect_files(root, profile);
    let mut references = Vec::new();
    let mut files_checked = 0usize;
    let mut truncated = false;

    'files: for path in &walked.files {
        // Unreadable or binary files are not interesting here.
        let Ok(content) = fs::read_to_string(path) else {
            tracing::debug!("skipping unreadable file {}", path.display());
            continue;
        };
        files_checked += 1;
        for (index, line) in content.lines().enumerate() {
            let lowered = line.to_lowercase();
            if !lowered_terms
                .iter()
                .any(|term| lowered.contains(term.as_str()))
            {
                continue;
            }
            if references.len() >= max_results {
                truncated = true;
                break 'files;
            }
            references.push(ResidualReference {
                file: display_path(path),
                line: index + 1,
                content: line.trim().to_string(),
            });
        }
    }

    VerifyReport {
        files_checked,
        references,
        truncated,
        env_issues: Vec::new(),
        import_issues: Vec::new(),
        errors: walked.errors,
    }
}

/// Dotenv files at `root` that still carry Supabase keys or lack the
/// Firebase ones. Absent files are not reported.
pub fn check_env_files(root: &Path) -> Vec<String> {
    let mut issues = Vec::new();
    for name in ENV_FILE_NAMES {
        let path = root.join(name);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let shown = display_path(&path);
        for key in LEGACY_ENV_KEYS {
            if content.contains(key) {
                issues.push(format!("{shown}: still contains {key}"));
            }
        }
        for key in EXPECTED_ENV_KEYS {
            if !content.contains(key) {
                issues.push(format!("{shown}: missing {key}"));
            }
        }
    }
    issues
}

/// Source files still importing the Supabase client, or calling
/// `createClient` with no Firebase in sight.
pub fn check_imports(root: &Path, profile: &Profile) -> Vec<String> {
    let mut issues = Vec::new();
    for path in collect_files(root, profile).files {
        let is_source = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| SOURCE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)));
        if !is_source {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let shown = display_path(&path);
        if content.contains(LEGACY_IMPORT) {
            issues.push(format!("{shown}: still importing {LEGACY_IMPORT}"));
        }
        if content.contains("createClient") && !content.contains("firebase") {
            issues.push(format!("{shown}: using createClient without Firebase"));
        }
    }
    issues
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
