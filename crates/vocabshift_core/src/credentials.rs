use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub type Credentials = BTreeMap<String, String>;

/// One or more required keys were absent (or blank) in a credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCredentials {
    pub keys: Vec<String>,
}

impl fmt::Display for MissingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing credentials: {}", self.keys.join(", "))
    }
}

impl std::error::Error for MissingCredentials {}

/// Read a `KEY=VALUE` credential file into a map without touching the
/// process environment. Later duplicates win.
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read credential file {}", path.display()))?;
    Ok(parse_credentials(&content))
}

/// Blank lines, `#` comments and lines without `=` are skipped. The first
/// `=` splits key from value and both sides are trimmed. Values are kept
/// verbatim: no quote stripping, no `$VAR` expansion.
pub fn parse_credentials(content: &str) -> Credentials {
    let mut out = Credentials::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        out.insert(key.to_string(), value.trim().to_string());
    }
    out
}

/// Like [`load_credentials`], but a missing file yields an empty map.
pub fn load_credentials_if_present(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        return Ok(Credentials::new());
    }
    load_credentials(path)
}

pub fn require<S: AsRef<str>>(
    credentials: &Credentials,
    keys: &[S],
) -> std::result::Result<(), MissingCredentials> {
    let missing: Vec<String> = keys
        .iter()
        .map(AsRef::as_ref)
        .filter(|key| {
            credentials
                .get(*key)
                .is_none_or(|value| value.trim().is_empty())
        })
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingCredentials { keys: missing })
    }
}

/// Show at most the first four characters of a secret.
pub fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "*".repeat(value.chars().count())
    } else {
        format!("{visible}***")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parses_pairs_and_ignores_comments() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(
            &path,
            "# deployment credentials\nGITHUB_TOKEN=ghp_abc\n\nVERCEL_TOKEN=vc=with=equals\n",
        )
        .expect("write env");

        let credentials = load_credentials(&path).expect("load");
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials["GITHUB_TOKEN"], "ghp_abc");
        assert_eq!(credentials["VERCEL_TOKEN"], "vc=with=equals");
    }

    #[test]
    fn values_are_kept_verbatim() {
        let credentials = parse_credentials(
            "google_admin_account_password=pa$HOMEword\nPROJECT_NAME = Wedding Video Scroller\nQUOTED=\"keep quotes\"\n",
        );
        assert_eq!(credentials["google_admin_account_password"], "pa$HOMEword");
        assert_eq!(credentials["PROJECT_NAME"], "Wedding Video Scroller");
        assert_eq!(credentials["QUOTED"], "\"keep quotes\"");
    }

    #[test]
    fn lines_without_equals_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(
            &path,
            "=== Google ===\ngoogle_project_id=wedding-scroller\n   # indented comment=1\n=orphan\nGITHUB_TOKEN=ghp_x\nGITHUB_TOKEN=ghp_y\n",
        )
        .expect("write env");

        let credentials = load_credentials(&path).expect("load");
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials["google_project_id"], "wedding-scroller");
        assert_eq!(credentials["GITHUB_TOKEN"], "ghp_y");
    }

    #[test]
    fn missing_file_is_empty_when_optional() {
        let temp = tempdir().expect("tempdir");
        let credentials =
            load_credentials_if_present(&temp.path().join("absent.env")).expect("load");
        assert!(credentials.is_empty());
        assert!(load_credentials(&temp.path().join("absent.env")).is_err());
    }

    #[test]
    fn require_lists_missing_and_blank_keys() {
        let credentials = Credentials::from([
            ("FIREBASE_PROJECT_ID".to_string(), "demo".to_string()),
            ("FIREBASE_API_KEY".to_string(), "  ".to_string()),
        ]);
        assert!(require(&credentials, &["FIREBASE_PROJECT_ID"]).is_ok());
        let error = require(
            &credentials,
            &["FIREBASE_PROJECT_ID", "FIREBASE_API_KEY", "GITHUB_TOKEN"],
        )
        .expect_err("must fail");
        assert_eq!(error.keys, vec!["FIREBASE_API_KEY", "GITHUB_TOKEN"]);
        assert_eq!(
            error.to_string(),
            "missing credentials: FIREBASE_API_KEY, GITHUB_TOKEN"
        );
    }

    #[test]
    fn mask_hides_secret_tail() {
        assert_eq!(mask("ghp_abcdef"), "ghp_***");
        assert_eq!(mask("abc"), "***");
    }
}
