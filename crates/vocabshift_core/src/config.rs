use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::profile::{PLAIN_PROFILE, Profile};
use crate::rules::{RuleSpec, RuleSet};

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub migration: MigrationSection,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrationSection {
    pub default_profile: Option<String>,
    pub report_dir: Option<String>,
}

/// A profile declared in config. With `base` set, unset lists inherit from
/// that built-in profile and `rules` run after its code rules.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    pub name: String,
    pub base: Option<String>,
    pub backup_marker: Option<String>,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub skip_dirs: Vec<String>,
    #[serde(default)]
    pub skip_files: Vec<String>,
    #[serde(default)]
    pub skip_name_keywords: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl ToolConfig {
    /// env VOCABSHIFT_PROFILE > config > `plain`.
    pub fn default_profile_name(&self) -> String {
        if let Ok(value) = env::var("VOCABSHIFT_PROFILE") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.migration
            .default_profile
            .clone()
            .unwrap_or_else(|| PLAIN_PROFILE.to_string())
    }

    /// Report directory, relative paths resolved against `project_root`.
    pub fn report_dir(&self, project_root: &Path, log_dir: &Path) -> PathBuf {
        match self.migration.report_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => {
                let path = Path::new(dir);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    project_root.join(path)
                }
            }
            _ => log_dir.to_path_buf(),
        }
    }

    /// Config-declared profiles shadow built-ins of the same name.
    pub fn resolve_profile(&self, name: &str) -> Result<Profile> {
        match self.profiles.iter().find(|profile| profile.name == name) {
            Some(declared) => declared.build(),
            None => Profile::builtin(name),
        }
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = crate::profile::BUILTIN_PROFILES
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        for profile in &self.profiles {
            if !names.contains(&profile.name) {
                names.push(profile.name.clone());
            }
        }
        names
    }
}

impl ProfileConfig {
    pub fn build(&self) -> Result<Profile> {
        if self.name.trim().is_empty() {
            bail!("profile name cannot be empty");
        }
        let compiled = self
            .rules
            .iter()
            .map(RuleSpec::compile)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("failed to compile rules for profile `{}`", self.name))?;

        let mut profile = match self.base.as_deref() {
            Some(base) => Profile::builtin(base)
                .with_context(|| format!("profile `{}` extends an unknown base", self.name))?,
            None => {
                if compiled.is_empty() {
                    bail!("profile `{}` has no base and no rules", self.name);
                }
                if self.markers.is_empty() {
                    bail!("profile `{}` has no base and no markers", self.name);
                }
                let mut profile = Profile::plain()?;
                profile.code_rules = RuleSet::default();
                profile.skip_name_keywords.clear();
                profile
            }
        };

        profile.name = self.name.clone();
        profile.backup_marker = self
            .backup_marker
            .clone()
            .unwrap_or_else(|| format!("{}_backup", self.name));
        replace_if_set(&mut profile.markers, &self.markers);
        replace_if_set(&mut profile.extensions, &self.extensions);
        replace_if_set(&mut profile.skip_dirs, &self.skip_dirs);
        replace_if_set(&mut profile.skip_files, &self.skip_files);
        replace_if_set(&mut profile.skip_name_keywords, &self.skip_name_keywords);
        profile.code_rules.extend(compiled);
        Ok(profile)
    }
}

fn replace_if_set(target: &mut Vec<String>, value: &[String]) {
    if !value.is_empty() {
        *target = value.to_vec();
    }
}

/// Load and parse config from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ToolConfig> {
    if !config_path.exists() {
        return Ok(ToolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn render_default_config() -> String {
    "# vocabshift configuration (materialized by `vocabshift init`)\n\n[migration]\ndefault_profile = \"plain\"\n# report_dir = \".vocabshift/reports\"\n\n# Custom profiles extend a built-in one or stand alone.\n# [[profiles]]\n# name = \"env-local\"\n# markers = [\".env.local\"]\n# extensions = [\".md\", \".sh\", \".js\", \".py\"]\n# rules = [\n#   { kind = \"literal\", from = \".env.local\", to = \".env\" },\n# ]\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert!(config.migration.default_profile.is_none());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[migration\ndefault_profile = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn default_config_parses() {
        let parsed: ToolConfig = toml::from_str(&render_default_config()).expect("parse");
        assert_eq!(parsed.migration.default_profile.as_deref(), Some("plain"));
    }

    #[test]
    fn standalone_profile_from_config() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[migration]
default_profile = "env-local"
report_dir = "reports"

[[profiles]]
name = "env-local"
markers = [".env.local"]
extensions = [".md", ".sh"]
rules = [
  { kind = "literal", from = ".env.local", to = ".env" },
]
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.report_dir(Path::new("/repo"), Path::new("/repo/.vocabshift/logs")),
            PathBuf::from("/repo/reports")
        );
        let profile = config.resolve_profile("env-local").expect("profile");
        assert_eq!(profile.backup_marker, "env-local_backup");
        assert!(profile.accepts_file_name("DEPLOYMENT.md"));
        assert!(!profile.accepts_file_name("deploy.js"));
        assert!(profile.is_candidate("cp .env.local .env.local.bak"));
        let (out, count) = profile.rewrite(Path::new("deploy.sh"), "source .env.local");
        assert_eq!(out, "source .env");
        assert_eq!(count, 1);
        assert_eq!(config.profile_names(), vec!["plain", "smart", "env-local"]);
    }

    #[test]
    fn extended_profile_appends_rules_after_base() {
        let config: ToolConfig = toml::from_str(
            r#"
[[profiles]]
name = "smart-plus"
base = "smart"
rules = [{ kind = "literal", from = "Upstash Redis", to = "Firebase Functions caching" }]
"#,
        )
        .expect("parse");
        let profile = config.resolve_profile("smart-plus").expect("profile");
        let smart = Profile::smart().expect("smart");
        assert_eq!(profile.code_rules.len(), smart.code_rules.len() + 1);
        assert_eq!(profile.skip_name_keywords, smart.skip_name_keywords);
        assert!(profile.env_rules.is_some());
    }

    #[test]
    fn standalone_profile_requires_rules_and_markers() {
        let config: ToolConfig = toml::from_str(
            r#"
[[profiles]]
name = "empty"
"#,
        )
        .expect("parse");
        let error = config.resolve_profile("empty").expect_err("must fail");
        assert!(error.to_string().contains("no base and no rules"));
    }

    #[test]
    fn unknown_profile_falls_through_to_builtin_error() {
        let config = ToolConfig::default();
        assert!(config.resolve_profile("plain").is_ok());
        assert!(config.resolve_profile("nope").is_err());
    }

    #[test]
    fn report_dir_defaults_to_log_dir() {
        let config = ToolConfig::default();
        assert_eq!(
            config.report_dir(Path::new("/repo"), Path::new("/repo/.vocabshift/logs")),
            PathBuf::from("/repo/.vocabshift/logs")
        );
    }
}
