use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::render_default_config;
use crate::credentials::{Credentials, load_credentials_if_present};
use crate::profile::STATE_DIR_NAME;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const ENV_FILENAME: &str = ".env";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    CredentialFile,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::CredentialFile => "credential-file",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
    pub executable_dir: Option<PathBuf>,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        let executable_dir = env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));
        Ok(Self {
            cwd,
            executable_dir,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
    pub env_path: PathBuf,
    pub root_source: ValueSource,
    pub log_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nstate_dir={}\nlog_dir={} ({})\nconfig_path={} ({})\nenv_path={}",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.log_dir),
            self.log_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            normalize_for_display(&self.env_path),
        )
    }
}

/// Resolve paths from flags and the process environment, then again with the
/// project's credential file as a fallback source. Returns the parsed
/// credentials alongside. An unreadable credential file is logged and
/// treated as empty.
pub fn resolve_runtime(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<(ResolvedPaths, Credentials)> {
    resolve_runtime_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_runtime_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<(ResolvedPaths, Credentials)>
where
    F: Fn(&str) -> Option<String>,
{
    let initial = resolve_paths_with_lookup(context, overrides, |key| {
        lookup_env(key).map(|value| (value, ValueSource::Env))
    })?;
    let credentials = match load_credentials_if_present(&initial.env_path) {
        Ok(credentials) => credentials,
        Err(err) => {
            tracing::warn!("ignoring credential file: {err:#}");
            Credentials::new()
        }
    };

    let resolved = resolve_paths_with_lookup(context, overrides, |key| {
        lookup_env(key)
            .map(|value| (value, ValueSource::Env))
            .or_else(|| {
                credentials
                    .get(key)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| (value.clone(), ValueSource::CredentialFile))
            })
    })?;
    Ok((resolved, credentials))
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<(String, ValueSource)>,
{
    let (project_root, root_source) = if let Some(path) = overrides.project_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some((value, source)) = lookup("VOCABSHIFT_PROJECT_ROOT") {
        (absolutize(Path::new(value.trim()), &context.cwd), source)
    } else {
        (
            detect_project_root_heuristic(&context.cwd, context.executable_dir.as_deref()),
            ValueSource::Heuristic,
        )
    };

    let state_dir = project_root.join(STATE_DIR_NAME);

    let (log_dir, log_source) = if let Some(path) = overrides.log_dir.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some((value, source)) = lookup("VOCABSHIFT_LOG_DIR") {
        (absolutize(Path::new(value.trim()), &project_root), source)
    } else {
        (state_dir.join("logs"), ValueSource::Default)
    };

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some((value, source)) = lookup("VOCABSHIFT_CONFIG") {
        (absolutize(Path::new(value.trim()), &project_root), source)
    } else {
        (state_dir.join(CONFIG_FILENAME), ValueSource::Default)
    };

    let env_path = match overrides.env_file.as_deref() {
        Some(path) => absolutize(path, &context.cwd),
        None => project_root.join(ENV_FILENAME),
    };

    Ok(ResolvedPaths {
        project_root,
        state_dir,
        log_dir,
        config_path,
        env_path,
        root_source,
        log_source,
        config_source,
    })
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

pub fn init_layout(paths: &ResolvedPaths, force: bool) -> Result<InitReport> {
    let mut created_dirs = Vec::new();
    for dir in [&paths.state_dir, &paths.log_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }
    let wrote_config = write_text_file(&paths.config_path, &render_default_config(), force)?;
    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

fn detect_project_root_heuristic(cwd: &Path, executable_dir: Option<&Path>) -> PathBuf {
    let mut seen = HashSet::new();
    for marker in [STATE_DIR_NAME, ".git"] {
        for candidate in candidate_roots(cwd, executable_dir) {
            let key = normalize_for_display(&candidate);
            if !seen.insert((marker, key)) {
                continue;
            }
            if candidate.join(marker).exists() {
                return candidate;
            }
        }
    }
    cwd.to_path_buf()
}

fn candidate_roots(cwd: &Path, executable_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = cwd.ancestors().map(Path::to_path_buf).collect();
    if let Some(exe_dir) = executable_dir {
        out.extend(exe_dir.ancestors().map(Path::to_path_buf));
    }
    out
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
