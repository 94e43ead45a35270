use std::path::Path;

use anyhow::{Result, bail};

use crate::rules::{Rule, RuleSet};

pub const PLAIN_PROFILE: &str = "plain";
pub const SMART_PROFILE: &str = "smart";
pub const BUILTIN_PROFILES: &[&str] = &[PLAIN_PROFILE, SMART_PROFILE];

pub const PLAIN_BACKUP_MARKER: &str = "supabase_backup";
pub const SMART_BACKUP_MARKER: &str = "smart_backup";

const DEFAULT_MARKERS: &[&str] = &["supabase", "Supabase", "SUPABASE"];

pub const STATE_DIR_NAME: &str = ".vocabshift";

const LOCKFILES: &[&str] = &["package-lock.json", "yarn.lock", "pnpm-lock.yaml"];

/// A named migration: which files to look at, how to recognize candidates,
/// and which rules rewrite them.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub backup_marker: String,
    pub markers: Vec<String>,
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub skip_files: Vec<String>,
    /// Files whose lower-cased name contains one of these are left untouched.
    pub skip_name_keywords: Vec<String>,
    pub code_rules: RuleSet,
    /// Rules used instead of `code_rules` for dotenv-style files.
    pub env_rules: Option<RuleSet>,
}

impl Profile {
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            PLAIN_PROFILE => Self::plain(),
            SMART_PROFILE => Self::smart(),
            other => bail!(
                "unknown profile `{other}` (built-in profiles: {})",
                BUILTIN_PROFILES.join(", ")
            ),
        }
    }

    /// Blanket vocabulary swap: every spelling of the old provider, its
    /// packages and env keys, then the client constructor.
    pub fn plain() -> Result<Self> {
        let literal_pairs: &[(&str, &str)] = &[
            ("supabase", "firebase"),
            ("Supabase", "Firebase"),
            ("SUPABASE", "FIREBASE"),
            ("supabase.auth", "firebase.auth"),
            ("supabase.storage", "firebase.storage"),
            ("supabase.from", "db.collection"),
            ("supabase.rpc", "firebase.functions"),
            ("NEXT_PUBLIC_SUPABASE_URL", "NEXT_PUBLIC_FIREBASE_CONFIG"),
            ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "NEXT_PUBLIC_FIREBASE_API_KEY"),
            ("SUPABASE_SERVICE_ROLE_KEY", "FIREBASE_SERVICE_ACCOUNT_KEY"),
            ("@supabase/supabase-js", "firebase/app"),
            ("@supabase/auth-helpers-react", "firebase/auth"),
            ("@supabase/auth-helpers-nextjs", "firebase/auth"),
            ("PostgreSQL", "Firestore"),
            ("postgres", "firestore"),
            ("RLS policies", "Firestore security rules"),
            ("Row Level Security", "Firestore security rules"),
            ("Upstash Redis", "Firebase Functions caching"),
        ];
        let mut rules = RuleSet::default();
        for (from, to) in literal_pairs {
            rules.push(Rule::literal(*from, *to)?);
        }
        rules.push(Rule::pattern(
            r#"import\s*\{\s*createClient\s*\}\s*from\s*['"]@supabase/supabase-js['"]"#,
            "import { initializeApp } from 'firebase/app'",
        )?);
        rules.push(Rule::pattern(
            r"createClient\s*\([^)]+\)",
            "initializeApp(firebaseConfig)",
        )?);

        Ok(Self {
            name: PLAIN_PROFILE.to_string(),
            backup_marker: PLAIN_BACKUP_MARKER.to_string(),
            markers: strings(DEFAULT_MARKERS),
            extensions: strings(&[
                ".js",
                ".jsx",
                ".ts",
                ".tsx",
                ".json",
                ".md",
                ".env",
                ".env.production",
                ".yml",
                ".yaml",
                ".sh",
                ".sql",
            ]),
            skip_dirs: strings(&[
                "node_modules",
                ".git",
                ".next",
                "dist",
                "build",
                ".vercel",
                "coverage",
                "__pycache__",
                ".pytest_cache",
                "backup",
                "deprecated",
                STATE_DIR_NAME,
            ]),
            skip_files: strings(LOCKFILES),
            skip_name_keywords: Vec::new(),
            code_rules: rules,
            env_rules: None,
        })
    }

    /// Context-aware rewrite: API calls are translated one by one, bare
    /// provider names only outside migration write-ups, and dotenv files get
    /// their old keys commented out instead of renamed.
    pub fn smart() -> Result<Self> {
        let env_rules = RuleSet::new(vec![
            Rule::pattern(
                r"(?m)^supabase_access_token\s*=\s*([^\n]+)",
                r"# Legacy Supabase - replaced by Firebase\n# supabase_access_token = \1\nFIREBASE_SERVICE_ACCOUNT_KEY = ",
            )?,
            Rule::pattern(
                r"(?m)^supabase_database_password\s*=\s*([^\n]+)",
                r"# supabase_database_password = \1",
            )?,
            Rule::pattern(
                r"(?m)^supabase_publishable_key\s*=\s*([^\n]+)",
                r"# supabase_publishable_key = \1",
            )?,
            Rule::pattern(
                r"(?m)^supabase_secret_key\s*=\s*([^\n]+)",
                r"# supabase_secret_key = \1",
            )?,
            Rule::pattern(
                r"(?m)^supabase_project_url\s*=\s*([^\n]+)",
                r"# supabase_project_url = \1\nFIREBASE_PROJECT_ID = ",
            )?,
            Rule::pattern(
                r"(?m)^supabase_project_api\s*=\s*([^\n]+)",
                r"# supabase_project_api = \1\nFIREBASE_API_KEY = ",
            )?,
            Rule::literal("NEXT_PUBLIC_SUPABASE_URL", "NEXT_PUBLIC_FIREBASE_PROJECT_ID")?,
            Rule::literal("NEXT_PUBLIC_SUPABASE_ANON_KEY", "NEXT_PUBLIC_FIREBASE_API_KEY")?,
            Rule::literal("SUPABASE_SERVICE_ROLE_KEY", "FIREBASE_ADMIN_SDK_KEY")?,
        ]);

        let code_rules = RuleSet::new(vec![
            Rule::pattern(
                r#"import\s*\{\s*createClient\s*\}\s*from\s*['"]@supabase/supabase-js['"]"#,
                "import { initializeApp } from 'firebase/app'\nimport { getFirestore } from 'firebase/firestore'\nimport { getAuth } from 'firebase/auth'",
            )?,
            Rule::pattern(r"createClient\s*\([^)]+\)", "initializeApp(firebaseConfig)")?,
            Rule::pattern(
                r#"supabase\.from\s*\(\s*['"](\w+)['"]\s*\)"#,
                r"db.collection('\1')",
            )?,
            Rule::pattern(r#"\.select\s*\(\s*['"]([^'"]+)['"]\s*\)"#, ".get()")?,
            Rule::pattern(r"\.insert\s*\(\s*([^)]+)\s*\)", r".add(\1)")?,
            Rule::pattern(
                r#"\.eq\s*\(\s*['"](\w+)['"]\s*,\s*([^)]+)\s*\)"#,
                r".where('\1', '==', \2)",
            )?,
            Rule::pattern(r"supabase\.auth\.signIn", "auth.signInWithEmailAndPassword")?,
            Rule::pattern(r"supabase\.auth\.signUp", "auth.createUserWithEmailAndPassword")?,
            Rule::pattern(r"supabase\.auth\.signOut", "auth.signOut")?,
            Rule::pattern(r"supabase\.auth\.user", "auth.currentUser")?,
            Rule::pattern(r"supabase\.storage", "storage")?,
            Rule::pattern(r"@supabase/supabase-js", "firebase/app")?,
            Rule::pattern(r"@supabase/auth-helpers-react", "firebase/auth")?,
            Rule::pattern(r"@supabase/auth-helpers-nextjs", "firebase/auth")?,
            Rule::unless_present(
                &["migration", "migrate"],
                vec![
                    Rule::guarded_pattern(r"\bSupabase\b", "Firebase", r"\s+to\s+Firebase")?,
                    Rule::guarded_pattern(r"\bsupabase\b", "firebase", r"\s+to\s+firebase")?,
                ],
            ),
            Rule::literal("PostgreSQL database", "Firestore database")?,
            Rule::pattern(r"\bPostgres(?:QL)?\b", "Firestore")?,
            Rule::literal("RLS policies", "Firestore security rules")?,
            Rule::literal("Row Level Security", "Firestore security rules")?,
        ]);

        Ok(Self {
            name: SMART_PROFILE.to_string(),
            backup_marker: SMART_BACKUP_MARKER.to_string(),
            markers: strings(DEFAULT_MARKERS),
            extensions: strings(&[
                ".js",
                ".jsx",
                ".ts",
                ".tsx",
                ".json",
                ".md",
                ".env",
                ".env.production",
                ".yml",
                ".yaml",
            ]),
            skip_dirs: strings(&[
                "node_modules",
                ".git",
                ".next",
                "dist",
                "build",
                ".vercel",
                "coverage",
                "__pycache__",
                ".pytest_cache",
                "backup",
                STATE_DIR_NAME,
            ]),
            skip_files: strings(LOCKFILES),
            skip_name_keywords: strings(&["migration", "migrate", "deprecated", "backup"]),
            code_rules,
            env_rules: Some(env_rules),
        })
    }

    pub fn is_candidate(&self, content: &str) -> bool {
        self.markers
            .iter()
            .any(|marker| content.contains(marker.as_str()))
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|dir| dir == name)
    }

    /// Name-level filter: allowed extension suffix and not an excluded name.
    pub fn accepts_file_name(&self, name: &str) -> bool {
        if self.skip_files.iter().any(|skip| skip == name) {
            return false;
        }
        self.extensions
            .iter()
            .any(|extension| name.ends_with(extension.as_str()))
    }

    /// Full-path filter for files that did not come from a tree walk.
    pub fn accepts_path(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return false;
        };
        if !self.accepts_file_name(&name) {
            return false;
        }
        let Some(parent) = path.parent() else {
            return true;
        };
        !parent
            .components()
            .any(|component| self.is_skipped_dir(&component.as_os_str().to_string_lossy()))
    }

    /// Rule set applicable to `path`, or `None` when the file name marks it
    /// as one to leave alone.
    pub fn rules_for(&self, path: &Path) -> Option<&RuleSet> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if self
            .skip_name_keywords
            .iter()
            .any(|keyword| name.contains(keyword.as_str()))
        {
            return None;
        }
        match &self.env_rules {
            Some(env_rules) if is_env_file(&name) => Some(env_rules),
            _ => Some(&self.code_rules),
        }
    }

    pub fn rewrite(&self, path: &Path, content: &str) -> (String, usize) {
        match self.rules_for(path) {
            Some(rules) => rules.apply(content),
            None => {
                tracing::debug!(
                    "skipping replacements in migration file: {}",
                    path.display()
                );
                (content.to_string(), 0)
            }
        }
    }
}

/// `.env`, `prod.env`, `.env.local`, `.env.production`, ...
pub fn is_env_file(name: &str) -> bool {
    name.ends_with(".env") || name.contains(".env.")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
