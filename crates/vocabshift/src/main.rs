use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vocabshift_core::backup::restore_latest;
use vocabshift_core::config::{ToolConfig, load_config};
use vocabshift_core::credentials::{Credentials, load_credentials_if_present, mask, require};
use vocabshift_core::journal::{Journal, Level, OperationLog, TracingJournal};
use vocabshift_core::migrate::{MigrateOptions, run_migration};
use vocabshift_core::profile::{PLAIN_BACKUP_MARKER, Profile};
use vocabshift_core::report::{MigrationReport, default_report_path};
use vocabshift_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_layout, normalize_for_display,
    resolve_runtime,
};
use vocabshift_core::verify::{DEFAULT_MAX_RESULTS, DEFAULT_VERIFY_TERMS, verify_tree};

const SUMMARY_LIMIT: usize = 10;

#[derive(Debug, Parser)]
#[command(
    name = "vocabshift",
    version,
    about = "Rewrite Supabase/PostgreSQL references to Firebase across a project tree"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Credential file (default: <project_root>/.env)")]
    env_file: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    env_file: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            env_file: cli.env_file.clone(),
            log_dir: cli.log_dir.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create .vocabshift/ and its default config.toml")]
    Init(InitArgs),
    #[command(about = "Apply a profile's rules to every candidate file")]
    Migrate(MigrateArgs),
    #[command(about = "List lines that still mention the old stack")]
    Verify(VerifyArgs),
    #[command(about = "Restore a file from its newest backup")]
    Restore(RestoreArgs),
    #[command(about = "Print a profile's ordered rule list")]
    Rules(RulesArgs),
    #[command(about = "Append an INFO line to today's log")]
    Log(LogArgs),
    #[command(about = "Prepend an entry to progress.md")]
    Progress(ProgressArgs),
    #[command(about = "Show credential keys with masked values")]
    Credentials(CredentialsArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config.toml")]
    force: bool,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,
    #[arg(long, value_name = "PATH", help = "Tree to walk (default: project root)")]
    root: Option<PathBuf>,
    #[arg(long, help = "Report what would change without writing files")]
    dry_run: bool,
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Only process files listed in an earlier report"
    )]
    from_report: Option<PathBuf>,
    #[arg(long, help = "Restore each file from its latest plain-profile backup first")]
    restore_first: bool,
    #[arg(long, help = "Print the report as JSON instead of a summary")]
    json: bool,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,
    #[arg(long, value_name = "PATH")]
    root: Option<PathBuf>,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RESULTS)]
    max: usize,
    #[arg(long = "term", value_name = "TERM")]
    terms: Vec<String>,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    file: PathBuf,
    #[arg(long, value_name = "MARKER", default_value = PLAIN_BACKUP_MARKER)]
    marker: String,
}

#[derive(Debug, Args)]
struct RulesArgs {
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,
}

#[derive(Debug, Args)]
struct LogArgs {
    #[arg(required = true)]
    message: Vec<String>,
}

#[derive(Debug, Args)]
struct ProgressArgs {
    #[arg(long, short = 'c', value_name = "CATEGORY", default_value = "UPDATE")]
    category: String,
    #[arg(required = true)]
    message: Vec<String>,
}

#[derive(Debug, Args)]
struct CredentialsArgs {
    #[arg(long = "require", value_name = "KEY")]
    required: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Migrate(args)) => run_migrate(&runtime, args),
        Some(Commands::Verify(args)) => run_verify(&runtime, args),
        Some(Commands::Restore(args)) => run_restore(&runtime, args),
        Some(Commands::Rules(RulesArgs { profile })) => run_rules(&runtime, profile),
        Some(Commands::Log(LogArgs { message })) => run_log(&runtime, &message.join(" ")),
        Some(Commands::Progress(ProgressArgs { category, message })) => {
            run_progress(&runtime, &category, &message.join(" "))
        }
        Some(Commands::Credentials(CredentialsArgs { required })) => {
            run_credentials(&runtime, &required)
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let report = init_layout(&paths, args.force)?;
    let log = OperationLog::open(&paths.log_dir)?;
    let created_progress = log.initialize()?;

    println!("Initialized vocabshift layout");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("state_dir: {}", normalize_for_display(&paths.state_dir));
    println!("log_dir: {}", normalize_for_display(&paths.log_dir));
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    println!("created_progress: {created_progress}");
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_migrate(runtime: &RuntimeOptions, args: MigrateArgs) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let profile = resolve_profile(&config, args.profile.as_deref())?;

    let write_report = !args.dry_run || args.report.is_some();
    let report_path = match args.report {
        Some(path) => path,
        None => default_report_path(
            &config.report_dir(&paths.project_root, &paths.log_dir),
            &profile.name,
        ),
    };
    let mut exclude = vec![report_path.clone()];
    exclude.extend(args.from_report.clone());

    let targets = match args.from_report.as_deref() {
        Some(path) => Some(MigrationReport::load(path)?.modified_paths()),
        None => None,
    };
    let options = MigrateOptions {
        root: args.root.unwrap_or_else(|| paths.project_root.clone()),
        dry_run: args.dry_run,
        targets,
        restore_marker: args
            .restore_first
            .then(|| PLAIN_BACKUP_MARKER.to_string()),
        capture_diffs: args.dry_run && !args.json,
        exclude,
    };

    let outcome = if args.dry_run {
        run_migration(&profile, &options, &TracingJournal)?
    } else {
        let log = OperationLog::open(&paths.log_dir)?;
        log.initialize()?;
        run_migration(&profile, &options, &log)?
    };
    let report = &outcome.report;

    if write_report {
        report.write(&report_path)?;
    }

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        for diff in &outcome.diffs {
            print!("{}", diff.unified);
        }
        println!("migration summary");
        println!("profile: {}", profile.name);
        println!("root: {}", normalize_for_display(&options.root));
        println!("dry_run: {}", report.dry_run);
        println!("total_files_scanned: {}", report.total_files_scanned);
        println!("files_with_markers: {}", report.files_with_markers);
        println!("files_modified: {}", report.files_modified);
        println!("total_replacements: {}", report.total_replacements);
        if !report.modified_files.is_empty() {
            println!("modified_files:");
            for file in report.modified_files.iter().take(SUMMARY_LIMIT) {
                println!("  - {} ({} replacements)", file.path, file.replacements);
            }
            if report.modified_files.len() > SUMMARY_LIMIT {
                println!(
                    "  ... and {} more",
                    report.modified_files.len() - SUMMARY_LIMIT
                );
            }
        }
        if write_report {
            println!("report: {}", normalize_for_display(&report_path));
        }
        if !report.errors.is_empty() {
            println!("errors:");
            for error in &report.errors {
                println!("  - {error}");
            }
        }
    }
    print_diagnostics(runtime, &paths);

    if !report.errors.is_empty() {
        bail!(
            "migration finished with {} error(s)",
            report.errors.len()
        );
    }
    Ok(())
}

fn run_verify(runtime: &RuntimeOptions, args: VerifyArgs) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let profile = resolve_profile(&config, args.profile.as_deref())?;
    let terms = if args.terms.is_empty() {
        DEFAULT_VERIFY_TERMS
            .iter()
            .map(|term| (*term).to_string())
            .collect()
    } else {
        args.terms
    };
    let root = args.root.unwrap_or_else(|| paths.project_root.clone());

    let report = verify_tree(&root, &profile, &terms, args.max);

    println!("verify");
    println!("root: {}", normalize_for_display(&root));
    println!("terms: {}", terms.join(", "));
    println!("files_checked: {}", report.files_checked);
    println!("references: {}", report.references.len());
    for reference in &report.references {
        println!(
            "  {}:{}: {}",
            reference.file, reference.line, reference.content
        );
    }
    if report.truncated {
        println!("truncated: stopped after {} references", args.max);
    }
    println!("env_issues: {}", report.env_issues.len());
    for issue in &report.env_issues {
        println!("  - {issue}");
    }
    println!("import_issues: {}", report.import_issues.len());
    for issue in &report.import_issues {
        println!("  - {issue}");
    }
    if !report.errors.is_empty() {
        println!("walk_errors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }

    let last_report_path = default_report_path(
        &config.report_dir(&paths.project_root, &paths.log_dir),
        &profile.name,
    );
    if last_report_path.exists() {
        let last = MigrationReport::load(&last_report_path)?;
        println!("last_migration: {}", last.migration_date);
        println!("last_files_modified: {}", last.files_modified);
        println!("last_total_replacements: {}", last.total_replacements);
    } else {
        println!("last_migration: none");
    }
    println!("clean: {}", format_flag(report.is_clean()));
    print_diagnostics(runtime, &paths);

    if !report.is_clean() {
        bail!("verification found {} issue(s)", report.issue_count());
    }
    Ok(())
}

fn run_restore(runtime: &RuntimeOptions, args: RestoreArgs) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let log = OperationLog::open(&paths.log_dir)?;
    let target = if args.file.is_absolute() {
        args.file
    } else {
        paths.project_root.join(&args.file)
    };

    match restore_latest(&target, &args.marker) {
        Ok(Some(backup)) => {
            log.file_operation("restore", &target, true);
            println!("restored: {}", normalize_for_display(&target));
            println!("from: {}", normalize_for_display(&backup));
        }
        Ok(None) => {
            log.log(
                Level::Warning,
                &format!(
                    "No {} backup found for {}",
                    args.marker,
                    target.display()
                ),
            );
            bail!(
                "no `{}` backup found for {}",
                args.marker,
                normalize_for_display(&target)
            );
        }
        Err(err) => {
            log.file_operation("restore", &target, false);
            log.error("Restore failed", Some(&err));
            return Err(err);
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_rules(runtime: &RuntimeOptions, profile: Option<String>) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let profile = resolve_profile(&config, profile.as_deref())?;

    println!("profile: {}", profile.name);
    println!("backup_marker: {}", profile.backup_marker);
    println!("markers: {}", profile.markers.join(", "));
    println!("extensions: {}", profile.extensions.join(" "));
    println!("code_rules:");
    for (index, rule) in profile.code_rules.iter().enumerate() {
        println!("  {:>3}. {rule}", index + 1);
    }
    if let Some(env_rules) = &profile.env_rules {
        println!("env_rules:");
        for (index, rule) in env_rules.iter().enumerate() {
            println!("  {:>3}. {rule}", index + 1);
        }
    }
    println!("available_profiles: {}", config.profile_names().join(", "));
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_log(runtime: &RuntimeOptions, message: &str) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let log = OperationLog::open(&paths.log_dir)?;
    log.write(Level::Info, message)?;
    println!("log_file: {}", normalize_for_display(&log.current_log_path()));
    Ok(())
}

fn run_progress(runtime: &RuntimeOptions, category: &str, message: &str) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let log = OperationLog::open(&paths.log_dir)?;
    log.initialize()?;
    log.record_progress(&category.to_uppercase(), message)?;
    println!("progress_file: {}", normalize_for_display(&log.progress_path()));
    Ok(())
}

fn run_credentials(runtime: &RuntimeOptions, required: &[String]) -> Result<()> {
    let (paths, _) = resolve_runtime_paths(runtime)?;
    let credentials = load_credentials_if_present(&paths.env_path)?;

    println!("env_file: {}", normalize_for_display(&paths.env_path));
    println!("env_file_exists: {}", format_flag(paths.env_path.exists()));
    print_credentials(&credentials);
    print_diagnostics(runtime, &paths);

    require(&credentials, required)?;
    Ok(())
}

fn print_credentials(credentials: &Credentials) {
    println!("keys: {}", credentials.len());
    for (key, value) in credentials {
        println!("  {key}: {}", mask(value));
    }
}

fn resolve_profile(config: &ToolConfig, requested: Option<&str>) -> Result<Profile> {
    let name = match requested {
        Some(name) => name.to_string(),
        None => config.default_profile_name(),
    };
    config
        .resolve_profile(&name)
        .with_context(|| format!("failed to load profile `{name}`"))
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<(ResolvedPaths, Credentials)> {
    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
        env_file: runtime.env_file.clone(),
        log_dir: runtime.log_dir.clone(),
    };
    resolve_runtime(&context, &overrides)
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
