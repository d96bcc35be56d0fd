//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use parking_lot::Mutex;
use serde_json::{Value, json};
use thiserror::Error;

use file_shredder::core::config::Config;
use file_shredder::logger::jsonl::{AuditEvent, AuditLogger, AuditRecord, Severity};
use file_shredder::shred::shredder::Shredder;
use file_shredder::shred::tree::{DirectoryOutcome, TreeDestroyer};

/// fshred — secure, unrecoverable destruction of files and directory trees.
#[derive(Debug, Parser)]
#[command(
    name = "fshred",
    author,
    version,
    about = "fshred - Secure File Shredder",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity (per-pass progress).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Irreversibly destroy files and directory trees.
    Destroy(DestroyArgs),
    /// View and validate configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct DestroyArgs {
    /// Files or directories to destroy.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
    /// Overwrite passes before the final random pass.
    #[arg(short, long, value_name = "N")]
    passes: Option<usize>,
    /// Skip the interactive confirmation prompt.
    #[arg(short, long)]
    force: bool,
    /// Enumerate what would be destroyed without touching anything.
    #[arg(long)]
    dry_run: bool,
    /// Worker threads for directory destruction (files only span threads).
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the effective config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration and report problems.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Destroy(args) => run_destroy(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── destroy ────────────────────

#[derive(Debug, Default)]
struct DestroyTotals {
    files_shredded: usize,
    files_failed: usize,
    directories_removed: usize,
    bytes_shredded: u64,
    failures: Vec<(PathBuf, String)>,
}

fn run_destroy(cli: &Cli, args: &DestroyArgs) -> Result<(), CliError> {
    let mut config =
        Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))?;
    if let Some(passes) = args.passes {
        config.shred.passes = passes;
    }
    let jobs = resolve_jobs(args.jobs, config.tree.parallelism)?;
    config
        .validate()
        .map_err(|e| CliError::User(e.to_string()))?;

    if args.dry_run {
        return run_dry_run(cli, args);
    }

    if !args.force {
        if !io::stdin().is_terminal() {
            return Err(CliError::User(
                "refusing to destroy without confirmation on a non-interactive stdin; pass --force"
                    .to_string(),
            ));
        }
        if !confirm_destruction(&args.paths)? {
            println!("Aborted; nothing was touched.");
            return Ok(());
        }
    }

    let logger = if config.logging.enabled {
        Some(Arc::new(Mutex::new(AuditLogger::open(
            config.logging.clone(),
        ))))
    } else {
        None
    };

    let start = Instant::now();
    let mut totals = DestroyTotals::default();

    for path in &args.paths {
        let is_dir = fs::symlink_metadata(path)
            .map(|m| m.is_dir() && !m.file_type().is_symlink())
            .unwrap_or(false);
        if is_dir {
            destroy_directory(cli, &config, jobs, logger.clone(), path, &mut totals);
        } else {
            destroy_single_file(cli, &config, logger.clone(), path, &mut totals);
        }
    }

    if let Some(logger) = &logger {
        logger.lock().flush();
    }
    let elapsed = start.elapsed();

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                println!(
                    "Destroyed {} file(s), {} ({} directories removed) in {:.1}s.",
                    totals.files_shredded,
                    format_bytes(totals.bytes_shredded),
                    totals.directories_removed,
                    elapsed.as_secs_f64()
                );
            }
            if !totals.failures.is_empty() {
                eprintln!("{}", "Some entries could not be destroyed:".yellow());
                for (path, error) in &totals.failures {
                    eprintln!("  {}: {error}", path.display());
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "destroy",
                "files_shredded": totals.files_shredded,
                "files_failed": totals.files_failed,
                "directories_removed": totals.directories_removed,
                "bytes_shredded": totals.bytes_shredded,
                "elapsed_seconds": elapsed.as_secs_f64(),
                "failures": totals
                    .failures
                    .iter()
                    .map(|(path, error)| json!({
                        "path": path.to_string_lossy(),
                        "error": error,
                    }))
                    .collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }

    if totals.failures.is_empty() {
        Ok(())
    } else if totals.files_shredded > 0 || totals.directories_removed > 0 {
        Err(CliError::Partial(format!(
            "{} of {} entries could not be destroyed",
            totals.failures.len(),
            totals.failures.len() + totals.files_shredded
        )))
    } else {
        Err(CliError::Runtime("no entries could be destroyed".to_string()))
    }
}

fn destroy_single_file(
    cli: &Cli,
    config: &Config,
    logger: Option<Arc<Mutex<AuditLogger>>>,
    path: &Path,
    totals: &mut DestroyTotals,
) {
    let mut shredder = Shredder::new(config.shred.clone());
    if cli.verbose {
        shredder = shredder.with_observer(Box::new(|path, pass, total, pattern| {
            eprintln!(
                "  pass {pass}/{total} [{}] {}",
                pattern.label(),
                path.display()
            );
        }));
    }

    match shredder.shred(path) {
        Ok(report) => {
            totals.files_shredded += 1;
            totals.bytes_shredded += report.bytes;
            if let Some(logger) = &logger {
                let mut record = AuditRecord::new(AuditEvent::FileShredded, Severity::Info);
                record.path = Some(report.resolved.to_string_lossy().to_string());
                record.size = Some(report.bytes);
                record.passes = Some(report.passes);
                record.duration_ms =
                    Some(u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX));
                logger.lock().record(&record);
            }
            if !cli.quiet && output_mode(cli) == OutputMode::Human {
                println!(
                    "  {} {} ({}, {} passes)",
                    "shredded".green(),
                    path.display(),
                    format_bytes(report.bytes),
                    report.passes
                );
            }
        }
        Err(err) => {
            totals.files_failed += 1;
            if let Some(logger) = &logger {
                let mut record = AuditRecord::new(AuditEvent::FileShredFailed, Severity::Warning);
                record.path = Some(path.to_string_lossy().to_string());
                record.error_code = Some(err.code().to_string());
                record.error_message = Some(err.to_string());
                logger.lock().record(&record);
            }
            totals.failures.push((path.to_path_buf(), err.to_string()));
        }
    }
}

fn destroy_directory(
    cli: &Cli,
    config: &Config,
    jobs: usize,
    logger: Option<Arc<Mutex<AuditLogger>>>,
    path: &Path,
    totals: &mut DestroyTotals,
) {
    let mut destroyer = TreeDestroyer::new(config.shred.clone()).with_parallelism(jobs);
    if let Some(logger) = &logger {
        destroyer = destroyer.with_logger(Arc::clone(logger));
    }

    match destroyer.destroy_tree(path) {
        Ok(outcome) => {
            if !cli.quiet && output_mode(cli) == OutputMode::Human {
                print_outcome(path, &outcome);
            }
            totals.files_shredded += outcome.files_shredded;
            totals.files_failed += outcome.files_failed;
            totals.directories_removed += outcome.directories_removed;
            totals.bytes_shredded += outcome.bytes_shredded;
            for failure in outcome.failures {
                totals.failures.push((failure.path, failure.error));
            }
        }
        Err(err) => {
            // The whole tree was refused (bad root); nothing was destroyed.
            if let Some(logger) = &logger {
                let mut record = AuditRecord::new(AuditEvent::Error, Severity::Critical);
                record.path = Some(path.to_string_lossy().to_string());
                record.error_code = Some(err.code().to_string());
                record.error_message = Some(err.to_string());
                logger.lock().record(&record);
            }
            totals.failures.push((path.to_path_buf(), err.to_string()));
        }
    }
}

fn print_outcome(root: &Path, outcome: &DirectoryOutcome) {
    let status = if outcome.is_complete() {
        "destroyed".green()
    } else {
        "partially destroyed".yellow()
    };
    println!(
        "  {} {} ({} files, {}, {} directories)",
        status,
        root.display(),
        outcome.files_shredded,
        format_bytes(outcome.bytes_shredded),
        outcome.directories_removed
    );
}

/// Explicit confirmation: the user must type the full word.
fn confirm_destruction(paths: &[PathBuf]) -> Result<bool, CliError> {
    println!(
        "{}",
        "This will IRREVERSIBLY destroy the following:".red().bold()
    );
    for path in paths {
        println!("  {}", path.display());
    }
    print!("Type 'yes' to proceed: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

/// Worker count for tree destruction: the flag wins over the config default,
/// and 0 is rejected the same way `tree.parallelism = 0` is.
fn resolve_jobs(flag: Option<usize>, config_default: usize) -> Result<usize, CliError> {
    match flag {
        Some(0) => Err(CliError::User("--jobs must be >= 1".to_string())),
        Some(n) => Ok(n),
        None => Ok(config_default),
    }
}

fn run_dry_run(cli: &Cli, args: &DestroyArgs) -> Result<(), CliError> {
    let mut files: usize = 0;
    let mut directories: usize = 0;
    let mut bytes: u64 = 0;
    let mut missing: Vec<PathBuf> = Vec::new();

    for path in &args.paths {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() && !meta.file_type().is_symlink() => {
                directories += 1; // the root itself
                tally_tree(path, &mut files, &mut directories, &mut bytes);
            }
            Ok(meta) => {
                files += 1;
                bytes += meta.len();
            }
            Err(_) => missing.push(path.clone()),
        }
    }

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Dry run: {files} file(s), {} across {directories} directory(ies) would be destroyed.",
                format_bytes(bytes)
            );
            for path in &missing {
                eprintln!("  not found: {}", path.display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "destroy",
                "dry_run": true,
                "files": files,
                "directories": directories,
                "bytes": bytes,
                "missing": missing
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::User(format!(
            "{} path(s) do not exist",
            missing.len()
        )))
    }
}

fn tally_tree(dir: &Path, files: &mut usize, directories: &mut usize, bytes: &mut u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() && !file_type.is_symlink() {
            *directories += 1;
            tally_tree(&entry.path(), files, directories, bytes);
        } else {
            *files += 1;
            *bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())
                .map_err(|e| CliError::Runtime(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(_) => {
                match output_mode(cli) {
                    OutputMode::Human => println!("Configuration is valid."),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── helpers ────────────────────

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("FSHRED_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
