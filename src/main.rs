//! Media Catalog - resumable media indexing and period transfers
//!
//! Command line front end: `index` builds or resumes the catalog of a
//! directory, `transfer` moves or copies one month into a library,
//! `stats` summarizes the latest index and `init-config` writes defaults.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use media_catalog::{
    BatchOutcome, Catalog, Cli, Command, Config, IndexOptions, IndexPhase, TransferStatus,
};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored, consistently formatted terminal output

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    /// Centered, bold title
    pub fn print_title(title: &str) {
        let width: usize = 60;
        let padding = width.saturating_sub(title.len()) / 2;
        let left_pad = " ".repeat(padding.saturating_sub(1));

        let _ = stdout().execute(Print(&format!(
            "{}{} {}{}\n",
            left_pad,
            "╔".bold().stylize(),
            title.bold().stylize(),
            "╗".bold().stylize(),
        )));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = style(value).with(color).bold();
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// One line per processed item: icon, source, destination or message
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let icon_styled = style(status_icon).with(status_color).bold();
        let source_styled = style(source).italic();
        let msg_styled = style(dest_or_msg).with(CliTheme::HINT);

        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(icon_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(source_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(msg_styled));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print("\n"));
        let _ = stdout().execute(Print(style("  📁 ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(style("Log file: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            cli_output::print_error(&format!("Error: {:#}", e));
            1
        }
    };
    std::process::exit(code);
}

/// Run the selected subcommand, returning the process exit code
fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Get the executable directory for Config and Log directories
    let exe_dir = get_executable_dir()?;
    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command_name(),
        "Media Catalog starting"
    );

    let config = load_config(&cli, &exe_dir)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    let code = match &cli.command {
        Command::Index {
            directory,
            output,
            update_base,
            file_limit,
            ..
        } => run_index(
            config,
            directory,
            output,
            IndexOptions {
                update_base: *update_base,
                file_limit: *file_limit,
            },
        )?,
        Command::Transfer {
            period,
            target,
            index,
            ..
        } => run_transfer(config, *period, target, index)?,
        Command::Stats { index } => run_stats(config, index)?,
        Command::InitConfig { path } => run_init_config(&config, path)?,
    };

    cli_output::print_log_path(&log_path.display().to_string());
    Ok(code)
}

fn run_index(config: Config, directory: &Path, output: &Path, options: IndexOptions) -> Result<i32> {
    use cli_output::*;

    let catalog = Catalog::new(config, output);
    let report = catalog.index(directory, options, |progress| {
        if progress.phase == IndexPhase::Checkpointing {
            print_hint(&format!(
                "Checkpoint saved: {}/{} files",
                progress.processed, progress.total
            ));
        }
    })?;

    print_separator();
    print_title(if report.is_complete() {
        "Indexing complete"
    } else {
        "Indexing suspended"
    });
    print_separator();

    print_blank();
    print_stat("Discovered", &report.discovered.to_string(), CliTheme::ACCENT);
    print_stat("Processed", &report.processed.to_string(), CliTheme::SUCCESS);
    print_stat("Reused", &report.reused.to_string(), CliTheme::ACCENT);
    print_stat("Failed", &report.failed.to_string(), CliTheme::ERROR);
    print_stat("Records", &report.index.total_count().to_string(), CliTheme::SUCCESS);
    print_stat("Snapshot", &report.snapshot.display().to_string(), CliTheme::HINT);
    print_blank();

    let outcome = report.outcome();
    if report.failed > 0 {
        print_warning("Some files could not be indexed; see the log for details");
    }
    if !report.is_complete() {
        print_warning("File limit reached; run the same command again to continue");
    }

    info!(
        processed = report.processed,
        failed = report.failed,
        ?outcome,
        "Index run finished"
    );
    Ok(outcome.exit_code())
}

fn run_transfer(
    config: Config,
    period: media_catalog::Period,
    target: &Path,
    index: &Path,
) -> Result<i32> {
    use cli_output::*;

    let verbose = config.verbose;
    let mode = config.transfer_mode;
    let dry_run = config.dry_run;
    let catalog = Catalog::new(config, index);
    let result = catalog.transfer_period(period, target, mode, dry_run)?;
    let outcome = result.report.outcome();

    print_separator();
    print_title(&format!("Transfer {}", period));
    print_separator();

    print_blank();
    print_stat("Planned", &result.operations.len().to_string(), CliTheme::ACCENT);
    print_stat("Completed", &result.report.completed.to_string(), CliTheme::SUCCESS);
    print_stat("Failed", &result.report.failed.to_string(), CliTheme::ERROR);
    print_stat(
        "Already transferred",
        &result.already_transferred.to_string(),
        CliTheme::WARNING,
    );
    print_blank();

    for op in &result.operations {
        let source = op.source.display().to_string();
        match &op.status {
            TransferStatus::Failed { error } => {
                print_result("✗", CliTheme::ERROR, &source, error);
            }
            TransferStatus::Completed if verbose => {
                let icon = if dry_run { "~" } else { "✓" };
                print_result(
                    icon,
                    CliTheme::SUCCESS,
                    &source,
                    &format!("→ {}", op.destination.display()),
                );
            }
            _ => {}
        }
    }

    match outcome {
        BatchOutcome::Empty => print_hint("Nothing to transfer for this period"),
        BatchOutcome::Partial => print_warning("Some files could not be transferred"),
        BatchOutcome::Failed => print_error("No file could be transferred"),
        BatchOutcome::Success => {}
    }
    if dry_run {
        print_separator();
        print_warning("Dry run: no files were changed");
    }

    info!(summary = %result.report.summary(), ?outcome, "Transfer finished");
    Ok(outcome.exit_code())
}

fn run_stats(config: Config, index: &Path) -> Result<i32> {
    use cli_output::*;

    let catalog = Catalog::new(config, index);
    let (snapshot, latest) = catalog.load()?;
    let stats = media_catalog::IndexStats::from_index(&latest);

    print_separator();
    print_title("Index statistics");
    print_separator();

    print_blank();
    print_stat("Snapshot", &snapshot.display().to_string(), CliTheme::HINT);
    print_stat("Files", &stats.total_files.to_string(), CliTheme::ACCENT);
    print_stat(
        "Size",
        &format!("{:.1} MB", stats.total_bytes as f64 / (1024.0 * 1024.0)),
        CliTheme::ACCENT,
    );
    print_stat("Transferred", &stats.transferred.to_string(), CliTheme::SUCCESS);
    print_stat(
        "Placeholder dates only",
        &stats.placeholder_only.to_string(),
        CliTheme::WARNING,
    );
    print_stat(
        "Duplicate content",
        &stats.duplicate_content.to_string(),
        CliTheme::WARNING,
    );
    print_blank();

    print_separator();
    for (period, figures) in &stats.by_period {
        print_stat(
            &period.to_string(),
            &format!("{} files, {} transferred", figures.files, figures.transferred),
            if figures.transferred == figures.files {
                CliTheme::SUCCESS
            } else {
                CliTheme::ACCENT
            },
        );
    }
    print_blank();
    for (extension, count) in &stats.by_extension {
        print_stat(extension, &count.to_string(), CliTheme::HINT);
    }

    let pending: Vec<String> = stats.pending_periods().map(|p| p.to_string()).collect();
    if !pending.is_empty() {
        print_blank();
        print_hint(&format!("Periods left to transfer: {}", pending.join(", ")));
    }

    info!(snapshot = %snapshot.display(), summary = %stats.summary(), "Statistics computed");
    Ok(0)
}

fn run_init_config(config: &Config, path: &Path) -> Result<i32> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    config.save_to_file(path)?;
    cli_output::print_hint(&format!("Configuration written to {}", path.display()));
    Ok(0)
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path based on config file or subcommand
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        let config_log_dir = log_dir.join(&config_name);
        let log_filename = format!("{}_{}.log", config_name, timestamp);
        config_log_dir.join(log_filename)
    } else {
        let log_filename = format!("{}_{}.log", cli.command_name(), timestamp);
        log_dir.join(log_filename)
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file, then apply CLI overrides
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let base = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        Config::load_from_file(&resolved_path)?
    } else {
        Config::default()
    };

    let config = cli.merge_with_config(base);
    config.validate()?;
    Ok(config)
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(Some(guard))
}
