use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqlshape::mode::Mode;
use sqlshape::report::{FileStatus, Report};

/// sqlshape - SQL statement pretty-printer.
/// Reformats queries and schema statements, optionally with ANSI highlighting.
#[derive(Parser, Debug)]
#[command(name = "sqlshape", version, about)]
struct Cli {
    /// Files or directories to format. Use "-" to read from stdin.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Formatter style: auto, basic, ddl, highlight, none.
    #[arg(short = 's', long)]
    style: Option<String>,

    /// Color keywords and literals after formatting.
    #[arg(long)]
    highlight: bool,

    /// Check formatting without writing changes.
    #[arg(long)]
    check: bool,

    /// Show formatting diff.
    #[arg(long)]
    diff: bool,

    /// Skip safety equivalence check (faster).
    #[arg(long)]
    fast: bool,

    /// Glob patterns to exclude.
    #[arg(long)]
    exclude: Vec<String>,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only).
    #[arg(short, long)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progressbar: bool,

    /// Force color output.
    #[arg(long)]
    force_color: bool,

    /// Disable color output.
    #[arg(long)]
    no_color: bool,

    /// Number of threads for parallel processing (0 = all cores).
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Disable multi-threaded processing.
    #[arg(long)]
    single_process: bool,

    /// Path to config file (sqlshape.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    match try_main(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn try_main(cli: Cli) -> Result<i32> {
    setup_logging(&cli.log_level)?;

    let is_stdin = cli.files.len() == 1 && cli.files[0].to_string_lossy() == "-";

    let base_mode = sqlshape::load_config(&cli.files, cli.config.as_deref())
        .context("Configuration error")?;
    let mode = merge_mode(base_mode, &cli);

    if is_stdin {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("Error reading stdin")?;
        let formatted = sqlshape::format_string(&source, &mode)?;
        print!("{}", formatted);
        return Ok(0);
    }

    let report = sqlshape::run(&cli.files, &mode)?;

    if !mode.quiet {
        print_verbose_results(&report, &mode);
        report.print_summary(mode.color())?;
    }
    report.print_errors(mode.color())?;

    if report.has_errors() {
        Ok(2)
    } else if mode.check && report.has_changes() {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to install log subscriber")
}

/// Command-line flags override values loaded from the config file.
fn merge_mode(base: Mode, cli: &Cli) -> Mode {
    Mode {
        style_name: cli.style.clone().unwrap_or(base.style_name),
        highlight: cli.highlight || base.highlight,
        check: cli.check,
        diff: cli.diff,
        fast: cli.fast || base.fast,
        exclude: if cli.exclude.is_empty() {
            base.exclude
        } else {
            cli.exclude.clone()
        },
        verbose: cli.verbose,
        quiet: cli.quiet,
        no_progressbar: cli.no_progressbar,
        no_color: cli.no_color,
        force_color: cli.force_color,
        threads: cli.threads.unwrap_or(base.threads),
        single_process: cli.single_process,
    }
}

fn print_verbose_results(report: &Report, mode: &Mode) {
    if !mode.verbose {
        return;
    }
    for result in &report.results {
        if result.status == FileStatus::Changed {
            let verb = if mode.check || mode.diff {
                "would reformat"
            } else {
                "reformatted"
            };
            eprintln!("{} {}", verb, result.path.display());
        }
    }
}
