//! CLI entrypoint for the bufopen harness.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bufopen::{BufferConfig, BufferedFile, OpenFlags};
use bufopen_harness::structured_log::{LogEmitter, validate_log_file};
use bufopen_harness::{HarnessResult, ScenarioRunner};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Conformance tooling for bufopen.
#[derive(Debug, Parser)]
#[command(name = "bufopen-harness")]
#[command(about = "Scenario runner and file driver for bufopen")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the conformance scenarios in a scratch directory.
    Run {
        /// Write a JSONL run log to this path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Keep scenario files under this directory instead of a temp dir.
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Only run scenarios whose name contains this string.
        #[arg(long)]
        filter: Option<String>,
        /// Run identifier used as the trace-id prefix.
        #[arg(long, default_value = "bufopen")]
        run_id: String,
    },
    /// Insert text before the current content of a file.
    Prepend {
        path: PathBuf,
        text: String,
        /// Buffer capacity in bytes (default: BUFOPEN_BUFSIZE or 4096).
        #[arg(long)]
        bufsize: Option<usize>,
    },
    /// Append text to a file, creating it if needed.
    Append {
        path: PathBuf,
        text: String,
        #[arg(long)]
        bufsize: Option<usize>,
    },
    /// Print a file to stdout through a buffered handle.
    Cat {
        path: PathBuf,
        #[arg(long)]
        bufsize: Option<usize>,
    },
    /// Validate a JSONL run log.
    ValidateLog { path: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bufopen-harness: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command) -> HarnessResult<ExitCode> {
    match command {
        Command::Run {
            log,
            workdir,
            filter,
            run_id,
        } => run_scenarios(log.as_deref(), workdir, filter, &run_id),
        Command::Prepend {
            path,
            text,
            bufsize,
        } => {
            let mut f = BufferedFile::open_with(
                &path,
                OpenFlags::read_write().with_create(0o644).with_prepend(),
                &config(bufsize),
            )?;
            f.write(text.as_bytes())?;
            f.close()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Append {
            path,
            text,
            bufsize,
        } => {
            let mut f = BufferedFile::open_with(
                &path,
                OpenFlags::write_only().with_create(0o644).with_append(),
                &config(bufsize),
            )?;
            f.write(text.as_bytes())?;
            f.close()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Cat { path, bufsize } => {
            let mut f = BufferedFile::open_with(&path, OpenFlags::read_only(), &config(bufsize))?;
            let mut chunk = vec![0u8; f.capacity()];
            let mut stdout = std::io::stdout().lock();
            loop {
                let n = f.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&chunk[..n])?;
            }
            stdout.flush()?;
            f.close()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ValidateLog { path } => {
            let (valid, errors) = validate_log_file(&path)?;
            for e in &errors {
                eprintln!("{e}");
            }
            println!("{valid} valid line(s), {} error(s)", errors.len());
            Ok(if errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn config(bufsize: Option<usize>) -> BufferConfig {
    let mut config = BufferConfig::from_env();
    if let Some(n) = bufsize {
        config.capacity = n.max(1);
    }
    config
}

fn run_scenarios(
    log: Option<&Path>,
    workdir: Option<PathBuf>,
    filter: Option<String>,
    run_id: &str,
) -> HarnessResult<ExitCode> {
    let mut runner = ScenarioRunner::new(run_id);
    if let Some(filter) = filter {
        runner = runner.with_filter(filter);
    }

    // The temp dir must outlive the run.
    let temp;
    let root = match workdir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => {
            temp = tempfile::Builder::new().prefix("bufopen-harness-").tempdir()?;
            temp.path().to_path_buf()
        }
    };

    let results = match log {
        Some(path) => {
            let mut emitter = LogEmitter::to_file(path, run_id)?;
            runner.run_logged(&root, &mut emitter)?
        }
        None => runner.run(&root)?,
    };

    for r in &results {
        let status = if r.passed { "PASS" } else { "FAIL" };
        match &r.detail {
            Some(detail) => println!("{status} {:<32} {detail}", r.name),
            None => println!("{status} {}", r.name),
        }
    }
    let failed = results.iter().filter(|r| !r.passed).count();
    println!("{} scenario(s), {failed} failed", results.len());

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
