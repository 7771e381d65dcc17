use anyhow::{bail, Context, Result};
use cimgen::config::{AppConfig, DEFAULT_CONFIG_PATH};
use cimgen::directory::LdapDirectory;
use cimgen::logging;
use cimgen::pipeline::{FileOutcome, Pipeline, RunEvent, RunMode, RunOptions, RunSummary};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::{error, info, Level};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "cimgen")]
#[command(about = "Convert personnel CSV files into CIM access and energy model XML")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the input CSV files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Identity mode (defaults to directory when enabled in the configuration)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Domain identifier for local mode (prompted for when omitted)
    #[arg(long)]
    domain_guid: Option<String>,

    /// Directory bind password (prompted for without echo when omitted)
    #[arg(long, env = "CIMGEN_DIRECTORY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Do not write per-file log files
    #[arg(long)]
    no_file_logs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Look identifiers up in the directory by login
    Directory,
    /// Keep identifiers from the input, generate missing ones
    Local,
}

fn prompt_domain_guid() -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("--domain-guid is required in local mode when stdin is not a terminal");
    }
    print!("Domain identifier (GUID): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read domain identifier")?;
    Ok(line.trim().to_string())
}

/// Password from the flag or environment, else an echo-free prompt on a terminal.
fn directory_password(
    given: Option<String>,
    interactive: bool,
    prompt: impl FnOnce() -> io::Result<String>,
) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None if interactive => prompt().context("Failed to read directory password"),
        None => bail!(
            "Directory password missing (--password or CIMGEN_DIRECTORY_PASSWORD) and stdin is not a terminal"
        ),
    }
}

fn print_summary(summary: &RunSummary, pipeline_stats: &cimgen::stats::RunStats, elapsed: f64) {
    println!();
    println!("=== Summary ===");
    println!("Files found:        {}", summary.files_found);
    println!("Files converted:    {}", summary.files_converted);
    println!("Files failed:       {}", summary.files_failed);
    println!("Records written:    {}", summary.records);
    println!("Rows without name:  {}", summary.rows_skipped);
    println!("New identifiers:    {}", pipeline_stats.generated());
    println!("Not in directory:   {}", summary.unresolved);
    if let Some(path) = &summary.audit_file {
        println!("Audit file:         {}", path.display());
    }
    println!("Total time:         {:.2}s", elapsed);
}

fn run(cli: Cli, level: Level) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path, true)?,
        None => AppConfig::load(&PathBuf::from(DEFAULT_CONFIG_PATH), false)?,
    };

    let mode = cli.mode.unwrap_or(if config.directory.enabled {
        Mode::Directory
    } else {
        Mode::Local
    });
    if mode == Mode::Directory && !config.directory.enabled {
        bail!("Directory mode requested but directory.enabled is false in the configuration");
    }

    let domain_guid = match (mode, cli.domain_guid) {
        (Mode::Local, Some(guid)) => Some(guid),
        (Mode::Local, None) => Some(prompt_domain_guid()?),
        (Mode::Directory, _) => None,
    };
    let password = match mode {
        Mode::Directory => Some(directory_password(
            cli.password,
            io::stdin().is_terminal(),
            || rpassword::prompt_password(format!("Password for {}: ", config.directory.bind_user)),
        )?),
        Mode::Local => None,
    };

    let mut options = RunOptions::new(&cli.dir);
    options.file_logs = !cli.no_file_logs;
    options.console_level = level;

    let (tx, rx) = mpsc::channel();
    let pipeline = Pipeline::new(&config, options).with_events(tx);
    let stats = pipeline.stats();
    let start = Instant::now();

    let summary = thread::scope(|scope| {
        let worker = scope.spawn(|| -> Result<RunSummary> {
            let pipeline = pipeline;
            match (domain_guid, password) {
                (Some(domain_id), _) => pipeline.run(RunMode::Local { domain_id }),
                (None, Some(password)) => {
                    let mut directory = LdapDirectory::connect(&config.directory, &password)
                        .context("Directory authentication failed")?;
                    pipeline.run(RunMode::Directory(&mut directory))
                }
                (None, None) => bail!("No identity mode could be established"),
            }
        });

        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        // The worker drops its sender when it finishes, which ends this loop
        for event in rx {
            match event {
                RunEvent::FilesDiscovered(total) => pb.set_length(total as u64),
                RunEvent::FileStarted { name, .. } => pb.set_message(name),
                RunEvent::FileFinished { name, outcome } => {
                    if let FileOutcome::Failed(reason) = outcome {
                        pb.println(format!("{}: failed: {}", name, reason));
                    }
                    pb.inc(1);
                    pb.set_message(format!("{} records", stats.records()));
                }
                RunEvent::AuditWritten { path, entries } => {
                    pb.println(format!("{} logins not found, see {}", entries, path.display()));
                }
            }
        }
        pb.finish_and_clear();

        match worker.join() {
            Ok(result) => result,
            Err(_) => bail!("Worker thread panicked"),
        }
    })?;

    if summary.files_found == 0 {
        println!("No CSV files to process in {}", cli.dir.display());
        return Ok(());
    }
    print_summary(&summary, &stats, start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = logging::level_for(cli.verbose);

    if let Err(e) = logging::init_console(level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, level) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_password_skips_prompt() -> Result<()> {
        let password = directory_password(Some("secret".to_string()), true, || {
            panic!("prompted although a password was given")
        })?;
        assert_eq!(password, "secret");
        Ok(())
    }

    #[test]
    fn missing_password_is_prompted_on_terminal() -> Result<()> {
        let password = directory_password(None, true, || Ok("typed".to_string()))?;
        assert_eq!(password, "typed");
        Ok(())
    }

    #[test]
    fn missing_password_without_terminal_is_an_error() {
        assert!(directory_password(None, false, || Ok("typed".to_string())).is_err());
    }
}
