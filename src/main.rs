use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;

use site_backup::cli::{Args, Commands, RunOpts};
use site_backup::config::Settings;
use site_backup::constants::DEFAULT_CONFIG_NAME;
use site_backup::pipeline;
use site_backup::security::CredentialScrubber;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose, args.log_file.as_deref())?;

    match &args.command {
        Commands::InitConfig { path } => {
            info!("Creating settings file at {}", path.display());
            Settings::create_default_file(path)?;
            info!("Settings created; fill in the credentials section before running a backup");
            Ok(())
        }
        Commands::Run(opts) => {
            let success = run_backup(opts)?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Initialize terminal logging, plus a log file when requested
fn initialize_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open log file {}", path.display()))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

/// Load settings from the given path, or from the default file when present
fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::from_yaml_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
            if default_path.exists() {
                Settings::from_yaml_file(&default_path)?
            } else {
                debug!("No settings file found, using defaults");
                Settings::default()
            }
        }
    };

    settings.apply_env_overrides();
    Ok(settings)
}

/// Run one backup and print its outcome. Returns whether it succeeded.
fn run_backup(opts: &RunOpts) -> Result<bool> {
    let settings = load_settings(opts.config.as_deref())?;
    let job = settings.backup_job(opts.source.as_deref(), &opts.exclude, opts.prefix.as_deref())?;
    let scrubber = CredentialScrubber::new(&job.credentials);

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let outcome = runtime.block_on(pipeline::run_backup(&job, &settings));

    if opts.json {
        let mut report = outcome.report();
        report.error = report.error.map(|e| scrubber.scrub(&e));
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize outcome")?;
        println!("{}", json);
    } else {
        println!("{}", scrubber.scrub(&outcome.message()));
    }

    Ok(outcome.is_success())
}
