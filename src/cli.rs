use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::DEFAULT_CONFIG_NAME;

/// Command-line arguments for the site-backup tool.
#[derive(Parser, Debug)]
#[clap(
    name = "site-backup",
    version,
    about = "Archive a site directory and upload it to S3-compatible storage"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Also write log output to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive the site and upload the artifact
    Run(RunOpts),

    /// Create a settings file with empty credentials
    InitConfig {
        /// Path to output settings file
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },
}

/// Options for one backup run. Values given here override the settings file.
#[derive(ClapArgs, Debug)]
pub struct RunOpts {
    /// Path to settings YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory to back up
    #[clap(short, long)]
    pub source: Option<PathBuf>,

    /// Extra exclusion pattern (regex on the relative path, repeatable)
    #[clap(short, long = "exclude")]
    pub exclude: Vec<String>,

    /// Object key prefix
    #[clap(short, long)]
    pub prefix: Option<String>,

    /// Print the outcome as JSON
    #[clap(long)]
    pub json: bool,
}
