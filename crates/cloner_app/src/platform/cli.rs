//! Command-line interface of the cloner.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Clone one web page and its static assets into a zip archive.
///
/// Progress is written to stdout, either as server-sent-event frames or as
/// readable lines. Logs go to stderr and, with `--log-file`, to
/// `./cloner.log`.
#[derive(Parser, Debug)]
#[command(name = "cloner_app")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Page to clone. `http://` is assumed when no scheme is given.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Directory receiving the workspace and the archive.
    ///
    /// Defaults to the system temp directory.
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of asset downloads in flight.
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// User agent sent with every request.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// How progress is printed.
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// RON file with default settings; flags override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write logs to ./cloner.log.
    #[arg(long)]
    pub log_file: bool,

    /// Verbose output.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// `event:`/`data:` frames, one per progress event.
    Sse,
    /// One readable line per event.
    Human,
}
