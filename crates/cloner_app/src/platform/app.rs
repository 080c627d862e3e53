use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cloner_engine::CloneHandle;
use engine_logging::{engine_error, engine_info, LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

use super::cli::Cli;
use super::config::{build_settings, load_file_config, FileConfig};
use super::render::Renderer;

pub fn run_app() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let destination = if cli.log_file {
        LogDestination::Both(DEFAULT_LOG_FILE.into())
    } else {
        LogDestination::Terminal
    };
    if !engine_logging::initialize(destination, level) {
        eprintln!("Warning: logging is disabled");
    }
}

/// Run one clone to completion. `Ok(false)` means the run ended in a fatal
/// error that was already reported on the event stream.
async fn execute(cli: Cli) -> Result<bool> {
    let file_config = match &cli.config {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    let settings = build_settings(&file_config, &cli);
    engine_info!("Starting clone of {} with {:?}", cli.url, settings);

    let mut handle =
        CloneHandle::start(cli.url.clone(), settings).context("failed to set up HTTP client")?;
    let mut renderer = Renderer::new(cli.format, cli.verbose, io::stdout());
    while let Some(event) = handle.next_event().await {
        renderer
            .render(&event)
            .context("failed to write progress")?;
    }
    renderer.finish().context("failed to write summary")?;

    match handle.finish().await {
        Ok(report) => {
            engine_info!(
                "Archive {} written from workspace {}",
                report.archive_path.display(),
                report.workspace.display()
            );
            Ok(true)
        }
        Err(err) => {
            engine_error!("Clone of {} failed: {}", cli.url, err);
            Ok(false)
        }
    }
}
