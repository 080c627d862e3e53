use std::io::{self, Write};

use cloner_core::{ProgressEvent, RunOutcome, RunState, RunSummary};

use super::cli::OutputFormat;

/// Prints progress events and keeps the running totals.
pub(crate) struct Renderer<W: Write> {
    format: OutputFormat,
    verbose: bool,
    out: W,
    state: RunState,
}

impl<W: Write> Renderer<W> {
    pub(crate) fn new(format: OutputFormat, verbose: bool, out: W) -> Self {
        Self {
            format,
            verbose,
            out,
            state: RunState::new(),
        }
    }

    pub(crate) fn render(&mut self, event: &ProgressEvent) -> io::Result<()> {
        self.state.apply(event);
        match self.format {
            OutputFormat::Sse => self.out.write_all(event.to_sse().as_bytes())?,
            OutputFormat::Human => {
                if let Some(line) = human_line(event, self.state.view(), self.verbose) {
                    writeln!(self.out, "{line}")?;
                }
            }
        }
        self.out.flush()
    }

    /// Print the closing summary (human format only) and return the totals.
    pub(crate) fn finish(mut self) -> io::Result<(RunSummary, W)> {
        let summary = self.state.view().clone();
        if self.format == OutputFormat::Human {
            writeln!(
                self.out,
                "{} saved, {} failed, {} bytes",
                summary.assets_saved, summary.assets_failed, summary.bytes_saved
            )?;
            for error in &summary.stage_errors {
                writeln!(self.out, "warning: {error}")?;
            }
            if summary.outcome == RunOutcome::Running {
                writeln!(self.out, "run ended without a result")?;
            }
            self.out.flush()?;
        }
        Ok((summary, self.out))
    }
}

fn human_line(event: &ProgressEvent, summary: &RunSummary, verbose: bool) -> Option<String> {
    match event {
        ProgressEvent::Status(status) => Some(format!("> {status}")),
        ProgressEvent::Meta(meta) => Some(format!(
            "found {} assets",
            meta.total_items.saturating_sub(1)
        )),
        ProgressEvent::Asset(asset) if verbose => {
            Some(format!("  saved {} ({} bytes)", asset.url, asset.size))
        }
        ProgressEvent::Asset(_) => None,
        ProgressEvent::AssetError(failure) => {
            Some(format!("  failed {}: {}", failure.url, failure.error))
        }
        ProgressEvent::Progress(snapshot) => {
            let done = summary.assets_saved + summary.assets_failed;
            let total = summary
                .total_items
                .map_or_else(|| "?".to_string(), |n| n.saturating_sub(1).to_string());
            Some(format!(
                "  {done}/{total} assets, {} bytes, {}/s",
                snapshot.bytes_total,
                human_bytes(snapshot.speed_bps)
            ))
        }
        ProgressEvent::Error { stage, message } => Some(format!("error: {stage}: {message}")),
        ProgressEvent::Done(done) => Some(format!(
            "done in {}s: {}",
            done.elapsed_seconds, done.zip_path
        )),
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
