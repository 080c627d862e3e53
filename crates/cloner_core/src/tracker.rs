use crate::{ErrorStage, ProgressEvent, Status};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    Running,
    Done {
        zip_path: String,
        zip_name: String,
        elapsed_seconds: u64,
    },
    Failed {
        stage: ErrorStage,
        message: String,
    },
}

/// Whether an event changed the tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    /// The stream already ended; late events are dropped.
    IgnoredAfterTerminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total_items: Option<usize>,
    pub assets_saved: usize,
    pub assets_failed: usize,
    pub bytes_saved: u64,
    pub last_speed_bps: u64,
    pub last_status: Option<Status>,
    pub stage_errors: Vec<String>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    /// Assets announced by `meta` that have not reported an outcome yet.
    pub fn pending_assets(&self) -> Option<usize> {
        self.total_items.map(|total| {
            total
                .saturating_sub(1)
                .saturating_sub(self.assets_saved + self.assets_failed)
        })
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != RunOutcome::Running
    }
}

/// Consumer-side fold of a progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    summary: RunSummary,
    late_events: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ProgressEvent) -> Applied {
        if self.summary.is_finished() {
            self.late_events += 1;
            return Applied::IgnoredAfterTerminal;
        }

        let summary = &mut self.summary;
        match event {
            ProgressEvent::Status(status) => summary.last_status = Some(status.clone()),
            ProgressEvent::Meta(meta) => summary.total_items = Some(meta.total_items),
            ProgressEvent::Asset(asset) => {
                summary.assets_saved += 1;
                summary.bytes_saved += asset.size;
            }
            ProgressEvent::AssetError(_) => summary.assets_failed += 1,
            ProgressEvent::Progress(snapshot) => summary.last_speed_bps = snapshot.speed_bps,
            ProgressEvent::Error { stage, message } => {
                if stage.is_fatal() {
                    summary.outcome = RunOutcome::Failed {
                        stage: *stage,
                        message: message.clone(),
                    };
                } else {
                    summary.stage_errors.push(format!("{stage}: {message}"));
                }
            }
            ProgressEvent::Done(done) => {
                summary.outcome = RunOutcome::Done {
                    zip_path: done.zip_path.clone(),
                    zip_name: done.zip_name.clone(),
                    elapsed_seconds: done.elapsed_seconds,
                };
            }
        }
        Applied::Accepted
    }

    pub fn view(&self) -> &RunSummary {
        &self.summary
    }

    pub fn late_events(&self) -> usize {
        self.late_events
    }
}
