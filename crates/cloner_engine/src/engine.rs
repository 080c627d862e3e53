use std::sync::Arc;

use cloner_core::ProgressEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CloneSettings;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::pipeline::{run_clone, CloneError, CloneReport};
use crate::sink::ChannelProgressSink;
use crate::FetchError;

/// A clone running on the tokio runtime, observed through its event stream.
///
/// Dropping the handle (or just its receiver) stops the run at the next
/// stage boundary.
pub struct CloneHandle {
    event_rx: mpsc::UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<Result<CloneReport, CloneError>>,
}

impl CloneHandle {
    /// Start a clone with the default HTTP client. Must be called from within
    /// a tokio runtime.
    pub fn start(raw_url: impl Into<String>, settings: CloneSettings) -> Result<Self, FetchError> {
        let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch.clone())?);
        Ok(Self::start_with(raw_url, settings, fetcher))
    }

    pub fn start_with(
        raw_url: impl Into<String>,
        settings: CloneSettings,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let raw_url = raw_url.into();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let sink = ChannelProgressSink::new(event_tx);
            run_clone(&raw_url, &settings, fetcher, &sink).await
        });
        Self { event_rx, task }
    }

    /// Next event, or `None` once the run has ended and the stream drained.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.event_rx.recv().await
    }

    /// Wait for the run's result. Call after `next_event` returned `None`;
    /// earlier calls close the stream and cancel the run.
    pub async fn finish(self) -> Result<CloneReport, CloneError> {
        let Self { event_rx, task } = self;
        drop(event_rx);
        match task.await {
            Ok(result) => result,
            Err(err) => Err(CloneError::TaskFailed(err.to_string())),
        }
    }
}
