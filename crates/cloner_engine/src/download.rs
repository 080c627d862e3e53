use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cloner_core::{local_path, AssetFailed, AssetSaved, ProgressEvent, ProgressSnapshot};
use engine_logging::{engine_debug, engine_error, engine_warn};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::Fetcher;
use crate::sink::ProgressSink;
use crate::workspace::Workspace;
use crate::{DownloadResult, FailureKind};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Fetches a set of assets into a workspace with at most `concurrency_limit`
/// requests in flight.
pub struct BoundedDownloader {
    fetcher: Arc<dyn Fetcher>,
    workspace: Arc<Workspace>,
    concurrency_limit: usize,
    progress_interval: Duration,
}

impl BoundedDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, workspace: Arc<Workspace>) -> Self {
        Self {
            fetcher,
            workspace,
            concurrency_limit: DEFAULT_CONCURRENCY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Download every URL, emitting one `asset`/`asset_error` per URL and a
    /// `progress` snapshot per interval plus one when the batch drains.
    ///
    /// Bodies in `prefetched` are saved without another request. A failing
    /// asset never aborts the batch. When `cancel` fires, downloads that have
    /// not started resolve as cancelled; running ones finish.
    pub async fn download_all(
        &self,
        urls: Vec<Url>,
        mut prefetched: HashMap<Url, Vec<u8>>,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<DownloadResult> {
        let gate = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut pending = FuturesUnordered::new();

        for url in urls {
            let body = prefetched.remove(&url);
            let fetcher = Arc::clone(&self.fetcher);
            let workspace = Arc::clone(&self.workspace);
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            let task_url = url.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = gate.acquire_owned().await else {
                    return DownloadResult::failed(task_url, FailureKind::Cancelled.to_string());
                };
                if cancel.is_cancelled() {
                    return DownloadResult::failed(task_url, FailureKind::Cancelled.to_string());
                }
                fetch_and_save(fetcher.as_ref(), &workspace, task_url, body).await
            });
            pending.push(async move { (url, handle.await) });
        }

        let mut results = Vec::with_capacity(pending.len());
        let mut meter = ThroughputMeter::new(Instant::now());
        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        while !pending.is_empty() {
            tokio::select! {
                Some((url, joined)) = pending.next() => {
                    let result = joined.unwrap_or_else(|err| {
                        engine_error!("Download task for {} failed: {}", url, err);
                        DownloadResult::failed(url, format!("download task failed: {err}"))
                    });
                    meter.record(result.size());
                    sink.emit(outcome_event(&result));
                    results.push(result);
                }
                _ = ticker.tick() => {
                    sink.emit(ProgressEvent::Progress(meter.snapshot(Instant::now())));
                }
            }

            if !cancel.is_cancelled() && sink.is_closed() {
                engine_warn!("Progress consumer went away; not starting further downloads");
                cancel.cancel();
            }
        }

        sink.emit(ProgressEvent::Progress(meter.snapshot(Instant::now())));
        results
    }
}

async fn fetch_and_save(
    fetcher: &dyn Fetcher,
    workspace: &Workspace,
    url: Url,
    prefetched: Option<Vec<u8>>,
) -> DownloadResult {
    let bytes = match prefetched {
        Some(bytes) => bytes,
        None => match fetcher.fetch(&url).await {
            Ok(output) => output.bytes,
            Err(err) => {
                engine_warn!("Asset {} failed: {}", url, err);
                return DownloadResult::failed(url, err.to_string());
            }
        },
    };

    let relative = local_path(&url);
    match workspace.write_file(&relative, &bytes) {
        Ok(saved) => {
            engine_debug!("Saved {} ({} bytes) to {}", url, bytes.len(), relative);
            DownloadResult::Saved {
                url,
                local_path: relative,
                saved,
                size: bytes.len() as u64,
            }
        }
        Err(err) => {
            engine_warn!("Could not save {} to {}: {}", url, relative, err);
            DownloadResult::failed(url, err.to_string())
        }
    }
}

fn outcome_event(result: &DownloadResult) -> ProgressEvent {
    match result {
        DownloadResult::Saved {
            url, saved, size, ..
        } => ProgressEvent::Asset(AssetSaved {
            url: url.to_string(),
            saved: saved.display().to_string(),
            size: *size,
        }),
        DownloadResult::Failed { url, error } => ProgressEvent::AssetError(AssetFailed {
            url: url.to_string(),
            error: error.clone(),
        }),
    }
}

/// Cumulative byte count plus throughput since the previous snapshot.
#[derive(Debug)]
pub(crate) struct ThroughputMeter {
    bytes_total: u64,
    bytes_since_last: u64,
    last_snapshot: Instant,
}

impl ThroughputMeter {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            bytes_total: 0,
            bytes_since_last: 0,
            last_snapshot: now,
        }
    }

    pub(crate) fn record(&mut self, bytes: u64) {
        self.bytes_total += bytes;
        self.bytes_since_last += bytes;
    }

    pub(crate) fn snapshot(&mut self, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.last_snapshot).as_secs_f64();
        let speed_bps = (self.bytes_since_last as f64 / elapsed.max(1e-6)) as u64;
        self.bytes_since_last = 0;
        self.last_snapshot = now;
        ProgressSnapshot {
            bytes_total: self.bytes_total,
            speed_bps,
        }
    }
}
