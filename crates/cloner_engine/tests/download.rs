use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloner_core::ProgressEvent;
use cloner_engine::{
    BoundedDownloader, DownloadResult, FailureKind, FetchError, FetchMetadata, FetchOutput,
    Fetcher, ProgressSink, Workspace,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Serves `size` bytes for every URL except those containing `fail`, and
/// records how many requests overlap.
#[derive(Default)]
struct StubFetcher {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if url.path().contains("fail") {
            return Err(FetchError {
                kind: FailureKind::HttpStatus(500),
                message: "500 Internal Server Error".to_string(),
            });
        }
        let bytes = vec![b'x'; 10];
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                content_type: None,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

fn asset_urls(names: &[&str]) -> Vec<Url> {
    names
        .iter()
        .map(|name| Url::parse(&format!("https://example.com/assets/{name}")).unwrap())
        .collect()
}

fn setup() -> (TempDir, Arc<Workspace>, Arc<StubFetcher>) {
    let temp = TempDir::new().unwrap();
    let workspace = Arc::new(Workspace::create(temp.path(), "clone_dl").unwrap());
    (temp, workspace, Arc::new(StubFetcher::default()))
}

#[tokio::test]
async fn in_flight_requests_stay_within_limit() {
    let (_temp, workspace, fetcher) = setup();
    let names: Vec<String> = (0..12).map(|i| format!("img{i}.png")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let sink = TestSink::default();

    let results = BoundedDownloader::new(fetcher.clone(), workspace)
        .with_concurrency_limit(3)
        .download_all(asset_urls(&names), HashMap::new(), &sink, &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 12);
    assert!(results.iter().all(DownloadResult::is_saved));
    let peak = fetcher.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak}");
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let (_temp, workspace, fetcher) = setup();
    let sink = TestSink::default();
    let urls = asset_urls(&["a.png", "b.css", "fail.js", "c.woff2", "d.svg"]);

    let results = BoundedDownloader::new(fetcher, workspace.clone())
        .download_all(urls, HashMap::new(), &sink, &CancellationToken::new())
        .await;

    assert_eq!(results.iter().filter(|r| r.is_saved()).count(), 4);
    let failed: Vec<_> = results.iter().filter(|r| !r.is_saved()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url().path(), "/assets/fail.js");

    let events = sink.take();
    let saved_events = events.iter().filter(|e| e.kind() == "asset").count();
    let error_events = events.iter().filter(|e| e.kind() == "asset_error").count();
    assert_eq!((saved_events, error_events), (4, 1));

    match events.last() {
        Some(ProgressEvent::Progress(snapshot)) => assert_eq!(snapshot.bytes_total, 40),
        other => panic!("expected a final progress snapshot, got {other:?}"),
    }

    let logo = workspace.root().join("example.com/assets/a.png");
    assert_eq!(fs::read(logo).unwrap(), vec![b'x'; 10]);
}

#[tokio::test]
async fn prefetched_bodies_are_not_requested_again() {
    let (_temp, workspace, fetcher) = setup();
    let sink = TestSink::default();
    let urls = asset_urls(&["site.css", "logo.png"]);
    let prefetched = HashMap::from([(urls[0].clone(), b"body{}".to_vec())]);

    let results = BoundedDownloader::new(fetcher.clone(), workspace.clone())
        .download_all(urls, prefetched, &sink, &CancellationToken::new())
        .await;

    assert!(results.iter().all(DownloadResult::is_saved));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    let css = workspace.root().join("example.com/assets/site.css");
    assert_eq!(fs::read_to_string(css).unwrap(), "body{}");
}

#[tokio::test]
async fn cancelled_batch_resolves_without_fetching() {
    let (_temp, workspace, fetcher) = setup();
    let sink = TestSink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = BoundedDownloader::new(fetcher.clone(), workspace)
        .download_all(asset_urls(&["a.png", "b.png"]), HashMap::new(), &sink, &cancel)
        .await;

    assert_eq!(results.len(), 2);
    for result in &results {
        match result {
            DownloadResult::Failed { error, .. } => assert_eq!(error, "cancelled"),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        sink.take().iter().filter(|e| e.kind() == "asset_error").count(),
        2
    );
}

#[tokio::test]
async fn progress_is_reported_while_downloads_run() {
    let (_temp, workspace, fetcher) = setup();
    let sink = TestSink::default();
    let urls = asset_urls(&["a.png", "b.png", "c.png", "d.png", "e.png"]);

    BoundedDownloader::new(fetcher, workspace)
        .with_concurrency_limit(1)
        .with_progress_interval(Duration::from_millis(5))
        .download_all(urls, HashMap::new(), &sink, &CancellationToken::new())
        .await;

    let events = sink.take();
    let last_asset = events
        .iter()
        .rposition(|event| event.kind() == "asset")
        .expect("assets were saved");
    let first_progress = events
        .iter()
        .position(|event| event.kind() == "progress")
        .expect("progress was reported");
    assert!(first_progress < last_asset, "{events:?}");

    let totals: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Progress(snapshot) => Some(snapshot.bytes_total),
            _ => None,
        })
        .collect();
    assert!(totals.windows(2).all(|pair| pair[0] <= pair[1]), "{totals:?}");
    assert_eq!(totals.last(), Some(&50));
}
