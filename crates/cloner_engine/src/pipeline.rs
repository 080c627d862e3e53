use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::SecondsFormat;
use cloner_core::{normalize_url, DoneSummary, ErrorStage, MetaPayload, ProgressEvent, Status};
use engine_logging::{engine_error, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::CloneSettings;
use crate::decode::decode_text;
use crate::download::BoundedDownloader;
use crate::extract::{css_imports, extract_assets, extract_css, stylesheet_links};
use crate::fetch::Fetcher;
use crate::package::{package, write_manifest, Manifest, PackageError};
use crate::rewrite::rewrite_page;
use crate::sink::ProgressSink;
use crate::workspace::{new_run_id, PersistError, Workspace, PAGE_FILENAME};
use crate::{DownloadResult, FailureKind, FetchError};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct CloneReport {
    pub cloned_from: String,
    pub workspace: PathBuf,
    pub archive_path: PathBuf,
    pub manifest: Manifest,
    pub results: Vec<DownloadResult>,
    pub elapsed: Duration,
}

/// Why a run ended without an archive.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("failed to fetch page: {0}")]
    PageFetch(#[from] FetchError),
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] PersistError),
    #[error("failed to create archive: {0}")]
    Package(#[from] PackageError),
    #[error("run cancelled: progress consumer went away")]
    Cancelled,
    #[error("clone task stopped unexpectedly: {0}")]
    TaskFailed(String),
}

struct FetchedPage {
    requested: Url,
    base: Url,
    html: String,
}

/// Clone the page behind `raw_url` into a fresh workspace and archive it,
/// reporting every stage to `sink`.
///
/// A returned error has already been reported as a terminal `error` event,
/// except [`CloneError::Cancelled`], which is only returned once nobody
/// listens anymore.
pub async fn run_clone(
    raw_url: &str,
    settings: &CloneSettings,
    fetcher: Arc<dyn Fetcher>,
    sink: &dyn ProgressSink,
) -> Result<CloneReport, CloneError> {
    let started = Instant::now();
    let cloned_from = normalize_url(raw_url);
    let run_id = new_run_id((settings.clock)());
    let zip_name = format!("{run_id}.zip");
    engine_info!("Cloning {} as {}", cloned_from, run_id);

    sink.emit(ProgressEvent::Status(Status::FetchingHtml));
    let page = fetch_page(fetcher.as_ref(), &cloned_from)
        .await
        .map_err(|err| fatal(sink, ErrorStage::FailedFetchHtml, err.to_string(), err.into()))?;
    sink.emit(ProgressEvent::Status(Status::FetchedHtml));
    ensure_listening(sink)?;

    let workspace = Workspace::create(&settings.output_root, &run_id)
        .map(Arc::new)
        .map_err(|err| {
            fatal(
                sink,
                ErrorStage::WorkspaceFailed,
                err.to_string(),
                CloneError::Workspace(err),
            )
        })?;

    let mut assets = extract_assets(&page.base, &page.html);
    let stylesheets = stylesheet_links(&page.base, &page.html);
    let prefetched = scan_stylesheets(
        fetcher.as_ref(),
        &stylesheets,
        settings.css_import_depth,
        &mut assets,
        sink,
    )
    .await;
    assets.extend(stylesheets);
    assets.remove(&page.requested);
    assets.remove(&page.base);
    ensure_listening(sink)?;

    sink.emit(ProgressEvent::Meta(MetaPayload {
        total_items: assets.len() + 1,
    }));
    engine_info!("Discovered {} assets on {}", assets.len(), page.base);

    let page_saved = match workspace.write_file(PAGE_FILENAME, page.html.as_bytes()) {
        Ok(_) => true,
        Err(err) => {
            engine_warn!("Could not save root page: {}", err);
            sink.emit(ProgressEvent::error(ErrorStage::SaveHtmlFailed, err.to_string()));
            false
        }
    };

    sink.emit(ProgressEvent::Status(Status::DownloadingAssets));
    let cancel = CancellationToken::new();
    let results = BoundedDownloader::new(Arc::clone(&fetcher), Arc::clone(&workspace))
        .with_concurrency_limit(settings.concurrency_limit)
        .with_progress_interval(settings.progress_interval)
        .download_all(assets.into_iter().collect(), prefetched, sink, &cancel)
        .await;
    if cancel.is_cancelled() {
        engine_warn!("Run {} cancelled after the download stage", run_id);
        return Err(CloneError::Cancelled);
    }

    let saved_count = results.iter().filter(|r| r.is_saved()).count();
    let downloaded_bytes: u64 = results.iter().map(DownloadResult::size).sum();
    engine_info!(
        "Downloaded {}/{} assets ({} bytes)",
        saved_count,
        results.len(),
        downloaded_bytes
    );

    sink.emit(ProgressEvent::Status(Status::RewritingHtml));
    let rewritten = if page_saved {
        rewrite_page(&workspace.page_path(), &page.base).map_err(|err| err.to_string())
    } else {
        Err("root page was not saved".to_string())
    };
    match rewritten {
        Ok(()) => sink.emit(ProgressEvent::Status(Status::HtmlRewritten)),
        Err(message) => {
            engine_warn!("Rewriting failed: {}", message);
            sink.emit(ProgressEvent::error(ErrorStage::RewriteFailed, message));
        }
    }

    sink.emit(ProgressEvent::Status(Status::CreatingInfoJson));
    let manifest = Manifest {
        cloned_from: cloned_from.clone(),
        timestamp_utc: (settings.clock)().to_rfc3339_opts(SecondsFormat::Secs, true),
        total_files_downloaded: saved_count + 1,
        downloaded_bytes,
        zip_name: zip_name.clone(),
    };
    match write_manifest(&workspace, &manifest) {
        Ok(_) => sink.emit(ProgressEvent::Status(Status::InfoJsonCreated)),
        Err(err) => {
            engine_warn!("Writing manifest failed: {}", err);
            sink.emit(ProgressEvent::error(ErrorStage::InfoJsonFailed, err.to_string()));
        }
    }

    sink.emit(ProgressEvent::Status(Status::CreatingZip));
    let archive_path = settings.output_root.join(&zip_name);
    let summary = package(workspace.root(), &archive_path).map_err(|err| {
        fatal(sink, ErrorStage::ZipFailed, err.to_string(), err.into())
    })?;
    sink.emit(ProgressEvent::Status(Status::ZipCreated));

    let elapsed = started.elapsed();
    sink.emit(ProgressEvent::Done(DoneSummary::new(
        summary.archive_path.display().to_string(),
        zip_name,
        elapsed.as_secs(),
    )));
    engine_info!(
        "Clone of {} finished in {:.1}s: {}",
        cloned_from,
        elapsed.as_secs_f64(),
        summary.archive_path.display()
    );

    Ok(CloneReport {
        cloned_from,
        workspace: workspace.root().to_path_buf(),
        archive_path: summary.archive_path,
        manifest,
        results,
        elapsed,
    })
}

async fn fetch_page(fetcher: &dyn Fetcher, raw_url: &str) -> Result<FetchedPage, FetchError> {
    let requested = Url::parse(raw_url)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    let output = fetcher.fetch(&requested).await?;
    let base = Url::parse(&output.metadata.final_url).unwrap_or_else(|_| requested.clone());
    let decoded = decode_text(&output.bytes, output.metadata.content_type.as_deref());
    if decoded.had_errors {
        engine_warn!(
            "Page {} is not valid {}; malformed bytes were replaced",
            base,
            decoded.encoding_label
        );
    }
    Ok(FetchedPage {
        requested,
        base,
        html: decoded.text,
    })
}

/// Fetch linked stylesheets (and their `@import`s up to `max_depth`) and add
/// what they reference to `assets`. Returns the fetched bodies so the
/// downloader does not request them again.
async fn scan_stylesheets(
    fetcher: &dyn Fetcher,
    roots: &[Url],
    max_depth: usize,
    assets: &mut BTreeSet<Url>,
    sink: &dyn ProgressSink,
) -> HashMap<Url, Vec<u8>> {
    let mut bodies = HashMap::new();
    let mut visited = HashSet::new();
    let mut queue: VecDeque<(Url, usize)> = roots.iter().map(|url| (url.clone(), 0)).collect();

    while let Some((css_url, depth)) = queue.pop_front() {
        if !visited.insert(css_url.clone()) {
            continue;
        }
        sink.emit(ProgressEvent::Status(Status::FetchingCss(css_url.to_string())));
        let output = match fetcher.fetch(&css_url).await {
            Ok(output) => output,
            Err(err) => {
                engine_warn!("Stylesheet {} failed: {}", css_url, err);
                sink.emit(ProgressEvent::error(
                    ErrorStage::CssFetchFailed,
                    format!("{css_url}: {err}"),
                ));
                continue;
            }
        };

        let css_base = Url::parse(&output.metadata.final_url).unwrap_or_else(|_| css_url.clone());
        let css = decode_text(&output.bytes, output.metadata.content_type.as_deref()).text;
        assets.extend(extract_css(&css_base, &css));
        if depth < max_depth {
            queue.extend(
                css_imports(&css_base, &css)
                    .into_iter()
                    .map(|import| (import, depth + 1)),
            );
        }
        bodies.insert(css_url, output.bytes);
    }
    bodies
}

fn ensure_listening(sink: &dyn ProgressSink) -> Result<(), CloneError> {
    if sink.is_closed() {
        engine_warn!("Progress consumer went away; stopping run");
        return Err(CloneError::Cancelled);
    }
    Ok(())
}

fn fatal(sink: &dyn ProgressSink, stage: ErrorStage, message: String, err: CloneError) -> CloneError {
    engine_error!("{}: {}", stage, message);
    sink.emit(ProgressEvent::error(stage, message));
    err
}
