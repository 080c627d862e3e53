//! Cloner engine: fetching, discovery, rewriting and packaging of one page.
mod config;
mod css;
mod decode;
mod download;
mod engine;
mod extract;
mod fetch;
mod package;
mod pipeline;
mod rewrite;
mod sink;
mod types;
mod workspace;

pub use config::{CloneSettings, Clock, DEFAULT_CSS_IMPORT_DEPTH};
pub use decode::{decode_text, DecodedText};
pub use download::{BoundedDownloader, DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL};
pub use engine::CloneHandle;
pub use extract::{css_imports, extract_assets, extract_css, stylesheet_links};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use package::{package, write_manifest, Manifest, PackageError, PackageSummary, MANIFEST_FILENAME};
pub use pipeline::{run_clone, CloneError, CloneReport};
pub use rewrite::{rewrite_css_text, rewrite_html, rewrite_page, RewriteError};
pub use sink::{ChannelProgressSink, ProgressSink};
pub use types::{DownloadResult, FailureKind, FetchError, FetchMetadata, FetchOutput};
pub use workspace::{
    ensure_output_dir, new_run_id, AtomicFileWriter, PersistError, Workspace, PAGE_FILENAME,
};
