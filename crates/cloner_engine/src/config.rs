use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::download::{DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL};
use crate::fetch::FetchSettings;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// How deep `@import` chains are followed during discovery.
pub const DEFAULT_CSS_IMPORT_DEPTH: usize = 2;

#[derive(Clone)]
pub struct CloneSettings {
    pub fetch: FetchSettings,
    pub concurrency_limit: usize,
    pub progress_interval: Duration,
    pub css_import_depth: usize,
    /// Parent of every workspace directory and archive.
    pub output_root: PathBuf,
    pub clock: Clock,
}

impl CloneSettings {
    pub fn default_with_output(output_root: PathBuf) -> Self {
        Self {
            fetch: FetchSettings::default(),
            concurrency_limit: DEFAULT_CONCURRENCY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            css_import_depth: DEFAULT_CSS_IMPORT_DEPTH,
            output_root,
            clock: Arc::new(Utc::now),
        }
    }
}

impl Default for CloneSettings {
    fn default() -> Self {
        Self::default_with_output(std::env::temp_dir())
    }
}

impl fmt::Debug for CloneSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloneSettings")
            .field("fetch", &self.fetch)
            .field("concurrency_limit", &self.concurrency_limit)
            .field("progress_interval", &self.progress_interval)
            .field("css_import_depth", &self.css_import_depth)
            .field("output_root", &self.output_root)
            .finish_non_exhaustive()
    }
}
