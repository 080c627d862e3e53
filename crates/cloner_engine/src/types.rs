use std::fmt;
use std::path::PathBuf;

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Outcome of one asset download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    Saved {
        url: Url,
        /// Workspace-relative path, as written into the rewritten page.
        local_path: String,
        /// Absolute path of the file on disk.
        saved: PathBuf,
        size: u64,
    },
    Failed {
        url: Url,
        error: String,
    },
}

impl DownloadResult {
    pub(crate) fn failed(url: Url, error: impl Into<String>) -> Self {
        DownloadResult::Failed {
            url,
            error: error.into(),
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            DownloadResult::Saved { url, .. } | DownloadResult::Failed { url, .. } => url,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            DownloadResult::Saved { size, .. } => *size,
            DownloadResult::Failed { .. } => 0,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadResult::Saved { .. })
    }
}
