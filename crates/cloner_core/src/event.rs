use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage transition markers carried by `status` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    FetchingHtml,
    FetchedHtml,
    FetchingCss(String),
    DownloadingAssets,
    RewritingHtml,
    HtmlRewritten,
    CreatingInfoJson,
    InfoJsonCreated,
    CreatingZip,
    ZipCreated,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::FetchingHtml => write!(f, "fetching_html"),
            Status::FetchedHtml => write!(f, "fetched_html"),
            Status::FetchingCss(url) => write!(f, "fetching_css {url}"),
            Status::DownloadingAssets => write!(f, "downloading_assets"),
            Status::RewritingHtml => write!(f, "rewriting_html"),
            Status::HtmlRewritten => write!(f, "html_rewritten"),
            Status::CreatingInfoJson => write!(f, "creating_info_json"),
            Status::InfoJsonCreated => write!(f, "info_json_created"),
            Status::CreatingZip => write!(f, "creating_zip"),
            Status::ZipCreated => write!(f, "zip_created"),
        }
    }
}

/// Stage that reported an `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    FailedFetchHtml,
    WorkspaceFailed,
    CssFetchFailed,
    SaveHtmlFailed,
    RewriteFailed,
    InfoJsonFailed,
    ZipFailed,
}

impl ErrorStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorStage::FailedFetchHtml => "failed_fetch_html",
            ErrorStage::WorkspaceFailed => "workspace_failed",
            ErrorStage::CssFetchFailed => "css_fetch_failed",
            ErrorStage::SaveHtmlFailed => "save_html_failed",
            ErrorStage::RewriteFailed => "rewrite_failed",
            ErrorStage::InfoJsonFailed => "info_json_failed",
            ErrorStage::ZipFailed => "zip_failed",
        }
    }

    /// Fatal stages end the run; nothing follows their `error` event.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorStage::FailedFetchHtml | ErrorStage::WorkspaceFailed | ErrorStage::ZipFailed
        )
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPayload {
    pub total_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSaved {
    pub url: String,
    pub saved: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailed {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub bytes_total: u64,
    pub speed_bps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneSummary {
    pub status: String,
    pub zip_path: String,
    pub zip_name: String,
    pub elapsed_seconds: u64,
}

impl DoneSummary {
    pub fn new(zip_path: impl Into<String>, zip_name: impl Into<String>, elapsed_seconds: u64) -> Self {
        Self {
            status: "done".to_string(),
            zip_path: zip_path.into(),
            zip_name: zip_name.into(),
            elapsed_seconds,
        }
    }
}

/// One entry of the progress stream of a clone run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Status(Status),
    Meta(MetaPayload),
    Asset(AssetSaved),
    AssetError(AssetFailed),
    Progress(ProgressSnapshot),
    Error { stage: ErrorStage, message: String },
    Done(DoneSummary),
}

impl ProgressEvent {
    pub fn error(stage: ErrorStage, message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            stage,
            message: message.into(),
        }
    }

    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Status(_) => "status",
            ProgressEvent::Meta(_) => "meta",
            ProgressEvent::Asset(_) => "asset",
            ProgressEvent::AssetError(_) => "asset_error",
            ProgressEvent::Progress(_) => "progress",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Done(_) => "done",
        }
    }

    /// SSE data payload: plain text for `status`/`error`, JSON otherwise.
    pub fn data(&self) -> String {
        match self {
            ProgressEvent::Status(status) => status.to_string(),
            ProgressEvent::Meta(meta) => to_json(meta),
            ProgressEvent::Asset(asset) => to_json(asset),
            ProgressEvent::AssetError(failure) => to_json(failure),
            ProgressEvent::Progress(snapshot) => to_json(snapshot),
            ProgressEvent::Error { stage, message } => format!("{stage}: {message}"),
            ProgressEvent::Done(summary) => to_json(summary),
        }
    }

    /// True for `done` and for errors from a fatal stage.
    pub fn is_terminal(&self) -> bool {
        match self {
            ProgressEvent::Done(_) => true,
            ProgressEvent::Error { stage, .. } => stage.is_fatal(),
            _ => false,
        }
    }

    /// Encode as one server-sent-events frame, terminated by a blank line.
    pub fn to_sse(&self) -> String {
        let mut frame = format!("event: {}\n", self.kind());
        let data = self.data();
        if data.is_empty() {
            frame.push_str("data: \n");
        }
        for line in data.lines() {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}

fn to_json<T: Serialize>(payload: &T) -> String {
    // Plain structs of strings and integers always serialize.
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
}
