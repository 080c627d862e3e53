//! Cloner core: pure URL handling, progress events and the run tracker.
mod event;
mod local_path;
mod normalize;
mod tracker;

pub use event::{
    AssetFailed, AssetSaved, DoneSummary, ErrorStage, MetaPayload, ProgressEvent,
    ProgressSnapshot, Status,
};
pub use local_path::{local_path, DEFAULT_DOCUMENT, QUERY_FINGERPRINT_LEN};
pub use normalize::normalize_url;
pub use tracker::{Applied, RunOutcome, RunState, RunSummary};
