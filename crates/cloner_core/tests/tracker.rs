use std::sync::Once;

use cloner_core::{
    Applied, AssetFailed, AssetSaved, DoneSummary, ErrorStage, MetaPayload, ProgressEvent,
    RunOutcome, RunState, Status,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn saved(url: &str, size: u64) -> ProgressEvent {
    ProgressEvent::Asset(AssetSaved {
        url: url.to_string(),
        saved: format!("/w/{url}"),
        size,
    })
}

#[test]
fn successful_stream_is_summarized() {
    init_logging();
    let mut state = RunState::new();
    let events = vec![
        ProgressEvent::Status(Status::FetchingHtml),
        ProgressEvent::Meta(MetaPayload { total_items: 4 }),
        saved("a", 10),
        ProgressEvent::AssetError(AssetFailed {
            url: "b".into(),
            error: "timeout".into(),
        }),
        saved("c", 5),
        ProgressEvent::error(ErrorStage::RewriteFailed, "bad markup"),
        ProgressEvent::Status(Status::ZipCreated),
        ProgressEvent::Done(DoneSummary::new("/tmp/x.zip", "x.zip", 2)),
    ];
    for event in &events {
        assert_eq!(state.apply(event), Applied::Accepted);
    }

    let view = state.view();
    assert_eq!(view.total_items, Some(4));
    assert_eq!(view.assets_saved, 2);
    assert_eq!(view.assets_failed, 1);
    assert_eq!(view.bytes_saved, 15);
    assert_eq!(view.pending_assets(), Some(0));
    assert_eq!(view.stage_errors, vec!["rewrite_failed: bad markup".to_string()]);
    assert_eq!(view.last_status, Some(Status::ZipCreated));
    assert_eq!(
        view.outcome,
        RunOutcome::Done {
            zip_path: "/tmp/x.zip".into(),
            zip_name: "x.zip".into(),
            elapsed_seconds: 2,
        }
    );
}

#[test]
fn fatal_error_ends_the_run() {
    init_logging();
    let mut state = RunState::new();
    state.apply(&ProgressEvent::Status(Status::FetchingHtml));
    state.apply(&ProgressEvent::error(ErrorStage::FailedFetchHtml, "http status 404"));

    assert!(state.view().is_finished());
    assert_eq!(
        state.view().outcome,
        RunOutcome::Failed {
            stage: ErrorStage::FailedFetchHtml,
            message: "http status 404".into(),
        }
    );
    assert!(state.view().stage_errors.is_empty());
}

#[test]
fn events_after_terminal_are_ignored() {
    init_logging();
    let mut state = RunState::new();
    state.apply(&ProgressEvent::Done(DoneSummary::new("p", "n", 0)));
    let before = state.view().clone();

    assert_eq!(state.apply(&saved("late", 99)), Applied::IgnoredAfterTerminal);
    assert_eq!(state.view(), &before);
    assert_eq!(state.late_events(), 1);
}

#[test]
fn pending_assets_counts_down() {
    let mut state = RunState::new();
    assert_eq!(state.view().pending_assets(), None);
    state.apply(&ProgressEvent::Meta(MetaPayload { total_items: 3 }));
    assert_eq!(state.view().pending_assets(), Some(2));
    state.apply(&saved("a", 1));
    assert_eq!(state.view().pending_assets(), Some(1));
}
