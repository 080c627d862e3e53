use cloner_core::ProgressEvent;
use tokio::sync::mpsc::UnboundedSender;

/// Receiving end of the progress stream of one run.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    /// True once nobody is listening anymore; the pipeline treats this as a
    /// request to stop.
    fn is_closed(&self) -> bool {
        false
    }
}

pub struct ChannelProgressSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
