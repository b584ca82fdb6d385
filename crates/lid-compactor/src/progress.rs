//! Progress reporting. A sink is passed into each run; nothing keeps it.

use lid_core::Progress;
use tokio::sync::mpsc::UnboundedSender;

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}

/// Forwards updates into a channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub UnboundedSender<Progress>);

impl ProgressSink for ChannelProgress {
    fn report(&self, progress: Progress) {
        let _ = self.0.send(progress);
    }
}
