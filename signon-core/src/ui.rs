//! Execution context that owns the UI.
//!
//! Provider callbacks may complete on any task or thread. Anything the UI
//! observes is handed to a [`UiExecutor`] first, which runs it on the
//! UI-owned context.

use tokio::sync::mpsc;

/// Unit of work to run on the UI context.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work onto the UI-owned execution context.
pub trait UiExecutor: Send + Sync {
    fn dispatch(&self, job: UiJob);
}

/// Runs jobs immediately on whatever context dispatches them.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl UiExecutor for InlineExecutor {
    fn dispatch(&self, job: UiJob) {
        job();
    }
}

/// Queue drained by the UI loop.
///
/// `MainQueue` is the sending half handed to the orchestrator; the
/// [`MainQueueReceiver`] stays with the loop that owns the UI.
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: mpsc::UnboundedSender<UiJob>,
}

impl MainQueue {
    pub fn new() -> (Self, MainQueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, MainQueueReceiver { rx })
    }
}

impl UiExecutor for MainQueue {
    fn dispatch(&self, job: UiJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("UI queue closed; dropping dispatched job");
        }
    }
}

/// Receiving half of a [`MainQueue`].
pub struct MainQueueReceiver {
    rx: mpsc::UnboundedReceiver<UiJob>,
}

impl MainQueueReceiver {
    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it.
    ///
    /// Returns `false` once every sender has been dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MainQueueReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueueReceiver").finish_non_exhaustive()
    }
}
