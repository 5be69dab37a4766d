//! Progress reporting from a running provider call.
//!
//! A provider writes [`ProgressUpdate`]s into a [`ProgressReporter`]; the
//! orchestrator owns the receiving end and re-emits each update as a job
//! event.

use tokio::sync::mpsc;

/// One intermediate progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub message: String,
}

/// Write side of a provider's progress channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver the orchestrator drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Report progress. Values are forwarded as given.
    pub fn report(&self, percent: f64, message: impl Into<String>) {
        let update = ProgressUpdate {
            percent,
            message: message.into(),
        };
        if self.sender.send(update).is_err() {
            tracing::debug!(percent, "Progress receiver dropped");
        }
    }
}
