//! The write side of progress distribution.

use async_trait::async_trait;

use crate::event::ProgressEvent;
use crate::hub::ProgressHub;

/// A destination the orchestrator emits job events into.
///
/// Emission is best-effort: implementations swallow and log their own
/// delivery failures so one sink can never block another.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &ProgressEvent);
}

#[async_trait]
impl EventSink for ProgressHub {
    async fn emit(&self, event: &ProgressEvent) {
        self.publish(event.clone());
    }
}
