//! The progress event envelope shared by the hub and the live broadcaster.

use chrono::Utc;
use genhub_core::job_events::{MSG_TYPE_COMPLETE, MSG_TYPE_ERROR, MSG_TYPE_PROGRESS};
use genhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// Discriminant of a [`ProgressEvent`], serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Complete,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => MSG_TYPE_PROGRESS,
            Self::Complete => MSG_TYPE_COMPLETE,
            Self::Error => MSG_TYPE_ERROR,
        }
    }
}

/// One progress/complete/error notification for a job.
///
/// Events are not persisted. The job record is the durable projection of
/// the terminal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub job_id: DbId,
    /// Percentage, present on `progress` events only. Passed through as
    /// reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub message: String,
    /// Result payload, present on `complete` events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

impl ProgressEvent {
    pub fn progress(job_id: DbId, percent: f64, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Progress,
            job_id,
            progress: Some(percent),
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn complete(job_id: DbId, data: serde_json::Value) -> Self {
        Self {
            kind: EventKind::Complete,
            job_id,
            progress: None,
            message: "Generation complete".to_string(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    pub fn error(job_id: DbId, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            job_id,
            progress: None,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// `complete` and `error` end a job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Complete | EventKind::Error)
    }
}
