//! Message type constants for generation job events.
//!
//! Shared by the progress hub, the WebSocket broadcaster, and clients
//! decoding the frames pushed over `/ws/generation/{id}`.

/// Intermediate progress update (percentage + message).
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Job completed successfully; carries the result payload.
pub const MSG_TYPE_COMPLETE: &str = "complete";

/// Job failed; carries the error text.
pub const MSG_TYPE_ERROR: &str = "error";

/// Reply to any client frame received on a live connection.
pub const MSG_TYPE_HEARTBEAT: &str = "heartbeat";
