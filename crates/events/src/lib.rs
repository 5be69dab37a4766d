//! Progress event distribution for generation jobs.
//!
//! - [`ProgressEvent`]: the per-job progress/complete/error envelope.
//! - [`EventBus`]: in-process fan-out backed by `tokio::sync::broadcast`.
//! - [`ProgressHub`]: per-job publish/subscribe on top of the bus, with one
//!   listener task per subscribed job.
//! - [`EventSink`]: the write side the orchestrator emits into.

pub mod bus;
pub mod event;
pub mod hub;
pub mod sink;

pub use bus::EventBus;
pub use event::{EventKind, ProgressEvent};
pub use hub::{ProgressHub, Subscription};
pub use sink::EventSink;
