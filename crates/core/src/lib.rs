//! Shared domain types for the generation pipeline.
//!
//! Zero internal dependencies: every other workspace crate builds on the
//! types, errors, and pure helpers defined here.

pub mod error;
pub mod generation;
pub mod hashing;
pub mod job_events;
pub mod types;
