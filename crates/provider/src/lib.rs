//! External generation provider integration.
//!
//! Provides the [`GenerationProvider`] seam the pipeline executes jobs
//! through, the [`ProgressReporter`] channel a provider reports
//! intermediate progress on, and the Runware implementation: REST client,
//! typed task messages, and asset download into local storage.

pub mod api;
pub mod messages;
pub mod progress;
pub mod provider;
pub mod runware;
pub mod storage;

pub use progress::{ProgressReporter, ProgressUpdate};
pub use provider::{GenerationProvider, ProviderError};
pub use runware::RunwareProvider;
