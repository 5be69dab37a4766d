//! The provider seam jobs are executed through.

use async_trait::async_trait;
use genhub_core::generation::{GenerationKind, GenerationOutput, GenerationRequest};

use crate::api::RunwareApiError;
use crate::progress::ProgressReporter;

/// Failure of one provider call. The display text is what gets recorded
/// on the failed job.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API key not configured. Please set API key in settings.")]
    NotConfigured,

    #[error("{0} generation is not supported by the provider")]
    Unsupported(GenerationKind),

    #[error("Invalid generation parameters: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Api(#[from] RunwareApiError),

    #[error("Provider returned no results")]
    EmptyResult,

    #[error("Failed to store generated asset at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

/// An opaque external generation backend.
///
/// One call per job. The whole call is one unit of work: no partial
/// results, no internal retries.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Execute `request`, reporting intermediate progress on `progress`.
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Vec<GenerationOutput>, ProviderError>;

    /// Whether the provider has credentials to run jobs.
    async fn is_configured(&self) -> bool {
        true
    }

    /// Replace the provider credentials at runtime.
    async fn update_api_key(&self, _api_key: String) {}
}
