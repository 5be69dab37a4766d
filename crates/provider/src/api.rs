//! REST API client for the Runware task endpoint.
//!
//! Wraps task submission and asset download using [`reqwest`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::messages::{ImageInferenceTask, ImageResult, TaskResponse};

/// Default task endpoint.
pub const DEFAULT_API_URL: &str = "https://api.runware.ai/v1";

/// HTTP client for the Runware API.
pub struct RunwareApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the Runware REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum RunwareApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Runware returned a non-2xx status code.
    #[error("Runware API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The request was accepted but every task reported an error.
    #[error("Runware rejected the task: {0}")]
    Rejected(String),
}

impl RunwareApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Task endpoint, e.g. `https://api.runware.ai/v1`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Run one `imageInference` task and return its images.
    pub async fn image_inference(
        &self,
        api_key: &str,
        task: &ImageInferenceTask,
    ) -> Result<Vec<ImageResult>, RunwareApiError> {
        self.submit_tasks(api_key, std::slice::from_ref(task)).await
    }

    /// Download a generated asset.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, RunwareApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn submit_tasks<T: Serialize, R: DeserializeOwned>(
        &self,
        api_key: &str,
        tasks: &[T],
    ) -> Result<Vec<R>, RunwareApiError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(tasks)
            .send()
            .await?;

        let body: TaskResponse<R> = Self::parse_response(response).await?;
        if body.data.is_empty() && !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RunwareApiError::Rejected(message));
        }
        Ok(body.data)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`RunwareApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RunwareApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RunwareApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RunwareApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
