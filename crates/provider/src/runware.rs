//! Runware-backed [`GenerationProvider`].
//!
//! Translates a provider-neutral [`GenerationRequest`] into an
//! `imageInference` task, runs it, and downloads every returned image into
//! the storage directory.

use std::path::PathBuf;

use async_trait::async_trait;
use genhub_core::generation::{
    GenerationKind, GenerationOutput, GenerationRequest, DEFAULT_DIMENSION,
    DEFAULT_GUIDANCE_SCALE, DEFAULT_STEPS, DEFAULT_STRENGTH,
};
use tokio::sync::RwLock;

use crate::api::RunwareApi;
use crate::messages::{ImageInferenceTask, OUTPUT_TYPE_URL, TASK_TYPE_IMAGE_INFERENCE};
use crate::progress::ProgressReporter;
use crate::provider::{GenerationProvider, ProviderError};
use crate::storage::{asset_file_name, write_asset};

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "runware:100@1";

/// Settings for [`RunwareProvider`].
#[derive(Debug, Clone)]
pub struct RunwareConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub storage_path: PathBuf,
}

pub struct RunwareProvider {
    api: RunwareApi,
    api_key: RwLock<Option<String>>,
    storage_path: PathBuf,
}

impl RunwareProvider {
    pub fn new(config: RunwareConfig) -> Self {
        Self {
            api: RunwareApi::new(config.api_url),
            api_key: RwLock::new(normalize_key(config.api_key)),
            storage_path: config.storage_path,
        }
    }

    async fn current_key(&self) -> Result<String, ProviderError> {
        self.api_key
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl GenerationProvider for RunwareProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Vec<GenerationOutput>, ProviderError> {
        let api_key = self.current_key().await?;
        let task_uuid = uuid::Uuid::new_v4().to_string();
        let task = build_task(request, task_uuid.clone())?;

        let (sending_pct, prefix) = match request.kind {
            GenerationKind::ImageToImage => (30.0, "img2img"),
            _ => (20.0, "txt2img"),
        };

        progress.report(10.0, "Preparing generation request...");
        progress.report(sending_pct, "Sending request to Runware...");

        tracing::debug!(task_uuid = %task_uuid, kind = %request.kind, "Submitting imageInference task");
        let images = self.api.image_inference(&api_key, &task).await?;
        if images.is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        progress.report(80.0, "Processing results...");

        let mut outputs = Vec::with_capacity(images.len());
        for (index, image) in images.into_iter().enumerate() {
            let bytes = self.api.download(&image.image_url).await?;
            let file_name = asset_file_name(prefix, &task_uuid, index);
            let path = write_asset(&self.storage_path, &file_name, &bytes).await?;
            outputs.push(GenerationOutput {
                asset_location: image.image_url,
                output_path: Some(path.display().to_string()),
                seed: image.seed.or(task.seed),
            });
        }

        progress.report(100.0, "Generation complete!");
        tracing::info!(task_uuid = %task_uuid, count = outputs.len(), "Generation succeeded");
        Ok(outputs)
    }

    async fn is_configured(&self) -> bool {
        self.api_key.read().await.is_some()
    }

    async fn update_api_key(&self, api_key: String) {
        *self.api_key.write().await = normalize_key(Some(api_key));
        tracing::info!("Provider API key updated");
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn u32_param(request: &GenerationRequest, name: &str, default: u32) -> Result<u32, ProviderError> {
    match request.u64_param(name) {
        Some(v) => u32::try_from(v)
            .map_err(|_| ProviderError::InvalidRequest(format!("{name} out of range: {v}"))),
        None => Ok(default),
    }
}

/// Translate a request into a Runware task.
pub fn build_task(
    request: &GenerationRequest,
    task_uuid: String,
) -> Result<ImageInferenceTask, ProviderError> {
    let (number_results, seed_image, strength) = match request.kind {
        GenerationKind::TextToImage => (u32_param(request, "num_images", 1)?, None, None),
        GenerationKind::ImageToImage => {
            let image = request
                .str_param("image_url")
                .ok_or_else(|| ProviderError::InvalidRequest("image_url is required".into()))?;
            let strength = request.f64_param("strength").unwrap_or(DEFAULT_STRENGTH);
            (1, Some(image.to_string()), Some(strength))
        }
        other => return Err(ProviderError::Unsupported(other)),
    };

    Ok(ImageInferenceTask {
        task_type: TASK_TYPE_IMAGE_INFERENCE,
        task_uuid,
        output_type: OUTPUT_TYPE_URL,
        positive_prompt: request.prompt.clone(),
        negative_prompt: request
            .str_param("negative_prompt")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        model: request
            .str_param("model")
            .unwrap_or(DEFAULT_MODEL)
            .to_string(),
        width: u32_param(request, "width", DEFAULT_DIMENSION)?,
        height: u32_param(request, "height", DEFAULT_DIMENSION)?,
        number_results,
        steps: u32_param(request, "steps", DEFAULT_STEPS)?,
        cfg_scale: request
            .f64_param("guidance_scale")
            .unwrap_or(DEFAULT_GUIDANCE_SCALE),
        seed: request.i64_param("seed"),
        seed_image,
        strength,
    })
}
