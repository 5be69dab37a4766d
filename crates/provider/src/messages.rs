//! Typed Runware task and response messages.
//!
//! Requests are a JSON array of tasks; responses wrap results in `data`
//! and failures in `errors`.

use serde::{Deserialize, Serialize};

/// Task type for image synthesis (text-to-image and image-to-image).
pub const TASK_TYPE_IMAGE_INFERENCE: &str = "imageInference";

/// Ask the provider to return hosted URLs rather than inline data.
pub const OUTPUT_TYPE_URL: &str = "URL";

/// One `imageInference` task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInferenceTask {
    pub task_type: &'static str,
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,
    pub output_type: &'static str,
    pub positive_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub number_results: u32,
    pub steps: u32,
    #[serde(rename = "CFGScale")]
    pub cfg_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Source image for image-to-image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

/// One generated image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageResult {
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,
    #[serde(rename = "imageUUID", default)]
    pub image_uuid: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    #[serde(default)]
    pub seed: Option<i64>,
}

/// A task-level error reported by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Response body of the task endpoint.
#[derive(Debug, Deserialize)]
pub struct TaskResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub errors: Vec<TaskError>,
}
