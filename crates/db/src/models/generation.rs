//! Generation record models, list query, and request DTOs.

use genhub_core::error::CoreError;
use genhub_core::generation::{
    validate_dimension, validate_guidance_scale, validate_negative_prompt, validate_num_images,
    validate_prompt, validate_source_image, validate_steps, validate_strength, GenerationKind,
    GenerationRequest, Priority, DEFAULT_DIMENSION, DEFAULT_GUIDANCE_SCALE, DEFAULT_STEPS,
    DEFAULT_STRENGTH,
};
use genhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use super::status::{GenerationStatus, StatusId};

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub generation_kind: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub parameters: Value,
    pub status_id: StatusId,
    pub output_path: Option<String>,
    pub output_url: Option<String>,
    pub seed: Option<i64>,
    pub error_message: Option<String>,
    pub favorite: bool,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub processing_time: Option<f64>,
}

impl Generation {
    pub fn status(&self) -> Option<GenerationStatus> {
        GenerationStatus::from_id(self.status_id)
    }

    /// Lowercase status name, `"unknown"` for an unmapped id.
    pub fn status_name(&self) -> &'static str {
        self.status().map(GenerationStatus::name).unwrap_or("unknown")
    }
}

/// Insert DTO. Rows are always created in `processing`.
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub generation_kind: GenerationKind,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub parameters: Value,
}

impl CreateGeneration {
    pub fn from_request(request: &GenerationRequest) -> Self {
        Self {
            generation_kind: request.kind,
            prompt: request.prompt.clone(),
            negative_prompt: request.str_param("negative_prompt").map(str::to_string),
            parameters: Value::Object(request.parameters.clone()),
        }
    }
}

/// Output fields written on the `processing -> completed` transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteGeneration {
    pub output_path: Option<String>,
    pub output_url: Option<String>,
    pub seed: Option<i64>,
    pub processing_time: f64,
}

/// Query parameters for `GET /api/v1/history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationListQuery {
    pub generation_kind: Option<String>,
    /// Status name (`pending`, `processing`, `completed`, `failed`).
    pub status: Option<String>,
    pub favorite: Option<bool>,
    /// Case-insensitive substring match over prompt and negative prompt.
    pub search: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl GenerationListQuery {
    /// Parse the textual filters, rejecting unknown kind or status names.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(kind) = &self.generation_kind {
            kind.parse::<GenerationKind>()?;
        }
        if let Some(status) = &self.status {
            status.parse::<GenerationStatus>()?;
        }
        if matches!(self.limit, Some(l) if l < 1) {
            return Err(CoreError::Validation("Limit must be at least 1".to_string()));
        }
        if matches!(self.offset, Some(o) if o < 0) {
            return Err(CoreError::Validation("Offset must not be negative".to_string()));
        }
        Ok(())
    }
}

/// One page of history plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationPage {
    pub items: Vec<Generation>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

fn default_use_cache() -> bool {
    true
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_guidance_scale() -> f64 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_num_images() -> u32 {
    1
}

fn default_strength() -> f64 {
    DEFAULT_STRENGTH
}

fn default_scale_factor() -> u32 {
    2
}

/// Body of `POST /api/v1/generate/text-to-image`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextToImageRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    pub seed: Option<i64>,
    pub model: Option<String>,
    #[serde(default = "default_num_images")]
    pub num_images: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl TextToImageRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        validate_negative_prompt(self.negative_prompt.as_deref())?;
        validate_dimension("Width", self.width)?;
        validate_dimension("Height", self.height)?;
        validate_steps(self.steps)?;
        validate_guidance_scale(self.guidance_scale)?;
        validate_num_images(self.num_images)?;
        Ok(())
    }

    /// Build the provider-neutral request. Every parameter is present
    /// (`null` when unset) so the cache fingerprint is stable.
    pub fn to_generation_request(&self) -> GenerationRequest {
        let mut params = Map::new();
        params.insert("negative_prompt".into(), self.negative_prompt.clone().into());
        params.insert("width".into(), self.width.into());
        params.insert("height".into(), self.height.into());
        params.insert("steps".into(), self.steps.into());
        params.insert("guidance_scale".into(), self.guidance_scale.into());
        params.insert("seed".into(), self.seed.into());
        params.insert("model".into(), self.model.clone().into());
        params.insert("num_images".into(), self.num_images.into());
        GenerationRequest::new(GenerationKind::TextToImage, self.prompt.clone(), params)
    }
}

/// Body of `POST /api/v1/generate/image-to-image`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageToImageRequest {
    pub prompt: String,
    pub image_url: String,
    pub negative_prompt: Option<String>,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    pub seed: Option<i64>,
    pub model: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl ImageToImageRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        validate_source_image(&self.image_url)?;
        validate_negative_prompt(self.negative_prompt.as_deref())?;
        validate_strength(self.strength)?;
        validate_steps(self.steps)?;
        validate_guidance_scale(self.guidance_scale)?;
        Ok(())
    }

    pub fn to_generation_request(&self) -> GenerationRequest {
        let mut params = Map::new();
        params.insert("image_url".into(), self.image_url.clone().into());
        params.insert("negative_prompt".into(), self.negative_prompt.clone().into());
        params.insert("strength".into(), self.strength.into());
        params.insert("steps".into(), self.steps.into());
        params.insert("guidance_scale".into(), self.guidance_scale.into());
        params.insert("seed".into(), self.seed.into());
        params.insert("model".into(), self.model.clone().into());
        GenerationRequest::new(GenerationKind::ImageToImage, self.prompt.clone(), params)
    }
}

/// Body of `POST /api/v1/generate/text-to-video`. Accepted for shape only;
/// the provider cannot execute video jobs yet.
#[derive(Debug, Clone, Deserialize)]
pub struct TextToVideoRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub duration: Option<u32>,
    pub fps: Option<u32>,
    pub seed: Option<i64>,
    pub model: Option<String>,
}

impl TextToVideoRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        validate_negative_prompt(self.negative_prompt.as_deref())
    }
}

/// Body of `POST /api/v1/upscale`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpscaleRequest {
    pub image_url: String,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u32,
    pub model: Option<String>,
}

impl UpscaleRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_source_image(&self.image_url)?;
        if !(2..=4).contains(&self.scale_factor) {
            return Err(CoreError::Validation(format!(
                "Scale factor must be between 2 and 4, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t2i(body: Value) -> TextToImageRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn text_to_image_defaults() {
        let req = t2i(serde_json::json!({"prompt": "mountain sunset"}));
        assert_eq!(req.width, 512);
        assert_eq!(req.height, 512);
        assert_eq!(req.steps, 25);
        assert_eq!(req.guidance_scale, 7.5);
        assert_eq!(req.num_images, 1);
        assert_eq!(req.priority, Priority::Normal);
        assert!(req.use_cache);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn text_to_image_parameters_always_carry_seed() {
        let req = t2i(serde_json::json!({"prompt": "mountain sunset"}));
        let built = req.to_generation_request();
        assert_eq!(built.kind, GenerationKind::TextToImage);
        assert_eq!(built.parameters.get("seed"), Some(&Value::Null));

        let seeded = t2i(serde_json::json!({"prompt": "mountain sunset", "seed": 42}));
        assert_eq!(seeded.to_generation_request().i64_param("seed"), Some(42));
    }

    #[test]
    fn text_to_image_rejects_out_of_range() {
        let req = t2i(serde_json::json!({"prompt": "x", "width": 4096}));
        assert!(req.validate().is_err());
        let req = t2i(serde_json::json!({"prompt": "", "width": 512}));
        assert!(req.validate().is_err());
        let req = t2i(serde_json::json!({"prompt": "x", "num_images": 0}));
        assert!(req.validate().is_err());
    }

    #[test]
    fn image_to_image_requires_source() {
        let req: ImageToImageRequest =
            serde_json::from_value(serde_json::json!({"prompt": "x", "image_url": " "})).unwrap();
        assert!(req.validate().is_err());

        let req: ImageToImageRequest = serde_json::from_value(
            serde_json::json!({"prompt": "x", "image_url": "https://img/a.png", "priority": "high"}),
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.priority, Priority::High);
        let built = req.to_generation_request();
        assert_eq!(built.str_param("image_url"), Some("https://img/a.png"));
        assert_eq!(built.f64_param("strength"), Some(0.75));
    }

    #[test]
    fn create_generation_lifts_negative_prompt() {
        let req = t2i(serde_json::json!({"prompt": "cat", "negative_prompt": "blurry"}));
        let create = CreateGeneration::from_request(&req.to_generation_request());
        assert_eq!(create.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(create.parameters["width"], 512);
    }

    #[test]
    fn list_query_validation() {
        let ok = GenerationListQuery {
            generation_kind: Some("text-to-image".into()),
            status: Some("completed".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_kind = GenerationListQuery {
            generation_kind: Some("sound".into()),
            ..Default::default()
        };
        assert!(bad_kind.validate().is_err());

        let bad_limit = GenerationListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(bad_limit.validate().is_err());
    }

    #[test]
    fn upscale_scale_factor_bounds() {
        let req = UpscaleRequest {
            image_url: "a.png".into(),
            scale_factor: 8,
            model: None,
        };
        assert!(req.validate().is_err());
    }
}
