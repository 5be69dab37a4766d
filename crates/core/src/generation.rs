//! Generation kinds, queue priorities, request/result value types, and
//! request validation.
//!
//! Validation limits mirror the public request schema; handlers call the
//! `validate_*` functions before anything is persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum prompt / negative prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 2000;
/// Minimum image width/height in pixels.
pub const MIN_DIMENSION: u32 = 64;
/// Maximum image width/height in pixels.
pub const MAX_DIMENSION: u32 = 2048;
/// Maximum number of inference steps.
pub const MAX_STEPS: u32 = 150;
/// Guidance scale bounds (inclusive).
pub const GUIDANCE_RANGE: (f64, f64) = (1.0, 20.0);
/// Maximum images per text-to-image request.
pub const MAX_NUM_IMAGES: u32 = 4;

/// Default image width/height.
pub const DEFAULT_DIMENSION: u32 = 512;
/// Default number of inference steps.
pub const DEFAULT_STEPS: u32 = 25;
/// Default guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 7.5;
/// Default image-to-image transformation strength.
pub const DEFAULT_STRENGTH: f64 = 0.75;

// ---------------------------------------------------------------------------
// GenerationKind
// ---------------------------------------------------------------------------

/// The kind of asset a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationKind {
    TextToImage,
    ImageToImage,
    TextToVideo,
    Upscale,
}

impl GenerationKind {
    /// Wire / storage representation, e.g. `"text-to-image"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
            Self::TextToVideo => "text-to-video",
            Self::Upscale => "upscale",
        }
    }

    /// Whether the external provider can execute this kind today.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::TextToImage | Self::ImageToImage)
    }

    /// Reject kinds the provider cannot execute, before any job is created.
    pub fn ensure_supported(self) -> Result<(), CoreError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(CoreError::NotImplemented(format!(
                "{} generation is not available from the provider yet",
                self.as_str()
            )))
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-to-image" => Ok(Self::TextToImage),
            "image-to-image" => Ok(Self::ImageToImage),
            "text-to-video" => Ok(Self::TextToVideo),
            "upscale" => Ok(Self::Upscale),
            other => Err(CoreError::Validation(format!(
                "Unknown generation kind: \"{other}\""
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Queue lane a job descriptor is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// All lanes in precedence order (highest first).
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            other => Err(CoreError::Validation(format!(
                "Unknown priority: \"{other}\" (expected high, normal, or low)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / result values
// ---------------------------------------------------------------------------

/// Everything the provider needs to execute one job.
///
/// `parameters` is the full, provider-neutral parameter mapping (sizes,
/// steps, seed, model, ...). The prompt is kept separate because it is a
/// distinct component of the result-cache fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    pub parameters: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, prompt: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            parameters,
        }
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    pub fn u64_param(&self, name: &str) -> Option<u64> {
        self.parameters.get(name).and_then(Value::as_u64)
    }

    pub fn i64_param(&self, name: &str) -> Option<i64> {
        self.parameters.get(name).and_then(Value::as_i64)
    }

    pub fn f64_param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).and_then(Value::as_f64)
    }
}

/// One asset produced by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Remote location of the asset as reported by the provider.
    pub asset_location: String,
    /// Local copy, when the asset was downloaded into storage.
    pub output_path: Option<String>,
    /// Seed actually used by the provider.
    pub seed: Option<i64>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a positive prompt: non-blank, at most [`MAX_PROMPT_LEN`] chars.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".to_string()));
    }
    validate_text_len("Prompt", prompt)
}

/// Validate an optional negative prompt (length only).
pub fn validate_negative_prompt(negative: Option<&str>) -> Result<(), CoreError> {
    match negative {
        Some(text) => validate_text_len("Negative prompt", text),
        None => Ok(()),
    }
}

fn validate_text_len(field: &str, text: &str) -> Result<(), CoreError> {
    if text.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must not exceed {MAX_PROMPT_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate an image dimension against [`MIN_DIMENSION`]..=[`MAX_DIMENSION`].
pub fn validate_dimension(field: &str, value: u32) -> Result<(), CoreError> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{field} must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_steps(steps: u32) -> Result<(), CoreError> {
    if !(1..=MAX_STEPS).contains(&steps) {
        return Err(CoreError::Validation(format!(
            "Steps must be between 1 and {MAX_STEPS}, got {steps}"
        )));
    }
    Ok(())
}

pub fn validate_guidance_scale(scale: f64) -> Result<(), CoreError> {
    let (min, max) = GUIDANCE_RANGE;
    if !(min..=max).contains(&scale) {
        return Err(CoreError::Validation(format!(
            "Guidance scale must be between {min} and {max}, got {scale}"
        )));
    }
    Ok(())
}

pub fn validate_num_images(count: u32) -> Result<(), CoreError> {
    if !(1..=MAX_NUM_IMAGES).contains(&count) {
        return Err(CoreError::Validation(format!(
            "Number of images must be between 1 and {MAX_NUM_IMAGES}, got {count}"
        )));
    }
    Ok(())
}

pub fn validate_strength(strength: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&strength) {
        return Err(CoreError::Validation(format!(
            "Strength must be between 0.0 and 1.0, got {strength}"
        )));
    }
    Ok(())
}

pub fn validate_source_image(image_url: &str) -> Result<(), CoreError> {
    if image_url.trim().is_empty() {
        return Err(CoreError::Validation(
            "Source image URL must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
