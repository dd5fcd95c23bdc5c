//! Image intelligence: semantic descriptions of embedded images.
//!
//! Every embedded image gets an [`ImageAnalysis`] record — either from the
//! vision model or, whenever the model is unconfigured or misbehaves, a
//! fixed fallback. [`analyse_image`] is total: image analysis is an
//! enrichment, and no enrichment failure is allowed to sink a formatting
//! request.

use crate::error::ProviderError;
use crate::pipeline::dimensions::MimeClass;
use crate::pipeline::json::parse_model_json;
use crate::pipeline::retry::{with_backoff, RetryPolicy};
use crate::prompts::VISION_PROMPT;
use crate::provider::VisionModel;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Semantic description of one embedded image.
///
/// Field names follow the JSON schema the vision prompt asks for. Always
/// fully populated: either entirely model-derived or entirely the
/// [`ImageAnalysis::fallback`] constant, never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub description: String,
    /// Model classification: photo, chart, graph, diagram, screenshot,
    /// logo, illustration, table, infographic, map, or other.
    #[serde(rename = "type", default)]
    pub classification: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(rename = "visibleText", default)]
    pub visible_text: String,
    #[serde(rename = "keyElements", default)]
    pub key_elements: Vec<String>,
    #[serde(rename = "suggestedCaption", default)]
    pub suggested_caption: String,
}

impl ImageAnalysis {
    /// The fixed analysis used when no vision model is available or the
    /// call fails for any reason.
    pub fn fallback() -> Self {
        Self {
            description: "Image from document".to_string(),
            classification: "image".to_string(),
            purpose: "visual content".to_string(),
            visible_text: String::new(),
            key_elements: Vec::new(),
            suggested_caption: "Document image".to_string(),
        }
    }
}

/// Describe an image via the vision model, falling back to
/// [`ImageAnalysis::fallback`] on any failure.
///
/// `vision` being `None` means no vision credential was configured; the
/// request proceeds with default captions rather than failing.
pub async fn analyse_image(
    vision: Option<&dyn VisionModel>,
    retry: RetryPolicy,
    bytes: &[u8],
    mime: MimeClass,
) -> ImageAnalysis {
    let Some(model) = vision else {
        warn!("no vision model configured, using default captions");
        return ImageAnalysis::fallback();
    };

    let mime_type = mime.as_mime_type();
    let response = with_backoff(retry, || model.describe(bytes, mime_type, VISION_PROMPT)).await;

    match response {
        Ok(text) => match parse_model_json::<ImageAnalysis>(&text) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("vision response was not valid analysis JSON: {e}");
                ImageAnalysis::fallback()
            }
        },
        Err(e) => {
            log_vision_failure(&e);
            ImageAnalysis::fallback()
        }
    }
}

/// Classify the failure for diagnostics; every branch resolves to the
/// fallback either way.
fn log_vision_failure(err: &ProviderError) {
    match err {
        ProviderError::ServiceDisabled { message } => {
            error!("vision API is disabled for this credential: {message}")
        }
        ProviderError::AuthDenied { message } => {
            error!("vision API credential rejected: {message}")
        }
        other => warn!("image analysis failed: {other}"),
    }
}
