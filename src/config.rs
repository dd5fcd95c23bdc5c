//! Pipeline configuration.
//!
//! All knobs and collaborators are explicit: the pipeline reads no global
//! state at run time. Environment variables are consulted exactly once, in
//! [`FormatConfigBuilder::build`], and only to resolve model credentials
//! that were not supplied programmatically.

use crate::error::FormatError;
use crate::gemini::{GeminiTextModel, GeminiVisionModel};
use crate::pipeline::retry::RetryPolicy;
use crate::provider::{DocumentCodec, DocumentRenderer, TextModel, VisionModel};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on the input document, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Environment variable holding the text-model API key.
pub const TEXT_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable holding a dedicated vision-model API key. Falls
/// back to [`TEXT_KEY_ENV`] when unset.
pub const VISION_KEY_ENV: &str = "GEMINI_VISION_API_KEY";

/// Validated, immutable configuration for
/// [`format_document`](crate::format::format_document).
///
/// Construct via [`FormatConfig::builder`]. The codec and renderer are
/// mandatory; the text model is resolved from the environment when not
/// supplied, and its absence is only an error once a formatting request
/// actually needs it. The vision model is always optional.
#[derive(Clone)]
pub struct FormatConfig {
    pub(crate) codec: Arc<dyn DocumentCodec>,
    pub(crate) renderer: Arc<dyn DocumentRenderer>,
    pub(crate) text_model: Option<Arc<dyn TextModel>>,
    pub(crate) vision_model: Option<Arc<dyn VisionModel>>,
    pub(crate) max_input_bytes: usize,
    pub(crate) plan_retry: RetryPolicy,
    pub(crate) vision_retry: RetryPolicy,
}

impl FormatConfig {
    pub fn builder() -> FormatConfigBuilder {
        FormatConfigBuilder::default()
    }

    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }

    pub fn has_text_model(&self) -> bool {
        self.text_model.is_some()
    }

    pub fn has_vision_model(&self) -> bool {
        self.vision_model.is_some()
    }
}

impl fmt::Debug for FormatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatConfig")
            .field("text_model", &self.text_model.as_ref().map(|_| "<dyn TextModel>"))
            .field("vision_model", &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"))
            .field("max_input_bytes", &self.max_input_bytes)
            .field("plan_retry", &self.plan_retry)
            .field("vision_retry", &self.vision_retry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FormatConfig`].
#[derive(Default)]
pub struct FormatConfigBuilder {
    codec: Option<Arc<dyn DocumentCodec>>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    text_model: Option<Arc<dyn TextModel>>,
    vision_model: Option<Arc<dyn VisionModel>>,
    max_input_bytes: Option<usize>,
    plan_retry: Option<RetryPolicy>,
    vision_retry: Option<RetryPolicy>,
}

impl FormatConfigBuilder {
    pub fn codec(mut self, codec: Arc<dyn DocumentCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Supply a text model directly, bypassing environment resolution.
    pub fn text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    /// Supply a vision model directly, bypassing environment resolution.
    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.vision_model = Some(model);
        self
    }

    pub fn max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = Some(limit);
        self
    }

    /// Retry policy for the plan-generation call.
    pub fn plan_retry(mut self, policy: RetryPolicy) -> Self {
        self.plan_retry = Some(policy);
        self
    }

    /// Retry policy for per-image vision calls.
    pub fn vision_retry(mut self, policy: RetryPolicy) -> Self {
        self.vision_retry = Some(policy);
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// Model resolution order: an explicitly supplied handle wins; otherwise
    /// the text model comes from `GEMINI_API_KEY` and the vision model from
    /// `GEMINI_VISION_API_KEY`, falling back to `GEMINI_API_KEY`. A missing
    /// text model is deferred to request time; a missing vision model just
    /// means default captions.
    pub fn build(self) -> Result<FormatConfig, FormatError> {
        let codec = self
            .codec
            .ok_or_else(|| FormatError::InvalidConfig("a DocumentCodec is required".into()))?;
        let renderer = self
            .renderer
            .ok_or_else(|| FormatError::InvalidConfig("a DocumentRenderer is required".into()))?;

        let max_input_bytes = self.max_input_bytes.unwrap_or(DEFAULT_MAX_INPUT_BYTES);
        if max_input_bytes == 0 {
            return Err(FormatError::InvalidConfig(
                "max_input_bytes must be greater than zero".into(),
            ));
        }

        let text_model = self.text_model.or_else(|| match env_key(TEXT_KEY_ENV) {
            Some(key) => {
                debug!("resolved text model credential from {TEXT_KEY_ENV}");
                Some(Arc::new(GeminiTextModel::new(key)) as Arc<dyn TextModel>)
            }
            None => {
                warn!("no text model configured and {TEXT_KEY_ENV} is unset");
                None
            }
        });

        let vision_model = self.vision_model.or_else(|| {
            match env_key(VISION_KEY_ENV).or_else(|| env_key(TEXT_KEY_ENV)) {
                Some(key) => {
                    debug!("resolved vision model credential from the environment");
                    Some(Arc::new(GeminiVisionModel::new(key)) as Arc<dyn VisionModel>)
                }
                None => None,
            }
        });

        Ok(FormatConfig {
            codec,
            renderer,
            text_model,
            vision_model,
            max_input_bytes,
            plan_retry: self.plan_retry.unwrap_or_default(),
            vision_retry: self.vision_retry.unwrap_or_else(RetryPolicy::for_vision),
        })
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, ProviderError};
    use crate::provider::RichContent;
    use crate::tree::DocumentTree;
    use async_trait::async_trait;

    struct NullCodec;

    impl DocumentCodec for NullCodec {
        fn decode_raw_text(&self, _: &[u8]) -> Result<String, CodecError> {
            Ok(String::new())
        }
        fn decode_html(&self, _: &[u8]) -> Result<String, CodecError> {
            Ok(String::new())
        }
        fn decode_html_with_images(&self, _: &[u8]) -> Result<RichContent, CodecError> {
            Ok(RichContent::default())
        }
        fn decode_markdown(&self, _: &[u8]) -> Result<String, CodecError> {
            Ok(String::new())
        }
        fn embedded_media(&self, _: &[u8]) -> Result<Vec<(String, Vec<u8>)>, CodecError> {
            Ok(Vec::new())
        }
    }

    struct NullRenderer;

    impl DocumentRenderer for NullRenderer {
        fn render(&self, _: &DocumentTree) -> Result<Vec<u8>, CodecError> {
            Ok(Vec::new())
        }
    }

    struct NullModel;

    #[async_trait]
    impl TextModel for NullModel {
        async fn generate(&self, _: &str) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    #[test]
    fn missing_codec_is_rejected() {
        let err = FormatConfig::builder()
            .renderer(Arc::new(NullRenderer))
            .build()
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidConfig(_)));
    }

    #[test]
    fn zero_size_limit_is_rejected() {
        let err = FormatConfig::builder()
            .codec(Arc::new(NullCodec))
            .renderer(Arc::new(NullRenderer))
            .max_input_bytes(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidConfig(_)));
    }

    #[test]
    fn defaults_are_applied() {
        let config = FormatConfig::builder()
            .codec(Arc::new(NullCodec))
            .renderer(Arc::new(NullRenderer))
            .text_model(Arc::new(NullModel))
            .build()
            .unwrap();
        assert_eq!(config.max_input_bytes(), DEFAULT_MAX_INPUT_BYTES);
        assert_eq!(config.plan_retry.max_retries, 3);
        assert_eq!(config.vision_retry.max_retries, 2);
        assert!(config.has_text_model());
    }

    #[test]
    fn explicit_model_wins_over_environment() {
        let config = FormatConfig::builder()
            .codec(Arc::new(NullCodec))
            .renderer(Arc::new(NullRenderer))
            .text_model(Arc::new(NullModel))
            .build()
            .unwrap();
        assert!(config.has_text_model());
    }
}
