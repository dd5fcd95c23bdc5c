//! Narrow contracts for the pipeline's external collaborators.
//!
//! The pipeline itself is a pure transformation; everything that touches
//! the outside world sits behind one of the four traits here:
//!
//! * [`DocumentCodec`] — low-level decoding of the source document's
//!   package format into text / markup / media renditions.
//! * [`DocumentRenderer`] — binary serialisation of the assembled
//!   [`DocumentTree`](crate::tree::DocumentTree).
//! * [`TextModel`] — the remote text-generation model that produces the
//!   formatting plan.
//! * [`VisionModel`] — the remote vision model that describes embedded
//!   images.
//!
//! Keeping the contracts this narrow makes every stage testable with a few
//! lines of fake: the integration tests drive the full pipeline without a
//! real codec or any network I/O.

use crate::error::{CodecError, ProviderError};
use crate::pipeline::dimensions::MimeClass;
use async_trait::async_trait;

/// An image pulled out of the source document by the codec, before any
/// analysis has run.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    pub mime: MimeClass,
}

/// HTML-like rendition plus the images the decoder encountered, in
/// document order.
///
/// The codec substitutes the n-th embedded image with the placeholder
/// token `{{IMAGE_<n>}}` in the markup, where `n` is the image's index in
/// `images`. The extractor relies on that correspondence when it builds
/// [`ImageRecord`](crate::pipeline::extract::ImageRecord)s.
#[derive(Debug, Clone, Default)]
pub struct RichContent {
    pub html: String,
    pub images: Vec<EmbeddedImage>,
}

/// Low-level document decoding.
///
/// Implementations wrap whatever library actually understands the binary
/// container format; the pipeline never parses it from first principles.
/// All methods take the full document buffer so implementations stay
/// stateless.
pub trait DocumentCodec: Send + Sync {
    /// Plain text content, paragraphs separated by newlines.
    fn decode_raw_text(&self, buffer: &[u8]) -> Result<String, CodecError>;

    /// HTML-like rendition without image substitution.
    fn decode_html(&self, buffer: &[u8]) -> Result<String, CodecError>;

    /// HTML-like rendition with `{{IMAGE_<n>}}` placeholders substituted
    /// for embedded images, plus the image bytes themselves.
    fn decode_html_with_images(&self, buffer: &[u8]) -> Result<RichContent, CodecError>;

    /// Markdown rendition.
    fn decode_markdown(&self, buffer: &[u8]) -> Result<String, CodecError>;

    /// Package inspection: every media entry in the container as a
    /// `(path, bytes)` pair, in package order.
    fn embedded_media(&self, buffer: &[u8]) -> Result<Vec<(String, Vec<u8>)>, CodecError>;
}

/// Binary serialisation of the assembled output document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, tree: &crate::tree::DocumentTree) -> Result<Vec<u8>, CodecError>;
}

/// Remote text-generation model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate free text for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Remote vision model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Describe the given image, answering `prompt`. `mime` is the
    /// IANA media type of `image` (e.g. `image/png`).
    async fn describe(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}
