//! # docpolish
//!
//! AI-assisted document formatting: take an unstructured word-processing
//! document, understand its structure and media with generative models,
//! and rebuild it as a polished, consistently styled document.
//!
//! ```text
//!  input bytes
//!      │
//!      ▼
//!  extraction ── codec renditions, image analysis, table parsing
//!      │
//!      ▼
//!  plan synthesis ── text model → JSON plan → completeness repair
//!      │
//!      ▼
//!  assembly ── deterministic plan → DocumentTree
//!      │
//!      ▼
//!  rendering ── DocumentTree → output bytes
//! ```
//!
//! The pipeline is deliberately split along a trust boundary: everything a
//! model produces is treated as advisory and validated, repaired, or
//! degraded; everything after the plan is deterministic and total. See
//! [`format::format_document`] for the entry point and
//! [`config::FormatConfig`] for wiring in a codec, renderer, and models.
//!
//! ## Example
//!
//! ```no_run
//! use docpolish::config::FormatConfig;
//! use docpolish::format::format_document;
//! # use std::sync::Arc;
//! # async fn run(codec: Arc<dyn docpolish::provider::DocumentCodec>,
//! #              renderer: Arc<dyn docpolish::provider::DocumentRenderer>,
//! #              bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FormatConfig::builder()
//!     .codec(codec)
//!     .renderer(renderer)
//!     .build()?;
//! let output = format_document(&bytes, &config).await?;
//! std::fs::write("formatted.docx", &output.bytes)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod gemini;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod tree;

pub use config::{FormatConfig, FormatConfigBuilder};
pub use error::{ErrorEnvelope, FormatError};
pub use format::format_document;
pub use output::{FormatOutput, FormatStats};
