//! Result types for a completed formatting request.

use crate::pipeline::extract::DocumentMetadata;
use crate::pipeline::plan::FormattingPlan;
use std::time::Duration;

/// Everything a successful formatting request produces.
///
/// `bytes` is the complete rendered document; the plan and metadata ride
/// along so callers can log, display, or audit what the models decided
/// without re-deriving it.
#[derive(Debug, Clone)]
pub struct FormatOutput {
    /// The rendered output document.
    pub bytes: Vec<u8>,
    /// The repaired formatting plan the document was assembled from.
    pub plan: FormattingPlan,
    /// Structural metadata computed during extraction.
    pub metadata: DocumentMetadata,
    pub stats: FormatStats,
}

/// Counters and timings for one request.
#[derive(Debug, Clone, Default)]
pub struct FormatStats {
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Images extracted from the source document.
    pub image_count: usize,
    /// Images the completeness repair had to re-insert into the plan.
    pub repaired_image_count: usize,
    pub table_count: usize,
    pub extraction_time: Duration,
    pub plan_time: Duration,
    pub render_time: Duration,
    pub total_time: Duration,
}
