//! Top-level formatting pipeline.
//!
//! One call, [`format_document`], runs the whole transformation: decode
//! the source document, describe its images, ask the text model for a
//! formatting plan, repair the plan for completeness, assemble the output
//! tree, and render it. Fatal failures come back as a single
//! [`FormatError`]; everything recoverable degrades inside its stage.

use crate::config::FormatConfig;
use crate::error::FormatError;
use crate::output::{FormatOutput, FormatStats};
use crate::pipeline::assemble::assemble;
use crate::pipeline::extract::extract_structure;
use crate::pipeline::plan::{repair_plan, synthesize_plan};
use std::time::Instant;
use tracing::info;

/// Format `buffer` into a polished output document.
///
/// The buffer is the source document's raw bytes. On success the output
/// carries the rendered document plus the plan, metadata, and stage
/// timings; on failure exactly one [`FormatError`] describes what went
/// wrong and no partial output is produced.
pub async fn format_document(
    buffer: &[u8],
    config: &FormatConfig,
) -> Result<FormatOutput, FormatError> {
    let started = Instant::now();

    // ── Step 1: input guards ─────────────────────────────────────────────
    if buffer.is_empty() {
        return Err(FormatError::EmptyInput);
    }
    if buffer.len() > config.max_input_bytes {
        return Err(FormatError::InputTooLarge {
            size: buffer.len(),
            limit: config.max_input_bytes,
        });
    }

    let text_model = config
        .text_model
        .as_deref()
        .ok_or(FormatError::MissingTextModel)?;

    info!("formatting document ({} bytes)", buffer.len());

    // ── Step 2: structural extraction ────────────────────────────────────
    let extract_started = Instant::now();
    let extracted = extract_structure(
        buffer,
        config.codec.as_ref(),
        config.vision_model.as_deref(),
        config.vision_retry,
    )
    .await?;
    let extraction_time = extract_started.elapsed();
    info!(
        "extracted {} words, {} images, {} tables ({} complexity) in {:.2?}",
        extracted.metadata.word_count,
        extracted.metadata.image_count,
        extracted.metadata.table_count,
        extracted.metadata.complexity,
        extraction_time,
    );

    // ── Step 3: plan synthesis and completeness repair ───────────────────
    let plan_started = Instant::now();
    let raw_plan = synthesize_plan(&extracted, text_model, config.plan_retry).await?;
    let referenced_before = raw_plan.referenced_image_ids().len();
    let plan = repair_plan(raw_plan, &extracted.images);
    let repaired_image_count = plan
        .referenced_image_ids()
        .len()
        .saturating_sub(referenced_before);
    let plan_time = plan_started.elapsed();
    info!(
        "plan ready: {} sections, {} images re-inserted, in {:.2?}",
        plan.sections.len(),
        repaired_image_count,
        plan_time,
    );

    // ── Step 4: assembly and rendering ───────────────────────────────────
    let render_started = Instant::now();
    let tree = assemble(&plan, &extracted.images, &extracted.tables);
    let bytes = config
        .renderer
        .render(&tree)
        .map_err(|e| FormatError::RenderFailed {
            detail: e.to_string(),
        })?;
    let render_time = render_started.elapsed();

    let total_time = started.elapsed();
    info!(
        "rendered {} bytes in {:.2?} (total {:.2?})",
        bytes.len(),
        render_time,
        total_time,
    );

    let stats = FormatStats {
        input_bytes: buffer.len(),
        output_bytes: bytes.len(),
        image_count: extracted.images.len(),
        repaired_image_count,
        table_count: extracted.tables.len(),
        extraction_time,
        plan_time,
        render_time,
        total_time,
    };

    Ok(FormatOutput {
        bytes,
        plan,
        metadata: extracted.metadata,
        stats,
    })
}
