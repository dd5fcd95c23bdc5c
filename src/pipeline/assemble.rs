//! Document assembly: formatting plan + extracted records → output tree.
//!
//! Assembly is fully deterministic and never fails: every per-element
//! hazard (an id the plan invented, a table index past the end, an image
//! with no bytes, an unsupported byte format) is isolated to that element
//! — skipped or replaced with a placeholder — so the rest of the document
//! always renders. Sections and elements are emitted strictly in plan
//! order with no reordering, deduplication, or merging.

use crate::pipeline::dimensions::MimeClass;
use crate::pipeline::extract::{ImageRecord, ImageSet, TableRecord};
use crate::pipeline::plan::{Alignment, Element, FormattingPlan, SizePreference, TextStyle};
use crate::tree::{
    BorderSpec, CellNode, DocumentTree, HeadingLevel, ImageNode, Inline, Paragraph, RowNode, Run,
    TableNode,
};
use tracing::{debug, warn};

/// Upper bound on any sanitised text block.
const MAX_TEXT_CHARS: usize = 10_000;

/// Upper bound on a single table cell.
const MAX_CELL_CHARS: usize = 500;

/// Maximum render width when preserving aspect (photos, logos).
const MAX_WIDTH_ASPECT: u32 = 500;

/// Maximum render width for wide-fit images (charts, diagrams).
const MAX_WIDTH_FIT: u32 = 650;

const HEADER_SHADING: &str = "E8E8E8";
const CAPTION_COLOR: &str = "666666";
const PLACEHOLDER_COLOR: &str = "999999";
const LIST_INDENT: u32 = 360;

/// Build the output document tree from a repaired plan.
pub fn assemble(plan: &FormattingPlan, images: &ImageSet, tables: &[TableRecord]) -> DocumentTree {
    let mut tree = DocumentTree::default();

    let title = plan
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or("Formatted Document");
    tree.push_paragraph(
        Paragraph::heading(sanitize(title), HeadingLevel::Title)
            .with_alignment(Alignment::Center)
            .with_spacing(None, Some(400)),
    );

    for section in &plan.sections {
        if let Some(heading) = section.heading.as_deref().filter(|h| !h.is_empty()) {
            tree.push_paragraph(
                Paragraph::heading(sanitize(heading), HeadingLevel::H1)
                    .with_spacing(Some(300), Some(150)),
            );
        }

        for element in &section.elements {
            match element {
                Element::Text { content, style } => push_text(&mut tree, content, *style),
                Element::List { items } => push_list(&mut tree, items),
                Element::Image {
                    id,
                    caption,
                    alignment,
                    size_preference,
                } => push_image(
                    &mut tree,
                    images,
                    id,
                    caption.as_deref(),
                    *alignment,
                    *size_preference,
                ),
                Element::Table { table_index, title } => {
                    push_table(&mut tree, tables, *table_index, title.as_deref())
                }
            }
        }
    }

    tree
}

// ── Text and lists ───────────────────────────────────────────────────────

fn push_text(tree: &mut DocumentTree, content: &str, style: TextStyle) {
    let text = sanitize(content);
    let paragraph = match style {
        TextStyle::Heading => Paragraph::heading(text, HeadingLevel::H2),
        TextStyle::Subheading => Paragraph::heading(text, HeadingLevel::H3),
        TextStyle::Bold => Paragraph {
            children: vec![Inline::Run(Run {
                text,
                bold: true,
                ..Run::default()
            })],
            ..Paragraph::default()
        },
        TextStyle::Paragraph => Paragraph::text(text),
    };
    tree.push_paragraph(paragraph.with_spacing(None, Some(150)));
}

fn push_list(tree: &mut DocumentTree, items: &[String]) {
    for item in items {
        let mut p = Paragraph::text(format!("\u{2022} {}", sanitize(item)));
        p.indent_left = Some(LIST_INDENT);
        p.spacing_after = Some(100);
        tree.push_paragraph(p);
    }
}

// ── Images ───────────────────────────────────────────────────────────────

fn push_image(
    tree: &mut DocumentTree,
    images: &ImageSet,
    id: &str,
    caption: Option<&str>,
    alignment: Alignment,
    size_preference: SizePreference,
) {
    let Some(record) = images.get(id) else {
        debug!("plan references unknown image {id}, skipping");
        return;
    };

    if record.bytes.is_empty() {
        warn!("skipping {id}: empty image buffer");
        return;
    }

    match image_node(record, size_preference) {
        Ok(node) => {
            debug!(
                "placing {id}: {}x{} -> {}x{}",
                record.width, record.height, node.width, node.height
            );
            tree.push_paragraph(Paragraph {
                children: vec![Inline::Image(node)],
                alignment: Some(alignment),
                spacing_before: Some(200),
                spacing_after: Some(100),
                ..Paragraph::default()
            });

            if let Some(caption) = caption.filter(|c| !c.is_empty()) {
                tree.push_paragraph(Paragraph {
                    children: vec![Inline::Run(Run {
                        text: sanitize(caption),
                        italics: true,
                        size: Some(20),
                        color: Some(CAPTION_COLOR.to_string()),
                        ..Run::default()
                    })],
                    alignment: Some(Alignment::Center),
                    spacing_after: Some(300),
                    ..Paragraph::default()
                });
            }
        }
        Err(detail) => {
            warn!("failed to place {id}: {detail}");
            let label = caption.filter(|c| !c.is_empty()).unwrap_or(id);
            tree.push_paragraph(Paragraph {
                children: vec![Inline::Run(Run {
                    text: sanitize(&format!("[Image could not be loaded: {label}]")),
                    italics: true,
                    color: Some(PLACEHOLDER_COLOR.to_string()),
                    ..Run::default()
                })],
                ..Paragraph::default()
            });
        }
    }
}

/// Construct the scaled image node, or explain why it cannot be placed.
fn image_node(record: &ImageRecord, size_preference: SizePreference) -> Result<ImageNode, String> {
    let format = match record.mime {
        MimeClass::Png | MimeClass::Jpeg | MimeClass::Gif => record.mime,
        other => return Err(format!("unsupported image format {other:?}")),
    };

    let max_width = match size_preference {
        SizePreference::MaintainAspect => MAX_WIDTH_ASPECT,
        SizePreference::FitWidth => MAX_WIDTH_FIT,
    };
    let (width, height) = compute_render_size(record.width, record.height, max_width);

    Ok(ImageNode {
        data: record.bytes.clone(),
        format,
        width,
        height,
    })
}

/// Scale `(width, height)` down to fit under `max_width`, preserving the
/// aspect ratio. Images that already fit are returned unchanged — the
/// computation is idempotent, never an upscale.
pub fn compute_render_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = f64::from(max_width) / f64::from(width) * f64::from(height);
    (max_width, scaled.round() as u32)
}

// ── Tables ───────────────────────────────────────────────────────────────

fn push_table(tree: &mut DocumentTree, tables: &[TableRecord], index: usize, title: Option<&str>) {
    let Some(record) = tables.get(index) else {
        debug!("plan references table index {index} of {}, skipping", tables.len());
        return;
    };

    let Some(table) = build_table(record) else {
        debug!("table {index} had no renderable rows, skipping");
        return;
    };

    if let Some(title) = title.filter(|t| !t.is_empty()) {
        tree.push_paragraph(
            Paragraph::heading(sanitize(title), HeadingLevel::H2).with_spacing(Some(200), Some(150)),
        );
    }

    tree.push_table(table);
    // Breathing room after the table
    tree.push_paragraph(Paragraph::default().with_spacing(None, Some(300)));
}

/// Build a bordered table node from an extracted record.
///
/// The first row becomes a shaded, bold, centre-aligned header only when
/// the table has more than one row. Data cells align left in the first
/// column and centre elsewhere. Ragged rows render as-is. Returns `None`
/// when no rows survive.
pub fn build_table(record: &TableRecord) -> Option<TableNode> {
    if record.rows.is_empty() {
        return None;
    }

    let has_header = record.rows.len() > 1;
    let mut rows = Vec::with_capacity(record.rows.len());

    let (header, data) = if has_header {
        (Some(&record.rows[0]), &record.rows[1..])
    } else {
        (None, &record.rows[..])
    };

    if let Some(cells) = header.filter(|c| !c.is_empty()) {
        rows.push(RowNode {
            header: true,
            cells: cells
                .iter()
                .map(|cell| CellNode {
                    shading: Some(HEADER_SHADING.to_string()),
                    paragraph: Paragraph {
                        children: vec![Inline::Run(Run {
                            text: truncate_chars(cell, MAX_CELL_CHARS),
                            bold: true,
                            ..Run::default()
                        })],
                        alignment: Some(Alignment::Center),
                        ..Paragraph::default()
                    },
                })
                .collect(),
        });
    }

    for row in data {
        if row.is_empty() {
            continue;
        }
        rows.push(RowNode {
            header: false,
            cells: row
                .iter()
                .enumerate()
                .map(|(column, cell)| CellNode {
                    shading: None,
                    paragraph: Paragraph::text(truncate_chars(cell, MAX_CELL_CHARS))
                        .with_alignment(if column == 0 {
                            Alignment::Left
                        } else {
                            Alignment::Center
                        }),
                })
                .collect(),
        });
    }

    if rows.is_empty() {
        return None;
    }
    Some(TableNode {
        rows,
        border: BorderSpec::default(),
    })
}

// ── Sanitisation ─────────────────────────────────────────────────────────

/// Strip characters the output container cannot carry and cap the length.
///
/// Control characters are removed except tab, newline, and carriage
/// return; U+FFFD replacement characters are dropped outright.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            !(c.is_control() && c != '\t' && c != '\n' && c != '\r') && c != '\u{FFFD}'
        })
        .take(MAX_TEXT_CHARS)
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
