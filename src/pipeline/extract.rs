//! Structure extraction: source document buffer → [`ExtractionResult`].
//!
//! The extractor produces every AI-independent view of the document the
//! later stages need: raw text, an HTML-like rendition with `{{IMAGE_<n>}}`
//! placeholders, a markdown rendition, analysed image records, parsed
//! tables, and size metadata.
//!
//! ## Failure policy
//!
//! Only the raw-text decode is fatal — without text there is nothing to
//! format. Every other step degrades: a failed rendition becomes an empty
//! string, a failed image route yields zero images, and the request
//! continues with whatever survived. The degradation is visible in
//! [`DocumentMetadata`] counters, not in errors.
//!
//! ## Image strategies
//!
//! Two routes exist for finding embedded images and exactly one runs per
//! document: direct package inspection first (more reliable), and the
//! decoder-driven route only when inspection found nothing. They are never
//! merged — running both would double up every image the first one saw.

use crate::error::FormatError;
use crate::pipeline::dimensions::{sniff_dimensions, MimeClass};
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::vision::{self, ImageAnalysis};
use crate::provider::{DocumentCodec, EmbeddedImage, VisionModel};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

// ── Data model ───────────────────────────────────────────────────────────

/// An embedded image after extraction: bytes, native dimensions, and the
/// vision model's semantic description. Read-only once created.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Placeholder token, unique within the document: `{{IMAGE_<n>}}`.
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime: MimeClass,
    pub width: u32,
    pub height: u32,
    pub analysis: ImageAnalysis,
}

/// Insertion-ordered collection of [`ImageRecord`]s keyed by placeholder id.
///
/// Document order matters downstream — the prompt lists images in the
/// order they appear, and plan repair appends missing images in the same
/// order — so this is a vector with id lookup rather than a hash map.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    records: Vec<ImageRecord>,
}

impl ImageSet {
    pub fn push(&mut self, record: ImageRecord) {
        self.records.push(record);
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One table parsed from the HTML rendition.
///
/// Rows are *not* required to share a cell count; the assembler tolerates
/// ragged rows rather than inventing padding that was never in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub rows: Vec<Vec<String>>,
}

impl TableRecord {
    /// Cell count of the first row, used for prompt context.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }
}

/// Coarse size classification used as a hint in the plan prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn classify(word_count: usize) -> Self {
        if word_count > 2000 {
            Complexity::Complex
        } else if word_count > 500 {
            Complexity::Moderate
        } else {
            Complexity::Simple
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        };
        f.write_str(s)
    }
}

/// Derived counters describing the extracted document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata {
    pub word_count: usize,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub table_count: usize,
    pub has_tables: bool,
    pub complexity: Complexity,
}

/// Everything the plan synthesizer and assembler need, computed in one
/// pass over the source buffer. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub raw_text: String,
    pub html: String,
    /// Markdown rendition; informational only, not consumed downstream.
    pub markdown: String,
    pub images: ImageSet,
    pub tables: Vec<TableRecord>,
    pub metadata: DocumentMetadata,
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Extract the full document structure from `buffer`.
///
/// Images are analysed strictly one at a time in document order: each
/// analysis is a network round trip, and the resulting insertion order is
/// load-bearing for the prompt and for plan repair.
pub async fn extract_structure(
    buffer: &[u8],
    codec: &dyn DocumentCodec,
    vision: Option<&dyn VisionModel>,
    vision_retry: RetryPolicy,
) -> Result<ExtractionResult, FormatError> {
    let raw_text = codec
        .decode_raw_text(buffer)
        .map_err(|e| FormatError::DecodeFailed { detail: e.to_string() })?;

    let (html, gathered) = gather_images(buffer, codec);
    info!("found {} embedded images", gathered.len());

    let mut images = ImageSet::default();
    for (n, embedded) in gathered.into_iter().enumerate() {
        let id = format!("{{{{IMAGE_{n}}}}}");
        let (width, height) = sniff_dimensions(&embedded.bytes, embedded.mime);
        debug!("{id}: {width}x{height} {}", embedded.mime.as_mime_type());
        let analysis = vision::analyse_image(vision, vision_retry, &embedded.bytes, embedded.mime).await;
        images.push(ImageRecord {
            id,
            bytes: embedded.bytes,
            mime: embedded.mime,
            width,
            height,
            analysis,
        });
    }

    let tables = parse_tables(&html);
    info!("extracted {} tables", tables.len());

    let markdown = codec.decode_markdown(buffer).unwrap_or_else(|e| {
        warn!("markdown rendition failed: {e}");
        String::new()
    });

    let metadata = compute_metadata(&raw_text, images.len(), tables.len());

    Ok(ExtractionResult {
        raw_text,
        html,
        markdown,
        images,
        tables,
        metadata,
    })
}

/// Run the image strategies in order until one yields a non-empty set.
///
/// Returns the HTML rendition (with placeholders) and the raw images in
/// document order. Both routes failing is not an error — the document is
/// simply treated as image-free.
fn gather_images(buffer: &[u8], codec: &dyn DocumentCodec) -> (String, Vec<EmbeddedImage>) {
    // Route 1: direct package inspection.
    let inspected: Vec<EmbeddedImage> = match codec.embedded_media(buffer) {
        Ok(media) => media
            .into_iter()
            .filter(|(path, _)| MimeClass::is_raster_path(path))
            .map(|(path, bytes)| EmbeddedImage {
                mime: MimeClass::from_media_path(&path),
                bytes,
            })
            .collect(),
        Err(e) => {
            warn!("package inspection failed: {e}");
            Vec::new()
        }
    };

    if !inspected.is_empty() {
        // The plain rendition carries no placeholders; append one tag per
        // inspected image so the markup still references every image.
        let mut html = codec.decode_html(buffer).unwrap_or_else(|e| {
            warn!("html rendition failed: {e}");
            String::new()
        });
        for n in 0..inspected.len() {
            html.push_str(&format!("<p><img src=\"{{{{IMAGE_{n}}}}}\" /></p>"));
        }
        return (html, inspected);
    }

    // Route 2: decoder-driven extraction.
    match codec.decode_html_with_images(buffer) {
        Ok(rich) => (rich.html, rich.images),
        Err(e) => {
            warn!("decoder-driven image extraction failed: {e}");
            let html = codec.decode_html(buffer).unwrap_or_default();
            (html, Vec::new())
        }
    }
}

// ── Table parsing ────────────────────────────────────────────────────────

static RE_TABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<table[^>]*>(.*?)</table>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap());
static RE_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<t[hd][^>]*>(.*?)</t[hd]>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parse `<table>` blocks out of the HTML rendition.
///
/// Cells keep their text with inner markup stripped and whitespace
/// collapsed. Rows with zero cells are dropped; tables with zero surviving
/// rows are dropped entirely.
pub fn parse_tables(html: &str) -> Vec<TableRecord> {
    let mut tables = Vec::new();

    for table_cap in RE_TABLE.captures_iter(html) {
        let body = &table_cap[1];
        let mut rows = Vec::new();

        for row_cap in RE_ROW.captures_iter(body) {
            let cells: Vec<String> = RE_CELL
                .captures_iter(&row_cap[1])
                .map(|cell_cap| {
                    let stripped = RE_TAG.replace_all(&cell_cap[1], " ");
                    RE_WS.replace_all(&stripped, " ").trim().to_string()
                })
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        if !rows.is_empty() {
            tables.push(TableRecord { rows });
        }
    }

    tables
}

// ── Metadata ─────────────────────────────────────────────────────────────

fn compute_metadata(raw_text: &str, image_count: usize, table_count: usize) -> DocumentMetadata {
    let word_count = raw_text.split_whitespace().count();
    let paragraph_count = raw_text.lines().filter(|l| !l.trim().is_empty()).count();
    DocumentMetadata {
        word_count,
        paragraph_count,
        image_count,
        table_count,
        has_tables: table_count > 0,
        complexity: Complexity::classify(word_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_metadata() {
        let meta = compute_metadata("Hello world", 0, 0);
        assert_eq!(meta.word_count, 2);
        assert_eq!(meta.paragraph_count, 1);
        assert_eq!(meta.image_count, 0);
        assert_eq!(meta.table_count, 0);
        assert!(!meta.has_tables);
        assert_eq!(meta.complexity, Complexity::Simple);
    }

    #[test]
    fn paragraph_count_skips_blank_lines() {
        let meta = compute_metadata("one\n\n  \ntwo\nthree\n", 0, 0);
        assert_eq!(meta.paragraph_count, 3);
    }

    #[test]
    fn complexity_thresholds() {
        assert_eq!(Complexity::classify(500), Complexity::Simple);
        assert_eq!(Complexity::classify(501), Complexity::Moderate);
        assert_eq!(Complexity::classify(2000), Complexity::Moderate);
        assert_eq!(Complexity::classify(2001), Complexity::Complex);
    }

    #[test]
    fn complexity_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&Complexity::Moderate).unwrap(),
            "\"moderate\""
        );
    }

    #[test]
    fn simple_table_parses() {
        let html = "<table><tr><td>A</td><td>B</td></tr><tr><td>1</td><td>2</td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].rows,
            vec![vec!["A".to_string(), "B".to_string()], vec!["1".to_string(), "2".to_string()]]
        );
    }

    #[test]
    fn header_cells_and_attributes_parse() {
        let html = r#"<table class="x"><tr><th scope="col">Name</th><th>Age</th></tr><tr><td>Ada</td><td>36</td></tr></table>"#;
        let tables = parse_tables(html);
        assert_eq!(tables[0].rows[0], vec!["Name", "Age"]);
    }

    #[test]
    fn inner_markup_is_stripped_and_whitespace_collapsed() {
        let html = "<table><tr><td> <b>bold</b>\n  text </td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables[0].rows[0][0], "bold text");
    }

    #[test]
    fn empty_rows_and_tables_are_dropped() {
        let html = "<table><tr></tr></table><table><tr><td>x</td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 1);
    }

    #[test]
    fn ragged_rows_are_preserved() {
        let html = "<table><tr><td>a</td><td>b</td><td>c</td></tr><tr><td>only</td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables[0].rows[0].len(), 3);
        assert_eq!(tables[0].rows[1].len(), 1);
    }

    #[test]
    fn multiple_tables_keep_document_order() {
        let html = "<p>x</p><table><tr><td>first</td></tr></table><table><tr><td>second</td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables[0].rows[0][0], "first");
        assert_eq!(tables[1].rows[0][0], "second");
    }

    #[test]
    fn image_set_preserves_insertion_order() {
        let mut set = ImageSet::default();
        for n in 0..3 {
            set.push(ImageRecord {
                id: format!("{{{{IMAGE_{n}}}}}"),
                bytes: vec![1],
                mime: MimeClass::Png,
                width: 10,
                height: 10,
                analysis: ImageAnalysis::fallback(),
            });
        }
        let ids: Vec<&str> = set.ids().collect();
        assert_eq!(ids, vec!["{{IMAGE_0}}", "{{IMAGE_1}}", "{{IMAGE_2}}"]);
        assert!(set.get("{{IMAGE_1}}").is_some());
        assert!(set.get("{{IMAGE_9}}").is_none());
    }
}
