//! Prompts for the vision and plan-generation models.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the plan schema or an
//!    image-placement rule requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the built prompt directly
//!    without calling a real model, so context-block regressions are easy
//!    to catch.

use crate::pipeline::extract::ExtractionResult;
use std::fmt::Write as _;

/// How much of the HTML rendition the plan prompt may carry.
const HTML_CONTEXT_CHARS: usize = 5000;

/// How much of the raw text the plan prompt may carry.
const RAW_TEXT_CONTEXT_CHARS: usize = 2000;

/// Prompt sent to the vision model for each embedded image.
pub const VISION_PROMPT: &str = r#"Analyze this image from a document and provide detailed information:

1. **Description**: What does this image show? (2-3 sentences)
2. **Type**: Classify as one of: photo, chart, graph, diagram, screenshot, logo, illustration, table, infographic, map, other
3. **Purpose**: Why is this image in the document? What information does it convey?
4. **Visible Text**: Any text, labels, or numbers visible in the image
5. **Key Elements**: Main components or data points shown
6. **Suggested Caption**: A professional caption for this image

Return as JSON:
{
  "description": "detailed description",
  "type": "specific type",
  "purpose": "document purpose",
  "visibleText": "text content",
  "keyElements": ["element1", "element2"],
  "suggestedCaption": "professional caption"
}"#;

/// Build the full plan-generation prompt from an extraction result.
///
/// The prompt embeds the metadata counters, a context block per image and
/// per table, bounded prefixes of the HTML and raw-text renditions, and
/// the fixed instruction set (schema, image rules, table rules).
pub fn build_plan_prompt(extracted: &ExtractionResult) -> String {
    let mut prompt = String::with_capacity(8192);

    let _ = write!(
        prompt,
        r#"You are a **Professional Document Formatting AI**.
Generate a **pure JSON formatting plan** for a polished, professional document.

DOCUMENT METADATA:
- Word count: {}
- Paragraphs: {}
- Images: {}
- Tables: {}
- Complexity: {}
"#,
        extracted.metadata.word_count,
        extracted.metadata.paragraph_count,
        extracted.metadata.image_count,
        extracted.metadata.table_count,
        extracted.metadata.complexity,
    );

    prompt.push_str(&image_context(extracted));
    prompt.push_str(&table_context(extracted));

    prompt.push_str(r#"
### JSON Schema:
{
  "title": "string",
  "sections": [
    {
      "heading": "string",
      "elements": [
        {
          "type": "text",
          "content": "string",
          "style": "paragraph|heading|subheading|bold"
        },
        {
          "type": "image",
          "id": "{{IMAGE_X}}",
          "caption": "use suggestedCaption from image analysis",
          "alignment": "left|center|right",
          "sizePreference": "maintain-aspect|fit-width"
        },
        {
          "type": "list",
          "items": ["string"]
        },
        {
          "type": "table",
          "tableIndex": 0,
          "title": "descriptive title for this table"
        }
      ]
    }
  ]
}

### IMAGE FORMATTING RULES:
1. **MUST include ALL images** listed above - do not skip any
2. Use the suggestedCaption from the image analysis
3. Set sizePreference to "fit-width" for charts/diagrams, "maintain-aspect" for photos/logos
4. Center-align charts and graphs, left-align screenshots, left-align logos/symbols
5. Place images logically based on their purpose:
   - Logos/symbols: Near the beginning or in relevant sections
   - Charts/graphs: In data-related sections with descriptive context
   - Screenshots: In instructional sections
   - Decorative images: Appropriate contextual placement

### TABLE FORMATTING RULES:
1. Give each table a descriptive title based on its content
2. Reference tables by their tableIndex (0, 1, 2, etc.)
3. Place tables in logical sections near related text
4. Tables will be automatically formatted with proper borders and styling

### CRITICAL RULES:
1. **NEVER modify actual text content** - preserve exactly as-is
2. Use ALL image descriptions to create meaningful captions
3. Include ALL tables found in the document
4. Create proper document hierarchy
5. Return ONLY valid JSON, no markdown or commentary
"#);

    let _ = write!(
        prompt,
        "\nDocument content:\n\"\"\"{}\"\"\"\n\nRaw text:\n\"\"\"{}\"\"\"\n",
        truncate_chars(&extracted.html, HTML_CONTEXT_CHARS),
        truncate_chars(&extracted.raw_text, RAW_TEXT_CONTEXT_CHARS),
    );

    prompt
}

/// Per-image context block: one entry per record, in document order.
fn image_context(extracted: &ExtractionResult) -> String {
    if extracted.images.is_empty() {
        return String::new();
    }

    let mut context = String::from("\n\nIMAGE DETAILS:\n");
    for record in extracted.images.iter() {
        let a = &record.analysis;
        let _ = write!(
            context,
            "\n{}:\n  - Type: {}\n  - Original Size: {}x{}\n  - Description: {}\n  - Purpose: {}\n  - Suggested Caption: {}\n",
            record.id, a.classification, record.width, record.height, a.description, a.purpose, a.suggested_caption,
        );
        if !a.visible_text.is_empty() {
            let _ = writeln!(context, "  - Text in image: \"{}\"", a.visible_text);
        }
        if !a.key_elements.is_empty() {
            let _ = writeln!(context, "  - Key Elements: {}", a.key_elements.join(", "));
        }
    }
    context
}

/// Per-table context block: row/column counts and a two-row preview.
fn table_context(extracted: &ExtractionResult) -> String {
    if extracted.tables.is_empty() {
        return String::new();
    }

    let mut context = String::from("\n\nTABLE DATA:\n");
    for (index, table) in extracted.tables.iter().enumerate() {
        let preview: Vec<&Vec<String>> = table.rows.iter().take(2).collect();
        let _ = write!(
            context,
            "\nTable {}:\n  - Rows: {}\n  - Columns: {}\n  - Preview: {}\n",
            index + 1,
            table.rows.len(),
            table.column_count(),
            serde_json::to_string(&preview).unwrap_or_default(),
        );
    }
    context
}

/// Take the first `max` characters of `s`, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dimensions::MimeClass;
    use crate::pipeline::extract::{
        Complexity, DocumentMetadata, ImageRecord, ImageSet, TableRecord,
    };
    use crate::pipeline::vision::ImageAnalysis;

    fn sample_extraction() -> ExtractionResult {
        let mut images = ImageSet::default();
        images.push(ImageRecord {
            id: "{{IMAGE_0}}".into(),
            bytes: vec![1, 2, 3],
            mime: MimeClass::Png,
            width: 800,
            height: 600,
            analysis: ImageAnalysis {
                description: "A pie chart".into(),
                classification: "chart".into(),
                purpose: "budget breakdown".into(),
                visible_text: "40% 60%".into(),
                key_elements: vec!["slices".into()],
                suggested_caption: "Budget split".into(),
            },
        });
        ExtractionResult {
            raw_text: "Hello world".into(),
            html: "<p>Hello world</p>".into(),
            markdown: String::new(),
            images,
            tables: vec![TableRecord {
                rows: vec![
                    vec!["A".into(), "B".into()],
                    vec!["1".into(), "2".into()],
                    vec!["3".into(), "4".into()],
                ],
            }],
            metadata: DocumentMetadata {
                word_count: 2,
                paragraph_count: 1,
                image_count: 1,
                table_count: 1,
                has_tables: true,
                complexity: Complexity::Simple,
            },
        }
    }

    #[test]
    fn prompt_embeds_metadata_and_contexts() {
        let prompt = build_plan_prompt(&sample_extraction());
        assert!(prompt.contains("Word count: 2"));
        assert!(prompt.contains("Complexity: simple"));
        assert!(prompt.contains("{{IMAGE_0}}"));
        assert!(prompt.contains("Suggested Caption: Budget split"));
        assert!(prompt.contains("Text in image: \"40% 60%\""));
        assert!(prompt.contains("Key Elements: slices"));
        assert!(prompt.contains("Table 1:"));
        assert!(prompt.contains("Rows: 3"));
        assert!(prompt.contains("Columns: 2"));
        assert!(prompt.contains("Return ONLY valid JSON"));
        assert!(prompt.contains("<p>Hello world</p>"));
    }

    #[test]
    fn table_preview_holds_first_two_rows_only() {
        let prompt = build_plan_prompt(&sample_extraction());
        assert!(prompt.contains(r#"[["A","B"],["1","2"]]"#));
        assert!(!prompt.contains(r#"["3","4"]"#));
    }

    #[test]
    fn empty_document_omits_context_blocks() {
        let mut extracted = sample_extraction();
        extracted.images = ImageSet::default();
        extracted.tables.clear();
        let prompt = build_plan_prompt(&extracted);
        assert!(!prompt.contains("IMAGE DETAILS"));
        assert!(!prompt.contains("TABLE DATA"));
    }

    #[test]
    fn long_renditions_are_truncated() {
        let mut extracted = sample_extraction();
        extracted.html = "h".repeat(20_000);
        extracted.raw_text = "r".repeat(20_000);
        let prompt = build_plan_prompt(&extracted);
        assert!(prompt.len() < 12_000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(&s, 3), "ééé");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
