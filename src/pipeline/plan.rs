//! Plan synthesis: extraction result → validated [`FormattingPlan`].
//!
//! The formatting plan is the structured intermediate the text model
//! produces: a title plus sections of text / image / list / table
//! elements. The model's output is never trusted as-is —
//!
//! * the response is parsed tolerantly (fences and control characters
//!   stripped) and an unparseable response degrades to a one-section
//!   error plan instead of failing the request;
//! * [`repair_plan`] then unconditionally appends any image the model
//!   omitted, because the invariant "every extracted image appears in the
//!   plan" is enforced locally, not by prompting.
//!
//! Plan generation is the one remote call whose failure is fatal: with no
//! plan there is nothing to assemble.

use crate::error::FormatError;
use crate::pipeline::extract::{ExtractionResult, ImageSet};
use crate::pipeline::json::parse_model_json;
use crate::pipeline::retry::{with_backoff, RetryPolicy};
use crate::prompts::build_plan_prompt;
use crate::provider::TextModel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Section heading under which repaired (model-omitted) images land.
const ADDITIONAL_CONTENT_HEADING: &str = "Additional Content";

/// Caption used when a repaired image has no suggested caption.
const DEFAULT_IMAGE_CAPTION: &str = "Document image";

// ── Plan data model ──────────────────────────────────────────────────────

/// The model-produced formatting plan, after tolerant parsing and repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingPlan {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One renderable element within a section.
///
/// Field names match the JSON schema the plan prompt dictates
/// (`sizePreference`, `tableIndex`). Missing optional fields default
/// rather than fail; a missing image `id` defaults to an empty string,
/// which simply never resolves at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text {
        #[serde(default)]
        content: String,
        #[serde(default)]
        style: TextStyle,
    },
    Image {
        #[serde(default)]
        id: String,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        alignment: Alignment,
        #[serde(rename = "sizePreference", default)]
        size_preference: SizePreference,
    },
    List {
        #[serde(default)]
        items: Vec<String>,
    },
    Table {
        #[serde(rename = "tableIndex", default)]
        table_index: usize,
        #[serde(default)]
        title: Option<String>,
    },
}

/// Text styling tag; anything the model invents falls back to a body
/// paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TextStyle {
    Heading,
    Subheading,
    Bold,
    #[default]
    Paragraph,
}

impl From<String> for TextStyle {
    fn from(s: String) -> Self {
        match s.as_str() {
            "heading" => TextStyle::Heading,
            "subheading" => TextStyle::Subheading,
            "bold" => TextStyle::Bold,
            _ => TextStyle::Paragraph,
        }
    }
}

/// Horizontal alignment; unknown values centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Alignment {
    Left,
    Right,
    #[default]
    Center,
}

impl From<String> for Alignment {
    fn from(s: String) -> Self {
        match s.as_str() {
            "left" => Alignment::Left,
            "right" => Alignment::Right,
            _ => Alignment::Center,
        }
    }
}

/// Image sizing preference; unknown values keep the aspect-preserving
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum SizePreference {
    #[default]
    MaintainAspect,
    FitWidth,
}

impl From<String> for SizePreference {
    fn from(s: String) -> Self {
        match s.as_str() {
            "fit-width" => SizePreference::FitWidth,
            _ => SizePreference::MaintainAspect,
        }
    }
}

impl FormattingPlan {
    /// Degraded one-section plan used when the model response is not
    /// parseable JSON.
    pub fn degraded() -> Self {
        FormattingPlan {
            title: Some("Formatting Error".to_string()),
            sections: vec![Section {
                heading: Some("Error".to_string()),
                elements: vec![Element::Text {
                    content: "Failed to parse AI response".to_string(),
                    style: TextStyle::Paragraph,
                }],
            }],
        }
    }

    /// All image ids referenced by `Image` elements across all sections.
    pub fn referenced_image_ids(&self) -> HashSet<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.elements.iter())
            .filter_map(|e| match e {
                Element::Image { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ── Synthesis ────────────────────────────────────────────────────────────

/// Generate and parse a formatting plan for `extracted`.
///
/// The remote call goes through the retry wrapper; retry exhaustion or a
/// non-retryable failure is fatal. An unparseable response is not — it
/// degrades to [`FormattingPlan::degraded`]. The returned plan has not yet
/// been through [`repair_plan`]; the orchestrator applies that next so it
/// can account for what repair added.
pub async fn synthesize_plan(
    extracted: &ExtractionResult,
    model: &dyn TextModel,
    retry: RetryPolicy,
) -> Result<FormattingPlan, FormatError> {
    let prompt = build_plan_prompt(extracted);
    info!("generating formatting plan ({} prompt chars)", prompt.len());

    let response = with_backoff(retry, || model.generate(&prompt))
        .await
        .map_err(|e| FormatError::PlanGeneration {
            detail: e.to_string(),
        })?;

    match parse_model_json::<FormattingPlan>(&response) {
        Ok(plan) => Ok(plan),
        Err(e) => {
            warn!("plan response was not valid JSON: {e}");
            Ok(FormattingPlan::degraded())
        }
    }
}

/// Append an `Image` element for every extracted image the plan omitted.
///
/// Pure function: consumes the parsed plan and returns the completed one.
/// Appended images land in an "Additional Content" section (created if
/// absent) with centre alignment, aspect-preserving sizing, and the
/// record's suggested caption. Ids already present are left untouched, so
/// repair never introduces duplicates.
pub fn repair_plan(mut plan: FormattingPlan, images: &ImageSet) -> FormattingPlan {
    let missing: Vec<(String, String)> = {
        let referenced = plan.referenced_image_ids();
        images
            .iter()
            .filter(|r| !referenced.contains(r.id.as_str()))
            .map(|r| {
                let caption = if r.analysis.suggested_caption.is_empty() {
                    DEFAULT_IMAGE_CAPTION.to_string()
                } else {
                    r.analysis.suggested_caption.clone()
                };
                (r.id.clone(), caption)
            })
            .collect()
    };

    if missing.is_empty() {
        return plan;
    }
    warn!("plan omitted {} images, appending them", missing.len());

    let section_idx = plan
        .sections
        .iter()
        .position(|s| s.heading.as_deref() == Some(ADDITIONAL_CONTENT_HEADING))
        .unwrap_or_else(|| {
            plan.sections.push(Section {
                heading: Some(ADDITIONAL_CONTENT_HEADING.to_string()),
                elements: Vec::new(),
            });
            plan.sections.len() - 1
        });

    for (id, caption) in missing {
        plan.sections[section_idx].elements.push(Element::Image {
            id,
            caption: Some(caption),
            alignment: Alignment::Center,
            size_preference: SizePreference::MaintainAspect,
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dimensions::MimeClass;
    use crate::pipeline::extract::ImageRecord;
    use crate::pipeline::vision::ImageAnalysis;

    fn image_set(ids: &[&str]) -> ImageSet {
        let mut set = ImageSet::default();
        for id in ids {
            set.push(ImageRecord {
                id: id.to_string(),
                bytes: vec![1],
                mime: MimeClass::Png,
                width: 100,
                height: 100,
                analysis: ImageAnalysis {
                    suggested_caption: format!("Caption for {id}"),
                    ..ImageAnalysis::fallback()
                },
            });
        }
        set
    }

    fn plan_with_images(ids: &[&str]) -> FormattingPlan {
        FormattingPlan {
            title: Some("Doc".into()),
            sections: vec![Section {
                heading: Some("Body".into()),
                elements: ids
                    .iter()
                    .map(|id| Element::Image {
                        id: id.to_string(),
                        caption: None,
                        alignment: Alignment::Center,
                        size_preference: SizePreference::MaintainAspect,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn plan_json_round_trip_with_schema_names() {
        let raw = r#"{
            "title": "Report",
            "sections": [{
                "heading": "Intro",
                "elements": [
                    {"type": "text", "content": "hi", "style": "heading"},
                    {"type": "image", "id": "{{IMAGE_0}}", "caption": "c",
                     "alignment": "left", "sizePreference": "fit-width"},
                    {"type": "list", "items": ["a", "b"]},
                    {"type": "table", "tableIndex": 1, "title": "T"}
                ]
            }]
        }"#;
        let plan: FormattingPlan = parse_model_json(raw).unwrap();
        assert_eq!(plan.sections[0].elements.len(), 4);
        match &plan.sections[0].elements[1] {
            Element::Image {
                alignment,
                size_preference,
                ..
            } => {
                assert_eq!(*alignment, Alignment::Left);
                assert_eq!(*size_preference, SizePreference::FitWidth);
            }
            other => panic!("expected image, got {other:?}"),
        }
        match &plan.sections[0].elements[3] {
            Element::Table { table_index, .. } => assert_eq!(*table_index, 1),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn unknown_style_and_alignment_degrade_to_defaults() {
        let raw = r#"{"sections":[{"elements":[
            {"type": "text", "content": "x", "style": "fancy-banner"},
            {"type": "image", "id": "{{IMAGE_0}}", "alignment": "justified",
             "sizePreference": "huge"}
        ]}]}"#;
        let plan: FormattingPlan = parse_model_json(raw).unwrap();
        match &plan.sections[0].elements[0] {
            Element::Text { style, .. } => assert_eq!(*style, TextStyle::Paragraph),
            _ => unreachable!(),
        }
        match &plan.sections[0].elements[1] {
            Element::Image {
                alignment,
                size_preference,
                ..
            } => {
                assert_eq!(*alignment, Alignment::Center);
                assert_eq!(*size_preference, SizePreference::MaintainAspect);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn repair_appends_every_missing_image() {
        let images = image_set(&["{{IMAGE_0}}", "{{IMAGE_1}}", "{{IMAGE_2}}"]);
        let plan = repair_plan(plan_with_images(&["{{IMAGE_1}}"]), &images);

        let referenced = plan.referenced_image_ids();
        for id in images.ids() {
            assert!(referenced.contains(id), "missing {id} after repair");
        }
        // Appended under "Additional Content", in extraction order
        let extra = plan.sections.last().unwrap();
        assert_eq!(extra.heading.as_deref(), Some("Additional Content"));
        assert_eq!(extra.elements.len(), 2);
    }

    #[test]
    fn repair_introduces_no_duplicates() {
        let images = image_set(&["{{IMAGE_0}}", "{{IMAGE_1}}"]);
        let plan = repair_plan(plan_with_images(&["{{IMAGE_0}}", "{{IMAGE_1}}"]), &images);
        assert_eq!(plan.sections.len(), 1, "no repair section should appear");
        let total_images: usize = plan
            .sections
            .iter()
            .flat_map(|s| s.elements.iter())
            .filter(|e| matches!(e, Element::Image { .. }))
            .count();
        assert_eq!(total_images, 2);
    }

    #[test]
    fn repair_reuses_existing_additional_content_section() {
        let images = image_set(&["{{IMAGE_0}}"]);
        let mut plan = plan_with_images(&[]);
        plan.sections.push(Section {
            heading: Some("Additional Content".into()),
            elements: Vec::new(),
        });
        let repaired = repair_plan(plan, &images);
        assert_eq!(repaired.sections.len(), 2);
        assert_eq!(repaired.sections[1].elements.len(), 1);
    }

    #[test]
    fn repaired_images_use_suggested_caption() {
        let images = image_set(&["{{IMAGE_0}}"]);
        let plan = repair_plan(plan_with_images(&[]), &images);
        match &plan.sections.last().unwrap().elements[0] {
            Element::Image {
                caption,
                alignment,
                size_preference,
                ..
            } => {
                assert_eq!(caption.as_deref(), Some("Caption for {{IMAGE_0}}"));
                assert_eq!(*alignment, Alignment::Center);
                assert_eq!(*size_preference, SizePreference::MaintainAspect);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn repair_default_caption_when_analysis_has_none() {
        let mut set = ImageSet::default();
        set.push(ImageRecord {
            id: "{{IMAGE_0}}".into(),
            bytes: vec![1],
            mime: MimeClass::Png,
            width: 1,
            height: 1,
            analysis: ImageAnalysis {
                suggested_caption: String::new(),
                ..ImageAnalysis::fallback()
            },
        });
        let plan = repair_plan(plan_with_images(&[]), &set);
        match &plan.sections.last().unwrap().elements[0] {
            Element::Image { caption, .. } => {
                assert_eq!(caption.as_deref(), Some("Document image"))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn degraded_plan_shape() {
        let plan = FormattingPlan::degraded();
        assert_eq!(plan.title.as_deref(), Some("Formatting Error"));
        assert_eq!(plan.sections.len(), 1);
        assert_eq!(plan.sections[0].heading.as_deref(), Some("Error"));
    }
}
