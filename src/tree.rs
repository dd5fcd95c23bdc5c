//! Abstract output document tree.
//!
//! The assembler builds this tree; the external
//! [`DocumentRenderer`](crate::provider::DocumentRenderer) serialises it
//! into the binary container format. The vocabulary is deliberately small —
//! paragraphs of styled runs and images, plus bordered tables — because it
//! only needs to express what the formatting plan can ask for, not a whole
//! word-processing spec.
//!
//! Spacing and indent values are in twentieths of a point, the unit the
//! target container uses natively, so the renderer can pass them through
//! unchanged.

use crate::pipeline::dimensions::MimeClass;
use crate::pipeline::plan::Alignment;

/// Heading level of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    Title,
    H1,
    H2,
    H3,
}

/// A styled run of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italics: bool,
    /// Font size in half-points, when overriding the style default.
    pub size: Option<u32>,
    /// RRGGBB hex, when overriding the style default.
    pub color: Option<String>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Run {
            text: text.into(),
            ..Run::default()
        }
    }
}

/// An image placed inline in a paragraph, already scaled to its target
/// render size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    pub data: Vec<u8>,
    pub format: MimeClass,
    pub width: u32,
    pub height: u32,
}

/// Paragraph content: styled text or an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Run(Run),
    Image(ImageNode),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub children: Vec<Inline>,
    pub heading: Option<HeadingLevel>,
    pub alignment: Option<Alignment>,
    /// Left indent in twentieths of a point.
    pub indent_left: Option<u32>,
    pub spacing_before: Option<u32>,
    pub spacing_after: Option<u32>,
}

impl Paragraph {
    /// Body paragraph holding a single plain run.
    pub fn text(text: impl Into<String>) -> Self {
        Paragraph {
            children: vec![Inline::Run(Run::plain(text))],
            ..Paragraph::default()
        }
    }

    /// Heading paragraph at the given level.
    pub fn heading(text: impl Into<String>, level: HeadingLevel) -> Self {
        Paragraph {
            heading: Some(level),
            ..Paragraph::text(text)
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_spacing(mut self, before: Option<u32>, after: Option<u32>) -> Self {
        self.spacing_before = before;
        self.spacing_after = after;
        self
    }

    /// Concatenated text of all runs, ignoring images. Test convenience.
    pub fn plain_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Inline::Run(r) => Some(r.text.as_str()),
                Inline::Image(_) => None,
            })
            .collect()
    }
}

/// Uniform single border applied to a table and each of its cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorderSpec {
    /// Border width in eighths of a point.
    pub size: u32,
    /// RRGGBB hex.
    pub color: String,
}

impl Default for BorderSpec {
    fn default() -> Self {
        BorderSpec {
            size: 1,
            color: "999999".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellNode {
    pub paragraph: Paragraph,
    /// RRGGBB shading fill, set on header cells.
    pub shading: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowNode {
    pub cells: Vec<CellNode>,
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNode {
    pub rows: Vec<RowNode>,
    pub border: BorderSpec,
}

/// Top-level block content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(TableNode),
}

/// The assembled output document, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    pub blocks: Vec<Block>,
}

impl DocumentTree {
    pub fn push_paragraph(&mut self, p: Paragraph) {
        self.blocks.push(Block::Paragraph(p));
    }

    pub fn push_table(&mut self, t: TableNode) {
        self.blocks.push(Block::Table(t));
    }

    /// All paragraphs, in order, flattened out of blocks. Test convenience.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableNode> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        })
    }
}
