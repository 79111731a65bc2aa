use serde::{Deserialize, Serialize};

use pdfium_render::prelude::PdfRect;

/// Span flag bit set when the glyph run is rendered in a bold face.
pub const SPAN_FLAG_BOLD: u32 = 1 << 4;

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Pdfium rects have their origin at the bottom-left corner, flip them
    /// so that `y0` is the top of the box.
    pub(crate) fn from_pdfrect(
        PdfRect {
            bottom,
            left,
            top,
            right,
        }: PdfRect,
        page_height: f32,
    ) -> Self {
        Self {
            x0: left.value,
            y0: page_height - top.value,
            x1: right.value,
            y1: page_height - bottom.value,
        }
    }

    #[inline(always)]
    pub(crate) fn merge(&mut self, other: &Self) {
        self.x0 = self.x0.min(other.x0);
        self.y0 = self.y0.min(other.y0);
        self.x1 = self.x1.max(other.x1);
        self.y1 = self.y1.max(other.y1);
    }
}

/// A run of text sharing one font, size and style inside a line.
#[derive(Debug, Clone)]
pub struct RawSpan {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub flags: u32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Default)]
pub struct RawLine {
    pub bbox: BBox,
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone)]
pub enum RawBlock {
    Text { lines: Vec<RawLine> },
    Image,
}

#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub blocks: Vec<RawBlock>,
}

impl RawPage {
    pub fn text_lines(&self) -> impl Iterator<Item = &RawLine> {
        self.blocks.iter().flat_map(|block| -> &[RawLine] {
            match block {
                RawBlock::Text { lines } => lines,
                RawBlock::Image => &[],
            }
        })
    }
}

/// One observed physical line of text, with the features the scorer
/// consumes.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub text: String,
    pub font_size: i32,
    pub is_bold: bool,
    pub bbox: BBox,
    /// 1-based page number
    pub page: usize,
    pub score: f64,
    pub top_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub const ALL: [HeadingLevel; 3] = [HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3];
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutlineEntry {
    pub level: HeadingLevel,
    pub text: String,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentOutline {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
}

impl DocumentOutline {
    pub fn untitled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            outline: vec![],
        }
    }
}
