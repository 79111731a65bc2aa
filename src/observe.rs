use std::collections::HashMap;

use itertools::Itertools;

use crate::entities::{LineRecord, RawPage, RawSpan, SPAN_FLAG_BOLD};

#[derive(Debug)]
pub struct ObservedLines {
    pub lines: Vec<LineRecord>,
    pub body_size: i32,
}

/// Sizes are compared in whole points, halves go to the even neighbour.
#[inline]
pub(crate) fn rounded_size(size: f32) -> i32 {
    size.round_ties_even() as i32
}

/// Most frequent rounded span size across the document. Equally frequent
/// sizes resolve to the one encountered first.
pub fn body_font_size(pages: &[RawPage]) -> Option<i32> {
    let mut tally: HashMap<i32, (usize, usize)> = HashMap::new();
    let sizes = pages
        .iter()
        .flat_map(|p| p.text_lines())
        .flat_map(|l| l.spans.iter())
        .map(|s| rounded_size(s.font_size));

    for (seen_at, size) in sizes.enumerate() {
        tally.entry(size).or_insert((0, seen_at)).0 += 1;
    }

    tally
        .into_iter()
        .sorted_by(|(_, (c1, s1)), (_, (c2, s2))| c2.cmp(c1).then(s1.cmp(s2)))
        .map(|(size, _)| size)
        .next()
}

fn is_bold(span: &RawSpan) -> bool {
    span.font_name.to_lowercase().contains("bold") || span.flags & SPAN_FLAG_BOLD != 0
}

/// Flattens the pages into line records in traversal order. Returns `None`
/// when the document holds no span at all.
pub fn observe_lines(pages: &[RawPage]) -> Option<ObservedLines> {
    let body_size = body_font_size(pages)?;
    let mut lines = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        let mut prev_line_bottom = 0f32;
        for line in page.text_lines() {
            let Some(first_span) = line.spans.first() else {
                continue;
            };
            let text = line.spans.iter().map(|s| s.text.as_str()).join(" ");
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let space_above = line.bbox.y0 - prev_line_bottom;
            tracing::trace!(page = page_idx + 1, space_above, "observed line {text:?}");

            lines.push(LineRecord {
                text: text.to_owned(),
                font_size: rounded_size(first_span.font_size),
                is_bold: is_bold(first_span),
                bbox: line.bbox.clone(),
                page: page_idx + 1,
                score: 0f64,
                top_y: line.bbox.y0,
            });
            prev_line_bottom = line.bbox.y1;
        }
    }

    Some(ObservedLines { lines, body_size })
}
