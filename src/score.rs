use lazy_static::lazy_static;
use regex::Regex;

use crate::entities::LineRecord;

/// Share of the body size rewarded to bold lines.
const BOLD_WEIGHT: f64 = 0.5;

/// Share of the body size rewarded to lines starting with a section number
/// ("2.3.4 ", "A) ", "b. ").
const NUMBERING_WEIGHT: f64 = 0.7;

/// Lines shorter than this many characters get a flat bonus of one point,
/// keeping paragraph lines away from the heading candidates.
const SHORT_LINE_MAX_CHARS: usize = 100;
const SHORT_LINE_BONUS: f64 = 1.0;

lazy_static! {
    static ref NUMBERING_RE: Regex =
        Regex::new(r"^\s*(\d+(\.\d+)*|[A-Za-z][\.\)])\s+").expect("valid numbering regex");
}

pub fn has_numbering_prefix(text: &str) -> bool {
    NUMBERING_RE.is_match(text)
}

/// How much a line looks like a heading. Pure function of the line and the
/// document body size; never negative.
pub fn heading_score(line: &LineRecord, body_size: i32) -> f64 {
    let body = body_size as f64;
    let mut score = 0f64;

    if line.font_size > body_size {
        score += (line.font_size - body_size) as f64;
    }
    if line.is_bold {
        score += body * BOLD_WEIGHT;
    }
    if has_numbering_prefix(&line.text) {
        score += body * NUMBERING_WEIGHT;
    }
    if line.text.chars().count() < SHORT_LINE_MAX_CHARS {
        score += SHORT_LINE_BONUS;
    }
    score
}

pub fn score_lines(lines: &mut [LineRecord], body_size: i32) {
    for line in lines.iter_mut() {
        line.score = heading_score(line, body_size);
    }
}
