use std::collections::HashMap;

use itertools::Itertools;

use crate::entities::{HeadingLevel, LineRecord, OutlineEntry};

/// Lines must score strictly above this quantile of the document scores to
/// become heading candidates.
pub const HEADING_SCORE_QUANTILE: f64 = 0.9;

pub const UNTITLED_DOCUMENT: &str = "Untitled Document";
pub const NO_HEADINGS_FOUND: &str = "Untitled Document (No Headings Found)";

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1f64 - t)
    } else {
        a + diff * t
    }
}

/// Quantile `q` of `values` with linear interpolation between the two
/// closest ranks. `None` on empty input.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = values
        .iter()
        .copied()
        .sorted_by(f64::total_cmp)
        .collect::<Vec<_>>();

    let position = q.clamp(0f64, 1f64) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    Some(lerp(
        sorted[lower],
        sorted[upper],
        position - lower as f64,
    ))
}

/// Maps the (at most three) largest distinct font sizes to heading levels,
/// largest first.
pub fn levels_for_sizes(sizes: impl IntoIterator<Item = i32>) -> HashMap<i32, HeadingLevel> {
    sizes
        .into_iter()
        .unique()
        .sorted_by(|a, b| b.cmp(a))
        .zip(HeadingLevel::ALL)
        .collect()
}

fn reading_order(a: &LineRecord, b: &LineRecord) -> std::cmp::Ordering {
    a.page.cmp(&b.page).then(a.top_y.total_cmp(&b.top_y))
}

/// Selects the document title and the leveled heading entries from scored
/// lines.
///
/// Candidates are lines scoring above the 90th percentile. The first one in
/// reading order is the title, the others are leveled by font size. Sizes
/// below the third largest distinct size are dropped.
pub fn build_hierarchy(lines: &[LineRecord]) -> (String, Vec<OutlineEntry>) {
    let scores = lines.iter().map(|l| l.score).collect::<Vec<_>>();
    let Some(threshold) = percentile(&scores, HEADING_SCORE_QUANTILE) else {
        return (UNTITLED_DOCUMENT.to_owned(), vec![]);
    };

    let mut candidates = lines
        .iter()
        .filter(|l| l.score > threshold)
        .sorted_by(|a, b| reading_order(a, b))
        .collect::<Vec<_>>()
        .into_iter();

    let Some(title) = candidates.next() else {
        return (NO_HEADINGS_FOUND.to_owned(), vec![]);
    };
    let headings = candidates.collect::<Vec<_>>();
    tracing::debug!(
        threshold,
        candidates = headings.len() + 1,
        "selected heading candidates"
    );

    let levels = levels_for_sizes(headings.iter().map(|h| h.font_size));
    let entries = headings
        .into_iter()
        .filter_map(|h| {
            levels.get(&h.font_size).map(|level| OutlineEntry {
                level: *level,
                text: h.text.clone(),
                page: h.page,
            })
        })
        .collect();

    (title.text.clone(), entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BBox;

    fn scored(text: &str, page: usize, top_y: f32, font_size: i32, score: f64) -> LineRecord {
        LineRecord {
            text: text.to_owned(),
            font_size,
            is_bold: false,
            bbox: BBox {
                x0: 0.0,
                y0: top_y,
                x1: 100.0,
                y1: top_y + font_size as f32,
            },
            page,
            score,
            top_y,
        }
    }

    fn body_lines(count: usize, page: usize) -> Vec<LineRecord> {
        (0..count)
            .map(|i| scored("body", page, 100.0 + 12.0 * i as f32, 10, 1.0))
            .collect()
    }

    #[test]
    fn test_percentile_linear() {
        assert_eq!(percentile(&[], 0.9), None);
        assert_eq!(percentile(&[5.0], 0.9), Some(5.0));
        let p = percentile(&[4.0, 1.0, 3.0, 2.0], 0.9).unwrap();
        assert!((p - 3.7).abs() < 1e-12);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.5), Some(2.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 1.0), Some(3.0));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(build_hierarchy(&[]), (UNTITLED_DOCUMENT.to_owned(), vec![]));
    }

    #[test]
    fn test_equal_scores_yield_no_headings() {
        let lines = body_lines(20, 1);
        assert_eq!(
            build_hierarchy(&lines),
            (NO_HEADINGS_FOUND.to_owned(), vec![])
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut lines = body_lines(9, 1);
        lines.push(scored("barely above", 2, 0.0, 10, 1.0 + 1e-9));
        let (title, entries) = build_hierarchy(&lines);
        assert_eq!(title, "barely above");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_title_is_first_in_reading_order() {
        let mut lines = body_lines(40, 1);
        lines.push(scored("Later big heading", 2, 50.0, 30, 40.0));
        lines.push(scored("Second", 1, 80.0, 14, 12.0));
        lines.push(scored("Top of page one", 1, 20.0, 18, 20.0));
        let (title, entries) = build_hierarchy(&lines);
        assert_eq!(title, "Top of page one");
        assert_eq!(
            entries,
            vec![
                OutlineEntry {
                    level: HeadingLevel::H2,
                    text: "Second".to_owned(),
                    page: 1
                },
                OutlineEntry {
                    level: HeadingLevel::H1,
                    text: "Later big heading".to_owned(),
                    page: 2
                },
            ]
        );
    }

    #[test]
    fn test_fourth_size_is_dropped() {
        let mut lines = body_lines(100, 1);
        lines.push(scored("Title", 1, 10.0, 24, 20.0));
        for (page, size) in [(2, 20), (2, 18), (3, 16), (3, 14), (4, 20), (4, 14)] {
            lines.push(scored(&format!("size {size}"), page, size as f32, size, size as f64));
        }
        let (title, entries) = build_hierarchy(&lines);
        assert_eq!(title, "Title");

        let levels = entries
            .iter()
            .map(|e| (e.text.as_str(), e.level))
            .collect::<Vec<_>>();
        assert_eq!(
            levels,
            vec![
                ("size 18", HeadingLevel::H2),
                ("size 20", HeadingLevel::H1),
                ("size 16", HeadingLevel::H3),
                ("size 20", HeadingLevel::H1),
            ]
        );
    }

    #[test]
    fn test_single_size_only_h1_and_repeats_kept() {
        let mut lines = body_lines(40, 1);
        lines.push(scored("Title", 1, 0.0, 16, 9.0));
        lines.push(scored("Chapter", 2, 0.0, 16, 7.0));
        lines.push(scored("Chapter", 3, 0.0, 16, 8.0));
        let (_, entries) = build_hierarchy(&lines);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.level == HeadingLevel::H1));
        assert_eq!(entries[0].page, 2);
        assert_eq!(entries[1].page, 3);
    }

    #[test]
    fn test_levels_for_sizes() {
        let levels = levels_for_sizes([12, 18, 12, 14, 11, 18]);
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[&18], HeadingLevel::H1);
        assert_eq!(levels[&14], HeadingLevel::H2);
        assert_eq!(levels[&12], HeadingLevel::H3);
        assert!(!levels.contains_key(&11));
    }
}
