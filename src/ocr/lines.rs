//! Rebuild reading-order text from unordered detections.
//!
//! Engines hand back fragments in no particular order, each with its own
//! bounding quad. We sort them top-to-bottom, chain fragments whose vertical
//! anchors are close into lines, and then read each line left-to-right.
//!
//! The grouping compares each fragment with the *last* fragment added to the
//! current line, not with the line's average position. A slightly tilted
//! line can therefore drift further than the threshold from end to end and
//! still stay in one piece.

use clap::Args;

use super::detection::Detection;
use crate::prelude::*;

/// Default multiplier applied to the typical glyph height.
pub const DEFAULT_LINE_SPACING_FACTOR: f64 = 0.6;

/// Default lower bound for the line-spacing threshold, in pixels.
pub const DEFAULT_MIN_LINE_SPACING: f64 = 8.0;

/// Tuning for how close two fragments must be vertically to share a line.
#[derive(Args, Clone, Copy, Debug, PartialEq)]
pub struct LineSpacing {
    /// Fraction of the median fragment height within which two fragments
    /// count as being on the same line.
    #[clap(long = "line-spacing-factor", default_value_t = DEFAULT_LINE_SPACING_FACTOR)]
    pub factor: f64,

    /// Minimum line-spacing threshold, in pixels.
    #[clap(long = "min-line-spacing", default_value_t = DEFAULT_MIN_LINE_SPACING)]
    pub floor: f64,
}

impl Default for LineSpacing {
    fn default() -> Self {
        Self {
            factor: DEFAULT_LINE_SPACING_FACTOR,
            floor: DEFAULT_MIN_LINE_SPACING,
        }
    }
}

impl LineSpacing {
    /// The threshold to use for a page whose fragments have this median height.
    pub fn threshold(&self, typical_height: f64) -> f64 {
        (typical_height * self.factor).max(self.floor)
    }
}

/// A detection reduced to what the layout pass needs.
struct Anchored<'a> {
    y: f64,
    x: f64,
    text: &'a str,
}

/// Turn the detections for one page into text, one line per visual line.
///
/// Returns an empty string if nothing usable was detected.
pub fn reconstruct_page_text(detections: &[Detection], spacing: &LineSpacing) -> String {
    let usable = detections
        .iter()
        .filter(|d| !d.text.trim().is_empty())
        .collect::<Vec<_>>();
    let Some(typical_height) = median(usable.iter().map(|d| d.region.height())) else {
        return String::new();
    };
    let threshold = spacing.threshold(typical_height);
    trace!(typical_height, threshold, count = usable.len(), "Grouping detections");

    let mut anchored = usable
        .iter()
        .map(|d| Anchored {
            y: d.region.vertical_anchor(),
            x: d.region.horizontal_anchor(),
            text: d.text.trim(),
        })
        .collect::<Vec<_>>();
    anchored.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    group_lines(anchored, threshold)
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            line.iter().map(|a| a.text).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Chain sorted fragments into lines.
fn group_lines(sorted: Vec<Anchored<'_>>, threshold: f64) -> Vec<Vec<Anchored<'_>>> {
    let mut lines: Vec<Vec<Anchored<'_>>> = vec![];
    for item in sorted {
        if let Some(line) = lines.last_mut()
            && line
                .last()
                .is_some_and(|prev| (item.y - prev.y).abs() <= threshold)
        {
            line.push(item);
            continue;
        }
        lines.push(vec![item]);
    }
    lines
}

/// Median of a sequence of values, averaging the middle pair for even counts.
fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values = values.collect::<Vec<_>>();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
