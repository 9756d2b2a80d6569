//! Rule-based message segmentation
//!
//! Long replies are cut into chunks of at most `max_length` characters at the
//! most natural boundary available in each window. Boundary classes are tried
//! in priority order (sentence terminators, commas, semicolons, whitespace)
//! and the right-most match of the first class present wins. The separator
//! stays with the left-hand chunk.

use once_cell::sync::Lazy;
use regex::Regex;

static SPLIT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"[。！？.!?]+", r"[,，、]", r"[;；]", r"\s+"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// Splits reply text into sendable chunks.
pub trait Segmenter: Send + Sync {
    /// Segment `text` into trimmed, non-empty chunks
    fn segment(&self, text: &str, max_length: usize) -> Vec<String>;

    /// Get the segmenter name
    fn name(&self) -> &'static str;
}

/// Punctuation and length heuristics
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSegmenter;

impl Segmenter for RuleBasedSegmenter {
    fn segment(&self, text: &str, max_length: usize) -> Vec<String> {
        let max_length = max_length.max(1);
        let total = text.chars().count();
        if total <= max_length {
            return trimmed(text).into_iter().collect();
        }

        // Byte offset of every char, plus the end of the string.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let mut segments = Vec::new();
        let mut pos = 0;
        while pos < total {
            let end = (pos + max_length).min(total);
            let window = &text[bounds[pos]..bounds[end]];

            if end == total {
                segments.extend(trimmed(window));
                break;
            }

            match best_split(window) {
                Some(split) => {
                    segments.extend(trimmed(&text[bounds[pos]..bounds[pos + split]]));
                    pos += split;
                }
                None => {
                    segments.extend(trimmed(window));
                    pos = end;
                }
            }
        }
        segments
    }

    fn name(&self) -> &'static str {
        "rule_based"
    }
}

/// Segment with the rule-based segmenter.
pub fn segment(text: &str, max_length: usize) -> Vec<String> {
    RuleBasedSegmenter.segment(text, max_length)
}

/// Char offset just past the best separator in `window`, if any.
fn best_split(window: &str) -> Option<usize> {
    SPLIT_PATTERNS.iter().find_map(|pattern| {
        pattern
            .find_iter(window)
            .last()
            .map(|m| window[..m.end()].chars().count())
            .filter(|split| *split > 0)
    })
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
