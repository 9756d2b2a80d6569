//! Same-pronunciation typo injection
//!
//! A segment is corrupted in at most one contiguous span. The injector first
//! tries to swap a whole word for a homophone that is common in the corpus
//! and plausible next to its neighbours; failing that, and behind a separate
//! gate, it swaps a single character (a homophone ideograph, a commonly
//! confused particle, or an adjacent key for Latin letters).
//!
//! Typos never land in the first third of a segment. All scores are clamped
//! to [0, 1] before they are compared against the acceptance thresholds.

use jieba_rs::Jieba;
use once_cell::sync::Lazy;
use rand::Rng;

use crate::model::{TypoKind, TypoOutcome};
use crate::pronunciation::{PronunciationIndex, contains_ideograph, is_ideograph};

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

const WORD_CANDIDATE_LIMIT: usize = 30;
const WORD_CANDIDATES_SCORED: usize = 12;
const CHAR_CANDIDATE_LIMIT: usize = 10;
const KEYBOARD_SCORE: f64 = 0.75;
const PARTICLE_BONUS: f64 = 0.35;

/// Particles that may end a sentence; only replaceable through the
/// confusion table when they are the final character.
const END_PARTICLES: &str = "啊吧呢呀啦哦哎嘛呗哈诶";

/// Characters never given a plain homophone substitution.
const STRICT_WHITELIST: &str = "啊呀吧呢啦哦哎嘛的在再那哪叭吖";

/// Acceptance thresholds for the two injection paths.
///
/// The defaults were tuned by hand; treat them as starting points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypoThresholds {
    /// Minimum score for a word-level swap
    pub word_accept: f64,
    /// Minimum score for a character-level swap
    pub char_accept: f64,
    /// Probability of attempting the character-level path at all
    pub char_gate: f64,
}

impl Default for TypoThresholds {
    fn default() -> Self {
        Self {
            word_accept: 0.35,
            char_accept: 0.55,
            char_gate: 0.25,
        }
    }
}

fn particle_confusions(ch: char) -> Option<&'static [char]> {
    let alternates: &'static [char] = match ch {
        '啊' => &['阿'],
        '呀' => &['吖', '丫'],
        '吧' => &['八', '巴', '叭', '罢'],
        '呢' => &['那', '哪', '讷', '呐'],
        '啦' => &['拉'],
        '哦' => &['噢', '欧'],
        '哎' => &['唉', '诶'],
        '嘛' => &['吗'],
        '的' => &['地', '得'],
        '在' => &['再'],
        '再' => &['在'],
        '那' => &['哪'],
        '哪' => &['那'],
        _ => return None,
    };
    Some(alternates)
}

/// QWERTY neighbours of a lower-case letter.
fn keyboard_neighbors(ch: char) -> &'static [char] {
    match ch {
        'q' => &['w', 'a'],
        'w' => &['q', 'e', 's'],
        'e' => &['w', 'r', 'd'],
        'r' => &['e', 't', 'f'],
        't' => &['r', 'y', 'g'],
        'y' => &['t', 'u', 'h'],
        'u' => &['y', 'i', 'j'],
        'i' => &['u', 'o', 'k'],
        'o' => &['i', 'p', 'l'],
        'p' => &['o', 'l'],
        'a' => &['q', 's', 'z'],
        's' => &['a', 'w', 'd', 'x'],
        'd' => &['s', 'e', 'f', 'c'],
        'f' => &['d', 'r', 'g', 'v'],
        'g' => &['f', 't', 'h', 'b'],
        'h' => &['g', 'y', 'j', 'n'],
        'j' => &['h', 'u', 'k', 'm'],
        'k' => &['j', 'i', 'l'],
        'l' => &['k', 'o', 'p'],
        'z' => &['a', 'x'],
        'x' => &['z', 's', 'c'],
        'c' => &['x', 'd', 'v'],
        'v' => &['c', 'f', 'b'],
        'b' => &['v', 'g', 'n'],
        'n' => &['b', 'h', 'm'],
        'm' => &['n', 'j'],
        _ => &[],
    }
}

/// Roll whether an injected typo is recalled and retyped.
pub fn should_recall<R: Rng>(rate: f64, rng: &mut R) -> bool {
    rng.random::<f64>() < rate
}

/// A scored single-span replacement, in char offsets.
#[derive(Debug, Clone)]
struct Candidate {
    score: f64,
    start: usize,
    end: usize,
    replacement: String,
}

impl Candidate {
    /// Keep the first of equally scored candidates.
    fn best(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
        candidates.into_iter().fold(None, |best, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
    }

    fn apply(&self, chars: &[char]) -> (String, String) {
        let corrupted = chars[..self.start]
            .iter()
            .copied()
            .chain(self.replacement.chars())
            .chain(chars[self.end..].iter().copied())
            .collect();
        let original = chars[self.start..self.end].iter().collect();
        (corrupted, original)
    }
}

/// Injects homophone typos scored against a pronunciation index.
#[derive(Debug, Clone, Copy)]
pub struct TypoInjector<'a> {
    index: &'a PronunciationIndex,
    thresholds: TypoThresholds,
}

impl<'a> TypoInjector<'a> {
    pub fn new(index: &'a PronunciationIndex) -> Self {
        Self {
            index,
            thresholds: TypoThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: TypoThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Try to corrupt `text` with probability `rate`.
    ///
    /// Empty text or an empty index never produce a typo; a `rate` of 0
    /// never does either.
    pub fn inject_typo<R: Rng>(&self, text: &str, rate: f64, rng: &mut R) -> TypoOutcome {
        if text.is_empty() || self.index.is_empty() {
            return TypoOutcome::none();
        }
        if rng.random::<f64>() >= rate.clamp(0.0, 1.0) {
            return TypoOutcome::none();
        }

        let chars: Vec<char> = text.chars().collect();
        let (best, kind) = match self.word_typo(text, &chars) {
            Some(candidate) => (candidate, TypoKind::Word),
            None => match self.char_typo(&chars, rng) {
                Some(candidate) => (candidate, TypoKind::Char),
                None => return TypoOutcome::none(),
            },
        };

        let (corrupted, original) = best.apply(&chars);
        tracing::debug!(
            kind = kind.as_str(),
            position = best.start,
            score = best.score,
            "Typo injected"
        );
        TypoOutcome::accepted(corrupted, best.start, original, kind)
    }

    fn word_typo(&self, text: &str, chars: &[char]) -> Option<Candidate> {
        if !contains_ideograph(text) {
            return None;
        }
        let min_start = (chars.len() / 3).max(1);

        let mut scored = Vec::new();
        let mut start = 0;
        for token in JIEBA.cut(text, true) {
            let len = token.chars().count();
            let end = start + len;
            if start >= min_start && len >= 2 && contains_ideograph(token) {
                for alt in self
                    .index
                    .word_candidates(token, WORD_CANDIDATE_LIMIT)
                    .into_iter()
                    .take(WORD_CANDIDATES_SCORED)
                {
                    scored.push(Candidate {
                        score: self.score_word(chars, start, end, token, alt),
                        start,
                        end,
                        replacement: alt.to_string(),
                    });
                }
            }
            start = end;
        }

        Candidate::best(scored).filter(|c| c.score >= self.thresholds.word_accept)
    }

    /// Corpus frequency of the replacement plus bigram support from the two
    /// characters on either side, squashed through a logistic curve.
    fn score_word(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        original: &str,
        replacement: &str,
    ) -> f64 {
        if replacement == original || !contains_ideograph(replacement) {
            return -1.0;
        }

        let base = 0.9 * ln_count(self.index.word_frequency(replacement));

        let mut bonus = 0.0;
        if start > 0 {
            let left: String = chars[start.saturating_sub(2)..start].iter().collect();
            bonus += 0.15 * ln_count(self.index.word_frequency(&(left + replacement)));
        }
        if end < chars.len() {
            let right: String = chars[end..(end + 2).min(chars.len())].iter().collect();
            let bigram = format!("{}{}", replacement, right);
            bonus += 0.15 * ln_count(self.index.word_frequency(&bigram));
        }

        let length_penalty = if replacement.chars().count() != original.chars().count() {
            0.8
        } else {
            0.0
        };

        sigmoid(0.25 * (base + bonus - length_penalty - 2.0))
    }

    fn char_typo<R: Rng>(&self, chars: &[char], rng: &mut R) -> Option<Candidate> {
        if rng.random::<f64>() >= self.thresholds.char_gate {
            return None;
        }
        let min_pos = (chars.len() / 3).max(1);
        let last = chars.len() - 1;

        let mut scored = Vec::new();
        for (idx, &ch) in chars.iter().enumerate().skip(min_pos) {
            let confusions = particle_confusions(ch);
            if idx == last && END_PARTICLES.contains(ch) && confusions.is_none() {
                continue;
            }

            if let Some(alternates) = confusions {
                for &alt in alternates {
                    scored.push(single(idx, alt, self.score_char(ch, alt, true)));
                }
                continue;
            }
            if STRICT_WHITELIST.contains(ch) {
                continue;
            }

            if is_ideograph(ch) {
                for alt in self.index.char_candidates(ch, CHAR_CANDIDATE_LIMIT) {
                    let score = self.score_char(ch, alt, false);
                    if score >= self.thresholds.char_accept {
                        scored.push(single(idx, alt, score));
                    }
                }
            } else {
                let upper = ch.is_ascii_uppercase();
                for &alt in keyboard_neighbors(ch.to_ascii_lowercase()) {
                    let alt = if upper { alt.to_ascii_uppercase() } else { alt };
                    scored.push(single(idx, alt, KEYBOARD_SCORE));
                }
            }
        }

        Candidate::best(scored).filter(|c| c.score >= self.thresholds.char_accept)
    }

    /// Frequency of the replacement, penalised when it is much rarer than
    /// the original.
    fn score_char(&self, original: char, replacement: char, forced: bool) -> f64 {
        if replacement == original || !is_ideograph(replacement) {
            return 0.0;
        }
        let rf = self.index.char_frequency(replacement) as f64;
        let of = self.index.char_frequency(original) as f64;
        let ratio = (rf + 1.0) / (of + 10.0);

        let mut score = (rf + 1.0).ln() / 10.0;
        if forced {
            score += PARTICLE_BONUS;
        }
        if ratio < 0.05 {
            score -= 1.2;
        } else if ratio < 0.15 {
            score -= 0.6;
        }
        score.clamp(0.0, 1.0)
    }
}

fn single(idx: usize, replacement: char, score: f64) -> Candidate {
    Candidate {
        score,
        start: idx,
        end: idx + 1,
        replacement: replacement.to_string(),
    }
}

fn ln_count(count: u64) -> f64 {
    (count as f64 + 1.0).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
