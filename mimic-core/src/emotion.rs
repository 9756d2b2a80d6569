//! Emotion resolution
//!
//! The upstream model reports a free-form `{label -> intensity}` map alongside
//! each reply. [`EmotionResolver`] reduces it to one [`EmotionState`]: labels
//! are lower-cased, entries with an unknown intensity are dropped, and the
//! strongest surviving entry wins. Ties go to the entry the caller listed
//! first, so resolution is reproducible.
//!
//! When no hints are available the keyword detector ([`detect_from_text`])
//! can guess from the reply text itself.

use once_cell::sync::Lazy;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::model::EmotionState;

/// Reported intensity of an emotion label, ordered low to extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Intensity {
    /// Parse a label case-insensitively; unknown labels yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Intensity::Low),
            "medium" => Some(Intensity::Medium),
            "high" => Some(Intensity::High),
            "extreme" => Some(Intensity::Extreme),
            _ => None,
        }
    }
}

/// Ordered `{label -> intensity}` hints as reported for one message.
///
/// Order matters: it breaks ties between equally intense labels. On the wire
/// this is a JSON object read in key order; a list of `[label, intensity]`
/// pairs is accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionHints(Vec<(String, String)>);

impl EmotionHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hint, keeping caller order
    pub fn push(&mut self, label: impl Into<String>, intensity: impl Into<String>) {
        self.0.push((label.into(), intensity.into()));
    }

    pub fn with(mut self, label: impl Into<String>, intensity: impl Into<String>) -> Self {
        self.push(label, intensity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Lower-cased labels with a recognised intensity, in first-seen order.
    ///
    /// A label repeated later keeps its first position but takes the later
    /// intensity.
    pub fn normalized(&self) -> Vec<(String, Intensity)> {
        let mut cleaned: Vec<(String, Intensity)> = Vec::new();
        for (raw_label, raw_intensity) in self.iter() {
            let label = raw_label.trim().to_lowercase();
            if label.is_empty() {
                continue;
            }
            let Some(intensity) = Intensity::parse(raw_intensity) else {
                continue;
            };
            match cleaned.iter_mut().find(|(existing, _)| *existing == label) {
                Some(entry) => entry.1 = intensity,
                None => cleaned.push((label, intensity)),
            }
        }
        cleaned
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EmotionHints {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for EmotionHints {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for EmotionHints {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, intensity) in &self.0 {
            map.serialize_entry(label, intensity)?;
        }
        map.end()
    }
}

struct HintsVisitor;

impl<'de> Visitor<'de> for HintsVisitor {
    type Value = EmotionHints;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a label -> intensity map or a list of [label, intensity] pairs")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut hints = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((label, intensity)) = access.next_entry::<String, String>()? {
            hints.push((label, intensity));
        }
        Ok(EmotionHints(hints))
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut hints = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(pair) = access.next_element::<(String, String)>()? {
            hints.push(pair);
        }
        Ok(EmotionHints(hints))
    }
}

impl<'de> Deserialize<'de> for EmotionHints {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(HintsVisitor)
    }
}

/// Synonym table from reported labels to canonical states.
static LABEL_TO_STATE: Lazy<HashMap<&'static str, EmotionState>> = Lazy::new(|| {
    HashMap::from([
        ("neutral", EmotionState::Neutral),
        ("happy", EmotionState::Happy),
        ("excited", EmotionState::Excited),
        ("sad", EmotionState::Sad),
        ("angry", EmotionState::Angry),
        ("mad", EmotionState::Angry),
        ("anxious", EmotionState::Anxious),
        ("nervous", EmotionState::Anxious),
        ("confused", EmotionState::Confused),
        ("shy", EmotionState::Confused),
        ("embarrassed", EmotionState::Anxious),
        ("surprised", EmotionState::Excited),
        ("playful", EmotionState::Happy),
        ("affectionate", EmotionState::Happy),
        ("tired", EmotionState::Sad),
        ("bored", EmotionState::Sad),
        ("serious", EmotionState::Neutral),
        ("caring", EmotionState::Happy),
    ])
});

/// Map a normalized label to its canonical state (unknown labels are neutral).
pub fn canonical_state(label: &str) -> EmotionState {
    LABEL_TO_STATE
        .get(label)
        .copied()
        .unwrap_or(EmotionState::Neutral)
}

/// Reduces emotion hints to a single canonical state.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionResolver;

impl EmotionResolver {
    /// Resolve hints; empty or fully invalid input is neutral.
    pub fn resolve(hints: &EmotionHints) -> EmotionState {
        Self::strongest(hints)
            .map(|label| canonical_state(&label))
            .unwrap_or(EmotionState::Neutral)
    }

    /// Resolve hints, falling back to keyword detection on `text` when no
    /// hint survives normalization.
    pub fn resolve_or_detect(hints: &EmotionHints, text: &str) -> EmotionState {
        match Self::strongest(hints) {
            Some(label) => canonical_state(&label),
            None => detect_from_text(text),
        }
    }

    /// Label of the most intense valid hint, first-listed on ties.
    fn strongest(hints: &EmotionHints) -> Option<String> {
        let mut best: Option<(String, Intensity)> = None;
        for (label, intensity) in hints.normalized() {
            let replace = match &best {
                Some((_, current)) => intensity > *current,
                None => true,
            };
            if replace {
                best = Some((label, intensity));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Keyword lists for text-based detection, in [`EmotionState::ALL`] order.
static EMOTION_KEYWORDS: &[(EmotionState, &[&str])] = &[
    (
        EmotionState::Happy,
        &[
            "哈哈", "嘿嘿", "开心", "高兴", "快乐", "好啊", "太好了", "haha", "hehe", "happy",
            "glad", "great", "awesome", "nice", "😊", "😄", "😁", "🎉",
        ],
    ),
    (
        EmotionState::Excited,
        &[
            "！！", "!!", "哇", "天啊", "真的吗", "太棒了", "超级", "wow", "omg", "amazing",
            "incredible", "🤩", "😍", "🔥", "✨",
        ],
    ),
    (
        EmotionState::Sad,
        &[
            "难过", "伤心", "哭", "呜呜", "唉", "可惜", "遗憾", "失望", "sad", "cry",
            "unfortunately", "disappointed", "😢", "😭", "😔", "💔",
        ],
    ),
    (
        EmotionState::Angry,
        &[
            "生气", "愤怒", "可恶", "讨厌", "烦", "气死", "angry", "mad", "annoyed", "hate",
            "damn", "😠", "😡", "💢",
        ],
    ),
    (
        EmotionState::Anxious,
        &[
            "紧张", "担心", "害怕", "焦虑", "不安", "怎么办", "nervous", "worried", "scared",
            "anxious", "stressed", "😰", "😨", "😟",
        ],
    ),
    (
        EmotionState::Confused,
        &[
            "？？", "??", "什么", "诶", "confused", "huh", "😕", "🤔", "😵",
        ],
    ),
];

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .map(|kw| text.matches(kw).count())
        .sum()
}

/// Guess the dominant emotion of `text` by keyword counts.
///
/// Matching is case-insensitive for Latin keywords. Zero hits is neutral;
/// ties go to the state listed first.
pub fn detect_from_text(text: &str) -> EmotionState {
    let lowered = text.to_lowercase();
    let mut best = (EmotionState::Neutral, 0usize);
    for (state, keywords) in EMOTION_KEYWORDS {
        let hits = keyword_hits(&lowered, keywords);
        if hits > best.1 {
            best = (*state, hits);
        }
    }
    best.0
}

/// Emotional density of `text` in [0, 1]: keyword hits per 20 characters.
pub fn detect_intensity(text: &str) -> f64 {
    let length = text.chars().count();
    if length == 0 {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let hits: usize = EMOTION_KEYWORDS
        .iter()
        .map(|(_, keywords)| keyword_hits(&lowered, keywords))
        .sum();
    (hits as f64 / (length as f64 / 20.0)).clamp(0.0, 1.0)
}
