//! Sticker follow-ups
//!
//! The host may attach a sticker suggestion to a reply. It is sent after the
//! last text segment only when the suggestion is confident enough for its
//! sentiment and an independent send roll passes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::StickerConfig;

/// Sentiment a sticker conveys; negative stickers need more confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// A sticker proposed alongside a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerSuggestion {
    pub sticker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub sentiment: Sentiment,
}

impl StickerSuggestion {
    pub fn new(sticker_id: impl Into<String>, confidence: f64, sentiment: Sentiment) -> Self {
        Self {
            sticker_id: sticker_id.into(),
            url: None,
            confidence,
            sentiment,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl StickerConfig {
    /// Minimum confidence for a sticker of `sentiment`
    pub fn threshold(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Positive => self.confidence_threshold_positive,
            Sentiment::Neutral => self.confidence_threshold_neutral,
            Sentiment::Negative => self.confidence_threshold_negative,
        }
    }
}

/// Decide whether to send `suggestion`.
///
/// The send roll is only drawn once the confidence check passes.
pub fn should_send<R: Rng>(
    config: &StickerConfig,
    suggestion: &StickerSuggestion,
    rng: &mut R,
) -> bool {
    if suggestion.confidence < config.threshold(suggestion.sentiment) {
        return false;
    }
    rng.random::<f64>() < config.send_probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn always() -> StickerConfig {
        StickerConfig {
            send_probability: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_by_sentiment() {
        let config = always();
        let mut rng = StdRng::seed_from_u64(0);

        let positive = StickerSuggestion::new("wave", 0.65, Sentiment::Positive);
        let negative = StickerSuggestion::new("cry", 0.65, Sentiment::Negative);
        assert!(should_send(&config, &positive, &mut rng));
        assert!(!should_send(&config, &negative, &mut rng));
    }

    #[test]
    fn test_zero_probability_never_sends() {
        let config = StickerConfig {
            send_probability: 0.0,
            ..Default::default()
        };
        let suggestion = StickerSuggestion::new("wave", 1.0, Sentiment::Positive);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert!(!should_send(&config, &suggestion, &mut rng));
        }
    }

    #[test]
    fn test_suggestion_deserializes_with_defaults() {
        let s: StickerSuggestion =
            serde_json::from_str(r#"{"sticker_id": "cat_01", "confidence": 0.9}"#).unwrap();
        assert_eq!(s.sentiment, Sentiment::Neutral);
        assert_eq!(s.url, None);
    }
}
