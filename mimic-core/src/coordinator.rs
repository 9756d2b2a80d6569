//! Behavior coordinator
//!
//! The entry point hosts call once per reply: resolve emotion, segment the
//! text, decide typos per segment, then lay everything out on a timeline.
//! Calls share nothing but the read-only pronunciation index, so one
//! coordinator can serve any number of concurrent conversations.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::BehaviorConfig;
use crate::emotion::{EmotionHints, EmotionResolver};
use crate::model::{EmotionState, MessageSegment, PlaybackAction};
use crate::pronunciation::IndexHandle;
use crate::segmenter::{RuleBasedSegmenter, Segmenter};
use crate::sticker::StickerSuggestion;
use crate::timeline::{SegmentPlan, TimelineBuilder, meta};
use crate::typo::TypoInjector;

/// One reply to be played back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRequest {
    pub text: String,
    #[serde(default)]
    pub emotion_hints: EmotionHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<StickerSuggestion>,
}

impl BehaviorRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_hints(mut self, hints: EmotionHints) -> Self {
        self.emotion_hints = hints;
        self
    }

    pub fn with_sticker(mut self, sticker: StickerSuggestion) -> Self {
        self.sticker = Some(sticker);
        self
    }
}

/// Orchestrates emotion, segmentation, typos and timeline building.
#[derive(Clone)]
pub struct BehaviorCoordinator {
    index: IndexHandle,
    segmenter: Arc<dyn Segmenter>,
}

impl BehaviorCoordinator {
    pub fn new(index: IndexHandle) -> Self {
        Self {
            index,
            segmenter: Arc::new(RuleBasedSegmenter),
        }
    }

    /// Use a different segmentation strategy
    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Produce the playback script for `text`. Empty text yields no actions.
    pub fn process<R: Rng>(
        &self,
        text: &str,
        hints: &EmotionHints,
        config: &BehaviorConfig,
        rng: &mut R,
    ) -> Vec<PlaybackAction> {
        self.run(text, hints, None, config, rng)
    }

    /// Like [`process`](Self::process), with the request's optional sticker.
    pub fn process_request<R: Rng>(
        &self,
        request: &BehaviorRequest,
        config: &BehaviorConfig,
        rng: &mut R,
    ) -> Vec<PlaybackAction> {
        self.run(
            &request.text,
            &request.emotion_hints,
            request.sticker.as_ref(),
            config,
            rng,
        )
    }

    /// Emotion that `process` would use for this reply
    pub fn resolve_emotion(
        &self,
        text: &str,
        hints: &EmotionHints,
        config: &BehaviorConfig,
    ) -> EmotionState {
        if !config.emotion.enable {
            EmotionState::Neutral
        } else if config.emotion.keyword_fallback {
            EmotionResolver::resolve_or_detect(hints, text)
        } else {
            EmotionResolver::resolve(hints)
        }
    }

    /// Segments that `process` would send, before typos
    pub fn segments(&self, text: &str, config: &BehaviorConfig) -> Vec<MessageSegment> {
        let pieces = if config.segmenter.enable {
            self.segmenter.segment(text, config.segmenter.max_length)
        } else {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let chars = piece.chars().count();
                MessageSegment::new(piece)
                    .with_meta(meta::SEGMENT_INDEX, i)
                    .with_meta("char_count", chars)
            })
            .collect()
    }

    fn run<R: Rng>(
        &self,
        text: &str,
        hints: &EmotionHints,
        sticker: Option<&StickerSuggestion>,
        config: &BehaviorConfig,
        rng: &mut R,
    ) -> Vec<PlaybackAction> {
        let segments = self.segments(text, config);
        if segments.is_empty() {
            return Vec::new();
        }
        let emotion = self.resolve_emotion(text, hints, config);

        let plans: Vec<SegmentPlan> = if config.typo.enable {
            let index = self.index.get();
            let injector = TypoInjector::new(&index).with_thresholds(config.typo.thresholds());
            let rate = config.typo.effective_rate(emotion);
            segments
                .into_iter()
                .map(|segment| {
                    let typo = injector.inject_typo(&segment.text, rate, rng);
                    SegmentPlan::with_typo(segment, typo)
                })
                .collect()
        } else {
            segments.into_iter().map(SegmentPlan::clean).collect()
        };

        tracing::debug!(
            segmenter = self.segmenter.name(),
            segments = plans.len(),
            typos = plans.iter().filter(|p| p.typo.has_typo).count(),
            emotion = %emotion,
            "Message planned"
        );

        TimelineBuilder::new(config).build(&plans, emotion, sticker, rng)
    }
}

impl Default for BehaviorCoordinator {
    fn default() -> Self {
        Self::new(IndexHandle::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionType;
    use crate::pronunciation::PronunciationIndex;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn always_typo() -> BehaviorConfig {
        let mut config = BehaviorConfig::default();
        config.typo.base_rate = 1.0;
        config.typo.recall_rate = 1.0;
        config.timeline.hesitation_probability = 0.0;
        config
    }

    #[test]
    fn test_empty_text_no_actions() {
        let coordinator = BehaviorCoordinator::default();
        let mut rng = StdRng::seed_from_u64(0);
        let config = BehaviorConfig::default();
        assert!(coordinator.process("", &EmotionHints::new(), &config, &mut rng).is_empty());
        assert!(coordinator.process("  \n ", &EmotionHints::new(), &config, &mut rng).is_empty());
    }

    #[test]
    fn test_segmentation_disabled_sends_whole_text() {
        let coordinator = BehaviorCoordinator::default();
        let mut config = BehaviorConfig::default();
        config.segmenter.enable = false;
        let text = "字".repeat(120);

        let segments = coordinator.segments(&text, &config);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].metadata["char_count"], 120);
    }

    #[test]
    fn test_emotion_switches() {
        let coordinator = BehaviorCoordinator::default();
        let hints = EmotionHints::from([("angry", "high")]);
        let mut config = BehaviorConfig::default();

        assert_eq!(coordinator.resolve_emotion("", &hints, &config), EmotionState::Angry);
        config.emotion.enable = false;
        assert_eq!(coordinator.resolve_emotion("", &hints, &config), EmotionState::Neutral);

        config.emotion.enable = true;
        config.emotion.keyword_fallback = true;
        assert_eq!(
            coordinator.resolve_emotion("呜呜好难过", &EmotionHints::new(), &config),
            EmotionState::Sad
        );
    }

    #[test]
    fn test_typo_disabled_never_recalls() {
        let index = PronunciationIndex::from_entries([("开心", 100), ("开新", 50)]);
        let coordinator = BehaviorCoordinator::new(IndexHandle::ready(index));
        let mut config = always_typo();
        config.typo.enable = false;

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let actions =
                coordinator.process("我今天真的很开心", &EmotionHints::new(), &config, &mut rng);
            assert!(actions.iter().all(|a| a.kind != ActionType::Recall));
        }
    }

    #[test]
    fn test_empty_index_disables_typos() {
        let coordinator = BehaviorCoordinator::default();
        let config = always_typo();
        let mut rng = StdRng::seed_from_u64(5);
        let actions =
            coordinator.process("我今天真的很开心", &EmotionHints::new(), &config, &mut rng);
        assert!(actions.iter().all(|a| !a.flag(meta::HAS_TYPO)));
    }

    #[test]
    fn test_request_round_trip_json() {
        let request: BehaviorRequest = serde_json::from_str(
            r#"{"text": "你好", "emotion_hints": [["happy", "high"]]}"#,
        )
        .unwrap();
        assert_eq!(request.text, "你好");
        assert!(request.sticker.is_none());

        let coordinator = BehaviorCoordinator::default();
        let mut rng = StdRng::seed_from_u64(1);
        let actions = coordinator.process_request(&request, &BehaviorConfig::default(), &mut rng);
        assert_eq!(
            actions.iter().filter(|a| a.kind == ActionType::Send).count(),
            1
        );
    }

    #[test]
    fn test_request_accepts_hint_object() {
        let request: BehaviorRequest = serde_json::from_str(
            r#"{"text": "好吧", "emotion_hints": {"sad": "medium", "happy": "medium"}}"#,
        )
        .unwrap();
        let coordinator = BehaviorCoordinator::default();
        let emotion = coordinator.resolve_emotion(
            &request.text,
            &request.emotion_hints,
            &BehaviorConfig::default(),
        );
        assert_eq!(emotion, EmotionState::Sad);
    }
}
