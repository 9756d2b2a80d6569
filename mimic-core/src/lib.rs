//! # Mimic - human-like message behavior
//!
//! Mimic turns a persona's finished reply into a playback script that looks
//! typed by a person instead of emitted by a model:
//! - Replies are split into natural chunks at sentence, comma or space boundaries
//! - Chunks occasionally carry a same-pronunciation typo, often recalled and retyped
//! - Sends are paced with initial delays, hesitation, typing indicators and pauses
//! - Pacing and typo rates follow the reply's emotion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mimic_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let coordinator = BehaviorCoordinator::new(IndexHandle::from_path("assets/jieba/dict.txt"));
//! let config = BehaviorConfig::default();
//! let hints = EmotionHints::from([("happy", "high")]);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//!
//! let actions = coordinator.process("我今天真的很开心，谢谢你！", &hints, &config, &mut rng);
//! for action in &actions {
//!     println!("{:>7.3}s {:?} {:?}", action.timestamp, action.kind, action.text);
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Emotion**: free-form `{label -> intensity}` hints reduce to one
//!   [`EmotionState`](model::EmotionState)
//! - **Segmenter**: rule-based chunking bounded by `max_length`
//! - **Pronunciation index**: homophone lookup built once from a word/frequency corpus
//! - **Typo injector**: word-level and character-level homophone swaps
//! - **Timeline**: the timestamped action script
//! - **Coordinator**: the single entry point tying them together
//!
//! The engine is synchronous. Randomness always comes from the caller's rng,
//! so a fixed seed replays a script exactly.

pub mod config;
pub mod coordinator;
pub mod emotion;
pub mod error;
pub mod model;
pub mod pause;
pub mod pronunciation;
pub mod segmenter;
pub mod sticker;
pub mod timeline;
pub mod transcript;
pub mod typo;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        BehaviorConfig, DelayBucket, EmotionConfig, LeadTimeStep, PauseConfig, RecallConfig,
        SegmenterConfig, StickerConfig, TimelineConfig, TypoConfig,
    };
    pub use crate::coordinator::{BehaviorCoordinator, BehaviorRequest};
    pub use crate::emotion::{EmotionHints, EmotionResolver, Intensity};
    pub use crate::error::{MimicError, Result};
    pub use crate::model::{
        ActionType, EmotionState, MessageSegment, PlaybackAction, TypoKind, TypoOutcome,
        validate_timeline,
    };
    pub use crate::pronunciation::{IndexHandle, PronunciationIndex};
    pub use crate::segmenter::{RuleBasedSegmenter, Segmenter};
    pub use crate::sticker::{Sentiment, StickerSuggestion};
    pub use crate::timeline::{SegmentPlan, TimelineBuilder};
    pub use crate::transcript::{TranscriptEntry, TranscriptRole};
    pub use crate::typo::{TypoInjector, TypoThresholds};
}
