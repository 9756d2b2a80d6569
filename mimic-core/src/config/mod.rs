//! Configuration types for the behavior engine
//!
//! Every tunable is a plain value with a default, so a persona can override
//! a handful of fields and inherit the rest. Documents are loaded with
//! figment (`mimic.toml`, `MIMIC_CONFIG_PATH`, `MIMIC_*` env vars) or mapped
//! from the flat `module_field` records used by persona storage (see [`flat`]).

pub mod flat;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MimicError, Result};
use crate::model::EmotionState;
use crate::typo::TypoThresholds;

/// Complete behavior configuration, one sub-config per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BehaviorConfig {
    pub timeline: TimelineConfig,
    pub segmenter: SegmenterConfig,
    pub typo: TypoConfig,
    pub recall: RecallConfig,
    pub pause: PauseConfig,
    pub sticker: StickerConfig,
    pub emotion: EmotionConfig,
}

/// One rung of the typing lead-time ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeStep {
    /// Segments with at most this many characters use `lead_ms`
    pub max_chars: usize,
    pub lead_ms: u64,
}

impl LeadTimeStep {
    pub const fn new(max_chars: usize, lead_ms: u64) -> Self {
        Self { max_chars, lead_ms }
    }
}

/// One bucket of the initial-delay ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayBucket {
    /// Cumulative probability up to and including this bucket
    pub cumulative: f64,
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayBucket {
    pub const fn new(cumulative: f64, min_secs: f64, max_secs: f64) -> Self {
        Self {
            cumulative,
            min_secs,
            max_secs,
        }
    }
}

/// Timeline shaping: hesitation, typing lead time, entry and initial delays.
///
/// Hesitation, lead-time and entry values are milliseconds; initial delay
/// buckets are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub hesitation_probability: f64,
    pub hesitation_cycles_min: u32,
    pub hesitation_cycles_max: u32,
    pub hesitation_duration_min: u64,
    pub hesitation_duration_max: u64,
    pub hesitation_gap_min: u64,
    pub hesitation_gap_max: u64,

    /// Ascending by `max_chars`
    pub typing_lead_times: Vec<LeadTimeStep>,
    /// Lead time for segments longer than the last step
    pub typing_lead_time_default: u64,

    pub entry_delay_min: u64,
    pub entry_delay_max: u64,

    /// Ascending by `cumulative`, last bucket at 1.0
    pub initial_delay_buckets: Vec<DelayBucket>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            hesitation_probability: 0.15,
            hesitation_cycles_min: 1,
            hesitation_cycles_max: 3,
            hesitation_duration_min: 1500,
            hesitation_duration_max: 5000,
            hesitation_gap_min: 500,
            hesitation_gap_max: 2000,
            typing_lead_times: vec![
                LeadTimeStep::new(6, 1200),
                LeadTimeStep::new(15, 2000),
                LeadTimeStep::new(28, 3800),
                LeadTimeStep::new(34, 6000),
                LeadTimeStep::new(50, 8800),
            ],
            typing_lead_time_default: 2500,
            entry_delay_min: 200,
            entry_delay_max: 2000,
            initial_delay_buckets: vec![
                DelayBucket::new(0.45, 3.0, 4.0),
                DelayBucket::new(0.75, 4.0, 6.0),
                DelayBucket::new(0.93, 6.0, 7.0),
                DelayBucket::new(1.0, 8.0, 9.0),
            ],
        }
    }
}

/// Text segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub enable: bool,
    /// Maximum characters per segment
    pub max_length: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_length: 50,
        }
    }
}

/// Typo injection
///
/// The acceptance thresholds are empirically tuned defaults, not derived
/// constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypoConfig {
    pub enable: bool,
    /// Per-segment typo probability before the emotion multiplier
    pub base_rate: f64,
    /// Probability that an injected typo is recalled and retyped
    pub recall_rate: f64,
    pub word_accept_threshold: f64,
    pub char_accept_threshold: f64,
    /// Independent gate on the character-level fallback
    pub char_typo_accept_rate: f64,
}

impl Default for TypoConfig {
    fn default() -> Self {
        let thresholds = TypoThresholds::default();
        Self {
            enable: true,
            base_rate: 0.05,
            recall_rate: 0.75,
            word_accept_threshold: thresholds.word_accept,
            char_accept_threshold: thresholds.char_accept,
            char_typo_accept_rate: thresholds.char_gate,
        }
    }
}

impl TypoConfig {
    /// Typo probability for a segment spoken with `emotion`, clamped to [0, 1]
    pub fn effective_rate(&self, emotion: EmotionState) -> f64 {
        (self.base_rate * emotion.typo_multiplier()).clamp(0.0, 1.0)
    }

    /// Scoring thresholds for the injector
    pub fn thresholds(&self) -> TypoThresholds {
        TypoThresholds {
            word_accept: self.word_accept_threshold,
            char_accept: self.char_accept_threshold,
            char_gate: self.char_typo_accept_rate,
        }
    }
}

/// Message recall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub enable: bool,
    /// Seconds between the corrupted send and its recall
    pub delay: f64,
    /// Seconds between the recall and the corrected send
    pub retype_delay: f64,
    /// How old a message may be and still be recalled by the executing host
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            enable: true,
            delay: 2.0,
            retype_delay: 2.5,
            window: Duration::from_secs(120),
        }
    }
}

/// Inter-segment pause range, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseConfig {
    pub min_duration: f64,
    pub max_duration: f64,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            min_duration: 0.8,
            max_duration: 6.0,
        }
    }
}

/// Sticker sending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerConfig {
    pub send_probability: f64,
    pub confidence_threshold_positive: f64,
    pub confidence_threshold_neutral: f64,
    pub confidence_threshold_negative: f64,
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            send_probability: 0.4,
            confidence_threshold_positive: 0.6,
            confidence_threshold_neutral: 0.7,
            confidence_threshold_negative: 0.8,
        }
    }
}

/// Emotion resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// When false every message is treated as neutral
    pub enable: bool,
    /// Detect emotion from the reply text when no valid hint was supplied
    pub keyword_fallback: bool,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            enable: true,
            keyword_fallback: false,
        }
    }
}

impl BehaviorConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `mimic.toml` in the working directory
    /// 3. The file named by `MIMIC_CONFIG_PATH`
    /// 4. `MIMIC_` environment overrides, nested with `__`
    ///    (e.g. `MIMIC_TYPO__BASE_RATE=0.1`)
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or the result fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(BehaviorConfig::default()))
            .merge(Toml::file("mimic.toml"));

        if let Ok(path) = std::env::var("MIMIC_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: BehaviorConfig = figment
            .merge(Env::prefixed("MIMIC_").split("__"))
            .extract()
            .map_err(|e| {
                MimicError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML, JSON or YAML file (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Json, Serialized, Toml, Yaml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(MimicError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::from(Serialized::defaults(BehaviorConfig::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            _ => figment.merge(Toml::file(path)),
        };

        let config: BehaviorConfig = figment.extract().map_err(|e| {
            MimicError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("timeline.hesitation_probability", self.timeline.hesitation_probability),
            ("typo.base_rate", self.typo.base_rate),
            ("typo.recall_rate", self.typo.recall_rate),
            ("typo.word_accept_threshold", self.typo.word_accept_threshold),
            ("typo.char_accept_threshold", self.typo.char_accept_threshold),
            ("typo.char_typo_accept_rate", self.typo.char_typo_accept_rate),
            ("sticker.send_probability", self.sticker.send_probability),
            ("sticker.confidence_threshold_positive", self.sticker.confidence_threshold_positive),
            ("sticker.confidence_threshold_neutral", self.sticker.confidence_threshold_neutral),
            ("sticker.confidence_threshold_negative", self.sticker.confidence_threshold_negative),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(name, format!("{} is outside [0, 1]", value)));
            }
        }

        let timeline = &self.timeline;
        ordered(
            "timeline.hesitation_cycles",
            timeline.hesitation_cycles_min,
            timeline.hesitation_cycles_max,
        )?;
        ordered(
            "timeline.hesitation_duration",
            timeline.hesitation_duration_min,
            timeline.hesitation_duration_max,
        )?;
        ordered(
            "timeline.hesitation_gap",
            timeline.hesitation_gap_min,
            timeline.hesitation_gap_max,
        )?;
        ordered("timeline.entry_delay", timeline.entry_delay_min, timeline.entry_delay_max)?;

        if timeline.typing_lead_times.is_empty() {
            return Err(invalid("timeline.typing_lead_times", "must not be empty"));
        }
        if timeline
            .typing_lead_times
            .windows(2)
            .any(|w| w[0].max_chars >= w[1].max_chars)
        {
            return Err(invalid(
                "timeline.typing_lead_times",
                "max_chars must be strictly ascending",
            ));
        }

        let buckets = &timeline.initial_delay_buckets;
        if buckets.is_empty() {
            return Err(invalid("timeline.initial_delay_buckets", "must not be empty"));
        }
        let mut previous = 0.0;
        for bucket in buckets {
            if bucket.cumulative < previous || bucket.cumulative > 1.0 {
                return Err(invalid(
                    "timeline.initial_delay_buckets",
                    "cumulative weights must ascend within [0, 1]",
                ));
            }
            if bucket.min_secs < 0.0 || bucket.min_secs > bucket.max_secs {
                return Err(invalid(
                    "timeline.initial_delay_buckets",
                    format!("bad range {}..{}", bucket.min_secs, bucket.max_secs),
                ));
            }
            previous = bucket.cumulative;
        }
        if (previous - 1.0).abs() > f64::EPSILON {
            return Err(invalid(
                "timeline.initial_delay_buckets",
                "last bucket must reach cumulative 1.0",
            ));
        }

        if self.segmenter.max_length == 0 {
            return Err(invalid("segmenter.max_length", "must be at least 1"));
        }
        if self.recall.delay < 0.0 || self.recall.retype_delay < 0.0 {
            return Err(invalid("recall", "delays must be non-negative"));
        }
        if self.pause.min_duration < 0.0 || self.pause.min_duration > self.pause.max_duration {
            return Err(invalid(
                "pause",
                format!(
                    "min_duration {} must be within 0..=max_duration {}",
                    self.pause.min_duration, self.pause.max_duration
                ),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl std::fmt::Display) -> MimicError {
    MimicError::Configuration(format!("{}: {}", field, reason))
}

fn ordered<T: PartialOrd + std::fmt::Display>(field: &str, min: T, max: T) -> Result<()> {
    if min > max {
        return Err(invalid(field, format!("min {} exceeds max {}", min, max)));
    }
    Ok(())
}
