//! Core data types shared by the behavior pipeline

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{MimicError, Result};

/// Canonical emotion of a reply, driving pause and typo multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionState {
    #[default]
    Neutral,
    Happy,
    Excited,
    Sad,
    Angry,
    Anxious,
    Confused,
}

impl EmotionState {
    /// All states, in declaration order.
    pub const ALL: [EmotionState; 7] = [
        EmotionState::Neutral,
        EmotionState::Happy,
        EmotionState::Excited,
        EmotionState::Sad,
        EmotionState::Angry,
        EmotionState::Anxious,
        EmotionState::Confused,
    ];

    /// Lower-case label used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionState::Neutral => "neutral",
            EmotionState::Happy => "happy",
            EmotionState::Excited => "excited",
            EmotionState::Sad => "sad",
            EmotionState::Angry => "angry",
            EmotionState::Anxious => "anxious",
            EmotionState::Confused => "confused",
        }
    }

    /// Scale applied to inter-segment pauses.
    pub fn pause_multiplier(&self) -> f64 {
        match self {
            EmotionState::Neutral => 1.0,
            EmotionState::Happy => 0.9,
            EmotionState::Excited => 0.8,
            EmotionState::Sad => 1.4,
            EmotionState::Angry => 0.7,
            EmotionState::Anxious => 1.1,
            EmotionState::Confused => 1.3,
        }
    }

    /// Scale applied to the base typo rate.
    pub fn typo_multiplier(&self) -> f64 {
        match self {
            EmotionState::Neutral => 1.0,
            EmotionState::Happy => 1.2,
            EmotionState::Excited => 2.0,
            EmotionState::Sad => 0.5,
            EmotionState::Angry => 2.3,
            EmotionState::Anxious => 1.3,
            EmotionState::Confused => 0.3,
        }
    }
}

impl fmt::Display for EmotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One natural chunk of a reply, sent as an independent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSegment {
    /// Clean segment text
    pub text: String,
    /// Free-form annotations (index, char count, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MessageSegment {
    /// Create a segment without metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Length in code points
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Which path of the injector produced a typo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypoKind {
    Word,
    Char,
}

impl TypoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypoKind::Word => "word",
            TypoKind::Char => "char",
        }
    }
}

/// Result of one typo-injection attempt on a segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypoOutcome {
    pub has_typo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrupted_text: Option<String>,
    /// Code-point offset of the replaced span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_span: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypoKind>,
}

impl TypoOutcome {
    /// No typo was injected
    pub fn none() -> Self {
        Self::default()
    }

    /// An accepted typo
    pub fn accepted(
        corrupted_text: impl Into<String>,
        position: usize,
        original_span: impl Into<String>,
        kind: TypoKind,
    ) -> Self {
        Self {
            has_typo: true,
            corrupted_text: Some(corrupted_text.into()),
            position: Some(position),
            original_span: Some(original_span.into()),
            kind: Some(kind),
        }
    }

    /// Corrupted text, only when a typo was accepted
    pub fn typo_text(&self) -> Option<&str> {
        if self.has_typo {
            self.corrupted_text.as_deref()
        } else {
            None
        }
    }
}

/// Kind of step in a playback script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Send,
    Recall,
    Pause,
    TypingStart,
    TypingEnd,
    Wait,
    Image,
}

/// A single timestamped step in the playback timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Seconds relative to the start of the script
    pub timestamp: f64,
    /// Seconds this action occupies (pauses, waits, typing)
    #[serde(default)]
    pub duration: f64,
    /// Identifier of the message created by this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Identifier of the message affected by this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PlaybackAction {
    /// Create an action at `timestamp` (negative values are clamped to zero)
    pub fn new(kind: ActionType, timestamp: f64) -> Self {
        Self {
            kind,
            text: None,
            timestamp: timestamp.max(0.0),
            duration: 0.0,
            message_id: None,
            target_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_target(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a boolean metadata flag, treating absence as `false`
    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Check the ordering invariants of a playback script.
///
/// Timestamps and durations must be finite and non-negative, timestamps must
/// never decrease, and every recall must target a strictly earlier send.
pub fn validate_timeline(actions: &[PlaybackAction]) -> Result<()> {
    let mut last = 0.0_f64;
    let mut sent: HashSet<&str> = HashSet::new();

    for (index, action) in actions.iter().enumerate() {
        if !action.timestamp.is_finite() || action.timestamp < 0.0 {
            return Err(MimicError::InvalidTimeline(format!(
                "action {} has invalid timestamp {}",
                index, action.timestamp
            )));
        }
        if !action.duration.is_finite() || action.duration < 0.0 {
            return Err(MimicError::InvalidTimeline(format!(
                "action {} has invalid duration {}",
                index, action.duration
            )));
        }
        if action.timestamp < last {
            return Err(MimicError::InvalidTimeline(format!(
                "action {} goes back in time ({} < {})",
                index, action.timestamp, last
            )));
        }
        last = action.timestamp;

        match action.kind {
            ActionType::Send => {
                if let Some(id) = action.message_id.as_deref() {
                    sent.insert(id);
                }
            }
            ActionType::Recall => {
                let target = action.target_id.as_deref().ok_or_else(|| {
                    MimicError::InvalidTimeline(format!("recall {} has no target", index))
                })?;
                if !sent.contains(target) {
                    return Err(MimicError::InvalidTimeline(format!(
                        "recall {} targets unknown message {}",
                        index, target
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}
