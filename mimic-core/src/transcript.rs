//! Conversation-history rendering of a playback script
//!
//! Lets the upstream model see what was actually shown, typos and recalls
//! included, on its next turn.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ActionType, PlaybackAction};
use crate::timeline::meta;

/// Longest excerpt of a recalled message quoted in the recall note.
const RECALL_EXCERPT_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    Assistant,
    System,
}

/// One history message derived from the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub content: String,
}

impl TranscriptEntry {
    fn assistant(content: String) -> Self {
        Self {
            role: TranscriptRole::Assistant,
            content,
        }
    }

    fn system(content: String) -> Self {
        Self {
            role: TranscriptRole::System,
            content,
        }
    }
}

/// Render `actions` as history entries.
///
/// Sends become assistant entries tagged `[typo]` / `[correction]`, recalls
/// become a system note quoting the recalled send, and images become
/// `[sticker] <id>`. Timing actions are dropped.
pub fn render(actions: &[PlaybackAction]) -> Vec<TranscriptEntry> {
    let mut entries = Vec::new();
    let mut sent: HashMap<&str, String> = HashMap::new();

    for action in actions {
        match action.kind {
            ActionType::Send => {
                let text = action.text.as_deref().unwrap_or_default();
                let mut tags = Vec::new();
                if action.flag(meta::HAS_TYPO) {
                    tags.push("[typo]");
                }
                if action.flag(meta::IS_CORRECTION) {
                    tags.push("[correction]");
                }
                let content = if tags.is_empty() {
                    text.to_string()
                } else {
                    format!("{} {}", tags.join(" "), text).trim().to_string()
                };

                if let Some(id) = action.message_id.as_deref() {
                    sent.insert(id, content.clone());
                }
                entries.push(TranscriptEntry::assistant(content));
            }
            ActionType::Recall => {
                let recalled = action
                    .target_id
                    .as_deref()
                    .and_then(|id| sent.get(id))
                    .filter(|content| !content.is_empty());
                let note = match recalled {
                    Some(content) => {
                        let excerpt: String = content.chars().take(RECALL_EXCERPT_CHARS).collect();
                        format!("(assistant recalled a previous message: {})", excerpt)
                    }
                    None => "(assistant recalled a previous message)".to_string(),
                };
                entries.push(TranscriptEntry::system(note));
            }
            ActionType::Image => {
                let sticker = action
                    .metadata
                    .get(meta::STICKER_ID)
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                entries.push(TranscriptEntry::assistant(format!("[sticker] {}", sticker)));
            }
            ActionType::Pause
            | ActionType::TypingStart
            | ActionType::TypingEnd
            | ActionType::Wait => {}
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typo_recall_correction() {
        let actions = vec![
            PlaybackAction::new(ActionType::Pause, 0.0).with_duration(3.0),
            PlaybackAction::new(ActionType::Send, 3.0)
                .with_text("我很开新")
                .with_message_id("m1")
                .with_meta(meta::HAS_TYPO, true),
            PlaybackAction::new(ActionType::Recall, 5.0).with_target("m1"),
            PlaybackAction::new(ActionType::Send, 7.5)
                .with_text("我很开心")
                .with_message_id("m2")
                .with_meta(meta::IS_CORRECTION, true),
        ];

        let entries = render(&actions);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].content, "[typo] 我很开新");
        assert_eq!(entries[1].role, TranscriptRole::System);
        assert_eq!(
            entries[1].content,
            "(assistant recalled a previous message: [typo] 我很开新)"
        );
        assert_eq!(entries[2].content, "[correction] 我很开心");
    }

    #[test]
    fn test_recall_excerpt_truncated() {
        let long = "字".repeat(60);
        let actions = vec![
            PlaybackAction::new(ActionType::Send, 0.0)
                .with_text(long)
                .with_message_id("m1"),
            PlaybackAction::new(ActionType::Recall, 1.0).with_target("m1"),
        ];
        let note = &render(&actions)[1].content;
        assert_eq!(note.chars().filter(|c| *c == '字').count(), 40);
    }

    #[test]
    fn test_unknown_recall_target_and_sticker() {
        let actions = vec![
            PlaybackAction::new(ActionType::Recall, 0.0).with_target("ghost"),
            PlaybackAction::new(ActionType::Image, 1.0).with_meta(meta::STICKER_ID, "cat_01"),
        ];
        let entries = render(&actions);
        assert_eq!(entries[0].content, "(assistant recalled a previous message)");
        assert_eq!(entries[1].content, "[sticker] cat_01");
    }
}
