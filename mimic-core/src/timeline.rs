//! Playback timeline construction
//!
//! Turns planned segments into an ordered script of timestamped actions. The
//! clock only moves forward: every action is stamped with the running clock
//! and the clock then advances by that action's duration or the delay that
//! follows it.
//!
//! Layout of one message:
//!
//! ```text
//! pause(initial)  [entry delay]  [hesitation cycles]
//! for each segment:
//!     pause(interval)            (not before the first segment)
//!     typing_start .. typing_end (lead time from the length ladder)
//!     send                       or  send(typo) [recall send(correction)]
//! [pause(interval) image]        (accepted sticker)
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use std::time::Duration;

use crate::config::{BehaviorConfig, DelayBucket, RecallConfig, TimelineConfig};
use crate::model::{ActionType, EmotionState, MessageSegment, PlaybackAction, TypoOutcome};
use crate::pause;
use crate::sticker::{self, StickerSuggestion};
use crate::typo;

/// Metadata keys attached to playback actions.
pub mod meta {
    pub const SEGMENT_INDEX: &str = "segment_index";
    pub const HAS_TYPO: &str = "has_typo";
    pub const IS_CORRECTION: &str = "is_correction";
    pub const TYPO_KIND: &str = "typo_kind";
    pub const TYPO_POSITION: &str = "typo_position";
    pub const PHASE: &str = "phase";
    pub const CYCLE: &str = "cycle";
    pub const STICKER_ID: &str = "sticker_id";
    pub const URL: &str = "url";
}

/// A segment together with its typo decision.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segment: MessageSegment,
    pub typo: TypoOutcome,
}

impl SegmentPlan {
    pub fn clean(segment: MessageSegment) -> Self {
        Self {
            segment,
            typo: TypoOutcome::none(),
        }
    }

    pub fn with_typo(segment: MessageSegment, typo: TypoOutcome) -> Self {
        Self { segment, typo }
    }
}

/// Typing lead time in seconds for a segment of `char_count` characters.
pub fn typing_lead_time(config: &TimelineConfig, char_count: usize) -> f64 {
    let ms = config
        .typing_lead_times
        .iter()
        .find(|step| char_count <= step.max_chars)
        .map(|step| step.lead_ms)
        .unwrap_or(config.typing_lead_time_default);
    ms as f64 / 1000.0
}

/// Sample the initial delay (seconds) from the cumulative bucket ladder.
pub fn initial_delay<R: Rng>(buckets: &[DelayBucket], rng: &mut R) -> f64 {
    let roll = rng.random::<f64>();
    let Some(bucket) = buckets
        .iter()
        .find(|b| roll < b.cumulative)
        .or_else(|| buckets.last())
    else {
        return 0.0;
    };
    uniform(rng, bucket.min_secs, bucket.max_secs)
}

/// Whether a message sent at `sent_at` may still be recalled at `now`.
pub fn recall_allowed(sent_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match TimeDelta::from_std(window) {
        Ok(window) => now.signed_duration_since(sent_at) <= window,
        Err(_) => true,
    }
}

impl RecallConfig {
    /// [`recall_allowed`] with the configured window
    pub fn allows(&self, sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        recall_allowed(sent_at, now, self.window)
    }
}

fn uniform<R: Rng>(rng: &mut R, a: f64, b: f64) -> f64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    rng.random_range(low..=high)
}

fn uniform_ms<R: Rng>(rng: &mut R, a: u64, b: u64) -> f64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    rng.random_range(low..=high) as f64 / 1000.0
}

/// Message ids are drawn from the caller's rng so seeded runs replay exactly.
fn message_id<R: Rng>(rng: &mut R) -> String {
    let id = uuid::Builder::from_random_bytes(rng.random::<[u8; 16]>()).into_uuid();
    format!("msg_{}", id.simple())
}

/// Builds playback scripts for one behavior configuration.
#[derive(Debug, Clone, Copy)]
pub struct TimelineBuilder<'a> {
    config: &'a BehaviorConfig,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(config: &'a BehaviorConfig) -> Self {
        Self { config }
    }

    /// Build the script for `plans`. No plans yield no actions.
    pub fn build<R: Rng>(
        &self,
        plans: &[SegmentPlan],
        emotion: EmotionState,
        sticker: Option<&StickerSuggestion>,
        rng: &mut R,
    ) -> Vec<PlaybackAction> {
        if plans.is_empty() {
            return Vec::new();
        }

        let timeline = &self.config.timeline;
        let mut script = Script::default();

        let delay = initial_delay(&timeline.initial_delay_buckets, rng);
        script.pause(delay, "initial");
        script.clock += uniform_ms(rng, timeline.entry_delay_min, timeline.entry_delay_max);

        if rng.random::<f64>() < timeline.hesitation_probability {
            self.hesitate(&mut script, rng);
        }

        for (index, plan) in plans.iter().enumerate() {
            if index > 0 {
                let chars = plan.segment.char_count();
                let interval = pause::interval_for(rng, &self.config.pause, emotion, chars);
                script.pause(interval, "interval");
            }

            let lead = typing_lead_time(timeline, plan.segment.char_count());
            script.push(
                PlaybackAction::new(ActionType::TypingStart, script.clock).with_duration(lead),
            );
            script.clock += lead;
            script.push(PlaybackAction::new(ActionType::TypingEnd, script.clock));

            self.send_segment(&mut script, index, plan, rng);
        }

        if let Some(suggestion) = sticker
            && sticker::should_send(&self.config.sticker, suggestion, rng)
        {
            let interval = pause::interval_for(rng, &self.config.pause, emotion, 0);
            script.pause(interval, "interval");

            let mut image = PlaybackAction::new(ActionType::Image, script.clock)
                .with_message_id(message_id(rng))
                .with_meta(meta::STICKER_ID, suggestion.sticker_id.clone());
            if let Some(url) = &suggestion.url {
                image = image.with_meta(meta::URL, url.clone());
            }
            script.push(image);
        }

        tracing::debug!(
            segments = plans.len(),
            actions = script.actions.len(),
            emotion = %emotion,
            total_secs = script.clock,
            "Timeline built"
        );
        script.actions
    }

    fn hesitate<R: Rng>(&self, script: &mut Script, rng: &mut R) {
        let timeline = &self.config.timeline;
        let (min, max) = (
            timeline.hesitation_cycles_min.min(timeline.hesitation_cycles_max),
            timeline.hesitation_cycles_min.max(timeline.hesitation_cycles_max),
        );
        let cycles = rng.random_range(min..=max);

        for cycle in 0..cycles {
            let duration = uniform_ms(
                rng,
                timeline.hesitation_duration_min,
                timeline.hesitation_duration_max,
            );
            script.push(
                PlaybackAction::new(ActionType::TypingStart, script.clock).with_duration(duration),
            );
            script.push(
                PlaybackAction::new(ActionType::Wait, script.clock)
                    .with_duration(duration)
                    .with_meta(meta::PHASE, "hesitation")
                    .with_meta(meta::CYCLE, cycle),
            );
            script.clock += duration;
            script.push(PlaybackAction::new(ActionType::TypingEnd, script.clock));
            script.clock +=
                uniform_ms(rng, timeline.hesitation_gap_min, timeline.hesitation_gap_max);
        }
    }

    fn send_segment<R: Rng>(
        &self,
        script: &mut Script,
        index: usize,
        plan: &SegmentPlan,
        rng: &mut R,
    ) {
        let clean = &plan.segment.text;
        let Some(corrupted) = plan.typo.typo_text() else {
            script.push(
                PlaybackAction::new(ActionType::Send, script.clock)
                    .with_text(clean.clone())
                    .with_message_id(message_id(rng))
                    .with_meta(meta::SEGMENT_INDEX, index),
            );
            return;
        };

        let typo_id = message_id(rng);
        let mut send = PlaybackAction::new(ActionType::Send, script.clock)
            .with_text(corrupted)
            .with_message_id(typo_id.clone())
            .with_meta(meta::SEGMENT_INDEX, index)
            .with_meta(meta::HAS_TYPO, true);
        if let Some(kind) = plan.typo.kind {
            send = send.with_meta(meta::TYPO_KIND, kind.as_str());
        }
        if let Some(position) = plan.typo.position {
            send = send.with_meta(meta::TYPO_POSITION, position);
        }
        script.push(send);

        let recall = &self.config.recall;
        if !recall.enable || !typo::should_recall(self.config.typo.recall_rate, rng) {
            return;
        }

        script.clock += recall.delay.max(0.0);
        script.push(
            PlaybackAction::new(ActionType::Recall, script.clock)
                .with_target(typo_id)
                .with_meta(meta::SEGMENT_INDEX, index),
        );
        script.clock += recall.retype_delay.max(0.0);
        script.push(
            PlaybackAction::new(ActionType::Send, script.clock)
                .with_text(clean.clone())
                .with_message_id(message_id(rng))
                .with_meta(meta::SEGMENT_INDEX, index)
                .with_meta(meta::IS_CORRECTION, true),
        );
    }
}

#[derive(Debug, Default)]
struct Script {
    clock: f64,
    actions: Vec<PlaybackAction>,
}

impl Script {
    fn push(&mut self, action: PlaybackAction) {
        self.actions.push(action);
    }

    fn pause(&mut self, duration: f64, phase: &str) {
        let duration = duration.max(0.0);
        self.push(
            PlaybackAction::new(ActionType::Pause, self.clock)
                .with_duration(duration)
                .with_meta(meta::PHASE, phase),
        );
        self.clock += duration;
    }
}
