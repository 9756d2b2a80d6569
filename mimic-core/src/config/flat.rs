//! Explicit mapping between flat `module_field` records and [`BehaviorConfig`].
//!
//! Persona storage keeps behavior tunables as one flat row
//! (`typo_base_rate`, `recall_retype_delay`,
//! `timeline_typing_lead_time_threshold_3`, ...). Ladders are numbered from 1;
//! the last initial-delay bucket has no weight key and always closes at 1.0.
//!
//! Keys that belong to no module, or that name no field of their module
//! (such as `sticker_packs`), are ignored so callers can pass a whole persona
//! row through.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{BehaviorConfig, DelayBucket, LeadTimeStep};
use crate::error::{MimicError, Result};

const MODULES: [&str; 7] = [
    "timeline",
    "segmenter",
    "typo",
    "recall",
    "pause",
    "sticker",
    "emotion",
];

/// Flatten a config into `module_field` keys.
pub fn to_flat(config: &BehaviorConfig) -> Result<BTreeMap<String, Value>> {
    let nested = serde_json::to_value(config)?;
    let mut flat = BTreeMap::new();

    for module in MODULES {
        let Some(fields) = nested.get(module).and_then(Value::as_object) else {
            continue;
        };
        for (field, value) in fields {
            match (module, field.as_str()) {
                ("timeline", "typing_lead_times") | ("timeline", "initial_delay_buckets") => {}
                _ => {
                    flat.insert(format!("{}_{}", module, field), value.clone());
                }
            }
        }
    }

    for (i, step) in config.timeline.typing_lead_times.iter().enumerate() {
        let n = i + 1;
        flat.insert(
            format!("timeline_typing_lead_time_threshold_{}", n),
            Value::from(step.max_chars),
        );
        flat.insert(format!("timeline_typing_lead_time_{}", n), Value::from(step.lead_ms));
    }

    let buckets = &config.timeline.initial_delay_buckets;
    for (i, bucket) in buckets.iter().enumerate() {
        let n = i + 1;
        if n < buckets.len() {
            flat.insert(
                format!("timeline_initial_delay_weight_{}", n),
                Value::from(bucket.cumulative),
            );
        }
        flat.insert(
            format!("timeline_initial_delay_range_{}_min", n),
            Value::from(bucket.min_secs),
        );
        flat.insert(
            format!("timeline_initial_delay_range_{}_max", n),
            Value::from(bucket.max_secs),
        );
    }

    Ok(flat)
}

/// Build a config from flat `module_field` entries, starting from defaults.
///
/// # Errors
///
/// Returns a configuration error if a ladder entry has the wrong type, a
/// numbered rung is incomplete, or the result fails validation.
pub fn from_flat<'a, I, K>(entries: I) -> Result<BehaviorConfig>
where
    I: IntoIterator<Item = (K, &'a Value)>,
    K: AsRef<str>,
{
    let defaults = BehaviorConfig::default();
    let mut nested = serde_json::to_value(&defaults)?;
    let mut ladder = LadderOverrides::seeded(&defaults);

    for (key, value) in entries {
        let key = key.as_ref();
        let Some((module, field)) = split_key(key) else {
            tracing::debug!(key, "Ignoring flat key outside behavior modules");
            continue;
        };

        if module == "timeline" && ladder.apply(field, value)? {
            continue;
        }

        let Some(fields) = nested.get_mut(module).and_then(Value::as_object_mut) else {
            continue;
        };
        if fields.contains_key(field) {
            fields.insert(field.to_string(), value.clone());
        } else {
            tracing::debug!(key, "Ignoring flat key with no matching field");
        }
    }

    if let Some(timeline) = nested.get_mut("timeline").and_then(Value::as_object_mut) {
        ladder.write_into(timeline)?;
    }

    let config: BehaviorConfig = serde_json::from_value(nested).map_err(|e| {
        MimicError::Configuration(format!("Invalid flat behavior config: {}", e))
    })?;
    config.validate()?;
    Ok(config)
}

fn split_key(key: &str) -> Option<(&'static str, &str)> {
    MODULES.iter().find_map(|module| {
        key.strip_prefix(module)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|field| !field.is_empty())
            .map(|field| (*module, field))
    })
}

/// Numbered ladder rungs collected while scanning flat keys.
#[derive(Default)]
struct LadderOverrides {
    /// rung -> (max_chars, lead_ms)
    lead: BTreeMap<usize, (Option<usize>, Option<u64>)>,
    /// rung -> (cumulative, min_secs, max_secs)
    delay: BTreeMap<usize, (Option<f64>, Option<f64>, Option<f64>)>,
}

impl LadderOverrides {
    fn seeded(defaults: &BehaviorConfig) -> Self {
        let mut ladder = Self::default();
        for (i, step) in defaults.timeline.typing_lead_times.iter().enumerate() {
            ladder
                .lead
                .insert(i + 1, (Some(step.max_chars), Some(step.lead_ms)));
        }
        let count = defaults.timeline.initial_delay_buckets.len();
        for (i, bucket) in defaults.timeline.initial_delay_buckets.iter().enumerate() {
            let weight = (i + 1 < count).then_some(bucket.cumulative);
            ladder
                .delay
                .insert(i + 1, (weight, Some(bucket.min_secs), Some(bucket.max_secs)));
        }
        ladder
    }

    /// Returns `Ok(true)` when `field` was a ladder key.
    fn apply(&mut self, field: &str, value: &Value) -> Result<bool> {
        if let Some(n) = field
            .strip_prefix("typing_lead_time_threshold_")
            .and_then(parse_rung)
        {
            self.lead.entry(n).or_default().0 = Some(as_u64(field, value)? as usize);
            return Ok(true);
        }
        if let Some(n) = field.strip_prefix("typing_lead_time_").and_then(parse_rung) {
            self.lead.entry(n).or_default().1 = Some(as_u64(field, value)?);
            return Ok(true);
        }
        if let Some(n) = field.strip_prefix("initial_delay_weight_").and_then(parse_rung) {
            self.delay.entry(n).or_default().0 = Some(as_f64(field, value)?);
            return Ok(true);
        }
        if let Some(rest) = field.strip_prefix("initial_delay_range_") {
            if let Some(n) = rest.strip_suffix("_min").and_then(parse_rung) {
                self.delay.entry(n).or_default().1 = Some(as_f64(field, value)?);
                return Ok(true);
            }
            if let Some(n) = rest.strip_suffix("_max").and_then(parse_rung) {
                self.delay.entry(n).or_default().2 = Some(as_f64(field, value)?);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn write_into(self, timeline: &mut Map<String, Value>) -> Result<()> {
        let mut steps = Vec::with_capacity(self.lead.len());
        for (n, (max_chars, lead_ms)) in self.lead {
            match (max_chars, lead_ms) {
                (Some(max_chars), Some(lead_ms)) => {
                    steps.push(LeadTimeStep::new(max_chars, lead_ms))
                }
                _ => {
                    return Err(MimicError::Configuration(format!(
                        "typing lead time rung {} needs both threshold and lead time",
                        n
                    )));
                }
            }
        }

        let last = self.delay.keys().next_back().copied();
        let mut buckets = Vec::with_capacity(self.delay.len());
        for (n, (weight, min, max)) in self.delay {
            let cumulative = if Some(n) == last { Some(1.0) } else { weight };
            match (cumulative, min, max) {
                (Some(cumulative), Some(min), Some(max)) => {
                    buckets.push(DelayBucket::new(cumulative, min, max))
                }
                _ => {
                    return Err(MimicError::Configuration(format!(
                        "initial delay bucket {} needs a weight and a range",
                        n
                    )));
                }
            }
        }

        timeline.insert("typing_lead_times".to_string(), serde_json::to_value(steps)?);
        timeline.insert("initial_delay_buckets".to_string(), serde_json::to_value(buckets)?);
        Ok(())
    }
}

fn parse_rung(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|n| *n >= 1)
}

fn as_u64(field: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| {
            MimicError::Configuration(format!("timeline_{} must be a non-negative integer", field))
        })
}

fn as_f64(field: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        MimicError::Configuration(format!("timeline_{} must be a number", field))
    })
}
