//! Inter-segment pause sampling

use rand::Rng;

use crate::config::PauseConfig;
use crate::model::EmotionState;

/// Longest extra pause granted for segment length, in seconds.
const MAX_LENGTH_BONUS: f64 = 6.0;
const LENGTH_BONUS_PER_CHAR: f64 = 0.075;

/// Sample the pause before a segment of `text_len` characters.
///
/// A uniform draw within `[min, max]` (swapped if reversed) is jittered by
/// ±20%, scaled by the emotion's pause multiplier, then lengthened by
/// 0.075 s per character up to 6 s. The result is non-negative and rounded
/// to milliseconds.
pub fn segment_interval<R: Rng>(
    rng: &mut R,
    emotion: EmotionState,
    min_duration: f64,
    max_duration: f64,
    text_len: usize,
) -> f64 {
    let (low, high) = if max_duration < min_duration {
        (max_duration, min_duration)
    } else {
        (min_duration, max_duration)
    };
    let low = low.max(0.0);
    let high = high.max(low);

    let variance = rng.random_range(0.8..=1.2);
    let base = rng.random_range(low..=high) * variance;
    let length_bonus = (text_len as f64 * LENGTH_BONUS_PER_CHAR).min(MAX_LENGTH_BONUS);

    let interval = (base * emotion.pause_multiplier() + length_bonus).max(0.0);
    (interval * 1000.0).round() / 1000.0
}

/// [`segment_interval`] with the configured range.
pub fn interval_for<R: Rng>(
    rng: &mut R,
    config: &PauseConfig,
    emotion: EmotionState,
    text_len: usize,
) -> f64 {
    segment_interval(rng, emotion, config.min_duration, config.max_duration, text_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_interval_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let v = segment_interval(&mut rng, EmotionState::Neutral, 1.0, 2.0, 0);
            assert!((0.8..=2.4).contains(&v), "{}", v);
        }
    }

    #[test]
    fn test_length_bonus_capped() {
        let mut rng = StdRng::seed_from_u64(2);
        let v = segment_interval(&mut rng, EmotionState::Neutral, 0.0, 0.0, 1000);
        assert_eq!(v, 6.0);

        let v = segment_interval(&mut rng, EmotionState::Neutral, 0.0, 0.0, 20);
        assert_eq!(v, 1.5);
    }

    #[test]
    fn test_reversed_range_swapped() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = segment_interval(&mut rng, EmotionState::Neutral, 3.0, 1.0, 0);
            assert!((0.8..=3.6).contains(&v));
        }
    }

    #[test]
    fn test_negative_range_clamped() {
        let mut rng = StdRng::seed_from_u64(4);
        let v = segment_interval(&mut rng, EmotionState::Angry, -5.0, -1.0, 0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_sad_pauses_longer_than_angry() {
        let mut sad_rng = StdRng::seed_from_u64(5);
        let mut angry_rng = StdRng::seed_from_u64(5);
        let sad = segment_interval(&mut sad_rng, EmotionState::Sad, 1.0, 3.0, 10);
        let angry = segment_interval(&mut angry_rng, EmotionState::Angry, 1.0, 3.0, 10);
        assert!(sad > angry);
    }

    #[test]
    fn test_rounded_to_millis() {
        let mut rng = StdRng::seed_from_u64(6);
        let v = interval_for(&mut rng, &PauseConfig::default(), EmotionState::Happy, 7);
        assert_eq!((v * 1000.0).round() / 1000.0, v);
    }
}
