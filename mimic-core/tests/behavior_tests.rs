//! End-to-end tests for the behavior engine
//!
//! These drive the public API the way a chat host does: build a shared
//! index, process replies with seeded rngs, and check the resulting scripts.

use std::io::Write;
use std::sync::Arc;

use mimic_core::prelude::*;
use mimic_core::segmenter::segment;
use mimic_core::timeline::meta;
use mimic_core::{config::flat, transcript};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::NamedTempFile;

fn corpus_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create corpus file");
    writeln!(
        file,
        "开心 100 a\n开新 50 v\n天气 500 n\n田七 40 n\n事实 300 n\n实施 200 v\n朋友 400 n\n"
    )
    .expect("Failed to write corpus");
    file
}

fn always_typo_config() -> BehaviorConfig {
    let mut config = BehaviorConfig::default();
    config.typo.base_rate = 1.0;
    config.typo.recall_rate = 1.0;
    config
}

fn assert_script_invariants(actions: &[PlaybackAction]) {
    validate_timeline(actions).expect("script violates ordering invariants");
    for pair in actions.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[test]
fn test_short_greeting_is_one_segment() {
    assert_eq!(segment("你好", 50), vec!["你好".to_string()]);
}

#[test]
fn test_long_unpunctuated_text_splits_into_three() {
    let text: String = "我们明天一起去看电影吧".chars().cycle().take(120).collect();
    let parts = segment(&text, 50);

    assert_eq!(parts.len(), 3);
    assert!(parts.iter().all(|p| p.chars().count() <= 50));
    assert_eq!(parts.concat(), text);
}

#[test]
fn test_happy_beats_sad() {
    let hints = EmotionHints::from([("happy", "high"), ("sad", "low")]);
    assert_eq!(EmotionResolver::resolve(&hints), EmotionState::Happy);
}

#[test]
fn test_typo_recall_retype_order() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let config = always_typo_config();
    let mut rng = StdRng::seed_from_u64(2024);

    let actions = coordinator.process("收到礼物了，开心", &EmotionHints::new(), &config, &mut rng);
    assert_script_invariants(&actions);

    let visible: Vec<&PlaybackAction> = actions
        .iter()
        .filter(|a| matches!(a.kind, ActionType::Send | ActionType::Recall))
        .collect();
    assert_eq!(visible.len(), 3);

    assert_eq!(visible[0].kind, ActionType::Send);
    assert!(visible[0].flag(meta::HAS_TYPO));
    assert_ne!(visible[0].text.as_deref(), Some("收到礼物了，开心"));

    assert_eq!(visible[1].kind, ActionType::Recall);
    assert_eq!(visible[1].target_id, visible[0].message_id);

    assert_eq!(visible[2].kind, ActionType::Send);
    assert_eq!(visible[2].text.as_deref(), Some("收到礼物了，开心"));
    assert!(visible[2].flag(meta::IS_CORRECTION));
}

#[test]
fn test_zero_rate_never_corrupts() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let mut config = always_typo_config();
    config.typo.base_rate = 0.0;
    let hints = EmotionHints::from([("angry", "extreme")]);

    for seed in 0..100 {
        let mut rng = StdRng::seed_from_u64(seed);
        let actions = coordinator.process(
            "今天天气真的很好，这就是事实，我很开心见到老朋友",
            &hints,
            &config,
            &mut rng,
        );
        assert!(actions.iter().all(|a| !a.flag(meta::HAS_TYPO)));
        assert!(actions.iter().all(|a| a.kind != ActionType::Recall));
    }
}

#[test]
fn test_missing_corpus_degrades_quietly() {
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path("/no/such/dict.txt"));
    let config = always_typo_config();
    let mut rng = StdRng::seed_from_u64(1);

    let actions = coordinator.process("我今天真的很开心", &EmotionHints::new(), &config, &mut rng);
    assert!(!actions.is_empty());
    assert!(coordinator.index().get().is_empty());
    assert!(actions.iter().all(|a| !a.flag(meta::HAS_TYPO)));
}

#[test]
fn test_scripts_hold_invariants_across_seeds() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let mut config = BehaviorConfig::default();
    config.typo.base_rate = 0.6;
    config.timeline.hesitation_probability = 0.5;
    config.sticker.send_probability = 0.5;

    let replies = [
        "今天天气真的很好！我们去公园散步吧，顺便买点吃的。",
        "Honestly I think that is a fact, but let me check again before we decide anything.",
        "嗯",
        "这就是事实；实施起来没那么难。你觉得呢？要不要一起试试看，反正周末也没什么事情做，对吧",
    ];
    let emotions = [("excited", "high"), ("sad", "medium"), ("confused", "low")];

    for seed in 0..60 {
        let mut rng = StdRng::seed_from_u64(seed);
        for reply in replies {
            for (label, intensity) in emotions {
                let request = BehaviorRequest::new(reply)
                    .with_hints(EmotionHints::from([(label, intensity)]))
                    .with_sticker(StickerSuggestion::new("nod", 0.9, Sentiment::Positive));
                let actions = coordinator.process_request(&request, &config, &mut rng);

                assert!(!actions.is_empty());
                assert_script_invariants(&actions);
                for action in actions.iter().filter(|a| a.flag(meta::HAS_TYPO)) {
                    assert_ne!(action.text.as_deref(), Some(reply));
                }
            }
        }
    }
}

#[test]
fn test_seeded_processing_is_reproducible() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let config = always_typo_config();
    let hints = EmotionHints::from([("playful", "medium")]);
    let text = "今天天气不错，我很开心。你呢？";

    let first = coordinator.process(text, &hints, &config, &mut StdRng::seed_from_u64(77));
    let second = coordinator.process(text, &hints, &config, &mut StdRng::seed_from_u64(77));
    assert_eq!(first, second);
}

#[test]
fn test_transcript_shows_recall() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let config = always_typo_config();
    let mut rng = StdRng::seed_from_u64(9);

    let actions = coordinator.process("收到礼物了，开心", &EmotionHints::new(), &config, &mut rng);
    let entries = transcript::render(&actions);

    assert_eq!(entries.len(), 3);
    assert!(entries[0].content.starts_with("[typo] "));
    assert_eq!(entries[1].role, TranscriptRole::System);
    assert_eq!(entries[2].content, "[correction] 收到礼物了，开心");
}

#[test]
fn test_flat_persona_row_drives_engine() {
    let row = serde_json::json!({
        "segmenter_max_length": 10,
        "timeline_hesitation_probability": 0.0,
        "typo_enable": false,
        "sticker_packs": ["cats"],
    });
    let row = row.as_object().expect("row is an object");
    let config = flat::from_flat(row.iter()).expect("valid flat config");

    let coordinator = BehaviorCoordinator::default();
    let mut rng = StdRng::seed_from_u64(3);
    let actions = coordinator.process(
        "第一句话说完了。第二句话也说完了。",
        &EmotionHints::new(),
        &config,
        &mut rng,
    );

    let sends: Vec<&str> = actions
        .iter()
        .filter(|a| a.kind == ActionType::Send)
        .filter_map(|a| a.text.as_deref())
        .collect();
    assert_eq!(sends, vec!["第一句话说完了。", "第二句话也说完了。"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_index_built_once_under_concurrency() {
    let corpus = corpus_file();
    let handle = IndexHandle::from_path(corpus.path());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let handle = handle.clone();
        tasks.push(tokio::task::spawn_blocking(move || handle.get()));
    }

    let mut indexes = Vec::new();
    for task in tasks {
        indexes.push(task.await.expect("task panicked"));
    }

    let first = &indexes[0];
    assert_eq!(first.word_count(), 7);
    assert!(indexes.iter().all(|index| Arc::ptr_eq(index, first)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_independent() {
    let corpus = corpus_file();
    let coordinator = BehaviorCoordinator::new(IndexHandle::from_path(corpus.path()));
    let config = Arc::new(always_typo_config());
    let text = "这就是事实，今天天气也很好";

    let serial: Vec<Vec<PlaybackAction>> = (0..8)
        .map(|seed| {
            coordinator.process(
                text,
                &EmotionHints::new(),
                &config,
                &mut StdRng::seed_from_u64(seed),
            )
        })
        .collect();

    let mut tasks = Vec::new();
    for seed in 0..8 {
        let coordinator = coordinator.clone();
        let config = Arc::clone(&config);
        tasks.push(tokio::task::spawn_blocking(move || {
            coordinator.process(
                text,
                &EmotionHints::new(),
                &config,
                &mut StdRng::seed_from_u64(seed),
            )
        }));
    }

    for (seed, task) in tasks.into_iter().enumerate() {
        let actions = task.await.expect("task panicked");
        assert_eq!(actions, serial[seed]);
    }
}
