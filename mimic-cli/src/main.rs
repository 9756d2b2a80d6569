//! Mimic CLI - play back replies the way a persona would type them

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mimic_core::config::flat;
use mimic_core::prelude::*;
use mimic_core::{segmenter, transcript};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Parser)]
#[command(name = "mimic")]
#[command(about = "Human-like message behavior engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Behavior config file (TOML, JSON or YAML); defaults to mimic.toml + MIMIC_* env
    #[arg(short, long, global = true, env = "MIMIC_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the playback script for a reply
    Play {
        #[arg(short, long)]
        text: String,
        /// Emotion hint as label=intensity, repeatable and ordered
        #[arg(short, long = "emotion", value_parser = parse_hint)]
        emotions: Vec<(String, String)>,
        /// Seed for a reproducible script
        #[arg(short, long)]
        seed: Option<u64>,
        /// Word/frequency dictionary for typo candidates
        #[arg(long, env = "MIMIC_CORPUS")]
        corpus: Option<PathBuf>,
        /// Sticker to follow the reply with
        #[arg(long)]
        sticker: Option<String>,
        /// Print the history transcript instead of the raw actions
        #[arg(long)]
        transcript: bool,
    },
    /// Split text into segments, one per line
    Segment {
        #[arg(short, long)]
        text: String,
        #[arg(short, long)]
        max_length: Option<usize>,
    },
    /// Run one typo-injection attempt
    Typo {
        #[arg(short, long)]
        text: String,
        #[arg(short, long, default_value_t = 1.0)]
        rate: f64,
        #[arg(short, long)]
        seed: Option<u64>,
        #[arg(long, env = "MIMIC_CORPUS")]
        corpus: PathBuf,
    },
    /// Print the effective configuration as flat persona keys
    Config,
    /// Version information
    Version,
}

fn parse_hint(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((label, intensity)) if !label.trim().is_empty() => {
            Ok((label.trim().to_string(), intensity.trim().to_string()))
        }
        _ => Err(format!("expected label=intensity, got '{}'", raw)),
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BehaviorConfig> {
    let config = match path {
        Some(path) => BehaviorConfig::from_file(path)?,
        None => BehaviorConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("mimic {}", env!("CARGO_PKG_VERSION"));
            println!("mimic-core {}", mimic_core::VERSION);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&flat::to_flat(&config)?)?);
        }
        Commands::Segment { text, max_length } => {
            let config = load_config(cli.config.as_ref())?;
            let max_length = max_length.unwrap_or(config.segmenter.max_length);
            if max_length == 0 {
                bail!("--max-length must be at least 1");
            }
            for part in segmenter::segment(&text, max_length) {
                println!("{}", part);
            }
        }
        Commands::Typo {
            text,
            rate,
            seed,
            corpus,
        } => {
            let index = PronunciationIndex::from_dict_file(&corpus)
                .with_context(|| format!("loading corpus {}", corpus.display()))?;
            let config = load_config(cli.config.as_ref())?;
            let injector = TypoInjector::new(&index).with_thresholds(config.typo.thresholds());
            let outcome = injector.inject_typo(&text, rate, &mut rng_for(seed));
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Play {
            text,
            emotions,
            seed,
            corpus,
            sticker,
            transcript: as_transcript,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let index = corpus.map(IndexHandle::from_path).unwrap_or_default();
            let coordinator = BehaviorCoordinator::new(index);

            let mut request =
                BehaviorRequest::new(text).with_hints(emotions.into_iter().collect());
            if let Some(id) = sticker {
                request = request.with_sticker(StickerSuggestion::new(id, 1.0, Sentiment::Neutral));
            }

            let actions = tokio::task::spawn_blocking(move || {
                coordinator.process_request(&request, &config, &mut rng_for(seed))
            })
            .await
            .context("behavior task failed")?;

            tracing::info!(actions = actions.len(), "Playback script ready");
            if as_transcript {
                println!("{}", serde_json::to_string_pretty(&transcript::render(&actions))?);
            } else {
                println!("{}", serde_json::to_string_pretty(&actions)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hint() {
        assert_eq!(
            parse_hint("happy=high").unwrap(),
            ("happy".to_string(), "high".to_string())
        );
        assert_eq!(
            parse_hint(" sad = low ").unwrap(),
            ("sad".to_string(), "low".to_string())
        );
        assert!(parse_hint("happy").is_err());
        assert!(parse_hint("=high").is_err());
    }

    #[test]
    fn test_cli_parses_play() {
        let cli = Cli::try_parse_from([
            "mimic", "play", "--text", "你好", "-e", "happy=high", "-e", "sad=low", "--seed", "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Play { emotions, seed, .. } => {
                assert_eq!(emotions.len(), 2);
                assert_eq!(seed, Some(4));
            }
            _ => panic!("expected play"),
        }
    }
}
