//! Same-pronunciation lookup built from a word/frequency corpus
//!
//! The index maps a tone-less pinyin key to every corpus word (and, for the
//! most frequent ideographs, every single character) that reads the same,
//! ranked by descending frequency. Equal frequencies keep corpus order.
//!
//! Building is paid once. Hosts share the result through an [`IndexHandle`],
//! which builds lazily on first use and at most once across threads.

use once_cell::sync::OnceCell;
use pinyin::ToPinyin;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{MimicError, Result};

/// Only the most frequent ideographs take part in character substitution.
pub const TOP_CHAR_LIMIT: usize = 3500;

/// Whether `ch` is a CJK unified ideograph (U+4E00..=U+9FFF).
pub fn is_ideograph(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// Whether `text` contains at least one ideograph.
pub fn contains_ideograph(text: &str) -> bool {
    text.chars().any(is_ideograph)
}

/// Concatenated tone-less reading of every character with a pinyin reading.
/// Characters without one are skipped, so non-Chinese text yields `""`.
pub fn word_pronunciation(text: &str) -> String {
    text.chars()
        .filter_map(|ch| ch.to_pinyin())
        .map(|reading| reading.plain())
        .collect()
}

/// Frequency-ranked pronunciation lookup.
#[derive(Debug, Default)]
pub struct PronunciationIndex {
    word_freq: HashMap<String, u64>,
    words_by_key: HashMap<String, Vec<String>>,
    char_freq: HashMap<char, u64>,
    chars_by_key: HashMap<String, Vec<char>>,
}

impl PronunciationIndex {
    /// Build from `(word, frequency)` pairs. A repeated word keeps its first
    /// position and its last frequency.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut word_freq: HashMap<String, u64> = HashMap::new();
        for (word, freq) in entries {
            let word = word.into();
            if word.is_empty() {
                continue;
            }
            if word_freq.insert(word.clone(), freq).is_none() {
                order.push(word);
            }
        }

        let mut words_by_key: HashMap<String, Vec<String>> = HashMap::new();
        for word in &order {
            let key = word_pronunciation(word);
            if key.is_empty() {
                continue;
            }
            words_by_key.entry(key).or_default().push(word.clone());
        }
        for words in words_by_key.values_mut() {
            words.sort_by(|a, b| frequency(&word_freq, b, 1).cmp(&frequency(&word_freq, a, 1)));
        }

        // Character counts, first-seen order kept for stable ranking.
        let mut char_order: Vec<char> = Vec::new();
        let mut char_freq: HashMap<char, u64> = HashMap::new();
        for word in &order {
            let weight = word_freq.get(word).copied().unwrap_or(1).max(1);
            for ch in word.chars().filter(|c| is_ideograph(*c)) {
                let count = char_freq.entry(ch).or_insert_with(|| {
                    char_order.push(ch);
                    0
                });
                *count += weight;
            }
        }

        let mut ranked = char_order.clone();
        ranked.sort_by(|a, b| char_freq[b].cmp(&char_freq[a]));
        ranked.truncate(TOP_CHAR_LIMIT);

        let mut chars_by_key: HashMap<String, Vec<char>> = HashMap::new();
        for ch in ranked {
            let key = word_pronunciation(ch.encode_utf8(&mut [0u8; 4]));
            if key.is_empty() {
                continue;
            }
            chars_by_key.entry(key).or_default().push(ch);
        }

        Self {
            word_freq,
            words_by_key,
            char_freq,
            chars_by_key,
        }
    }

    /// Parse a jieba-style dictionary (`word [freq] [tag]` per line).
    ///
    /// Blank lines and `#` comments are skipped; a missing or unparsable
    /// frequency counts as 1.
    pub fn from_dict_str(source: &str) -> Self {
        Self::from_entries(source.lines().filter_map(parse_dict_line))
    }

    /// Load a dictionary file.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::Corpus`] if the file cannot be read.
    pub fn from_dict_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            MimicError::Corpus(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_dict_str(&String::from_utf8_lossy(&bytes)))
    }

    /// Load a dictionary file, degrading to an empty index on failure.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_dict_file(path) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Pronunciation corpus unavailable, typo injection disabled"
                );
                Self::default()
            }
        }
    }

    /// Words reading the same as `word`, excluding `word`, most frequent first.
    pub fn word_candidates(&self, word: &str, limit: usize) -> Vec<&str> {
        let key = word_pronunciation(word);
        if key.is_empty() {
            return Vec::new();
        }
        self.words_by_key
            .get(&key)
            .map(|words| {
                words
                    .iter()
                    .filter(|w| w.as_str() != word)
                    .take(limit)
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Frequent ideographs reading the same as `ch`, excluding `ch`.
    pub fn char_candidates(&self, ch: char, limit: usize) -> Vec<char> {
        let key = word_pronunciation(ch.encode_utf8(&mut [0u8; 4]));
        if key.is_empty() {
            return Vec::new();
        }
        self.chars_by_key
            .get(&key)
            .map(|chars| {
                chars
                    .iter()
                    .copied()
                    .filter(|c| *c != ch)
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Corpus count of `word`, 1 when absent
    pub fn word_frequency(&self, word: &str) -> u64 {
        frequency(&self.word_freq, word, 1)
    }

    /// Accumulated count of `ch` across corpus words, 0 when absent
    pub fn char_frequency(&self, ch: char) -> u64 {
        self.char_freq.get(&ch).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.word_freq.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.word_freq.len()
    }

    /// Number of distinct ideographs seen in the corpus
    pub fn char_count(&self) -> usize {
        self.char_freq.len()
    }
}

fn frequency(table: &HashMap<String, u64>, word: &str, default: u64) -> u64 {
    table.get(word).copied().unwrap_or(default)
}

fn parse_dict_line(line: &str) -> Option<(&str, u64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    let word = parts.next()?;
    let freq = parts.next().and_then(|f| f.parse().ok()).unwrap_or(1);
    Some((word, freq))
}

/// Shared, lazily built pronunciation index.
///
/// Clones share one cell: whichever caller asks first builds the index and
/// every other caller (including concurrent ones) waits for that result.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    source: Option<PathBuf>,
    cell: Arc<OnceCell<Arc<PronunciationIndex>>>,
}

impl IndexHandle {
    /// Wrap an index that is already built
    pub fn ready(index: PronunciationIndex) -> Self {
        Self {
            source: None,
            cell: Arc::new(OnceCell::with_value(Arc::new(index))),
        }
    }

    /// Build from a dictionary file on first use; failures yield an empty index
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// A handle with no corpus; typo injection stays disabled
    pub fn empty() -> Self {
        Self::ready(PronunciationIndex::default())
    }

    /// Get the index, building it if this is the first request.
    pub fn get(&self) -> Arc<PronunciationIndex> {
        self.cell
            .get_or_init(|| {
                let index = match &self.source {
                    Some(path) => PronunciationIndex::load_or_empty(path),
                    None => PronunciationIndex::default(),
                };
                tracing::info!(
                    words = index.word_count(),
                    chars = index.char_count(),
                    "Pronunciation index ready"
                );
                Arc::new(index)
            })
            .clone()
    }

    /// Whether the index has been built
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for IndexHandle {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> PronunciationIndex {
        PronunciationIndex::from_entries([
            ("开心", 100),
            ("开新", 50),
            ("凯欣", 80),
            ("事实", 300),
            ("实施", 200),
            ("逝世", 20),
            ("hello", 5),
        ])
    }

    #[test]
    fn test_word_pronunciation_skips_non_chinese() {
        assert_eq!(word_pronunciation("开心"), "kaixin");
        assert_eq!(word_pronunciation("ok开心!"), "kaixin");
        assert_eq!(word_pronunciation("hello"), "");
    }

    #[test]
    fn test_word_candidates_ranked_and_exclusive() {
        let index = sample();
        assert_eq!(index.word_candidates("开心", 30), vec!["凯欣", "开新"]);
        assert_eq!(index.word_candidates("开心", 1), vec!["凯欣"]);
        assert_eq!(index.word_candidates("事实", 30), vec!["实施", "逝世"]);
        assert!(index.word_candidates("hello", 30).is_empty());
        assert!(index.word_candidates("电脑", 30).is_empty());
    }

    #[test]
    fn test_frequency_defaults() {
        let index = sample();
        assert_eq!(index.word_frequency("开心"), 100);
        assert_eq!(index.word_frequency("不存在"), 1);
        assert_eq!(index.char_frequency('心'), 100);
        assert_eq!(index.char_frequency('实'), 500);
        assert_eq!(index.char_frequency('龘'), 0);
    }

    #[test]
    fn test_char_candidates() {
        let index = sample();
        // 新 (50) and 欣 (80) both read "xin"
        assert_eq!(index.char_candidates('心', 10), vec!['欣', '新']);
        assert!(index.char_candidates('a', 10).is_empty());
    }

    #[test]
    fn test_char_limit_caps_candidates() {
        let entries: Vec<(String, u64)> = ('\u{4e00}'..='\u{9fff}')
            .take(TOP_CHAR_LIMIT + 500)
            .enumerate()
            .map(|(i, ch)| (ch.to_string(), (i + 1) as u64))
            .collect();
        let index = PronunciationIndex::from_entries(entries);

        let indexed: usize = index.chars_by_key.values().map(Vec::len).sum();
        assert!(indexed <= TOP_CHAR_LIMIT);
        assert_eq!(index.char_count(), TOP_CHAR_LIMIT + 500);
    }

    #[test]
    fn test_dict_parsing() {
        let index = PronunciationIndex::from_dict_str(
            "# comment\n开心 100 a\n\n开新 oops\n凯欣\n",
        );
        assert_eq!(index.word_count(), 3);
        assert_eq!(index.word_frequency("开新"), 1);
        assert_eq!(index.word_frequency("开心"), 100);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        assert!(matches!(
            PronunciationIndex::from_dict_file("/no/such/dict.txt"),
            Err(MimicError::Corpus(_))
        ));

        let index = PronunciationIndex::load_or_empty("/no/such/dict.txt");
        assert!(index.is_empty());
        assert!(index.word_candidates("开心", 30).is_empty());
    }

    #[test]
    fn test_handle_builds_once_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "开心 100\n开新 50").unwrap();

        let handle = IndexHandle::from_path(file.path());
        assert!(!handle.is_loaded());

        let first = handle.get();
        let second = handle.clone().get();
        assert!(handle.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.word_count(), 2);
    }

    #[test]
    fn test_empty_handle() {
        let handle = IndexHandle::empty();
        assert!(handle.is_loaded());
        assert!(handle.get().is_empty());
    }
}
