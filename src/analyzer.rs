//! Word-frequency analysis over translated titles.
//!
//! Counting is global across every input text, so the result does not depend
//! on how the texts are ordered or grouped into sessions.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const MIN_WORD_LENGTH: usize = 3;

static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z]+").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "shall", "it", "its",
        "this", "that", "these", "those", "i", "you", "he", "she", "we", "they", "my", "your",
        "his", "her", "our", "their", "as", "not", "no", "so", "if", "than", "then", "about",
        "into", "up", "out", "more", "also", "just", "can", "which", "who", "what", "how",
        "when", "where", "why",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Words counted strictly more than `threshold` times, count descending then
/// word ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyReport {
    pub threshold: usize,
    pub words: Vec<WordCount>,
}

impl FrequencyReport {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn count_of(&self, word: &str) -> Option<usize> {
        self.words.iter().find(|w| w.word == word).map(|w| w.count)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WordFrequencyAnalyzer {
    threshold: usize,
}

impl WordFrequencyAnalyzer {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn analyze<S: AsRef<str>>(&self, texts: &[S]) -> FrequencyReport {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for token in tokenize(text.as_ref()) {
                *counts.entry(token).or_default() += 1;
            }
        }

        let words = counts
            .into_iter()
            .filter(|(_, count)| *count > self.threshold)
            .map(|(word, count)| WordCount { word, count })
            .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)))
            .collect();

        FrequencyReport {
            threshold: self.threshold,
            words,
        }
    }
}

/// Lower-case, split on runs of anything outside `a-z`, drop short tokens and
/// stop-words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_ALPHA
        .split(&lowered)
        .filter(|t| t.len() >= MIN_WORD_LENGTH && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let analyzer = WordFrequencyAnalyzer::new(2);
        let three = ["Crisis Europa", "Crisis Europa", "Crisis Europa"];
        let report = analyzer.analyze(&three);
        assert_eq!(report.count_of("crisis"), Some(3));
        assert_eq!(report.count_of("europa"), Some(3));

        let two = ["Crisis Europa", "Crisis Europa"];
        assert!(analyzer.analyze(&two).is_empty());
    }

    #[test]
    fn test_stop_words_and_short_tokens_never_reported() {
        let analyzer = WordFrequencyAnalyzer::new(0);
        assert!(analyzer.analyze(&["it it it it it"]).is_empty());
        assert!(analyzer.analyze(&["the the the of of an an"]).is_empty());
        assert!(analyzer.analyze(&["ai ai ai eu eu"]).is_empty());
    }

    #[test]
    fn test_order_insensitive() {
        let analyzer = WordFrequencyAnalyzer::new(1);
        let texts = vec![
            "Political crisis in Europe and the political fallout",
            "The future of artificial intelligence and democracy",
            "Democracy under pressure in Europe",
            "Europe and the future of political reform",
        ];
        let mut reversed = texts.clone();
        reversed.reverse();
        assert_eq!(analyzer.analyze(&texts), analyzer.analyze(&reversed));
    }

    #[test]
    fn test_repeated_runs_serialize_identically() {
        let analyzer = WordFrequencyAnalyzer::new(1);
        let texts = ["War and peace", "Peace talks, war games", "peace!"];
        let a = serde_json::to_string(&analyzer.analyze(&texts)).unwrap();
        let b = serde_json::to_string(&analyzer.analyze(&texts)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_order_count_desc_then_word_asc() {
        let analyzer = WordFrequencyAnalyzer::new(1);
        let report = analyzer.analyze(&[
            "Political crisis in Europe and the political fallout",
            "The future of artificial intelligence and democracy",
            "Democracy under pressure in Europe",
            "Europe and the future of political reform",
            "Artificial intelligence reshapes democracy and political systems",
        ]);
        let words: Vec<(&str, usize)> =
            report.words.iter().map(|w| (w.word.as_str(), w.count)).collect();
        assert_eq!(
            words,
            vec![
                ("political", 4),
                ("democracy", 3),
                ("europe", 3),
                ("artificial", 2),
                ("future", 2),
                ("intelligence", 2),
            ]
        );
    }

    #[test]
    fn test_counts_span_all_texts() {
        let analyzer = WordFrequencyAnalyzer::new(2);
        let report = analyzer.analyze(&["Europe", "Europe", "Europe"]);
        assert_eq!(report.count_of("europe"), Some(3));
    }

    #[test]
    fn test_empty_input() {
        let analyzer = WordFrequencyAnalyzer::new(2);
        let empty: [&str; 0] = [];
        let report = analyzer.analyze(&empty);
        assert!(report.is_empty());
        assert_eq!(report.threshold, 2);
    }

    #[test]
    fn test_tokenize_splits_on_non_ascii_letters() {
        assert_eq!(tokenize("Opinión: la crisis"), vec!["opini", "crisis"]);
    }
}
