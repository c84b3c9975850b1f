//! Extractive summarization
//!
//! Scores sentences by the frequency of their content words and keeps the
//! highest-scoring ones, in their original order.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Service trait for text summarization
pub trait Summarizer: Send + Sync {
    /// Returns a summary of `text`; empty when there is nothing to summarize
    fn summarize(&self, text: &str) -> String;
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "said", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Word-frequency extractive summarizer
pub struct FrequencySummarizer {
    num_sentences: usize,
    stop_words: HashSet<&'static str>,
    url: Regex,
    pic_link: Regex,
}

impl FrequencySummarizer {
    /// Creates a summarizer keeping at most `num_sentences` sentences
    pub fn new(num_sentences: usize) -> Result<Self> {
        Ok(Self {
            num_sentences,
            stop_words: STOP_WORDS.iter().copied().collect(),
            url: Regex::new(r"https?://\S+").context("Failed to compile URL pattern")?,
            pic_link: Regex::new(r"pic\.twitter\.com/[a-zA-Z0-9]+")
                .context("Failed to compile pic link pattern")?,
        })
    }

    /// Strips links, quotes and non-ASCII characters, collapsing whitespace
    fn clean(&self, text: &str) -> String {
        let text = self.url.replace_all(text, "");
        let text = self.pic_link.replace_all(&text, "");
        let text: String = text
            .chars()
            .filter(|c| c.is_ascii() && *c != '"' && *c != '\'')
            .collect();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn words(sentence: &str) -> impl Iterator<Item = String> + '_ {
        sentence
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_ascii_lowercase())
    }
}

impl Summarizer for FrequencySummarizer {
    fn summarize(&self, text: &str) -> String {
        let cleaned = self.clean(text);
        let sentences = split_sentences(&cleaned);
        if sentences.is_empty() {
            return String::new();
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for word in Self::words(&cleaned) {
            if !self.stop_words.contains(word.as_str()) {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(idx, sentence)| {
                let unique: HashSet<String> = Self::words(sentence).collect();
                let score = unique.iter().filter_map(|w| freq.get(w)).sum();
                (idx, score)
            })
            .filter(|(_, score)| *score > 0)
            .collect();

        // Highest score first; earlier sentence wins ties
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.num_sentences);
        scored.sort_by_key(|(idx, _)| *idx);

        scored
            .into_iter()
            .map(|(idx, _)| sentences[idx])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Splits on `.`, `!` or `?` followed by whitespace or end of text
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (idx, &b) in bytes.iter().enumerate() {
        let terminal = matches!(b, b'.' | b'!' | b'?');
        let boundary = idx + 1 == bytes.len() || bytes[idx + 1].is_ascii_whitespace();
        if terminal && boundary {
            let sentence = text[start..=idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = idx + 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}
