//! Term extraction shared by indexing and querying.

use regex::Regex;
use std::sync::OnceLock;

/// Tokens shorter than this are discarded
pub const MIN_TOKEN_CHARS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "the", "to", "with",
];

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("static regex"))
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Strip punctuation and split into words, keeping case.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    punctuation()
        .replace_all(text, " ")
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|w| !is_stop_word(&w.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Lowercased words without stop words.
#[must_use]
pub fn query_terms(text: &str) -> Vec<String> {
    words(text).into_iter().map(|w| w.to_lowercase()).collect()
}

/// Index terms: lowercased words plus adjacent-word bigrams.
#[must_use]
pub fn index_terms(text: &str) -> Vec<String> {
    let unigrams = query_terms(text);
    let bigrams: Vec<String> = unigrams
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect();
    let mut terms = unigrams;
    terms.extend(bigrams);
    terms
}
