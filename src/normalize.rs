//! Canonical display strings for free-text product fields.
//!
//! Every function maps absent or blank input to `None` so callers can tell
//! "no data" apart from a real value.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Words kept lowercase inside a title unless they open it.
pub const DEFAULT_CONNECTOR_WORDS: &[&str] = &[
    "a", "an", "and", "at", "de", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// Tokens up to this many characters that are already upper-case pass through.
const ACRONYM_MAX_LEN: usize = 4;

static DEFAULT_NORMALIZER: LazyLock<TextNormalizer> = LazyLock::new(TextNormalizer::default);

#[derive(Debug, Clone)]
pub struct TextNormalizer {
    connector_words: HashSet<String>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTOR_WORDS.iter().copied())
    }
}

impl TextNormalizer {
    pub fn new<I, S>(connector_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let connector_words = connector_words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { connector_words }
    }

    /// Trim, collapse whitespace and title-case word by word.
    ///
    /// Connector words stay lowercase except in first position, and short
    /// all-caps tokens such as `UHT` or `1L` are left alone.
    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let words: Vec<String> = raw?
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                if is_acronym(word) {
                    word.to_string()
                } else if i > 0 && self.connector_words.contains(&word.to_lowercase()) {
                    word.to_lowercase()
                } else {
                    title_word(word)
                }
            })
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

/// [`TextNormalizer::normalize`] with the default connector words.
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    DEFAULT_NORMALIZER.normalize(raw)
}

/// Token `index` of `raw` split on `separator`; negative indices count from the end.
pub fn split_text(raw: Option<&str>, separator: &str, index: isize) -> Option<String> {
    let tokens: Vec<&str> = raw?.split(separator).collect();
    let position = if index < 0 {
        tokens.len().checked_sub(index.unsigned_abs())?
    } else {
        index as usize
    };
    tokens.get(position).map(|t| t.to_string())
}

/// Plain title case: every alphabetic run starts upper-case, no exceptions.
pub fn capitalize_text(raw: Option<&str>) -> Option<String> {
    let collapsed = raw?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(collapsed.len());
    let mut in_word = false;
    for ch in collapsed.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    Some(out)
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() <= ACRONYM_MAX_LEN
        && word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase)
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
