//! Typed access to loosely structured upstream records.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::normalize::{TextNormalizer, split_text};

/// Structured packaging entries, e.g. `["en:plastic-bottle", "en:1l"]`.
pub const PACKAGING_LIST_KEY: &str = "packaging_tags";

/// Free-text packaging fields, in order of preference.
const PACKAGING_TEXT_KEYS: &[&str] = &["packaging", "packaging_text_en", "packaging_text"];
const PACKAGING_TEXT_PREFIX: &str = "packaging_text_";

/// Separators accepted in free-text lists.
const TEXT_LIST_SEPARATORS: &[char] = &[';', ','];

/// One product as returned by the search API.
///
/// Nothing about the payload is trusted: every accessor returns `None` when
/// the field is missing, null or of the wrong type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        RawRecord(value)
    }
}

impl RawRecord {
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key).filter(|v| !v.is_null())
    }

    /// A string field with at least one non-whitespace character.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key)?.as_str().filter(|s| !s.trim().is_empty())
    }

    pub fn list_field(&self, key: &str) -> Option<&[Value]> {
        self.field(key)?.as_array().map(Vec::as_slice)
    }

    pub fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.field(key)?.as_object()
    }

    /// Keys starting with `prefix`, in key order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.as_object()
            .into_iter()
            .flat_map(|map| map.keys())
            .map(String::as_str)
            .filter(move |key| key.starts_with(prefix))
    }
}

/// Packaging description with the default normalizer.
pub fn get_packaging(record: &RawRecord) -> Option<String> {
    packaging(&TextNormalizer::default(), record)
}

/// Structured packaging entries joined with `", "`, falling back to free text.
pub fn packaging(normalizer: &TextNormalizer, record: &RawRecord) -> Option<String> {
    if let Some(entries) = record.list_field(PACKAGING_LIST_KEY) {
        let labels = tag_labels(normalizer, entries);
        if !labels.is_empty() {
            return Some(labels.join(", "));
        }
    }

    let extra_keys = record
        .keys_with_prefix(PACKAGING_TEXT_PREFIX)
        .filter(|key| !PACKAGING_TEXT_KEYS.contains(key));

    PACKAGING_TEXT_KEYS
        .iter()
        .copied()
        .chain(extra_keys)
        .find_map(|key| record.str_field(key))
        .and_then(|text| normalizer.normalize(Some(text)))
}

/// Entity names from `list_key` if it yields any, otherwise from the
/// `;`/`,`-separated text at `text_key`. Names are normalized and
/// de-duplicated in first-seen order.
pub fn list_or_text(
    normalizer: &TextNormalizer,
    record: &RawRecord,
    list_key: &str,
    text_key: &str,
) -> Vec<String> {
    if let Some(entries) = record.list_field(list_key) {
        let labels = tag_labels(normalizer, entries);
        if !labels.is_empty() {
            return labels;
        }
    }

    let Some(text) = record.str_field(text_key) else {
        return Vec::new();
    };
    dedup(
        text.split(TEXT_LIST_SEPARATORS)
            .filter_map(|token| normalizer.normalize(Some(strip_language_prefix(token)))),
    )
}

/// `en:wheat-flour` → `Wheat Flour`.
pub fn tag_label(normalizer: &TextNormalizer, tag: &str) -> Option<String> {
    let label = split_text(Some(tag), ":", -1)?.replace('-', " ");
    normalizer.normalize(Some(&label))
}

fn tag_labels(normalizer: &TextNormalizer, entries: &[Value]) -> Vec<String> {
    dedup(
        entries
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|tag| tag_label(normalizer, tag)),
    )
}

fn strip_language_prefix(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(':') {
        Some((lang, rest)) if lang.len() == 2 && lang.bytes().all(|b| b.is_ascii_lowercase()) => rest,
        _ => token,
    }
}

/// Drops repeats, keeping first-seen order.
pub(crate) fn dedup(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.filter(|name| seen.insert(name.clone())).collect()
}
