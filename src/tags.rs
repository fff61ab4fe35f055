//! Tag input decoding and normalization.
//!
//! Clients send tags either as one comma-separated string or as an array of
//! strings. Both shapes are decoded into [`TagInput`] at the JSON boundary and
//! reduced by [`normalize`] into a [`TagSet`]; nothing past this module ever
//! looks at the raw shape again.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

const DELIMITER: char = ',';
const TAGS_SHAPE_MESSAGE: &str = "Tags must be an array or a comma-separated string";
const EMPTY_TAGS_MESSAGE: &str = "At least one valid tag is required";

/// Raw tag input as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub enum TagInput {
    Delimited(String),
    Sequence(Vec<String>),
}

impl TryFrom<Value> for TagInput {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(raw) => Ok(Self::Delimited(raw)),
            // An explicit null is an empty list, which normalization rejects.
            Value::Null => Ok(Self::Sequence(Vec::new())),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(tag) => Ok(tag),
                    _ => Err(TAGS_SHAPE_MESSAGE.to_string()),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Self::Sequence),
            _ => Err(TAGS_SHAPE_MESSAGE.to_string()),
        }
    }
}

impl From<&str> for TagInput {
    fn from(raw: &str) -> Self {
        Self::Delimited(raw.to_string())
    }
}

impl From<Vec<&str>> for TagInput {
    fn from(items: Vec<&str>) -> Self {
        Self::Sequence(items.into_iter().map(str::to_string).collect())
    }
}

/// A non-empty set of lowercase, trimmed, comma-free tags.
///
/// Elements keep the position of their first occurrence in the input, which
/// only matters for display. Construct one through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Serializes the set back into the delimited form clients may send.
    pub fn to_delimited(&self) -> String {
        self.0.join(",")
    }
}

/// Reduces raw input to its canonical tag set.
///
/// Every candidate is split on commas (sequence items included), trimmed and
/// lowercased; empties are dropped and duplicates collapse. Fails when
/// nothing survives.
pub fn normalize(input: &TagInput) -> Result<TagSet> {
    let candidates: Vec<&str> = match input {
        TagInput::Delimited(raw) => raw.split(DELIMITER).collect(),
        TagInput::Sequence(items) => items
            .iter()
            .flat_map(|item| item.split(DELIMITER))
            .collect(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let tag = candidate.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    if tags.is_empty() {
        return Err(AppError::Validation(EMPTY_TAGS_MESSAGE.to_string()));
    }

    Ok(TagSet(tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(input: impl Into<TagInput>) -> TagSet {
        normalize(&input.into()).unwrap()
    }

    #[test]
    fn trims_lowercases_and_dedupes() {
        let tags = normalized("Work, work, URGENT ");

        assert_eq!(tags.len(), 2);
        assert!(tags.contains("work"));
        assert!(tags.contains("urgent"));
    }

    #[test]
    fn keeps_first_seen_position() {
        let tags = normalized(vec!["Beta", "alpha", "BETA"]);
        assert_eq!(tags.as_slice(), &["beta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn empty_string_is_rejected() {
        let err = normalize(&TagInput::from("")).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == EMPTY_TAGS_MESSAGE));
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let err = normalize(&TagInput::Sequence(Vec::new())).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn only_separators_and_whitespace_is_rejected() {
        assert!(normalize(&TagInput::from(" , ,,  ")).is_err());
        assert!(normalize(&TagInput::from(vec!["   ", ""])).is_err());
    }

    #[test]
    fn sequence_items_never_keep_commas() {
        let tags = normalized(vec!["a,b", "c"]);
        assert_eq!(tags.to_delimited(), "a,b,c");
        assert!(tags.iter().all(|t| !t.contains(',')));
    }

    #[test]
    fn unicode_is_lowercased() {
        let tags = normalized("ÉTÉ, Straße");
        assert!(tags.contains("été"));
        assert!(tags.contains("straße"));
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let inputs: Vec<TagInput> = vec![
            "Work, work, URGENT ".into(),
            " a ,,B,b, c".into(),
            vec!["Rust", " rust ", "Async,IO"].into(),
            vec!["ümlaut", "ÜMLAUT"].into(),
        ];

        for input in inputs {
            let once = normalize(&input).unwrap();
            let twice = normalize(&TagInput::Delimited(once.to_delimited())).unwrap();
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn decodes_both_json_shapes() {
        let from_string: TagInput = serde_json::from_str(r#""a, b""#).unwrap();
        assert_eq!(from_string, TagInput::Delimited("a, b".to_string()));

        let from_array: TagInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(from_array, TagInput::from(vec!["a", "b"]));
    }

    #[test]
    fn null_decodes_to_an_empty_sequence() {
        let input: TagInput = serde_json::from_str("null").unwrap();
        assert_eq!(input, TagInput::Sequence(Vec::new()));
    }

    #[test]
    fn rejects_other_json_shapes() {
        for raw in ["42", "true", r#"{"a": 1}"#, r#"["a", 1]"#] {
            let err = serde_json::from_str::<TagInput>(raw).unwrap_err();
            assert!(
                err.to_string().contains(TAGS_SHAPE_MESSAGE),
                "unexpected error for {raw}: {err}"
            );
        }
    }
}
