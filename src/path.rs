//! Dot-path parsing and resolution against JSON values (spec.md §4.1).

use serde::Serialize;
use serde_json::Value;

/// One step of a [`FieldPath`]: either a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed, validated dot-path (spec.md §3).
///
/// Invariants enforced at construction: no empty segment, at most 10
/// segments, source length at most 256 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    source: String,
    segments: Vec<Segment>,
}

pub const MAX_SEGMENTS: usize = 10;
pub const MAX_SOURCE_LEN: usize = 256;

static NULL: Value = Value::Null;

impl FieldPath {
    /// Parses a dotted path string, e.g. `"object.title"` or `"items.0.id"`.
    pub fn parse(source: &str) -> Result<Self, String> {
        if source.is_empty() {
            return Err("field path must not be empty".to_string());
        }
        if source.len() > MAX_SOURCE_LEN {
            return Err(format!(
                "field path length {} exceeds the {} character limit",
                source.len(),
                MAX_SOURCE_LEN
            ));
        }

        let mut segments = Vec::new();
        for raw in source.split('.') {
            if raw.is_empty() {
                return Err(format!("field path `{source}` contains an empty segment"));
            }
            segments.push(match raw.parse::<usize>() {
                Ok(index) if is_plain_decimal(raw) => Segment::Index(index),
                _ => Segment::Key(raw.to_string()),
            });
        }

        if segments.len() > MAX_SEGMENTS {
            return Err(format!(
                "field path `{source}` has {} segments, exceeds the {} segment limit",
                segments.len(),
                MAX_SEGMENTS
            ));
        }

        Ok(FieldPath {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Resolves this path against `root`, returning `(true, value)` on
    /// success or `(false, &Value::Null)` if any segment fails to resolve.
    ///
    /// Integer-looking segments are tried as a sequence index first; if the
    /// current node is a mapping instead, the same segment is matched as a
    /// string key (spec.md §4.1: "index-first for sequences, key-second for
    /// mappings").
    pub fn resolve<'v>(&self, root: &'v Value) -> (bool, &'v Value) {
        let mut current = root;
        for segment in &self.segments {
            match (segment, current) {
                (Segment::Index(i), Value::Array(items)) => match items.get(*i) {
                    Some(next) => current = next,
                    None => return (false, &NULL),
                },
                (Segment::Index(i), Value::Object(map)) => match map.get(&i.to_string()) {
                    Some(next) => current = next,
                    None => return (false, &NULL),
                },
                (Segment::Key(key), Value::Object(map)) => match map.get(key) {
                    Some(next) => current = next,
                    None => return (false, &NULL),
                },
                _ => return (false, &NULL),
            }
        }
        (true, current)
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

/// True if `s` is a non-negative base-10 integer with no leading `+`/`-`
/// and no extraneous characters (so `"007"` and `"1e3"` are keys, not
/// indices, while `"0"` and `"42"` are indices).
fn is_plain_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_keys_and_indices() {
        let path = FieldPath::parse("items.0.id").unwrap();
        assert_eq!(
            path.segments,
            vec![
                Segment::Key("items".into()),
                Segment::Index(0),
                Segment::Key("id".into()),
            ]
        );
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("").is_err());
    }

    #[test]
    fn rejects_too_many_segments() {
        let source = (0..11).map(|_| "a").collect::<Vec<_>>().join(".");
        assert!(FieldPath::parse(&source).is_err());
    }

    #[test]
    fn rejects_source_too_long() {
        let source = "a".repeat(MAX_SOURCE_LEN + 1);
        assert!(FieldPath::parse(&source).is_err());
    }

    #[test]
    fn resolves_nested_object_and_array() {
        let body = json!({"object": {"title": "alert"}, "tags": ["a", "b"]});
        let (found, value) = FieldPath::parse("object.title").unwrap().resolve(&body);
        assert!(found);
        assert_eq!(value, "alert");

        let (found, value) = FieldPath::parse("tags.1").unwrap().resolve(&body);
        assert!(found);
        assert_eq!(value, "b");
    }

    #[test]
    fn missing_path_is_not_found() {
        let body = json!({"object": {"title": "alert"}});
        let (found, value) = FieldPath::parse("object.missing").unwrap().resolve(&body);
        assert!(!found);
        assert_eq!(value, &Value::Null);
    }

    #[test]
    fn index_segment_against_mapping_is_key_second() {
        let body = json!({"0": "zero-as-key"});
        let (found, value) = FieldPath::parse("0").unwrap().resolve(&body);
        assert!(found);
        assert_eq!(value, "zero-as-key");
    }

    #[test]
    fn out_of_range_index_not_found() {
        let body = json!({"tags": ["a"]});
        let (found, _) = FieldPath::parse("tags.5").unwrap().resolve(&body);
        assert!(!found);
    }
}
