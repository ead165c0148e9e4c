//! Maps an extracted field value to a destination URL (spec.md §4.3).

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::path::FieldPath;

/// `(FieldPath, OrderedList[(string, URL)])` (spec.md §3). Order is YAML
/// source order and is semantically significant: first match wins.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMapping {
    pub field: FieldPath,
    pub entries: Vec<(String, Url)>,
}

/// Diagnostic surfaced on both match and no-match (spec.md §4.3, §4.6).
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDiagnostic {
    pub field: String,
    pub routing_value: Option<Value>,
    pub rules_checked: usize,
}

/// Renders a resolved JSON scalar to its routing lookup key: strings are
/// used verbatim, numbers and booleans in their canonical JSON lexical form
/// (spec.md §4.3).
fn as_lookup_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `select(body, route_mappings) -> (matched, url, diagnostic)`.
///
/// Only the first route mapping in the configuration is consulted; this is
/// the documented behavior, not an oversight (spec.md §4.3).
pub fn select(body: &Value, route_mappings: &[RouteMapping]) -> (bool, Option<Url>, RoutingDiagnostic) {
    let Some(mapping) = route_mappings.first() else {
        return (
            false,
            None,
            RoutingDiagnostic {
                field: String::new(),
                routing_value: None,
                rules_checked: 0,
            },
        );
    };

    let (found, resolved) = mapping.field.resolve(body);
    let routing_value = if found { Some(resolved.clone()) } else { None };
    let rules_checked = mapping.entries.len();

    let key = found.then(|| as_lookup_key(resolved)).flatten();
    let url = key.and_then(|key| {
        mapping
            .entries
            .iter()
            .find(|(candidate, _)| candidate == &key)
            .map(|(_, url)| url.clone())
    });

    let diagnostic = RoutingDiagnostic {
        field: mapping.field.as_str().to_string(),
        routing_value,
        rules_checked,
    };

    (url.is_some(), url, diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> RouteMapping {
        RouteMapping {
            field: FieldPath::parse("object.title").unwrap(),
            entries: vec![
                (
                    "AP_McAfeeMsme-virusDetected".to_string(),
                    Url::parse("http://dest/ep/").unwrap(),
                ),
                (
                    "other".to_string(),
                    Url::parse("http://dest/other/").unwrap(),
                ),
            ],
        }
    }

    #[test]
    fn first_match_wins() {
        let body = json!({"object": {"title": "AP_McAfeeMsme-virusDetected"}});
        let (matched, url, diag) = select(&body, &[mapping()]);
        assert!(matched);
        assert_eq!(url.unwrap().as_str(), "http://dest/ep/");
        assert_eq!(diag.rules_checked, 2);
    }

    #[test]
    fn unknown_value_is_no_match() {
        let body = json!({"object": {"title": "unknown"}});
        let (matched, url, diag) = select(&body, &[mapping()]);
        assert!(!matched);
        assert!(url.is_none());
        assert_eq!(diag.routing_value, Some(json!("unknown")));
    }

    #[test]
    fn missing_field_is_no_match() {
        let body = json!({});
        let (matched, _, diag) = select(&body, &[mapping()]);
        assert!(!matched);
        assert_eq!(diag.routing_value, None);
    }

    #[test]
    fn only_first_mapping_block_is_consulted() {
        let second = RouteMapping {
            field: FieldPath::parse("object.title").unwrap(),
            entries: vec![("unknown".to_string(), Url::parse("http://ignored/").unwrap())],
        };
        let body = json!({"object": {"title": "unknown"}});
        let (matched, _, _) = select(&body, &[mapping(), second]);
        assert!(!matched);
    }

    #[test]
    fn numeric_and_boolean_keys_render_canonically() {
        let m = RouteMapping {
            field: FieldPath::parse("n").unwrap(),
            entries: vec![("42".to_string(), Url::parse("http://dest/").unwrap())],
        };
        let body = json!({"n": 42});
        let (matched, _, _) = select(&body, &[m]);
        assert!(matched);
    }
}
