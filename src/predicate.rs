//! Typed operators over resolved JSON values, and rule/condition evaluation
//! (spec.md §4.2).

use serde::Serialize;
use serde_json::Value;

use crate::path::FieldPath;

/// The operator named in configuration, kept around for error messages and
/// for rendering `/config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    ContainsAny,
    LessThan,
    GreaterThan,
}

impl Operator {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "in" => Operator::In,
            "contains_any" => Operator::ContainsAny,
            "less_than" => Operator::LessThan,
            "greater_than" => Operator::GreaterThan,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::In => "in",
            Operator::ContainsAny => "contains_any",
            Operator::LessThan => "less_than",
            Operator::GreaterThan => "greater_than",
        }
    }
}

/// The operator joined with its already-validated right-hand payload
/// (design note §9: "validate once at load time ... so the hot path does no
/// type dispatch beyond variant selection").
#[derive(Debug, Clone)]
pub enum RulePayload {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    ContainsAny(Vec<Value>),
    LessThan(f64),
    GreaterThan(f64),
}

impl RulePayload {
    pub fn operator(&self) -> Operator {
        match self {
            RulePayload::Equals(_) => Operator::Equals,
            RulePayload::NotEquals(_) => Operator::NotEquals,
            RulePayload::In(_) => Operator::In,
            RulePayload::ContainsAny(_) => Operator::ContainsAny,
            RulePayload::LessThan(_) => Operator::LessThan,
            RulePayload::GreaterThan(_) => Operator::GreaterThan,
        }
    }

    /// Renders the right-hand side back to JSON, for `/config` rendering.
    fn rhs_json(&self) -> Value {
        match self {
            RulePayload::Equals(v) | RulePayload::NotEquals(v) => v.clone(),
            RulePayload::In(items) | RulePayload::ContainsAny(items) => Value::Array(items.clone()),
            RulePayload::LessThan(n) | RulePayload::GreaterThan(n) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
        }
    }
}

/// A single compiled rule: a field path plus its operator and payload.
#[derive(Debug, Clone)]
pub struct Rule {
    pub field: FieldPath,
    pub payload: RulePayload,
}

impl Serialize for Rule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Rule", 3)?;
        state.serialize_field("field", self.field.as_str())?;
        state.serialize_field("operator", self.payload.operator().name())?;
        state.serialize_field("value", &self.payload.rhs_json())?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    And,
    Or,
}

/// `(Logic, [Rule])` with at least one rule (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct Conditions {
    pub logic: Logic,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    Drop,
    Pass,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilteringConfig {
    pub default_action: DefaultAction,
    pub conditions: Conditions,
}

/// Evaluation result surfaced to the caller and, in JSON form, to the
/// client (spec.md §4.6's `filtering_summary`).
#[derive(Debug, Clone, Serialize)]
pub struct FilteringSummary {
    pub rules_evaluated: usize,
    pub matched_rules: Option<Vec<usize>>,
    pub default_action_applied: bool,
}

/// Numeric value extracted from a JSON scalar, used so integers and floats
/// cross-compare by value (spec.md §3, §9).
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Deep equality with numeric cross-comparison: `1` (integer) equals `1.0`
/// (float).
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x == y;
    }
    a == b
}

fn matches_rule(rule: &Rule, body: &Value) -> bool {
    let (found, value) = rule.field.resolve(body);
    match &rule.payload {
        RulePayload::Equals(expected) => found && values_equal(value, expected),
        RulePayload::NotEquals(expected) => !found || !values_equal(value, expected),
        RulePayload::In(options) => found && options.iter().any(|opt| values_equal(value, opt)),
        RulePayload::ContainsAny(options) => {
            found
                && value
                    .as_array()
                    .map(|items| items.iter().any(|item| options.iter().any(|opt| values_equal(item, opt))))
                    .unwrap_or(false)
        }
        RulePayload::LessThan(threshold) => {
            found && as_f64(value).map(|v| v < *threshold).unwrap_or(false)
        }
        RulePayload::GreaterThan(threshold) => {
            found && as_f64(value).map(|v| v > *threshold).unwrap_or(false)
        }
    }
}

/// Combines rule results per `conditions.logic`, short-circuiting and
/// recording matches in configuration order.
fn combine(conditions: &Conditions, body: &Value) -> (bool, Vec<usize>) {
    let mut matched = Vec::new();
    match conditions.logic {
        Logic::And => {
            let mut all = true;
            for (idx, rule) in conditions.rules.iter().enumerate() {
                if matches_rule(rule, body) {
                    matched.push(idx);
                } else {
                    all = false;
                    break;
                }
            }
            (all, matched)
        }
        Logic::Or => {
            for (idx, rule) in conditions.rules.iter().enumerate() {
                if matches_rule(rule, body) {
                    matched.push(idx);
                    return (true, matched);
                }
            }
            (false, matched)
        }
    }
}

/// `evaluate(conditions, body) -> (admitted, summary)` (spec.md §4.2).
pub fn evaluate(filtering: &FilteringConfig, body: &Value) -> (bool, FilteringSummary) {
    let (combined, matched) = combine(&filtering.conditions, body);
    let default_action_applied = !combined;
    let admitted = if combined {
        true
    } else {
        matches!(filtering.default_action, DefaultAction::Pass)
    };

    let summary = FilteringSummary {
        rules_evaluated: filtering.conditions.rules.len(),
        matched_rules: if default_action_applied {
            None
        } else {
            Some(matched)
        },
        default_action_applied,
    };
    (admitted, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(field: &str, payload: RulePayload) -> Rule {
        Rule {
            field: FieldPath::parse(field).unwrap(),
            payload,
        }
    }

    #[test]
    fn equals_is_reflexive_and_cross_compares_numeric_kinds() {
        let body = json!({"count": 3});
        let r = rule("count", RulePayload::Equals(json!(3.0)));
        assert!(matches_rule(&r, &body));
    }

    #[test]
    fn not_equals_true_when_absent() {
        let body = json!({});
        let r = rule("missing", RulePayload::NotEquals(json!("x")));
        assert!(matches_rule(&r, &body));
    }

    #[test]
    fn less_than_and_greater_than_are_mirror_images() {
        let body = json!({"n": 5});
        assert!(matches_rule(&rule("n", RulePayload::LessThan(10.0)), &body));
        assert!(!matches_rule(&rule("n", RulePayload::GreaterThan(10.0)), &body));
        assert!(!matches_rule(&rule("n", RulePayload::LessThan(5.0)), &body));
        assert!(!matches_rule(&rule("n", RulePayload::GreaterThan(5.0)), &body));
    }

    #[test]
    fn type_mismatch_is_non_match_not_error() {
        let body = json!({"n": "not-a-number"});
        assert!(!matches_rule(&rule("n", RulePayload::LessThan(5.0)), &body));
    }

    #[test]
    fn and_short_circuits_on_first_non_match() {
        let body = json!({"a": 1, "b": 2});
        let conditions = Conditions {
            logic: Logic::And,
            rules: vec![
                rule("a", RulePayload::Equals(json!(1))),
                rule("b", RulePayload::Equals(json!(999))),
            ],
        };
        let (ok, matched) = combine(&conditions, &body);
        assert!(!ok);
        assert_eq!(matched, vec![0]);
    }

    #[test]
    fn default_action_pass_admits_when_no_rule_matches() {
        let filtering = FilteringConfig {
            default_action: DefaultAction::Pass,
            conditions: Conditions {
                logic: Logic::And,
                rules: vec![rule("x", RulePayload::Equals(json!("never")))],
            },
        };
        let (admitted, summary) = evaluate(&filtering, &json!({}));
        assert!(admitted);
        assert!(summary.default_action_applied);
        assert_eq!(summary.matched_rules, None);
    }

    #[test]
    fn default_action_drop_rejects_when_no_rule_matches() {
        let filtering = FilteringConfig {
            default_action: DefaultAction::Drop,
            conditions: Conditions {
                logic: Logic::And,
                rules: vec![rule("objectType", RulePayload::Equals(json!("alert")))],
            },
        };
        let (admitted, _) = evaluate(&filtering, &json!({"objectType": "incident"}));
        assert!(!admitted);
    }

    #[test]
    fn contains_any_shares_at_least_one_element() {
        let body = json!({"tags": ["a", "b"]});
        let r = rule("tags", RulePayload::ContainsAny(vec![json!("b"), json!("c")]));
        assert!(matches_rule(&r, &body));
        let r2 = rule("tags", RulePayload::ContainsAny(vec![json!("z")]));
        assert!(!matches_rule(&r2, &body));
    }
}
