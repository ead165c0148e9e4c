//! Config loader & validator (spec.md §4.5): parses YAML into the typed
//! model of §3, validating every cross-reference at load time so the hot
//! path never has to.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::path::FieldPath;
use crate::predicate::{Conditions, DefaultAction, FilteringConfig, Logic, Operator, Rule, RulePayload};
use crate::routing::RouteMapping;

pub const MAX_CONFIG_BYTES: u64 = 1024 * 1024;
const MAX_LIST_ITEMS: usize = 100;
const MAX_URL_LEN: usize = 2048;
const MAX_ROUTE_ENTRIES: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct GeneralConfig {
    pub route_timeout: u64,
    pub log_rotation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub log_level: String,
}

/// The fully validated, immutable configuration (spec.md §3). Built once
/// at startup and shared read-only by every request.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub server: ServerConfig,
    pub filtering: FilteringConfig,
    pub routes: Vec<RouteMapping>,
}

// --- raw (permissive) deserialization shapes -------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    general: Option<RawGeneral>,
    server: Option<RawServer>,
    filtering: Option<RawFiltering>,
    routes: Option<Vec<RawRouteMapping>>,
    #[serde(flatten)]
    extra: std::collections::HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawGeneral {
    route_timeout: Option<serde_yaml::Value>,
    log_rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    host: Option<String>,
    port: Option<serde_yaml::Value>,
    workers: Option<serde_yaml::Value>,
    log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFiltering {
    default_action: Option<String>,
    conditions: Option<RawConditions>,
}

#[derive(Debug, Deserialize)]
struct RawConditions {
    logic: Option<String>,
    rules: Option<Vec<RawRule>>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    field: Option<String>,
    operator: Option<String>,
    value: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawRouteMapping {
    field: Option<String>,
    mappings: Option<serde_yaml::Mapping>,
}

/// Loads and validates the config at `path`, per spec.md §4.5's nine-point
/// checklist. Deserialization is permissive (`RawConfig`); validation is
/// strict and runs over the parsed tree so every error identifies its
/// section and key.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ConfigError::TooLarge {
            path: path.display().to_string(),
            size: metadata.len(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_and_validate(&text)
}

fn parse_and_validate(text: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(text)?;

    if let Some(unknown) = raw.extra.keys().next() {
        return Err(ConfigError::UnknownSection(unknown.clone()));
    }

    let general = validate_general(raw.general.ok_or(ConfigError::MissingSection("general"))?)?;
    let server = validate_server(raw.server.ok_or(ConfigError::MissingSection("server"))?)?;
    let filtering = validate_filtering(raw.filtering.ok_or(ConfigError::MissingSection("filtering"))?)?;
    let routes = validate_routes(raw.routes.ok_or(ConfigError::MissingSection("routes"))?)?;

    Ok(Config {
        general,
        server,
        filtering,
        routes,
    })
}

fn invalid(section: &'static str, key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key: key.to_string(),
        message: message.into(),
    }
}

fn validate_general(raw: RawGeneral) -> Result<GeneralConfig, ConfigError> {
    let route_timeout = raw
        .route_timeout
        .ok_or_else(|| invalid("general", "route_timeout", "is required"))?
        .as_u64()
        .ok_or_else(|| invalid("general", "route_timeout", "must be a positive integer"))?;
    if !(1..=30).contains(&route_timeout) {
        return Err(invalid(
            "general",
            "route_timeout",
            format!("must be between 1 and 30 seconds, got {route_timeout}"),
        ));
    }

    let log_rotation = raw
        .log_rotation
        .ok_or_else(|| invalid("general", "log_rotation", "is required"))?;
    validate_log_rotation(&log_rotation)?;

    Ok(GeneralConfig {
        route_timeout,
        log_rotation,
    })
}

/// `\d+(kb|mb|gb)` with magnitude in [100 kb, 1 gb] (spec.md §4.5.4).
/// Units are treated as binary (1 kb = 1024 bytes) for definiteness; see
/// DESIGN.md for the rationale.
fn validate_log_rotation(value: &str) -> Result<(), ConfigError> {
    let digit_count = value.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_count == 0 {
        return Err(invalid("general", "log_rotation", format!("`{value}` must start with digits")));
    }
    let (digits, suffix) = value.split_at(digit_count);
    let magnitude: u64 = digits
        .parse()
        .map_err(|_| invalid("general", "log_rotation", format!("`{value}` has an invalid numeric part")))?;

    let multiplier = match suffix {
        "kb" => 1024u64,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        other => {
            return Err(invalid(
                "general",
                "log_rotation",
                format!("unit `{other}` must be one of kb, mb, gb"),
            ))
        }
    };

    let bytes = magnitude.saturating_mul(multiplier);
    let min_bytes = 100 * 1024u64;
    let max_bytes = 1024 * 1024 * 1024u64;
    if !(min_bytes..=max_bytes).contains(&bytes) {
        return Err(invalid(
            "general",
            "log_rotation",
            format!("`{value}` must be between 100kb and 1gb"),
        ));
    }
    Ok(())
}

fn validate_server(raw: RawServer) -> Result<ServerConfig, ConfigError> {
    let host = raw
        .host
        .ok_or_else(|| invalid("server", "host", "is required"))?;
    if host.is_empty() {
        return Err(invalid("server", "host", "must not be empty"));
    }

    let port = raw
        .port
        .ok_or_else(|| invalid("server", "port", "is required"))?
        .as_u64()
        .ok_or_else(|| invalid("server", "port", "must be an integer"))?;
    if !(1..=65535).contains(&port) {
        return Err(invalid("server", "port", format!("must be in [1, 65535], got {port}")));
    }

    let workers = raw
        .workers
        .ok_or_else(|| invalid("server", "workers", "is required"))?
        .as_u64()
        .ok_or_else(|| invalid("server", "workers", "must be an integer"))?;
    if workers < 1 {
        return Err(invalid("server", "workers", "must be at least 1"));
    }

    let log_level = raw
        .log_level
        .ok_or_else(|| invalid("server", "log_level", "is required"))?;

    Ok(ServerConfig {
        host,
        port: port as u16,
        workers: workers as usize,
        log_level,
    })
}

fn validate_filtering(raw: RawFiltering) -> Result<FilteringConfig, ConfigError> {
    let default_action = match raw
        .default_action
        .ok_or_else(|| invalid("filtering", "default_action", "is required"))?
        .as_str()
    {
        "drop" => DefaultAction::Drop,
        "pass" => DefaultAction::Pass,
        other => {
            return Err(invalid(
                "filtering",
                "default_action",
                format!("must be `drop` or `pass`, got `{other}`"),
            ))
        }
    };

    let raw_conditions = raw
        .conditions
        .ok_or_else(|| invalid("filtering", "conditions", "is required"))?;

    let logic = match raw_conditions
        .logic
        .ok_or_else(|| invalid("filtering", "conditions.logic", "is required"))?
        .as_str()
    {
        "AND" => Logic::And,
        "OR" => Logic::Or,
        other => {
            return Err(invalid(
                "filtering",
                "conditions.logic",
                format!("must be `AND` or `OR`, got `{other}`"),
            ))
        }
    };

    let raw_rules = raw_conditions
        .rules
        .ok_or_else(|| invalid("filtering", "conditions.rules", "is required"))?;
    if raw_rules.is_empty() {
        return Err(ConfigError::EmptyRuleList);
    }

    let rules = raw_rules
        .into_iter()
        .enumerate()
        .map(|(index, raw_rule)| validate_rule(index, raw_rule))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FilteringConfig {
        default_action,
        conditions: Conditions { logic, rules },
    })
}

fn validate_rule(index: usize, raw: RawRule) -> Result<Rule, ConfigError> {
    let key = format!("conditions.rules[{index}]");

    let field_source = raw
        .field
        .ok_or_else(|| invalid("filtering", &key, "field is required"))?;
    let field = FieldPath::parse(&field_source).map_err(|reason| ConfigError::InvalidFieldPath {
        section: "filtering",
        key: key.clone(),
        path: field_source,
        reason,
    })?;

    let operator_name = raw
        .operator
        .ok_or_else(|| invalid("filtering", &key, "operator is required"))?;
    let operator = Operator::parse(&operator_name).ok_or_else(|| ConfigError::UnknownOperator {
        section: "filtering",
        key: key.clone(),
        operator: operator_name.clone(),
    })?;

    let raw_value = raw
        .value
        .ok_or_else(|| invalid("filtering", &key, "value is required"))?;
    let value: serde_json::Value = serde_yaml_to_json(raw_value);

    let payload = compile_operator_payload(operator, value, &key)?;

    Ok(Rule { field, payload })
}

fn compile_operator_payload(
    operator: Operator,
    value: serde_json::Value,
    key: &str,
) -> Result<RulePayload, ConfigError> {
    Ok(match operator {
        Operator::Equals => {
            if require_scalar(&value).is_none() {
                return Err(type_mismatch_err(operator, key, &value, "a scalar"));
            }
            RulePayload::Equals(value)
        }
        Operator::NotEquals => {
            if require_scalar(&value).is_none() {
                return Err(type_mismatch_err(operator, key, &value, "a scalar"));
            }
            RulePayload::NotEquals(value)
        }
        Operator::In => RulePayload::In(require_scalar_list(value, key, "in")?),
        Operator::ContainsAny => RulePayload::ContainsAny(require_scalar_list(value, key, "contains_any")?),
        Operator::LessThan => match require_number(&value) {
            Some(n) => RulePayload::LessThan(n),
            None => return Err(type_mismatch_err(operator, key, &value, "a number")),
        },
        Operator::GreaterThan => match require_number(&value) {
            Some(n) => RulePayload::GreaterThan(n),
            None => return Err(type_mismatch_err(operator, key, &value, "a number")),
        },
    })
}

fn type_mismatch_err(
    operator: Operator,
    key: &str,
    value: &serde_json::Value,
    expected: &'static str,
) -> ConfigError {
    ConfigError::OperatorTypeMismatch {
        section: "filtering",
        key: key.to_string(),
        operator: operator.name(),
        expected,
        actual: describe_json_type(value),
    }
}

fn require_scalar(value: &serde_json::Value) -> Option<()> {
    match value {
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        _ => Some(()),
    }
}

fn require_number(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

fn require_scalar_list(
    value: serde_json::Value,
    key: &str,
    operator: &'static str,
) -> Result<Vec<serde_json::Value>, ConfigError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(ConfigError::OperatorTypeMismatch {
                section: "filtering",
                key: key.to_string(),
                operator,
                expected: "a non-empty list",
                actual: describe_json_type(&other),
            })
        }
    };

    if items.is_empty() {
        return Err(ConfigError::OperatorTypeMismatch {
            section: "filtering",
            key: key.to_string(),
            operator,
            expected: "a non-empty list",
            actual: "an empty list".to_string(),
        });
    }
    if items.len() > MAX_LIST_ITEMS {
        return Err(invalid(
            "filtering",
            key,
            format!("list has {} items, exceeds the {} item limit", items.len(), MAX_LIST_ITEMS),
        ));
    }
    for item in &items {
        if require_scalar(item).is_none() {
            return Err(ConfigError::OperatorTypeMismatch {
                section: "filtering",
                key: key.to_string(),
                operator,
                expected: "scalar items",
                actual: describe_json_type(item),
            });
        }
    }
    Ok(items)
}

fn describe_json_type(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
    .to_string()
}

fn validate_routes(raw: Vec<RawRouteMapping>) -> Result<Vec<RouteMapping>, ConfigError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| validate_route_mapping(index, entry))
        .collect()
}

fn validate_route_mapping(index: usize, raw: RawRouteMapping) -> Result<RouteMapping, ConfigError> {
    let key = format!("routes[{index}]");

    let field_source = raw
        .field
        .ok_or_else(|| invalid("routes", &key, "field is required"))?;
    let field = FieldPath::parse(&field_source).map_err(|reason| ConfigError::InvalidFieldPath {
        section: "routes",
        key: key.clone(),
        path: field_source,
        reason,
    })?;

    let raw_mappings = raw
        .mappings
        .ok_or_else(|| invalid("routes", &key, "mappings is required"))?;
    if raw_mappings.is_empty() {
        return Err(ConfigError::EmptyRouteMapping { index });
    }
    if raw_mappings.len() > MAX_ROUTE_ENTRIES {
        return Err(invalid(
            "routes",
            &key,
            format!("has {} entries, exceeds the {} entry limit", raw_mappings.len(), MAX_ROUTE_ENTRIES),
        ));
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw_mappings.len());
    for (raw_key, raw_url) in raw_mappings {
        let entry_key = raw_key
            .as_str()
            .ok_or_else(|| invalid("routes", &key, "mapping keys must be strings"))?
            .to_string();
        if !seen.insert(entry_key.clone()) {
            return Err(ConfigError::DuplicateRouteKey { index, key: entry_key });
        }

        let url_str = raw_url
            .as_str()
            .ok_or_else(|| invalid("routes", &key, format!("destination for `{entry_key}` must be a string")))?;
        let url = validate_destination_url(url_str, &key)?;
        entries.push((entry_key, url));
    }

    Ok(RouteMapping { field, entries })
}

fn validate_destination_url(raw: &str, key: &str) -> Result<Url, ConfigError> {
    let invalid_url = |reason: &str| ConfigError::InvalidUrl {
        section: "routes",
        key: key.to_string(),
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.len() > MAX_URL_LEN {
        return Err(invalid_url(&format!("length {} exceeds the {MAX_URL_LEN} character limit", raw.len())));
    }

    let url = Url::parse(raw).map_err(|e| invalid_url(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid_url("scheme must be http or https"));
    }
    if url.host_str().unwrap_or("").is_empty() {
        return Err(invalid_url("host must not be empty"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid_url("userinfo is not permitted in destination URLs"));
    }

    Ok(url)
}

fn serde_yaml_to_json(value: serde_yaml::Value) -> serde_json::Value {
    serde_json::to_value(&value).unwrap_or(serde_json::Value::Null)
}
