//! Error types for configuration loading and request processing.
//!
//! Follows the teacher's split: a `thiserror` enum per failure domain, with
//! enough context in each variant to locate the offending input without a
//! backtrace (`ConfigError` names section/key, `PipelineError` names stage).

use thiserror::Error;

/// Errors produced while loading and validating the configuration file
/// (spec.md §4.5). Never encountered at request time — config is loaded
/// once at startup and is immutable thereafter.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is {size} bytes, exceeds the 1 MiB limit")]
    TooLarge { path: String, size: u64 },

    #[error("config file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("top-level section `{0}` is missing")]
    MissingSection(&'static str),

    #[error("unknown top-level section `{0}`")]
    UnknownSection(String),

    #[error("{section}.{key}: {message}")]
    InvalidValue {
        section: &'static str,
        key: String,
        message: String,
    },

    #[error("{section}.{key}: field path `{path}` is invalid: {reason}")]
    InvalidFieldPath {
        section: &'static str,
        key: String,
        path: String,
        reason: String,
    },

    #[error("{section}.{key}: operator `{operator}` is not recognized")]
    UnknownOperator {
        section: &'static str,
        key: String,
        operator: String,
    },

    #[error("{section}.{key}: operator `{operator}` requires {expected}, got {actual}")]
    OperatorTypeMismatch {
        section: &'static str,
        key: String,
        operator: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("{section}.{key}: destination URL `{url}` is invalid: {reason}")]
    InvalidUrl {
        section: &'static str,
        key: String,
        url: String,
        reason: String,
    },

    #[error("routes[{index}]: duplicate key `{key}` in route mapping")]
    DuplicateRouteKey { index: usize, key: String },

    #[error("filtering.conditions.rules must contain at least one rule")]
    EmptyRuleList,

    #[error("routes[{index}] must contain at least one mapping entry")]
    EmptyRouteMapping { index: usize },
}

impl ConfigError {
    /// Process exit code for `--validate-only` and startup failures: 2 for
    /// failing to even read the file, 1 for everything the validator itself
    /// rejects.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Io { .. } | ConfigError::TooLarge { .. } => 2,
            _ => 1,
        }
    }
}

/// Errors terminating a single request's pipeline (spec.md §4.6/§7). Each
/// variant carries the data needed to render the response body and status
/// code defined for its stage; the `actix_web::ResponseError` impl in
/// `pipeline` performs that mapping.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request body: {message}")]
    InvalidRequest { request_id: uuid::Uuid, message: String },

    #[error("no route mapping matched")]
    RoutingFailed {
        request_id: uuid::Uuid,
        field: String,
        routing_value: Option<serde_json::Value>,
        rules_checked: usize,
    },

    #[error("forwarding to {destination} failed: {detail}")]
    ForwardingFailed {
        request_id: uuid::Uuid,
        destination: String,
        error_type: ForwardErrorType,
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardErrorType {
    ConnectionError,
    TimeoutError,
    /// Not in spec.md's §4.6 status table (it only names connection_error
    /// and timeout); treated as a 502 like connection_error since both are
    /// upstream-integration failures rather than application outcomes.
    /// See DESIGN.md.
    BadResponse,
}

impl ForwardErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ForwardErrorType::ConnectionError => "CONNECTION_ERROR",
            ForwardErrorType::TimeoutError => "TIMEOUT_ERROR",
            ForwardErrorType::BadResponse => "BAD_UPSTREAM_RESPONSE",
        }
    }
}
