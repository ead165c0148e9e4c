//! Orchestrates validate -> filter -> route -> forward, assigns the
//! request ID to the response, and shapes every terminal outcome per
//! spec.md §4.6.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ForwardErrorType, PipelineError};
use crate::forwarder::{self, Outcome, ResponseContent};
use crate::logging::category;
use crate::{predicate, routing};

/// Immutable, process-wide state shared by every request (spec.md §5:
/// "Config is read-only after load").
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config: Arc::new(config),
            http_client: reqwest::Client::new(),
        }
    }
}

/// Runs the full pipeline for one inbound `/webhook` request.
pub async fn process(state: &AppState, request_id: Uuid, raw_body: &[u8]) -> Result<HttpResponse, PipelineError> {
    let body = validate(request_id, raw_body)?;

    let (admitted, filtering_summary) = predicate::evaluate(&state.config.filtering, &body);
    tracing::info!(
        category = category::FILTERING,
        request_id = %request_id,
        rules_evaluated = filtering_summary.rules_evaluated,
        default_action_applied = filtering_summary.default_action_applied,
        "filtering decision: admitted={admitted}"
    );
    if !admitted {
        return Ok(HttpResponse::Ok().json(json!({
            "status": "processed",
            "result": "dropped",
            "request_id": request_id,
            "filtering_summary": filtering_summary,
        })));
    }

    let (matched, url, routing_diagnostic) = routing::select(&body, &state.config.routes);
    tracing::info!(
        category = category::ROUTING,
        request_id = %request_id,
        field = %routing_diagnostic.field,
        rules_checked = routing_diagnostic.rules_checked,
        "routing lookup: matched={matched}"
    );
    let Some(url) = (if matched { url } else { None }) else {
        tracing::warn!(
            category = category::ROUTING,
            request_id = %request_id,
            "no route mapping matched"
        );
        return Err(PipelineError::RoutingFailed {
            request_id,
            field: routing_diagnostic.field,
            routing_value: routing_diagnostic.routing_value,
            rules_checked: routing_diagnostic.rules_checked,
        });
    };

    let timeout = Duration::from_secs(state.config.general.route_timeout);
    let outcome = forwarder::forward(&state.http_client, &url, &body, timeout, &request_id.to_string()).await;

    match outcome {
        Outcome::Ok { status_code, content } => {
            tracing::info!(
                category = category::FORWARDING,
                request_id = %request_id,
                destination = %url,
                status_code = status_code,
                "forward completed"
            );
            let content_json = match content {
                ResponseContent::Json(value) => value,
                ResponseContent::Raw(text) => Value::String(text),
            };
            let response = json!({
                "status": "routed",
                "request_id": request_id,
                "routing_summary": routing_diagnostic,
                "destination_response": {
                    "status_code": status_code,
                    "content": content_json,
                },
            });
            Ok(HttpResponse::Ok().json(response))
        }
        Outcome::Timeout { elapsed } => {
            let detail = format!("no response within timeout ({:.3}s elapsed)", elapsed.as_secs_f64());
            tracing::error!(category = category::FORWARDING, request_id = %request_id, destination = %url, "forward timed out: {detail}");
            Err(PipelineError::ForwardingFailed {
                request_id,
                destination: url.to_string(),
                error_type: ForwardErrorType::TimeoutError,
                detail,
            })
        }
        Outcome::ConnectionError { reason } => {
            tracing::error!(category = category::FORWARDING, request_id = %request_id, destination = %url, "connection error: {reason}");
            Err(PipelineError::ForwardingFailed {
                request_id,
                destination: url.to_string(),
                error_type: ForwardErrorType::ConnectionError,
                detail: reason,
            })
        }
        Outcome::BadResponse { reason } => {
            tracing::error!(category = category::FORWARDING, request_id = %request_id, destination = %url, "bad upstream response: {reason}");
            Err(PipelineError::ForwardingFailed {
                request_id,
                destination: url.to_string(),
                error_type: ForwardErrorType::BadResponse,
                detail: reason,
            })
        }
    }
}

fn validate(request_id: Uuid, raw_body: &[u8]) -> Result<Value, PipelineError> {
    let value: Value = serde_json::from_slice(raw_body).map_err(|_| {
        tracing::warn!(category = category::VALIDATION_ERROR, request_id = %request_id, "body is not valid JSON");
        PipelineError::InvalidRequest {
            request_id,
            message: "Request body must be valid JSON".to_string(),
        }
    })?;

    if !value.is_object() {
        tracing::warn!(category = category::VALIDATION_ERROR, request_id = %request_id, "body is not a JSON object");
        return Err(PipelineError::InvalidRequest {
            request_id,
            message: "Payload must be a JSON object".to_string(),
        });
    }

    Ok(value)
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            PipelineError::RoutingFailed { .. } => StatusCode::NOT_FOUND,
            PipelineError::ForwardingFailed { error_type, .. } => match error_type {
                ForwardErrorType::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
                ForwardErrorType::ConnectionError | ForwardErrorType::BadResponse => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            PipelineError::InvalidRequest { request_id, message } => json!({
                "error": "InvalidRequestError",
                "message": message,
                "request_id": request_id,
            }),
            PipelineError::RoutingFailed {
                request_id,
                field,
                routing_value,
                rules_checked,
            } => json!({
                "error": "RoutingError",
                "message": "No route mapping matched the extracted value",
                "request_id": request_id,
                "routing_context": {
                    "field": field,
                    "routing_value": routing_value,
                    "rules_checked": rules_checked,
                },
            }),
            PipelineError::ForwardingFailed {
                request_id,
                destination,
                error_type,
                detail,
            } => json!({
                "error": "ForwardingError",
                "message": detail,
                "request_id": request_id,
                "forwarding_context": {
                    "error_type": error_type.as_str(),
                    "destination": destination,
                    "detail": detail,
                },
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
