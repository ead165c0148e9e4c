//! HTTP surface: `/webhook`, `/health`, `/config` (spec.md §4.7).

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder, ResponseError};
use serde_json::json;

use crate::logging::category;
use crate::middleware::RequestIdExt;
use crate::pipeline::{self, AppState};

/// Request body size bound (spec.md §5: "recommended 1 MiB"), enforced via
/// `web::PayloadConfig` on the `web::Bytes` extractor in `webhook`.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// One `RESPONSE`-category line per request regardless of outcome, so the
/// request_id/status pair is recoverable from logs alone even when the
/// pipeline terminated early (spec.md §4.8, §8 invariant 1).
#[post("/webhook")]
async fn webhook(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> impl Responder {
    let request_id = req.request_id().0;
    let response = match pipeline::process(&state, request_id, &body).await {
        Ok(response) => response,
        Err(error) => error.error_response(),
    };
    tracing::info!(
        category = category::RESPONSE,
        request_id = %request_id,
        status = response.status().as_u16(),
        "responding"
    );
    response
}

#[get("/health")]
async fn health(req: HttpRequest) -> impl Responder {
    let request_id = req.request_id().0;
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "request_id": request_id,
    }))
}

#[get("/config")]
async fn get_config(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(&*state.config)
}

/// Mounts the three endpoints and the request-id middleware (spec.md §4.7).
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(webhook).service(health).service(get_config);
}
