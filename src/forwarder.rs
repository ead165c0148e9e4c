//! Issues a single bounded HTTP POST and classifies its outcome
//! (spec.md §4.4).

use std::time::Duration;

use serde_json::Value;

/// Transport-level outcome of a forward attempt. A non-2xx upstream status
/// is still `Ok` — the forwarder reports transport outcomes, not
/// application outcomes (spec.md §4.4, §7).
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok { status_code: u16, content: ResponseContent },
    Timeout { elapsed: Duration },
    ConnectionError { reason: String },
    BadResponse { reason: String },
}

/// The destination's body: parsed JSON when it declared `application/json`
/// and parsed successfully, otherwise the raw text (spec.md §4.4, Open
/// Question on non-JSON content-type handling — we surface raw text).
#[derive(Debug, Clone)]
pub enum ResponseContent {
    Json(Value),
    Raw(String),
}

/// A single POST of `body` to `url`, content-type `application/json`,
/// propagating `request_id` as a header, bounded by `timeout`. Exactly one
/// attempt; no retries.
pub async fn forward(
    client: &reqwest::Client,
    url: &url::Url,
    body: &Value,
    timeout: Duration,
    request_id: &str,
) -> Outcome {
    let started = std::time::Instant::now();

    let response = client
        .post(url.clone())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header("X-Request-ID", request_id)
        .timeout(timeout)
        .json(body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(error) => {
            if error.is_timeout() {
                return Outcome::Timeout {
                    elapsed: started.elapsed(),
                };
            }
            if error.is_connect() {
                return Outcome::ConnectionError {
                    reason: error.to_string(),
                };
            }
            return Outcome::ConnectionError {
                reason: error.to_string(),
            };
        }
    };

    let status_code = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(error) if error.is_timeout() => {
            return Outcome::Timeout {
                elapsed: started.elapsed(),
            }
        }
        Err(error) => {
            return Outcome::ConnectionError {
                reason: error.to_string(),
            }
        }
    };

    if content_type.contains("application/json") {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Outcome::Ok {
                status_code,
                content: ResponseContent::Json(value),
            },
            Err(error) => Outcome::BadResponse {
                reason: format!("declared JSON but failed to parse: {error}"),
            },
        }
    } else {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Outcome::Ok {
            status_code,
            content: ResponseContent::Raw(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn ok_surfaces_parsed_json_verbatim_including_5xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ep"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"ok": false}))
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/ep", server.uri())).unwrap();
        let outcome = forward(&client(), &url, &json!({"x": 1}), StdDuration::from_secs(2), "req-1").await;
        match outcome {
            Outcome::Ok { status_code, content: ResponseContent::Json(value) } => {
                assert_eq!(status_code, 500);
                assert_eq!(value, json!({"ok": false}));
            }
            other => panic!("expected Ok outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_response_when_declared_json_fails_to_parse() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ep"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("not json", "application/json"),
            )
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/ep", server.uri())).unwrap();
        let outcome = forward(&client(), &url, &json!({}), StdDuration::from_secs(2), "req-2").await;
        assert!(matches!(outcome, Outcome::BadResponse { .. }));
    }

    #[tokio::test]
    async fn timeout_when_upstream_never_responds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ep"))
            .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_millis(500)))
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/ep", server.uri())).unwrap();
        let outcome = forward(
            &client(),
            &url,
            &json!({}),
            StdDuration::from_millis(50),
            "req-3",
        )
        .await;
        assert!(matches!(outcome, Outcome::Timeout { .. }));
    }

    #[tokio::test]
    async fn connection_error_when_nothing_is_listening() {
        let url = url::Url::parse("http://127.0.0.1:1").unwrap();
        let outcome = forward(&client(), &url, &json!({}), StdDuration::from_secs(1), "req-4").await;
        assert!(matches!(outcome, Outcome::ConnectionError { .. }));
    }
}
