//! Structured JSON-lines logger (spec.md §4.8).
//!
//! `tracing`/`tracing-subscriber`/`tracing-appender` are the teacher's
//! declared (if, in the teacher, unused) logging stack; this module wires
//! them into the exact line shape the spec requires — one JSON object per
//! line with `timestamp`, `level`, `category`, `message`, `context` — via a
//! small custom `Layer` rather than the stock JSON formatter, since the
//! stock formatter nests fields under `fields` instead of the flat
//! `context` object spec.md mandates.

use std::io::Write;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Category constants named in spec.md §4.8.
pub mod category {
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const FILTERING: &str = "FILTERING";
    pub const ROUTING: &str = "ROUTING";
    pub const FORWARDING: &str = "FORWARDING";
    pub const RESPONSE: &str = "RESPONSE";
}

/// Installs the process-wide subscriber, gated at `server.log_level`
/// (spec.md §3). Must be called once at startup; the returned guard must be
/// held for the process lifetime or buffered log lines are lost on exit
/// (mirrors `tracing-appender`'s usual usage).
pub fn init(log_level: &str) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let layer = JsonLineLayer { writer: non_blocking };
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(layer).init();
    guard
}

struct JsonLineLayer {
    writer: NonBlocking,
}

impl<S> Layer<S> for JsonLineLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let level = event.metadata().level().to_string();
        let category = visitor
            .fields
            .remove("category")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| event.metadata().target().to_string());
        let message = visitor.fields.remove("message").unwrap_or(Value::Null);

        let line = serde_json::json!({
            "timestamp": timestamp,
            "level": level,
            "category": category,
            "message": message,
            "context": Value::Object(visitor.fields),
        });

        let mut writer = self.writer.clone();
        let _ = writeln!(writer, "{line}");
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields.insert(field.name().to_string(), Value::Number(n));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::category;

    #[test]
    fn categories_match_spec_names() {
        assert_eq!(category::CONFIG_ERROR, "CONFIG_ERROR");
        assert_eq!(category::FORWARDING, "FORWARDING");
    }
}
