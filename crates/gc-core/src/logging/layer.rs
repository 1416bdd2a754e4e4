//! JSONL event stream on stderr.
//!
//! Each event becomes one object with `ts`, `level`, `event` (the tracing
//! target), the correlation keys, `message`, and the remaining `fields`.
//! A correlation key set on the event wins over enclosing spans, and inner
//! spans win over outer ones.

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

const CORRELATION_KEYS: [&str; 4] = ["run_id", "config_id", "stage", "bin"];

/// Correlation values, indexed like `CORRELATION_KEYS`.
#[derive(Debug, Clone, Default)]
struct Correlation([Option<String>; 4]);

impl Correlation {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let index = CORRELATION_KEYS.iter().position(|k| *k == key)?;
        Some(&mut self.0[index])
    }

    fn inherit(&mut self, outer: &Correlation) {
        for (mine, theirs) in self.0.iter_mut().zip(&outer.0) {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }

    fn write_into(self, obj: &mut Map<String, Value>) {
        for (key, value) in CORRELATION_KEYS.iter().zip(self.0) {
            if let Some(v) = value {
                obj.insert((*key).to_string(), Value::String(v));
            }
        }
    }
}

/// Fields of one event or span, with message and correlation split off.
#[derive(Default)]
struct Collected {
    correlation: Correlation,
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Collected {
    fn put(&mut self, field: &Field, value: Value) {
        let name = field.name();
        match value {
            Value::String(text) if name == "message" => self.message = Some(text),
            Value::String(text) => match self.correlation.slot(name) {
                Some(slot) => *slot = Some(text),
                None => {
                    self.fields.insert(name.to_string(), Value::String(text));
                }
            },
            other => {
                self.fields.insert(name.to_string(), other);
            }
        }
    }
}

impl Visit for Collected {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON number form.
        let v = Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, v);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

fn render(meta: &Metadata<'_>, collected: Collected) -> String {
    let level: Level = (*meta.level()).into();
    let mut obj = Map::new();
    obj.insert("ts".to_string(), Value::String(Utc::now().to_rfc3339()));
    obj.insert("level".to_string(), serde_json::json!(level));
    obj.insert("event".to_string(), Value::String(meta.target().to_string()));
    collected.correlation.write_into(&mut obj);
    if let Some(message) = collected.message {
        obj.insert("message".to_string(), Value::String(message));
    }
    if !collected.fields.is_empty() {
        obj.insert("fields".to_string(), Value::Object(collected.fields));
    }
    Value::Object(obj).to_string()
}

/// Writes one JSON line per event; stdout stays reserved for payloads.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collected = Collected::default();
        attrs.record(&mut collected);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(collected.correlation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut collected = Collected::default();
        event.record(&mut collected);
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(outer) = span.extensions().get::<Correlation>() {
                    collected.correlation.inherit(outer);
                }
            }
        }

        let line = render(event.metadata(), collected);
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{event_names, LogContext, Stage};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<Value> {
        let sink = Shared::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(sink.clone()));
        tracing::subscriber::with_default(subscriber, f);

        let bytes = sink.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is one JSON object"))
            .collect()
    }

    #[test]
    fn log_event_records_carry_context() {
        let lines = capture(|| {
            let ctx = LogContext::new("run-1").with_config_id("abc123");
            crate::log_event!(
                ctx,
                WARN,
                event_names::POLICY_AMBIGUOUS,
                Stage::Resolve,
                "more than one policy",
                bin = "e1z0",
                candidates = 2u64
            );
        });
        let record = &lines[0];
        assert_eq!(record["level"], "warn");
        assert_eq!(record["event"], "resolve.policy_ambiguous");
        assert_eq!(record["run_id"], "run-1");
        assert_eq!(record["config_id"], "abc123");
        assert_eq!(record["stage"], "resolve");
        assert_eq!(record["bin"], "e1z0");
        assert_eq!(record["message"], "more than one policy");
        assert_eq!(record["fields"]["candidates"], 2);
        assert!(record["fields"].get("run_id").is_none());
        assert!(record["ts"].is_string());
    }

    #[test]
    fn missing_config_id_is_omitted() {
        let lines = capture(|| {
            let ctx = LogContext::new("run-2");
            crate::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "start");
        });
        assert!(lines[0].get("config_id").is_none());
        assert!(lines[0].get("fields").is_none());
    }

    #[test]
    fn inner_span_and_event_override_outer_context() {
        let lines = capture(|| {
            let outer = tracing::info_span!("run", run_id = "run-span", stage = "resolve");
            let _outer = outer.enter();
            let inner = tracing::info_span!("bin", stage = "smooth", bin = "e0z1");
            let _inner = inner.enter();
            tracing::info!(target: "smooth.finished", smoothed = 3u64, message = "done");
            tracing::info!(target: "smooth.finished", bin = "e2z2", message = "done");
        });
        assert_eq!(lines[0]["run_id"], "run-span");
        assert_eq!(lines[0]["stage"], "smooth");
        assert_eq!(lines[0]["bin"], "e0z1");
        assert_eq!(lines[0]["fields"]["smoothed"], 3);
        assert_eq!(lines[1]["bin"], "e2z2");
    }

    #[test]
    fn non_finite_floats_are_strings() {
        let lines = capture(|| {
            tracing::info!(target: "evaluate.score", score = f64::NAN, message = "nan");
        });
        assert_eq!(lines[0]["fields"]["score"], "NaN");
    }
}
