//! Tracing integration for session hosts.
//!
//! [`SessionEventLayer`] forwards every tracing event emitted while a session
//! runs (resolution steps, builds, fetches, commits) to a tokio channel so a
//! host UI can show progress next to the evaluation results.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// One forwarded log event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionEvent {
    /// Module path of the emitter (e.g. "kiln_application::resolver::package")
    pub target: String,
    pub level: String,
    pub message: String,
    pub fields: HashMap<String, Value>,
    /// Fields stored on the enclosing span, if any
    pub span: HashMap<String, Value>,
    pub timestamp: String,
}

impl SessionEvent {
    /// Component tag from a `[Component] message` style log line.
    pub fn component(&self) -> Option<&str> {
        let rest = self.message.strip_prefix('[')?;
        rest.split_once(']').map(|(component, _)| component)
    }
}

/// A tracing layer that sends session events to a channel.
pub struct SessionEventLayer {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { sender }
    }

    /// Layer plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl<S> Layer<S> for SessionEventLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let span = ctx
            .event_span(event)
            .and_then(|span| span.extensions().get::<HashMap<String, Value>>().cloned())
            .unwrap_or_default();

        let message = fields
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let session_event = SessionEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message,
            fields,
            span,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // Receiver gone means nobody is listening any more.
        let _ = self.sender.send(session_event);
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(format!("{:?}", value)));
    }
}

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info"` or `"kiln_application=debug"`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Like [`init_tracing`], also forwarding events through a [`SessionEventLayer`].
pub fn init_tracing_with_events(
    default_filter: &str,
) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let (layer, receiver) = SessionEventLayer::channel();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(layer)
        .try_init()
        .ok()
        .map(|_| receiver)
}
