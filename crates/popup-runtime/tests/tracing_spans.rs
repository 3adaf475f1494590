//! Structured logging contract: spans and events emitted by the runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anchored_popup_core::{IntRect, IntSize, PopupConfig};
use anchored_popup_runtime::{HeadlessHost, PopupRuntime, RuntimeSettings};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    fields: HashMap<String, String>,
}

#[derive(Default, Clone)]
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl Capture {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        for field in attrs.metadata().fields() {
            fields.entry(field.name().to_string()).or_default();
        }
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.remove("message").unwrap_or_default();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}

fn with_captured_tracing(f: impl FnOnce()) -> Capture {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    capture
}

fn run_one_cycle(host: HeadlessHost<()>) {
    let rt = PopupRuntime::new(host, RuntimeSettings::default());
    let anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| ());
    anchor.report_frame(IntRect::new(50, 50, 100, 40));
    rt.open("menu");
    if let Some(visuals) = anchor.visuals() {
        visuals.content_measured(IntSize::new(120, 60));
    }
    rt.advance(Duration::from_millis(300));
    rt.close("menu");
    rt.advance(Duration::from_millis(300));
}

#[test]
fn state_writes_carry_popup_state_span() {
    let capture = with_captured_tracing(|| run_one_cycle(HeadlessHost::new()));

    let transitions: Vec<(String, String)> = capture
        .spans()
        .iter()
        .filter(|s| s.name == "popup.state")
        .map(|s| (s.fields["from"].clone(), s.fields["to"].clone()))
        .collect();
    assert_eq!(
        transitions,
        vec![
            ("hidden".to_string(), "growing".to_string()),
            ("growing".to_string(), "displayed".to_string()),
            ("displayed".to_string(), "shrinking".to_string()),
            ("shrinking".to_string(), "hidden".to_string()),
        ]
    );
    assert!(
        capture
            .spans()
            .iter()
            .filter(|s| s.name == "popup.state")
            .all(|s| s.fields["popup_id"] == "menu")
    );
}

#[test]
fn broadcast_span_records_fan_out() {
    let capture = with_captured_tracing(|| run_one_cycle(HeadlessHost::new()));
    let broadcast = capture
        .spans()
        .into_iter()
        .find(|s| s.name == "popup.broadcast")
        .expect("broadcast span");
    assert!(broadcast.fields.contains_key("subscribers"));
    assert!(broadcast.fields.contains_key("duration_us"));
}

#[test]
fn surface_open_and_close_logged_at_info() {
    let capture = with_captured_tracing(|| run_one_cycle(HeadlessHost::new()));
    let info: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.level == tracing::Level::INFO)
        .map(|e| e.message)
        .collect();
    assert!(info.contains(&"overlay surface opened".to_string()));
    assert!(info.contains(&"overlay surface closed".to_string()));
}

#[test]
fn missing_host_logged_at_warn() {
    let capture = with_captured_tracing(|| {
        let rt = PopupRuntime::new(HeadlessHost::<()>::unavailable(), RuntimeSettings::default());
        let _anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| ());
        rt.open("menu");
    });
    let warn = capture
        .events()
        .into_iter()
        .find(|e| e.level == tracing::Level::WARN)
        .expect("warn event");
    assert!(warn.message.contains("not opened"));
    assert_eq!(warn.fields["popup_id"], "menu");
    assert!(warn.fields["error"].contains("no hosting context"));
}

#[test]
fn dropped_trigger_logged_at_debug() {
    let capture = with_captured_tracing(|| {
        let rt = PopupRuntime::new(HeadlessHost::<()>::new(), RuntimeSettings::default());
        let _anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| ());
        rt.open("menu");
        rt.open("menu");
    });
    assert!(
        capture
            .events()
            .iter()
            .any(|e| e.level == tracing::Level::DEBUG && e.message == "open request dropped")
    );
}
