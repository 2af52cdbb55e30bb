#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{span, Subscriber};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

#[derive(Default, Debug)]
pub struct SpanData {
    pub name: String,
    pub fields: Mutex<HashMap<String, String>>, // stringified values; strings keep their quotes
    pub closed: Mutex<bool>,
}

/// One captured event: its target and stringified fields.
#[derive(Clone, Debug)]
pub struct EventData {
    pub target: String,
    pub fields: HashMap<String, String>,
}

#[derive(Default, Debug)]
pub struct SpanStore {
    pub spans: Mutex<HashMap<tracing::span::Id, Arc<SpanData>>>,
    pub events: Mutex<Vec<EventData>>,
}

impl SpanStore {
    /// All captured spans with the given name, in no particular order.
    pub fn named(&self, name: &str) -> Vec<Arc<SpanData>> {
        self.spans
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.name == name)
            .cloned()
            .collect()
    }

    /// Events on `target`, in emission order.
    pub fn events_for(&self, target: &str) -> Vec<EventData> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.target == target)
            .cloned()
            .collect()
    }
}

impl SpanData {
    pub fn field(&self, key: &str) -> Option<String> {
        self.fields.lock().unwrap().get(key).cloned()
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    pub store: Arc<SpanStore>,
}

struct MapVisitor<'a> {
    map: &'a mut HashMap<String, String>,
}

impl Visit for MapVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.map.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.map.insert(field.name().to_string(), format!("\"{}\"", value));
    }
    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.map.insert(field.name().to_string(), format!("{value}"));
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: Context<'_, S>) {
        let name = attrs.metadata().name().to_string();
        let data = Arc::new(SpanData { name, ..Default::default() });
        {
            let mut map = data.fields.lock().unwrap();
            attrs.record(&mut MapVisitor { map: &mut map });
        }
        self.store.spans.lock().unwrap().insert(id.clone(), data);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        if let Some(data) = self.store.spans.lock().unwrap().get(id) {
            let mut map = data.fields.lock().unwrap();
            values.record(&mut MapVisitor { map: &mut map });
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut MapVisitor { map: &mut fields });
        self.store.events.lock().unwrap().push(EventData {
            target: event.metadata().target().to_string(),
            fields,
        });
    }

    fn on_close(&self, id: span::Id, _ctx: Context<'_, S>) {
        if let Some(data) = self.store.spans.lock().unwrap().get(&id) {
            *data.closed.lock().unwrap() = true;
        }
    }
}

static GUARDS: once_cell::sync::Lazy<Mutex<Vec<tracing::subscriber::DefaultGuard>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Vec::new()));

/// Capture spans created on the current thread for the rest of the test.
pub fn install_capture() -> Arc<SpanStore> {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let layer = CaptureLayer { store: store.clone() };
    let subscriber = registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    GUARDS.lock().unwrap().push(guard);
    store
}
