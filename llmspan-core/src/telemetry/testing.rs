//! Recording fakes for the reporting traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{AttrValue, MetricTags, MetricsSink, SpanHandle, SpanKind, SpanSink, SpanStatus, TelemetryContext};

#[derive(Debug, Clone, Default)]
pub struct RecordedSpan {
    pub name: String,
    pub kind: Option<SpanKind>,
    pub attributes: HashMap<String, AttrValue>,
    pub status: Option<SpanStatus>,
    pub errors: Vec<String>,
    pub end_calls: usize,
}

impl RecordedSpan {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn str_attr(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingSpanSink {
    pub spans: Mutex<Vec<Arc<Mutex<RecordedSpan>>>>,
    /// Spans report `is_recording() == false` when set.
    pub non_recording: bool,
}

impl RecordingSpanSink {
    pub fn snapshot(&self) -> Vec<RecordedSpan> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.lock().unwrap().clone())
            .collect()
    }

    pub fn only(&self) -> RecordedSpan {
        let spans = self.snapshot();
        assert_eq!(spans.len(), 1, "expected exactly one span, got {spans:?}");
        spans.into_iter().next().unwrap()
    }
}

impl SpanSink for RecordingSpanSink {
    fn start_span(&self, name: &str, kind: SpanKind) -> Box<dyn SpanHandle> {
        let span = Arc::new(Mutex::new(RecordedSpan {
            name: name.to_string(),
            kind: Some(kind),
            ..Default::default()
        }));
        self.spans.lock().unwrap().push(span.clone());
        Box::new(RecordingHandle {
            span,
            recording: !self.non_recording,
        })
    }
}

struct RecordingHandle {
    span: Arc<Mutex<RecordedSpan>>,
    recording: bool,
}

impl SpanHandle for RecordingHandle {
    fn is_recording(&self) -> bool {
        self.recording
    }
    fn set_attribute(&mut self, key: &str, value: AttrValue) {
        self.span.lock().unwrap().attributes.insert(key.to_string(), value);
    }
    fn set_status(&mut self, status: SpanStatus) {
        self.span.lock().unwrap().status = Some(status);
    }
    fn record_error(&mut self, detail: &str) {
        self.span.lock().unwrap().errors.push(detail.to_string());
    }
    fn end(&mut self) {
        self.span.lock().unwrap().end_calls += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Counter { name: String, value: u64, tags: MetricTags },
    Histogram { name: String, value: f64, tags: MetricTags },
}

impl Sample {
    pub fn name(&self) -> &str {
        match self {
            Self::Counter { name, .. } | Self::Histogram { name, .. } => name,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    pub samples: Mutex<Vec<Sample>>,
    pub described: Mutex<Vec<String>>,
}

impl RecordingMetricsSink {
    pub fn named(&self, name: &str) -> Vec<Sample> {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name() == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}

impl MetricsSink for RecordingMetricsSink {
    fn add_counter(&self, name: &str, value: u64, tags: &MetricTags) {
        self.samples.lock().unwrap().push(Sample::Counter {
            name: name.to_string(),
            value,
            tags: tags.clone(),
        });
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &MetricTags) {
        self.samples.lock().unwrap().push(Sample::Histogram {
            name: name.to_string(),
            value,
            tags: tags.clone(),
        });
    }

    fn describe(&self, name: &str, _kind: super::InstrumentKind, _unit: &str, _description: &str) {
        self.described.lock().unwrap().push(name.to_string());
    }
}

/// A context wired to fresh recording sinks, plus handles to inspect them.
pub fn recording_context() -> (TelemetryContext, Arc<RecordingSpanSink>, Arc<RecordingMetricsSink>) {
    let spans = Arc::new(RecordingSpanSink::default());
    let metrics = Arc::new(RecordingMetricsSink::default());
    let ctx = TelemetryContext::new(spans.clone(), metrics.clone());
    (ctx, spans, metrics)
}
