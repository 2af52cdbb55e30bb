//! Bundled reporting backends.

use tracing::field::Empty;

use super::keys::{TAG_MODEL, TAG_PROVIDER};
use super::{AttrValue, InstrumentKind, MetricTags, MetricsSink, SpanHandle, SpanKind, SpanSink, SpanStatus};

/// Emits each LLM call as a `tracing` span named `llm_call`.
///
/// `tracing` needs every field declared when the span is created, so this
/// backend records exactly the keys in [`super::keys`] (tool calls up to index
/// 4). Attributes under any other key are silently dropped. The operation name
/// and kind go to `otel.name` / `otel.kind`, which `tracing-opentelemetry`
/// picks up when bridged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpanSink;

impl SpanSink for TracingSpanSink {
    fn start_span(&self, name: &str, kind: SpanKind) -> Box<dyn SpanHandle> {
        let span = tracing::info_span!(
            target: "llmspan",
            "llm_call",
            "otel.name" = name,
            "otel.kind" = kind.as_str(),
            "otel.status_code" = Empty,
            "otel.status_message" = Empty,
            "openinference.span.kind" = Empty,
            "llm.model_name" = Empty,
            "llm.provider" = Empty,
            "span_type" = Empty,
            "llm.token_count.prompt" = Empty,
            "llm.token_count.completion" = Empty,
            "llm.token_count.total" = Empty,
            "llm.input.message" = Empty,
            "llm.output.message" = Empty,
            "llm.tool_calls.0.name" = Empty,
            "llm.tool_calls.0.arguments" = Empty,
            "llm.tool_calls.1.name" = Empty,
            "llm.tool_calls.1.arguments" = Empty,
            "llm.tool_calls.2.name" = Empty,
            "llm.tool_calls.2.arguments" = Empty,
            "llm.tool_calls.3.name" = Empty,
            "llm.tool_calls.3.arguments" = Empty,
            "llm.tool_calls.4.name" = Empty,
            "llm.tool_calls.4.arguments" = Empty,
            "llm.tool_calls.count" = Empty,
            "llm.tool_calls.names" = Empty,
            "llm.temperature" = Empty,
            "llm.max_tokens" = Empty,
            "llm.top_p" = Empty,
            "llm.top_k" = Empty,
            "llm.stream" = Empty,
            "exception.message" = Empty,
        );
        Box::new(TracingSpan { span: Some(span) })
    }
}

struct TracingSpan {
    span: Option<tracing::Span>,
}

impl SpanHandle for TracingSpan {
    fn is_recording(&self) -> bool {
        self.span.as_ref().is_some_and(|s| !s.is_disabled())
    }

    fn set_attribute(&mut self, key: &str, value: AttrValue) {
        let Some(span) = &self.span else { return };
        match value {
            AttrValue::Bool(v) => span.record(key, v),
            AttrValue::I64(v) => span.record(key, v),
            AttrValue::F64(v) => span.record(key, v),
            AttrValue::Str(v) => span.record(key, v.as_str()),
        };
    }

    fn set_status(&mut self, status: SpanStatus) {
        let Some(span) = &self.span else { return };
        span.record("otel.status_code", status.code());
        if let SpanStatus::Error(message) = &status {
            span.record("otel.status_message", message.as_str());
        }
    }

    fn record_error(&mut self, detail: &str) {
        if let Some(span) = &self.span {
            span.record(super::keys::KEY_EXCEPTION_MESSAGE, detail);
        }
    }

    fn end(&mut self) {
        // Dropping the last handle closes the span.
        self.span.take();
    }
}

/// Discards everything; spans report `is_recording() == false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpanSink;

impl SpanSink for NoopSpanSink {
    fn start_span(&self, _name: &str, _kind: SpanKind) -> Box<dyn SpanHandle> {
        Box::new(NoopSpan)
    }
}

struct NoopSpan;

impl SpanHandle for NoopSpan {
    fn is_recording(&self) -> bool {
        false
    }
    fn set_attribute(&mut self, _key: &str, _value: AttrValue) {}
    fn set_status(&mut self, _status: SpanStatus) {}
    fn record_error(&mut self, _detail: &str) {}
    fn end(&mut self) {}
}

/// Forwards samples to whatever recorder is installed for the `metrics` facade.
/// Without an installed recorder this is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeMetricsSink;

impl MetricsSink for FacadeMetricsSink {
    fn add_counter(&self, name: &str, value: u64, tags: &MetricTags) {
        metrics::counter!(
            name.to_owned(),
            TAG_MODEL => tags.model.clone(),
            TAG_PROVIDER => tags.provider.clone()
        )
        .increment(value);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &MetricTags) {
        metrics::histogram!(
            name.to_owned(),
            TAG_MODEL => tags.model.clone(),
            TAG_PROVIDER => tags.provider.clone()
        )
        .record(value);
    }

    fn describe(&self, name: &str, kind: InstrumentKind, unit: &str, description: &str) {
        let unit = match unit {
            "ms" => metrics::Unit::Milliseconds,
            _ => metrics::Unit::Count,
        };
        match kind {
            InstrumentKind::Counter => {
                metrics::describe_counter!(name.to_owned(), unit, description.to_owned())
            }
            InstrumentKind::Histogram => {
                metrics::describe_histogram!(name.to_owned(), unit, description.to_owned())
            }
        }
    }
}

/// Writes every sample as a `tracing` event on target `llmspan::metrics`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn add_counter(&self, name: &str, value: u64, tags: &MetricTags) {
        tracing::info!(
            target: "llmspan::metrics",
            metric = name,
            value,
            model = %tags.model,
            provider = %tags.provider,
            "counter"
        );
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &MetricTags) {
        tracing::info!(
            target: "llmspan::metrics",
            metric = name,
            value,
            model = %tags.model,
            provider = %tags.provider,
            "histogram"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn add_counter(&self, _name: &str, _value: u64, _tags: &MetricTags) {}
    fn record_histogram(&self, _name: &str, _value: f64, _tags: &MetricTags) {}
}
