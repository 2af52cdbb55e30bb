//! Reporting interfaces for LLM spans and metrics.
//!
//! The instrumentation talks to its backends only through [`SpanSink`] /
//! [`SpanHandle`] and [`MetricsSink`]. Bundled backends live in [`backend`];
//! anything implementing the traits (an OpenTelemetry bridge, a test fake) works.

pub mod backend;
pub mod keys;
pub mod types;
#[cfg(test)]
pub mod test_span;
#[cfg(test)]
pub mod testing;

pub use backend::{FacadeMetricsSink, LogMetricsSink, NoopMetricsSink, NoopSpanSink, TracingSpanSink};
pub use keys::*;
pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Starts spans. Implementations must be thread-safe (`Send + Sync`) and `'static`;
/// many LLM calls may be in flight at once.
pub trait SpanSink: Send + Sync + 'static {
    fn start_span(&self, name: &str, kind: SpanKind) -> Box<dyn SpanHandle>;
}

/// One live span. Owned by exactly one instrumentation scope.
///
/// Methods must not panic; this runs on the caller's request path.
pub trait SpanHandle: Send {
    /// `false` when the backend drops everything (sampling, no subscriber).
    fn is_recording(&self) -> bool {
        true
    }
    fn set_attribute(&mut self, key: &str, value: AttrValue);
    fn set_status(&mut self, status: SpanStatus);
    fn record_error(&mut self, detail: &str);
    fn end(&mut self);
}

/// Receives metric samples. Same thread-safety requirements as [`SpanSink`].
pub trait MetricsSink: Send + Sync + 'static {
    fn add_counter(&self, name: &str, value: u64, tags: &MetricTags);
    fn record_histogram(&self, name: &str, value: f64, tags: &MetricTags);

    /// Called once per instrument when the recorder is built.
    fn describe(&self, _name: &str, _kind: InstrumentKind, _unit: &str, _description: &str) {}
}

/// The process-wide reporting handles, constructed explicitly and shared by
/// every span through [`crate::span::Instrumentor`].
#[derive(Clone)]
pub struct TelemetryContext {
    pub spans: Arc<dyn SpanSink>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl TelemetryContext {
    pub fn new(spans: Arc<dyn SpanSink>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { spans, metrics }
    }

    /// `tracing` spans plus the `metrics` facade.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSpanSink), Arc::new(FacadeMetricsSink))
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSpanSink), Arc::new(NoopMetricsSink))
    }
}

impl std::fmt::Debug for TelemetryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryContext").finish_non_exhaustive()
    }
}

static GLOBAL_CONTEXT: OnceCell<TelemetryContext> = OnceCell::new();

/// Install the process-wide default context. Returns `false` if one is already installed.
///
/// Write-once for the process lifetime. Code that can take a context explicitly should.
pub fn set_global_context(ctx: TelemetryContext) -> bool {
    GLOBAL_CONTEXT.set(ctx).is_ok()
}

/// The installed default context, or no-op sinks when none was installed.
pub fn global_context() -> TelemetryContext {
    GLOBAL_CONTEXT.get().cloned().unwrap_or_else(TelemetryContext::noop)
}
