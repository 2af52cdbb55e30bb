//! Process-wide LLM call instruments: request counter, token counter and
//! duration histogram, all tagged by model and provider.

use std::sync::Arc;

use crate::config::MetricsCfg;
use crate::model::UsageRecord;
use crate::telemetry::{InstrumentKind, MetricTags, MetricsSink};

#[derive(Clone)]
pub struct LlmMetrics {
    sink: Arc<dyn MetricsSink>,
    names: MetricsCfg,
}

impl LlmMetrics {
    /// Register the three instruments with the sink. Build once per process and clone.
    pub fn new(sink: Arc<dyn MetricsSink>, names: MetricsCfg) -> Self {
        sink.describe(
            &names.requests,
            InstrumentKind::Counter,
            "requests",
            "Total LLM API requests by provider and model",
        );
        sink.describe(
            &names.tokens,
            InstrumentKind::Counter,
            "tokens",
            "Total tokens consumed by LLM API calls",
        );
        sink.describe(
            &names.duration,
            InstrumentKind::Histogram,
            "ms",
            "LLM API request duration distribution",
        );
        Self { sink, names }
    }

    /// One completed call: always a request and a duration sample, tokens only
    /// when the reported total is positive.
    pub fn record_call(&self, tags: &MetricTags, duration_ms: f64, usage: Option<&UsageRecord>) {
        self.sink.add_counter(&self.names.requests, 1, tags);
        self.sink.record_histogram(&self.names.duration, duration_ms, tags);
        if let Some(usage) = usage
            && usage.total_tokens > 0
        {
            self.sink.add_counter(&self.names.tokens, usage.total_tokens, tags);
        }
    }

    pub fn names(&self) -> &MetricsCfg {
        &self.names
    }
}

impl std::fmt::Debug for LlmMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmMetrics").field("names", &self.names).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::{RecordingMetricsSink, Sample};

    fn recorder() -> (LlmMetrics, Arc<RecordingMetricsSink>) {
        let sink = Arc::new(RecordingMetricsSink::default());
        (LlmMetrics::new(sink.clone(), MetricsCfg::default()), sink)
    }

    #[test]
    fn describes_instruments_once() {
        let (_metrics, sink) = recorder();
        let described = sink.described.lock().unwrap().clone();
        assert_eq!(
            described,
            ["llm.requests.total", "llm.tokens.total", "llm.request.duration"].map(String::from)
        );
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn records_tokens_only_when_positive() {
        let (metrics, sink) = recorder();
        let tags = MetricTags::new("gpt-4o", "openai");

        metrics.record_call(&tags, 12.5, None);
        metrics.record_call(&tags, 3.0, Some(&UsageRecord::new(5, 0, 0)));
        metrics.record_call(&tags, 7.0, Some(&UsageRecord::new(1, 2, 3)));

        assert_eq!(sink.named("llm.requests.total").len(), 3);
        assert_eq!(sink.named("llm.request.duration").len(), 3);
        let tokens = sink.named("llm.tokens.total");
        assert_eq!(
            tokens,
            vec![Sample::Counter {
                name: "llm.tokens.total".into(),
                value: 3,
                tags: tags.clone()
            }]
        );
    }
}
