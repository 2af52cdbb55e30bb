//! Scoped instrumentation of a single LLM call.
//!
//! ```rust,ignore
//! let instrumentor = Instrumentor::new(TelemetryContext::tracing());
//! let mut span = instrumentor.open("gpt-4o", "openai");
//! span.set_input(&messages);
//! span.set_invocation_parameters(&params);
//! let resp = span.observe(client.chat(req)).await?;
//! span.set_usage(resp.usage);
//! span.set_output(Some(&resp.text), None);
//! span.close();
//! ```
//!
//! Setters never fail and never panic on bad input: anything that cannot be
//! recorded is logged and skipped. The span is closed exactly once, either
//! explicitly or, when it is dropped open (cancelled future, early return,
//! panic), as an error.

use std::fmt;
use std::future::IntoFuture;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::config::{Config, LimitsCfg};
use crate::error::{CoreResult, InstrumentError};
use crate::metrics::LlmMetrics;
use crate::model::{ChatMessage, MessageContent, OpenAiToolCall, Role, UsageRecord};
use crate::normalizer::{truncate_chars, usage_from_value};
use crate::provider::detect_provider_from_url;
use crate::telemetry::keys::*;
use crate::telemetry::{
    AttrValue, CallSummary, MetricTags, SpanHandle, SpanKind, SpanStatus, TelemetryContext,
};
use crate::tool_calls;

/// Opens [`LlmSpan`]s against a shared telemetry context. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Instrumentor {
    ctx: TelemetryContext,
    metrics: LlmMetrics,
    limits: LimitsCfg,
}

impl Instrumentor {
    pub fn new(ctx: TelemetryContext) -> Self {
        Self::with_config(ctx, &Config::default())
    }

    pub fn with_config(ctx: TelemetryContext, cfg: &Config) -> Self {
        let metrics = LlmMetrics::new(ctx.metrics.clone(), cfg.metrics.clone());
        Self {
            ctx,
            metrics,
            limits: cfg.limits.clone(),
        }
    }

    /// Instrumentor over [`crate::telemetry::global_context`].
    pub fn from_global() -> Self {
        Self::new(crate::telemetry::global_context())
    }

    /// Open a span named `llm.<provider>.chat`.
    pub fn open(&self, model: impl Into<String>, provider: impl Into<String>) -> LlmSpan {
        self.open_named(model, provider, None)
    }

    /// Open a span with the provider detected from the endpoint URL.
    pub fn open_for_endpoint(&self, model: impl Into<String>, url: &str) -> LlmSpan {
        self.open_named(model, detect_provider_from_url(url), None)
    }

    pub fn open_named(
        &self,
        model: impl Into<String>,
        provider: impl Into<String>,
        operation_name: Option<&str>,
    ) -> LlmSpan {
        let model = non_empty_or_unknown(model.into(), "model");
        let provider = non_empty_or_unknown(provider.into(), "provider");
        let operation_name = operation_name
            .filter(|n| !n.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("llm.{provider}.chat"));

        let mut handle = self.ctx.spans.start_span(&operation_name, SpanKind::Client);
        handle.set_attribute(KEY_SPAN_KIND, SPAN_KIND_LLM.into());
        handle.set_attribute(KEY_MODEL, model.as_str().into());
        handle.set_attribute(KEY_PROVIDER, provider.as_str().into());
        handle.set_attribute(KEY_SPAN_TYPE, SPAN_TYPE_LLM.into());

        tracing::debug!(operation = %operation_name, %model, %provider, "started LLM span");

        LlmSpan {
            handle,
            metrics: self.metrics.clone(),
            limits: self.limits.clone(),
            tags: MetricTags::new(model, provider),
            operation_name,
            started_at: SystemTime::now(),
            start: Instant::now(),
            usage: None,
            tool_names: Vec::new(),
            state: State::Open,
        }
    }
}

fn non_empty_or_unknown(value: String, what: &'static str) -> String {
    if value.trim().is_empty() {
        tracing::warn!(field = what, "empty identifier for LLM span; using \"unknown\"");
        "unknown".to_string()
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

struct Failure {
    message: String,
    detail: String,
}

impl Failure {
    fn from_error<E: fmt::Display + fmt::Debug + ?Sized>(err: &E) -> Self {
        Self {
            message: err.to_string(),
            detail: format!("{err:?}"),
        }
    }

    fn abandoned(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: message.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum ParamType {
    Float,
    Int,
    Bool,
}

const INVOCATION_PARAMS: &[(&str, &str, ParamType)] = &[
    ("temperature", KEY_TEMPERATURE, ParamType::Float),
    ("max_tokens", KEY_MAX_TOKENS, ParamType::Int),
    ("top_p", KEY_TOP_P, ParamType::Float),
    ("top_k", KEY_TOP_K, ParamType::Int),
    ("stream", KEY_STREAM, ParamType::Bool),
];

/// One in-flight LLM call.
pub struct LlmSpan {
    handle: Box<dyn SpanHandle>,
    metrics: LlmMetrics,
    limits: LimitsCfg,
    tags: MetricTags,
    operation_name: String,
    started_at: SystemTime,
    start: Instant,
    usage: Option<UsageRecord>,
    tool_names: Vec<String>,
    state: State,
}

impl LlmSpan {
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn model(&self) -> &str {
        &self.tags.model
    }

    pub fn provider(&self) -> &str {
        &self.tags.provider
    }

    pub fn usage(&self) -> Option<&UsageRecord> {
        self.usage.as_ref()
    }

    pub fn tool_call_names(&self) -> &[String] {
        &self.tool_names
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    fn is_active(&self) -> bool {
        self.is_open() && self.handle.is_recording()
    }

    fn attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.handle.set_attribute(key, value.into());
    }

    /// Run a fallible recording step; an error is logged and dropped.
    fn guarded<F>(&mut self, what: &'static str, f: F)
    where
        F: FnOnce(&mut Self) -> CoreResult<()>,
    {
        if let Err(e) = f(self) {
            tracing::warn!(
                operation = %self.operation_name,
                setter = what,
                error = %e,
                "failed to record LLM span attribute"
            );
        }
    }

    /// Store usage for the token metric and set the token-count attributes.
    /// A span that is not recording keeps no usage and emits no token sample.
    pub fn set_usage(&mut self, usage: UsageRecord) {
        if !self.is_active() {
            return;
        }
        self.usage = Some(usage);
        self.attr(KEY_TOKENS_PROMPT, usage.prompt_tokens);
        self.attr(KEY_TOKENS_COMPLETION, usage.completion_tokens);
        self.attr(KEY_TOKENS_TOTAL, usage.total_tokens);
        tracing::debug!(
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            total = usage.total_tokens,
            "set token usage"
        );
    }

    /// Raw `{prompt_tokens, completion_tokens, total_tokens}` payload. Empty is a
    /// no-op, malformed reads as zero usage.
    pub fn set_usage_value(&mut self, payload: &Value) {
        if let Some(usage) = usage_from_value(payload) {
            self.set_usage(usage);
        }
    }

    /// Capture the text of the last user message.
    pub fn set_input(&mut self, messages: &[ChatMessage]) {
        if !self.is_active() {
            return;
        }
        if let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) {
            self.record_input(last_user);
        }
    }

    /// Same as [`Self::set_input`] for an unparsed OpenAI-style message list.
    pub fn set_input_value(&mut self, messages: &Value) {
        if !self.is_active() || messages.is_null() {
            return;
        }
        self.guarded("set_input", |span| {
            let entries = messages
                .as_array()
                .ok_or_else(|| InstrumentError::InvalidPayload("messages must be a list".into()))?;
            let last_user = entries
                .iter()
                .rev()
                .find(|m| m.get("role").and_then(Value::as_str) == Some("user"));
            if let Some(raw) = last_user {
                let message: ChatMessage = serde_json::from_value(raw.clone())?;
                span.record_input(&message);
            }
            Ok(())
        });
    }

    /// Missing content records an empty input message.
    fn record_input(&mut self, message: &ChatMessage) {
        let text = message
            .content
            .as_ref()
            .map(MessageContent::to_text)
            .unwrap_or_default();
        let limit = self.limits.input_chars;
        let kept = truncate_chars(&text, limit);
        if kept.len() < text.len() {
            tracing::debug!(chars = text.chars().count(), limit, "truncated input message");
        }
        self.attr(KEY_INPUT_MESSAGE, kept);
    }

    /// Capture the response text and any tool calls.
    ///
    /// Without explicit tool calls, the full (untruncated) content is checked for
    /// an embedded `{"tool_calls": [...]}` object. Explicit tool calls always win.
    pub fn set_output(&mut self, content: Option<&str>, tool_calls: Option<&[OpenAiToolCall]>) {
        if !self.is_active() {
            return;
        }
        let explicit = tool_calls
            .filter(|calls| !calls.is_empty())
            .map(|calls| calls.iter().cloned().enumerate().collect());
        self.record_output(content, explicit);
    }

    /// [`Self::set_output`] with tool calls as raw JSON in either shape.
    ///
    /// Any supplied value other than `null`, `[]` or another empty value counts as
    /// explicit and suppresses embedded recovery, even when none of its entries
    /// parse.
    pub fn set_output_value(&mut self, content: Option<&str>, tool_calls: Option<&Value>) {
        if !self.is_active() {
            return;
        }
        let mut explicit = None;
        if let Some(raw) = tool_calls.filter(|v| truthy(v)) {
            explicit = Some(Vec::new());
            self.guarded("set_output", |_| {
                explicit = Some(tool_calls::parse_any_indexed(raw)?);
                Ok(())
            });
        }
        self.record_output(content, explicit);
    }

    /// `explicit` is `Some` when the caller supplied tool calls, parsed or not.
    fn record_output(&mut self, content: Option<&str>, explicit: Option<Vec<(usize, OpenAiToolCall)>>) {
        let mut recovered = None;

        if let Some(content) = content.filter(|c| !c.is_empty()) {
            let limit = self.limits.output_chars;
            let kept = truncate_chars(content, limit);
            if kept.len() < content.len() {
                tracing::debug!(chars = content.chars().count(), limit, "truncated output message");
            }
            self.attr(KEY_OUTPUT_MESSAGE, kept);

            if explicit.is_none() {
                recovered = tool_calls::extract_embedded(content);
            }
        }

        if let Some(calls) = explicit {
            self.record_tool_calls(calls);
        } else if let Some(calls) = recovered {
            self.record_tool_calls(calls.into_iter().enumerate().collect());
        }
    }

    /// Record OpenAI-shaped tool calls: the first few individually by index, all
    /// of them in the count and the comma-joined names.
    pub fn set_tool_calls(&mut self, calls: &[OpenAiToolCall]) {
        if calls.is_empty() || !self.is_active() {
            return;
        }
        self.record_tool_calls(calls.iter().cloned().enumerate().collect());
    }

    /// [`Self::set_tool_calls`] for a raw list in either shape.
    ///
    /// Per-index attributes use each entry's position in the raw list, so an
    /// unrecognized entry leaves its index unused: `["garbage", {"function":
    /// {"name": "a"}}]` records `llm.tool_calls.1.name`. Count and names cover
    /// only the recognized entries.
    pub fn set_tool_calls_value(&mut self, calls: &Value) {
        if !self.is_active() || calls.is_null() {
            return;
        }
        self.guarded("set_tool_calls", |span| {
            let calls = tool_calls::parse_any_indexed(calls)?;
            span.record_tool_calls(calls);
            Ok(())
        });
    }

    fn record_tool_calls(&mut self, calls: Vec<(usize, OpenAiToolCall)>) {
        if calls.is_empty() {
            tracing::debug!(operation = %self.operation_name, "no usable tool calls to record");
            return;
        }
        let indexed = self.limits.indexed_tool_calls;
        let arg_limit = self.limits.tool_argument_chars;

        let mut names = Vec::with_capacity(calls.len());
        for (i, call) in calls {
            let call = call.to_canonical();
            if i < indexed {
                self.attr(&tool_call_name_key(i), call.name.as_str());
                if let Some(args) = &call.arguments {
                    self.attr(&tool_call_arguments_key(i), truncate_chars(args, arg_limit));
                }
            }
            names.push(call.name);
        }

        self.attr(KEY_TOOL_CALLS_COUNT, names.len());
        self.attr(KEY_TOOL_CALLS_NAMES, names.join(","));
        tracing::debug!(count = names.len(), names = ?names, "captured tool calls");
        self.tool_names = names;
    }

    /// Record temperature, max_tokens, top_p, top_k and stream from a request's
    /// parameter map. A value that cannot be coerced skips only that parameter.
    pub fn set_invocation_parameters(&mut self, params: &Value) {
        if !self.is_active() || params.is_null() {
            return;
        }
        let Some(params) = params.as_object() else {
            self.guarded("set_invocation_parameters", |_| {
                Err(InstrumentError::InvalidPayload("invocation parameters must be an object".into()))
            });
            return;
        };
        for &(param, key, ty) in INVOCATION_PARAMS {
            let Some(raw) = params.get(param) else { continue };
            self.guarded("set_invocation_parameters", |span| {
                let value = coerce(param, raw, ty)?;
                span.attr(key, value);
                Ok(())
            });
        }
    }

    /// Close with OK status. Returns `None` if the span was already closed.
    pub fn close(&mut self) -> Option<CallSummary> {
        self.finalize(None)
    }

    /// Close with ERROR status carrying `err`'s message; the `Debug` form is
    /// recorded as the error detail.
    pub fn close_with_error<E>(&mut self, err: &E) -> Option<CallSummary>
    where
        E: fmt::Display + fmt::Debug + ?Sized,
    {
        self.finalize(Some(Failure::from_error(err)))
    }

    /// Close according to the wrapped call's outcome.
    pub fn finish<T, E>(&mut self, result: &Result<T, E>) -> Option<CallSummary>
    where
        E: fmt::Display + fmt::Debug,
    {
        match result {
            Ok(_) => self.close(),
            Err(e) => self.close_with_error(e),
        }
    }

    /// Await the wrapped call. A failure closes the span as ERROR; the result is
    /// handed back untouched either way. On success the span stays open for
    /// usage and output.
    pub async fn observe<F, T, E>(&mut self, call: F) -> Result<T, E>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let result = call.await;
        if let Err(e) = &result {
            self.close_with_error(e);
        }
        result
    }

    fn finalize(&mut self, failure: Option<Failure>) -> Option<CallSummary> {
        if self.state == State::Closed {
            tracing::debug!(operation = %self.operation_name, "LLM span already closed");
            return None;
        }
        // Flip first so nothing below can trigger a second emission.
        self.state = State::Closed;

        let elapsed = self.start.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1_000.0;
        self.metrics.record_call(&self.tags, duration_ms, self.usage.as_ref());

        let status = match failure {
            Some(failure) => {
                tracing::error!(
                    operation = %self.operation_name,
                    model = %self.tags.model,
                    provider = %self.tags.provider,
                    error = %failure.message,
                    detail = %failure.detail,
                    "LLM span failed"
                );
                self.handle.set_status(SpanStatus::Error(failure.message.clone()));
                self.handle.record_error(&failure.detail);
                SpanStatus::Error(failure.message)
            }
            None => {
                self.handle.set_status(SpanStatus::Ok);
                tracing::debug!(operation = %self.operation_name, duration_ms, "completed LLM span");
                SpanStatus::Ok
            }
        };

        self.handle.end();

        Some(CallSummary {
            operation_name: self.operation_name.clone(),
            model: self.tags.model.clone(),
            provider: self.tags.provider.clone(),
            started_at_ms: epoch_ms(self.started_at),
            ended_at_ms: epoch_ms(self.started_at + elapsed),
            duration_ms,
            usage: self.usage,
            status,
            tool_calls: self.tool_names.clone(),
        })
    }
}

impl Drop for LlmSpan {
    fn drop(&mut self) {
        if self.state == State::Open {
            let failure = if std::thread::panicking() {
                Failure::abandoned("panicked while the LLM call was in flight")
            } else {
                Failure::abandoned("LLM call cancelled before the span was closed")
            };
            self.finalize(Some(failure));
        }
    }
}

impl fmt::Debug for LlmSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSpan")
            .field("operation_name", &self.operation_name)
            .field("model", &self.tags.model)
            .field("provider", &self.tags.provider)
            .field("state", &self.state)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

fn epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn coerce(param: &'static str, raw: &Value, ty: ParamType) -> CoreResult<AttrValue> {
    let fail = |expected: &'static str| InstrumentError::Coercion {
        param,
        expected,
        value: raw.to_string(),
    };
    match ty {
        ParamType::Float => match raw {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .map(AttrValue::F64)
        .ok_or_else(|| fail("float")),
        ParamType::Int => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .map(AttrValue::I64)
        .ok_or_else(|| fail("int")),
        ParamType::Bool => Ok(AttrValue::Bool(truthy(raw))),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
