/// Span attribute keys for LLM calls (OpenInference naming).
/// Keep these stable; changing them is a breaking change for dashboards.
/// `TracingSpanSink` declares the same literals; add new keys in both places.
pub const KEY_SPAN_KIND: &str = "openinference.span.kind";
pub const KEY_MODEL: &str = "llm.model_name";
pub const KEY_PROVIDER: &str = "llm.provider";
pub const KEY_SPAN_TYPE: &str = "span_type";

pub const KEY_TOKENS_PROMPT: &str = "llm.token_count.prompt";
pub const KEY_TOKENS_COMPLETION: &str = "llm.token_count.completion";
pub const KEY_TOKENS_TOTAL: &str = "llm.token_count.total";

pub const KEY_INPUT_MESSAGE: &str = "llm.input.message";
pub const KEY_OUTPUT_MESSAGE: &str = "llm.output.message";

pub const KEY_TOOL_CALLS_COUNT: &str = "llm.tool_calls.count";
pub const KEY_TOOL_CALLS_NAMES: &str = "llm.tool_calls.names";

pub const KEY_TEMPERATURE: &str = "llm.temperature";
pub const KEY_MAX_TOKENS: &str = "llm.max_tokens";
pub const KEY_TOP_P: &str = "llm.top_p";
pub const KEY_TOP_K: &str = "llm.top_k";
pub const KEY_STREAM: &str = "llm.stream";

/// Error detail recorded alongside an ERROR status
pub const KEY_EXCEPTION_MESSAGE: &str = "exception.message";

pub const SPAN_KIND_LLM: &str = "LLM";
pub const SPAN_TYPE_LLM: &str = "llm";

/// Metric tag keys.
pub const TAG_MODEL: &str = "model";
pub const TAG_PROVIDER: &str = "provider";

/// `llm.tool_calls.{index}.name`
pub fn tool_call_name_key(index: usize) -> String {
    format!("llm.tool_calls.{index}.name")
}

/// `llm.tool_calls.{index}.arguments`
pub fn tool_call_arguments_key(index: usize) -> String {
    format!("llm.tool_calls.{index}.arguments")
}
