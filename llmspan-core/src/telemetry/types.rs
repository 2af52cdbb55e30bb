use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::UsageRecord;

/// Value of a span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}
impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        Self::I64(i64::try_from(v).unwrap_or(i64::MAX))
    }
}
impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        Self::I64(i64::try_from(v).unwrap_or(i64::MAX))
    }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}
impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Client,
    Internal,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "message", rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error(_) => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Tags attached to every metric sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricTags {
    pub model: String,
    pub provider: String,
}

impl MetricTags {
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
        }
    }

    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (super::keys::TAG_MODEL, self.model.as_str()),
            (super::keys::TAG_PROVIDER, self.provider.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    Histogram,
}

/// What a closed span reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSummary {
    pub operation_name: String,
    pub model: String,
    pub provider: String,
    /// Unix epoch milliseconds
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: f64,
    pub usage: Option<UsageRecord>,
    pub status: SpanStatus,
    pub tool_calls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_summary_serializes() {
        let summary = CallSummary {
            operation_name: "llm.openai.chat".into(),
            model: "gpt-4o".into(),
            provider: "openai".into(),
            started_at_ms: 1_000,
            ended_at_ms: 1_042,
            duration_ms: 42.0,
            usage: Some(UsageRecord::new(10, 20, 30)),
            status: SpanStatus::Error("boom".into()),
            tool_calls: vec!["get_weather".into()],
        };

        let as_json = serde_json::to_value(&summary).unwrap();
        assert_eq!(as_json["operation_name"], json!("llm.openai.chat"));
        assert_eq!(as_json["usage"]["total_tokens"], json!(30));
        assert_eq!(as_json["status"], json!({"code": "ERROR", "message": "boom"}));
        assert_eq!(as_json["tool_calls"], json!(["get_weather"]));
    }

    #[test]
    fn attr_value_conversions_saturate() {
        assert_eq!(AttrValue::from(u64::MAX), AttrValue::I64(i64::MAX));
        assert_eq!(AttrValue::from(3usize), AttrValue::I64(3));
        assert_eq!(AttrValue::from("x").to_string(), "x");
    }

    #[test]
    fn tags_pair_up_in_fixed_order() {
        let tags = MetricTags::new("gpt-4o", "openai");
        assert_eq!(tags.pairs(), [("model", "gpt-4o"), ("provider", "openai")]);
    }
}
