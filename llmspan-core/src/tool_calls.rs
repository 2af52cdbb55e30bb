//! Tool-call extraction and conversion.
//!
//! Tool calls reach the span in two shapes: OpenAI's
//! `{"type": "function", "function": {"name", "arguments"}}` and the compact
//! `{"name", "parameters"}` form some bots embed as JSON inside their plain-text
//! response. Everything is resolved to [`OpenAiToolCall`] before attribution.

use std::io::{self, Write as _};

use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreResult, InstrumentError};
use crate::model::{AnyToolCall, CompactToolCall, FunctionCall, OpenAiToolCall};

/// Convert compact tool calls to the OpenAI shape, preserving order.
/// Missing parameters serialize as `{}`.
pub fn convert_compact(calls: &[CompactToolCall]) -> Vec<OpenAiToolCall> {
    calls
        .iter()
        .filter_map(|call| {
            let empty = Value::Object(Default::default());
            let params = call.parameters.as_ref().unwrap_or(&empty);
            match to_spaced_json(params) {
                Ok(arguments) => Some(OpenAiToolCall {
                    id: None,
                    kind: "function".into(),
                    function: FunctionCall {
                        name: Some(call.name.clone()),
                        arguments: Some(Value::String(arguments)),
                    },
                }),
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "dropping tool call with unserializable parameters");
                    None
                }
            }
        })
        .collect()
}

/// Parse a raw list of compact tool calls, dropping entries without a string `name`.
pub fn parse_compact(raw: &Value) -> Vec<CompactToolCall> {
    let Some(entries) = raw.as_array() else {
        tracing::debug!("embedded tool_calls is not a list; ignoring");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<CompactToolCall>(entry.clone()) {
            Ok(call) => Some(call),
            Err(e) => {
                tracing::debug!(error = %e, "skipping compact tool call without a name");
                None
            }
        })
        .collect()
}

/// Convenience: raw compact list straight to the OpenAI shape.
pub fn convert_compact_value(raw: &Value) -> Vec<OpenAiToolCall> {
    convert_compact(&parse_compact(raw))
}

/// Recover tool calls smuggled inside a response body such as
/// `{"tool_calls": [{"name": "calculate", "parameters": {"expr": "2+2"}}]}`.
///
/// Returns `None` when the content is not a JSON object with a `tool_calls`
/// key. Non-JSON content is the common case and is not an error.
pub fn extract_embedded(content: &str) -> Option<Vec<OpenAiToolCall>> {
    let parsed: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!(error = %e, "response content is not JSON");
            return None;
        }
    };
    let embedded = parsed.as_object()?.get("tool_calls")?;
    let converted = convert_compact_value(embedded);
    tracing::debug!(count = converted.len(), "recovered embedded tool calls from response content");
    Some(converted)
}

/// Parse a raw list of tool calls in either shape, normalizing compact entries.
/// Entries matching neither shape are dropped.
pub fn parse_any(raw: &Value) -> CoreResult<Vec<OpenAiToolCall>> {
    Ok(parse_any_indexed(raw)?.into_iter().map(|(_, call)| call).collect())
}

/// [`parse_any`], keeping each call's position in the raw list.
pub fn parse_any_indexed(raw: &Value) -> CoreResult<Vec<(usize, OpenAiToolCall)>> {
    let entries = raw
        .as_array()
        .ok_or_else(|| InstrumentError::InvalidPayload("tool_calls must be a list".into()))?;
    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<AnyToolCall>(entry.clone()) {
            Ok(AnyToolCall::OpenAi(call)) => out.push((i, call)),
            Ok(AnyToolCall::Compact(call)) => {
                out.extend(convert_compact(std::slice::from_ref(&call)).into_iter().map(|c| (i, c)))
            }
            Err(_) => tracing::debug!(entry = %entry, "skipping unrecognized tool call entry"),
        }
    }
    Ok(out)
}

/// JSON with `", "` and `": "` separators, e.g. `{"city": "Paris"}`. Key order
/// is preserved as received. Non-ASCII characters are written as lowercase
/// `\uXXXX` escapes (surrogate pairs above the BMP), so `"París"` becomes
/// `"Par\u00eds"`.
pub fn to_spaced_json<T: Serialize + ?Sized>(value: &T) -> CoreResult<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| InstrumentError::Other(e.into()))
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}
