//! Usage normalization and attribute text shaping.

use serde_json::Value;

use crate::model::UsageRecord;

/// Canonical usage from a count-based payload (`prompt_eval_count` / `eval_count`,
/// as Ollama reports them). Missing or non-numeric fields count as zero and the
/// total is always the exact sum.
pub fn usage_from_counts(payload: &Value) -> UsageRecord {
    let prompt = count_field(payload, "prompt_eval_count");
    let completion = count_field(payload, "eval_count");
    UsageRecord {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt.saturating_add(completion),
    }
}

/// Lenient read of a canonical usage payload.
///
/// Returns `None` for an empty payload (`null` or `{}`); anything else yields a
/// record, with missing or malformed fields defaulting to zero. `total_tokens` is
/// taken as given, never recomputed.
pub fn usage_from_value(payload: &Value) -> Option<UsageRecord> {
    match payload {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(UsageRecord {
            prompt_tokens: count_field(payload, "prompt_tokens"),
            completion_tokens: count_field(payload, "completion_tokens"),
            total_tokens: count_field(payload, "total_tokens"),
        }),
        other => {
            tracing::debug!(payload = %other, "usage payload is not an object; treating as zero usage");
            Some(UsageRecord::default())
        }
    }
}

/// Usage from a whole provider response: the canonical `usage` object when
/// present, otherwise count-based fields at the top level.
pub fn usage_from_response(response: &Value) -> Option<UsageRecord> {
    if let Some(usage) = response.get("usage")
        && let Some(record) = usage_from_value(usage)
    {
        return Some(record);
    }
    let has_counts = response.get("prompt_eval_count").is_some() || response.get("eval_count").is_some();
    has_counts.then(|| usage_from_counts(response))
}

fn count_field(payload: &Value, key: &str) -> u64 {
    match payload.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Longest prefix of `s` holding at most `max` characters (Unicode scalar values).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_sum_into_total() {
        let usage = usage_from_counts(&json!({"prompt_eval_count": 150, "eval_count": 200}));
        assert_eq!(usage, UsageRecord::new(150, 200, 350));
    }

    #[test]
    fn counts_missing_fields_default_to_zero() {
        assert_eq!(usage_from_counts(&json!({"eval_count": 7})), UsageRecord::new(0, 7, 7));
        assert_eq!(usage_from_counts(&json!({})), UsageRecord::default());
        assert_eq!(usage_from_counts(&json!("nope")), UsageRecord::default());
    }

    #[test]
    fn counts_ignore_negative_and_string_values() {
        let usage = usage_from_counts(&json!({"prompt_eval_count": -3, "eval_count": "12"}));
        assert_eq!(usage, UsageRecord::default());
    }

    #[test]
    fn canonical_total_is_not_recomputed() {
        let usage = usage_from_value(&json!({
            "prompt_tokens": 100,
            "completion_tokens": 20,
            "total_tokens": 90
        }))
        .unwrap();
        assert_eq!(usage.total_tokens, 90);
    }

    #[test]
    fn canonical_empty_is_none_and_malformed_is_zero() {
        assert_eq!(usage_from_value(&json!(null)), None);
        assert_eq!(usage_from_value(&json!({})), None);
        assert_eq!(usage_from_value(&json!([1, 2])), Some(UsageRecord::default()));
        assert_eq!(
            usage_from_value(&json!({"prompt_tokens": "many", "total_tokens": 4})),
            Some(UsageRecord::new(0, 0, 4))
        );
    }

    #[test]
    fn response_prefers_usage_then_counts() {
        let openai = json!({"choices": [], "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}});
        assert_eq!(usage_from_response(&openai), Some(UsageRecord::new(1, 2, 3)));

        let ollama = json!({"message": {"content": "hi"}, "prompt_eval_count": 4, "eval_count": 5});
        assert_eq!(usage_from_response(&ollama), Some(UsageRecord::new(4, 5, 9)));

        assert_eq!(usage_from_response(&json!({"choices": []})), None);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
        let long = "x".repeat(1_500);
        assert_eq!(truncate_chars(&long, 1_000).len(), 1_000);
    }
}
