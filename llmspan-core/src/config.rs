use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{CoreResult, InstrumentError};

/// Truncation and capping applied to span attributes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LimitsCfg {
    /// Max characters kept from the last user message (default 1000)
    #[serde(default = "default_message_chars")]
    pub input_chars: usize,
    /// Max characters kept from the response text (default 1000)
    #[serde(default = "default_message_chars")]
    pub output_chars: usize,
    /// Max characters kept from each tool call's arguments (default 500)
    #[serde(default = "default_tool_argument_chars")]
    pub tool_argument_chars: usize,
    /// Tool calls recorded individually by index (default 5)
    #[serde(default = "default_indexed_tool_calls")]
    pub indexed_tool_calls: usize,
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            input_chars: default_message_chars(),
            output_chars: default_message_chars(),
            tool_argument_chars: default_tool_argument_chars(),
            indexed_tool_calls: default_indexed_tool_calls(),
        }
    }
}

fn default_message_chars() -> usize {
    1_000
}
fn default_tool_argument_chars() -> usize {
    500
}
fn default_indexed_tool_calls() -> usize {
    5
}

/// Instrument names. Changing them breaks dashboards built on the defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MetricsCfg {
    #[serde(default = "default_requests_metric")]
    pub requests: String,
    #[serde(default = "default_tokens_metric")]
    pub tokens: String,
    #[serde(default = "default_duration_metric")]
    pub duration: String,
}

impl Default for MetricsCfg {
    fn default() -> Self {
        Self {
            requests: default_requests_metric(),
            tokens: default_tokens_metric(),
            duration: default_duration_metric(),
        }
    }
}

fn default_requests_metric() -> String {
    "llm.requests.total".into()
}
fn default_tokens_metric() -> String {
    "llm.tokens.total".into()
}
fn default_duration_metric() -> String {
    "llm.request.duration".into()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingCfg {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            ansi: default_ansi(),
        }
    }
}

fn default_log_filter() -> String {
    "info".into()
}
fn default_ansi() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsCfg,
    #[serde(default)]
    pub metrics: MetricsCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let s = std::str::from_utf8(&bytes)
            .map_err(|e| InstrumentError::Config(format!("{}: {e}", path.display())))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)?,
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| InstrumentError::Config(e.to_string()))?
            }
            _ => serde_json::from_str::<Self>(s).or_else(|_| {
                toml::from_str::<Self>(s).map_err(|e| InstrumentError::Config(e.to_string()))
            })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> CoreResult<()> {
        let names = [
            &self.metrics.requests,
            &self.metrics.tokens,
            &self.metrics.duration,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(InstrumentError::Config(
                "metric names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
