use thiserror::Error;

/// Core error type for llmspan.
/// Setters never surface these to callers: the span guard logs and drops them.
/// Public boundaries that can genuinely fail (config loading) return `CoreResult<T>`.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("cannot coerce `{param}` to {expected}: {value}")]
    Coercion {
        param: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, InstrumentError>;
