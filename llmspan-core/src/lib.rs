pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod provider;
pub mod span;
pub mod telemetry;
pub mod tool_calls;

pub use config::Config;
pub use error::{CoreResult, InstrumentError};
pub use model::{ChatMessage, OpenAiToolCall, UsageRecord};
pub use provider::{detect_provider_from_url, ProviderKind};
pub use span::{Instrumentor, LlmSpan};
pub use telemetry::{CallSummary, TelemetryContext};
