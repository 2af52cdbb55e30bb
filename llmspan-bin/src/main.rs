use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use llmspan_core::{
    config::{Config, LoggingCfg},
    normalizer::usage_from_response,
    provider::detect_provider_from_url,
    telemetry::{FacadeMetricsSink, LogMetricsSink, MetricsSink, NoopMetricsSink, TracingSpanSink},
    tool_calls, CallSummary, Instrumentor, TelemetryContext,
};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "LLM call instrumentation tool", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider an endpoint URL belongs to
    Detect { url: String },
    /// Normalize the usage block of a provider response (file or `-` for stdin)
    Usage { input: Option<PathBuf> },
    /// Convert compact `{name, parameters}` tool calls to the OpenAI shape
    ConvertTools { input: Option<PathBuf> },
    /// Replay recorded exchanges through the instrumentation, concurrently
    Replay {
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = MetricsMode::Log)]
        metrics: MetricsMode,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricsMode {
    /// Log every sample as a tracing event
    Log,
    /// Forward to the installed `metrics` recorder
    Facade,
    None,
}

/// One recorded LLM call.
#[derive(Debug, Deserialize)]
struct Exchange {
    model: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    messages: Value,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    response: Value,
    /// When set the call fails with this message.
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&cfg.logging);

    match cli.command {
        Commands::Detect { url } => {
            println!("{}", detect_provider_from_url(&url));
        }
        Commands::Usage { input } => {
            let response: Value = serde_json::from_str(&read_input(input.as_deref())?)?;
            match usage_from_response(&response) {
                Some(usage) => println!("{}", serde_json::to_string(&usage)?),
                None => println!("null"),
            }
        }
        Commands::ConvertTools { input } => {
            let raw: Value = serde_json::from_str(&read_input(input.as_deref())?)?;
            let converted = tool_calls::convert_compact_value(&raw);
            println!("{}", serde_json::to_string_pretty(&converted)?);
        }
        Commands::Replay { input, metrics } => {
            let exchanges: Vec<Exchange> = serde_json::from_str(&read_input(input.as_deref())?)
                .context("replay input must be a JSON array of exchanges")?;
            tracing::info!(count = exchanges.len(), ?metrics, "replaying exchanges");
            let metrics: Arc<dyn MetricsSink> = match metrics {
                MetricsMode::Log => Arc::new(LogMetricsSink),
                MetricsMode::Facade => Arc::new(FacadeMetricsSink),
                MetricsMode::None => Arc::new(NoopMetricsSink),
            };
            let ctx = TelemetryContext::new(Arc::new(TracingSpanSink), metrics);
            let instrumentor = Instrumentor::with_config(ctx, &cfg);

            let handles: Vec<_> = exchanges
                .into_iter()
                .map(|ex| tokio::spawn(replay_one(instrumentor.clone(), ex)))
                .collect();
            for handle in handles {
                if let Some(summary) = handle.await? {
                    println!("{}", serde_json::to_string(&summary)?);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(cfg: &LoggingCfg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(cfg.ansi)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

async fn replay_one(instrumentor: Instrumentor, ex: Exchange) -> Option<CallSummary> {
    let provider = match (ex.provider, ex.endpoint.as_deref()) {
        (Some(provider), _) => provider,
        (None, Some(url)) => detect_provider_from_url(url).to_string(),
        (None, None) => "openai".to_string(),
    };
    let mut span = instrumentor.open_named(ex.model, provider, ex.operation.as_deref());
    span.set_input_value(&ex.messages);
    span.set_invocation_parameters(&ex.parameters);

    tokio::time::sleep(Duration::from_millis(ex.delay_ms)).await;
    let result = match ex.error {
        Some(message) => Err(anyhow::anyhow!(message)),
        None => Ok(ex.response),
    };

    if let Ok(response) = &result {
        if let Some(usage) = usage_from_response(response) {
            span.set_usage(usage);
        }
        let message = response
            .pointer("/choices/0/message")
            .or_else(|| response.get("message"))
            .unwrap_or(response);
        span.set_output_value(
            message.get("content").and_then(Value::as_str),
            message.get("tool_calls"),
        );
    }
    span.finish(&result)
}
