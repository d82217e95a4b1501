//! Gateway configuration: CLI flags (with environment-variable fallback)
//! resolved into a plain [`GatewayConfig`] the rest of the binary consumes.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "conduit-gateway", about = "Websocket gateway for the conversational dispatch service")]
pub struct Cli {
    /// Address the websocket server binds to.
    #[arg(long, env = "CONDUIT_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Idle-session timeout, in minutes.
    #[arg(long, env = "CONDUIT_SESSION_TIMEOUT_MINUTES", default_value_t = 30)]
    pub session_timeout_minutes: u64,

    /// Soft per-message deadline, in seconds, before the dispatcher gives
    /// up and returns the fallback envelope.
    #[arg(long, env = "CONDUIT_MESSAGE_DEADLINE_SECS", default_value_t = 30)]
    pub message_deadline_secs: u64,

    /// Base URL the model transport posts endpoint invocations to.
    #[arg(long, env = "CONDUIT_MODEL_BASE_URL")]
    pub model_base_url: String,

    /// Named inference-profile tier, tried first.
    #[arg(long, env = "CONDUIT_MODEL_INFERENCE_PROFILE")]
    pub model_inference_profile: Option<String>,

    /// Cross-region inference-profile tier, tried second.
    #[arg(long, env = "CONDUIT_MODEL_CROSS_REGION_PROFILE")]
    pub model_cross_region_profile: Option<String>,

    /// Direct model id, the last-resort tier.
    #[arg(long, env = "CONDUIT_MODEL_DIRECT_ID")]
    pub model_direct_model_id: String,

    /// Base URL the tool-RPC transport posts invocations to.
    #[arg(long, env = "CONDUIT_TOOL_BASE_URL")]
    pub tool_base_url: Option<String>,

    /// Path to the tool schema file (JSON, shape `conduit_core::tools::ToolSchemaFile`).
    #[arg(long, env = "CONDUIT_TOOL_SCHEMA_PATH")]
    pub tool_schema_path: Option<std::path::PathBuf>,

    /// Minimum cosine-similarity score a retrieved chunk must clear.
    #[arg(long, env = "CONDUIT_MIN_RELEVANCE_SCORE", default_value_t = 0.7)]
    pub min_relevance_score: f32,

    /// Maximum chunks returned per retrieval call.
    #[arg(long, env = "CONDUIT_RETRIEVAL_LIMIT", default_value_t = 5)]
    pub retrieval_limit: usize,

    /// Development-only affordance: return deterministic mock retrieval
    /// results when no backend is configured.
    #[arg(long, env = "CONDUIT_ALLOW_MOCK_RETRIEVAL", default_value_t = false)]
    pub allow_mock_retrieval: bool,

    /// Comma-separated supported language codes.
    #[arg(long, env = "CONDUIT_SUPPORTED_LANGUAGES", default_value = "en,ms,zh,ta", value_delimiter = ',')]
    pub supported_languages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub session_timeout: chrono::Duration,
    pub message_deadline: Duration,
    pub model_base_url: String,
    pub model_inference_profile: Option<String>,
    pub model_cross_region_profile: Option<String>,
    pub model_direct_model_id: String,
    pub tool_base_url: Option<String>,
    pub tool_schema_path: Option<std::path::PathBuf>,
    pub min_relevance_score: f32,
    pub retrieval_limit: usize,
    pub allow_mock_retrieval: bool,
    pub supported_languages: Vec<String>,
}

impl From<Cli> for GatewayConfig {
    fn from(cli: Cli) -> Self {
        Self {
            bind_addr: cli.bind_addr,
            session_timeout: chrono::Duration::minutes(cli.session_timeout_minutes as i64),
            message_deadline: Duration::from_secs(cli.message_deadline_secs),
            model_base_url: cli.model_base_url,
            model_inference_profile: cli.model_inference_profile,
            model_cross_region_profile: cli.model_cross_region_profile,
            model_direct_model_id: cli.model_direct_model_id,
            tool_base_url: cli.tool_base_url,
            tool_schema_path: cli.tool_schema_path,
            min_relevance_score: cli.min_relevance_score,
            retrieval_limit: cli.retrieval_limit,
            allow_mock_retrieval: cli.allow_mock_retrieval,
            supported_languages: cli.supported_languages,
        }
    }
}
