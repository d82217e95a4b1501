use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use conduit_core::model::{HttpModelTransport, ModelClient, ModelEndpointConfig, ModelTransport};
use conduit_core::pipeline::{GeneralPipeline, Pipeline, RagConfig, RagPipeline, ToolPipeline};
use conduit_core::resilience::{CircuitRegistry, RetryPresets};
use conduit_core::retrieval::{RetrievalClient, RetrievalConfig};
use conduit_core::router::IntentRouter;
use conduit_core::session::{InMemorySessionStore, SessionManager, SessionManagerConfig};
use conduit_core::tools::{HttpToolTransport, ToolRegistry, ToolSchemaFile, ToolTransport};
use conduit_core::workflow::{IncidentClassifier, WorkflowEngine};
use conduit_core::writers::{AnalyticsWriter, ConversationWriter};

use conduit_gateway::stores::{
    InMemoryTicketStore, LoggingAnalyticsStore, LoggingConversationStore, LoggingImageStore, LoggingTicketStore,
    LoggingWorkflowEventSink,
};
use conduit_gateway::{dispatcher::Dispatcher, telemetry, ws, Cli, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cli = Cli::parse();
    let config = GatewayConfig::from(cli);

    let circuits = Arc::new(CircuitRegistry::for_service_defaults());

    let model_transport: Arc<dyn ModelTransport> = Arc::new(HttpModelTransport::new(&config.model_base_url));
    let model = Arc::new(ModelClient::new(
        model_transport,
        Arc::clone(&circuits),
        RetryPresets::model(),
        ModelEndpointConfig {
            inference_profile: config.model_inference_profile.clone(),
            cross_region_profile: config.model_cross_region_profile.clone(),
            direct_model_id: config.model_direct_model_id.clone(),
        },
    ));

    // Neither retrieval back-end is wired for this binary's default
    // deployment — the embedding endpoint and document blob store are
    // out-of-scope external services. `allow_mock_retrieval` gates the
    // deterministic mock path per the Open Question resolution; it is off
    // unless explicitly set.
    let retrieval = Arc::new(RetrievalClient::new(
        None,
        RetrievalConfig {
            allow_mock: config.allow_mock_retrieval,
        },
    ));

    let tool_transport: Arc<dyn ToolTransport> = Arc::new(HttpToolTransport::new());
    let tool_schema = load_tool_schema(config.tool_schema_path.as_deref());
    let tools = Arc::new(ToolRegistry::new(tool_schema, tool_transport, RetryPresets::tool_rpc()));

    let conversation_writer = Arc::new(ConversationWriter::new(Arc::new(LoggingConversationStore)));
    let analytics_writer = Arc::new(AnalyticsWriter::new(Arc::new(LoggingAnalyticsStore), Arc::clone(&circuits)));

    let pipeline = Arc::new(Pipeline::new(
        GeneralPipeline::new(Arc::clone(&model)),
        RagPipeline::new(
            Arc::clone(&model),
            Arc::clone(&retrieval),
            RagConfig {
                limit: config.retrieval_limit,
                min_relevance_score: config.min_relevance_score,
            },
        ),
        ToolPipeline::new(Arc::clone(&model), Arc::clone(&tools), Arc::clone(&analytics_writer)),
    ));

    let router = Arc::new(IntentRouter::new(Arc::clone(&model)));

    let sessions = Arc::new(SessionManager::new(
        Arc::new(InMemorySessionStore::new()),
        SessionManagerConfig {
            timeout: config.session_timeout,
        },
    ));

    let workflow_engine = Arc::new(WorkflowEngine::new(
        IncidentClassifier::new(Arc::clone(&model)),
        Arc::new(InMemoryTicketStore::default()),
        Arc::new(LoggingTicketStore),
        Arc::new(LoggingImageStore),
        Arc::new(LoggingWorkflowEventSink),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        sessions,
        router,
        pipeline,
        workflow_engine,
        conversation_writer,
        analytics_writer,
        config.message_deadline,
    ));

    spawn_sweeper(Arc::clone(&dispatcher));

    let app = ws::router(ws::AppState { dispatcher });

    tracing::info!(bind_addr = %config.bind_addr, "conduit-gateway listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reads the tool schema file named on the CLI, falling back to an empty
/// tool set (the TOOL pipeline still runs, it just never matches anything)
/// rather than failing startup when no tools are configured for this
/// deployment.
fn load_tool_schema(path: Option<&std::path::Path>) -> ToolSchemaFile {
    let Some(path) = path else {
        tracing::warn!("no --tool-schema-path configured; starting with an empty tool registry");
        return ToolSchemaFile { tools: Vec::new() };
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::error!(path = %path.display(), error = %err, "failed to parse tool schema, starting empty");
            ToolSchemaFile { tools: Vec::new() }
        }),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read tool schema, starting empty");
            ToolSchemaFile { tools: Vec::new() }
        }
    }
}

/// The external periodic schedule §4.5 calls for: a five-minute-interval
/// sweep of idle/closed sessions, run on its own task so a slow sweep
/// never blocks a live connection's dispatcher task.
fn spawn_sweeper(dispatcher: Arc<Dispatcher>) {
    const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
    const SWEEP_DEADLINE: Duration = Duration::from_secs(300);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match tokio::time::timeout(SWEEP_DEADLINE, dispatcher.sweep()).await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "session sweep removed idle/closed sessions");
                    }
                }
                Err(_) => tracing::warn!("session sweep exceeded its own deadline"),
            }
        }
    });
}
