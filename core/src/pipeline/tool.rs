//! TOOL pipeline: identify which registered tools apply, invoke them
//! sequentially, and synthesize a reply from their results. Grounded in
//! `mbpp_workflows.py`'s tool-backed steps, generalized from that file's
//! fixed workflow actions to the registry's open tool set.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::model::{Message, ModelClient};
use crate::parser::parse_structured_reply;
use crate::prompts::compose;
use crate::tools::ToolRegistry;
use crate::writers::AnalyticsWriter;

use super::envelope::{classification, Envelope};
use super::general::GeneralPipeline;
use super::history::enhance_conversation_context;

pub struct ToolPipeline {
    model: Arc<ModelClient>,
    tools: Arc<ToolRegistry>,
    general: Arc<GeneralPipeline>,
    analytics: Arc<AnalyticsWriter>,
}

impl ToolPipeline {
    pub fn new(model: Arc<ModelClient>, tools: Arc<ToolRegistry>, analytics: Arc<AnalyticsWriter>) -> Self {
        let general = Arc::new(GeneralPipeline::new(Arc::clone(&model)));
        Self { model, tools, general, analytics }
    }

    pub async fn run(&self, session_id: &str, history: &[Message], user_text: &str) -> Envelope {
        let started = std::time::Instant::now();
        let tool_names = self.tools.identify(&self.model, user_text).await;

        // §4.7.3: no applicable tool falls back to General rather than
        // asking the model to narrate a tool run that never happened.
        if tool_names.is_empty() {
            return self
                .general
                .run_with_note(
                    session_id,
                    history,
                    user_text,
                    Some(
                        "No registered tool matched this request. Tell the user plainly what \
                         you can and can't do rather than inventing a result.",
                    ),
                )
                .await;
        }

        let mut invoked = Vec::with_capacity(tool_names.len());
        let mut results_block = String::new();
        for name in &tool_names {
            // No argument-extraction step is modeled; tools that need
            // structured input beyond the user's free text are invoked
            // with an empty object and are expected to tolerate it.
            let tool_started = std::time::Instant::now();
            let outcome = self.tools.invoke(name, json!({})).await;
            let tool_latency_ms = tool_started.elapsed().as_millis() as u64;
            let succeeded = outcome.is_ok();
            self.analytics.record_tool(session_id, name, tool_latency_ms, succeeded, Utc::now()).await;
            match outcome {
                Ok(result) => {
                    results_block.push_str(&format!("[{name}] -> {}\n", render_result(&result)));
                    invoked.push(name.clone());
                }
                Err(err) => {
                    tracing::warn!(tool = %name, error = %err, "tool invocation failed");
                    results_block.push_str(&format!("[{name}] -> unavailable: {err}\n"));
                    invoked.push(name.clone());
                }
            }
        }

        let instructions = format!(
            "The following tools were invoked on the user's behalf; use their results to \
             answer. If a tool came back unavailable, acknowledge that rather than making \
             up data.\n\n--- TOOL RESULTS ---\n{results_block}"
        );
        let system_prompt = compose(&instructions);

        let mut messages = enhance_conversation_context(history);
        messages.push(Message::user(user_text));

        let result = self.model.generate(&messages, Some(&system_prompt), 1024, 0.5).await;
        let parsed = parse_structured_reply(&result.text);
        let response_ms = started.elapsed().as_millis() as u64;
        Envelope::from_parsed(session_id, classification::TOOL, parsed, Vec::new(), invoked, result.is_fallback, response_ms)
    }
}

fn render_result(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable result>".to_string())
}
