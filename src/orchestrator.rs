//! Per-request orchestration driver.
//!
//! Bounded loop: analyze → extract tool calls → either terminate or execute
//! the calls in order and synthesize, until the step budget runs out.
//! Admission is a counting semaphore; a request that cannot get a slot
//! within its own timeout is refused with "Request queue is full." and
//! nothing else is fatal to the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::OrchestrationConfig;
use crate::error::OrchestrationError;
use crate::extractor::extract_tool_calls;
use crate::mcp::McpCoordinator;
use crate::models::{
    ChatMessage, ExecutionStep, OrchestrationRequest, OrchestrationResponse, ResponseMetadata,
    ResponseStatus, Role, StepType,
};
use crate::prompt;
use crate::reasoner::ReasonerRegistry;
use crate::sessions::ContextManager;

struct LoopOutcome {
    response: String,
    terminal: bool,
    provider_id: String,
    tools_available: usize,
}

pub struct Orchestrator {
    coordinator: Arc<McpCoordinator>,
    contexts: Arc<ContextManager>,
    reasoners: Arc<ReasonerRegistry>,
    admission: Arc<Semaphore>,
    config: OrchestrationConfig,
}

impl Orchestrator {
    pub fn new(
        coordinator: Arc<McpCoordinator>,
        contexts: Arc<ContextManager>,
        reasoners: Arc<ReasonerRegistry>,
        config: OrchestrationConfig,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Self {
            coordinator,
            contexts,
            reasoners,
            admission,
            config,
        }
    }

    /// Free admission slots, observable for metrics.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Drive one request to a structured response. Never returns an error:
    /// every failure mode collapses into a response with status `error`.
    pub async fn process(&self, request: OrchestrationRequest) -> OrchestrationResponse {
        let request_id = Uuid::new_v4().to_string();
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let clock = Instant::now();

        tracing::info!(
            request = %request_id,
            session = %session_id,
            "orchestration request accepted"
        );

        let wait = Duration::from_millis(request.preferences.timeout);
        let permit = match tokio::time::timeout(wait, Arc::clone(&self.admission).acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            _ => {
                tracing::warn!(request = %request_id, "no admission slot within {}ms", wait.as_millis());
                return self.finalize(
                    request_id,
                    session_id,
                    ResponseStatus::Error,
                    OrchestrationError::AdmissionTimeout.to_string(),
                    Vec::new(),
                    clock,
                    HashMap::new(),
                );
            }
        };

        let mut flow = Vec::new();
        let outcome = self
            .run(&request_id, &session_id, &request, &mut flow)
            .await;
        drop(permit);

        match outcome {
            Ok(outcome) => {
                let status = if outcome.terminal {
                    ResponseStatus::Success
                } else {
                    ResponseStatus::Partial
                };
                let performance = HashMap::from([
                    ("aiProviderUsed".to_string(), json!(outcome.provider_id)),
                    ("toolsAvailable".to_string(), json!(outcome.tools_available)),
                    ("maxStepsReached".to_string(), json!(!outcome.terminal)),
                ]);
                self.finalize(
                    request_id,
                    session_id,
                    status,
                    outcome.response,
                    flow,
                    clock,
                    performance,
                )
            }
            Err(e) => {
                tracing::error!(request = %request_id, error = %e, "orchestration failed");
                self.finalize(
                    request_id,
                    session_id,
                    ResponseStatus::Error,
                    e.to_string(),
                    flow,
                    clock,
                    HashMap::new(),
                )
            }
        }
    }

    async fn run(
        &self,
        request_id: &str,
        session_id: &str,
        request: &OrchestrationRequest,
        flow: &mut Vec<ExecutionStep>,
    ) -> Result<LoopOutcome, OrchestrationError> {
        let preferences = &request.preferences;

        let mut ctx = self.contexts.get_or_create_context(session_id).await;
        ctx.messages
            .push(ChatMessage::new(Role::User, request.message.clone()));

        let tools = self.coordinator.get_available_tools().await;
        ctx.available_tools = tools.clone();
        self.contexts.update_context(ctx.clone()).await;

        let reasoner = self.reasoners.select(preferences)?;
        let system = prompt::system_prompt(&tools);

        let mut remaining = preferences.max_steps.min(self.config.default_max_steps);
        let mut current = request.message.clone();
        let mut terminal = false;

        while remaining > 0 {
            // a. Analyze.
            let started_at = Utc::now();
            let step_clock = Instant::now();
            let analysis = reasoner
                .analyze(&system, &current, &prompt::history_text(&ctx), &tools, preferences)
                .await?;
            let mut step = ExecutionStep::new(
                StepType::AiAnalysis,
                started_at,
                step_clock.elapsed().as_millis() as u64,
            );
            step.input = current.clone();
            step.output = analysis.response.clone();
            step.metadata
                .insert("tokensUsed".to_string(), json!(analysis.tokens_used));
            step.metadata
                .insert("provider".to_string(), json!(analysis.provider_id));
            flow.push(step);

            // b/c. Extract; an empty list is the terminal branch.
            let calls = extract_tool_calls(&analysis.response);
            if calls.is_empty() {
                ctx.messages
                    .push(ChatMessage::new(Role::Assistant, analysis.response.clone()));
                self.contexts.update_context(ctx.clone()).await;
                current = analysis.response;
                terminal = true;
                break;
            }

            // d. Execute sequentially, in the order the reasoner gave, so
            // synthesis sees a deterministic result list.
            tracing::debug!(request = %request_id, calls = calls.len(), "executing tool calls");
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let step = self.coordinator.execute_tool(call).await;
                results.push(if step.output.is_empty() {
                    "No output".to_string()
                } else {
                    step.output.clone()
                });
                ctx.execution_history.push(step.clone());
                flow.push(step);
            }

            // e. Synthesize. Recorded in the session's audit history; the
            // request flow carries only analysis and tool steps.
            let synthesis = prompt::synthesis_prompt(&request.message, &results, preferences);
            let started_at = Utc::now();
            let step_clock = Instant::now();
            current = reasoner.synthesize(&synthesis, &ctx, preferences).await?;
            let mut step = ExecutionStep::new(
                StepType::Synthesis,
                started_at,
                step_clock.elapsed().as_millis() as u64,
            );
            step.input = synthesis;
            step.output = current.clone();
            ctx.execution_history.push(step);
            self.contexts.update_context(ctx.clone()).await;

            remaining -= 1;
        }

        Ok(LoopOutcome {
            response: current,
            terminal,
            provider_id: reasoner.id().to_string(),
            tools_available: tools.len(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        request_id: String,
        session_id: String,
        status: ResponseStatus,
        response: String,
        flow: Vec<ExecutionStep>,
        clock: Instant,
        performance: HashMap<String, Value>,
    ) -> OrchestrationResponse {
        // Only configured servers count; a refused call to an unknown
        // server still shows in the flow but not in the metadata.
        let mut servers_used: Vec<String> = flow
            .iter()
            .filter_map(|s| s.server_name.clone())
            .filter(|name| self.coordinator.registry().get(name).is_some())
            .collect();
        servers_used.sort();
        servers_used.dedup();

        let mut tools_used: Vec<String> =
            flow.iter().filter_map(|s| s.tool_name.clone()).collect();
        tools_used.sort();
        tools_used.dedup();

        OrchestrationResponse {
            request_id,
            session_id,
            status,
            response,
            metadata: ResponseMetadata {
                total_duration_ms: clock.elapsed().as_millis() as u64,
                steps_executed: flow.len(),
                servers_used,
                tools_used,
                performance,
            },
            execution_flow: flow,
        }
    }
}
