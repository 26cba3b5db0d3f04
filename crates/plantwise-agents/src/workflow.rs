//! The workflow coordinator: a fixed graph of five nodes dispatched over a
//! single shared state.
//!
//! Control flow is `intent -> graph -> { maintenance, time_series } ->
//! synthesizer`; everything after intent is conditional, the two middle
//! agents fan out concurrently when both are selected, and the synthesizer
//! always runs last. Agent-level failures never escape `run`: each node is
//! wrapped so its failure becomes a trace record plus an error string.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use plantwise_core::config::{AppConfig, CanonicalizerConfig, TimeoutsConfig};
use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::{ChatClient, GraphStore, ToolClient};
use plantwise_core::types::{
    AgentRecord, ExecutionTrace, GraphResult, IntentFlags, MaintenanceResult, ScopeHint,
    Synthesis, TimeSeriesResult, WorkflowReply,
};

use crate::graph_agent::GraphAgent;
use crate::intent::IntentClassifier;
use crate::maintenance::MaintenanceAgent;
use crate::sensors::TagCanonicalizer;
use crate::state::WorkflowState;
use crate::synthesizer::{self, Synthesizer};
use crate::timeseries::TimeSeriesAgent;

/// What a node hands back to the coordinator: the typed result, a trace
/// summary, and the structured blob stored on the trace record.
pub struct NodeOutcome<T> {
    pub value: T,
    pub summary: String,
    pub output: Value,
}

/// Construction options lifted from the app config.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    pub timeouts: TimeoutsConfig,
    pub canonicalizer: CanonicalizerConfig,
    pub time_series_use_real: bool,
}

impl From<&AppConfig> for CoordinatorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeouts: config.timeouts.clone(),
            canonicalizer: config.canonicalizer.clone(),
            time_series_use_real: config.time_series.use_real,
        }
    }
}

/// Owns the node graph and dispatch. One instance serves many workflows;
/// all per-request state lives in a fresh `WorkflowState`.
pub struct WorkflowCoordinator {
    intent: IntentClassifier,
    graph: GraphAgent,
    maintenance: MaintenanceAgent,
    time_series: TimeSeriesAgent,
    synthesizer: Synthesizer,
    timeouts: TimeoutsConfig,
}

impl WorkflowCoordinator {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        store: Arc<dyn GraphStore>,
        maintenance_tools: Option<Arc<dyn ToolClient>>,
        time_series_tools: Option<Arc<dyn ToolClient>>,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        let canonicalizer = TagCanonicalizer::new(&options.canonicalizer)?;
        Ok(Self {
            intent: IntentClassifier::new(chat.clone()),
            graph: GraphAgent::new(chat.clone(), store),
            maintenance: MaintenanceAgent::new(maintenance_tools, canonicalizer),
            time_series: TimeSeriesAgent::new(time_series_tools, options.time_series_use_real),
            synthesizer: Synthesizer::new(chat),
            timeouts: options.timeouts,
        })
    }

    /// Execute the workflow for one question. Agent-level failures are
    /// reported via `trace`/`errors`; only genuine bugs propagate as panics.
    pub async fn run(&self, question: &str, scope: Option<ScopeHint>) -> WorkflowReply {
        self.run_cancellable(question, scope, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops at the next suspension point once
    /// `cancel` fires. The synthesizer is not run for a cancelled workflow;
    /// completed trace records are still returned.
    pub async fn run_cancellable(
        &self,
        question: &str,
        scope: Option<ScopeHint>,
        cancel: CancellationToken,
    ) -> WorkflowReply {
        let workflow_start = Instant::now();
        let workflow_deadline =
            workflow_start + Duration::from_millis(self.timeouts.workflow_ms);
        let mut state = WorkflowState::new(question, scope);

        // Intent strictly precedes everything else.
        let node = run_node(
            "intent",
            ms(self.timeouts.intent_ms),
            &cancel,
            self.intent.execute(&state.question),
        )
        .await;
        let Some(node) = node else {
            return cancelled_reply(state, workflow_start);
        };
        state.intent = node.value.unwrap_or_else(IntentFlags::fallback);
        push_record(&mut state, node.record);

        // Graph runs first whenever any agent runs at all.
        if state.intent.needs_graph {
            match remaining(workflow_deadline) {
                Some(budget) => {
                    let deadline = budget.min(ms(self.timeouts.graph_ms));
                    let node = run_node(
                        "graph_agent",
                        deadline,
                        &cancel,
                        self.graph.execute(&state.question, state.scope.as_ref()),
                    )
                    .await;
                    let Some(node) = node else {
                        return cancelled_reply(state, workflow_start);
                    };
                    state.graph_result =
                        Some(node_result(node.value, node.error.as_ref(), graph_failure));
                    push_record(&mut state, node.record);
                }
                None => warn!("Workflow deadline exhausted before graph agent"),
            }
        }

        // Downstream agents require sensor names, i.e. a successful graph
        // pass; otherwise they are skipped without trace entries.
        if let Some(graph) = state.graph_result.clone().filter(|g| g.succeeded()) {
            let flags = state.intent;
            match (
                flags.needs_maintenance,
                flags.needs_time_series,
                remaining(workflow_deadline),
            ) {
                (true, true, Some(budget)) => {
                    // Fan out against the same immutable snapshot; each
                    // branch writes its own state field, so the merges
                    // commute and the trace keeps completion order.
                    let (m, t) = tokio::join!(
                        run_node(
                            "maintenance_agent",
                            budget.min(ms(self.timeouts.maintenance_ms)),
                            &cancel,
                            self.maintenance.execute(&graph),
                        ),
                        run_node(
                            "time_series_agent",
                            budget.min(ms(self.timeouts.time_series_ms)),
                            &cancel,
                            self.time_series.execute(&graph),
                        ),
                    );
                    // A branch cancelled mid-flight loses its own record,
                    // but the sibling that finished first stays in the trace.
                    let cancelled = m.is_none() || t.is_none();

                    let mut records = Vec::new();
                    if let Some(m) = m {
                        state.maintenance_result = Some(node_result(
                            m.value,
                            m.error.as_ref(),
                            maintenance_failure,
                        ));
                        records.push((m.finished, m.record));
                    }
                    if let Some(t) = t {
                        state.time_series_result = Some(node_result(
                            t.value,
                            t.error.as_ref(),
                            time_series_failure,
                        ));
                        records.push((t.finished, t.record));
                    }
                    records.sort_by_key(|(finished, _)| *finished);
                    for (_, record) in records {
                        push_record(&mut state, record);
                    }

                    if cancelled {
                        return cancelled_reply(state, workflow_start);
                    }
                }
                (true, false, Some(budget)) => {
                    let node = run_node(
                        "maintenance_agent",
                        budget.min(ms(self.timeouts.maintenance_ms)),
                        &cancel,
                        self.maintenance.execute(&graph),
                    )
                    .await;
                    let Some(node) = node else {
                        return cancelled_reply(state, workflow_start);
                    };
                    state.maintenance_result = Some(node_result(
                        node.value,
                        node.error.as_ref(),
                        maintenance_failure,
                    ));
                    push_record(&mut state, node.record);
                }
                (false, true, Some(budget)) => {
                    let node = run_node(
                        "time_series_agent",
                        budget.min(ms(self.timeouts.time_series_ms)),
                        &cancel,
                        self.time_series.execute(&graph),
                    )
                    .await;
                    let Some(node) = node else {
                        return cancelled_reply(state, workflow_start);
                    };
                    state.time_series_result = Some(node_result(
                        node.value,
                        node.error.as_ref(),
                        time_series_failure,
                    ));
                    push_record(&mut state, node.record);
                }
                (false, false, _) => {}
                (_, _, None) => {
                    warn!("Workflow deadline exhausted, short-circuiting to synthesizer")
                }
            }
        }

        // The synthesizer always runs last and always produces some text.
        let node = run_node(
            "synthesizer",
            ms(self.timeouts.synthesizer_ms),
            &cancel,
            self.synthesizer.execute(&state),
        )
        .await;
        let Some(node) = node else {
            return cancelled_reply(state, workflow_start);
        };
        let synthesis = node.value.unwrap_or_else(|| Synthesis {
            text: synthesizer::fallback_answer(&state),
            cited_agents: synthesizer::cited_agents(&state),
        });
        push_record(&mut state, node.record);

        let answer = synthesis.text.clone();
        state.synthesis = Some(synthesis);

        let total = workflow_start.elapsed().as_millis() as u64;
        info!(total_ms = total, nodes = state.trace.len(), "Workflow complete");
        WorkflowReply {
            answer,
            trace: ExecutionTrace::new(total, state.trace),
            errors: state.errors,
        }
    }
}

struct TimedNode<T> {
    record: AgentRecord,
    value: Option<T>,
    error: Option<PlantwiseError>,
    finished: Instant,
}

/// Value for the state slot: the node's result, or its failure mapping.
fn node_result<T: Default>(
    value: Option<T>,
    error: Option<&PlantwiseError>,
    on_failure: impl FnOnce(&PlantwiseError) -> T,
) -> T {
    match (value, error) {
        (Some(result), _) => result,
        (None, Some(e)) => on_failure(e),
        (None, None) => T::default(),
    }
}

/// Wrap one node execution: timing, the node deadline, cancellation, and
/// conversion of any failure into a trace record. Returns `None` only on
/// cancellation; a cancelled node leaves no trace entry.
async fn run_node<T, F>(
    name: &str,
    deadline: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Option<TimedNode<T>>
where
    F: Future<Output = Result<NodeOutcome<T>>>,
{
    if cancel.is_cancelled() {
        warn!(node = name, "Workflow cancelled before node start");
        return None;
    }

    info!(node = name, "Executing workflow node");
    let started_at = Utc::now();
    let start = Instant::now();

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            warn!(node = name, "Workflow cancelled while node in flight");
            return None;
        }
        result = tokio::time::timeout(deadline, fut) => result,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let node = match result {
        Ok(Ok(outcome)) => TimedNode {
            record: AgentRecord::success(
                name,
                started_at,
                duration_ms,
                &outcome.summary,
                Some(outcome.output),
            ),
            value: Some(outcome.value),
            error: None,
            finished: Instant::now(),
        },
        Ok(Err(e)) => {
            warn!(node = name, error = %e, "Workflow node failed");
            TimedNode {
                record: AgentRecord::error(name, started_at, duration_ms, e.to_string()),
                value: None,
                error: Some(e),
                finished: Instant::now(),
            }
        }
        Err(_) => {
            warn!(
                node = name,
                deadline_ms = deadline.as_millis() as u64,
                "Workflow node timed out"
            );
            TimedNode {
                record: AgentRecord::error(name, started_at, duration_ms, "timeout"),
                value: None,
                error: Some(PlantwiseError::Timeout),
                finished: Instant::now(),
            }
        }
    };
    Some(node)
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Budget left before the workflow deadline, or `None` once exhausted.
fn remaining(deadline: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        None
    } else {
        Some(left)
    }
}

fn push_record(state: &mut WorkflowState, record: AgentRecord) {
    if let Some(error) = &record.error {
        state.errors.push(format!("{}: {}", record.agent_name, error));
    }
    debug!(
        agent = %record.agent_name,
        status = ?record.status,
        duration_ms = record.duration_ms,
        "Node recorded"
    );
    state.trace.push(record);
}

fn cancelled_reply(mut state: WorkflowState, workflow_start: Instant) -> WorkflowReply {
    state.errors.push("cancelled".to_string());
    let total = workflow_start.elapsed().as_millis() as u64;
    WorkflowReply {
        answer: String::new(),
        trace: ExecutionTrace::new(total, state.trace),
        errors: state.errors,
    }
}

/// A failed graph pass still records the statement when it is known.
fn graph_failure(error: &PlantwiseError) -> GraphResult {
    match error {
        PlantwiseError::CypherRejected { cypher, .. }
        | PlantwiseError::CypherExecution { cypher, .. } => {
            GraphResult::failed(cypher.clone(), error.to_string())
        }
        PlantwiseError::Timeout => GraphResult::failed("", "timeout"),
        other => GraphResult::failed("", other.to_string()),
    }
}

fn maintenance_failure(error: &PlantwiseError) -> MaintenanceResult {
    MaintenanceResult {
        error: Some(degraded_reason(error)),
        ..Default::default()
    }
}

fn time_series_failure(error: &PlantwiseError) -> TimeSeriesResult {
    TimeSeriesResult {
        error: Some(degraded_reason(error)),
        ..Default::default()
    }
}

/// The protocol variant wraps the human-facing reason; other errors print
/// whole.
fn degraded_reason(error: &PlantwiseError) -> String {
    match error {
        PlantwiseError::ToolProtocol(reason) => reason.clone(),
        PlantwiseError::Timeout => "timeout".to_string(),
        other => other.to_string(),
    }
}
