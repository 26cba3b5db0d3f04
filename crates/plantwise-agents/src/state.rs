use plantwise_core::types::{
    AgentRecord, AgentStatus, GraphResult, IntentFlags, MaintenanceResult, ScopeHint, Synthesis,
    TimeSeriesResult,
};

/// Shared state for one workflow run.
///
/// Created per request and discarded once the reply is serialized. Only the
/// coordinator writes top-level fields; agents hand back immutable results
/// and the coordinator assigns them, so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub question: String,
    pub scope: Option<ScopeHint>,
    pub intent: IntentFlags,
    pub graph_result: Option<GraphResult>,
    pub maintenance_result: Option<MaintenanceResult>,
    pub time_series_result: Option<TimeSeriesResult>,
    pub synthesis: Option<Synthesis>,
    /// Append-only, in node completion order.
    pub trace: Vec<AgentRecord>,
    pub errors: Vec<String>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, scope: Option<ScopeHint>) -> Self {
        Self {
            question: question.into(),
            scope,
            ..Default::default()
        }
    }

    pub fn graph_succeeded(&self) -> bool {
        self.graph_result
            .as_ref()
            .map(GraphResult::succeeded)
            .unwrap_or(false)
    }

    /// Names of agents that completed successfully so far, in trace order.
    pub fn successful_agents(&self) -> Vec<String> {
        self.trace
            .iter()
            .filter(|r| r.status == AgentStatus::Success)
            .map(|r| r.agent_name.clone())
            .collect()
    }
}
