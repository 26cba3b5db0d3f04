use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One graph result row: column alias -> scalar/map value.
pub type Row = serde_json::Map<String, Value>;

/// Maximum characters kept in a trace summary.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Navigation scope attached to a contextual query. Interpreted as a
/// retrieval constraint for the graph agent, never as a security boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeHint {
    pub node_type: Option<String>,
    pub node_name: Option<String>,
    pub plant: Option<String>,
    pub area: Option<String>,
    pub equipment: Option<String>,
    pub scope_depth: Option<u8>,
    pub breadcrumb: Option<String>,
}

impl ScopeHint {
    /// Depth for transitive traversal, clamped to the supported 1..=3 range.
    pub fn clamped_depth(&self) -> u8 {
        self.scope_depth.unwrap_or(2).clamp(1, 3)
    }
}

/// The three routing flags produced by intent classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentFlags {
    pub needs_graph: bool,
    pub needs_maintenance: bool,
    pub needs_time_series: bool,
}

impl IntentFlags {
    /// Safe overlap used when the classifier reply cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            needs_graph: true,
            needs_maintenance: true,
            needs_time_series: false,
        }
    }

    /// True when the question is entirely outside the plant-data domain.
    pub fn off_domain(&self) -> bool {
        !self.needs_graph && !self.needs_maintenance && !self.needs_time_series
    }

    /// Downstream agents need sensor names, so they imply the graph agent.
    pub fn normalized(mut self) -> Self {
        if self.needs_maintenance || self.needs_time_series {
            self.needs_graph = true;
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphResult {
    pub cypher: String,
    pub rows: Vec<Row>,
    /// Pre-truncation count, up to the store's scan ceiling.
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphResult {
    pub fn failed(cypher: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            rows: Vec::new(),
            row_count: 0,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A maintenance work order as returned by the tool server, annotated with
/// both the canonical and the original sensor tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkOrder {
    pub nr: String,
    pub short_description: String,
    pub description: String,
    pub comment: String,
    pub status: i64,
    pub priority: i64,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub finished_date: Option<String>,
    pub url: Option<String>,
    pub sensor_name: String,
    pub original_sensor_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceResult {
    pub work_orders: Vec<WorkOrder>,
    /// Canonical names actually sent to the tool server, in query order.
    pub sensors_queried: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor_name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    pub quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub sensor_name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub anomaly_type: String,
    pub severity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    pub measurements: Vec<Measurement>,
    pub anomalies: Vec<Anomaly>,
    pub is_mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Synthesis {
    pub text: String,
    pub cited_agents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
    Skipped,
}

/// One per-node execution record appended to the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_name: String,
    pub status: AgentStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentRecord {
    pub fn success(
        agent_name: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        summary: impl AsRef<str>,
        output: Option<Value>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Success,
            started_at,
            duration_ms,
            summary: truncate_summary(summary.as_ref()),
            output,
            error: None,
        }
    }

    pub fn error(
        agent_name: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        Self {
            agent_name: agent_name.into(),
            status: AgentStatus::Error,
            started_at,
            duration_ms,
            summary: truncate_summary(&format!("Failed: {}", error)),
            output: None,
            error: Some(error),
        }
    }
}

/// Complete execution trace for all agents in a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub total_duration_ms: u64,
    pub agents_invoked: Vec<AgentRecord>,
    pub workflow_version: String,
}

impl ExecutionTrace {
    pub fn new(total_duration_ms: u64, agents_invoked: Vec<AgentRecord>) -> Self {
        Self {
            total_duration_ms,
            agents_invoked,
            workflow_version: "1.0".to_string(),
        }
    }
}

/// What a workflow run hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReply {
    pub answer: String,
    pub trace: ExecutionTrace,
    pub errors: Vec<String>,
}

/// One chat-completion call: full prompt in, single string reply out.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.1,
            max_tokens: 500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Truncate to the summary budget on a char boundary.
pub fn truncate_summary(s: &str) -> String {
    if s.chars().count() <= SUMMARY_MAX_CHARS {
        s.to_string()
    } else {
        s.chars().take(SUMMARY_MAX_CHARS).collect()
    }
}
