use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use plantwise_core::error::Result;
use plantwise_core::traits::ChatClient;
use plantwise_core::types::{ChatRequest, Synthesis};

use crate::prompts::{synthesis_prompt, SYNTHESIS_SYSTEM_PROMPT};
use crate::state::WorkflowState;
use crate::workflow::NodeOutcome;

/// Rough per-agent budget for the synthesis context.
const SECTION_BUDGET_CHARS: usize = 2_048;

const GRAPH_SAMPLE_ROWS: usize = 5;
const WORK_ORDER_SAMPLE: usize = 3;
const ANOMALY_SAMPLE: usize = 3;

/// Composes the final reply from whatever agent outputs exist.
///
/// Never fatal: an LLM failure or empty reply falls back to a deterministic
/// template over the per-agent summaries.
pub struct Synthesizer {
    chat: Arc<dyn ChatClient>,
}

impl Synthesizer {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    pub async fn execute(&self, state: &WorkflowState) -> Result<NodeOutcome<Synthesis>> {
        let context = build_context(state);
        let cited = cited_agents(state);

        let request = ChatRequest::new(
            SYNTHESIS_SYSTEM_PROMPT,
            synthesis_prompt(&state.question, &context, &state.errors),
        )
        .with_temperature(0.3)
        .with_max_tokens(600);

        let text = match self.chat.complete(request).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                warn!("Empty synthesis reply, using deterministic fallback");
                fallback_answer(state)
            }
            Err(e) => {
                warn!(error = %e, "Synthesis failed, using deterministic fallback");
                fallback_answer(state)
            }
        };

        Ok(NodeOutcome {
            summary: format!("Synthesized response from {} agent(s)", cited.len()),
            output: json!({
                "cited_agents": cited,
                "context_chars": context.chars().count(),
            }),
            value: Synthesis {
                text,
                cited_agents: cited,
            },
        })
    }
}

/// Data agents that completed successfully, in trace order.
pub fn cited_agents(state: &WorkflowState) -> Vec<String> {
    state
        .successful_agents()
        .into_iter()
        .filter(|name| name != "intent" && name != "synthesizer")
        .collect()
}

/// Compact context string: one bounded section per agent result present,
/// with explicit unavailability lines for sources that failed or were
/// skipped.
pub fn build_context(state: &WorkflowState) -> String {
    if state.intent.off_domain() && state.graph_result.is_none() {
        return "No plant data sources were consulted: the question was judged to be \
                outside the plant-data domain. Politely explain that this assistant \
                answers questions about plants, areas, equipment, sensors, work orders \
                and recent measurements, and invite such a question."
            .to_string();
    }

    let mut sections = Vec::new();
    let graph_failed = state.graph_result.is_some() && !state.graph_succeeded();

    if let Some(graph) = &state.graph_result {
        if let Some(err) = &graph.error {
            sections.push(format!("GRAPH DATA: Unavailable ({})", err));
        } else if graph.row_count == 0 {
            sections.push("GRAPH DATA: No results found".to_string());
        } else {
            let mut lines = vec![format!("GRAPH DATA ({} results):", graph.row_count)];
            for (i, row) in graph.rows.iter().take(GRAPH_SAMPLE_ROWS).enumerate() {
                lines.push(format!(
                    "  {}. {}",
                    i + 1,
                    serde_json::Value::Object(row.clone())
                ));
            }
            if graph.row_count > GRAPH_SAMPLE_ROWS {
                lines.push(format!(
                    "  ... and {} more results",
                    graph.row_count - GRAPH_SAMPLE_ROWS
                ));
            }
            sections.push(bound_section(lines.join("\n")));
        }
    }

    if let Some(maintenance) = &state.maintenance_result {
        let mut lines = Vec::new();
        if maintenance.work_orders.is_empty() {
            match &maintenance.error {
                Some(err) => lines.push(format!("MAINTENANCE DATA: Unavailable ({})", err)),
                None => lines.push("MAINTENANCE DATA: No work orders found".to_string()),
            }
        } else {
            lines.push(format!(
                "MAINTENANCE DATA ({} work orders):",
                maintenance.work_orders.len()
            ));
            for (i, wo) in maintenance.work_orders.iter().take(WORK_ORDER_SAMPLE).enumerate() {
                lines.push(format!(
                    "  {}. WO#{}: {} (sensor {})",
                    i + 1,
                    wo.nr,
                    wo.short_description,
                    wo.sensor_name
                ));
            }
            if maintenance.work_orders.len() > WORK_ORDER_SAMPLE {
                lines.push(format!(
                    "  ... and {} more work orders",
                    maintenance.work_orders.len() - WORK_ORDER_SAMPLE
                ));
            }
            if let Some(err) = &maintenance.error {
                lines.push(format!("  (some lookups failed: {})", err));
            }
        }
        sections.push(bound_section(lines.join("\n")));
    } else if state.intent.needs_maintenance && graph_failed {
        sections
            .push("MAINTENANCE DATA: Skipped (no sensor names available from the graph)".into());
    }

    if let Some(ts) = &state.time_series_result {
        if let Some(err) = &ts.error {
            sections.push(format!("SENSOR DATA: Unavailable ({})", err));
        } else if ts.measurements.is_empty() {
            sections.push("SENSOR DATA: No measurements available".to_string());
        } else {
            let mock_note = if ts.is_mock { " [MOCK DATA]" } else { "" };
            let mut lines = vec![format!(
                "SENSOR DATA{} ({} measurements):",
                mock_note,
                ts.measurements.len()
            )];
            if ts.anomalies.is_empty() {
                lines.push("  All sensors operating normally".to_string());
            } else {
                lines.push(format!("  {} anomalies detected:", ts.anomalies.len()));
                for anomaly in ts.anomalies.iter().take(ANOMALY_SAMPLE) {
                    lines.push(format!(
                        "    - {}: {} (severity: {})",
                        anomaly.sensor_name, anomaly.anomaly_type, anomaly.severity
                    ));
                }
            }
            sections.push(bound_section(lines.join("\n")));
        }
    } else if state.intent.needs_time_series && graph_failed {
        sections.push("SENSOR DATA: Skipped (no sensor names available from the graph)".into());
    }

    sections.join("\n\n")
}

/// Deterministic reply used when the LLM cannot be reached.
pub fn fallback_answer(state: &WorkflowState) -> String {
    if state.intent.off_domain() && state.graph_result.is_none() {
        return "I can help with questions about this plant's areas, equipment, sensors, \
                work orders and recent measurements. Could you rephrase your question \
                in those terms?"
            .to_string();
    }

    let mut lines = vec!["Here is what the available systems reported:".to_string()];
    for record in &state.trace {
        if record.agent_name == "intent" {
            continue;
        }
        lines.push(format!("- {}: {}", record.agent_name, record.summary));
    }
    lines.join("\n")
}

fn bound_section(section: String) -> String {
    if section.chars().count() <= SECTION_BUDGET_CHARS {
        section
    } else {
        let mut truncated: String = section.chars().take(SECTION_BUDGET_CHARS).collect();
        truncated.push_str("\n  [truncated]");
        truncated
    }
}
