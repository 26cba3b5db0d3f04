use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::ChatClient;
use plantwise_core::types::{ChatRequest, IntentFlags};

use crate::prompts::{intent_prompt, INTENT_SYSTEM_PROMPT};
use crate::workflow::NodeOutcome;

/// Decides which downstream agents a question needs.
///
/// Malformed or failed classification never stops the workflow: the safe
/// overlap (graph + maintenance) is used instead and the step still counts
/// as a success.
pub struct IntentClassifier {
    chat: Arc<dyn ChatClient>,
}

#[derive(Debug, Deserialize)]
struct IntentReply {
    #[serde(default)]
    needs_graph: bool,
    #[serde(default)]
    needs_maintenance: bool,
    #[serde(default)]
    needs_time_series: bool,
    #[serde(default)]
    reasoning: Option<String>,
}

impl IntentClassifier {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    pub async fn execute(&self, question: &str) -> Result<NodeOutcome<IntentFlags>> {
        let request = ChatRequest::new(INTENT_SYSTEM_PROMPT, intent_prompt(question))
            .with_max_tokens(200);

        let (flags, reasoning, fell_back) = match self.chat.complete(request).await {
            Ok(reply) => match parse_intent_reply(&reply) {
                Ok((flags, reasoning)) => (flags.normalized(), reasoning, false),
                Err(e) => {
                    warn!(error = %e, reply = %reply, "Using fallback flags");
                    (IntentFlags::fallback(), None, true)
                }
            },
            Err(e) => {
                warn!(error = %e, "Intent classification failed, using fallback flags");
                (IntentFlags::fallback(), None, true)
            }
        };

        let summary = if fell_back {
            format!("Intent fallback: {}", describe_flags(&flags))
        } else {
            describe_flags(&flags)
        };

        Ok(NodeOutcome {
            output: json!({
                "needs_graph": flags.needs_graph,
                "needs_maintenance": flags.needs_maintenance,
                "needs_time_series": flags.needs_time_series,
                "reasoning": reasoning,
                "fell_back": fell_back,
            }),
            summary,
            value: flags,
        })
    }
}

/// Extract and parse the JSON object from a classifier reply, tolerating
/// code fences and surrounding prose.
fn parse_intent_reply(reply: &str) -> Result<(IntentFlags, Option<String>)> {
    let object = reply
        .find('{')
        .and_then(|start| {
            reply
                .rfind('}')
                .filter(|end| *end >= start)
                .map(|end| &reply[start..=end])
        })
        .ok_or_else(|| PlantwiseError::IntentParse("no JSON object in reply".into()))?;

    let parsed: IntentReply =
        serde_json::from_str(object).map_err(|e| PlantwiseError::IntentParse(e.to_string()))?;

    Ok((
        IntentFlags {
            needs_graph: parsed.needs_graph,
            needs_maintenance: parsed.needs_maintenance,
            needs_time_series: parsed.needs_time_series,
        },
        parsed.reasoning,
    ))
}

fn describe_flags(flags: &IntentFlags) -> String {
    let mut selected = Vec::new();
    if flags.needs_graph {
        selected.push("graph");
    }
    if flags.needs_maintenance {
        selected.push("maintenance");
    }
    if flags.needs_time_series {
        selected.push("time-series");
    }

    if selected.is_empty() {
        "No data sources needed (off-domain question)".to_string()
    } else {
        format!("Selected data sources: {}", selected.join(", "))
    }
}
