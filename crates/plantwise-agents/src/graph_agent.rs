use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::{ChatClient, GraphStore};
use plantwise_core::types::{ChatRequest, GraphResult, ScopeHint};

use crate::prompts::{cypher_prompt, CYPHER_SYSTEM_PROMPT};
use crate::workflow::NodeOutcome;

/// Hard cap on rows placed into the shared state.
pub const GRAPH_ROW_CAP: usize = 50;

/// Rows included verbatim in the trace blob; the rest are elided.
const TRACE_SAMPLE_ROWS: usize = 5;

const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "DROP", "REMOVE", "FOREACH",
];

const WRITE_PROCEDURE_PREFIXES: &[&str] = &[
    "apoc.create",
    "apoc.merge",
    "apoc.refactor",
    "apoc.periodic",
    "db.create",
    "dbms.",
];

/// Translates a question into Cypher, executes it read-only, and places a
/// bounded row set on the shared state.
pub struct GraphAgent {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn GraphStore>,
}

impl GraphAgent {
    pub fn new(chat: Arc<dyn ChatClient>, store: Arc<dyn GraphStore>) -> Self {
        Self { chat, store }
    }

    pub async fn execute(
        &self,
        question: &str,
        scope: Option<&ScopeHint>,
    ) -> Result<NodeOutcome<GraphResult>> {
        let cypher = self.generate_cypher(question, scope).await?;

        if let Some(clause) = find_write_clause(&cypher) {
            return Err(PlantwiseError::CypherRejected { cypher, clause });
        }

        let rows = self
            .store
            .run_read_query(&cypher, serde_json::Map::new())
            .await?;

        let row_count = rows.len();
        let mut rows = rows;
        rows.truncate(GRAPH_ROW_CAP);
        debug!(row_count, returned = rows.len(), "Graph query complete");

        let result = GraphResult {
            cypher,
            rows,
            row_count,
            error: None,
        };

        let sample: Vec<_> = result.rows.iter().take(TRACE_SAMPLE_ROWS).collect();
        let output = json!({
            "cypher": result.cypher,
            "row_count": result.row_count,
            "rows_returned": result.rows.len(),
            "sample": sample,
        });

        Ok(NodeOutcome {
            summary: summarize(&result),
            output,
            value: result,
        })
    }

    async fn generate_cypher(&self, question: &str, scope: Option<&ScopeHint>) -> Result<String> {
        let request = ChatRequest::new(CYPHER_SYSTEM_PROMPT, cypher_prompt(question, scope))
            .with_max_tokens(500);

        let reply = self.chat.complete(request).await?;
        let cypher = strip_code_fences(&reply);

        if cypher.is_empty() {
            return Err(PlantwiseError::LlmParse("empty Cypher reply".into()));
        }
        Ok(cypher)
    }
}

/// Remove markdown code fences the model added anyway.
pub fn strip_code_fences(reply: &str) -> String {
    reply
        .replace("```cypher", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Scan a statement for write clauses and write procedures.
///
/// Tokens keep dots and underscores, so property names like `s.set_point`
/// never collide with the `SET` keyword.
pub fn find_write_clause(cypher: &str) -> Option<String> {
    let tokens: Vec<&str> = cypher
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        let upper = token.to_ascii_uppercase();
        if WRITE_CLAUSES.contains(&upper.as_str()) {
            return Some(upper);
        }
        if upper == "CALL" {
            if let Some(proc_name) = tokens.get(i + 1) {
                let lower = proc_name.to_ascii_lowercase();
                if WRITE_PROCEDURE_PREFIXES
                    .iter()
                    .any(|p| lower.starts_with(p))
                {
                    return Some(format!("CALL {}", proc_name));
                }
            }
        }
    }
    None
}

fn summarize(result: &GraphResult) -> String {
    match result.row_count {
        0 => "No results found in graph database".to_string(),
        1 => "Found 1 result in graph database".to_string(),
        n if n > GRAPH_ROW_CAP => format!(
            "Found {} results in graph database (showing first {})",
            n, GRAPH_ROW_CAP
        ),
        n => format!("Found {} results in graph database", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```cypher\nMATCH (n) RETURN n LIMIT 50\n```";
        assert_eq!(strip_code_fences(fenced), "MATCH (n) RETURN n LIMIT 50");

        let plain = "  MATCH (n) RETURN n  ";
        assert_eq!(strip_code_fences(plain), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_write_clauses_rejected() {
        assert_eq!(
            find_write_clause("MATCH (s:Sensor) DETACH DELETE s"),
            Some("DETACH".to_string())
        );
        assert_eq!(
            find_write_clause("CREATE (n:Sensor {tag: 'x'})"),
            Some("CREATE".to_string())
        );
        assert_eq!(
            find_write_clause("MERGE (n:Sensor {tag: 'x'})"),
            Some("MERGE".to_string())
        );
        assert_eq!(
            find_write_clause("MATCH (n) SET n.x = 1"),
            Some("SET".to_string())
        );
        assert_eq!(
            find_write_clause("match (n) remove n.x"),
            Some("REMOVE".to_string())
        );
    }

    #[test]
    fn test_read_queries_pass() {
        assert_eq!(
            find_write_clause(
                r#"MATCH (a:AssetArea {name: "40-10"})-[:HAS_SENSOR]->(s:Sensor) RETURN s.tag LIMIT 50"#
            ),
            None
        );
        assert_eq!(
            find_write_clause("MATCH (e:Equipment) RETURN COUNT(DISTINCT e)"),
            None
        );
    }

    #[test]
    fn test_keywords_inside_identifiers_pass() {
        // "ASSET" contains SET; "s.set_point" keeps its dot and underscore.
        assert_eq!(
            find_write_clause("MATCH (a:ASSET) RETURN a.offset, a.set_point"),
            None
        );
        assert_eq!(find_write_clause("MATCH (n:Dataset) RETURN n"), None);
    }

    #[test]
    fn test_write_procedures_rejected() {
        let found =
            find_write_clause("CALL apoc.create.node(['Sensor'], {}) YIELD node RETURN node");
        assert_eq!(found, Some("CALL apoc.create.node".to_string()));
    }

    #[test]
    fn test_read_procedures_pass() {
        assert_eq!(
            find_write_clause("CALL db.labels() YIELD label RETURN label"),
            None
        );
    }

    #[test]
    fn test_summary_wording() {
        let mut result = GraphResult::default();
        assert_eq!(summarize(&result), "No results found in graph database");

        result.row_count = 1;
        assert_eq!(summarize(&result), "Found 1 result in graph database");

        result.row_count = 9;
        assert_eq!(summarize(&result), "Found 9 results in graph database");

        result.row_count = 51;
        assert_eq!(
            summarize(&result),
            "Found 51 results in graph database (showing first 50)"
        );
    }
}
