use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use plantwise_core::config::GraphConfig;
use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::GraphStore;
use plantwise_core::types::Row;

/// Graph store client speaking the Cypher transactional HTTP endpoint.
///
/// One statement per request, auto-committed. Rows are reassembled from the
/// endpoint's `columns` x `data[].row` layout into alias -> value maps, so
/// node property maps and temporal values arrive as plain JSON.
pub struct HttpGraphStore {
    http: Client,
    base: String,
    user: String,
    password: String,
    database: String,
    scan_ceiling: usize,
}

impl HttpGraphStore {
    pub fn new(
        base: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        scan_ceiling: usize,
    ) -> Self {
        Self {
            http: Client::new(),
            base: base.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            scan_ceiling,
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(
            &config.uri,
            &config.user,
            &config.password,
            &config.database,
            config.scan_ceiling,
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.base.trim_end_matches('/'),
            self.database
        )
    }
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Serialize)]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: &'a serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxData>,
}

#[derive(Deserialize)]
struct TxData {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Reassemble endpoint output into rows, capped at the scan ceiling.
fn rows_from_response(response: TxResponse, scan_ceiling: usize, cypher: &str) -> Result<Vec<Row>> {
    if let Some(err) = response.errors.into_iter().next() {
        return Err(PlantwiseError::CypherExecution {
            cypher: cypher.to_string(),
            message: format!("{}: {}", err.code, err.message),
        });
    }

    let result = match response.results.into_iter().next() {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::with_capacity(result.data.len().min(scan_ceiling));
    for data in result.data.into_iter().take(scan_ceiling) {
        let mut map = Row::new();
        for (column, value) in result.columns.iter().zip(data.row.into_iter()) {
            map.insert(column.clone(), value);
        }
        rows.push(map);
    }
    Ok(rows)
}

impl GraphStore for HttpGraphStore {
    fn run_read_query(
        &self,
        cypher: &str,
        params: serde_json::Map<String, Value>,
    ) -> BoxFuture<'_, Result<Vec<Row>>> {
        let cypher = cypher.to_string();
        Box::pin(async move {
            let body = TxRequest {
                statements: vec![TxStatement {
                    statement: &cypher,
                    parameters: &params,
                }],
            };

            let response = self
                .http
                .post(self.endpoint())
                .basic_auth(&self.user, Some(&self.password))
                .json(&body)
                .send()
                .await
                .map_err(|e| PlantwiseError::CypherExecution {
                    cypher: cypher.clone(),
                    message: e.to_string(),
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(PlantwiseError::CypherExecution {
                    cypher: cypher.clone(),
                    message: format!("HTTP {}: {}", status, text),
                });
            }

            let parsed: TxResponse =
                response
                    .json()
                    .await
                    .map_err(|e| PlantwiseError::CypherExecution {
                        cypher: cypher.clone(),
                        message: format!("malformed response: {}", e),
                    })?;

            let rows = rows_from_response(parsed, self.scan_ceiling, &cypher)?;
            debug!(rows = rows.len(), "Graph query executed");
            Ok(rows)
        })
    }
}
