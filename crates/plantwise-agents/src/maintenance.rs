use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::ToolClient;
use plantwise_core::types::{GraphResult, MaintenanceResult, WorkOrder};

use crate::sensors::{extract_sensor_names, TagCanonicalizer};
use crate::workflow::NodeOutcome;

/// At most this many sensors are looked up per workflow.
pub const MAINTENANCE_SENSOR_CAP: usize = 10;

pub const WORK_ORDER_TOOL: &str = "get_work_orders_by_sensor";

pub const UNAVAILABLE: &str = "maintenance server unavailable";

/// Looks up work orders for the sensors named in the graph result.
///
/// One tool call per sensor. Protocol-level failures abort the agent as
/// "unavailable"; per-sensor logic errors are recorded and iteration
/// continues with the remaining sensors.
pub struct MaintenanceAgent {
    tools: Option<Arc<dyn ToolClient>>,
    canonicalizer: TagCanonicalizer,
}

impl MaintenanceAgent {
    pub fn new(tools: Option<Arc<dyn ToolClient>>, canonicalizer: TagCanonicalizer) -> Self {
        Self {
            tools,
            canonicalizer,
        }
    }

    pub async fn execute(&self, graph: &GraphResult) -> Result<NodeOutcome<MaintenanceResult>> {
        let tools = self
            .tools
            .as_ref()
            .ok_or_else(|| PlantwiseError::ToolProtocol(UNAVAILABLE.into()))?;

        let sensors = extract_sensor_names(&graph.rows);
        if sensors.is_empty() {
            let result = MaintenanceResult::default();
            return outcome(result, "No sensors found to check for work orders".into());
        }

        let mut work_orders = Vec::new();
        let mut sensors_queried = Vec::new();
        let mut sensor_errors = Vec::new();

        for original in sensors.iter().take(MAINTENANCE_SENSOR_CAP) {
            let canonical = match self.canonicalizer.canonicalize(original) {
                Some(c) => c,
                None => continue,
            };
            sensors_queried.push(canonical.clone());

            match tools
                .call_tool(WORK_ORDER_TOOL, json!({ "sensor_name": canonical }))
                .await
            {
                Ok(payload) => {
                    let parsed = parse_work_orders(payload, &canonical, original);
                    debug!(sensor = %canonical, count = parsed.len(), "Work orders fetched");
                    work_orders.extend(parsed);
                }
                Err(PlantwiseError::ToolProtocol(reason)) => {
                    warn!(%reason, "Maintenance server unreachable, aborting lookup");
                    return Err(PlantwiseError::ToolProtocol(UNAVAILABLE.into()));
                }
                Err(e) => {
                    warn!(sensor = %canonical, error = %e, "Work order lookup failed, continuing");
                    sensor_errors.push(format!("{}: {}", canonical, e));
                }
            }
        }

        let result = MaintenanceResult {
            work_orders,
            sensors_queried,
            error: if sensor_errors.is_empty() {
                None
            } else {
                Some(sensor_errors.join("; "))
            },
        };
        let summary = summarize(&result);
        outcome(result, summary)
    }
}

fn outcome(result: MaintenanceResult, summary: String) -> Result<NodeOutcome<MaintenanceResult>> {
    let output = serde_json::to_value(&result)?;
    Ok(NodeOutcome {
        summary,
        output,
        value: result,
    })
}

/// The tool payload is either a bare array of work orders or an object
/// wrapping one under `work_orders`. Both tags are stamped on every record.
fn parse_work_orders(payload: Value, canonical: &str, original: &str) -> Vec<WorkOrder> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("work_orders") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<WorkOrder>(item).ok())
        .map(|mut wo| {
            wo.sensor_name = canonical.to_string();
            wo.original_sensor_name = original.to_string();
            wo
        })
        .collect()
}

fn summarize(result: &MaintenanceResult) -> String {
    let sensor_count = result.sensors_queried.len();
    match result.work_orders.len() {
        0 => format!("No work orders found for {} sensors", sensor_count),
        1 => format!("Found 1 work order across {} sensors", sensor_count),
        n => format!("Found {} work orders across {} sensors", n, sensor_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array_payload() {
        let payload = json!([
            {"nr": "WO-1001", "short_description": "Replace valve", "status": 1, "priority": 2}
        ]);
        let orders = parse_work_orders(payload, "40-10-FI-001", "4010FI001.DACA.PV");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].nr, "WO-1001");
        assert_eq!(orders[0].sensor_name, "40-10-FI-001");
        assert_eq!(orders[0].original_sensor_name, "4010FI001.DACA.PV");
    }

    #[test]
    fn test_parse_wrapped_payload() {
        let payload = json!({"work_orders": [{"nr": "WO-7"}, {"nr": "WO-8"}]});
        let orders = parse_work_orders(payload, "40-10-TI-371", "4010TI371.DACA.PV");
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|wo| wo.sensor_name == "40-10-TI-371"));
    }

    #[test]
    fn test_parse_unexpected_payload_is_empty() {
        assert!(parse_work_orders(json!("no records"), "c", "o").is_empty());
        assert!(parse_work_orders(json!({"result": "ok"}), "c", "o").is_empty());
    }

    #[test]
    fn test_summary_wording() {
        let mut result = MaintenanceResult {
            sensors_queried: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        };
        assert_eq!(summarize(&result), "No work orders found for 3 sensors");

        result.work_orders.push(WorkOrder::default());
        assert_eq!(summarize(&result), "Found 1 work order across 3 sensors");

        result.work_orders.push(WorkOrder::default());
        assert_eq!(summarize(&result), "Found 2 work orders across 3 sensors");
    }
}
