use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;

use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::ToolClient;
use plantwise_core::types::{Anomaly, GraphResult, Measurement, TimeSeriesResult};

use crate::sensors::extract_sensor_names;
use crate::workflow::NodeOutcome;

/// At most this many sensors are queried per workflow.
pub const TIME_SERIES_SENSOR_CAP: usize = 20;

pub const MEASUREMENTS_PER_SENSOR: usize = 5;

pub const SENSOR_DATA_TOOL: &str = "get_sensor_data";

pub const UNAVAILABLE: &str = "time-series server unavailable";

const ANOMALY_PROBABILITY: f64 = 0.2;

const ANOMALY_TYPES: &[&str] = &["spike", "drop", "out_of_range"];
const SEVERITIES: &[&str] = &["low", "medium", "high"];

/// Retrieves recent measurements and anomaly flags for the sensors named in
/// the graph result.
///
/// By default the agent synthesizes data (`is_mock = true`). Flipping
/// `use_real` routes the same request through a tool server speaking the
/// identical protocol as the maintenance lookup; the result shape does not
/// change.
pub struct TimeSeriesAgent {
    tools: Option<Arc<dyn ToolClient>>,
    use_real: bool,
}

impl TimeSeriesAgent {
    pub fn new(tools: Option<Arc<dyn ToolClient>>, use_real: bool) -> Self {
        Self { tools, use_real }
    }

    pub async fn execute(&self, graph: &GraphResult) -> Result<NodeOutcome<TimeSeriesResult>> {
        let sensors: Vec<String> = extract_sensor_names(&graph.rows)
            .into_iter()
            .take(TIME_SERIES_SENSOR_CAP)
            .collect();

        if self.use_real {
            self.execute_real(&sensors).await
        } else {
            self.execute_mock(&sensors)
        }
    }

    fn execute_mock(&self, sensors: &[String]) -> Result<NodeOutcome<TimeSeriesResult>> {
        if sensors.is_empty() {
            let result = TimeSeriesResult {
                is_mock: true,
                ..Default::default()
            };
            return outcome(result, "No sensors found to query".into());
        }

        let mut rng = rand::rng();
        let now = Utc::now();
        let measurements = mock_measurements(sensors, now, &mut rng);
        let anomalies = mock_anomalies(&measurements, &mut rng);
        debug!(
            measurements = measurements.len(),
            anomalies = anomalies.len(),
            "Synthetic sensor data generated"
        );

        let result = TimeSeriesResult {
            measurements,
            anomalies,
            is_mock: true,
            error: None,
        };
        let summary = summarize(&result);
        outcome(result, summary)
    }

    async fn execute_real(&self, sensors: &[String]) -> Result<NodeOutcome<TimeSeriesResult>> {
        let tools = self
            .tools
            .as_ref()
            .ok_or_else(|| PlantwiseError::ToolProtocol(UNAVAILABLE.into()))?;

        if sensors.is_empty() {
            let result = TimeSeriesResult::default();
            return outcome(result, "No sensors found to query".into());
        }

        let payload = tools
            .call_tool(
                SENSOR_DATA_TOOL,
                json!({ "sensor_names": sensors, "time_range": "24h" }),
            )
            .await
            .map_err(|e| match e {
                PlantwiseError::ToolProtocol(_) => PlantwiseError::ToolProtocol(UNAVAILABLE.into()),
                other => other,
            })?;

        let measurements = parse_list::<Measurement>(&payload, "measurements");
        let anomalies = parse_list::<Anomaly>(&payload, "anomalies");

        let result = TimeSeriesResult {
            measurements,
            anomalies,
            is_mock: false,
            error: None,
        };
        let summary = summarize(&result);
        outcome(result, summary)
    }
}

fn outcome(result: TimeSeriesResult, summary: String) -> Result<NodeOutcome<TimeSeriesResult>> {
    // Measurements are bulky; the trace keeps counts and the anomalies only.
    let output = json!({
        "measurement_count": result.measurements.len(),
        "anomalies": result.anomalies,
        "sensors": result.measurements.iter().map(|m| &m.sensor_name).collect::<std::collections::BTreeSet<_>>(),
        "is_mock": result.is_mock,
    });
    Ok(NodeOutcome {
        summary,
        output,
        value: result,
    })
}

fn parse_list<T: serde::de::DeserializeOwned>(payload: &Value, key: &str) -> Vec<T> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Unit from the first letter of the tag's instrument code: the base name is
/// area digits followed by the type letters, so the first alphabetic
/// character decides.
pub fn unit_for_tag(tag: &str) -> &'static str {
    let base = tag.split('.').next().unwrap_or(tag);
    match base.chars().find(|c| c.is_ascii_alphabetic()) {
        Some('T') | Some('t') => "°C",
        Some('P') | Some('p') => "bar",
        Some('L') | Some('l') => "%",
        Some('F') | Some('f') => "L/min",
        _ => "raw",
    }
}

fn value_for_unit<R: Rng>(unit: &str, rng: &mut R) -> f64 {
    let value: f64 = match unit {
        "°C" => rng.random_range(20.0..80.0),
        "bar" => rng.random_range(1.0..10.0),
        "%" => rng.random_range(0.0..100.0),
        "L/min" => rng.random_range(0.0..200.0),
        _ => rng.random_range(0.0..100.0),
    };
    (value * 100.0).round() / 100.0
}

/// Five recent hourly points per sensor, newest first.
pub fn mock_measurements<R: Rng>(
    sensors: &[String],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Measurement> {
    let mut measurements = Vec::with_capacity(sensors.len() * MEASUREMENTS_PER_SENSOR);

    for sensor in sensors {
        let unit = unit_for_tag(sensor);
        for i in 0..MEASUREMENTS_PER_SENSOR {
            measurements.push(Measurement {
                sensor_name: sensor.clone(),
                timestamp: now - Duration::hours(i as i64),
                value: value_for_unit(unit, rng),
                unit: unit.to_string(),
                quality: if rng.random::<f64>() > 0.1 {
                    "Good".to_string()
                } else {
                    "Uncertain".to_string()
                },
            });
        }
    }

    measurements
}

/// Flag each sensor anomalous with fixed probability, anchored to its
/// newest measurement.
pub fn mock_anomalies<R: Rng>(measurements: &[Measurement], rng: &mut R) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for measurement in measurements {
        if !seen.insert(measurement.sensor_name.clone()) {
            continue; // only the newest point per sensor is considered
        }
        if rng.random::<f64>() < ANOMALY_PROBABILITY {
            anomalies.push(Anomaly {
                sensor_name: measurement.sensor_name.clone(),
                timestamp: measurement.timestamp,
                value: measurement.value,
                anomaly_type: ANOMALY_TYPES[rng.random_range(0..ANOMALY_TYPES.len())].to_string(),
                severity: SEVERITIES[rng.random_range(0..SEVERITIES.len())].to_string(),
            });
        }
    }

    anomalies
}

fn summarize(result: &TimeSeriesResult) -> String {
    let mock_note = if result.is_mock { " (mock data)" } else { "" };
    if result.anomalies.is_empty() {
        format!(
            "Retrieved {} measurements, no anomalies detected{}",
            result.measurements.len(),
            mock_note
        )
    } else {
        format!(
            "Retrieved {} measurements, found {} anomalies{}",
            result.measurements.len(),
            result.anomalies.len(),
            mock_note
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unit_inference() {
        assert_eq!(unit_for_tag("4010TI371.DACA.PV"), "°C");
        assert_eq!(unit_for_tag("4010PI105.DACA.PV"), "bar");
        assert_eq!(unit_for_tag("4038LI329.DACA.PV"), "%");
        assert_eq!(unit_for_tag("4010FI001.DACA.PV"), "L/min");
        assert_eq!(unit_for_tag("4010XV900"), "raw");
        assert_eq!(unit_for_tag("0000"), "raw");
    }

    #[test]
    fn test_mock_measurements_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let sensors = vec!["4010TI371.DACA.PV".to_string(), "4010FI001.DACA.PV".to_string()];
        let now = Utc::now();

        let measurements = mock_measurements(&sensors, now, &mut rng);
        assert_eq!(measurements.len(), 2 * MEASUREMENTS_PER_SENSOR);

        let temps: Vec<_> = measurements
            .iter()
            .filter(|m| m.sensor_name == sensors[0])
            .collect();
        assert_eq!(temps.len(), MEASUREMENTS_PER_SENSOR);
        assert!(temps.iter().all(|m| m.unit == "°C"));
        assert!(temps.iter().all(|m| (20.0..80.0).contains(&m.value)));
        // newest first, one hour apart
        assert_eq!(temps[0].timestamp, now);
        assert_eq!(temps[1].timestamp, now - Duration::hours(1));
    }

    #[test]
    fn test_mock_anomalies_reference_existing_sensors() {
        let mut rng = StdRng::seed_from_u64(42);
        let sensors: Vec<String> = (0..50).map(|i| format!("40{:02}TI{:03}", i % 90, i)).collect();
        let measurements = mock_measurements(&sensors, Utc::now(), &mut rng);

        let anomalies = mock_anomalies(&measurements, &mut rng);
        assert!(anomalies.len() <= sensors.len());
        for anomaly in &anomalies {
            assert!(sensors.contains(&anomaly.sensor_name));
            assert!(ANOMALY_TYPES.contains(&anomaly.anomaly_type.as_str()));
            assert!(SEVERITIES.contains(&anomaly.severity.as_str()));
        }
    }

    #[test]
    fn test_at_most_one_anomaly_per_sensor() {
        let mut rng = StdRng::seed_from_u64(3);
        let sensors = vec!["4010TI371".to_string()];
        let measurements = mock_measurements(&sensors, Utc::now(), &mut rng);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let anomalies = mock_anomalies(&measurements, &mut rng);
            assert!(anomalies.len() <= 1);
        }
    }

    #[test]
    fn test_summary_wording() {
        let result = TimeSeriesResult {
            measurements: vec![],
            anomalies: vec![],
            is_mock: true,
            error: None,
        };
        assert_eq!(
            summarize(&result),
            "Retrieved 0 measurements, no anomalies detected (mock data)"
        );
    }
}
