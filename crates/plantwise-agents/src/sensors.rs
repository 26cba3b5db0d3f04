use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;

use plantwise_core::config::CanonicalizerConfig;
use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::types::Row;

/// Pull sensor tags out of graph rows, preserving first-seen order.
///
/// Cypher results alias columns in several shapes (`s.tag`, `tag`, a whole
/// node under `s`, a nested `properties` map); bare `name` columns only
/// count when they carry digits, since area and plant names do not.
pub fn extract_sensor_names(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for row in rows {
        let mut found: Option<&str> = None;
        for key in ["s.tag", "tag", "s.name"] {
            if let Some(v) = row.get(key).and_then(Value::as_str) {
                found = Some(v);
                break;
            }
        }
        if found.is_none() {
            if let Some(name) = row.get("name").and_then(Value::as_str) {
                if name.chars().any(|c| c.is_ascii_digit()) {
                    found = Some(name);
                }
            }
        }
        if let Some(name) = found {
            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        // Whole-node columns (RETURN s) carry the tag inside the property map.
        for value in row.values() {
            if let Some(tag) = value
                .as_object()
                .and_then(|o| o.get("tag"))
                .and_then(Value::as_str)
            {
                if seen.insert(tag.to_string()) {
                    names.push(tag.to_string());
                }
            }
        }
    }

    names
}

/// Maps instrument-tag syntax to the maintenance system's hyphenated form:
/// `4010FI001.DACA.PV` -> `40-10-FI-001`.
///
/// The qualifier after the first `.` is dropped, the base token is split by
/// the configured pattern's capture groups, and the groups are re-joined
/// with hyphens. Non-matching tags pass through unchanged (when configured),
/// which also makes the mapping idempotent.
#[derive(Debug)]
pub struct TagCanonicalizer {
    pattern: Regex,
    pass_through: bool,
}

impl TagCanonicalizer {
    pub fn new(config: &CanonicalizerConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern)
            .map_err(|e| PlantwiseError::Config(format!("invalid tag pattern: {}", e)))?;
        Ok(Self {
            pattern,
            pass_through: config.pass_through,
        })
    }

    /// Canonical form of a tag, or `None` when the tag does not match and
    /// pass-through is disabled.
    pub fn canonicalize(&self, tag: &str) -> Option<String> {
        let base = tag.split('.').next().unwrap_or(tag);

        if let Some(caps) = self.pattern.captures(base) {
            let segments: Vec<&str> = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .collect();
            if !segments.is_empty() {
                return Some(segments.join("-"));
            }
        }

        if self.pass_through {
            Some(tag.to_string())
        } else {
            None
        }
    }
}
