use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlantwiseError, Result};

/// Top-level plantwise configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub time_series: TimeSeriesConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub canonicalizer: CanonicalizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Hard ceiling applied to every call regardless of what the caller asks for.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URI of the graph store's HTTP endpoint, e.g. `http://localhost:7474`.
    pub uri: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_graph_database")]
    pub database: String,
    /// Rows beyond this are dropped before the agent ever sees them.
    #[serde(default = "default_scan_ceiling")]
    pub scan_ceiling: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Base URL of the maintenance tool server. Absent = agent reports unavailable.
    #[serde(default)]
    pub mcp_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeriesConfig {
    /// Switch from the synthetic generator to the real tool server.
    #[serde(default)]
    pub use_real: bool,
    #[serde(default)]
    pub mcp_url: Option<String>,
}

/// Per-node and whole-workflow deadlines in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_intent_ms")]
    pub intent_ms: u64,
    #[serde(default = "default_graph_ms")]
    pub graph_ms: u64,
    #[serde(default = "default_maintenance_ms")]
    pub maintenance_ms: u64,
    #[serde(default = "default_time_series_ms")]
    pub time_series_ms: u64,
    #[serde(default = "default_synthesizer_ms")]
    pub synthesizer_ms: u64,
    #[serde(default = "default_workflow_ms")]
    pub workflow_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            intent_ms: default_intent_ms(),
            graph_ms: default_graph_ms(),
            maintenance_ms: default_maintenance_ms(),
            time_series_ms: default_time_series_ms(),
            synthesizer_ms: default_synthesizer_ms(),
            workflow_ms: default_workflow_ms(),
        }
    }
}

/// Sensor-tag canonicalization rule. The pattern captures the four segments
/// of the instrument-tag base name; anything that does not match passes
/// through unchanged when `pass_through` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalizerConfig {
    #[serde(default = "default_tag_pattern")]
    pub pattern: String,
    #[serde(default = "default_pass_through")]
    pub pass_through: bool,
}

impl Default for CanonicalizerConfig {
    fn default() -> Self {
        Self {
            pattern: default_tag_pattern(),
            pass_through: default_pass_through(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2_000
}

fn default_graph_database() -> String {
    "neo4j".to_string()
}

fn default_scan_ceiling() -> usize {
    1_000
}

fn default_intent_ms() -> u64 {
    10_000
}

fn default_graph_ms() -> u64 {
    10_000
}

fn default_maintenance_ms() -> u64 {
    15_000
}

fn default_time_series_ms() -> u64 {
    10_000
}

fn default_synthesizer_ms() -> u64 {
    20_000
}

fn default_workflow_ms() -> u64 {
    45_000
}

fn default_tag_pattern() -> String {
    r"^(\d{2})(\d{2})([A-Z]{2})(\d{3})$".to_string()
}

fn default_pass_through() -> bool {
    true
}

impl AppConfig {
    /// Load and parse a TOML config file. `${VAR}` references in the raw
    /// text are replaced with the named environment variable before parsing,
    /// so secrets can stay out of the file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| PlantwiseError::ConfigNotFound(path.display().to_string()))?;

        toml::from_str(&expand_env_refs(&raw))
            .map_err(|e| PlantwiseError::Config(e.to_string()))
    }
}

/// Substitute every `${VAR}` occurrence with its environment value.
///
/// An unset variable (or an unterminated reference) is left as written, so
/// the TOML parse error that follows points at the offending text.
fn expand_env_refs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let reference = &rest[start + 2..];

        let Some(end) = reference.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let name = &reference[..end];
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &reference[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[llm]
api_key = "sk-test"

[graph]
uri = "http://localhost:7474"
user = "neo4j"
password = "secret"
"#
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: AppConfig = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(config.llm.model_id, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 2_000);
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.graph.scan_ceiling, 1_000);
        assert!(config.maintenance.mcp_url.is_none());
        assert!(!config.time_series.use_real);
        assert_eq!(config.timeouts.graph_ms, 10_000);
        assert_eq!(config.timeouts.maintenance_ms, 15_000);
        assert_eq!(config.timeouts.time_series_ms, 10_000);
        assert_eq!(config.timeouts.synthesizer_ms, 20_000);
        assert_eq!(config.timeouts.workflow_ms, 45_000);
        assert!(config.canonicalizer.pass_through);
    }

    #[test]
    fn test_timeout_overrides() {
        let toml_str = format!(
            "{}\n[timeouts]\ngraph_ms = 2000\nworkflow_ms = 9000\n",
            minimal_toml()
        );
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.timeouts.graph_ms, 2_000);
        assert_eq!(config.timeouts.workflow_ms, 9_000);
        // untouched fields keep their defaults
        assert_eq!(config.timeouts.maintenance_ms, 15_000);
    }

    #[test]
    fn test_env_reference_expanded() {
        std::env::set_var("PLANTWISE_CONF_TEST", "hello");
        let out = expand_env_refs("key = \"${PLANTWISE_CONF_TEST}\" # ${PLANTWISE_CONF_TEST}");
        assert_eq!(out, "key = \"hello\" # hello");
        std::env::remove_var("PLANTWISE_CONF_TEST");
    }

    #[test]
    fn test_unset_reference_kept() {
        let out = expand_env_refs("key = \"${PLANTWISE_CONF_UNSET}\"");
        assert_eq!(out, "key = \"${PLANTWISE_CONF_UNSET}\"");
    }

    #[test]
    fn test_unterminated_reference_kept() {
        let out = expand_env_refs("key = \"${PLANTWISE_CONF");
        assert_eq!(out, "key = \"${PLANTWISE_CONF");
    }

    #[test]
    fn test_text_without_references_untouched() {
        let input = "a = 1\nb = \"two\"\n";
        assert_eq!(expand_env_refs(input), input);
    }
}
