use std::io::Write;

use plantwise_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[llm]
api_key = "sk-test-key"
base_url = "http://localhost:11434/v1"
model_id = "gpt-4o-mini"
temperature = 0.2
max_tokens = 1500

[graph]
uri = "http://localhost:7474"
user = "neo4j"
password = "secret"
database = "plants"
scan_ceiling = 500

[maintenance]
mcp_url = "http://localhost:8001"

[time_series]
use_real = true
mcp_url = "http://localhost:8002"

[timeouts]
graph_ms = 5000
workflow_ms = 30000

[canonicalizer]
pattern = '^(\d{2})(\d{2})([A-Z]{2,3})(\d{3})$'
pass_through = false
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.llm.api_key, "sk-test-key");
    assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
    assert_eq!(config.llm.max_tokens, 1500);

    assert_eq!(config.graph.uri, "http://localhost:7474");
    assert_eq!(config.graph.database, "plants");
    assert_eq!(config.graph.scan_ceiling, 500);

    assert_eq!(
        config.maintenance.mcp_url.as_deref(),
        Some("http://localhost:8001")
    );
    assert!(config.time_series.use_real);

    assert_eq!(config.timeouts.graph_ms, 5000);
    assert_eq!(config.timeouts.workflow_ms, 30000);
    // untouched timeouts keep the defaults
    assert_eq!(config.timeouts.synthesizer_ms, 20000);

    assert!(!config.canonicalizer.pass_through);
    assert!(config.canonicalizer.pattern.contains("[A-Z]{2,3}"));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("PLANTWISE_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[llm]
api_key = "${PLANTWISE_TEST_API_KEY}"

[graph]
uri = "http://localhost:7474"
user = "neo4j"
password = "secret"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.llm.api_key, "expanded-key-value");

    std::env::remove_var("PLANTWISE_TEST_API_KEY");
}

#[test]
fn test_missing_config_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/plantwise.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}
