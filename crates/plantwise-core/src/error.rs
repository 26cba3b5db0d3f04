use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlantwiseError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Intent errors
    #[error("intent reply was not valid JSON: {0}")]
    IntentParse(String),

    // Graph errors
    #[error("write clause rejected: {clause}")]
    CypherRejected { cypher: String, clause: String },

    #[error("Cypher execution failed: {message}")]
    CypherExecution { cypher: String, message: String },

    // Tool server errors
    #[error("tool protocol error: {0}")]
    ToolProtocol(String),

    #[error("tool session lost: {0}")]
    ToolSession(String),

    #[error("tool call failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    // Workflow errors
    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlantwiseError>;
