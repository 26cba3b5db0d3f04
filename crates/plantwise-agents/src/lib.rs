//! Multi-agent orchestration core: intent classification, graph retrieval,
//! maintenance and time-series lookups, and synthesis over a shared
//! per-request state with a structured execution trace.

pub mod graph_agent;
pub mod intent;
pub mod maintenance;
pub mod prompts;
pub mod sensors;
pub mod state;
pub mod synthesizer;
pub mod timeseries;
pub mod workflow;

pub use state::WorkflowState;
pub use workflow::{CoordinatorOptions, NodeOutcome, WorkflowCoordinator};
