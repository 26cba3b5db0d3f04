//! Shared foundation for the plantwise workspace: the error enum,
//! configuration, wire/state types, and the trait seams the agent layer
//! depends on (`ChatClient`, `GraphStore`, `ToolClient`).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{PlantwiseError, Result};
