pub mod openai;

use std::sync::Arc;

use plantwise_core::config::LlmConfig;
use plantwise_core::traits::ChatClient;

pub use openai::OpenAiChat;

/// Create a chat client from configuration.
pub fn create_client(config: &LlmConfig) -> Arc<dyn ChatClient> {
    Arc::new(OpenAiChat::from_config(config))
}
