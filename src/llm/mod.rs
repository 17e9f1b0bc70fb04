//! Language model clients.
//!
//! A client turns a bounded slice of conversation history into an ordered
//! stream of [`ModelEvent`]s for one turn: one `StartOfResponse`, zero or more
//! `MessageDelta`s, then exactly one `Done` carrying the full text.

pub mod echo;
pub mod openai;
pub mod scripted;

use crate::config::{LlmConfig, ModelProvider};
use crate::defaults;
use crate::error::{Result, StagecueError};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use echo::EchoModel;
pub use openai::OpenAiChatModel;
pub use scripted::{ScriptedModel, ScriptedTurn};

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One `{role, content}` history entry as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Incremental events of one model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    StartOfResponse,
    MessageDelta(String),
    /// Terminal event with the full accumulated text.
    Done(String),
}

/// Event stream of one turn.
pub type ModelStream = BoxStream<'static, ModelEvent>;

/// Trait for chat model backends.
///
/// Failures inside a turn are the client's business: it logs them and ends
/// the stream with `Done` carrying whatever text it produced so far.
pub trait LanguageModel: Send + Sync {
    /// Starts a turn for the given context. The stream is lazy.
    fn respond(&self, context: Vec<ChatMessage>) -> ModelStream;

    /// Name for logging.
    fn name(&self) -> &str;
}

impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    fn respond(&self, context: Vec<ChatMessage>) -> ModelStream {
        (**self).respond(context)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Creates the model client selected in the configuration.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider {
        ModelProvider::OpenAi | ModelProvider::Glm => {
            if config.api_key.trim().is_empty() {
                return Err(StagecueError::ConfigInvalidValue {
                    key: "llm.api_key".to_string(),
                    message: format!("required for provider '{}'", config.provider),
                });
            }
            let (default_base, default_model) = match config.provider {
                ModelProvider::Glm => (defaults::GLM_BASE_URL, defaults::GLM_MODEL),
                _ => (defaults::OPENAI_BASE_URL, defaults::OPENAI_MODEL),
            };
            let base_url = config.base_url.as_deref().unwrap_or(default_base);
            let model = if config.model.trim().is_empty() {
                default_model
            } else {
                &config.model
            };
            let client = OpenAiChatModel::new(&config.api_key, model, base_url)
                .with_system_prompt(&config.system_prompt);
            Ok(Arc::new(client))
        }
        ModelProvider::Echo => Ok(Arc::new(EchoModel::new(defaults::ECHO_CHUNK_CHARS))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_create_echo_model_needs_no_key() {
        let config = LlmConfig {
            provider: ModelProvider::Echo,
            ..Default::default()
        };
        let model = create_model(&config).unwrap();
        assert_eq!(model.name(), "echo");
    }

    #[test]
    fn test_create_openai_model_requires_key() {
        let config = LlmConfig {
            provider: ModelProvider::OpenAi,
            api_key: "  ".to_string(),
            ..Default::default()
        };
        let err = create_model(&config).err().unwrap();
        assert!(matches!(err, StagecueError::ConfigInvalidValue { ref key, .. } if key == "llm.api_key"));
    }

    #[test]
    fn test_create_glm_model_uses_glm_defaults() {
        let config = LlmConfig {
            provider: ModelProvider::Glm,
            api_key: "secret".to_string(),
            ..Default::default()
        };
        let model = create_model(&config).unwrap();
        assert_eq!(model.name(), defaults::GLM_MODEL);
    }

    #[test]
    fn test_provider_defaults_apply_to_loaded_config() {
        let config: crate::config::Config =
            toml::from_str("[llm]\nprovider = \"glm\"\napi_key = \"k\"\n").unwrap();
        assert_eq!(create_model(&config.llm).unwrap().name(), "glm-4-flash");

        let config: crate::config::Config =
            toml::from_str("[llm]\napi_key = \"k\"\n").unwrap();
        assert_eq!(create_model(&config.llm).unwrap().name(), "gpt-3.5-turbo");

        let config: crate::config::Config =
            toml::from_str("[llm]\nprovider = \"glm\"\napi_key = \"k\"\nmodel = \"glm-4\"\n")
                .unwrap();
        assert_eq!(create_model(&config.llm).unwrap().name(), "glm-4");
    }
}
