use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use tracing::debug;

use backroom_core::{ai_configured, AiSettings};

use crate::SuggestError;

/// Anything that turns a system prompt and a user message into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, SuggestError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, SuggestError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(SuggestError::Backend(format!("unknown provider: {other}"))),
    }
}

/// [`TextGenerator`] backed by a hosted or local model through the `llm` crate.
#[derive(Debug, Clone)]
pub struct LlmEngine {
    settings: AiSettings,
}

impl LlmEngine {
    pub fn new(settings: AiSettings) -> Result<Self, SuggestError> {
        if !ai_configured(&settings) {
            return Err(SuggestError::NotConfigured);
        }
        map_backend(&settings.provider)?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }
}

#[async_trait]
impl TextGenerator for LlmEngine {
    async fn generate(&self, system: &str, user: &str) -> Result<String, SuggestError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| SuggestError::Backend(format!("build LLM: {e}")))?;

        let messages = vec![ChatMessage::user().content(user).build()];

        debug!(provider = %self.settings.provider, model = %self.settings.model, "sending prompt");
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| SuggestError::Backend(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(SuggestError::Backend("LLM returned empty text".to_string())),
            None => Err(SuggestError::Backend("LLM returned no text".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_settings_are_refused() {
        let err = LlmEngine::new(AiSettings::default()).unwrap_err();
        assert!(matches!(err, SuggestError::NotConfigured));
    }

    #[test]
    fn unknown_provider_is_refused() {
        let settings = AiSettings {
            provider: "carrier-pigeon".into(),
            api_key: "key".into(),
            model: "m".into(),
        };
        assert!(matches!(LlmEngine::new(settings), Err(SuggestError::Backend(_))));
    }

    #[test]
    fn local_models_need_no_key() {
        let settings = AiSettings {
            provider: "ollama".into(),
            api_key: String::new(),
            model: "llama3".into(),
        };
        assert!(LlmEngine::new(settings).is_ok());
    }
}
