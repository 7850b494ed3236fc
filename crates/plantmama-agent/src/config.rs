//! Model configuration for chat completion calls.

use plantmama_core::Settings;
use serde::{Deserialize, Serialize};

/// Model configuration for one kind of call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,

    /// Maximum tokens to generate in responses.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for response generation (0.0 to 2.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional system prompt override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Ask the model for a single JSON object.
    #[serde(default)]
    pub json_mode: bool,
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: plantmama_core::settings::DEFAULT_MODEL.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
            json_mode: false,
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration with the given model ID.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Conversational agent model.
    pub fn agent(settings: &Settings) -> Self {
        Self::new(&settings.openai_model)
    }

    /// Vision calls that must return structured JSON.
    pub fn vision(settings: &Settings) -> Self {
        Self::new(&settings.openai_model)
            .with_max_tokens(800)
            .with_temperature(0.2)
            .with_json_mode()
    }

    /// Encyclopedia and watering helpers.
    pub fn auxiliary(settings: &Settings) -> Self {
        Self::new(&settings.openai_aux_model)
            .with_max_tokens(1000)
            .with_temperature(0.3)
            .with_json_mode()
    }

    /// Set the maximum tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Request `{"type": "json_object"}` output.
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 1500);
        assert_eq!(config.temperature, 0.7);
        assert!(!config.json_mode);
    }

    #[test]
    fn test_model_config_builder() {
        let config = ModelConfig::new("test-model")
            .with_max_tokens(1000)
            .with_temperature(0.5)
            .with_system_prompt("You are helpful.")
            .with_json_mode();

        assert_eq!(config.model, "test-model");
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.system_prompt, Some("You are helpful.".into()));
        assert!(config.json_mode);
    }

    #[test]
    fn test_temperature_clamping() {
        let config = ModelConfig::default().with_temperature(5.0);
        assert_eq!(config.temperature, 2.0);

        let config = ModelConfig::default().with_temperature(-1.0);
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn test_presets_follow_settings() {
        let settings = Settings::for_tests(Path::new("/tmp/pm"));

        let aux = ModelConfig::auxiliary(&settings);
        assert_eq!(aux.model, "gpt-4.1-mini");
        assert_eq!(aux.temperature, 0.3);
        assert!(aux.json_mode);

        let vision = ModelConfig::vision(&settings);
        assert_eq!(vision.model, settings.openai_model);
        assert!(vision.json_mode);
    }
}
