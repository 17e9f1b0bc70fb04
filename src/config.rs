use crate::defaults;
use crate::error::{Result, StagecueError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub pipeline: PipelineConfig,
}

/// Connection and conversation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub server_url: String,
    pub name: String,
    pub interrupt_marker: String,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ModelProvider,
    pub api_key: String,
    /// Empty selects the provider's default model.
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: String,
    pub max_context_length: usize,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub base_url: Option<String>,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub response_format: AudioResponseFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Send each sentence's audio as a series of chunks while it is synthesized.
    pub stream: bool,
}

/// Segmentation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub boundary_chars: String,
}

/// Chat model backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Glm,
    Echo,
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::Glm => "glm",
            Self::Echo => "echo",
        };
        f.write_str(name)
    }
}

/// Speech backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    #[default]
    Silent,
}

/// Audio encoding requested from the speech backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioResponseFormat {
    #[default]
    Wav,
    Pcm,
}

impl AudioResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::SERVER_URL.to_string(),
            name: defaults::AGENT_NAME.to_string(),
            interrupt_marker: defaults::INTERRUPT_MARKER.to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            api_key: String::new(),
            model: String::new(),
            base_url: None,
            system_prompt: String::new(),
            max_context_length: defaults::MAX_CONTEXT_LENGTH,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            base_url: None,
            api_key: String::new(),
            model: defaults::TTS_MODEL.to_string(),
            voice: defaults::TTS_VOICE.to_string(),
            response_format: AudioResponseFormat::default(),
            sample_rate: defaults::TTS_SAMPLE_RATE,
            channels: defaults::TTS_CHANNELS,
            bits_per_sample: defaults::TTS_BITS_PER_SAMPLE,
            stream: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            boundary_chars: defaults::BOUNDARY_CHARS.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StagecueError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                StagecueError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(StagecueError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STAGECUE_SERVER_URL → agent.server_url
    /// - STAGECUE_AGENT_NAME → agent.name
    /// - STAGECUE_LLM_API_KEY → llm.api_key
    /// - STAGECUE_LLM_MODEL → llm.model
    /// - STAGECUE_TTS_API_KEY → tts.api_key
    pub fn with_env_overrides(mut self) -> Self {
        let overrides: [(&str, &mut String); 5] = [
            ("STAGECUE_SERVER_URL", &mut self.agent.server_url),
            ("STAGECUE_AGENT_NAME", &mut self.agent.name),
            ("STAGECUE_LLM_API_KEY", &mut self.llm.api_key),
            ("STAGECUE_LLM_MODEL", &mut self.llm.model),
            ("STAGECUE_TTS_API_KEY", &mut self.tts.api_key),
        ];
        for (key, field) in overrides {
            if let Ok(value) = std::env::var(key)
                && !value.is_empty()
            {
                *field = value;
            }
        }
        self
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.boundary_chars.is_empty() {
            return Err(invalid("pipeline.boundary_chars", "must not be empty"));
        }
        if self.llm.max_context_length == 0 {
            return Err(invalid("llm.max_context_length", "must be at least 1"));
        }
        if self.agent.name.trim().is_empty() {
            return Err(invalid("agent.name", "must not be empty"));
        }
        if self.agent.name.contains('/') {
            return Err(invalid("agent.name", "must not contain '/'"));
        }
        if self.tts.sample_rate == 0 {
            return Err(invalid("tts.sample_rate", "must be at least 1"));
        }
        if self.tts.channels == 0 {
            return Err(invalid("tts.channels", "must be at least 1"));
        }
        if !matches!(self.tts.bits_per_sample, 8 | 16 | 32) {
            return Err(invalid("tts.bits_per_sample", "must be 8, 16 or 32"));
        }
        Ok(())
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StagecueError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/stagecue/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagecue")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> StagecueError {
    StagecueError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
