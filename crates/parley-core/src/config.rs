use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};
use crate::types::{ReasoningStrategy, RecognitionErrorPolicy};

/// Top-level configuration for the Parley chatbot.
///
/// Loaded from `~/.parley/config.toml` by default. Credentials are never
/// stored here; each section names the environment variable holding its key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Read a credential from the environment.
///
/// A missing, non-unicode or blank variable is a configuration error so the
/// caller can fail before any network request is attempted.
pub fn read_credential(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => Err(ParleyError::Config(format!(
            "environment variable {} is set but empty",
            var
        ))),
        Err(_) => Err(ParleyError::Config(format!(
            "environment variable {} is not set",
            var
        ))),
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Hosted language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the generative language API.
    pub base_url: String,
    /// Model name, e.g. "gemini-1.5-flash".
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// HTTP timeout per request in seconds.
    pub timeout_secs: u64,
    /// Retries for network, timeout, quota and server errors.
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles on each attempt.
    pub retry_base_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.4,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            retry_base_ms: 500,
        }
    }
}

impl ModelConfig {
    /// Resolve the model API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        read_credential(&self.api_key_env)
    }
}

/// Agent reasoning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub strategy: ReasoningStrategy,
    /// Maximum model calls per message in the tool-using loop.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            strategy: ReasoningStrategy::ConversationalReact,
            max_iterations: 5,
        }
    }
}

/// Voice input and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether the voice action is offered at all.
    pub enabled: bool,
    /// Name or substring of the input device; "default" for the system default.
    pub device_name: String,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Seconds to wait for speech to begin.
    pub listen_timeout_secs: u64,
    /// Maximum length of one phrase in seconds.
    pub phrase_limit_secs: u64,
    /// Ambient noise calibration window in milliseconds.
    pub ambient_duration_ms: u64,
    /// Silence that ends a phrase, in milliseconds.
    pub pause_threshold_ms: u64,
    /// What to do with recognition failures.
    pub recognition_errors: RecognitionErrorPolicy,
    /// Speak every bot reply through the synthesizer.
    pub speak_replies: bool,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_name: "default".to_string(),
            sample_rate: 16000,
            listen_timeout_secs: 20,
            phrase_limit_secs: 20,
            ambient_duration_ms: 500,
            pause_threshold_ms: 800,
            recognition_errors: RecognitionErrorPolicy::FeedToAgent,
            speak_replies: false,
            transcription: TranscriptionConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Hosted speech recognition sub-configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Transcription model name.
    pub model: String,
    /// Language hint (ISO-639-1), empty for auto-detect.
    pub language: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            api_key_env: "STT_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Local text-to-speech sub-configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// TTS program; the text is passed as its last argument.
    pub program: String,
    /// Extra arguments placed before the text.
    pub args: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            program: "espeak".to_string(),
            args: vec![],
        }
    }
}

/// Chat front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Page title shown above the transcript.
    pub title: String,
    /// Maximum characters accepted from the text box.
    pub max_input_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            title: "AI Chatbot with Speech Features".to_string(),
            max_input_chars: 200,
        }
    }
}
