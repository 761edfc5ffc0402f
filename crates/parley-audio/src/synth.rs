//! Speech output backends.
//!
//! A synthesizer turns text into audible speech and returns only after
//! playback has finished, so one reply never overlaps the next.

use std::future::Future;
use std::sync::{Arc, Mutex};

use parley_core::config::SynthesisConfig;
use parley_core::error::ParleyError;

/// Text-to-speech engine.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, resolving once playback is complete.
    fn speak(&self, text: &str) -> impl Future<Output = Result<(), ParleyError>> + Send;
}

/// Speaks by running a local TTS program (espeak, say, spd-say, ...) with
/// the text as its final argument.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), ParleyError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| {
                ParleyError::Synthesis(format!("failed to run {}: {}", self.program, e))
            })?;

        if !status.success() {
            return Err(ParleyError::Synthesis(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        tracing::debug!(program = %self.program, chars = text.chars().count(), "Speech played");
        Ok(())
    }
}

/// Synthesizer that records what it was asked to say.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything spoken so far, oldest first.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), ParleyError> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(())
    }
}
