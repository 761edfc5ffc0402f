//! Parley speech crate - speech-to-text services and the voice listener.
//!
//! Provides a trait-based abstraction for transcription, a client for
//! hosted OpenAI-compatible transcription APIs, a mock for tests, and
//! [`VoiceListener`], which turns one spoken phrase into lowercase text.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parley_core::error::ParleyError;

pub mod error;
pub mod hosted;
pub mod listener;
pub mod wav;

pub use error::RecognitionError;
pub use hosted::HostedTranscriber;
pub use listener::{ListenerConfig, VoiceListener};

// =============================================================================
// Result types
// =============================================================================

/// The result of a transcription request.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Full transcribed text, trimmed.
    pub text: String,
    /// Total audio duration in seconds.
    pub duration_secs: f32,
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing audio data to text.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe mono PCM samples in [-1.0, 1.0] at `sample_rate` Hz.
    ///
    /// An empty `text` in the result means nothing intelligible was heard.
    fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> impl Future<Output = Result<TranscriptionResult, ParleyError>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcription service returning a canned reply.
#[derive(Debug, Clone)]
pub struct MockTranscriptionService {
    reply: Result<String, String>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriptionService {
    /// Always transcribe to `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fail with a transcription error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of transcription requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, ParleyError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if audio_data.is_empty() {
            return Err(ParleyError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(ParleyError::Transcription(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let duration_secs = audio_data.len() as f32 / sample_rate as f32;
        match &self.reply {
            Ok(text) => Ok(TranscriptionResult {
                text: text.trim().to_string(),
                duration_secs,
            }),
            Err(message) => Err(ParleyError::Transcription(message.clone())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
