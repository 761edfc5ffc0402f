//! Recognition failures.
//!
//! Each variant displays as a sentence fit to show to the user, which is
//! what the chat layer feeds into the conversation when configured to treat
//! failures as text.

use parley_core::error::ParleyError;

/// Why a voice action did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Audio was captured but no words could be made out.
    #[error("Sorry, I couldn't understand that.")]
    Unintelligible,
    /// Nobody spoke before the listen timeout.
    #[error("No speech detected.")]
    NoSpeech,
    /// The recognition service failed or could not be reached.
    #[error("Speech recognition error: {0}")]
    Service(String),
    /// The microphone could not be opened or stopped delivering audio.
    #[error("Microphone error: {0}")]
    Device(String),
}

impl RecognitionError {
    /// Human-readable text standing in for the utterance.
    pub fn fallback_text(&self) -> String {
        self.to_string()
    }

    pub(crate) fn from_service(err: ParleyError) -> Self {
        match err {
            ParleyError::Transcription(msg) => RecognitionError::Service(msg),
            other => RecognitionError::Service(other.to_string()),
        }
    }

    pub(crate) fn from_device(err: ParleyError) -> Self {
        match err {
            ParleyError::Audio(msg) => RecognitionError::Device(msg),
            other => RecognitionError::Device(other.to_string()),
        }
    }
}
