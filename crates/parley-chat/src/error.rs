//! Error types for the turn controller.

use parley_speech::RecognitionError;

/// Why a turn was refused. None of these mutate the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Please type a message before sending.")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("voice input is not available")]
    VoiceUnavailable,
    #[error("{0}")]
    Recognition(#[from] RecognitionError),
}
