//! Voice ports used by the turn controller, and adapters onto the speech
//! and audio crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_audio::{AudioCaptureService, SpeechSynthesizer};
use parley_speech::{RecognitionError, TranscriptionService, VoiceListener};

/// Source of spoken user input.
#[async_trait]
pub trait VoiceInput: Send {
    /// Capture one utterance. Bounded by the adapter's own timeouts.
    async fn listen(&mut self) -> Result<String, RecognitionError>;
}

/// Sink for spoken bot replies.
#[async_trait]
pub trait VoiceOutput: Send {
    /// Speak `text`, returning once playback has finished. Failures are
    /// handled by the adapter.
    async fn speak(&mut self, text: &str);
}

// =============================================================================
// Adapters
// =============================================================================

/// [`VoiceInput`] backed by a microphone listener.
pub struct ListenerInput<A, T> {
    listener: VoiceListener<A, T>,
}

impl<A, T> ListenerInput<A, T>
where
    A: AudioCaptureService,
    T: TranscriptionService,
{
    pub fn new(listener: VoiceListener<A, T>) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl<A, T> VoiceInput for ListenerInput<A, T>
where
    A: AudioCaptureService + 'static,
    T: TranscriptionService + 'static,
{
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        self.listener.listen().await
    }
}

/// [`VoiceOutput`] backed by a speech synthesizer. Errors are logged.
pub struct SynthesizerOutput<S> {
    synthesizer: S,
}

impl<S: SpeechSynthesizer> SynthesizerOutput<S> {
    pub fn new(synthesizer: S) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl<S> VoiceOutput for SynthesizerOutput<S>
where
    S: SpeechSynthesizer + 'static,
{
    async fn speak(&mut self, text: &str) {
        if let Err(e) = self.synthesizer.speak(text).await {
            tracing::warn!("Failed to speak reply: {}", e);
        }
    }
}

/// Voice input replaying a fixed list of recognition results.
///
/// Clones share the script and the call counter.
#[derive(Debug, Clone, Default)]
pub struct ScriptedVoiceInput {
    results: Arc<Mutex<VecDeque<Result<String, RecognitionError>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedVoiceInput {
    pub fn new(results: Vec<Result<String, RecognitionError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceInput for ScriptedVoiceInput {
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or(Err(RecognitionError::NoSpeech))
    }
}
