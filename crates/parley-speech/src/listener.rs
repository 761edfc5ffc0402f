//! The voice listener: one spoken phrase in, lowercase text out.

use std::time::{Duration, Instant};

use parley_audio::{AudioCaptureService, PhraseDetector, PhraseDetectorConfig, PhraseProgress};
use parley_core::config::VoiceConfig;

use crate::error::RecognitionError;
use crate::TranscriptionService;

/// Timing for [`VoiceListener`].
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub ambient_duration: Duration,
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
    pub pause_threshold: Duration,
    /// How often captured samples are drained from the device buffer.
    pub poll_interval: Duration,
    /// Wall-clock allowance on top of the audio-time limits, for devices
    /// that deliver samples late or not at all.
    pub grace: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ambient_duration: Duration::from_millis(500),
            listen_timeout: Duration::from_secs(20),
            phrase_limit: Duration::from_secs(20),
            pause_threshold: Duration::from_millis(800),
            poll_interval: Duration::from_millis(30),
            grace: Duration::from_secs(2),
        }
    }
}

impl ListenerConfig {
    pub fn from_voice_config(config: &VoiceConfig) -> Self {
        Self {
            ambient_duration: Duration::from_millis(config.ambient_duration_ms),
            listen_timeout: Duration::from_secs(config.listen_timeout_secs),
            phrase_limit: Duration::from_secs(config.phrase_limit_secs),
            pause_threshold: Duration::from_millis(config.pause_threshold_ms),
            ..Self::default()
        }
    }
}

/// Captures a phrase from `A` and transcribes it with `T`.
///
/// The listener owns its capture service. Each `listen` call acquires the
/// device and releases it before returning, whatever the outcome.
pub struct VoiceListener<A, T> {
    capture: A,
    transcriber: T,
    config: ListenerConfig,
}

impl<A, T> VoiceListener<A, T>
where
    A: AudioCaptureService,
    T: TranscriptionService,
{
    pub fn new(capture: A, transcriber: T, config: ListenerConfig) -> Self {
        Self {
            capture,
            transcriber,
            config,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Listen using the configured timeout and phrase limit.
    pub async fn listen(&self) -> Result<String, RecognitionError> {
        self.listen_with(self.config.listen_timeout, self.config.phrase_limit)
            .await
    }

    /// Listen for one phrase.
    ///
    /// Waits up to `timeout` for speech to start and up to `phrase_limit`
    /// for it to end, then returns the recognized text in lowercase.
    pub async fn listen_with(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<String, RecognitionError> {
        self.capture
            .start()
            .await
            .map_err(RecognitionError::from_device)?;
        tracing::info!(?timeout, ?phrase_limit, "Listening for speech");

        let captured = self.capture_phrase(timeout, phrase_limit).await;

        if let Err(e) = self.capture.stop().await {
            tracing::warn!(error = %e, "Failed to stop audio capture");
        }
        let samples = captured?;

        let result = self
            .transcriber
            .transcribe(&samples, self.capture.sample_rate())
            .await
            .map_err(RecognitionError::from_service)?;

        let text = result.text.trim().to_lowercase();
        if text.is_empty() {
            tracing::debug!(duration_secs = result.duration_secs, "Transcription was empty");
            return Err(RecognitionError::Unintelligible);
        }
        tracing::debug!(chars = text.chars().count(), "Speech recognized");
        Ok(text)
    }

    async fn capture_phrase(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Vec<f32>, RecognitionError> {
        let mut detector = PhraseDetector::new(PhraseDetectorConfig {
            sample_rate: self.capture.sample_rate(),
            ambient_duration: self.config.ambient_duration,
            listen_timeout: timeout,
            pause_threshold: self.config.pause_threshold,
            phrase_limit,
            ..PhraseDetectorConfig::default()
        });
        let deadline = Instant::now()
            + self.config.ambient_duration
            + timeout
            + phrase_limit
            + self.config.grace;

        loop {
            let samples = self.capture.take_samples();
            match detector.push(&samples) {
                PhraseProgress::Complete(phrase) => return Ok(phrase),
                PhraseProgress::TimedOut => return Err(RecognitionError::NoSpeech),
                PhraseProgress::Calibrating
                | PhraseProgress::Waiting
                | PhraseProgress::Recording => {}
            }

            if !self.capture.is_active() {
                return Err(RecognitionError::Device(
                    "audio stream stopped unexpectedly".to_string(),
                ));
            }
            if Instant::now() >= deadline {
                tracing::debug!("Listen deadline reached before the phrase closed");
                return detector.finish().ok_or(RecognitionError::NoSpeech);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockTranscriptionService;
    use parley_audio::ScriptedAudioService;

    const RATE: u32 = 1000; // 30 samples per 30ms frame

    fn config() -> ListenerConfig {
        ListenerConfig {
            ambient_duration: Duration::from_millis(90),
            listen_timeout: Duration::from_millis(300),
            phrase_limit: Duration::from_millis(600),
            pause_threshold: Duration::from_millis(60),
            poll_interval: Duration::ZERO,
            grace: Duration::ZERO,
        }
    }

    fn frames(value: f32, count: usize) -> Vec<f32> {
        vec![value; 30 * count]
    }

    fn spoken_phrase() -> Vec<Vec<f32>> {
        vec![frames(0.0, 3), frames(0.4, 5), frames(0.0, 2)]
    }

    #[tokio::test]
    async fn test_listen_returns_lowercase_text() {
        let capture = ScriptedAudioService::new(RATE, spoken_phrase());
        let transcriber = MockTranscriptionService::new("  Tell Me A Joke ");
        let listener = VoiceListener::new(capture.clone(), transcriber.clone(), config());

        let text = listener.listen().await.unwrap();
        assert_eq!(text, "tell me a joke");
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(capture.start_count(), 1);
        assert_eq!(capture.stop_count(), 1);
        assert!(!capture.is_active());
    }

    #[tokio::test]
    async fn test_silence_is_no_speech_and_releases_device() {
        let capture = ScriptedAudioService::new(RATE, vec![frames(0.0, 3), frames(0.0, 10)]);
        let transcriber = MockTranscriptionService::new("unused");
        let listener = VoiceListener::new(capture.clone(), transcriber.clone(), config());

        let err = listener.listen().await.unwrap_err();
        assert_eq!(err, RecognitionError::NoSpeech);
        assert_eq!(transcriber.calls(), 0);
        assert_eq!(capture.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_unintelligible() {
        let capture = ScriptedAudioService::new(RATE, spoken_phrase());
        let listener = VoiceListener::new(capture, MockTranscriptionService::new("   "), config());
        let err = listener.listen().await.unwrap_err();
        assert_eq!(err, RecognitionError::Unintelligible);
        assert_eq!(err.fallback_text(), "Sorry, I couldn't understand that.");
    }

    #[tokio::test]
    async fn test_service_failure_embeds_detail() {
        let capture = ScriptedAudioService::new(RATE, spoken_phrase());
        let listener = VoiceListener::new(
            capture.clone(),
            MockTranscriptionService::failing("HTTP 503"),
            config(),
        );
        let err = listener.listen().await.unwrap_err();
        assert_eq!(err, RecognitionError::Service("HTTP 503".into()));
        assert_eq!(capture.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_device() {
        let capture = ScriptedAudioService::unavailable(RATE);
        let listener = VoiceListener::new(capture.clone(), MockTranscriptionService::new("x"), config());
        let err = listener.listen().await.unwrap_err();
        assert!(matches!(err, RecognitionError::Device(_)));
        assert_eq!(capture.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_mid_phrase_releases_device() {
        let capture = ScriptedAudioService::failing_after(RATE, vec![frames(0.0, 3), frames(0.4, 2)]);
        let transcriber = MockTranscriptionService::new("unused");
        let listener = VoiceListener::new(capture.clone(), transcriber.clone(), config());

        let err = listener.listen().await.unwrap_err();
        assert!(matches!(err, RecognitionError::Device(_)));
        assert_eq!(transcriber.calls(), 0);
        assert_eq!(capture.stop_count(), 1);
        assert!(!capture.is_held());
    }

    #[tokio::test]
    async fn test_deadline_closes_open_phrase() {
        // Speech starts, then the device stops delivering samples, so the
        // pause never arrives in audio time and the wall-clock deadline
        // (ambient + timeout + limit) closes the phrase.
        let capture = ScriptedAudioService::new(RATE, vec![frames(0.0, 3), frames(0.4, 2)]);
        let mut cfg = config();
        cfg.poll_interval = Duration::from_millis(5);
        let listener = VoiceListener::new(capture, MockTranscriptionService::new("Partial"), cfg);

        assert_eq!(listener.listen().await.unwrap(), "partial");
    }

    #[test]
    fn test_config_from_voice_config() {
        let voice = VoiceConfig::default();
        let cfg = ListenerConfig::from_voice_config(&voice);
        assert_eq!(cfg.listen_timeout, Duration::from_secs(20));
        assert_eq!(cfg.phrase_limit, Duration::from_secs(20));
        assert_eq!(cfg.ambient_duration, Duration::from_millis(500));
        assert_eq!(cfg.pause_threshold, Duration::from_millis(800));
    }
}
