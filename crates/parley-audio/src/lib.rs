//! Parley audio crate - microphone capture, phrase detection and speech output.
//!
//! Provides trait-based abstractions for capturing audio from an input
//! device and for speaking text aloud, plus scripted implementations for
//! testing without real hardware.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley_core::error::ParleyError;

pub mod buffer;
pub mod detector;
pub mod microphone;
pub mod synth;

pub use buffer::AudioBuffer;
pub use detector::{PhraseDetector, PhraseDetectorConfig, PhraseProgress};
pub use microphone::{Microphone, MicrophoneConfig};
pub use synth::{CommandSynthesizer, MockSynthesizer, SpeechSynthesizer};

// =============================================================================
// Enums
// =============================================================================

/// Result of voice activity detection on an audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadResult {
    /// Speech was detected in the audio frame.
    Speech,
    /// The audio frame contains only silence or background noise.
    Silence,
    /// The detector could not determine the content (e.g., empty frame).
    Unknown,
}

// =============================================================================
// Traits
// =============================================================================

/// Service for capturing mono audio from an input device.
///
/// Implementations buffer samples between `start` and `stop`; consumers poll
/// `take_samples` to drain what has arrived since the last call.
pub trait AudioCaptureService: Send + Sync {
    /// Start capturing audio from the configured device.
    fn start(&self) -> impl Future<Output = Result<(), ParleyError>> + Send;

    /// Stop the current capture session.
    fn stop(&self) -> impl Future<Output = Result<(), ParleyError>> + Send;

    /// Check whether capture is currently active.
    fn is_active(&self) -> bool;

    /// Drain samples captured since the previous call.
    fn take_samples(&self) -> Vec<f32>;

    /// Sample rate of the samples returned by `take_samples`.
    fn sample_rate(&self) -> u32;
}

// =============================================================================
// Scripted implementation
// =============================================================================

/// Capture service that replays a fixed script of sample batches.
///
/// Each `take_samples` call pops one batch; once the script is exhausted it
/// returns empty batches, which looks like a device delivering nothing.
///
/// `held` tracks the device itself, separately from `active`: a stream error
/// ends capture but the device stays held until `stop` releases it.
#[derive(Debug, Clone)]
pub struct ScriptedAudioService {
    sample_rate: u32,
    script: Arc<Mutex<VecDeque<Vec<f32>>>>,
    active: Arc<AtomicBool>,
    held: Arc<AtomicBool>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    fail_start: bool,
    fail_when_drained: bool,
}

impl ScriptedAudioService {
    pub fn new(sample_rate: u32, batches: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            script: Arc::new(Mutex::new(batches.into())),
            active: Arc::new(AtomicBool::new(false)),
            held: Arc::new(AtomicBool::new(false)),
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            fail_start: false,
            fail_when_drained: false,
        }
    }

    /// A service whose stream errors out once the script is exhausted.
    pub fn failing_after(sample_rate: u32, batches: Vec<Vec<f32>>) -> Self {
        Self {
            fail_when_drained: true,
            ..Self::new(sample_rate, batches)
        }
    }

    /// A service whose `start` always fails, as if no device were present.
    pub fn unavailable(sample_rate: u32) -> Self {
        Self {
            fail_start: true,
            ..Self::new(sample_rate, vec![])
        }
    }

    /// Number of successful `start` calls.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    /// Number of successful `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    /// Whether the device is still held, even if capture has ended.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// End capture as a stream error would, leaving the device held.
    pub fn interrupt(&self) {
        if self.active.swap(false, Ordering::Relaxed) {
            tracing::debug!("Scripted audio stream interrupted");
        }
    }
}

impl AudioCaptureService for ScriptedAudioService {
    async fn start(&self) -> Result<(), ParleyError> {
        if self.fail_start {
            return Err(ParleyError::Audio("No default input device found".to_string()));
        }
        if self.active.swap(true, Ordering::Relaxed) {
            return Err(ParleyError::Audio(
                "Audio capture is already active".to_string(),
            ));
        }
        self.held.store(true, Ordering::Relaxed);
        self.starts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Scripted audio capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ParleyError> {
        let was_active = self.active.swap(false, Ordering::Relaxed);
        let was_held = self.held.swap(false, Ordering::Relaxed);
        if !was_active && !was_held {
            return Err(ParleyError::Audio("Audio capture is not active".to_string()));
        }
        self.stops.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Scripted audio capture stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn take_samples(&self) -> Vec<f32> {
        if !self.is_active() {
            return Vec::new();
        }
        let batch = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match batch {
            Some(batch) => batch,
            None => {
                if self.fail_when_drained {
                    self.interrupt();
                }
                Vec::new()
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// =============================================================================
// Tests
// =============================================================================
