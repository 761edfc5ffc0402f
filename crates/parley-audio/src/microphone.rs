//! Microphone capture via cpal.
//!
//! Captures the configured input device, downmixes to mono and resamples to
//! the requested rate inside the device callback, and stores samples in an
//! [`AudioBuffer`] for the listener to drain.
//!
//! Without the `microphone` feature, `start` returns `ParleyError::Audio`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(feature = "microphone")]
use std::sync::Mutex;

use parley_core::error::ParleyError;

use crate::buffer::AudioBuffer;
use crate::AudioCaptureService;

/// Configuration for the microphone capture service.
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    /// Name or substring of the input device, or "default".
    pub device_name: String,
    /// Target sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            device_name: "default".to_string(),
            sample_rate: 16000,
        }
    }
}

/// Wrapper to keep a `cpal::Stream` inside a `Mutex`.
///
/// `cpal::Stream` is `!Send` on several backends because of a platform
/// marker. We only ever store it (to keep capture alive) or drop it (to stop
/// capture), never touch it from another thread while it is in use.
#[cfg(feature = "microphone")]
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream handle is only moved into and out of the mutex; audio
// callbacks run on cpal's own thread and share state solely through
// `AudioBuffer`, which is itself synchronized.
#[cfg(feature = "microphone")]
unsafe impl Send for SendStream {}
#[cfg(feature = "microphone")]
unsafe impl Sync for SendStream {}

/// Input-device capture service.
pub struct Microphone {
    config: MicrophoneConfig,
    active: Arc<AtomicBool>,
    buffer: AudioBuffer,
    /// The cpal stream is stored here while active. Dropping it stops capture.
    #[cfg(feature = "microphone")]
    stream: Mutex<Option<SendStream>>,
}

impl Microphone {
    pub fn new(config: MicrophoneConfig) -> Self {
        // Buffer 30 seconds of audio at the target rate.
        let max_samples = (config.sample_rate as usize) * 30;
        Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
            buffer: AudioBuffer::new(max_samples),
            #[cfg(feature = "microphone")]
            stream: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MicrophoneConfig {
        &self.config
    }

    /// Whether this build can talk to a real device.
    pub fn is_supported() -> bool {
        cfg!(feature = "microphone")
    }
}

#[cfg(feature = "microphone")]
impl AudioCaptureService for Microphone {
    async fn start(&self) -> Result<(), ParleyError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use tracing::{debug, info};

        if self.active.load(Ordering::Relaxed) {
            return Err(ParleyError::Audio("Audio capture already active".into()));
        }

        let host = cpal::default_host();

        let device = if self.config.device_name == "default" {
            host.default_input_device()
                .ok_or_else(|| ParleyError::Audio("No default input device found".into()))?
        } else {
            let name_lower = self.config.device_name.to_lowercase();
            host.input_devices()
                .map_err(|e| ParleyError::Audio(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| {
                    d.name()
                        .map(|n| n.to_lowercase().contains(&name_lower))
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    ParleyError::Audio(format!(
                        "Audio device '{}' not found",
                        self.config.device_name
                    ))
                })?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        debug!(device = %device_name, "Selected input device");

        // Many devices reject arbitrary rates, so capture at the device's own
        // format and convert in the callback.
        let stream_config = match device.default_input_config() {
            Ok(supported) => cpal::StreamConfig {
                channels: supported.channels(),
                sample_rate: supported.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            Err(e) => {
                debug!(error = %e, "Could not query default config, using requested rate");
                cpal::StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(self.config.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                }
            }
        };

        self.buffer.clear();
        let buffer = self.buffer.clone();
        let active_flag = Arc::clone(&self.active);

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        let target_rate = self.config.sample_rate;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, device_channels);
                    buffer.push(&resample(&mono, device_rate, target_rate));
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                    active_flag.store(false, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| ParleyError::Audio(format!("Failed to build audio stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| ParleyError::Audio(format!("Failed to start audio stream: {}", e)))?;

        if let Ok(mut guard) = self.stream.lock() {
            *guard = Some(SendStream(stream));
        }

        self.active.store(true, Ordering::Relaxed);
        info!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate,
            "Microphone capture started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), ParleyError> {
        // A stream error clears `active` but leaves the stream in place, so
        // the stream is dropped here regardless of the flag.
        let stream = self.stream.lock().ok().and_then(|mut guard| guard.take());
        let was_active = self.active.swap(false, Ordering::Relaxed);
        if stream.is_none() && !was_active {
            return Err(ParleyError::Audio("Audio capture is not active".into()));
        }
        drop(stream);

        tracing::info!(was_active, "Microphone capture stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn take_samples(&self) -> Vec<f32> {
        self.buffer.take()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(not(feature = "microphone"))]
impl AudioCaptureService for Microphone {
    async fn start(&self) -> Result<(), ParleyError> {
        tracing::warn!("Microphone capture requested but parley was built without the `microphone` feature");
        Err(ParleyError::Audio(
            "Microphone capture is not available in this build".to_string(),
        ))
    }

    async fn stop(&self) -> Result<(), ParleyError> {
        Err(ParleyError::Audio("Audio capture is not active".to_string()))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn take_samples(&self) -> Vec<f32> {
        self.buffer.take()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

/// Average interleaved channels down to mono.
pub fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Resample by linear interpolation.
pub fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() || to_rate == 0 {
        return mono.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (mono.len() as f64 / ratio).ceil() as usize;
    let last = mono.len() - 1;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            mono[idx0] * (1.0 - frac) + mono[idx1] * frac
        })
        .collect()
}
