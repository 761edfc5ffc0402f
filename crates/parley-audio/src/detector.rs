//! Energy-based phrase detection.
//!
//! Calibrates a speech threshold from ambient noise, waits for the energy to
//! rise above it, then records until a pause or the phrase limit. Durations
//! are measured in audio time (sample counts), so the detector behaves the
//! same whether samples arrive from a device or from a test script.

use std::time::Duration;

use crate::VadResult;

/// Length of one analysis frame.
const FRAME_DURATION: Duration = Duration::from_millis(30);

/// Settings for [`PhraseDetector`].
#[derive(Debug, Clone)]
pub struct PhraseDetectorConfig {
    /// Sample rate of the incoming audio in Hz.
    pub sample_rate: u32,
    /// Ambient noise window used to calibrate the threshold.
    pub ambient_duration: Duration,
    /// How long to wait for speech before giving up.
    pub listen_timeout: Duration,
    /// Trailing silence that ends a phrase.
    pub pause_threshold: Duration,
    /// Hard cap on phrase length.
    pub phrase_limit: Duration,
    /// Lowest RMS energy ever treated as speech.
    pub min_energy: f32,
    /// Threshold = ambient RMS * this ratio (floored at `min_energy`).
    pub dynamic_ratio: f32,
}

impl Default for PhraseDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            ambient_duration: Duration::from_millis(500),
            listen_timeout: Duration::from_secs(20),
            pause_threshold: Duration::from_millis(800),
            phrase_limit: Duration::from_secs(20),
            min_energy: 0.01,
            dynamic_ratio: 1.5,
        }
    }
}

/// Where the detector is after consuming a batch of samples.
#[derive(Debug, Clone, PartialEq)]
pub enum PhraseProgress {
    /// Still measuring ambient noise.
    Calibrating,
    /// Calibrated; no speech yet.
    Waiting,
    /// Speech started; phrase still open.
    Recording,
    /// Phrase finished; carries the recorded samples.
    Complete(Vec<f32>),
    /// No speech began within the listen timeout.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Calibrating,
    Waiting,
    Recording,
    Done,
}

/// Incremental phrase detector fed with arbitrary-sized sample batches.
#[derive(Debug)]
pub struct PhraseDetector {
    config: PhraseDetectorConfig,
    frame_len: usize,
    pending: Vec<f32>,
    stage: Stage,
    threshold: f32,
    ambient_energy_sum: f64,
    ambient_frames: usize,
    ambient_target: usize,
    waited_frames: usize,
    timeout_frames: usize,
    silent_frames: usize,
    pause_frames: usize,
    limit_frames: usize,
    phrase: Vec<f32>,
    phrase_frames: usize,
}

impl PhraseDetector {
    pub fn new(config: PhraseDetectorConfig) -> Self {
        let frame_len = frames_for(FRAME_DURATION, config.sample_rate).max(1);
        let to_frames = |d: Duration| {
            let samples = frames_for(d, config.sample_rate);
            samples.div_ceil(frame_len)
        };
        let ambient_target = to_frames(config.ambient_duration);
        let timeout_frames = to_frames(config.listen_timeout).max(1);
        let pause_frames = to_frames(config.pause_threshold).max(1);
        let limit_frames = to_frames(config.phrase_limit).max(1);
        let stage = if ambient_target == 0 {
            Stage::Waiting
        } else {
            Stage::Calibrating
        };

        Self {
            threshold: config.min_energy,
            config,
            frame_len,
            pending: Vec::new(),
            stage,
            ambient_energy_sum: 0.0,
            ambient_frames: 0,
            ambient_target,
            waited_frames: 0,
            timeout_frames,
            silent_frames: 0,
            pause_frames,
            limit_frames,
            phrase: Vec::new(),
            phrase_frames: 0,
        }
    }

    /// Current speech threshold (RMS).
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify a single frame against the current threshold.
    pub fn classify(&self, frame: &[f32]) -> VadResult {
        if frame.is_empty() {
            return VadResult::Unknown;
        }
        if rms(frame) > self.threshold {
            VadResult::Speech
        } else {
            VadResult::Silence
        }
    }

    /// Feed captured samples and report progress.
    ///
    /// The detector is single-use: after `Complete` or `TimedOut` further
    /// input is ignored and `TimedOut` is reported.
    pub fn push(&mut self, samples: &[f32]) -> PhraseProgress {
        if self.stage == Stage::Done {
            return PhraseProgress::TimedOut;
        }
        self.pending.extend_from_slice(samples);

        let mut offset = 0;
        while self.pending.len() - offset >= self.frame_len {
            let end = offset + self.frame_len;
            let frame: Vec<f32> = self.pending[offset..end].to_vec();
            offset = end;

            if let Some(done) = self.step(&frame) {
                self.pending.clear();
                return done;
            }
        }
        self.pending.drain(..offset);

        match self.stage {
            Stage::Calibrating => PhraseProgress::Calibrating,
            Stage::Waiting => PhraseProgress::Waiting,
            Stage::Recording => PhraseProgress::Recording,
            Stage::Done => PhraseProgress::TimedOut,
        }
    }

    /// Close an open phrase early (e.g. the device went quiet for good).
    ///
    /// Returns the samples recorded so far, or `None` if speech never began.
    pub fn finish(&mut self) -> Option<Vec<f32>> {
        if self.stage != Stage::Recording {
            return None;
        }
        self.stage = Stage::Done;
        self.phrase.extend(self.pending.drain(..));
        Some(std::mem::take(&mut self.phrase))
    }

    fn step(&mut self, frame: &[f32]) -> Option<PhraseProgress> {
        match self.stage {
            Stage::Calibrating => {
                self.ambient_energy_sum += f64::from(rms(frame));
                self.ambient_frames += 1;
                if self.ambient_frames >= self.ambient_target {
                    let ambient = (self.ambient_energy_sum / self.ambient_frames as f64) as f32;
                    self.threshold = (ambient * self.config.dynamic_ratio).max(self.config.min_energy);
                    self.stage = Stage::Waiting;
                    tracing::debug!(ambient, threshold = self.threshold, "Ambient noise calibrated");
                }
                None
            }
            Stage::Waiting => {
                if self.classify(frame) == VadResult::Speech {
                    self.stage = Stage::Recording;
                    self.phrase.extend_from_slice(frame);
                    self.phrase_frames = 1;
                    self.silent_frames = 0;
                    return self.check_limit();
                }
                self.waited_frames += 1;
                if self.waited_frames >= self.timeout_frames {
                    self.stage = Stage::Done;
                    return Some(PhraseProgress::TimedOut);
                }
                None
            }
            Stage::Recording => {
                self.phrase.extend_from_slice(frame);
                self.phrase_frames += 1;
                if self.classify(frame) == VadResult::Speech {
                    self.silent_frames = 0;
                } else {
                    self.silent_frames += 1;
                    if self.silent_frames >= self.pause_frames {
                        self.stage = Stage::Done;
                        return Some(PhraseProgress::Complete(std::mem::take(&mut self.phrase)));
                    }
                }
                self.check_limit()
            }
            Stage::Done => Some(PhraseProgress::TimedOut),
        }
    }

    fn check_limit(&mut self) -> Option<PhraseProgress> {
        if self.phrase_frames >= self.limit_frames {
            self.stage = Stage::Done;
            return Some(PhraseProgress::Complete(std::mem::take(&mut self.phrase)));
        }
        None
    }
}

/// Root-mean-square energy of a frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000; // 30 samples per frame

    fn config() -> PhraseDetectorConfig {
        PhraseDetectorConfig {
            sample_rate: RATE,
            ambient_duration: Duration::from_millis(90),
            listen_timeout: Duration::from_millis(300),
            pause_threshold: Duration::from_millis(60),
            phrase_limit: Duration::from_millis(600),
            min_energy: 0.01,
            dynamic_ratio: 1.5,
        }
    }

    fn frames(value: f32, count: usize) -> Vec<f32> {
        vec![value; 30 * count]
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_sets_threshold_from_ambient() {
        let mut det = PhraseDetector::new(config());
        assert_eq!(det.push(&frames(0.1, 2)), PhraseProgress::Calibrating);
        assert_eq!(det.push(&frames(0.1, 1)), PhraseProgress::Waiting);
        assert!((det.threshold() - 0.15).abs() < 1e-4);
    }

    #[test]
    fn test_quiet_room_uses_min_energy() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        assert!((det.threshold() - 0.01).abs() < f32::EPSILON);
    }

    #[test]
    fn test_silence_times_out() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        // 10 frames of waiting = 300ms timeout
        assert_eq!(det.push(&frames(0.0, 9)), PhraseProgress::Waiting);
        assert_eq!(det.push(&frames(0.0, 1)), PhraseProgress::TimedOut);
        assert_eq!(det.push(&frames(0.5, 5)), PhraseProgress::TimedOut);
    }

    #[test]
    fn test_phrase_ends_on_pause() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        assert_eq!(det.push(&frames(0.5, 4)), PhraseProgress::Recording);
        assert_eq!(det.push(&frames(0.0, 1)), PhraseProgress::Recording);
        match det.push(&frames(0.0, 1)) {
            PhraseProgress::Complete(samples) => assert_eq!(samples.len(), 30 * 6),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_short_dip_does_not_end_phrase() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        det.push(&frames(0.5, 2));
        assert_eq!(det.push(&frames(0.0, 1)), PhraseProgress::Recording);
        assert_eq!(det.push(&frames(0.5, 1)), PhraseProgress::Recording);
        assert_eq!(det.push(&frames(0.0, 1)), PhraseProgress::Recording);
    }

    #[test]
    fn test_phrase_limit_caps_recording() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        match det.push(&frames(0.5, 40)) {
            PhraseProgress::Complete(samples) => assert_eq!(samples.len(), 30 * 20),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_frames_are_buffered() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.0, 3));
        assert_eq!(det.push(&[0.5; 20]), PhraseProgress::Waiting);
        assert_eq!(det.push(&[0.5; 10]), PhraseProgress::Recording);
    }

    #[test]
    fn test_finish_returns_open_phrase() {
        let mut det = PhraseDetector::new(config());
        assert!(det.finish().is_none());
        det.push(&frames(0.0, 3));
        det.push(&frames(0.5, 2));
        let samples = det.finish().unwrap();
        assert_eq!(samples.len(), 60);
    }

    #[test]
    fn test_zero_ambient_skips_calibration() {
        let mut det = PhraseDetector::new(PhraseDetectorConfig {
            ambient_duration: Duration::ZERO,
            ..config()
        });
        assert_eq!(det.push(&frames(0.5, 1)), PhraseProgress::Recording);
    }

    #[test]
    fn test_classify() {
        let det = PhraseDetector::new(config());
        assert_eq!(det.classify(&[]), VadResult::Unknown);
        assert_eq!(det.classify(&[0.5; 30]), VadResult::Speech);
        assert_eq!(det.classify(&[0.001; 30]), VadResult::Silence);
    }

    #[test]
    fn test_phrase_starts_only_on_speech_frames() {
        let mut det = PhraseDetector::new(config());
        det.push(&frames(0.1, 3));
        let threshold = det.threshold();

        // Louder than the ambient room but still under the threshold.
        let level = vec![threshold * 0.9; 30];
        assert_eq!(det.classify(&level), VadResult::Silence);
        assert_eq!(det.push(&level), PhraseProgress::Waiting);

        let loud = vec![threshold * 2.0; 30];
        assert_eq!(det.classify(&loud), VadResult::Speech);
        assert_eq!(det.push(&loud), PhraseProgress::Recording);
    }
}
