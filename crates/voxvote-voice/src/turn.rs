//! Turn detection for one listening attempt.
//!
//! Implements the "Gap Logic": speech followed by 800ms of silence commits an utterance.
//! Time is measured in samples, so the tracker is deterministic and needs no clock.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// A completed utterance: buffered PCM from speech start until the gap.
#[derive(Debug, Clone)]
pub struct AudioTurn {
    /// PCM samples (f32, -1.0..1.0) for the full turn.
    pub samples: Vec<f32>,
    /// When the turn was committed.
    pub timestamp: DateTime<Utc>,
    /// Speech duration, excluding the trailing gap.
    pub duration: Duration,
    pub sample_rate: u32,
}

/// Configuration for turn detection
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Silence duration before committing a turn (default: 800ms)
    pub silence_threshold: Duration,

    /// Minimum speech duration to be considered a valid turn (default: 200ms)
    pub min_speech_duration: Duration,

    /// Maximum turn duration before auto-commit (default: 30s)
    pub max_turn_duration: Duration,

    /// Sample rate for audio (default: 16000 Hz)
    pub sample_rate: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(800),
            min_speech_duration: Duration::from_millis(200),
            max_turn_duration: Duration::from_secs(30),
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Idle,
    Speaking,
    SilenceDetected,
}

/// Accumulates VAD-labelled chunks and yields an [`AudioTurn`] once the gap is reached.
#[derive(Debug)]
pub struct TurnTracker {
    config: TurnConfig,
    state: TurnState,
    speech_samples: usize,
    silence_samples: usize,
    buffer: Vec<f32>,
}

impl TurnTracker {
    pub fn new(config: TurnConfig) -> Self {
        Self {
            config,
            state: TurnState::Idle,
            speech_samples: 0,
            silence_samples: 0,
            buffer: Vec::new(),
        }
    }

    fn samples_for(&self, d: Duration) -> usize {
        (d.as_secs_f64() * self.config.sample_rate as f64).round() as usize
    }

    /// Feed one chunk. Returns a turn when this chunk completes one.
    pub fn push(&mut self, is_speech: bool, chunk: &[f32]) -> Option<AudioTurn> {
        match (self.state, is_speech) {
            (TurnState::Idle, false) => None,
            (TurnState::Idle, true) => {
                self.state = TurnState::Speaking;
                self.buffer.clear();
                self.buffer.extend_from_slice(chunk);
                self.speech_samples = chunk.len();
                self.check_max()
            }
            (TurnState::Speaking, true) | (TurnState::SilenceDetected, true) => {
                self.state = TurnState::Speaking;
                self.buffer.extend_from_slice(chunk);
                // a pause shorter than the gap counts as speech
                self.speech_samples += self.silence_samples + chunk.len();
                self.silence_samples = 0;
                self.check_max()
            }
            (TurnState::Speaking, false) | (TurnState::SilenceDetected, false) => {
                self.state = TurnState::SilenceDetected;
                self.buffer.extend_from_slice(chunk);
                self.silence_samples += chunk.len();
                if self.silence_samples >= self.samples_for(self.config.silence_threshold) {
                    self.commit()
                } else {
                    None
                }
            }
        }
    }

    /// Commit whatever speech is buffered (end of the listening window).
    pub fn flush(&mut self) -> Option<AudioTurn> {
        if self.state == TurnState::Idle {
            return None;
        }
        self.commit()
    }

    pub fn is_idle(&self) -> bool {
        self.state == TurnState::Idle
    }

    fn check_max(&mut self) -> Option<AudioTurn> {
        if self.speech_samples >= self.samples_for(self.config.max_turn_duration) {
            debug!("max turn duration reached, auto-committing");
            return self.commit();
        }
        None
    }

    fn commit(&mut self) -> Option<AudioTurn> {
        let duration = Duration::from_nanos(
            self.speech_samples as u64 * 1_000_000_000 / u64::from(self.config.sample_rate.max(1)),
        );
        let samples = std::mem::take(&mut self.buffer);
        self.state = TurnState::Idle;
        self.speech_samples = 0;
        self.silence_samples = 0;

        if duration < self.config.min_speech_duration {
            debug!("speech too short ({:?}), ignoring", duration);
            return None;
        }
        debug!("turn committed: {:?}, {} samples", duration, samples.len());
        Some(AudioTurn {
            samples,
            timestamp: Utc::now(),
            duration,
            sample_rate: self.config.sample_rate,
        })
    }
}
