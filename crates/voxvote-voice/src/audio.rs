//! Microphone capture (cpal + WebRTC VAD) and speaker playback (rodio).
//!
//! Each capture opens the input stream, listens for one turn, and drops the stream before
//! returning, so the device is only held while a prompt is actually waiting for an answer.

use crate::error::{VoiceError, VoiceResult};
use crate::recognizer::UtteranceSource;
use crate::turn::{AudioTurn, TurnConfig, TurnTracker};
use crate::vad::{VadConfig, VadDetector};
use crate::voice_output::{Synthesizer, TtsBackend};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    pub turn: TurnConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            turn: TurnConfig::default(),
        }
    }
}

enum Frame {
    Samples(Vec<f32>),
    Error(String),
}

/// Default input device as an [`UtteranceSource`].
pub struct Microphone {
    config: AudioConfig,
}

impl Microphone {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    /// Whether the host has a default input device.
    pub fn available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// List available input devices
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let devices = cpal::default_host().input_devices()?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl UtteranceSource for Microphone {
    fn capture(&mut self, window: Duration) -> VoiceResult<Option<AudioTurn>> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))?;
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut vad = VadDetector::new(VadConfig {
            sample_rate: self.config.sample_rate,
            ..Default::default()
        })?;
        let chunk_size = vad.chunk_size();
        let mut turns = TurnTracker::new(TurnConfig {
            sample_rate: self.config.sample_rate,
            ..self.config.turn.clone()
        });

        let (tx, rx) = mpsc::channel::<Frame>();
        let err_tx = tx.clone();
        let mut pending = Vec::with_capacity(chunk_size);
        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    pending.push(sample);
                    if pending.len() == chunk_size {
                        let _ = tx.send(Frame::Samples(std::mem::take(&mut pending)));
                        pending.reserve(chunk_size);
                    }
                }
            },
            move |err| {
                let _ = err_tx.send(Frame::Error(err.to_string()));
            },
            None,
        )?;
        stream.play()?;
        debug!("microphone open for {:?}", window);

        let deadline = Instant::now() + window;
        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Ok(turns.flush());
            }
            match rx.recv_timeout(remaining) {
                Ok(Frame::Samples(chunk)) => {
                    let speech = vad.is_speech(&chunk)?;
                    if let Some(turn) = turns.push(speech, &chunk) {
                        break Ok(Some(turn));
                    }
                }
                Ok(Frame::Error(e)) => break Err(VoiceError::AudioStream(e)),
                Err(RecvTimeoutError::Timeout) => break Ok(turns.flush()),
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(VoiceError::AudioStream("input stream closed".into()))
                }
            }
        };
        drop(stream);
        outcome
    }
}

/// Plays synthesized audio through the default output device and waits for it to finish.
pub struct PlaybackSynthesizer {
    tts: Box<dyn TtsBackend>,
    // rodio's stream is !Send; it is opened per utterance instead of kept here
    playing: Mutex<()>,
}

impl PlaybackSynthesizer {
    pub fn new(tts: Box<dyn TtsBackend>) -> Self {
        Self {
            tts,
            playing: Mutex::new(()),
        }
    }

    /// Whether the host has a default output device.
    pub fn available() -> bool {
        cpal::default_host().default_output_device().is_some()
    }
}

impl Synthesizer for PlaybackSynthesizer {
    fn name(&self) -> &str {
        "playback"
    }

    fn render(&self, text: &str) -> VoiceResult<()> {
        let Ok(_playing) = self.playing.try_lock() else {
            return Err(VoiceError::Busy("playback in progress".into()));
        };
        let bytes = self.tts.synthesize(text)?;
        if bytes.is_empty() {
            warn!("TTS returned no audio for prompt");
            return Ok(());
        }
        let (_stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
        let source = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("Decode failed: {e}")))?;
        sink.append(source);
        sink.sleep_until_end();
        info!(target: "voxvote::speech", "spoke {} chars", text.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_config_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.turn.silence_threshold, Duration::from_millis(800));
    }

    #[test]
    #[ignore] // requires a microphone and someone speaking
    fn test_capture_one_turn() {
        let mut mic = Microphone::new(AudioConfig::default());
        let turn = mic.capture(Duration::from_secs(10)).unwrap();
        println!("captured: {:?}", turn.map(|t| t.duration));
    }
}
