//! # VoxVote Voice - the speech gateway
//!
//! Everything the booth needs to hear and speak, behind one owned [`SpeechGateway`]:
//!
//! ```text
//! ┌──────────────────────────── SpeechGateway ─────────────────────────────┐
//! │  recognize_utterance(budget)              speak(text)                  │
//! │   ├─ offline: Microphone → VAD/Turn → Whisper     SpeakerSlot (mutex   │
//! │   └─ online:  Microphone → VAD/Turn → STT API      + optional file lock)│
//! │                                                   └─ Synthesizer       │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hardware code (cpal, rodio, WebRTC VAD) is behind the `device` feature and local Whisper
//! behind `whisper`; without them the gateway still works with scripted recognition.

#[cfg(feature = "device")]
pub mod audio;
pub mod error;
pub mod gateway;
pub mod probe;
pub mod recognizer;
pub mod speaker;
pub mod stt;
pub mod turn;
#[cfg(feature = "device")]
pub mod vad;
pub mod voice_output;

#[cfg(feature = "device")]
pub use audio::{AudioConfig, Microphone, PlaybackSynthesizer};
pub use error::{VoiceError, VoiceResult};
pub use gateway::{ListenPolicy, SpeechGateway};
pub use probe::{describe_speech, probe_speech, ProbeReport, SpeechSettings};
pub use recognizer::{
    shared_source, Recognizer, RecognizerMode, ScriptEntry, ScriptedRecognizer, SharedSource,
    TranscribingRecognizer, UtteranceSource,
};
pub use speaker::{SpeakerGuard, SpeakerSlot};
pub use stt::{pcm_f32_to_wav, OnlineStt, SttBackend};
#[cfg(feature = "whisper")]
pub use stt::WhisperStt;
pub use turn::{AudioTurn, TurnConfig, TurnTracker};
#[cfg(feature = "device")]
pub use vad::{VadConfig, VadDetector};
pub use voice_output::{
    find_on_path, CommandSynthesizer, OnlineTts, SilentSynthesizer, Synthesizer, TtsBackend,
};
