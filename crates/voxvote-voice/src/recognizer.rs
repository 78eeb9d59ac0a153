//! Recognizers: one bounded listening attempt that yields text or nothing.

use crate::error::{VoiceError, VoiceResult};
use crate::stt::SttBackend;
use crate::turn::AudioTurn;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Whether a recognizer keeps audio on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerMode {
    Offline,
    Online,
}

/// One listening attempt bounded by `window`.
///
/// `Ok(None)` means nothing was heard. Errors are reserved for backend or device faults.
pub trait Recognizer: Send {
    fn name(&self) -> &str;
    fn mode(&self) -> RecognizerMode;
    fn listen_once(&mut self, window: Duration) -> VoiceResult<Option<String>>;
}

/// Something that captures a single utterance as PCM (a microphone, or a fake in tests).
pub trait UtteranceSource: Send {
    fn capture(&mut self, window: Duration) -> VoiceResult<Option<AudioTurn>>;
}

/// Capture source shared by the offline and online recognizers of one gateway.
pub type SharedSource = Arc<Mutex<Box<dyn UtteranceSource>>>;

pub fn shared_source(source: impl UtteranceSource + 'static) -> SharedSource {
    Arc::new(Mutex::new(Box::new(source)))
}

/// Captures from a shared source and transcribes with an STT backend.
pub struct TranscribingRecognizer {
    name: String,
    mode: RecognizerMode,
    source: SharedSource,
    stt: Box<dyn SttBackend>,
}

impl TranscribingRecognizer {
    pub fn new(mode: RecognizerMode, source: SharedSource, stt: Box<dyn SttBackend>) -> Self {
        Self {
            name: stt.name().to_string(),
            mode,
            source,
            stt,
        }
    }
}

impl Recognizer for TranscribingRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> RecognizerMode {
        self.mode
    }

    fn listen_once(&mut self, window: Duration) -> VoiceResult<Option<String>> {
        let turn = {
            let mut source = self
                .source
                .lock()
                .map_err(|_| VoiceError::AudioDevice("capture source lock poisoned".into()))?;
            source.capture(window)?
        };
        let Some(turn) = turn else {
            return Ok(None);
        };
        debug!(
            backend = %self.name,
            duration_ms = turn.duration.as_millis() as u64,
            "transcribing turn"
        );
        let text = self.stt.transcribe_turn(&turn)?;
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

/// One entry of a pre-recorded transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEntry {
    Say(String),
    Silence,
    DeviceError(String),
}

/// Replays a fixed transcript, one entry per listening attempt. An exhausted script is silence.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecognizer {
    entries: VecDeque<ScriptEntry>,
}

impl ScriptedRecognizer {
    pub fn new(entries: impl IntoIterator<Item = ScriptEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Parse `"first one|2|confirm"`. An empty item or `<silence>` is a missed attempt,
    /// `<device-error>` simulates a hardware fault.
    pub fn from_script(script: &str) -> Self {
        Self::new(script.split('|').map(|item| match item.trim() {
            "" | "<silence>" => ScriptEntry::Silence,
            "<device-error>" => ScriptEntry::DeviceError("scripted device failure".into()),
            said => ScriptEntry::Say(said.to_string()),
        }))
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn mode(&self) -> RecognizerMode {
        RecognizerMode::Offline
    }

    fn listen_once(&mut self, _window: Duration) -> VoiceResult<Option<String>> {
        match self.entries.pop_front() {
            Some(ScriptEntry::Say(text)) => Ok(Some(text)),
            Some(ScriptEntry::Silence) | None => Ok(None),
            Some(ScriptEntry::DeviceError(msg)) => Err(VoiceError::AudioDevice(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FixedSource(Option<usize>);

    impl UtteranceSource for FixedSource {
        fn capture(&mut self, _window: Duration) -> VoiceResult<Option<AudioTurn>> {
            Ok(self.0.map(|n| AudioTurn {
                samples: vec![0.1; n],
                timestamp: Utc::now(),
                duration: Duration::from_millis(300),
                sample_rate: 16000,
            }))
        }
    }

    struct EchoLen;

    impl SttBackend for EchoLen {
        fn name(&self) -> &str {
            "echo-len"
        }

        fn transcribe_turn(&self, turn: &AudioTurn) -> VoiceResult<String> {
            Ok(if turn.samples.len() > 1 {
                format!("{} samples", turn.samples.len())
            } else {
                "  ".to_string()
            })
        }
    }

    #[test]
    fn transcribing_recognizer_passes_text_through() {
        let mut r = TranscribingRecognizer::new(
            RecognizerMode::Online,
            shared_source(FixedSource(Some(480))),
            Box::new(EchoLen),
        );
        assert_eq!(r.name(), "echo-len");
        assert_eq!(
            r.listen_once(Duration::from_secs(1)).unwrap().as_deref(),
            Some("480 samples")
        );
    }

    #[test]
    fn blank_transcripts_and_silence_are_none() {
        let mut blank = TranscribingRecognizer::new(
            RecognizerMode::Offline,
            shared_source(FixedSource(Some(1))),
            Box::new(EchoLen),
        );
        assert_eq!(blank.listen_once(Duration::from_secs(1)).unwrap(), None);

        let mut quiet = TranscribingRecognizer::new(
            RecognizerMode::Offline,
            shared_source(FixedSource(None)),
            Box::new(EchoLen),
        );
        assert_eq!(quiet.listen_once(Duration::from_secs(1)).unwrap(), None);
    }

    #[test]
    fn script_parsing() {
        let mut r = ScriptedRecognizer::from_script("first one||<device-error>|2");
        assert_eq!(r.remaining(), 4);
        let w = Duration::from_secs(1);
        assert_eq!(r.listen_once(w).unwrap().as_deref(), Some("first one"));
        assert_eq!(r.listen_once(w).unwrap(), None);
        assert!(r.listen_once(w).unwrap_err().is_device_failure());
        assert_eq!(r.listen_once(w).unwrap().as_deref(), Some("2"));
        assert_eq!(r.listen_once(w).unwrap(), None);
    }
}
