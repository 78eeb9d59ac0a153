//! Backend selection at startup.
//!
//! Recognizers: offline Whisper (needs the `whisper` feature and a model file), online STT
//! (needs `STT_API_KEY`), both over the microphone (`device` feature). A script replaces
//! both. Synthesizer, first available wins: `VOXVOTE_TTS_COMMAND`, an OS speech command,
//! rodio playback of online TTS, silent.

use crate::error::{VoiceError, VoiceResult};
use crate::gateway::{ListenPolicy, SpeechGateway};
use crate::recognizer::ScriptedRecognizer;
use crate::speaker::SpeakerSlot;
use crate::voice_output::{CommandSynthesizer, SilentSynthesizer, Synthesizer};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Speech-related settings, read from the environment.
#[derive(Debug, Clone, Default)]
pub struct SpeechSettings {
    /// `WHISPER_MODEL_PATH`
    pub whisper_model: Option<PathBuf>,
    /// `STT_API_KEY` present
    pub online_stt: bool,
    /// `TTS_API_KEY` present
    pub online_tts: bool,
    /// `VOXVOTE_TTS_COMMAND`
    pub tts_command: Option<String>,
    /// `VOXVOTE_SCRIPT`: `|`-separated utterances replayed instead of listening.
    pub script: Option<String>,
    pub speaker_lock: Option<PathBuf>,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SpeechSettings {
    pub fn from_env() -> Self {
        Self {
            whisper_model: non_empty_env("WHISPER_MODEL_PATH").map(PathBuf::from),
            online_stt: non_empty_env("STT_API_KEY").is_some(),
            online_tts: non_empty_env("TTS_API_KEY").is_some(),
            tts_command: non_empty_env("VOXVOTE_TTS_COMMAND"),
            script: std::env::var("VOXVOTE_SCRIPT").ok(),
            speaker_lock: None,
        }
    }

    pub fn with_script(mut self, script: Option<String>) -> Self {
        if script.is_some() {
            self.script = script;
        }
        self
    }

    pub fn with_speaker_lock(mut self, path: Option<PathBuf>) -> Self {
        self.speaker_lock = path;
        self
    }
}

/// What `probe_speech` selected.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub offline: Option<String>,
    pub online: Option<String>,
    pub synthesizer: String,
    pub microphone: bool,
    pub scripted: bool,
}

/// Build the gateway from whatever backends are usable on this host.
pub fn probe_speech(settings: &SpeechSettings) -> VoiceResult<(SpeechGateway, ProbeReport)> {
    let speaker = SpeakerSlot::new(settings.speaker_lock.clone());

    if let Some(script) = &settings.script {
        let gateway = SpeechGateway::new(Box::new(SilentSynthesizer::new()))
            .with_offline(Box::new(ScriptedRecognizer::from_script(script)))
            .with_policy(ListenPolicy::single_attempt())
            .with_speaker(speaker);
        let report = report_for(&gateway, false, true);
        info!(target: "voxvote::speech", "scripted speech: {:?}", report);
        return Ok((gateway, report));
    }

    let microphone = microphone_available();
    let mut gateway = SpeechGateway::new(select_synthesizer(settings)).with_speaker(speaker);
    if microphone {
        gateway = attach_recognizers(gateway, settings);
    } else {
        warn!(target: "voxvote::speech", "no microphone available");
    }

    let report = report_for(&gateway, microphone, false);
    if !gateway.can_listen() {
        return Err(VoiceError::Unavailable(
            "no speech recognizer could be built (need a microphone plus WHISPER_MODEL_PATH or STT_API_KEY)"
                .into(),
        ));
    }
    info!(target: "voxvote::speech", "speech backends: {:?}", report);
    Ok((gateway, report))
}

/// Same selection as [`probe_speech`], for diagnostics when no gateway can be built.
pub fn describe_speech(settings: &SpeechSettings) -> ProbeReport {
    match probe_speech(settings) {
        Ok((_, report)) => report,
        Err(e) => {
            warn!(target: "voxvote::speech", "speech probe: {}", e);
            ProbeReport {
                offline: None,
                online: None,
                synthesizer: select_synthesizer(settings).name().to_string(),
                microphone: microphone_available(),
                scripted: false,
            }
        }
    }
}

fn report_for(gateway: &SpeechGateway, microphone: bool, scripted: bool) -> ProbeReport {
    ProbeReport {
        offline: gateway.offline_name().map(str::to_string),
        online: gateway.online_name().map(str::to_string),
        synthesizer: gateway.synthesizer_name().to_string(),
        microphone,
        scripted,
    }
}

fn select_synthesizer(settings: &SpeechSettings) -> Box<dyn Synthesizer> {
    if let Some(cmd) = settings
        .tts_command
        .as_deref()
        .and_then(CommandSynthesizer::from_command_line)
    {
        return Box::new(cmd);
    }
    if let Some(cmd) = CommandSynthesizer::detect() {
        return Box::new(cmd);
    }
    #[cfg(feature = "device")]
    {
        if settings.online_tts && crate::audio::PlaybackSynthesizer::available() {
            match crate::voice_output::OnlineTts::from_env() {
                Ok(tts) => return Box::new(crate::audio::PlaybackSynthesizer::new(Box::new(tts))),
                Err(e) => warn!(target: "voxvote::speech", "online TTS unavailable: {}", e),
            }
        }
    }
    Box::new(SilentSynthesizer::new())
}

#[cfg(feature = "device")]
fn microphone_available() -> bool {
    crate::audio::Microphone::available()
}

#[cfg(not(feature = "device"))]
fn microphone_available() -> bool {
    false
}

#[cfg(feature = "device")]
fn attach_recognizers(mut gateway: SpeechGateway, settings: &SpeechSettings) -> SpeechGateway {
    use crate::audio::{AudioConfig, Microphone};
    use crate::recognizer::{shared_source, RecognizerMode, TranscribingRecognizer};

    let source = shared_source(Microphone::new(AudioConfig::default()));

    #[cfg(feature = "whisper")]
    {
        if let Some(path) = settings.whisper_model.as_ref().filter(|p| p.is_file()) {
            match crate::stt::WhisperStt::new(&path.to_string_lossy()) {
                Ok(stt) => {
                    gateway = gateway.with_offline(Box::new(TranscribingRecognizer::new(
                        RecognizerMode::Offline,
                        source.clone(),
                        Box::new(stt),
                    )));
                }
                Err(e) => {
                    warn!(target: "voxvote::speech", "offline recognizer unavailable: {}", e)
                }
            }
        }
    }

    if settings.online_stt {
        match crate::stt::OnlineStt::from_env() {
            Ok(stt) => {
                gateway = gateway.with_online(Box::new(TranscribingRecognizer::new(
                    RecognizerMode::Online,
                    source,
                    Box::new(stt),
                )));
            }
            Err(e) => warn!(target: "voxvote::speech", "online recognizer unavailable: {}", e),
        }
    }
    gateway
}

#[cfg(not(feature = "device"))]
fn attach_recognizers(gateway: SpeechGateway, _settings: &SpeechSettings) -> SpeechGateway {
    gateway
}
