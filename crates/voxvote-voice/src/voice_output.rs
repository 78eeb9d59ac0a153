//! Speech output: synthesizers that render a prompt to the speaker and return when done.

use crate::error::{VoiceError, VoiceResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Blocking text-to-speech. `render` returns once the utterance has been fully played.
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;
    /// Fails with [`VoiceError::Busy`] if the backend is already speaking.
    fn render(&self, text: &str) -> VoiceResult<()>;
}

/// Backend that turns text into audio bytes (WAV/MP3).
pub trait TtsBackend: Send + Sync {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// OpenAI-compatible speech API.
/// Uses `TTS_API_URL` (e.g. https://api.openai.com/v1), `TTS_API_KEY`, `TTS_MODEL`, `TTS_VOICE`.
#[derive(Debug, Clone)]
pub struct OnlineTts {
    pub base_url: String,
    pub api_key: String,
    /// tts-1 (fast) or tts-1-hd.
    pub model: String,
    pub voice: String,
    client: reqwest::blocking::Client,
}

impl OnlineTts {
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| VoiceError::Config("online TTS requires TTS_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url,
            api_key,
            model,
            voice,
            client,
        })
    }
}

impl TtsBackend for OnlineTts {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "wav",
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {status}: {body}")));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

const TEXT_PLACEHOLDER: &str = "{text}";

/// Speaks through an OS speech command, waiting for it to exit.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// `program args... <text>`. The text replaces a `{text}` placeholder in the arguments
    /// (single quotes doubled), or is appended as the last argument when there is none.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a command line such as `"espeak-ng -s 150"`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }

    /// First speech command found on `PATH`.
    pub fn detect() -> Option<Self> {
        if let Some(p) = find_on_path("espeak-ng") {
            return Some(Self::new(p, vec!["-s".into(), "150".into()]));
        }
        if let Some(p) = find_on_path("espeak") {
            return Some(Self::new(p, vec!["-s".into(), "150".into()]));
        }
        if let Some(p) = find_on_path("spd-say") {
            return Some(Self::new(p, vec!["-w".into()]));
        }
        if cfg!(target_os = "macos") {
            if let Some(p) = find_on_path("say") {
                return Some(Self::new(p, Vec::new()));
            }
        }
        if cfg!(windows) {
            if let Some(p) = find_on_path("powershell") {
                return Some(Self::new(
                    p,
                    vec![
                        "-NoProfile".into(),
                        "-Command".into(),
                        "Add-Type -AssemblyName System.Speech; (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{text}')".into(),
                    ],
                ));
            }
        }
        None
    }
}

impl Synthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        self.program
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("command")
    }

    fn render(&self, text: &str) -> VoiceResult<()> {
        let mut cmd = Command::new(&self.program);
        if self.args.iter().any(|a| a.contains(TEXT_PLACEHOLDER)) {
            let quoted = text.replace('\'', "''");
            cmd.args(self.args.iter().map(|a| a.replace(TEXT_PLACEHOLDER, &quoted)));
        } else {
            cmd.args(&self.args).arg(text);
        }
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| VoiceError::Tts(format!("{}: {e}", self.program.display())))?;
        if !status.success() {
            return Err(VoiceError::Tts(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}

/// Resolve an executable name against `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        candidates
            .iter()
            .map(|c| dir.join(c))
            .find(|p| is_executable(p))
    })
}

fn is_executable(p: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        p.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        p.is_file()
    }
}

/// Logs prompts instead of playing them; clones share one transcript of what was said.
#[derive(Debug, Clone, Default)]
pub struct SilentSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl SilentSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Synthesizer for SilentSynthesizer {
    fn name(&self) -> &str {
        "silent"
    }

    fn render(&self, text: &str) -> VoiceResult<()> {
        info!(target: "voxvote::speech", "(silent) {}", text);
        if let Ok(mut s) = self.spoken.lock() {
            s.push(text.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_synthesizer_records_prompts() {
        let synth = SilentSynthesizer::new();
        let view = synth.clone();
        synth.render("Welcome").unwrap();
        synth.render("Candidate number 1 is BJP").unwrap();
        assert_eq!(view.spoken(), vec!["Welcome", "Candidate number 1 is BJP"]);
    }

    #[test]
    fn command_line_parsing() {
        let c = CommandSynthesizer::from_command_line("espeak-ng -s 150").unwrap();
        assert_eq!(c.name(), "espeak-ng");
        assert!(CommandSynthesizer::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_synthesizer_waits_and_reports_exit_status() {
        let ok = CommandSynthesizer::new("sh", vec!["-c".into(), "exit 0".into()]);
        ok.render("hello").unwrap();
        let bad = CommandSynthesizer::new("sh", vec!["-c".into(), "exit 2".into()]);
        assert!(matches!(bad.render("hello"), Err(VoiceError::Tts(_))));
        let templated = CommandSynthesizer::new(
            "sh",
            vec!["-c".into(), "test \"$0\" = \"it''s\"".into(), "{text}".into()],
        );
        templated.render("it's").unwrap();
        let missing = CommandSynthesizer::new("/nonexistent/speaker", Vec::new());
        assert!(missing.render("hello").is_err());
    }
}
