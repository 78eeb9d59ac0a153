//! **SpeechGateway**: one owned entry point for listening and speaking.
//!
//! Recognition prefers the offline recognizer and falls back to the online one. Both
//! phases run short attempts against a single wall-clock deadline, so one long attempt
//! cannot use up the budget meant for retries. When both are attached the offline phase
//! stops at half the budget, leaving the rest to the online phase. Speaking holds the [`SpeakerSlot`] for the
//! whole utterance.

use crate::error::{VoiceError, VoiceResult};
use crate::recognizer::Recognizer;
use crate::speaker::SpeakerSlot;
use crate::voice_output::Synthesizer;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use voxvote_core::normalize_utterance;

/// Attempt caps and per-attempt windows for each recognition phase.
#[derive(Debug, Clone)]
pub struct ListenPolicy {
    pub offline_attempts: u32,
    pub offline_window: Duration,
    pub online_attempts: u32,
    pub online_window: Duration,
}

impl Default for ListenPolicy {
    fn default() -> Self {
        Self {
            offline_attempts: 2,
            offline_window: Duration::from_secs(8),
            online_attempts: 4,
            online_window: Duration::from_secs(4),
        }
    }
}

impl ListenPolicy {
    /// One attempt per call, for recognizers that replay a transcript.
    pub fn single_attempt() -> Self {
        Self {
            offline_attempts: 1,
            offline_window: Duration::from_secs(1),
            online_attempts: 1,
            online_window: Duration::from_secs(1),
        }
    }
}

/// With an online recognizer attached, the offline phase may use at most this share of
/// the budget.
const OFFLINE_SHARE: f64 = 0.5;

/// Busy synthesizers get one retry after this pause.
const BUSY_BACKOFF: Duration = Duration::from_millis(250);

pub struct SpeechGateway {
    offline: Option<Box<dyn Recognizer>>,
    online: Option<Box<dyn Recognizer>>,
    synthesizer: Box<dyn Synthesizer>,
    speaker: SpeakerSlot,
    policy: ListenPolicy,
}

impl SpeechGateway {
    pub fn new(synthesizer: Box<dyn Synthesizer>) -> Self {
        Self {
            offline: None,
            online: None,
            synthesizer,
            speaker: SpeakerSlot::default(),
            policy: ListenPolicy::default(),
        }
    }

    pub fn with_offline(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.offline = Some(recognizer);
        self
    }

    pub fn with_online(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.online = Some(recognizer);
        self
    }

    pub fn with_policy(mut self, policy: ListenPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_speaker(mut self, speaker: SpeakerSlot) -> Self {
        self.speaker = speaker;
        self
    }

    pub fn offline_name(&self) -> Option<&str> {
        self.offline.as_deref().map(|r| r.name())
    }

    pub fn online_name(&self) -> Option<&str> {
        self.online.as_deref().map(|r| r.name())
    }

    pub fn synthesizer_name(&self) -> &str {
        self.synthesizer.name()
    }

    pub fn can_listen(&self) -> bool {
        self.offline.is_some() || self.online.is_some()
    }

    /// Listen until text is recognized or `budget` is spent.
    ///
    /// Returns normalized text, or `None` when nothing usable was heard. Only device
    /// faults are returned as errors; a failing backend just ends its phase.
    pub fn recognize_utterance(&mut self, budget: Duration) -> VoiceResult<Option<String>> {
        let started = Instant::now();
        let deadline = started + budget;
        let policy = self.policy.clone();
        let offline_deadline = if self.online.is_some() {
            started + budget.mul_f64(OFFLINE_SHARE)
        } else {
            deadline
        };

        if let Some(offline) = self.offline.as_deref_mut() {
            if let Some(text) = listen_phase(
                offline,
                policy.offline_attempts,
                policy.offline_window,
                offline_deadline,
            )? {
                return Ok(Some(text));
            }
        }
        if let Some(online) = self.online.as_deref_mut() {
            if let Some(text) =
                listen_phase(online, policy.online_attempts, policy.online_window, deadline)?
            {
                return Ok(Some(text));
            }
        }
        debug!(target: "voxvote::speech", "no utterance within {:?}", budget);
        Ok(None)
    }

    /// Speak `text` and return once it has been rendered.
    pub fn speak(&self, text: &str) -> VoiceResult<()> {
        match self.speak_once(text) {
            Err(VoiceError::Busy(reason)) => {
                debug!(target: "voxvote::speech", "speaker busy ({}), retrying once", reason);
                std::thread::sleep(BUSY_BACKOFF);
                self.speak_once(text)
            }
            other => other,
        }
    }

    fn speak_once(&self, text: &str) -> VoiceResult<()> {
        let _slot = self.speaker.acquire()?;
        self.synthesizer.render(text)
    }
}

fn listen_phase(
    recognizer: &mut dyn Recognizer,
    attempts: u32,
    window: Duration,
    deadline: Instant,
) -> VoiceResult<Option<String>> {
    for attempt in 1..=attempts {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match recognizer.listen_once(window.min(remaining)) {
            Ok(Some(raw)) => {
                let text = normalize_utterance(&raw);
                if !text.is_empty() {
                    info!(
                        target: "voxvote::speech",
                        backend = recognizer.name(),
                        attempt,
                        "heard: {}",
                        text
                    );
                    return Ok(Some(text));
                }
            }
            Ok(None) => {
                debug!(backend = recognizer.name(), attempt, "nothing heard");
            }
            Err(e) if e.is_device_failure() => return Err(e),
            Err(e) => {
                warn!(
                    target: "voxvote::speech",
                    backend = recognizer.name(),
                    "recognizer failed, skipping: {}",
                    e
                );
                break;
            }
        }
    }
    Ok(None)
}
