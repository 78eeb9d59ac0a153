//! Session progress model: the record a worker publishes and a poller reads back.
//!
//! The persisted shape is exactly `{step, message, result}`. `step` values written by a
//! newer worker that this build does not know deserialize as [`Step::Unknown`] and are
//! treated as non-terminal.

use crate::error::VoteError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session token. Generated once per start request and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accepts only ids that are safe to embed in a file name (ASCII alphanumerics and `-`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.len() > 64
            || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session is in the identify → choose → confirm flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "AwaitingVoterID")]
    AwaitingVoterId,
    AwaitingCandidate,
    AwaitingConfirmation,
    Completed,
    Cancelled,
    Failed,
    /// A step name written by a newer worker.
    #[serde(other)]
    Unknown,
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Completed | Step::Cancelled | Step::Failed)
    }

    /// Position in the flow. Steps never move to a lower rank within one session.
    pub fn rank(self) -> u8 {
        match self {
            Step::AwaitingVoterId | Step::Unknown => 0,
            Step::AwaitingCandidate => 1,
            Step::AwaitingConfirmation => 2,
            Step::Completed | Step::Cancelled | Step::Failed => 3,
        }
    }
}

/// Why a session ended without a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RecognitionTimeout,
    ValidationRejected,
    DeviceFailure,
    WorkerLost,
    StoreFailure,
    DuplicateVote,
    UserCancelled,
    Internal,
}

/// The vote a `Completed` session recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub voter_id: String,
    pub candidate_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
}

/// Reason attached to a `Cancelled` or `Failed` session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome payload of a terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionResult {
    Vote(VoteReceipt),
    Aborted(AbortReason),
}

/// Latest known progress or outcome for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub step: Step,
    pub message: String,
    #[serde(default)]
    pub result: Option<SessionResult>,
}

impl StatusEvent {
    pub fn progress(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            result: None,
        }
    }

    /// Placeholder reported before the worker has written anything.
    pub fn starting() -> Self {
        Self::progress(Step::AwaitingVoterId, "starting")
    }

    pub fn completed(receipt: VoteReceipt, message: impl Into<String>) -> Self {
        Self {
            step: Step::Completed,
            message: message.into(),
            result: Some(SessionResult::Vote(receipt)),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            step: Step::Cancelled,
            message: reason.clone(),
            result: Some(SessionResult::Aborted(AbortReason {
                kind: FailureKind::UserCancelled,
                reason,
            })),
        }
    }

    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            step: Step::Failed,
            message: reason.clone(),
            result: Some(SessionResult::Aborted(AbortReason { kind, reason })),
        }
    }

    /// `Failed` event classified by the error that ended the session.
    pub fn failed_with(err: &VoteError) -> Self {
        Self::failed(err.failure_kind(), err.to_string())
    }

    pub fn is_terminal(&self) -> bool {
        self.step.is_terminal()
    }

    /// Recorded vote, if this is a `Completed` event.
    pub fn receipt(&self) -> Option<&VoteReceipt> {
        match &self.result {
            Some(SessionResult::Vote(r)) => Some(r),
            _ => None,
        }
    }

    /// Failure classification, if this event carries one.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.result {
            Some(SessionResult::Aborted(a)) => Some(a.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_event_wire_shape() {
        let ev = StatusEvent::completed(
            VoteReceipt {
                voter_id: "FIRST1".into(),
                candidate_id: 2,
                candidate_name: None,
            },
            "Vote recorded",
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["step"], "Completed");
        assert_eq!(json["result"]["voterId"], "FIRST1");
        assert_eq!(json["result"]["candidateId"], 2);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn voter_id_step_keeps_its_published_name() {
        let json = serde_json::to_string(&StatusEvent::starting()).unwrap();
        assert!(json.contains("\"AwaitingVoterID\""));
        assert!(json.contains("\"result\":null"));
    }

    #[test]
    fn unknown_step_is_not_terminal() {
        let ev: StatusEvent =
            serde_json::from_str(r#"{"step":"AwaitingFingerprint","message":"x","result":null}"#)
                .unwrap();
        assert_eq!(ev.step, Step::Unknown);
        assert!(!ev.is_terminal());
    }

    #[test]
    fn aborted_result_round_trips_through_untagged_enum() {
        let ev = StatusEvent::failed(FailureKind::WorkerLost, "worker exited unexpectedly");
        let back: StatusEvent = serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(back.failure_kind(), Some(FailureKind::WorkerLost));
        assert!(back.receipt().is_none());
    }

    #[test]
    fn session_id_rejects_path_characters() {
        assert!(SessionId::parse("../etc/passwd").is_none());
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("a b").is_none());
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn terminal_steps_share_the_top_rank() {
        assert!(Step::AwaitingVoterId.rank() < Step::AwaitingCandidate.rank());
        assert!(Step::AwaitingCandidate.rank() < Step::AwaitingConfirmation.rank());
        assert_eq!(Step::Completed.rank(), Step::Failed.rank());
        assert!(Step::Cancelled.is_terminal());
        assert!(!Step::Unknown.is_terminal());
    }
}
