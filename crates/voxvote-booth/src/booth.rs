//! Wires configuration, ballot store and speech backends into a [`VotingWorker`].

use crate::cli::BoothArgs;
use crate::worker::{BoothPolicy, VotingWorker};
use std::sync::Arc;
use tracing::{error, info, warn};
use voxvote_core::{
    BallotStore, FailureKind, SessionId, SqliteBallotStore, StatusChannel, StatusEvent,
    StatusWriter, VoteConfig, VoteResult,
};
use voxvote_voice::{probe_speech, SpeechGateway, SpeechSettings};

/// Run one session end to end and return its terminal event.
///
/// The first `AwaitingVoterID` event is written before the store or any audio device is
/// touched. Start-up failures become a `Failed` event rather than an error; only a status
/// write that cannot be made is returned as `Err`.
pub fn run_booth(args: &BoothArgs, config: &VoteConfig) -> VoteResult<StatusEvent> {
    let mut status = StatusWriter::new(StatusChannel::at(&args.status_file));
    status.publish(StatusEvent::starting())?;

    let (store, speech) = match prepare(args, config) {
        Ok(parts) => parts,
        Err(e) => {
            error!(target: "voxvote::booth", session = %args.session, "start-up failed: {}", e);
            let event = StatusEvent::failed(e.failure_kind(), format!("booth start-up failed: {e}"));
            status.publish(event.clone())?;
            return Ok(event);
        }
    };

    VotingWorker::new(args.session.clone(), speech, store, status)
        .with_policy(BoothPolicy::from_config(config))
        .with_scheme(config.voter_id_scheme)
        .run()
}

fn prepare(
    args: &BoothArgs,
    config: &VoteConfig,
) -> VoteResult<(Arc<dyn BallotStore>, SpeechGateway)> {
    let db_path = args.db.clone().unwrap_or_else(|| config.db_path());
    let store = SqliteBallotStore::open(db_path)?.with_one_vote_per_voter(config.one_vote_per_voter);

    let settings = SpeechSettings::from_env()
        .with_script(args.script.clone())
        .with_speaker_lock(config.speaker_lock_path.clone());
    let (speech, report) = probe_speech(&settings)?;
    info!(
        target: "voxvote::booth",
        session = %args.session,
        offline = ?report.offline,
        online = ?report.online,
        synthesizer = %report.synthesizer,
        "speech ready"
    );
    Ok((Arc::new(store), speech))
}

/// Leave a `Failed` event behind after an unhandled error.
///
/// Nothing is written when the channel already holds a terminal event, or when the store
/// already has this session's vote: the gateway then reports `Completed` from the store.
/// Returns whether the event was written.
pub fn record_failure(
    channel: &StatusChannel,
    session: &SessionId,
    store: Option<&dyn BallotStore>,
    reason: &str,
) -> VoteResult<bool> {
    if let Ok(Some(existing)) = channel.read() {
        if existing.is_terminal() {
            return Ok(false);
        }
    }
    if let Some(store) = store {
        match store.vote_for_session(session) {
            Ok(Some(vote)) => {
                warn!(
                    target: "voxvote::booth",
                    session = %session,
                    candidate_id = vote.candidate_id,
                    "vote already recorded; leaving status for reconciliation"
                );
                return Ok(false);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "voxvote::booth", session = %session, "vote lookup failed: {}", e)
            }
        }
    }
    channel.write(&StatusEvent::failed(
        FailureKind::Internal,
        format!("booth failed: {reason}"),
    ))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxvote_core::{MemoryBallotStore, Step};

    fn channel() -> (tempfile::TempDir, SessionId, StatusChannel) {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::generate();
        let channel = StatusChannel::for_session(dir.path(), &session);
        (dir, session, channel)
    }

    #[test]
    fn failure_is_written_over_progress() {
        let (_dir, session, channel) = channel();
        channel
            .write(&StatusEvent::progress(Step::AwaitingCandidate, "listening"))
            .unwrap();
        let store = MemoryBallotStore::demo();

        let store: &dyn BallotStore = &store;
        assert!(record_failure(&channel, &session, Some(store), "boom").unwrap());
        let event = channel.read().unwrap().unwrap();
        assert_eq!(event.step, Step::Failed);
        assert_eq!(event.failure_kind(), Some(FailureKind::Internal));
    }

    #[test]
    fn recorded_vote_is_not_overwritten_with_failure() {
        let (_dir, session, channel) = channel();
        let confirming = StatusEvent::progress(Step::AwaitingConfirmation, "listening");
        channel.write(&confirming).unwrap();
        let store = MemoryBallotStore::demo();
        store.record_vote("FIRST1", 2, Some(&session)).unwrap();

        let store: &dyn BallotStore = &store;
        assert!(!record_failure(&channel, &session, Some(store), "status write failed").unwrap());
        assert_eq!(channel.read().unwrap(), Some(confirming));
    }

    #[test]
    fn terminal_event_is_kept() {
        let (_dir, session, channel) = channel();
        let cancelled = StatusEvent::cancelled("Vote cancelled");
        channel.write(&cancelled).unwrap();

        assert!(!record_failure(&channel, &session, None, "late error").unwrap());
        assert_eq!(channel.read().unwrap(), Some(cancelled));
    }
}
