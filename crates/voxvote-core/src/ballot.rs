//! Ballot store contract and the in-memory implementation used by tests and scripted runs.

use crate::error::{VoteError, VoteResult};
use crate::status::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A selectable option on the ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
}

/// One appended vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_token: String,
    pub candidate_id: i64,
    pub session_id: Option<String>,
    pub timestamp_ms: i64,
}

/// Count for one candidate in a tally listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyEntry {
    pub candidate_id: i64,
    pub count: u64,
}

/// Persistence for candidates and votes.
///
/// `list_candidates` order is presentation order and must stay stable while a session runs.
/// Votes are append-only.
pub trait BallotStore: Send + Sync {
    fn list_candidates(&self) -> VoteResult<Vec<Candidate>>;

    /// Append a vote. `session` tags the vote so a lost worker can be reconciled later.
    fn record_vote(
        &self,
        voter_token: &str,
        candidate_id: i64,
        session: Option<&SessionId>,
    ) -> VoteResult<()>;

    /// candidate id → vote count. Candidates without votes may be missing.
    fn tally(&self) -> VoteResult<BTreeMap<i64, u64>>;

    /// The vote recorded by `session`, if any.
    fn vote_for_session(&self, session: &SessionId) -> VoteResult<Option<VoteRecord>>;
}

/// Full tally including zero counts, ordered by candidate id.
pub fn tally_all(store: &dyn BallotStore) -> VoteResult<Vec<TallyEntry>> {
    let counts = store.tally()?;
    let mut ids: Vec<i64> = store.list_candidates()?.into_iter().map(|c| c.id).collect();
    ids.extend(counts.keys().copied());
    ids.sort_unstable();
    ids.dedup();
    Ok(ids
        .into_iter()
        .map(|candidate_id| TallyEntry {
            candidate_id,
            count: counts.get(&candidate_id).copied().unwrap_or(0),
        })
        .collect())
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// In-memory store. `fail_writes` makes `record_vote` fail, `fail_reads` makes
/// `list_candidates` fail.
#[derive(Debug, Default)]
pub struct MemoryBallotStore {
    candidates: Vec<Candidate>,
    votes: Mutex<Vec<VoteRecord>>,
    one_vote_per_voter: bool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryBallotStore {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    /// Store seeded with the demo candidate list.
    pub fn demo() -> Self {
        Self::new(crate::storage::demo_candidates())
    }

    pub fn with_one_vote_per_voter(mut self, on: bool) -> Self {
        self.one_vote_per_voter = on;
        self
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn votes(&self) -> Vec<VoteRecord> {
        self.votes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn lock_votes(&self) -> VoteResult<std::sync::MutexGuard<'_, Vec<VoteRecord>>> {
        self.votes
            .lock()
            .map_err(|_| VoteError::Store("vote list lock poisoned".into()))
    }
}

impl BallotStore for MemoryBallotStore {
    fn list_candidates(&self) -> VoteResult<Vec<Candidate>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(VoteError::Store("injected read failure".into()));
        }
        Ok(self.candidates.clone())
    }

    fn record_vote(
        &self,
        voter_token: &str,
        candidate_id: i64,
        session: Option<&SessionId>,
    ) -> VoteResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VoteError::Store("injected write failure".into()));
        }
        if !self.candidates.iter().any(|c| c.id == candidate_id) {
            return Err(VoteError::Store(format!("unknown candidate {candidate_id}")));
        }
        let mut votes = self.lock_votes()?;
        if self.one_vote_per_voter && votes.iter().any(|v| v.voter_token == voter_token) {
            return Err(VoteError::DuplicateVote(voter_token.to_string()));
        }
        votes.push(VoteRecord {
            voter_token: voter_token.to_string(),
            candidate_id,
            session_id: session.map(|s| s.to_string()),
            timestamp_ms: now_ms(),
        });
        Ok(())
    }

    fn tally(&self) -> VoteResult<BTreeMap<i64, u64>> {
        let votes = self.lock_votes()?;
        let mut out = BTreeMap::new();
        for v in votes.iter() {
            *out.entry(v.candidate_id).or_insert(0) += 1;
        }
        Ok(out)
    }

    fn vote_for_session(&self, session: &SessionId) -> VoteResult<Option<VoteRecord>> {
        let votes = self.lock_votes()?;
        Ok(votes
            .iter()
            .find(|v| v.session_id.as_deref() == Some(session.as_str()))
            .cloned())
    }
}
