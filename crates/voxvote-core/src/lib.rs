//! VoxVote core: the session status model, the durable status channel, the ballot store
//! contract with its SQLite and in-memory implementations, spoken-input matchers and
//! configuration. Shared by the booth worker and the gateway.

pub mod ballot;
pub mod channel;
pub mod config;
pub mod error;
pub mod matcher;
pub mod status;
pub mod storage;

pub use ballot::{tally_all, BallotStore, Candidate, MemoryBallotStore, TallyEntry, VoteRecord};
pub use channel::{purge_orphans, ChannelRead, ChannelStamp, StatusChannel, StatusWriter};
pub use config::VoteConfig;
pub use error::{VoteError, VoteResult};
pub use matcher::{
    extract_candidate_number, first_integer, is_confirmation, match_voter_id,
    normalize_utterance, parse_state_coded_voter_id, yes_or_no, VoterIdScheme, VoterIdentity,
};
pub use status::{
    AbortReason, FailureKind, SessionId, SessionResult, Step, StatusEvent, VoteReceipt,
};
pub use storage::{demo_candidates, SqliteBallotStore, DEMO_VOTER_TOKEN};
