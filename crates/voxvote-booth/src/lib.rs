//! # VoxVote Booth
//!
//! The per-session voting worker. The gateway launches one `voxvote-booth` process per
//! session so a hang or crash in audio code stays inside that process; progress reaches
//! the gateway only through the session's status file.

pub mod booth;
pub mod cli;
pub mod worker;

pub use booth::{record_failure, run_booth};
pub use cli::{BoothArgs, USAGE};
pub use worker::{BoothPolicy, VotingWorker};
