//! Command line of the `voxvote-booth` executable.

use std::path::PathBuf;
use voxvote_core::{SessionId, VoteError, VoteResult};

pub const USAGE: &str = "\
voxvote-booth: one spoken voting session

  --session <id>          Session id assigned by the gateway
  --status-file <path>    Where progress events are written
  --db <path>             Ballot database (default: from configuration)
  --script \"a|b|c\"        Replay these utterances instead of listening";

#[derive(Debug, Clone, PartialEq)]
pub struct BoothArgs {
    pub session: SessionId,
    pub status_file: PathBuf,
    pub db: Option<PathBuf>,
    pub script: Option<String>,
}

impl BoothArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> VoteResult<Self> {
        let mut session = None;
        let mut status_file = None;
        let mut db = None;
        let mut script = None;

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| VoteError::Config(format!("{flag} needs a value")))
            };
            match flag.as_str() {
                "--session" => {
                    let raw = value()?;
                    session = Some(SessionId::parse(&raw).ok_or_else(|| {
                        VoteError::Config(format!("invalid session id: {raw}"))
                    })?);
                }
                "--status-file" => status_file = Some(PathBuf::from(value()?)),
                "--db" => db = Some(PathBuf::from(value()?)),
                "--script" => script = Some(value()?),
                other => return Err(VoteError::Config(format!("unknown argument: {other}"))),
            }
        }

        Ok(Self {
            session: session.ok_or_else(|| VoteError::Config("--session is required".into()))?,
            status_file: status_file
                .ok_or_else(|| VoteError::Config("--status-file is required".into()))?,
            db,
            script,
        })
    }
}
