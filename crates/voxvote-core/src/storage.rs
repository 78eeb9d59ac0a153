//! SQLite ballot store: `candidates`, `voters` and `votes` tables in one file.
//!
//! A connection is opened per call so the gateway and every worker process can share
//! the same database file.

use crate::ballot::{now_ms, BallotStore, Candidate, VoteRecord};
use crate::error::{VoteError, VoteResult};
use crate::status::SessionId;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Demo voter token accepted by the spoken "first one" scheme.
pub const DEMO_VOTER_TOKEN: &str = "FIRST1";

const DEMO_CANDIDATES: &[(i64, &str)] = &[
    (1, "BJP"),
    (2, "CONGRESS"),
    (3, "JDS"),
    (4, "AAP"),
    (5, "BSP"),
    (6, "CPI"),
    (7, "TMC"),
    (8, "JD(U)"),
    (9, "SP"),
];

pub fn demo_candidates() -> Vec<Candidate> {
    DEMO_CANDIDATES
        .iter()
        .map(|(id, name)| Candidate {
            id: *id,
            name: (*name).to_string(),
        })
        .collect()
}

/// Ballot store backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteBallotStore {
    db_path: PathBuf,
    one_vote_per_voter: bool,
}

impl SqliteBallotStore {
    /// Open or create the database, ensure the schema and seed the demo ballot.
    pub fn open(db_path: impl Into<PathBuf>) -> VoteResult<Self> {
        let this = Self {
            db_path: db_path.into(),
            one_vote_per_voter: false,
        };
        this.init()?;
        Ok(this)
    }

    pub fn with_one_vote_per_voter(mut self, on: bool) -> Self {
        self.one_vote_per_voter = on;
        self
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init(&self) -> VoteResult<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                id TEXT PRIMARY KEY,
                name TEXT
            );

            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                voter_token TEXT NOT NULL,
                candidate_id INTEGER NOT NULL,
                session_id TEXT NULL,
                ts INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_votes_session_id ON votes(session_id);
            CREATE INDEX IF NOT EXISTS idx_votes_voter_token ON votes(voter_token);
            "#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO voters (id, name) VALUES (?1, 'Demo Voter')",
            params![DEMO_VOTER_TOKEN],
        )?;
        for (id, name) in DEMO_CANDIDATES {
            conn.execute(
                "INSERT INTO candidates (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![id, name],
            )?;
        }
        Ok(())
    }
}

impl BallotStore for SqliteBallotStore {
    fn list_candidates(&self) -> VoteResult<Vec<Candidate>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, name FROM candidates ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Candidate {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn record_vote(
        &self,
        voter_token: &str,
        candidate_id: i64,
        session: Option<&SessionId>,
    ) -> VoteResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let known: Option<i64> = tx
            .query_row(
                "SELECT id FROM candidates WHERE id = ?1",
                params![candidate_id],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(VoteError::Store(format!("unknown candidate {candidate_id}")));
        }
        if self.one_vote_per_voter {
            let prior: i64 = tx.query_row(
                "SELECT COUNT(*) FROM votes WHERE voter_token = ?1",
                params![voter_token],
                |row| row.get(0),
            )?;
            if prior > 0 {
                return Err(VoteError::DuplicateVote(voter_token.to_string()));
            }
        }
        tx.execute(
            "INSERT INTO votes (voter_token, candidate_id, session_id, ts) VALUES (?1, ?2, ?3, ?4)",
            params![
                voter_token,
                candidate_id,
                session.map(|s| s.as_str()),
                now_ms()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn tally(&self) -> VoteResult<BTreeMap<i64, u64>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT candidate_id, COUNT(*) FROM votes GROUP BY candidate_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut out = BTreeMap::new();
        for r in rows {
            let (id, count) = r?;
            out.insert(id, count.max(0) as u64);
        }
        Ok(out)
    }

    fn vote_for_session(&self, session: &SessionId) -> VoteResult<Option<VoteRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                "SELECT voter_token, candidate_id, session_id, ts FROM votes
                 WHERE session_id = ?1 ORDER BY id LIMIT 1",
                params![session.as_str()],
                |row| {
                    Ok(VoteRecord {
                        voter_token: row.get(0)?,
                        candidate_id: row.get(1)?,
                        session_id: row.get(2)?,
                        timestamp_ms: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
