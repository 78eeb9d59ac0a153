//! Runtime configuration shared by the gateway and the booth worker.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | bind_addr | 127.0.0.1:5000 | HTTP listen address. |
//! | data_dir | ./data | Root for the database, status files and logs. |
//! | status_dir | `<data_dir>/status` | Where `status_<id>.json` channel files live. |
//! | log_dir | `<data_dir>/logs` | Per-worker log files. |
//! | db_path | `<data_dir>/votes.sqlite` | Ballot store. |
//! | worker_bin | `voxvote-booth` next to the gateway | Worker executable. |
//! | max_sessions | 8 | Live sessions admitted at once. |
//! | stale_after_secs | 300 | Unpolled, non-terminal sessions older than this are reaped. |
//! | retain_terminal_secs | 120 | Finished sessions stay pollable this long. |
//! | reap_interval_secs | 15 | Reaper tick. |
//! | attempts_per_step | 3 | Listening attempts per booth step. |
//! | listen_budget_secs | 15 | Wall-clock budget per listening attempt. |
//! | voter_id_scheme | demo_token | `demo_token` or `state_coded`. |
//! | one_vote_per_voter | false | Reject a second vote from the same voter. |
//! | speaker_lock_path | unset | Cross-process speaker lock file. |
//!
//! Sources, lowest precedence first: defaults, the TOML file named by `VOXVOTE_CONFIG`
//! (default `config/voxvote.toml`, optional), then `VOXVOTE__<KEY>` environment variables.

use crate::error::VoteResult;
use crate::matcher::VoterIdScheme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "config/voxvote.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub status_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub worker_bin: Option<PathBuf>,
    pub max_sessions: usize,
    pub stale_after_secs: u64,
    pub retain_terminal_secs: u64,
    pub reap_interval_secs: u64,
    pub attempts_per_step: u32,
    pub listen_budget_secs: u64,
    #[serde(default)]
    pub voter_id_scheme: VoterIdScheme,
    #[serde(default)]
    pub one_vote_per_voter: bool,
    #[serde(default)]
    pub speaker_lock_path: Option<PathBuf>,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            data_dir: PathBuf::from("./data"),
            status_dir: None,
            log_dir: None,
            db_path: None,
            worker_bin: None,
            max_sessions: 8,
            stale_after_secs: 300,
            retain_terminal_secs: 120,
            reap_interval_secs: 15,
            attempts_per_step: 3,
            listen_budget_secs: 15,
            voter_id_scheme: VoterIdScheme::DemoToken,
            one_vote_per_voter: false,
            speaker_lock_path: None,
        }
    }
}

impl VoteConfig {
    /// Load from defaults, the optional config file, then the environment.
    pub fn load() -> VoteResult<Self> {
        let path = std::env::var("VOXVOTE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> VoteResult<Self> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("bind_addr", d.bind_addr)?
            .set_default("data_dir", d.data_dir.to_string_lossy().into_owned())?
            .set_default("max_sessions", d.max_sessions as i64)?
            .set_default("stale_after_secs", d.stale_after_secs as i64)?
            .set_default("retain_terminal_secs", d.retain_terminal_secs as i64)?
            .set_default("reap_interval_secs", d.reap_interval_secs as i64)?
            .set_default("attempts_per_step", d.attempts_per_step as i64)?
            .set_default("listen_budget_secs", d.listen_budget_secs as i64)?
            .set_default("voter_id_scheme", "demo_token")?
            .set_default("one_vote_per_voter", false)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("VOXVOTE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        tracing::debug!(target: "voxvote::config", path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    pub fn status_dir(&self) -> PathBuf {
        self.status_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("status"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("votes.sqlite"))
    }

    /// Worker executable: configured path, else `voxvote-booth` beside the current binary.
    pub fn worker_bin(&self) -> PathBuf {
        if let Some(p) = &self.worker_bin {
            return p.clone();
        }
        let name = format!("voxvote-booth{}", std::env::consts::EXE_SUFFIX);
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn retain_terminal(&self) -> Duration {
        Duration::from_secs(self.retain_terminal_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }

    pub fn listen_budget(&self) -> Duration {
        Duration::from_secs(self.listen_budget_secs.max(1))
    }
}
