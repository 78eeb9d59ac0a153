//! File-backed status channel: one JSON record per session, replaced atomically.
//!
//! The worker is the only writer. Each write goes to a temp file in the same directory,
//! is fsynced, then renamed over `status_<id>.json`, so a reader sees either the previous
//! record or the new one. The file outlives the writer process.

use crate::error::{VoteError, VoteResult};
use crate::status::{SessionId, StatusEvent, Step};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const FILE_PREFIX: &str = "status_";
const FILE_SUFFIX: &str = ".json";

/// Cheap identity of one version of the channel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStamp {
    len: u64,
    modified: Option<SystemTime>,
    inode: u64,
}

impl ChannelStamp {
    fn of(meta: &fs::Metadata) -> Self {
        #[cfg(unix)]
        let inode = {
            use std::os::unix::fs::MetadataExt;
            meta.ino()
        };
        #[cfg(not(unix))]
        let inode = 0;
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            inode,
        }
    }
}

/// Outcome of a change-aware read.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelRead {
    /// Nothing written yet (or the file was removed).
    Absent,
    /// Same file version as the stamp passed in.
    Unchanged,
    Updated(StatusEvent, ChannelStamp),
}

/// Durable single-record channel for one session.
#[derive(Debug, Clone)]
pub struct StatusChannel {
    path: PathBuf,
}

impl StatusChannel {
    /// Channel at `<dir>/status_<id>.json`.
    pub fn for_session(dir: &Path, id: &SessionId) -> Self {
        Self {
            path: dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}")),
        }
    }

    /// Channel at an explicit path (used by the worker executable).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored event.
    pub fn write(&self, event: &StatusEvent) -> VoteResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("status");
        let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));
        let body = serde_json::to_vec(event)?;

        let result = (|| -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&body)?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        Ok(())
    }

    /// Current event, or `None` if the worker has not written yet.
    pub fn read(&self) -> VoteResult<Option<StatusEvent>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read only if the file changed since `known`.
    pub fn read_if_changed(&self, known: Option<&ChannelStamp>) -> VoteResult<ChannelRead> {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ChannelRead::Absent),
            Err(e) => return Err(e.into()),
        };
        let stamp = ChannelStamp::of(&meta);
        if known == Some(&stamp) {
            return Ok(ChannelRead::Unchanged);
        }
        match self.read()? {
            Some(event) => Ok(ChannelRead::Updated(event, stamp)),
            None => Ok(ChannelRead::Absent),
        }
    }

    /// Delete the channel file. Missing files are fine.
    pub fn remove(&self) -> VoteResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Remove leftover channel files (and stray temp files) from a previous run.
/// Returns how many were deleted.
pub fn purge_orphans(dir: &Path) -> VoteResult<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let is_channel = name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX);
        let is_temp = name.starts_with(&format!(".{FILE_PREFIX}")) && name.ends_with(".tmp");
        if (is_channel || is_temp) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Worker-side writer that keeps the step sequence monotonic.
///
/// Steps may repeat (retry prompts) but never move backwards, and nothing is written
/// after a terminal event.
#[derive(Debug)]
pub struct StatusWriter {
    channel: StatusChannel,
    last: Option<Step>,
}

impl StatusWriter {
    pub fn new(channel: StatusChannel) -> Self {
        Self {
            channel,
            last: None,
        }
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.channel
    }

    pub fn last_step(&self) -> Option<Step> {
        self.last
    }

    pub fn is_terminal(&self) -> bool {
        self.last.is_some_and(Step::is_terminal)
    }

    pub fn publish(&mut self, event: StatusEvent) -> VoteResult<()> {
        if let Some(last) = self.last {
            if last.is_terminal() {
                return Err(VoteError::AlreadyTerminal(format!("{last:?}")));
            }
            if event.step.rank() < last.rank() {
                return Err(VoteError::Channel(format!(
                    "step regression {last:?} -> {:?}",
                    event.step
                )));
            }
        }
        self.channel.write(&event)?;
        tracing::debug!(
            target: "voxvote::channel",
            step = ?event.step,
            message = %event.message,
            "status published"
        );
        self.last = Some(event.step);
        Ok(())
    }
}
