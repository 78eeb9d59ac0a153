//! Launching booth workers as isolated processes.
//!
//! The coordinator only sees the [`WorkerLauncher`] / [`WorkerHandle`] traits, so tests can
//! swap the real `voxvote-booth` executable for a shell script or an in-memory fake.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};
use voxvote_core::{SessionId, StatusChannel, VoteError, VoteResult};

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Ownership of one running worker.
pub trait WorkerHandle: Send {
    /// Non-blocking: `None` while the worker is still running.
    fn exit_status(&mut self) -> VoteResult<Option<WorkerExit>>;

    /// Kill the worker if it is still running, then reap it.
    fn terminate(&mut self) -> VoteResult<()>;
}

/// Starts a worker bound to a session and its status channel.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, session: &SessionId, channel: &StatusChannel)
        -> VoteResult<Box<dyn WorkerHandle>>;
}

/// Runs `<program> [args…] --session <id> --status-file <path>` per session.
///
/// stdout and stderr go to `<log_dir>/booth_<id>.out`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    log_dir: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            log_dir: log_dir.into(),
        }
    }

    /// Extra arguments placed before the session arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(
        &self,
        session: &SessionId,
        channel: &StatusChannel,
    ) -> VoteResult<Box<dyn WorkerHandle>> {
        fs::create_dir_all(&self.log_dir)?;
        let out_path = self.log_dir.join(format!("booth_{session}.out"));
        let stdout = File::create(&out_path)?;
        let stderr = stdout.try_clone()?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--session")
            .arg(session.as_str())
            .arg("--status-file")
            .arg(channel.path())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| {
                VoteError::ResourceExhausted(format!(
                    "cannot launch worker {}: {e}",
                    self.program.display()
                ))
            })?;

        info!(
            target: "voxvote::launcher",
            session = %session,
            pid = child.id(),
            output = %out_path.display(),
            "worker launched"
        );
        Ok(Box::new(ProcessHandle { child }))
    }
}

struct ProcessHandle {
    child: Child,
}

impl WorkerHandle for ProcessHandle {
    fn exit_status(&mut self) -> VoteResult<Option<WorkerExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| WorkerExit {
                code: status.code(),
            }))
    }

    fn terminate(&mut self) -> VoteResult<()> {
        if self.child.try_wait()?.is_none() {
            if let Err(e) = self.child.kill() {
                // lost a race with a natural exit
                if self.child.try_wait()?.is_none() {
                    return Err(e.into());
                }
            }
        }
        let status = self.child.wait()?;
        debug!(target: "voxvote::launcher", pid = self.child.id(), ?status, "worker reaped");
        Ok(())
    }
}
