//! **SessionCoordinator**: the session map and everything that mutates it.
//!
//! One mutex guards the whole registry. It is held only to copy out or store back a
//! session's bookkeeping; channel reads, liveness checks, process launches and kills all
//! happen outside it, so a slow session never blocks another session's poll.
//!
//! Poll order matters: liveness is sampled *before* the channel is read. A worker that
//! wrote its terminal event and then exited is therefore seen as terminal, never as lost.

use crate::launcher::{WorkerExit, WorkerHandle, WorkerLauncher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use voxvote_core::{
    purge_orphans, BallotStore, ChannelRead, ChannelStamp, SessionId, StatusChannel,
    StatusEvent, Step, VoteConfig, VoteError, VoteReceipt, VoteResult,
};

type SharedWorker = Arc<Mutex<Box<dyn WorkerHandle>>>;

/// Limits and retention windows.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub max_sessions: usize,
    /// Non-terminal sessions without a poll for this long are abandoned.
    pub stale_after: Duration,
    /// Terminal sessions stay pollable this long after retirement.
    pub retain_terminal: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            stale_after: Duration::from_secs(300),
            retain_terminal: Duration::from_secs(120),
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &VoteConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            stale_after: config.stale_after(),
            retain_terminal: config.retain_terminal(),
        }
    }
}

struct Session {
    channel: StatusChannel,
    /// Released when the session retires.
    worker: Option<SharedWorker>,
    last_known: StatusEvent,
    stamp: Option<ChannelStamp>,
    last_polled: Instant,
    retired_at: Option<Instant>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Session>,
    /// Launches admitted but not yet registered.
    launching: usize,
}

impl Registry {
    fn live(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.retired_at.is_none())
            .count()
            + self.launching
    }
}

/// What one reaper pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Non-terminal sessions nobody polled within the staleness window.
    pub abandoned: Vec<SessionId>,
    /// Terminal sessions past their retention window.
    pub expired: Vec<SessionId>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.abandoned.is_empty() && self.expired.is_empty()
    }
}

pub struct SessionCoordinator {
    status_dir: PathBuf,
    launcher: Arc<dyn WorkerLauncher>,
    store: Arc<dyn BallotStore>,
    settings: CoordinatorSettings,
    registry: Mutex<Registry>,
}

impl SessionCoordinator {
    /// Create the coordinator and sweep channel files left over from a previous run.
    pub fn new(
        status_dir: impl Into<PathBuf>,
        launcher: Arc<dyn WorkerLauncher>,
        store: Arc<dyn BallotStore>,
        settings: CoordinatorSettings,
    ) -> VoteResult<Self> {
        let status_dir = status_dir.into();
        std::fs::create_dir_all(&status_dir)?;
        let purged = purge_orphans(&status_dir)?;
        if purged > 0 {
            info!(target: "voxvote::sessions", purged, "removed orphaned status files");
        }
        Ok(Self {
            status_dir,
            launcher,
            store,
            settings,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn status_dir(&self) -> &Path {
        &self.status_dir
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sessions that have not reached a terminal state.
    pub fn live_sessions(&self) -> usize {
        self.registry().live()
    }

    /// Start a session and its worker. Fails with `ResourceExhausted` at the session limit
    /// or when the worker cannot be launched.
    pub fn start(&self) -> VoteResult<SessionId> {
        {
            let mut reg = self.registry();
            if reg.live() >= self.settings.max_sessions {
                return Err(VoteError::ResourceExhausted(format!(
                    "{} sessions already running",
                    self.settings.max_sessions
                )));
            }
            reg.launching += 1;
        }

        let id = SessionId::generate();
        let channel = StatusChannel::for_session(&self.status_dir, &id);
        let launched = self.launcher.launch(&id, &channel);

        let mut reg = self.registry();
        reg.launching -= 1;
        let worker = launched?;
        let now = Instant::now();
        reg.sessions.insert(
            id.clone(),
            Session {
                channel,
                worker: Some(Arc::new(Mutex::new(worker))),
                last_known: StatusEvent::starting(),
                stamp: None,
                last_polled: now,
                retired_at: None,
            },
        );
        info!(target: "voxvote::sessions", session = %id, live = reg.live(), "session started");
        Ok(id)
    }

    /// Current status of a session.
    pub fn poll(&self, id: &SessionId) -> VoteResult<StatusEvent> {
        let (channel, worker, stamp, cached) = {
            let mut reg = self.registry();
            let session = reg
                .sessions
                .get_mut(id)
                .ok_or_else(|| VoteError::NotFound(id.to_string()))?;
            session.last_polled = Instant::now();
            match &session.worker {
                Some(worker) if session.retired_at.is_none() => (
                    session.channel.clone(),
                    worker.clone(),
                    session.stamp,
                    session.last_known.clone(),
                ),
                _ => return Ok(session.last_known.clone()),
            }
        };

        let exited = sample_exit(id, &worker);

        let (observed, new_stamp) = match channel.read_if_changed(stamp.as_ref()) {
            Ok(ChannelRead::Updated(event, stamp)) => (event, Some(stamp)),
            Ok(ChannelRead::Unchanged) => (cached.clone(), stamp),
            Ok(ChannelRead::Absent) => (StatusEvent::starting(), None),
            Err(e) => {
                warn!(target: "voxvote::sessions", session = %id, "status read failed: {}", e);
                (cached.clone(), stamp)
            }
        };
        let mut event = if observed.step.rank() < cached.step.rank() {
            cached
        } else {
            observed
        };
        if !event.is_terminal() {
            if let Some(exit) = exited {
                event = self.reconcile_lost_worker(id, &event, exit);
            }
        }

        let retiring = {
            let mut reg = self.registry();
            let Some(session) = reg.sessions.get_mut(id) else {
                // cancelled while we were reading
                return Ok(event);
            };
            if event.step.rank() < session.last_known.step.rank() {
                event = session.last_known.clone();
            }
            session.last_known = event.clone();
            if new_stamp.is_some() {
                session.stamp = new_stamp;
            }
            if event.is_terminal() && session.retired_at.is_none() {
                session.retired_at = Some(Instant::now());
                session
                    .worker
                    .take()
                    .map(|worker| (worker, session.channel.clone()))
            } else {
                None
            }
        };

        if let Some((worker, channel)) = retiring {
            info!(
                target: "voxvote::sessions",
                session = %id,
                step = ?event.step,
                "session finished"
            );
            release(id, &worker, &channel);
        }
        Ok(event)
    }

    /// The worker is gone but the channel holds no terminal event.
    fn reconcile_lost_worker(
        &self,
        id: &SessionId,
        last: &StatusEvent,
        exit: WorkerExit,
    ) -> StatusEvent {
        if last.step == Step::AwaitingConfirmation {
            match self.store.vote_for_session(id) {
                Ok(Some(vote)) => {
                    let candidate_name = self
                        .store
                        .list_candidates()
                        .ok()
                        .and_then(|cs| cs.into_iter().find(|c| c.id == vote.candidate_id))
                        .map(|c| c.name);
                    info!(
                        target: "voxvote::sessions",
                        session = %id,
                        "worker exited after recording its vote"
                    );
                    return StatusEvent::completed(
                        VoteReceipt {
                            voter_id: vote.voter_token,
                            candidate_id: vote.candidate_id,
                            candidate_name,
                        },
                        "Vote recorded",
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "voxvote::sessions", session = %id, "vote lookup failed: {}", e)
                }
            }
        }
        warn!(
            target: "voxvote::sessions",
            session = %id,
            step = ?last.step,
            code = ?exit.code,
            "worker exited without a final status"
        );
        StatusEvent::failed_with(&VoteError::WorkerLost)
    }

    /// Stop a session's worker (if still running) and forget the session.
    ///
    /// Unknown ids are `NotFound`. Cancelling a finished session just drops it.
    pub fn cancel(&self, id: &SessionId) -> VoteResult<()> {
        let session = self
            .registry()
            .sessions
            .remove(id)
            .ok_or_else(|| VoteError::NotFound(id.to_string()))?;
        teardown(id, session);
        info!(target: "voxvote::sessions", session = %id, "session cancelled");
        Ok(())
    }

    /// Drop abandoned and expired sessions as of `now`.
    pub fn reap(&self, now: Instant) -> ReapReport {
        let mut report = ReapReport::default();
        let mut abandoned = Vec::new();
        {
            let mut reg = self.registry();
            let ids: Vec<SessionId> = reg.sessions.keys().cloned().collect();
            for id in ids {
                let Some(session) = reg.sessions.get(&id) else {
                    continue;
                };
                let (retired_at, last_polled) = (session.retired_at, session.last_polled);
                match retired_at {
                    Some(at) if now.saturating_duration_since(at) >= self.settings.retain_terminal => {
                        reg.sessions.remove(&id);
                        report.expired.push(id);
                    }
                    None if now.saturating_duration_since(last_polled) >= self.settings.stale_after => {
                        if let Some(session) = reg.sessions.remove(&id) {
                            abandoned.push((id.clone(), session));
                        }
                        report.abandoned.push(id);
                    }
                    _ => {}
                }
            }
        }

        for (id, session) in abandoned {
            warn!(target: "voxvote::sessions", session = %id, "abandoned session reaped");
            teardown(&id, session);
        }
        if !report.is_empty() {
            debug!(
                target: "voxvote::sessions",
                abandoned = report.abandoned.len(),
                expired = report.expired.len(),
                "reaper pass"
            );
        }
        report
    }

    /// Cancel every session. Used on shutdown.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(SessionId, Session)> = self.registry().sessions.drain().collect();
        let count = drained.len();
        for (id, session) in drained {
            teardown(&id, session);
        }
        if count > 0 {
            info!(target: "voxvote::sessions", count, "sessions cancelled at shutdown");
        }
        count
    }
}

fn sample_exit(id: &SessionId, worker: &SharedWorker) -> Option<WorkerExit> {
    let mut handle = worker.lock().unwrap_or_else(|p| p.into_inner());
    match handle.exit_status() {
        Ok(exit) => exit,
        Err(e) => {
            warn!(target: "voxvote::sessions", session = %id, "liveness check failed: {}", e);
            None
        }
    }
}

fn release(id: &SessionId, worker: &SharedWorker, channel: &StatusChannel) {
    let mut handle = worker.lock().unwrap_or_else(|p| p.into_inner());
    if let Err(e) = handle.terminate() {
        warn!(target: "voxvote::sessions", session = %id, "worker teardown failed: {}", e);
    }
    if let Err(e) = channel.remove() {
        warn!(target: "voxvote::sessions", session = %id, "status file not removed: {}", e);
    }
}

fn teardown(id: &SessionId, session: Session) {
    match &session.worker {
        Some(worker) => release(id, worker, &session.channel),
        None => {
            if let Err(e) = session.channel.remove() {
                warn!(target: "voxvote::sessions", session = %id, "status file not removed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use voxvote_core::{FailureKind, MemoryBallotStore};

    #[derive(Default)]
    struct FakeWorker {
        exit: Mutex<Option<WorkerExit>>,
        terminated: AtomicBool,
    }

    impl FakeWorker {
        fn exit_with(&self, code: i32) {
            *self.exit.lock().unwrap() = Some(WorkerExit { code: Some(code) });
        }
    }

    struct FakeHandle(Arc<FakeWorker>);

    impl WorkerHandle for FakeHandle {
        fn exit_status(&mut self) -> VoteResult<Option<WorkerExit>> {
            Ok(*self.0.exit.lock().unwrap())
        }

        fn terminate(&mut self) -> VoteResult<()> {
            self.0.terminated.store(true, Ordering::SeqCst);
            let mut exit = self.0.exit.lock().unwrap();
            if exit.is_none() {
                *exit = Some(WorkerExit { code: None });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        launched: Mutex<HashMap<SessionId, (StatusChannel, Arc<FakeWorker>)>>,
        refuse: AtomicBool,
    }

    impl FakeLauncher {
        fn worker(&self, id: &SessionId) -> (StatusChannel, Arc<FakeWorker>) {
            self.launched.lock().unwrap()[id].clone()
        }
    }

    impl WorkerLauncher for FakeLauncher {
        fn launch(
            &self,
            session: &SessionId,
            channel: &StatusChannel,
        ) -> VoteResult<Box<dyn WorkerHandle>> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(VoteError::ResourceExhausted("process limit".into()));
            }
            let worker = Arc::new(FakeWorker::default());
            self.launched
                .lock()
                .unwrap()
                .insert(session.clone(), (channel.clone(), worker.clone()));
            Ok(Box::new(FakeHandle(worker)))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        launcher: Arc<FakeLauncher>,
        store: Arc<MemoryBallotStore>,
        coordinator: SessionCoordinator,
    }

    fn fixture(settings: CoordinatorSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(FakeLauncher::default());
        let store = Arc::new(MemoryBallotStore::demo());
        let coordinator = SessionCoordinator::new(
            dir.path().join("status"),
            launcher.clone(),
            store.clone(),
            settings,
        )
        .unwrap();
        Fixture {
            dir,
            launcher,
            store,
            coordinator,
        }
    }

    fn progress(step: Step) -> StatusEvent {
        StatusEvent::progress(step, format!("{step:?}"))
    }

    #[test]
    fn poll_before_first_write_reports_starting() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let event = f.coordinator.poll(&id).unwrap();
        assert_eq!(event, StatusEvent::starting());
    }

    #[test]
    fn poll_follows_the_channel() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, _) = f.launcher.worker(&id);

        channel.write(&progress(Step::AwaitingCandidate)).unwrap();
        assert_eq!(f.coordinator.poll(&id).unwrap().step, Step::AwaitingCandidate);
        // unchanged file, cached answer
        assert_eq!(f.coordinator.poll(&id).unwrap().step, Step::AwaitingCandidate);

        channel.write(&progress(Step::AwaitingConfirmation)).unwrap();
        assert_eq!(
            f.coordinator.poll(&id).unwrap().step,
            Step::AwaitingConfirmation
        );
    }

    #[test]
    fn worker_lost_mid_session_is_failed() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, worker) = f.launcher.worker(&id);

        channel.write(&progress(Step::AwaitingCandidate)).unwrap();
        assert_eq!(f.coordinator.poll(&id).unwrap().step, Step::AwaitingCandidate);

        worker.exit_with(101);
        let event = f.coordinator.poll(&id).unwrap();
        assert_eq!(event.step, Step::Failed);
        assert_eq!(event.failure_kind(), Some(FailureKind::WorkerLost));
        assert_eq!(event.message, "worker exited unexpectedly");
        assert!(worker.terminated.load(Ordering::SeqCst));
        assert!(!channel.path().exists());
    }

    #[test]
    fn worker_lost_before_writing_is_failed() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (_, worker) = f.launcher.worker(&id);
        worker.exit_with(1);
        assert_eq!(
            f.coordinator.poll(&id).unwrap().failure_kind(),
            Some(FailureKind::WorkerLost)
        );
    }

    #[test]
    fn terminal_event_then_exit_is_not_a_lost_worker() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, worker) = f.launcher.worker(&id);

        channel.write(&StatusEvent::cancelled("voter said cancel")).unwrap();
        worker.exit_with(0);

        let event = f.coordinator.poll(&id).unwrap();
        assert_eq!(event.step, Step::Cancelled);
        assert!(!channel.path().exists());
        // retired sessions stay pollable
        assert_eq!(f.coordinator.poll(&id).unwrap(), event);
        assert_eq!(f.coordinator.live_sessions(), 0);
    }

    #[test]
    fn lost_worker_with_recorded_vote_is_completed() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, worker) = f.launcher.worker(&id);

        channel.write(&progress(Step::AwaitingConfirmation)).unwrap();
        f.coordinator.poll(&id).unwrap();
        f.store.record_vote("FIRST1", 2, Some(&id)).unwrap();
        worker.exit_with(137);

        let event = f.coordinator.poll(&id).unwrap();
        assert_eq!(event.step, Step::Completed);
        let receipt = event.receipt().unwrap();
        assert_eq!(receipt.voter_id, "FIRST1");
        assert_eq!(receipt.candidate_id, 2);
        assert_eq!(receipt.candidate_name.as_deref(), Some("CONGRESS"));
    }

    #[test]
    fn steps_never_go_backwards() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, _) = f.launcher.worker(&id);

        channel.write(&progress(Step::AwaitingConfirmation)).unwrap();
        f.coordinator.poll(&id).unwrap();
        channel.write(&progress(Step::AwaitingVoterId)).unwrap();
        assert_eq!(
            f.coordinator.poll(&id).unwrap().step,
            Step::AwaitingConfirmation
        );
        channel.remove().unwrap();
        assert_eq!(
            f.coordinator.poll(&id).unwrap().step,
            Step::AwaitingConfirmation
        );
    }

    #[test]
    fn session_limit_and_launch_failures_are_resource_exhausted() {
        let f = fixture(CoordinatorSettings {
            max_sessions: 2,
            ..Default::default()
        });
        let first = f.coordinator.start().unwrap();
        f.coordinator.start().unwrap();
        assert!(matches!(
            f.coordinator.start(),
            Err(VoteError::ResourceExhausted(_))
        ));

        // a finished session frees its slot
        let (channel, _) = f.launcher.worker(&first);
        channel.write(&StatusEvent::cancelled("no")).unwrap();
        f.coordinator.poll(&first).unwrap();
        f.launcher.refuse.store(true, Ordering::SeqCst);
        assert!(matches!(
            f.coordinator.start(),
            Err(VoteError::ResourceExhausted(_))
        ));
        f.launcher.refuse.store(false, Ordering::SeqCst);
        f.coordinator.start().unwrap();
        assert_eq!(f.coordinator.live_sessions(), 2);
    }

    #[test]
    fn concurrent_starts_respect_the_limit() {
        let f = Arc::new(fixture(CoordinatorSettings {
            max_sessions: 4,
            ..Default::default()
        }));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let f = f.clone();
                std::thread::spawn(move || f.coordinator.start().is_ok())
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(started, 4);
        assert_eq!(f.coordinator.live_sessions(), 4);
    }

    #[test]
    fn cancel_terminates_and_forgets() {
        let f = fixture(CoordinatorSettings::default());
        let id = f.coordinator.start().unwrap();
        let (channel, worker) = f.launcher.worker(&id);
        channel.write(&progress(Step::AwaitingCandidate)).unwrap();

        f.coordinator.cancel(&id).unwrap();
        assert!(worker.terminated.load(Ordering::SeqCst));
        assert!(!channel.path().exists());
        assert!(matches!(f.coordinator.poll(&id), Err(VoteError::NotFound(_))));
        assert!(matches!(f.coordinator.cancel(&id), Err(VoteError::NotFound(_))));
    }

    #[test]
    fn unknown_sessions_are_not_found() {
        let f = fixture(CoordinatorSettings::default());
        let id = SessionId::generate();
        assert!(matches!(f.coordinator.poll(&id), Err(VoteError::NotFound(_))));
        assert!(matches!(f.coordinator.cancel(&id), Err(VoteError::NotFound(_))));
    }

    #[test]
    fn reaper_drops_abandoned_and_expired_sessions() {
        let f = fixture(CoordinatorSettings {
            max_sessions: 8,
            stale_after: Duration::from_secs(60),
            retain_terminal: Duration::from_secs(30),
        });
        let idle = f.coordinator.start().unwrap();
        let done = f.coordinator.start().unwrap();
        let (done_channel, _) = f.launcher.worker(&done);
        done_channel.write(&StatusEvent::cancelled("no")).unwrap();
        f.coordinator.poll(&done).unwrap();

        assert!(f.coordinator.reap(Instant::now()).is_empty());

        let report = f.coordinator.reap(Instant::now() + Duration::from_secs(45));
        assert_eq!(report.expired, vec![done.clone()]);
        assert!(report.abandoned.is_empty());

        let report = f.coordinator.reap(Instant::now() + Duration::from_secs(90));
        assert_eq!(report.abandoned, vec![idle.clone()]);
        let (_, idle_worker) = f.launcher.worker(&idle);
        assert!(idle_worker.terminated.load(Ordering::SeqCst));
        assert!(matches!(f.coordinator.poll(&idle), Err(VoteError::NotFound(_))));
        assert!(matches!(f.coordinator.poll(&done), Err(VoteError::NotFound(_))));
    }

    #[test]
    fn shutdown_cancels_everything() {
        let f = fixture(CoordinatorSettings::default());
        let a = f.coordinator.start().unwrap();
        let b = f.coordinator.start().unwrap();
        assert_eq!(f.coordinator.shutdown(), 2);
        for id in [a, b] {
            assert!(f.launcher.worker(&id).1.terminated.load(Ordering::SeqCst));
        }
        assert_eq!(f.coordinator.live_sessions(), 0);
    }

    #[test]
    fn startup_sweeps_orphaned_status_files() {
        let dir = tempfile::tempdir().unwrap();
        let status_dir = dir.path().join("status");
        std::fs::create_dir_all(&status_dir).unwrap();
        let orphan = StatusChannel::for_session(&status_dir, &SessionId::generate());
        orphan.write(&StatusEvent::starting()).unwrap();
        std::fs::write(status_dir.join("keep.txt"), "x").unwrap();

        SessionCoordinator::new(
            &status_dir,
            Arc::new(FakeLauncher::default()),
            Arc::new(MemoryBallotStore::demo()),
            CoordinatorSettings::default(),
        )
        .unwrap();
        assert!(!orphan.path().exists());
        assert!(status_dir.join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn real_processes_are_reconciled() {
        use crate::launcher::ProcessLauncher;

        let f = fixture(CoordinatorSettings::default());
        let script = r#"printf '%s' '{"step":"AwaitingCandidate","message":"reading candidates","result":null}' > "$4"; exit 3"#;
        let launcher = ProcessLauncher::new("sh", f.dir.path().join("logs"))
            .with_args(["-c", script, "booth"]);
        let coordinator = SessionCoordinator::new(
            f.dir.path().join("proc-status"),
            Arc::new(launcher),
            f.store.clone(),
            CoordinatorSettings::default(),
        )
        .unwrap();

        let id = coordinator.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let event = loop {
            let event = coordinator.poll(&id).unwrap();
            if event.is_terminal() || Instant::now() > deadline {
                break event;
            }
            std::thread::sleep(Duration::from_millis(25));
        };
        assert_eq!(event.failure_kind(), Some(FailureKind::WorkerLost));
    }
}
