//! Single-slot speaker: at most one utterance renders at a time.
//!
//! Within a process the slot is a static mutex. When several booth processes share one
//! output device, an exclusive `fs2` lock on `speaker_lock_path` extends the slot across
//! processes; the OS drops that lock if the holder is killed.

use crate::error::{VoiceError, VoiceResult};
use fs2::FileExt;
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

static PROCESS_SPEAKER: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const LOCK_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SpeakerSlot {
    lock_path: Option<PathBuf>,
    max_wait: Duration,
}

impl Default for SpeakerSlot {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SpeakerSlot {
    pub fn new(lock_path: Option<PathBuf>) -> Self {
        Self {
            lock_path,
            max_wait: Duration::from_secs(30),
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Take the slot; released when the guard drops.
    pub fn acquire(&self) -> VoiceResult<SpeakerGuard> {
        let local = PROCESS_SPEAKER
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file = match &self.lock_path {
            Some(path) => Some(self.lock_file(path)?),
            None => None,
        };
        Ok(SpeakerGuard {
            file,
            _local: local,
        })
    }

    fn lock_file(&self, path: &PathBuf) -> VoiceResult<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let deadline = Instant::now() + self.max_wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(_) if Instant::now() < deadline => std::thread::sleep(LOCK_POLL),
                Err(e) => {
                    return Err(VoiceError::Busy(format!(
                        "speaker lock {} held elsewhere: {e}",
                        path.display()
                    )))
                }
            }
        }
    }
}

/// Scoped ownership of the speaker.
pub struct SpeakerGuard {
    file: Option<File>,
    _local: MutexGuard<'static, ()>,
}

impl Drop for SpeakerGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                debug!("speaker lock release failed: {}", e);
            }
        }
    }
}
