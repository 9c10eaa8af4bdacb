//! Durable storage for index snapshots.
//!
//! A store holds exactly one snapshot blob. Replacing it must be atomic: a
//! reader sees either the previous blob or the new one, never a mix.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::snapshot::now_millis;

/// Default bound on a single store operation.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations that may wait behind a stalled one. Each queued write holds a
/// full snapshot, so this caps the memory a stalled disk can pin.
pub const MAX_QUEUED_JOBS: usize = 2;

/// Backend that persists the snapshot blob.
pub trait SnapshotStore: Send + Sync {
    /// Atomically replace the stored snapshot.
    fn write(&self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the stored snapshot, `None` if nothing was ever written.
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Move an unreadable snapshot out of the way without destroying it.
    fn quarantine(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// FileSnapshotStore
// ---------------------------------------------------------------------------

type Job = Box<dyn FnOnce(&Path) + Send>;

/// Snapshot kept in a single file.
///
/// Writes go to a temp file in the same directory which is synced and then
/// renamed over the target. All I/O runs on one worker thread, in submission
/// order, and each call waits at most `timeout`. A call that times out may
/// still land later, but never after a call submitted after it. When
/// [`MAX_QUEUED_JOBS`] operations are already waiting, new ones are refused.
pub struct FileSnapshotStore {
    path: PathBuf,
    timeout: Duration,
    jobs: Sender<Job>,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_timeout(path, DEFAULT_IO_TIMEOUT)
    }

    pub fn with_timeout(path: impl Into<PathBuf>, timeout: Duration) -> io::Result<Self> {
        let path = path.into();
        let (jobs, rx) = bounded::<Job>(MAX_QUEUED_JOBS);

        let worker_path = path.clone();
        thread::Builder::new()
            .name("snapshot-io".to_string())
            .spawn(move || {
                // Exits once the store, and with it the sender, is dropped.
                for job in rx {
                    job(&worker_path);
                }
            })?;

        Ok(Self {
            path,
            timeout,
            jobs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Run `op` on the worker and wait for its result.
    fn submit<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let (reply, result) = bounded(1);
        let job: Job = Box::new(move |path: &Path| {
            let _ = reply.send(op(path));
        });
        match self.jobs.send_timeout(job, self.timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(path = %self.path.display(), "Snapshot queue full, dropping request");
                return Err(StoreError::Timeout(self.timeout));
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(StoreError::Unavailable("snapshot worker stopped".to_string()));
            }
        }

        match result.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(StoreError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Unavailable(
                "snapshot worker dropped the request".to_string(),
            )),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let bytes = bytes.to_vec();
        self.submit(move |path: &Path| atomic_write(path, &bytes))
    }

    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.submit(|path: &Path| match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn quarantine(&self) -> Result<(), StoreError> {
        self.submit(|path: &Path| {
            if !path.exists() {
                return Ok(());
            }
            let mut target = path.as_os_str().to_owned();
            target.push(format!(".corrupt-{}", now_millis()));
            fs::rename(path, &target)?;
            warn!(from = %path.display(), to = ?target, "Quarantined unreadable snapshot");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn temp_path(path: &Path) -> Result<PathBuf, StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::NoParentDir(path.to_path_buf()))?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    Ok(parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4())))
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Write `data` to a temp file, sync it, rename it over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => return Err(StoreError::NoParentDir(path.to_path_buf())),
    };
    fs::create_dir_all(&parent)?;

    let temp = temp_path(&parent.join(path.file_name().unwrap_or_default()))?;
    let written = (|| -> io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    fsync_dir(&parent)?;
    debug!(path = %path.display(), bytes = data.len(), "Wrote snapshot");
    Ok(())
}

// ---------------------------------------------------------------------------
// MemorySnapshotStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    blob: Option<Vec<u8>>,
    quarantined: Vec<Vec<u8>>,
    writes: usize,
    unavailable: bool,
    quarantine_blocked: bool,
}

/// In-process store. Clones share the same slot.
///
/// Can be switched offline to exercise the memory-only fallback.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backing store going away (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = !available;
        }
    }

    /// Make [`SnapshotStore::quarantine`] fail (`false`) or work again.
    pub fn set_quarantine_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.quarantine_blocked = !available;
        }
    }

    /// Overwrite the stored blob directly.
    pub fn put_raw(&self, bytes: Vec<u8>) {
        if let Ok(mut state) = self.state.lock() {
            state.blob = Some(bytes);
        }
    }

    /// Current blob, bypassing availability.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.state.lock().ok().and_then(|s| s.blob.clone())
    }

    /// Number of successful [`SnapshotStore::write`] calls.
    pub fn writes(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }

    /// Number of blobs moved aside by [`SnapshotStore::quarantine`].
    pub fn quarantined(&self) -> usize {
        self.state.lock().map(|s| s.quarantined.len()).unwrap_or(0)
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(f(&mut state))
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.blob = Some(bytes.to_vec());
            s.writes += 1;
        })
    }

    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_state(|s| s.blob.clone())
    }

    fn quarantine(&self) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.quarantine_blocked {
                return Err(StoreError::Unavailable(
                    "memory store cannot quarantine".to_string(),
                ));
            }
            if let Some(blob) = s.blob.take() {
                s.quarantined.push(blob);
            }
            Ok(())
        })?
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
