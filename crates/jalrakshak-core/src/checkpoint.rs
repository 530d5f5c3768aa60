//! Model Checkpoints and Background Persistence
//!
//! Fitted models serialize into a versioned, checksummed envelope. The core
//! produces and consumes envelope bytes; where they live is decided by a
//! [`ModelStore`]. Writes after a retrain go through a [`PersistenceWorker`]
//! thread so detection never waits on disk.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

use crate::error::CheckpointError;

/// Version for checkpoint format migrations
pub const CHECKPOINT_VERSION: u32 = 1;

/// Store key of the outlier model (scaler + isolation forest)
pub const OUTLIER_MODEL_KEY: &str = "outlier_model";

/// Store key of the maintenance regression forest
pub const MAINTENANCE_MODEL_KEY: &str = "maintenance_model";

/// On-disk envelope around a bincode payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    /// Format version
    pub version: u32,
    /// Which model the payload holds (the store key)
    pub kind: String,
    /// Creation time, unix seconds
    pub created_at: i64,
    /// xxh3-64 of `payload`
    pub checksum: u64,
    pub payload: Vec<u8>,
}

impl ModelCheckpoint {
    /// Wrap a serializable model state.
    pub fn seal<T: Serialize>(kind: &str, state: &T) -> Result<Self, CheckpointError> {
        let payload = bincode::serialize(state)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?;
        Ok(Self {
            version: CHECKPOINT_VERSION,
            kind: kind.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            checksum: xxhash_rust::xxh3::xxh3_64(&payload),
            payload,
        })
    }

    /// Verify checksum and decode the payload.
    pub fn open<T: DeserializeOwned>(&self, expected_kind: &str) -> Result<T, CheckpointError> {
        if self.kind != expected_kind {
            return Err(CheckpointError::KindMismatch {
                expected: expected_kind.to_string(),
                found: self.kind.clone(),
            });
        }
        let computed = xxhash_rust::xxh3::xxh3_64(&self.payload);
        if computed != self.checksum {
            return Err(CheckpointError::ChecksumMismatch {
                expected: self.checksum,
                computed,
            });
        }
        bincode::deserialize(&self.payload)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: ModelCheckpoint = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;

        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                max_supported: CHECKPOINT_VERSION,
            });
        }

        Ok(checkpoint)
    }
}

/// Encode a model state straight to envelope bytes.
pub fn encode<T: Serialize>(kind: &str, state: &T) -> Result<Vec<u8>, CheckpointError> {
    ModelCheckpoint::seal(kind, state)?.to_bytes()
}

/// Decode envelope bytes produced by [`encode`].
pub fn decode<T: DeserializeOwned>(kind: &str, bytes: &[u8]) -> Result<T, CheckpointError> {
    ModelCheckpoint::from_bytes(bytes)?.open(kind)
}

/// Durable key/value storage for checkpoint bytes.
pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError>;
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), CheckpointError>;
}

impl<S: ModelStore + ?Sized> ModelStore for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        (**self).save(key, bytes)
    }
}

/// Stores each key as `<dir>/<key>.bin`.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// Creates the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

impl ModelStore for FileModelStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        // Write beside the target then rename, so readers never see a torn file
        let target = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.bin.tmp"));
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }
}

/// A checkpoint waiting to be written
#[derive(Debug)]
pub struct PersistJob {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Cloneable handle that enqueues checkpoint writes.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: Sender<PersistJob>,
}

impl PersistHandle {
    /// Never blocks; a full or closed queue is reported as an error.
    pub fn submit(&self, key: &str, bytes: Vec<u8>) -> Result<(), CheckpointError> {
        let job = PersistJob {
            key: key.to_string(),
            bytes,
        };
        self.tx.try_send(job).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "persistence queue full",
                TrySendError::Disconnected(_) => "persistence worker stopped",
            };
            CheckpointError::Io(std::io::Error::other(reason))
        })
    }
}

/// Dedicated thread draining checkpoint writes into a [`ModelStore`].
pub struct PersistenceWorker {
    handle: thread::JoinHandle<()>,
}

impl PersistenceWorker {
    pub const QUEUE_CAPACITY: usize = 16;

    pub fn spawn<S: ModelStore + 'static>(
        store: S,
    ) -> Result<(Self, PersistHandle), CheckpointError> {
        let (tx, rx) = bounded::<PersistJob>(Self::QUEUE_CAPACITY);
        let handle = thread::Builder::new()
            .name("jal-persistence".into())
            .spawn(move || Self::run(store, rx))?;
        Ok((Self { handle }, PersistHandle { tx }))
    }

    fn run<S: ModelStore>(store: S, rx: Receiver<PersistJob>) {
        info!("Persistence worker active.");
        while let Ok(job) = rx.recv() {
            match store.save(&job.key, &job.bytes) {
                Ok(()) => info!(key = %job.key, bytes = job.bytes.len(), "Checkpoint written"),
                Err(e) => warn!(key = %job.key, error = %e, "Checkpoint write failed"),
            }
        }
        info!("Persistence worker stopped.");
    }

    /// Waits for queued writes to drain. All handles must be dropped first.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("Persistence worker panicked");
        }
    }
}
