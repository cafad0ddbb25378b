use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use ymir_types::{VersionedValue, YmirError};

/// Metadata identifying a snapshot.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SnapshotMeta {
    /// UUID v4 string identifying this snapshot.
    pub snapshot_id: String,
    /// Number of committed entries applied when the snapshot was taken.
    pub last_applied: u64,
    pub taken_at_ms: u64,
}

impl SnapshotMeta {
    pub fn new(last_applied: u64) -> Self {
        SnapshotMeta {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            last_applied,
            taken_at_ms: now_ms(),
        }
    }
}

/// A self-contained point-in-time copy of the key-value map.
///
/// `data` is a bincode-serialized [`SnapshotContents`] — the full map, never
/// a delta. Restoring replaces the map wholesale.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub data: Vec<u8>,
}

/// Internal serialized format stored in [`Snapshot::data`]. Entries are
/// sorted by key so the same map always serializes to the same bytes.
#[derive(serde::Serialize, serde::Deserialize)]
struct SnapshotContents {
    entries: Vec<(String, VersionedValue)>,
}

pub fn encode_contents(map: &HashMap<String, VersionedValue>) -> Result<Vec<u8>, YmirError> {
    let mut entries: Vec<(String, VersionedValue)> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    bincode::serde::encode_to_vec(&SnapshotContents { entries }, bincode::config::standard())
        .map_err(|e| YmirError::Storage(format!("encode snapshot: {e}")))
}

/// Decode failure is fatal for the caller: a snapshot this node cannot
/// interpret means unrecoverable storage corruption.
pub fn decode_contents(bytes: &[u8]) -> Result<HashMap<String, VersionedValue>, YmirError> {
    let contents: SnapshotContents =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(v, _)| v)
            .map_err(|e| YmirError::Corruption(format!("decode snapshot: {e}")))?;
    Ok(contents.entries.into_iter().collect())
}

/// Durable home for snapshots, external to the live map.
///
/// Methods use RPITIT (`-> impl Future + Send`); no async-trait dependency.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Load the latest snapshot. `None` is the normal fresh-node case, not
    /// an error.
    fn load(&self) -> impl Future<Output = Result<Option<Snapshot>, YmirError>> + Send;

    /// Persist `snapshot`, replacing any previous one.
    fn save(&self, snapshot: Snapshot) -> impl Future<Output = Result<(), YmirError>> + Send;
}

// ---------------------------------------------------------------------------
// FileSnapshotStore
// ---------------------------------------------------------------------------

/// Snapshot store keeping a single `state.snap` file under the data dir.
/// Saves write to a temp file first and rename over the old snapshot, so a
/// crash mid-save leaves the previous snapshot intact.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSnapshotStore { path: dir.into().join("state.snap") }
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, YmirError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(YmirError::Storage(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let snapshot: Snapshot =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map(|(v, _)| v)
                .map_err(|e| YmirError::Corruption(format!("decode snapshot file: {e}")))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: Snapshot) -> Result<(), YmirError> {
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| YmirError::Storage(format!("encode snapshot: {e}")))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| YmirError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let tmp = self.path.with_extension("snap.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| YmirError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| YmirError::Storage(format!("rename {}: {e}", self.path.display())))
    }
}

// ---------------------------------------------------------------------------
// MemSnapshotStore
// ---------------------------------------------------------------------------

/// In-memory `SnapshotStore`. Intended for unit tests; not persisted.
/// Clones share the same stored snapshot.
#[derive(Clone, Default)]
pub struct MemSnapshotStore {
    inner: Arc<RwLock<Option<Snapshot>>>,
}

impl MemSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, YmirError> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, snapshot: Snapshot) -> Result<(), YmirError> {
        *self.inner.write().await = Some(snapshot);
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
