use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use ymir_types::{AppliedOutcome, VersionedValue, WriteIntent, YmirError};

use crate::codec;
use crate::correlator::Correlator;
use crate::log::{CommitReceiver, ErrorReceiver, LogEvent, ProposeSender};
use crate::reqid::CorrelationIdGen;
use crate::snap::{self, Snapshot, SnapshotMeta, SnapshotStore};

/// The authoritative key-value map plus everything needed to feed writes
/// through the replicated log and back: proposal encoding, the pending-caller
/// table, and snapshot save/restore.
///
/// All mutation funnels through [`run_applier`](Self::run_applier), exactly
/// one instance of which consumes committed entries strictly in commit order.
/// Readers and writers in any number run concurrently against it.
pub struct KvStateMachine<S> {
    kv: RwLock<HashMap<String, VersionedValue>>,
    correlator: Correlator,
    id_gen: CorrelationIdGen,
    propose_tx: ProposeSender,
    snapshots: S,
    /// Save a snapshot after this many applied entries; 0 disables.
    snapshot_threshold: u64,
}

impl<S: SnapshotStore> KvStateMachine<S> {
    pub fn new(
        node_id: u64,
        propose_tx: ProposeSender,
        snapshots: S,
        snapshot_threshold: u64,
    ) -> Self {
        KvStateMachine {
            kv: RwLock::new(HashMap::new()),
            correlator: Correlator::new(),
            id_gen: CorrelationIdGen::new(node_id),
            propose_tx,
            snapshots,
            snapshot_threshold,
        }
    }

    /// Restore the latest snapshot from the store, if one exists. Called once
    /// at startup, before the applier starts. A missing snapshot is the
    /// normal fresh-node case.
    pub async fn bootstrap(&self) -> Result<(), YmirError> {
        match self.snapshots.load().await? {
            None => {
                tracing::info!("no snapshot found, starting with an empty map");
                Ok(())
            }
            Some(snapshot) => {
                tracing::info!(
                    snapshot_id = %snapshot.meta.snapshot_id,
                    last_applied = snapshot.meta.last_applied,
                    "restoring snapshot"
                );
                self.restore_snapshot(&snapshot.data).await
            }
        }
    }

    /// Local point read. May be stale relative to entries still in flight;
    /// never consults the log.
    pub async fn lookup(&self, key: &str) -> Option<VersionedValue> {
        self.kv.read().await.get(key).cloned()
    }

    /// Submit a write through the log and suspend until the committed entry
    /// is applied.
    ///
    /// There is deliberately no timeout here: if the entry never commits the
    /// call blocks until process exit. Callers wanting patience limits wrap
    /// this in their own timeout; a late outcome is then silently discarded.
    pub async fn propose(
        &self,
        key: String,
        value: String,
        expected_version: u64,
    ) -> Result<AppliedOutcome, YmirError> {
        let correlation_id = self.id_gen.next();
        let intent = WriteIntent { key, value, expected_version, correlation_id };
        let payload = codec::encode_intent(&intent)?;

        // Register before handing the payload to the log: the committed
        // entry can race back before send() returns.
        let rx = self.correlator.register(correlation_id).await;
        if self.propose_tx.send(payload).await.is_err() {
            // The log is gone; no commit can ever arrive for this id.
            self.correlator.discard(correlation_id).await;
            return Err(YmirError::Log("propose channel closed".into()));
        }

        rx.await
            .map_err(|_| YmirError::Log("log shut down before applying proposal".into()))
    }

    /// Consume the commit stream until it closes or an unrecoverable
    /// condition surfaces. This is the single writer of the map; it must not
    /// be run more than once.
    ///
    /// An `Err` return means the node can no longer trust its state (corrupt
    /// committed entry or snapshot, failed collaborator) and the supervisor
    /// is expected to terminate the process.
    pub async fn run_applier(
        self: Arc<Self>,
        mut commit_rx: CommitReceiver,
        error_rx: ErrorReceiver,
    ) -> Result<(), YmirError> {
        let mut last_applied: u64 = 0;
        let mut applied_since_snapshot: u64 = 0;

        while let Some(event) = commit_rx.recv().await {
            match event {
                LogEvent::Reload => match self.snapshots.load().await? {
                    None => {
                        tracing::warn!("reload signal but no snapshot available");
                    }
                    Some(snapshot) => {
                        tracing::info!(
                            snapshot_id = %snapshot.meta.snapshot_id,
                            last_applied = snapshot.meta.last_applied,
                            "reloading from snapshot"
                        );
                        self.restore_snapshot(&snapshot.data).await?;
                        last_applied = snapshot.meta.last_applied;
                        applied_since_snapshot = 0;
                    }
                },
                LogEvent::Apply(batch) => {
                    for payload in &batch.entries {
                        let intent = codec::decode_intent(payload)?;
                        let correlation_id = intent.correlation_id;
                        let outcome = self.apply_intent(intent).await;
                        // Fulfill outside the map lock; the correlator's
                        // lock is never nested inside it.
                        self.correlator.fulfill(correlation_id, outcome).await;
                        last_applied += 1;
                        applied_since_snapshot += 1;
                    }
                    // Ack only after the whole batch is applied; the log
                    // uses this to bound what it keeps in flight.
                    let _ = batch.done.send(());

                    if self.snapshot_threshold > 0
                        && applied_since_snapshot >= self.snapshot_threshold
                    {
                        self.save_snapshot(last_applied).await?;
                        applied_since_snapshot = 0;
                    }
                }
            }
        }

        // Commit stream closed: a pending value on the error stream means the
        // collaborator failed permanently; a dropped sender is clean shutdown.
        match error_rx.await {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }

    /// The optimistic-concurrency rule, applied under the exclusive lock.
    ///
    /// Accept when the key is absent or its current version equals the
    /// version the caller claims to have observed. The accept branch
    /// establishes `current == expected` (absent counting as version 0), so
    /// the next version is derived from current state, never from the
    /// caller's claim.
    async fn apply_intent(&self, intent: WriteIntent) -> AppliedOutcome {
        let mut kv = self.kv.write().await;
        let current = kv.get(&intent.key).cloned();
        match current {
            Some(current) if current.version != intent.expected_version => {
                tracing::debug!(
                    correlation_id = intent.correlation_id,
                    key = %intent.key,
                    expected = intent.expected_version,
                    actual = current.version,
                    "write rejected, stale version"
                );
                AppliedOutcome { value: current, success: false }
            }
            current => {
                let version = current.map_or(0, |v| v.version) + 1;
                let next = VersionedValue { value: intent.value, version };
                kv.insert(intent.key.clone(), next.clone());
                tracing::debug!(
                    correlation_id = intent.correlation_id,
                    key = %intent.key,
                    version,
                    "write applied"
                );
                AppliedOutcome { value: next, success: true }
            }
        }
    }

    /// Serialize the full map under the shared lock.
    pub async fn take_snapshot(&self) -> Result<Vec<u8>, YmirError> {
        let kv = self.kv.read().await;
        snap::encode_contents(&kv)
    }

    /// Replace the entire map with the deserialized snapshot. Never a merge.
    pub async fn restore_snapshot(&self, data: &[u8]) -> Result<(), YmirError> {
        let restored = snap::decode_contents(data)?;
        let mut kv = self.kv.write().await;
        *kv = restored;
        Ok(())
    }

    /// Capture the current map and persist it through the snapshot store.
    pub async fn save_snapshot(&self, last_applied: u64) -> Result<(), YmirError> {
        let data = self.take_snapshot().await?;
        let snapshot = Snapshot { meta: SnapshotMeta::new(last_applied), data };
        tracing::info!(
            snapshot_id = %snapshot.meta.snapshot_id,
            last_applied,
            "saving snapshot"
        );
        self.snapshots.save(snapshot).await
    }
}
