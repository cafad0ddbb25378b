use std::collections::HashMap;

use tokio::sync::{oneshot, Mutex};

use ymir_types::AppliedOutcome;

/// Table of callers blocked on in-flight proposals, keyed by correlation id.
///
/// Bridges the asynchronous commit stream back to the synchronous caller:
/// each registered id is fulfilled at most once, when the matching committed
/// entry is applied. The table's lock is independent of the key-value map's
/// lock and is never taken while the map lock is held.
///
/// An entry whose commit never arrives (lost leadership, partition) is never
/// fulfilled and leaks until process restart. That is a documented limitation,
/// not something this layer times out on; patience belongs to the caller.
pub struct Correlator {
    waiters: Mutex<HashMap<u64, oneshot::Sender<AppliedOutcome>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator { waiters: Mutex::new(HashMap::new()) }
    }

    /// Create the one-shot fulfillment slot for `id`.
    ///
    /// Panics if `id` is already registered: ids are process-unique by
    /// construction, so a duplicate is a programmer error.
    pub async fn register(&self, id: u64) -> oneshot::Receiver<AppliedOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock().await;
        if waiters.insert(id, tx).is_some() {
            panic!("correlation id {id} registered twice");
        }
        rx
    }

    /// Deliver `outcome` to the waiter registered under `id`, removing the
    /// entry. A missing waiter is logged and ignored; a waiter that has gone
    /// away (caller-side timeout) silently discards the late outcome.
    pub async fn fulfill(&self, id: u64, outcome: AppliedOutcome) {
        let sender = self.waiters.lock().await.remove(&id);
        match sender {
            None => {
                tracing::warn!(correlation_id = id, "no waiter registered for applied entry");
            }
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(correlation_id = id, "waiter gone, outcome discarded");
                }
            }
        }
    }

    /// Drop a registration without fulfilling it. Used when the proposal was
    /// never handed to the log, so no commit can ever arrive for it.
    pub async fn discard(&self, id: u64) {
        self.waiters.lock().await.remove(&id);
    }

    #[cfg(test)]
    pub async fn pending(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use ymir_types::VersionedValue;

    use super::*;

    fn outcome(version: u64) -> AppliedOutcome {
        AppliedOutcome {
            value: VersionedValue { value: "v".into(), version },
            success: true,
        }
    }

    #[tokio::test]
    async fn fulfill_unblocks_registered_waiter() {
        let correlator = Correlator::new();
        let rx = correlator.register(1).await;
        correlator.fulfill(1, outcome(1)).await;
        assert_eq!(rx.await.unwrap(), outcome(1));
        assert_eq!(correlator.pending().await, 0);
    }

    #[tokio::test]
    async fn fulfill_without_waiter_is_a_noop() {
        let correlator = Correlator::new();
        correlator.fulfill(99, outcome(1)).await;
    }

    #[tokio::test]
    async fn fulfill_after_waiter_dropped_is_discarded() {
        let correlator = Correlator::new();
        let rx = correlator.register(5).await;
        drop(rx);
        correlator.fulfill(5, outcome(1)).await;
        assert_eq!(correlator.pending().await, 0);
    }

    #[tokio::test]
    async fn discard_removes_registration() {
        let correlator = Correlator::new();
        let _rx = correlator.register(3).await;
        correlator.discard(3).await;
        assert_eq!(correlator.pending().await, 0);
    }

    #[tokio::test]
    #[should_panic(expected = "registered twice")]
    async fn duplicate_register_panics() {
        let correlator = Correlator::new();
        let _a = correlator.register(7).await;
        let _b = correlator.register(7).await;
    }
}
