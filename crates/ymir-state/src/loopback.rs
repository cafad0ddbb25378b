use tokio::sync::{mpsc, oneshot};

use crate::log::{CommitBatch, CommitReceiver, ErrorReceiver, LogEvent, ProposeSender};

const CHANNEL_CAPACITY: usize = 64;

/// In-process stand-in for the consensus collaborator: every proposal is
/// echoed straight back as a single-entry commit batch, preserving order.
///
/// Used for single-node operation and tests. The echo task honors the batch
/// acknowledgment before forwarding the next proposal, exercising the same
/// backpressure contract a real log implementation would.
pub struct LoopbackLog {
    pub propose_tx: ProposeSender,
    pub commit_rx: CommitReceiver,
    pub error_rx: ErrorReceiver,
}

impl LoopbackLog {
    pub fn spawn() -> Self {
        let (propose_tx, mut propose_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (commit_tx, commit_rx) = mpsc::channel::<LogEvent>(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = oneshot::channel();

        tokio::spawn(async move {
            // Dropped on exit without a value: clean shutdown, no terminal
            // collaborator error to report.
            let _error_tx = error_tx;
            while let Some(payload) = propose_rx.recv().await {
                let (done_tx, done_rx) = oneshot::channel();
                let batch = CommitBatch { entries: vec![payload], done: done_tx };
                if commit_tx.send(LogEvent::Apply(batch)).await.is_err() {
                    break;
                }
                if done_rx.await.is_err() {
                    break;
                }
            }
            tracing::debug!("loopback log shutting down");
        });

        LoopbackLog { propose_tx, commit_rx, error_rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn proposals_come_back_in_order() {
        let LoopbackLog { propose_tx, mut commit_rx, error_rx: _error_rx } =
            LoopbackLog::spawn();

        let feeder = tokio::spawn(async move {
            for i in 0..10u8 {
                propose_tx.send(vec![i]).await.unwrap();
            }
        });

        for i in 0..10u8 {
            match commit_rx.recv().await.unwrap() {
                LogEvent::Apply(batch) => {
                    assert_eq!(batch.entries, vec![vec![i]]);
                    batch.done.send(()).unwrap();
                }
                LogEvent::Reload => panic!("loopback never sends reload"),
            }
        }
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_propose_side_closes_commit_stream() {
        let LoopbackLog { propose_tx, mut commit_rx, error_rx } = LoopbackLog::spawn();
        drop(propose_tx);
        assert!(commit_rx.recv().await.is_none());
        // No terminal error on clean shutdown.
        assert!(error_rx.await.is_err());
    }
}
