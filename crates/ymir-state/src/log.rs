use tokio::sync::{mpsc, oneshot};

use ymir_types::YmirError;

/// One ordered slice of committed entries.
///
/// `done` is the completion acknowledgment the applier raises after the whole
/// batch has been applied; the log collaborator uses it to bound how much it
/// keeps in flight.
#[derive(Debug)]
pub struct CommitBatch {
    pub entries: Vec<Vec<u8>>,
    pub done: oneshot::Sender<()>,
}

/// Inbound events from the consensus collaborator.
///
/// An explicit two-variant enum so dispatch in the applier is exhaustive —
/// no sentinel value doubling as "reload".
#[derive(Debug)]
pub enum LogEvent {
    /// Apply these committed entries, strictly in order.
    Apply(CommitBatch),
    /// Discard current state and restore from the latest snapshot instead.
    Reload,
}

/// Outbound channel carrying opaque serialized `WriteIntent`s into the log.
pub type ProposeSender = mpsc::Sender<Vec<u8>>;

/// Inbound stream of commit batches and reload signals.
pub type CommitReceiver = mpsc::Receiver<LogEvent>;

/// Resolves after the commit stream closes: a value means the collaborator
/// failed permanently (fatal); a dropped sender means clean shutdown.
pub type ErrorReceiver = oneshot::Receiver<YmirError>;
