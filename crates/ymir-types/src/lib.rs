pub type NodeId = u64;

/// Current committed value of one key, plus the number of successful writes
/// ever applied to it. Version 0 means the key has never been written.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionedValue {
    pub value: String,
    pub version: u64,
}

/// A write proposed through the replicated log (serialized by ymir-state's
/// codec). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WriteIntent {
    pub key: String,
    pub value: String,
    /// Version the caller last observed for the key; the write lands only if
    /// this still matches at application time.
    pub expected_version: u64,
    /// Process-unique token linking the intent back to its waiting caller.
    pub correlation_id: u64,
}

/// Result of applying one `WriteIntent`, delivered exactly once to the caller
/// that proposed it. On rejection `value` carries the current authoritative
/// value so the caller can retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOutcome {
    pub value: VersionedValue,
    pub success: bool,
}

/// Membership change forwarded to the consensus collaborator. This core never
/// applies these; it only relays them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConfChange {
    AddNode { node_id: NodeId, address: String },
    RemoveNode { node_id: NodeId },
}

/// Failures surfaced by the state-machine core.
///
/// Optimistic-write conflicts and missing keys are values, never errors.
/// `Corruption` and `Log` are unrecoverable: the node supervisor turns them
/// into process termination rather than serving unknown state.
#[derive(thiserror::Error, Debug)]
pub enum YmirError {
    #[error("corrupt committed data: {0}")]
    Corruption(String),
    #[error("snapshot storage error: {0}")]
    Storage(String),
    #[error("consensus log failed: {0}")]
    Log(String),
}
