pub mod codec;
pub mod correlator;
pub mod log;
pub mod loopback;
pub mod machine;
pub mod reqid;
pub mod snap;

pub use log::{CommitBatch, CommitReceiver, ErrorReceiver, LogEvent, ProposeSender};
pub use loopback::LoopbackLog;
pub use machine::KvStateMachine;
pub use snap::{FileSnapshotStore, MemSnapshotStore, Snapshot, SnapshotMeta, SnapshotStore};
