mod replication;
mod runtime;

pub use replication::WorkingMemoryReplicaClient;
pub use runtime::Runtime;
