pub mod ksg;
pub mod replicator;
pub mod store;
pub mod working_memory;

pub use ksg::{proto, Fingerprint, KnowShowGo, PatternMatch, TransferResult};
pub use replicator::{AsyncReplicator, EdgeUpdate, GraphClient};
pub use store::{InMemoryMemoryStore, MemoryStore, SearchHit};
pub use working_memory::WorkingMemoryGraph;
