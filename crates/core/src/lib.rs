pub mod error;
pub mod model;

pub use error::{AgentError, AgentResult};
pub use model::{centroid, cosine_similarity, rel, Edge, Node, Provenance};
