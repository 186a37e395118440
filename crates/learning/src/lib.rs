pub mod analysis;
pub mod knowledge;

pub use analysis::{analyze_failure, FailureAnalysis, SuggestedFix};
pub use knowledge::{find_similar_knowledge, learn_from_success, learn_from_user_feedback};
