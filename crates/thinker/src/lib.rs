pub mod classifier;
pub mod parser;

pub use classifier::{classify, Classification};
pub use parser::{
    confidence_score, extract_event_fields, extract_query_fields, extract_task_fields,
    infer_intent, is_obvious_intent, quick_parse, Intent,
};
