pub mod plan;
pub mod templates;

pub use plan::{parse_plan, Plan, PlanStep};
pub use templates::{build_adaptation_messages, build_plan_messages, DEVELOPER_PROMPT, SYSTEM_PROMPT};
