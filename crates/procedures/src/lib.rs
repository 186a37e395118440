pub mod builder;
pub mod executor;
pub mod manager;
pub mod queue;
pub mod scheduler;

pub use builder::{ProcedureBuildResult, ProcedureBuilder, StepSpec};
pub use executor::{DagExecutor, ExecutionOutcome, StepResult};
pub use manager::ProcedureManager;
pub use queue::TaskQueueManager;
pub use scheduler::{Scheduler, TimeRule};
