pub mod events;
pub mod peal;
pub mod request;

pub use events::{EventBus, PealEvent};
pub use peal::PealEngine;
pub use request::{AgentResponse, ResponseStatus};
