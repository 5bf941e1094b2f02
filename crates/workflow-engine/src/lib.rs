mod engine;
mod error;
mod ids;
mod notifier;
mod steps;

pub use engine::{AttemptInfo, WorkflowEngine};
pub use error::{WorkflowError, WorkflowResult};
pub use ids::master_reference_for;
pub use notifier::{LoggingNotifier, Notifier};
