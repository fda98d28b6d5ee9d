pub mod engine;
pub mod state;
pub mod triggers;

pub use engine::ReconciliationEngine;
pub use state::{PassOutcome, PassSummary, SkipReason, TriggerSource};
pub use triggers::{run_guarded, TriggerSources};
