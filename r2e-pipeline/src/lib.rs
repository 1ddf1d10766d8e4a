//! C4 Middleware/Guard Pipeline (spec.md §4.4): ordered chain execution
//! with short-circuit, abort and error semantics.

mod guard;
mod pipeline;
mod step;

pub use guard::{FnGuard, Guard, GuardOutcome};
pub use pipeline::{Pipeline, PipelineError};
pub use step::CompiledStep;
