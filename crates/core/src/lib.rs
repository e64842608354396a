//! DoMath core data models.
//!
//! Jobs as delivered by the orchestration engine, the variables DoMath jobs
//! carry, and the terminal commands a worker answers with.

#![warn(missing_docs)]

// Identities
mod id;

// Jobs and their payloads
mod job;
mod variables;

// Worker replies
mod command;

// Re-exports
pub use id::JobKey;
pub use job::{FailureKind, Job, JobError};
pub use variables::MathVariables;
pub use command::{CompleteJobCommand, FailJobCommand};

/// Job type served by the DoMath worker.
pub const JOB_TYPE: &str = "DoMathTask";
