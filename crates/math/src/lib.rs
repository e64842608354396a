//! DoMath job handling.
//!
//! Reads `{add, count}` from a job, adds `add` into `count` and completes the
//! job with the result. Jobs that cannot be read are failed with one retry
//! consumed.

#![warn(missing_docs)]

pub mod handler;

pub use handler::MathJobHandler;
pub use domath_core::JOB_TYPE;
