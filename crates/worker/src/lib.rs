//! Job worker runtime.
//!
//! Subscribes to one job type on the gateway and hands activated jobs to a
//! [`JobHandler`], bounded by the configured concurrency.

#![warn(missing_docs)]

pub mod config;
pub mod handler;
pub mod worker;

pub use config::{default_worker_name, BackoffConfig, WorkerConfig};
pub use handler::{GatewayJobClient, HandlerError, JobClient, JobHandler};
pub use worker::{JobWorker, JobWorkerBuilder, WorkerError};
