//! Gateway access for DoMath workers.
//!
//! This crate provides a trait-based gateway interface with a REST
//! implementation and OAuth client-credentials support.

#![warn(missing_docs)]

pub mod trait_;
pub mod types;
pub mod config;
pub mod auth;
pub mod rest;

pub use trait_::{GatewayClient, GatewayError, Result};
pub use types::{ActivateJobsRequest, BrokerInfo, Topology};
pub use config::{ClientConfig, OAuthConfig};
pub use auth::OAuthTokenProvider;
pub use rest::RestGatewayClient;
