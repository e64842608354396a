//! Request and response shapes of the gateway REST API.

use std::time::Duration;

use domath_core::Job;
use serde::{Deserialize, Serialize};

/// Job activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateJobsRequest {
    /// Job type to activate
    pub job_type: String,

    /// Worker name recorded on activated jobs
    pub worker: String,

    /// How long activated jobs stay locked to this worker
    pub timeout: Duration,

    /// Upper bound of jobs returned
    pub max_jobs_to_activate: u32,

    /// Long-poll duration on the gateway side
    pub request_timeout: Duration,

    /// Variables to fetch; `None` fetches all
    pub fetch_variables: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivateJobsBody<'a> {
    #[serde(rename = "type")]
    pub job_type: &'a str,
    pub worker: &'a str,
    pub timeout: u64,
    pub max_jobs_to_activate: u32,
    pub request_timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_variable: Option<&'a [String]>,
}

impl<'a> From<&'a ActivateJobsRequest> for ActivateJobsBody<'a> {
    fn from(request: &'a ActivateJobsRequest) -> Self {
        Self {
            job_type: &request.job_type,
            worker: &request.worker,
            timeout: request.timeout.as_millis() as u64,
            max_jobs_to_activate: request.max_jobs_to_activate,
            request_timeout: request.request_timeout.as_millis() as u64,
            fetch_variable: request.fetch_variables.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivateJobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompleteJobBody<'a> {
    pub variables: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FailJobBody<'a> {
    pub retries: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_back_off: Option<u64>,
}

/// Cluster topology as reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Known brokers
    #[serde(default)]
    pub brokers: Vec<BrokerInfo>,

    /// Number of brokers in the cluster
    #[serde(default)]
    pub cluster_size: u32,

    /// Number of partitions
    #[serde(default)]
    pub partitions_count: u32,

    /// Replication factor
    #[serde(default)]
    pub replication_factor: u32,

    /// Gateway version
    #[serde(default)]
    pub gateway_version: String,
}

/// A broker in the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerInfo {
    /// Broker node id
    #[serde(default)]
    pub node_id: i32,

    /// Host name
    #[serde(default)]
    pub host: String,

    /// Port
    #[serde(default)]
    pub port: u16,

    /// Broker version
    #[serde(default)]
    pub version: String,
}
