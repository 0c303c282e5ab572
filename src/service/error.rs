use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::models::JobStatus;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider_id} unreachable: {reason}")]
    ProviderUnreachable { provider_id: String, reason: String },

    #[error("connection to cluster {cluster} failed: {reason}")]
    ClusterConnectionFailed { cluster: String, reason: String },

    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("{unit} timed out after {after:?}")]
    UnitTimedOut { unit: String, after: Duration },

    #[error("scan of {unit} failed: {source}")]
    UnitFailed {
        unit: String,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("provider api error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Api(error.to_string())
    }
}

/// Reasons a forced release is refused. Checked before anything is written.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PolicyViolation {
    #[error("cannot force release while target {target_id} is locked (since {locked_at})")]
    TargetLocked {
        target_id: String,
        locked_at: DateTime<Utc>,
    },

    #[error("cannot force release while job {job_id} is {status}")]
    JobNotSupersedable { job_id: String, status: JobStatus },

    #[error("environment {environment_id} is deleted")]
    EnvironmentDeleted { environment_id: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    #[error("{model} {id} not found")]
    NotFound { model: &'static str, id: String },

    #[error("job {job_id} can't move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {job_id} changed while being updated")]
    ConcurrentUpdate { job_id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn not_found(model: &'static str, id: &str) -> Self {
        DispatchError::NotFound {
            model,
            id: id.to_string(),
        }
    }
}
