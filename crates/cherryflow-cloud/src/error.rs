//! Reconciliation error types

use crate::observed::ResourceId;
use std::time::Duration;
use thiserror::Error;

/// Reconciliation errors
///
/// A resource that does not exist is never an error on its own; lookups
/// return `Ok(None)` and the reconciler decides what absence means.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(
        "{kind}: identity matches {} resources ({}), refusing to guess",
        .matches.len(),
        join_ids(.matches)
    )]
    AmbiguousIdentity {
        kind: String,
        matches: Vec<ResourceId>,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} {operation} failed in transport: {message}")]
    Transport {
        operation: String,
        kind: String,
        message: String,
    },

    #[error("{kind} {operation} returned unexpected status {status}: {message}")]
    UnexpectedStatus {
        operation: String,
        kind: String,
        status: u16,
        message: String,
    },

    #[error(
        "{kind} {id} did not converge within {timeout:?} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    ConvergenceTimeout {
        kind: String,
        id: String,
        timeout: Duration,
        last_status: Option<String>,
    },

    #[error("{kind} {operation} failed after {completed} completed operation(s): {source}")]
    ApplyFailed {
        kind: String,
        operation: String,
        completed: usize,
        #[source]
        source: Box<CloudError>,
    },

    #[error("{kind}: unexpected response body: {message}")]
    InvalidResponse { kind: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Unwraps `ApplyFailed` down to the error that stopped the apply.
    pub fn root_cause(&self) -> &CloudError {
        match self {
            CloudError::ApplyFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// HTTP status carried by the root cause, if any.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            CloudError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

fn join_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ResourceId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
