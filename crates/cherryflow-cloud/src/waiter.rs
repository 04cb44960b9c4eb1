//! Convergence waiter
//!
//! Polls a resource until a convergence predicate holds, the deadline
//! passes, or reads fail too many times in a row.

use crate::error::{CloudError, Result};
use crate::gateway::Gateway;
use crate::kind::{Convergence, ResourceKind};
use crate::observed::{ObservedResource, ResourceId};
use std::time::Duration;
use tokio::time::Instant;

/// Polling behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    /// Overall deadline, measured from the first poll
    pub timeout: Duration,
    /// Read failures tolerated in a row before giving up
    pub max_consecutive_failures: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1800),
            max_consecutive_failures: 5,
        }
    }
}

impl WaitPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Poll `id` until `convergence` holds
///
/// A resource that is briefly not found while it is being provisioned
/// counts as a failed read, not as a terminal answer.
pub async fn wait_for(
    gateway: &Gateway,
    kind: &dyn ResourceKind,
    id: &ResourceId,
    convergence: &Convergence,
    policy: &WaitPolicy,
) -> Result<ObservedResource> {
    let schema = kind.schema();
    let deadline = Instant::now() + policy.timeout;
    let mut failures = 0u32;
    let mut last_status: Option<String> = None;

    tracing::info!(
        "{} {}: waiting for {} (timeout {:?})",
        schema.kind,
        id,
        convergence.description,
        policy.timeout
    );

    let timed_out = |last_status: Option<String>| CloudError::ConvergenceTimeout {
        kind: schema.kind.to_string(),
        id: id.to_string(),
        timeout: policy.timeout,
        last_status,
    };

    loop {
        let poll = match tokio::time::timeout_at(deadline, gateway.fetch(kind, id)).await {
            Ok(poll) => poll,
            Err(_) => return Err(timed_out(last_status)),
        };

        match poll {
            Ok(Some(observed)) => {
                failures = 0;
                if convergence.is_met(&observed) {
                    tracing::info!("{} {}: {}", schema.kind, id, convergence.description);
                    return Ok(observed);
                }
                last_status = observed.status().map(str::to_string);
                tracing::debug!(
                    "{} {}: status {:?}, still waiting",
                    schema.kind,
                    id,
                    last_status
                );
            }
            Ok(None) => {
                failures += 1;
                tracing::warn!(
                    "{} {}: not found while waiting ({}/{})",
                    schema.kind,
                    id,
                    failures,
                    policy.max_consecutive_failures
                );
                if failures >= policy.max_consecutive_failures {
                    return Err(CloudError::NotFound {
                        kind: schema.kind.to_string(),
                        id: id.to_string(),
                    });
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    "{} {}: poll failed ({}/{}): {}",
                    schema.kind,
                    id,
                    failures,
                    policy.max_consecutive_failures,
                    e
                );
                if failures >= policy.max_consecutive_failures {
                    return Err(e);
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(last_status));
        }
        tokio::time::sleep(policy.poll_interval.min(deadline - now)).await;
    }
}
