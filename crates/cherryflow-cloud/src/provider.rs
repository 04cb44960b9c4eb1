//! Cloud provider trait definition

use crate::error::Result;
use crate::gather::GatherQuery;
use crate::observed::ObservedResource;
use crate::reconciler::{ReconcileOutcome, ReconcileRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud provider abstraction trait
///
/// A provider owns the transport and the set of resource kinds it can
/// manage, addressed by name (e.g. "server", "floating-ip").
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "cherry-servers")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Resource kinds this provider manages
    fn resource_types(&self) -> &[&'static str];

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Converge one resource to the requested state
    async fn reconcile(
        &self,
        resource_type: &str,
        request: &ReconcileRequest,
    ) -> Result<ReconcileOutcome>;

    /// List existing resources without changing anything
    async fn gather(
        &self,
        resource_type: &str,
        query: &GatherQuery,
    ) -> Result<Vec<ObservedResource>>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
