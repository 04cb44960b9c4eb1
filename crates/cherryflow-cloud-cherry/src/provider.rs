//! Cherry Servers provider implementation

use crate::client::{self, HttpTransport};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::resources::ResourceType;
use async_trait::async_trait;
use cherryflow_cloud::gather::gather;
use cherryflow_cloud::{
    AuthStatus, CloudError, CloudProvider, GatherQuery, Gateway, ObservedResource,
    ReconcileOutcome, ReconcileRequest, Reconciler, Transport,
};
use std::sync::Arc;

/// Cherry Servers provider
pub struct CherryProvider {
    transport: Arc<dyn Transport>,
}

impl CherryProvider {
    /// Build a provider without contacting the API
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build a provider and verify the token before returning it
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let provider = Self::new(config)?;
        let auth = client::check_auth(provider.transport.as_ref()).await?;
        tracing::info!(
            "Authenticated with Cherry Servers as {}",
            auth.account_info.as_deref().unwrap_or("Unknown")
        );
        Ok(provider)
    }

    /// Reconciler for one resource type, sharing the provider's transport
    pub fn reconciler(&self, resource_type: ResourceType) -> Reconciler {
        Reconciler::new(resource_type.kind(), self.transport.clone())
    }
}

#[async_trait]
impl CloudProvider for CherryProvider {
    fn name(&self) -> &str {
        "cherry-servers"
    }

    fn display_name(&self) -> &str {
        "Cherry Servers"
    }

    fn resource_types(&self) -> &[&'static str] {
        &ResourceType::NAMES
    }

    async fn check_auth(&self) -> cherryflow_cloud::Result<AuthStatus> {
        match client::check_auth(self.transport.as_ref()).await {
            Ok(status) => Ok(status),
            Err(CloudError::AuthenticationFailed(message)) => Ok(AuthStatus::failed(message)),
            Err(e) => Err(e),
        }
    }

    async fn reconcile(
        &self,
        resource_type: &str,
        request: &ReconcileRequest,
    ) -> cherryflow_cloud::Result<ReconcileOutcome> {
        let resource_type: ResourceType = resource_type.parse()?;
        tracing::info!("Reconciling {} (state={})", resource_type, request.state);

        self.reconciler(resource_type).reconcile(request).await
    }

    async fn gather(
        &self,
        resource_type: &str,
        query: &GatherQuery,
    ) -> cherryflow_cloud::Result<Vec<ObservedResource>> {
        let resource_type: ResourceType = resource_type.parse()?;
        let kind = resource_type.kind();
        let gateway = Gateway::new(self.transport.clone());

        let resources = gather(&gateway, kind.as_ref(), query).await?;
        tracing::debug!("Gathered {} {} resource(s)", resources.len(), resource_type);
        Ok(resources)
    }
}
