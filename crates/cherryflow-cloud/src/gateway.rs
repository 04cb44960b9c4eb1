//! Resource gateway
//!
//! Executes operations against a [`Transport`] using the endpoint table of
//! a resource kind. Status codes are classified per endpoint: accepted
//! codes yield the body, not-found codes yield `None`, anything else is an
//! [`CloudError::UnexpectedStatus`].

use crate::error::{CloudError, Result};
use crate::kind::ResourceKind;
use crate::observed::{ObservedResource, ResourceId};
use crate::operation::{Operation, SideEffectKind};
use crate::transport::{ApiRequest, Method, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One API endpoint
///
/// `path` may contain `{id}` (the resource ID) and `{scope}` (the parent
/// ID, such as a project or team).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: Method,
    pub path: &'static str,
    pub timeout: Duration,
    /// Status codes that mean success
    pub accepted: &'static [u16],
    /// Status codes that mean "no such resource"
    pub not_found: &'static [u16],
}

impl RequestTemplate {
    pub const fn new(
        method: Method,
        path: &'static str,
        timeout: Duration,
        accepted: &'static [u16],
    ) -> Self {
        Self {
            method,
            path,
            timeout,
            accepted,
            not_found: &[],
        }
    }

    pub const fn not_found_on(mut self, codes: &'static [u16]) -> Self {
        self.not_found = codes;
        self
    }

    /// Substitute `{id}` and `{scope}` into the path
    pub fn render(&self, id: Option<&ResourceId>, scope: Option<&str>) -> Result<String> {
        let mut path = self.path.to_string();
        if path.contains("{id}") {
            let id = id.ok_or_else(|| {
                CloudError::Validation(format!("{} needs a resource id", self.path))
            })?;
            path = path.replace("{id}", id.as_str());
        }
        if path.contains("{scope}") {
            let scope = scope.ok_or_else(|| {
                CloudError::Validation(format!("{} needs a parent scope id", self.path))
            })?;
            path = path.replace("{scope}", scope);
        }
        Ok(path)
    }
}

/// Endpoint table of a resource kind
#[derive(Debug)]
pub struct Endpoints {
    pub get: RequestTemplate,
    /// `None` when the kind can only be looked up by ID
    pub list: Option<RequestTemplate>,
    pub create: RequestTemplate,
    pub update: RequestTemplate,
    pub delete: RequestTemplate,
    pub side_effects: &'static [(SideEffectKind, RequestTemplate)],
}

impl Endpoints {
    pub fn side_effect(&self, kind: SideEffectKind) -> Option<&RequestTemplate> {
        self.side_effects
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, template)| template)
    }

    pub fn for_operation(&self, operation: &Operation) -> Result<&RequestTemplate> {
        match operation {
            Operation::Create { .. } => Ok(&self.create),
            Operation::BasicUpdate { .. } => Ok(&self.update),
            Operation::Delete => Ok(&self.delete),
            Operation::SideEffect { kind, .. } => self.side_effect(*kind).ok_or_else(|| {
                CloudError::Validation(format!("no endpoint for side effect {kind}"))
            }),
        }
    }
}

/// Typed access to a provider API
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send one request and classify the response status
    pub async fn call(
        &self,
        kind: &str,
        operation: &str,
        template: &RequestTemplate,
        path: String,
        payload: Option<Value>,
    ) -> Result<Option<Value>> {
        let mut request = ApiRequest::new(template.method, path, template.timeout);
        if let Some(payload) = payload {
            request = request.with_payload(payload);
        }

        tracing::debug!(
            "{} {} {} ({})",
            kind,
            request.method,
            request.path,
            operation
        );

        let response =
            self.transport
                .send(&request)
                .await
                .map_err(|e| CloudError::Transport {
                    operation: operation.to_string(),
                    kind: kind.to_string(),
                    message: e.to_string(),
                })?;

        if template.accepted.contains(&response.status) {
            Ok(Some(response.body))
        } else if template.not_found.contains(&response.status) {
            tracing::debug!(
                "{} {}: status {} treated as not found",
                kind,
                operation,
                response.status
            );
            Ok(None)
        } else {
            Err(CloudError::UnexpectedStatus {
                operation: operation.to_string(),
                kind: kind.to_string(),
                status: response.status,
                message: response.message(),
            })
        }
    }

    /// Fetch one resource by ID
    pub async fn fetch(
        &self,
        kind: &dyn ResourceKind,
        id: &ResourceId,
    ) -> Result<Option<ObservedResource>> {
        let schema = kind.schema();
        let template = &schema.endpoints.get;
        let path = template.render(Some(id), None)?;

        match self.call(schema.kind, "get", template, path, None).await? {
            Some(body) => kind.normalize(body).map(Some),
            None => Ok(None),
        }
    }

    /// List resources, optionally within a parent scope
    ///
    /// Entries the kind does not consider part of its listing are dropped.
    pub async fn list(
        &self,
        kind: &dyn ResourceKind,
        scope: Option<&str>,
    ) -> Result<Vec<ObservedResource>> {
        let schema = kind.schema();
        let template = schema.endpoints.list.as_ref().ok_or_else(|| {
            CloudError::Validation(format!("{} resources cannot be listed", schema.kind))
        })?;
        let path = template.render(None, scope)?;

        let body = self
            .call(schema.kind, "list", template, path, None)
            .await?
            .unwrap_or(Value::Array(Vec::new()));

        let Value::Array(items) = body else {
            return Err(CloudError::InvalidResponse {
                kind: schema.kind.to_string(),
                message: "list response is not an array".to_string(),
            });
        };

        let mut resources = Vec::with_capacity(items.len());
        for item in items {
            let observed = kind.normalize(item)?;
            if kind.include_in_listing(&observed) {
                resources.push(observed);
            }
        }
        Ok(resources)
    }

    /// Run one planned operation; returns the response body (`null` if none)
    pub async fn execute(
        &self,
        kind: &dyn ResourceKind,
        operation: &Operation,
        id: Option<&ResourceId>,
        scope: Option<&str>,
    ) -> Result<Value> {
        let schema = kind.schema();
        let template = schema.endpoints.for_operation(operation)?;
        let path = template.render(id, scope)?;
        let payload = operation
            .payload()
            .filter(|payload| !payload.is_empty())
            .map(|payload| Value::Object(payload.clone()));

        let label = operation.label();
        tracing::info!("{}: {}", schema.kind, operation);

        Ok(self
            .call(schema.kind, &label, template, path, payload)
            .await?
            .unwrap_or(Value::Null))
    }
}
