//! Identity resolution
//!
//! Finds the single remote resource a desired spec refers to. An explicit
//! `id` always wins; otherwise the kind's identity keys are matched against
//! a listing of the parent scope. More than one match is an error, never a
//! guess.

use crate::error::{CloudError, Result};
use crate::field::{DesiredSpec, scalar_to_string};
use crate::gateway::Gateway;
use crate::kind::ResourceKind;
use crate::observed::{ObservedResource, ResourceId};
use crate::schema::ResourceSchema;
use serde::Serialize;
use serde_json::Value;

/// How identity predicates combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every predicate must match
    All,
    /// Any single predicate is enough
    Any,
}

/// Identity declaration of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRules {
    /// Fields that identify a resource when no ID is given
    pub keys: &'static [&'static str],
    /// Desired field holding the parent ID listings are scoped by
    pub scope: Option<&'static str>,
    pub mode: MatchMode,
}

/// Lookup key derived from a desired spec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityKey {
    pub id: Option<ResourceId>,
    pub scope: Option<String>,
    pub predicates: Vec<(String, Value)>,
    pub mode: MatchMode,
}

impl IdentityKey {
    pub fn from_desired(schema: &ResourceSchema, desired: &DesiredSpec) -> Self {
        let rules = &schema.identity;
        let predicates = rules
            .keys
            .iter()
            .filter_map(|key| desired.value(key).map(|v| (key.to_string(), v.clone())))
            .collect();

        Self {
            id: desired.value("id").and_then(ResourceId::from_value),
            scope: rules
                .scope
                .and_then(|field| desired.value(field))
                .and_then(scalar_to_string),
            predicates,
            mode: rules.mode,
        }
    }

    /// Whether a scoped listing is possible for this key
    pub fn can_list(&self, schema: &ResourceSchema) -> bool {
        schema.endpoints.list.is_some() && (schema.identity.scope.is_none() || self.scope.is_some())
    }

    /// Whether the key can identify anything at all
    pub fn is_resolvable(&self, schema: &ResourceSchema) -> bool {
        self.id.is_some() || (!self.predicates.is_empty() && self.can_list(schema))
    }

    /// Match a listed resource against the predicates
    pub fn matches(&self, schema: &ResourceSchema, observed: &ObservedResource) -> bool {
        let mut results = self.predicates.iter().map(|(field, desired)| {
            schema
                .normalizer_for(field)
                .equivalent(desired, &observed.comparable(field))
        });

        match self.mode {
            MatchMode::All => results.all(|matched| matched),
            MatchMode::Any => results.any(|matched| matched),
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        if let Some(id) = &self.id {
            return format!("id={id}");
        }
        let keys: Vec<String> = self
            .predicates
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        keys.join(", ")
    }
}

/// Resolve a desired identity to at most one observed resource
pub async fn resolve(
    gateway: &Gateway,
    kind: &dyn ResourceKind,
    identity: &IdentityKey,
) -> Result<Option<ObservedResource>> {
    let schema = kind.schema();

    if let Some(id) = &identity.id {
        return gateway.fetch(kind, id).await;
    }

    if !identity.is_resolvable(schema) {
        tracing::debug!(
            "{}: no id or usable identity fields, treating as not found",
            schema.kind
        );
        return Ok(None);
    }

    let candidates = gateway.list(kind, identity.scope.as_deref()).await?;
    let mut matched: Vec<ObservedResource> = candidates
        .into_iter()
        .filter(|observed| identity.matches(schema, observed))
        .collect();

    match matched.len() {
        0 => Ok(None),
        1 => Ok(matched.pop()),
        _ => Err(CloudError::AmbiguousIdentity {
            kind: schema.kind.to_string(),
            matches: matched.into_iter().map(|observed| observed.id).collect(),
        }),
    }
}
