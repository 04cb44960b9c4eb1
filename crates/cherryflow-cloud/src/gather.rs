//! Read-only resource queries

use crate::error::{CloudError, Result};
use crate::field::DesiredSpec;
use crate::gateway::Gateway;
use crate::kind::ResourceKind;
use crate::observed::{ObservedResource, ResourceId};
use serde_json::Value;

/// Filter for listing existing resources
///
/// `filters` fields must all match after normalization; a `tags` filter
/// matches every resource carrying at least those tags.
#[derive(Debug, Clone, Default)]
pub struct GatherQuery {
    pub id: Option<ResourceId>,
    /// Parent scope (project or team ID) to list within
    pub scope: Option<String>,
    pub filters: DesiredSpec,
}

impl GatherQuery {
    pub fn by_id(id: impl Into<ResourceId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn in_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..Default::default()
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters = self.filters.with(key, value);
        self
    }
}

/// List resources of one kind matching a query
pub async fn gather(
    gateway: &Gateway,
    kind: &dyn ResourceKind,
    query: &GatherQuery,
) -> Result<Vec<ObservedResource>> {
    let schema = kind.schema();

    let candidates = if let Some(id) = &query.id {
        let found = gateway
            .fetch(kind, id)
            .await?
            .filter(|observed| kind.include_in_listing(observed));
        match found {
            Some(observed) => vec![observed],
            None => {
                return Err(CloudError::NotFound {
                    kind: schema.kind.to_string(),
                    id: id.to_string(),
                });
            }
        }
    } else {
        if let (Some(scope_field), None) = (schema.identity.scope, &query.scope) {
            return Err(CloudError::Validation(format!(
                "listing {} resources requires an id or {}",
                schema.kind, scope_field
            )));
        }
        gateway.list(kind, query.scope.as_deref()).await?
    };

    Ok(candidates
        .into_iter()
        .filter(|observed| matches_filters(kind, &query.filters, observed))
        .collect())
}

fn matches_filters(
    kind: &dyn ResourceKind,
    filters: &DesiredSpec,
    observed: &ObservedResource,
) -> bool {
    let schema = kind.schema();
    filters.iter().all(|(field, wanted)| {
        if wanted.is_null() {
            return true;
        }
        if field == "tags" {
            return tags_contain(observed.get("tags"), wanted);
        }
        schema
            .normalizer_for(field)
            .equivalent(wanted, &observed.comparable(field))
    })
}

fn tags_contain(observed: Option<&Value>, wanted: &Value) -> bool {
    let (Some(Value::Object(have)), Value::Object(want)) = (observed, wanted) else {
        return false;
    };
    want.iter().all(|(key, value)| have.get(key) == Some(value))
}
