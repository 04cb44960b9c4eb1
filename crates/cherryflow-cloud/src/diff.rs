//! Diff engine
//!
//! Compares a desired spec with an observed resource field by field and
//! asks the kind to turn the differences into an [`OperationPlan`].

use crate::error::{CloudError, Result};
use crate::field::{DesiredSpec, Field};
use crate::kind::{PlanContext, ResourceKind};
use crate::observed::ObservedResource;
use crate::operation::OperationPlan;
use crate::schema::{FieldRole, ResourceSchema};
use serde_json::{Map, Value};

/// Fields whose desired value differs from the observed one
///
/// Values are the caller's desired values, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Changes the update endpoint can apply
    pub basic: Map<String, Value>,
    /// Changes the kind must turn into side effects
    pub side_effect: Map<String, Value>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.basic.is_empty() && self.side_effect.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.basic.contains_key(field) || self.side_effect.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.basic
            .get(field)
            .or_else(|| self.side_effect.get(field))
    }
}

/// Field-level diff of a desired spec against an observed resource
///
/// Unset fields never produce a change. Create-only fields are reported in
/// the log when they drift but never planned.
pub fn diff_fields(
    schema: &ResourceSchema,
    desired: &DesiredSpec,
    observed: &ObservedResource,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for rule in schema.fields {
        let field = desired.field(rule.name);
        let Some(wanted) = field.comparable() else {
            continue;
        };

        match rule.role {
            FieldRole::CreateOnly => {
                if let Some(current) = observed.get(rule.name) {
                    if !rule.normalizer.equivalent(&wanted, current) {
                        tracing::debug!(
                            "{} {}: {} can only be set at creation, ignoring change",
                            schema.kind,
                            observed.id,
                            rule.name
                        );
                    }
                }
            }
            FieldRole::Untracked => {
                if let Field::Value(value) = field {
                    changes
                        .side_effect
                        .insert(rule.name.to_string(), value.clone());
                }
            }
            FieldRole::Basic | FieldRole::SideEffect => {
                let current = observed.comparable(rule.name);
                if rule.normalizer.equivalent(&wanted, &current) {
                    continue;
                }
                let target = if rule.role == FieldRole::Basic {
                    &mut changes.basic
                } else {
                    &mut changes.side_effect
                };
                target.insert(rule.name.to_string(), wanted);
            }
        }
    }

    changes
}

/// Plan the operations that take the observed resource to the desired state
pub fn plan(kind: &dyn ResourceKind, ctx: &PlanContext<'_>) -> Result<OperationPlan> {
    let schema = kind.schema();

    if ctx.state.is_absent() && ctx.observed.is_none() {
        return Ok(OperationPlan::empty());
    }

    if ctx.is_creating() {
        let missing = ctx.desired.missing(schema.required_for_create);
        if !missing.is_empty() {
            return Err(CloudError::Validation(format!(
                "missing required field(s) for {} creation: {}",
                schema.kind,
                missing.join(", ")
            )));
        }
    }

    kind.validate(ctx)?;

    let changes = match (ctx.state.is_absent(), ctx.observed) {
        (false, Some(observed)) => diff_fields(schema, ctx.desired, observed),
        _ => ChangeSet::default(),
    };

    let operations = kind.build_operations(ctx, &changes)?;
    let reissuing = operations
        .iter()
        .filter(|op| op.side_effect_kind().is_some_and(|k| k.reissues_identity()))
        .count();
    if reissuing > 1 {
        return Err(CloudError::Validation(format!(
            "{}: a plan may change the resource id only once",
            schema.kind
        )));
    }

    Ok(OperationPlan::new(operations))
}
