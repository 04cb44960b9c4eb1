//! Resource kind abstraction
//!
//! Every managed resource type implements [`ResourceKind`]. Most of a kind
//! is static data in its [`ResourceSchema`]; the trait methods cover the
//! parts that need code: decoding API bodies, cross-field validation and
//! planning side effects.

use crate::diff::ChangeSet;
use crate::error::Result;
use crate::field::DesiredSpec;
use crate::gateway::Gateway;
use crate::observed::ObservedResource;
use crate::operation::Operation;
use crate::schema::ResourceSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target state requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    /// The resource exists with the desired fields
    #[default]
    Present,
    /// The resource does not exist
    Absent,
    /// Present, and the provider reports it as running
    Active,
    /// Present and attached to its target
    Attached,
    /// Present and not attached to anything
    Detached,
}

impl DesiredState {
    pub fn is_absent(self) -> bool {
        matches!(self, DesiredState::Absent)
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
            DesiredState::Active => write!(f, "active"),
            DesiredState::Attached => write!(f, "attached"),
            DesiredState::Detached => write!(f, "detached"),
        }
    }
}

impl std::str::FromStr for DesiredState {
    type Err = crate::error::CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            "active" => Ok(DesiredState::Active),
            "attached" => Ok(DesiredState::Attached),
            "detached" => Ok(DesiredState::Detached),
            other => Err(crate::error::CloudError::Validation(format!(
                "unknown state: {other}"
            ))),
        }
    }
}

/// Condition the waiter polls for after an operation
#[derive(Debug, Clone, Copy)]
pub struct Convergence {
    /// What is being waited for, for log lines
    pub description: &'static str,
    pub predicate: fn(&ObservedResource) -> bool,
}

impl Convergence {
    pub fn is_met(&self, observed: &ObservedResource) -> bool {
        (self.predicate)(observed)
    }
}

/// Everything a kind sees while planning
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub desired: &'a DesiredSpec,
    pub state: DesiredState,
    /// `None` when the resource does not exist yet
    pub observed: Option<&'a ObservedResource>,
}

impl<'a> PlanContext<'a> {
    pub fn new(
        desired: &'a DesiredSpec,
        state: DesiredState,
        observed: Option<&'a ObservedResource>,
    ) -> Self {
        Self {
            desired,
            state,
            observed,
        }
    }

    pub fn is_creating(&self) -> bool {
        self.observed.is_none() && !self.state.is_absent()
    }
}

/// A manageable resource type
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Static field, identity and endpoint declarations
    fn schema(&self) -> &ResourceSchema;

    /// Turn an API body into the canonical observed form
    fn normalize(&self, raw: Value) -> Result<ObservedResource>;

    /// Cross-field and state checks; runs before any mutation
    fn validate(&self, _ctx: &PlanContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Operations for a context and its field changes, in any order
    fn build_operations(
        &self,
        ctx: &PlanContext<'_>,
        changes: &ChangeSet,
    ) -> Result<Vec<Operation>> {
        Ok(default_operations(self.schema(), ctx, changes))
    }

    /// What the reconciler waits for after create/reinstall in a given state
    fn convergence(&self, _state: DesiredState) -> Option<Convergence> {
        None
    }

    /// Whether a listed entry belongs to this kind
    fn include_in_listing(&self, _observed: &ObservedResource) -> bool {
        true
    }

    /// Remote checks before a create is planned
    async fn preflight_create(&self, _ctx: &PlanContext<'_>, _gateway: &Gateway) -> Result<()> {
        Ok(())
    }
}

/// Create, basic update or delete, with no side effects
pub fn default_operations(
    schema: &ResourceSchema,
    ctx: &PlanContext<'_>,
    changes: &ChangeSet,
) -> Vec<Operation> {
    match (ctx.state.is_absent(), ctx.observed) {
        (true, Some(_)) => vec![Operation::Delete],
        (true, None) => Vec::new(),
        (false, None) => vec![Operation::Create {
            payload: schema.create_payload(ctx.desired),
        }],
        (false, Some(_)) => basic_update(schema, changes).into_iter().collect(),
    }
}

/// Basic update for the changed basic fields, if any
pub fn basic_update(schema: &ResourceSchema, changes: &ChangeSet) -> Option<Operation> {
    if changes.basic.is_empty() {
        return None;
    }
    Some(Operation::BasicUpdate {
        payload: schema.update_payload(&changes.basic),
    })
}
