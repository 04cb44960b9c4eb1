//! Reconciler
//!
//! Drives one resource from its observed state to the desired state:
//!
//! ```text
//! Resolving ─┬─ not found, absent ───────────────────────────► Done
//!            ├─ not found ─► Creating ─┐
//!            └─ found ────► Diffing ───┤
//!                                      ├─ empty plan ────────► Done
//!                                      ├─ check mode ─► CheckModeReport
//!                                      └─► Applying ─► Refetch ─► Done
//! ```
//!
//! Apply is fail-fast: the first failed operation stops the run and is
//! reported together with how many operations had already completed.

use crate::diff;
use crate::error::{CloudError, Result};
use crate::field::{DesiredSpec, scalar_to_string};
use crate::gateway::Gateway;
use crate::identity::{self, IdentityKey, MatchMode};
use crate::kind::{DesiredState, PlanContext, ResourceKind};
use crate::observed::{ObservedResource, ResourceId};
use crate::operation::{Operation, OperationPlan, SideEffectKind};
use crate::schema::ResourceSchema;
use crate::transport::Transport;
use crate::waiter::{self, WaitPolicy};
use serde::Serialize;
use std::sync::Arc;

/// One reconciliation request
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub desired: DesiredSpec,
    pub state: DesiredState,
    /// Plan only; never mutate
    pub check_mode: bool,
    /// Allow operations that reprovision the resource
    pub allow_disruptive: bool,
    pub wait: WaitPolicy,
}

impl ReconcileRequest {
    pub fn new(desired: DesiredSpec, state: DesiredState) -> Self {
        Self {
            desired,
            state,
            check_mode: false,
            allow_disruptive: false,
            wait: WaitPolicy::default(),
        }
    }

    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn allow_disruptive(mut self, allow: bool) -> Self {
        self.allow_disruptive = allow;
        self
    }

    pub fn wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}

/// Result of a reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub changed: bool,
    pub plan: OperationPlan,
    /// Final resource; `None` when it does not exist
    pub resource: Option<ObservedResource>,
}

impl ReconcileOutcome {
    fn unchanged(resource: Option<ObservedResource>) -> Self {
        Self {
            changed: false,
            plan: OperationPlan::empty(),
            resource,
        }
    }
}

/// Reconciler states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Resolving,
    Creating,
    Diffing,
    CheckModeReport,
    Applying,
    Refetch,
    Done,
}

impl std::fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReconcileState::Resolving => "resolving",
            ReconcileState::Creating => "creating",
            ReconcileState::Diffing => "diffing",
            ReconcileState::CheckModeReport => "check-mode report",
            ReconcileState::Applying => "applying",
            ReconcileState::Refetch => "refetch",
            ReconcileState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Reconciles resources of one kind
pub struct Reconciler {
    kind: Arc<dyn ResourceKind>,
    gateway: Gateway,
}

impl Reconciler {
    pub fn new(kind: Arc<dyn ResourceKind>, transport: Arc<dyn Transport>) -> Self {
        Self {
            kind,
            gateway: Gateway::new(transport),
        }
    }

    pub fn kind(&self) -> &dyn ResourceKind {
        self.kind.as_ref()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    fn enter(&self, state: ReconcileState) {
        tracing::debug!("{}: {}", self.kind.schema().kind, state);
    }

    /// Resolve the desired identity without planning anything
    pub async fn resolve(&self, desired: &DesiredSpec) -> Result<Option<ObservedResource>> {
        let identity = IdentityKey::from_desired(self.kind.schema(), desired);
        identity::resolve(&self.gateway, self.kind.as_ref(), &identity).await
    }

    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let kind = self.kind.as_ref();
        let schema = kind.schema();

        self.enter(ReconcileState::Resolving);
        let identity = IdentityKey::from_desired(schema, &request.desired);
        if request.state.is_absent() && !identity.is_resolvable(schema) {
            return Err(CloudError::Validation(format!(
                "state=absent requires enough identity to find the {}: an id{}",
                schema.kind,
                absent_hint(schema)
            )));
        }
        let observed = identity::resolve(&self.gateway, kind, &identity).await?;

        if request.state.is_absent() && observed.is_none() {
            tracing::debug!("{}: {} already absent", schema.kind, identity.describe());
            self.enter(ReconcileState::Done);
            return Ok(ReconcileOutcome::unchanged(None));
        }

        let ctx = PlanContext::new(&request.desired, request.state, observed.as_ref());
        self.enter(if ctx.is_creating() {
            ReconcileState::Creating
        } else {
            ReconcileState::Diffing
        });

        let plan = diff::plan(kind, &ctx)?;
        if ctx.is_creating() {
            kind.preflight_create(&ctx, &self.gateway).await?;
        }
        if plan.is_empty() {
            self.enter(ReconcileState::Done);
            return Ok(ReconcileOutcome::unchanged(observed));
        }

        tracing::info!("{}: {}", schema.kind, plan.summary());

        if request.check_mode {
            self.enter(ReconcileState::CheckModeReport);
            return Ok(ReconcileOutcome {
                changed: true,
                plan,
                resource: None,
            });
        }

        if plan.requires_opt_in() && !request.allow_disruptive {
            return Err(CloudError::Validation(format!(
                "{}: requested changes require reprovisioning, which is not allowed without opting in",
                schema.kind
            )));
        }

        self.enter(ReconcileState::Applying);
        let final_id = self
            .apply(&plan, observed.as_ref().map(|o| o.id.clone()), request)
            .await?;

        self.enter(ReconcileState::Refetch);
        let resource = match final_id {
            Some(id) => Some(self.gateway.fetch(kind, &id).await?.ok_or_else(|| {
                CloudError::InvalidResponse {
                    kind: schema.kind.to_string(),
                    message: format!("{id} vanished after apply"),
                }
            })?),
            None => None,
        };

        self.enter(ReconcileState::Done);
        Ok(ReconcileOutcome {
            changed: true,
            plan,
            resource,
        })
    }

    /// Run a plan in order; returns the ID the resource ends up with
    async fn apply(
        &self,
        plan: &OperationPlan,
        mut current: Option<ResourceId>,
        request: &ReconcileRequest,
    ) -> Result<Option<ResourceId>> {
        let kind = self.kind.as_ref();
        let schema = kind.schema();
        let scope = schema
            .identity
            .scope
            .and_then(|field| request.desired.value(field))
            .and_then(scalar_to_string);

        for (completed, operation) in plan.iter().enumerate() {
            let failed = |source: CloudError| CloudError::ApplyFailed {
                kind: schema.kind.to_string(),
                operation: operation.label(),
                completed,
                source: Box::new(source),
            };

            let body = self
                .gateway
                .execute(kind, operation, current.as_ref(), scope.as_deref())
                .await
                .map_err(failed)?;

            if operation.yields_new_id() {
                let id = body
                    .get("id")
                    .and_then(ResourceId::from_value)
                    .ok_or_else(|| {
                        failed(CloudError::InvalidResponse {
                            kind: schema.kind.to_string(),
                            message: format!("{} response carries no id", operation.label()),
                        })
                    })?;
                if let Some(previous) = &current {
                    tracing::info!("{}: {} is now {}", schema.kind, previous, id);
                }
                current = Some(id);
            }

            if matches!(operation, Operation::Delete) {
                current = None;
                continue;
            }

            if awaits_convergence(operation) {
                if let (Some(id), Some(convergence)) = (&current, kind.convergence(request.state))
                {
                    waiter::wait_for(&self.gateway, kind, id, &convergence, &request.wait)
                        .await
                        .map_err(failed)?;
                }
            }
        }

        Ok(current)
    }
}

fn awaits_convergence(operation: &Operation) -> bool {
    matches!(operation, Operation::Create { .. })
        || operation.side_effect_kind() == Some(SideEffectKind::Reinstall)
}

fn absent_hint(schema: &ResourceSchema) -> String {
    if schema.identity.keys.is_empty() || schema.endpoints.list.is_none() {
        return String::new();
    }
    let keys = match schema.identity.mode {
        MatchMode::All => schema.identity.keys.join(" + "),
        MatchMode::Any => schema.identity.keys.join(" or "),
    };
    match schema.identity.scope {
        Some(scope) => format!(" or {keys} with {scope}"),
        None => format!(" or {keys}"),
    }
}
