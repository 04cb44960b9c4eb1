//! Block storage volumes
//!
//! A volume attaches to at most one server and a server carries at most one
//! volume. Resizing replaces the volume, so the API answers with a new ID.

use super::{Server, payload};
use crate::normalize;
use async_trait::async_trait;
use cherryflow_cloud::kind::{basic_update, default_operations};
use cherryflow_cloud::{
    ChangeSet, CloudError, DesiredSpec, DesiredState, Endpoints, FieldRule, Gateway,
    IdentityRules, MatchMode, Method, Normalizer, ObservedResource, Operation, PlanContext,
    RequestTemplate, ResourceId, ResourceKind, ResourceSchema, Result, SideEffectKind,
};
use serde_json::{Map, Value, json};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(120);

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "storage",
    fields: &[
        FieldRule::create_only("region"),
        FieldRule::create_only("project_id").not_in_create(),
        FieldRule::side_effect("size"),
        FieldRule::basic("description"),
        FieldRule::side_effect("target_server_id")
            .normalized(Normalizer::NullAsZero)
            .not_in_create(),
    ],
    required_for_create: &["project_id", "region", "size"],
    identity: IdentityRules {
        keys: &[],
        scope: Some("project_id"),
        mode: MatchMode::All,
    },
    endpoints: Endpoints {
        get: RequestTemplate::new(Method::Get, "storages/{id}", TIMEOUT, &[200])
            .not_found_on(&[404]),
        list: Some(RequestTemplate::new(
            Method::Get,
            "projects/{scope}/storages",
            TIMEOUT,
            &[200],
        )),
        create: RequestTemplate::new(Method::Post, "projects/{scope}/storages", TIMEOUT, &[201]),
        update: RequestTemplate::new(Method::Put, "storages/{id}", TIMEOUT, &[201]),
        delete: RequestTemplate::new(Method::Delete, "storages/{id}", TIMEOUT, &[204]),
        side_effects: &[
            (
                SideEffectKind::Attach,
                RequestTemplate::new(Method::Post, "storages/{id}/attachments", TIMEOUT, &[201]),
            ),
            (
                SideEffectKind::Detach,
                RequestTemplate::new(
                    Method::Delete,
                    "storages/{id}/attachments",
                    TIMEOUT,
                    &[204],
                ),
            ),
            (
                SideEffectKind::Resize,
                RequestTemplate::new(Method::Put, "storages/{id}", TIMEOUT, &[201]),
            ),
        ],
    },
};

pub struct Storage;

fn requested_target(desired: &DesiredSpec) -> Option<&Value> {
    desired
        .value("target_server_id")
        .filter(|target| Normalizer::NullAsZero.apply(target) != json!(0))
}

fn is_attached(observed: &ObservedResource) -> bool {
    observed.str("state") == Some("attached")
}

fn attach(target: &Value) -> Operation {
    Operation::side_effect(SideEffectKind::Attach, payload(json!({"attach_to": target})))
}

fn detach() -> Operation {
    Operation::side_effect(SideEffectKind::Detach, Map::new())
}

#[async_trait]
impl ResourceKind for Storage {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        normalize::storage(raw)
    }

    fn validate(&self, ctx: &PlanContext<'_>) -> Result<()> {
        let target = requested_target(ctx.desired);
        match ctx.state {
            DesiredState::Absent => return Ok(()),
            DesiredState::Detached if target.is_some() => {
                return Err(CloudError::Validation(
                    "can't use target_server_id with detached storage state".to_string(),
                ));
            }
            DesiredState::Attached if ctx.is_creating() && target.is_none() => {
                return Err(CloudError::Validation(
                    "target_server_id is required if state is attached".to_string(),
                ));
            }
            _ => {}
        }

        if let (Some(observed), Some(size)) = (ctx.observed, ctx.desired.i64("size")) {
            if let Some(current) = observed.i64("size") {
                if size < current {
                    return Err(CloudError::Validation(format!(
                        "storage size cannot be downgraded ({current} -> {size})"
                    )));
                }
            }
        }
        Ok(())
    }

    fn build_operations(
        &self,
        ctx: &PlanContext<'_>,
        changes: &ChangeSet,
    ) -> Result<Vec<Operation>> {
        let Some(observed) = ctx.observed else {
            let mut operations = default_operations(&SCHEMA, ctx, changes);
            if let Some(target) = requested_target(ctx.desired) {
                operations.push(attach(target));
            }
            return Ok(operations);
        };

        if ctx.state.is_absent() {
            let mut operations = Vec::new();
            if is_attached(observed) {
                operations.push(detach());
            }
            operations.push(Operation::Delete);
            return Ok(operations);
        }

        let mut operations = Vec::new();

        let retarget = changes.side_effect.contains_key("target_server_id");
        if is_attached(observed) && (retarget || ctx.state == DesiredState::Detached) {
            operations.push(detach());
        }
        if retarget {
            if let Some(target) = requested_target(ctx.desired) {
                operations.push(attach(target));
            }
        }

        match changes.side_effect.get("size") {
            Some(size) => {
                let mut resize = payload(json!({"size": size}));
                if let Some(description) = changes.basic.get("description") {
                    resize.insert("description".to_string(), description.clone());
                }
                operations.push(Operation::side_effect(SideEffectKind::Resize, resize));
            }
            None => operations.extend(basic_update(&SCHEMA, changes)),
        }

        Ok(operations)
    }

    /// The target server must exist and have no volume yet
    async fn preflight_create(&self, ctx: &PlanContext<'_>, gateway: &Gateway) -> Result<()> {
        let Some(target) = requested_target(ctx.desired).and_then(ResourceId::from_value) else {
            return Ok(());
        };

        match gateway.fetch(&Server, &target).await? {
            None => Err(CloudError::Validation(format!(
                "server {target} does not exist"
            ))),
            Some(server) if server.get("storage_id").is_some() => {
                Err(CloudError::Validation(format!(
                    "target server {target} already has storage attached"
                )))
            }
            Some(_) => Ok(()),
        }
    }
}
