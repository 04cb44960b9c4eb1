//! Floating IPs
//!
//! A floating IP is either routed to another IP or targeted at a server,
//! never both. Targeting goes through the regular update endpoint but is
//! planned as its own side effect so an untarget always runs before delete.

use super::payload;
use crate::normalize;
use async_trait::async_trait;
use cherryflow_cloud::kind::{basic_update, default_operations};
use cherryflow_cloud::{
    ChangeSet, CloudError, DesiredSpec, Endpoints, FieldRule, IdentityRules, MatchMode, Method,
    Normalizer, ObservedResource, Operation, PlanContext, RequestTemplate, ResourceKind,
    ResourceSchema, Result, SideEffectKind,
};
use serde_json::{Value, json};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(120);

const FLOATING_IP_TYPE: &str = "floating-ip";

/// Zone suffix the API appends to A records
const A_RECORD_ZONE: &str = ".cloud.cherryservers.net";

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "floating-ip",
    fields: &[
        FieldRule::create_only("region"),
        FieldRule::create_only("project_id").not_in_create(),
        FieldRule::basic("route_ip_id")
            .normalized(Normalizer::NullAsEmpty)
            .api_name("routed_to"),
        FieldRule::side_effect("target_server_id")
            .normalized(Normalizer::NullAsZero)
            .api_name("targeted_to"),
        FieldRule::basic("ptr_record").normalized(Normalizer::TrimTrailingDot),
        FieldRule::basic("a_record").normalized(Normalizer::StripSuffix(A_RECORD_ZONE)),
        FieldRule::basic("tags").normalized(Normalizer::NullAsEmptyObject),
    ],
    required_for_create: &["project_id", "region"],
    identity: IdentityRules {
        keys: &[],
        scope: Some("project_id"),
        mode: MatchMode::All,
    },
    endpoints: Endpoints {
        // Recently deleted IPs answer 403 for a while.
        get: RequestTemplate::new(Method::Get, "ips/{id}", TIMEOUT, &[200])
            .not_found_on(&[403, 404]),
        list: Some(RequestTemplate::new(
            Method::Get,
            "projects/{scope}/ips",
            TIMEOUT,
            &[200],
        )),
        create: RequestTemplate::new(Method::Post, "projects/{scope}/ips", TIMEOUT, &[201]),
        update: RequestTemplate::new(Method::Put, "ips/{id}", TIMEOUT, &[200]),
        delete: RequestTemplate::new(Method::Delete, "ips/{id}", TIMEOUT, &[204]),
        side_effects: &[
            (
                SideEffectKind::Target,
                RequestTemplate::new(Method::Put, "ips/{id}", TIMEOUT, &[200]),
            ),
            (
                SideEffectKind::Untarget,
                RequestTemplate::new(Method::Put, "ips/{id}", TIMEOUT, &[200]),
            ),
        ],
    },
};

pub struct FloatingIp;

/// Non-zero server ID, if the value names one
fn server_target(value: &Value) -> Option<&Value> {
    (Normalizer::NullAsZero.apply(value) != json!(0)).then_some(value)
}

fn requested_target(desired: &DesiredSpec) -> Option<&Value> {
    desired.value("target_server_id").and_then(server_target)
}

fn untarget() -> Operation {
    Operation::side_effect(SideEffectKind::Untarget, payload(json!({"targeted_to": 0})))
}

#[async_trait]
impl ResourceKind for FloatingIp {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        normalize::floating_ip(raw)
    }

    fn validate(&self, ctx: &PlanContext<'_>) -> Result<()> {
        if let Some(observed) = ctx.observed {
            if observed.str("type") != Some(FLOATING_IP_TYPE) {
                return Err(CloudError::Validation(format!(
                    "unexpected type {}, should be {}",
                    observed.str("type").unwrap_or("unknown"),
                    FLOATING_IP_TYPE
                )));
            }
        }
        if !ctx.state.is_absent()
            && ctx.desired.value("route_ip_id").is_some()
            && requested_target(ctx.desired).is_some()
        {
            return Err(CloudError::Validation(
                "route_ip_id and target_server_id are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    fn build_operations(
        &self,
        ctx: &PlanContext<'_>,
        changes: &ChangeSet,
    ) -> Result<Vec<Operation>> {
        let Some(observed) = ctx.observed else {
            return Ok(default_operations(&SCHEMA, ctx, changes));
        };

        if ctx.state.is_absent() {
            let mut operations = Vec::new();
            if observed.get("target_server_id").and_then(server_target).is_some() {
                operations.push(untarget());
            }
            operations.push(Operation::Delete);
            return Ok(operations);
        }

        let mut operations: Vec<Operation> = basic_update(&SCHEMA, changes).into_iter().collect();
        if let Some(target) = changes.side_effect.get("target_server_id") {
            operations.push(match server_target(target) {
                Some(server) => Operation::side_effect(
                    SideEffectKind::Target,
                    payload(json!({"targeted_to": server})),
                ),
                None => untarget(),
            });
        }
        Ok(operations)
    }

    fn include_in_listing(&self, observed: &ObservedResource) -> bool {
        observed.str("type") == Some(FLOATING_IP_TYPE)
    }
}
