//! Servers
//!
//! Hostname and tags update in place. Image, SSH keys, user data and the OS
//! partition size can only change by reinstalling the server, which wipes
//! it and therefore needs the caller's opt-in.

use super::payload;
use crate::normalize;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cherryflow_cloud::kind::{basic_update, default_operations};
use cherryflow_cloud::{
    ChangeSet, CloudError, Convergence, DesiredSpec, DesiredState, Endpoints, FieldRule,
    IdentityRules, MatchMode, Method, Normalizer, ObservedResource, Operation, PlanContext,
    RequestTemplate, ResourceKind, ResourceSchema, Result, SideEffectKind,
};
use rand::Rng;
use serde_json::{Map, Value, json};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(20);
const WRITE_TIMEOUT: Duration = Duration::from_secs(120);

/// Status reported once provisioning has finished
pub const DEPLOYED: &str = "deployed";

const REINSTALL_PASSWORD_LENGTH: usize = 16;

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "server",
    fields: &[
        FieldRule::basic("hostname"),
        FieldRule::basic("tags").normalized(Normalizer::NullAsEmptyObject),
        FieldRule::side_effect("image"),
        FieldRule::side_effect("ssh_keys").normalized(Normalizer::SortedList),
        FieldRule::untracked("user_data"),
        FieldRule::untracked("os_partition_size"),
        FieldRule::create_only("region"),
        FieldRule::create_only("plan"),
        FieldRule::create_only("spot_market"),
        FieldRule::create_only("storage_id"),
        FieldRule::create_only("extra_ip_addresses").api_name("ip_addresses"),
        FieldRule::create_only("project_id").not_in_create(),
    ],
    required_for_create: &["project_id", "region", "plan"],
    identity: IdentityRules {
        keys: &["hostname"],
        scope: Some("project_id"),
        mode: MatchMode::All,
    },
    endpoints: Endpoints {
        // Recently deleted servers answer 403 for a while.
        get: RequestTemplate::new(Method::Get, "servers/{id}", READ_TIMEOUT, &[200])
            .not_found_on(&[403, 404]),
        list: Some(RequestTemplate::new(
            Method::Get,
            "projects/{scope}/servers",
            READ_TIMEOUT,
            &[200],
        )),
        create: RequestTemplate::new(
            Method::Post,
            "projects/{scope}/servers",
            WRITE_TIMEOUT,
            &[201],
        ),
        update: RequestTemplate::new(Method::Put, "servers/{id}", WRITE_TIMEOUT, &[201]),
        delete: RequestTemplate::new(Method::Delete, "servers/{id}", WRITE_TIMEOUT, &[204]),
        side_effects: &[(
            SideEffectKind::Reinstall,
            RequestTemplate::new(
                Method::Post,
                "servers/{id}/actions",
                WRITE_TIMEOUT,
                &[200, 201, 202],
            ),
        )],
    },
};

pub struct Server;

#[async_trait]
impl ResourceKind for Server {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        normalize::server(raw)
    }

    fn validate(&self, ctx: &PlanContext<'_>) -> Result<()> {
        if ctx.state.is_absent() {
            return Ok(());
        }
        if let Some(user_data) = ctx.desired.value("user_data") {
            let encoded = user_data.as_str().ok_or_else(|| {
                CloudError::Validation("user_data must be a base64 string".to_string())
            })?;
            STANDARD
                .decode(encoded)
                .map_err(|e| CloudError::Validation(format!("invalid user_data string: {e}")))?;
        }
        Ok(())
    }

    fn build_operations(
        &self,
        ctx: &PlanContext<'_>,
        changes: &ChangeSet,
    ) -> Result<Vec<Operation>> {
        let observed = match ctx.observed {
            Some(observed) if !ctx.state.is_absent() => observed,
            _ => return Ok(default_operations(&SCHEMA, ctx, changes)),
        };

        let mut operations: Vec<Operation> = basic_update(&SCHEMA, changes).into_iter().collect();
        if !changes.side_effect.is_empty() {
            operations.push(Operation::side_effect(
                SideEffectKind::Reinstall,
                reinstall_payload(ctx.desired, observed, &changes.side_effect),
            ));
        }
        Ok(operations)
    }

    fn convergence(&self, state: DesiredState) -> Option<Convergence> {
        (state == DesiredState::Active).then_some(Convergence {
            description: "server deployed",
            predicate: |observed| observed.status() == Some(DEPLOYED),
        })
    }
}

/// Reinstall request; image and SSH keys default to what is deployed now
fn reinstall_payload(
    desired: &DesiredSpec,
    observed: &ObservedResource,
    changed: &Map<String, Value>,
) -> Map<String, Value> {
    let current = |key: &str| {
        desired
            .value(key)
            .or_else(|| observed.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut request = payload(json!({
        "type": "reinstall",
        "image": current("image"),
        "ssh_keys": current("ssh_keys"),
        "password": generate_password(REINSTALL_PASSWORD_LENGTH),
    }));
    for key in ["user_data", "os_partition_size"] {
        if let Some(value) = changed.get(key) {
            request.insert(key.to_string(), value.clone());
        }
    }
    request
}

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random root password for reinstalls
///
/// Between 8 and 24 characters. Starts with a lowercase letter, then an
/// uppercase letter and a digit, so every class is present and neither
/// the uppercase letter is first nor the digit last.
fn generate_password(length: usize) -> String {
    let length = length.clamp(8, 24);
    let mut rng = rand::thread_rng();
    let mut pick = |set: &[u8]| char::from(set[rng.gen_range(0..set.len())]);

    let mut password = String::with_capacity(length);
    password.push(pick(LOWERCASE));
    password.push(pick(UPPERCASE));
    password.push(pick(DIGITS));
    for _ in 3..length {
        password.push(pick(ALPHANUMERIC));
    }
    password
}
