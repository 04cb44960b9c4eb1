//! SSH keys
//!
//! Keys are account-wide. Label, public key and fingerprint are each unique
//! at the API, so any one of them is enough to find a key.

use crate::normalize;
use async_trait::async_trait;
use cherryflow_cloud::{
    Endpoints, FieldRule, IdentityRules, MatchMode, Method, ObservedResource, RequestTemplate,
    ResourceKind, ResourceSchema, Result,
};
use serde_json::Value;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(120);

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "ssh-key",
    fields: &[
        FieldRule::basic("label"),
        FieldRule::basic("key"),
        FieldRule::create_only("fingerprint").not_in_create(),
    ],
    required_for_create: &["label", "key"],
    identity: IdentityRules {
        keys: &["fingerprint", "label", "key"],
        scope: None,
        mode: MatchMode::Any,
    },
    endpoints: Endpoints {
        get: RequestTemplate::new(Method::Get, "ssh-keys/{id}", TIMEOUT, &[200])
            .not_found_on(&[404]),
        list: Some(RequestTemplate::new(Method::Get, "ssh-keys", TIMEOUT, &[200])),
        create: RequestTemplate::new(Method::Post, "ssh-keys", TIMEOUT, &[201]),
        update: RequestTemplate::new(Method::Put, "ssh-keys/{id}", TIMEOUT, &[201]),
        delete: RequestTemplate::new(Method::Delete, "ssh-keys/{id}", TIMEOUT, &[204]),
        side_effects: &[],
    },
};

pub struct SshKey;

#[async_trait]
impl ResourceKind for SshKey {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        normalize::ssh_key(raw)
    }
}
