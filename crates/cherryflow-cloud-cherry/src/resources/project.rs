//! Projects
//!
//! Projects live in a team and are identified by name within it.

use crate::normalize;
use async_trait::async_trait;
use cherryflow_cloud::{
    Endpoints, FieldRule, IdentityRules, MatchMode, Method, Normalizer, ObservedResource,
    RequestTemplate, ResourceKind, ResourceSchema, Result,
};
use serde_json::Value;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

static SCHEMA: ResourceSchema = ResourceSchema {
    kind: "project",
    fields: &[
        FieldRule::basic("name"),
        FieldRule::basic("bgp").normalized(Normalizer::NullAsFalse),
        FieldRule::create_only("team_id").not_in_create(),
    ],
    required_for_create: &["name", "team_id"],
    identity: IdentityRules {
        keys: &["name"],
        scope: Some("team_id"),
        mode: MatchMode::All,
    },
    endpoints: Endpoints {
        get: RequestTemplate::new(Method::Get, "projects/{id}", READ_TIMEOUT, &[200])
            .not_found_on(&[404]),
        list: Some(RequestTemplate::new(
            Method::Get,
            "teams/{scope}/projects",
            READ_TIMEOUT,
            &[200],
        )),
        create: RequestTemplate::new(
            Method::Post,
            "teams/{scope}/projects",
            WRITE_TIMEOUT,
            &[201],
        ),
        update: RequestTemplate::new(Method::Put, "projects/{id}", WRITE_TIMEOUT, &[201]),
        delete: RequestTemplate::new(Method::Delete, "projects/{id}", WRITE_TIMEOUT, &[204]),
        side_effects: &[],
    },
};

pub struct Project;

#[async_trait]
impl ResourceKind for Project {
    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        normalize::project(raw)
    }
}
