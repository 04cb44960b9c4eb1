//! Cherry Servers API normalizers
//!
//! Turn raw API objects into the vocabulary callers use in desired specs:
//! nested objects are flattened (`region.slug` becomes `region`) and related
//! objects are replaced by their IDs. Fields the caller can set are always
//! present in the result, as `null` when the API omits them.

use crate::resources::ResourceType;
use cherryflow_cloud::{CloudError, ObservedResource, Result};
use serde_json::{Map, Value};

fn object(resource_type: ResourceType, raw: Value) -> Result<Map<String, Value>> {
    match raw {
        Value::Object(map) => Ok(map),
        _ => Err(CloudError::InvalidResponse {
            kind: resource_type.to_string(),
            message: "expected a JSON object".to_string(),
        }),
    }
}

/// Copy `keys` verbatim, defaulting to `null`
fn pick(raw: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .map(|key| (key.to_string(), raw.get(*key).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// `raw[key][inner]`, or `null`
fn nested(raw: &Map<String, Value>, key: &str, inner: &str) -> Value {
    raw.get(key)
        .and_then(|value| value.get(inner))
        .cloned()
        .unwrap_or(Value::Null)
}

fn tags(raw: &Map<String, Value>) -> Value {
    match raw.get("tags") {
        Some(Value::Object(tags)) => Value::Object(tags.clone()),
        _ => Value::Object(Map::new()),
    }
}

/// Related objects as a sorted list of their IDs
fn id_list(value: Option<&Value>) -> Value {
    let Some(Value::Array(items)) = value else {
        return Value::Array(Vec::new());
    };

    let mut ids: Vec<i64> = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(_) => item.get("id").and_then(Value::as_i64),
            other => other.as_i64(),
        })
        .collect();
    ids.sort_unstable();
    Value::Array(ids.into_iter().map(Value::from).collect())
}

pub fn ssh_key(raw: Value) -> Result<ObservedResource> {
    let raw = object(ResourceType::SshKey, raw)?;
    let fields = pick(
        &raw,
        &["id", "label", "key", "fingerprint", "created", "updated"],
    );
    ObservedResource::new(ResourceType::SshKey.name(), fields)
}

/// Projects report BGP as `{"enabled": bool, "local_asn": n}`
pub fn project(raw: Value) -> Result<ObservedResource> {
    let raw = object(ResourceType::Project, raw)?;
    let mut fields = pick(&raw, &["id", "name", "href"]);

    let bgp = match raw.get("bgp") {
        Some(Value::Object(bgp)) => bgp.get("enabled").cloned().unwrap_or(Value::Bool(false)),
        Some(Value::Bool(enabled)) => Value::Bool(*enabled),
        _ => Value::Bool(false),
    };
    fields.insert("bgp".to_string(), bgp);
    fields.insert("local_asn".to_string(), nested(&raw, "bgp", "local_asn"));

    ObservedResource::new(ResourceType::Project.name(), fields)
}

pub fn server(raw: Value) -> Result<ObservedResource> {
    let raw = object(ResourceType::Server, raw)?;
    let mut fields = pick(&raw, &["id", "hostname", "name", "status", "ip_addresses"]);

    let image = match nested(&raw, "deployed_image", "slug") {
        Value::Null => raw.get("image").cloned().unwrap_or(Value::Null),
        slug => slug,
    };
    let spot_market = raw
        .get("spot_instance")
        .or_else(|| raw.get("spot_market"))
        .cloned()
        .unwrap_or(Value::Bool(false));

    fields.insert("image".to_string(), image);
    fields.insert("plan".to_string(), nested(&raw, "plan", "slug"));
    fields.insert("region".to_string(), nested(&raw, "region", "slug"));
    fields.insert("project_id".to_string(), nested(&raw, "project", "id"));
    fields.insert("storage_id".to_string(), nested(&raw, "storage", "id"));
    fields.insert("ssh_keys".to_string(), id_list(raw.get("ssh_keys")));
    fields.insert("spot_market".to_string(), spot_market);
    fields.insert("tags".to_string(), tags(&raw));

    ObservedResource::new(ResourceType::Server.name(), fields)
}

/// The `ips` endpoints serve every IP type; `type` is kept for filtering.
pub fn floating_ip(raw: Value) -> Result<ObservedResource> {
    let raw = object(ResourceType::FloatingIp, raw)?;
    let mut fields = pick(
        &raw,
        &["id", "address", "cidr", "type", "ptr_record", "a_record"],
    );

    fields.insert(
        "target_server_id".to_string(),
        nested(&raw, "targeted_to", "id"),
    );
    fields.insert("route_ip_id".to_string(), nested(&raw, "routed_to", "id"));
    fields.insert("region".to_string(), nested(&raw, "region", "slug"));
    fields.insert("project_id".to_string(), nested(&raw, "project", "id"));
    fields.insert("tags".to_string(), tags(&raw));

    ObservedResource::new(ResourceType::FloatingIp.name(), fields)
}

/// Storage state is derived from the attachment: `attached` or `detached`
pub fn storage(raw: Value) -> Result<ObservedResource> {
    let raw = object(ResourceType::Storage, raw)?;
    let mut fields = pick(
        &raw,
        &[
            "id",
            "name",
            "size",
            "description",
            "vlan_id",
            "vlan_ip",
            "initiator",
            "discovery_ip",
        ],
    );

    let target = nested(&raw, "attached_to", "id");
    let state = if target.is_null() { "detached" } else { "attached" };
    fields.insert("target_server_id".to_string(), target);
    fields.insert("state".to_string(), Value::from(state));
    fields.insert("region".to_string(), nested(&raw, "region", "slug"));

    ObservedResource::new(ResourceType::Storage.name(), fields)
}
