//! In-memory fakes shared by the unit tests

use crate::diff::ChangeSet;
use crate::error::Result;
use crate::gateway::{Endpoints, RequestTemplate};
use crate::identity::{IdentityRules, MatchMode};
use crate::kind::{
    Convergence, DesiredState, PlanContext, ResourceKind, basic_update, default_operations,
};
use crate::normalize::Normalizer;
use crate::observed::ObservedResource;
use crate::operation::{Operation, SideEffectKind};
use crate::schema::{FieldRule, ResourceSchema};
use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

const T: Duration = Duration::from_secs(5);

static WIDGET: ResourceSchema = ResourceSchema {
    kind: "widget",
    fields: &[
        FieldRule::basic("name"),
        FieldRule::basic("tags").normalized(Normalizer::NullAsEmptyObject),
        FieldRule::basic("color").normalized(Normalizer::TrimTrailingDot),
        FieldRule::side_effect("image"),
        FieldRule::side_effect("size"),
        FieldRule::side_effect("attached_to")
            .normalized(Normalizer::NullAsZero)
            .not_in_create(),
        FieldRule::create_only("scope_id").not_in_create(),
    ],
    required_for_create: &["name", "scope_id"],
    identity: IdentityRules {
        keys: &["name"],
        scope: Some("scope_id"),
        mode: MatchMode::All,
    },
    endpoints: Endpoints {
        get: RequestTemplate::new(Method::Get, "widgets/{id}", T, &[200]).not_found_on(&[404]),
        list: Some(RequestTemplate::new(
            Method::Get,
            "scopes/{scope}/widgets",
            T,
            &[200],
        )),
        create: RequestTemplate::new(Method::Post, "scopes/{scope}/widgets", T, &[201]),
        update: RequestTemplate::new(Method::Put, "widgets/{id}", T, &[201]),
        delete: RequestTemplate::new(Method::Delete, "widgets/{id}", T, &[204]),
        side_effects: &[
            (
                SideEffectKind::Attach,
                RequestTemplate::new(Method::Post, "widgets/{id}/attachments", T, &[201]),
            ),
            (
                SideEffectKind::Detach,
                RequestTemplate::new(Method::Delete, "widgets/{id}/attachments", T, &[204]),
            ),
            (
                SideEffectKind::Reinstall,
                RequestTemplate::new(Method::Post, "widgets/{id}/rebuild", T, &[202]),
            ),
            (
                SideEffectKind::Resize,
                RequestTemplate::new(Method::Put, "widgets/{id}/resize", T, &[201]),
            ),
        ],
    },
};

/// Small kind exercising every reconciler path
pub struct WidgetKind;

impl WidgetKind {
    pub fn schema_ref() -> &'static ResourceSchema {
        &WIDGET
    }
}

fn attached(observed: &ObservedResource) -> bool {
    observed.i64("attached_to").is_some_and(|id| id != 0)
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl ResourceKind for WidgetKind {
    fn schema(&self) -> &ResourceSchema {
        &WIDGET
    }

    fn normalize(&self, raw: Value) -> Result<ObservedResource> {
        ObservedResource::new("widget", payload(raw))
    }

    fn build_operations(
        &self,
        ctx: &PlanContext<'_>,
        changes: &ChangeSet,
    ) -> Result<Vec<Operation>> {
        let Some(observed) = ctx.observed else {
            let mut ops = default_operations(&WIDGET, ctx, changes);
            if let Some(target) = ctx.desired.value("attached_to") {
                ops.push(Operation::side_effect(
                    SideEffectKind::Attach,
                    payload(json!({ "attach_to": target })),
                ));
            }
            return Ok(ops);
        };

        if ctx.state.is_absent() {
            let mut ops = Vec::new();
            if attached(observed) {
                ops.push(Operation::side_effect(SideEffectKind::Detach, Map::new()));
            }
            ops.push(Operation::Delete);
            return Ok(ops);
        }

        let mut ops: Vec<Operation> = basic_update(&WIDGET, changes).into_iter().collect();
        if let Some(image) = changes.side_effect.get("image") {
            ops.push(Operation::side_effect(
                SideEffectKind::Reinstall,
                payload(json!({ "image": image })),
            ));
        }
        if let Some(size) = changes.side_effect.get("size") {
            ops.push(Operation::side_effect(
                SideEffectKind::Resize,
                payload(json!({ "size": size })),
            ));
        }
        if let Some(target) = changes.side_effect.get("attached_to") {
            if attached(observed) {
                ops.push(Operation::side_effect(SideEffectKind::Detach, Map::new()));
            }
            if Normalizer::NullAsZero.apply(target) != json!(0) {
                ops.push(Operation::side_effect(
                    SideEffectKind::Attach,
                    payload(json!({ "attach_to": target })),
                ));
            }
        }
        Ok(ops)
    }

    fn convergence(&self, state: DesiredState) -> Option<Convergence> {
        (state == DesiredState::Active).then_some(Convergence {
            description: "widget ready",
            predicate: |observed| observed.status() == Some("ready"),
        })
    }
}

pub fn observed_widget(value: Value) -> ObservedResource {
    ObservedResource::new("widget", payload(value)).unwrap()
}

/// In-memory widget API
///
/// New widgets start in status `building` and become `ready` on the next
/// read, so waiting for convergence takes exactly one extra poll.
#[derive(Default)]
pub struct MemoryTransport {
    widgets: Mutex<BTreeMap<i64, Value>>,
    next_id: Mutex<i64>,
    requests: Mutex<Vec<ApiRequest>>,
    fail: Mutex<Option<(Method, &'static str, u16)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(100),
            ..Default::default()
        }
    }

    pub fn insert(&self, widget: Value) {
        let id = widget["id"].as_i64().unwrap();
        self.widgets.lock().unwrap().insert(id, widget);
    }

    pub fn widget(&self, id: i64) -> Option<Value> {
        self.widgets.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.widgets.lock().unwrap().len()
    }

    /// Answer requests matching method and path suffix with `status`
    pub fn fail_on(&self, method: Method, path_suffix: &'static str, status: u16) {
        *self.fail.lock().unwrap() = Some((method, path_suffix, status));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mutating_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.is_mutating())
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        if let Some((method, suffix, status)) = *self.fail.lock().unwrap() {
            if request.method == method && request.path.ends_with(suffix) {
                return ApiResponse::new(status, json!("injected failure"));
            }
        }

        let segments: Vec<&str> = request.path.split('/').collect();
        let body = request.payload.clone().unwrap_or(Value::Null);
        let mut widgets = self.widgets.lock().unwrap();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["scopes", scope, "widgets"]) => {
                let listed: Vec<Value> = widgets
                    .values()
                    .filter(|w| w["scope_id"].to_string() == *scope)
                    .cloned()
                    .collect();
                ApiResponse::new(200, Value::Array(listed))
            }
            (Method::Post, ["scopes", scope, "widgets"]) => {
                let id = self.allocate_id();
                let mut widget = payload(body);
                widget.insert("id".into(), json!(id));
                widget.insert("scope_id".into(), json!(scope.parse::<i64>().unwrap_or(0)));
                widget.insert("status".into(), json!("building"));
                widget.insert("attached_to".into(), Value::Null);
                let widget = Value::Object(widget);
                widgets.insert(id, widget.clone());
                ApiResponse::new(201, widget)
            }
            (method, ["widgets", id, rest @ ..]) => {
                let Ok(id) = id.parse::<i64>() else {
                    return ApiResponse::new(400, json!("bad id"));
                };
                let Some(widget) = widgets.get_mut(&id) else {
                    return ApiResponse::new(404, json!("widget not found"));
                };
                match (method, rest) {
                    (Method::Get, []) => {
                        let current = widget.clone();
                        widget["status"] = json!("ready");
                        ApiResponse::new(200, current)
                    }
                    (Method::Put, []) => {
                        for (key, value) in payload(body) {
                            widget[key.as_str()] = value;
                        }
                        ApiResponse::new(201, widget.clone())
                    }
                    (Method::Delete, []) => {
                        widgets.remove(&id);
                        ApiResponse::new(204, Value::Null)
                    }
                    (Method::Post, ["attachments"]) => {
                        widget["attached_to"] = body["attach_to"].clone();
                        ApiResponse::new(201, widget.clone())
                    }
                    (Method::Delete, ["attachments"]) => {
                        widget["attached_to"] = Value::Null;
                        ApiResponse::new(204, Value::Null)
                    }
                    (Method::Post, ["rebuild"]) => {
                        widget["image"] = body["image"].clone();
                        widget["status"] = json!("building");
                        ApiResponse::new(202, widget.clone())
                    }
                    (Method::Put, ["resize"]) => {
                        let mut resized = widget.clone();
                        widgets.remove(&id);
                        let new_id = self.allocate_id();
                        resized["id"] = json!(new_id);
                        resized["size"] = body["size"].clone();
                        widgets.insert(new_id, resized.clone());
                        ApiResponse::new(201, resized)
                    }
                    _ => ApiResponse::new(405, json!("method not allowed")),
                }
            }
            _ => ApiResponse::new(404, json!("no route")),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.handle(request))
    }
}

/// Replays canned responses in order; the last one repeats forever
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, Value)>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<(u16, Value)>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(status: u16, body: Value) -> Self {
        Self::new(vec![(status, body)])
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        let (status, body) = next.ok_or_else(|| TransportError::new("script exhausted"))?;
        Ok(ApiResponse::new(status, body))
    }
}
