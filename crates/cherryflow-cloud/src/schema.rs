//! Per-kind field schemas
//!
//! A [`ResourceSchema`] is static data: which fields a kind has, how each
//! one is compared, which API endpoint serves which operation and how a
//! resource is identified. Schemas are declared as `static` items by the
//! provider crate.

use crate::field::DesiredSpec;
use crate::gateway::Endpoints;
use crate::identity::IdentityRules;
use crate::normalize::Normalizer;
use serde_json::{Map, Value};

/// How a field participates in reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Updated in place with the kind's update endpoint
    Basic,
    /// Changed through a side effect the kind plans itself
    SideEffect,
    /// Only sent at creation; differences later are logged and ignored
    CreateOnly,
    /// Not reflected in the observed state; any explicit value counts as a change
    Untracked,
}

/// Declaration of one desired field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Name in the desired spec and the observed resource
    pub name: &'static str,
    pub role: FieldRole,
    pub normalizer: Normalizer,
    /// Name in request payloads
    pub api_name: &'static str,
    /// Whether the field goes into the create payload
    pub in_create: bool,
}

impl FieldRule {
    const fn with_role(name: &'static str, role: FieldRole) -> Self {
        Self {
            name,
            role,
            normalizer: Normalizer::Verbatim,
            api_name: name,
            in_create: true,
        }
    }

    pub const fn basic(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::Basic)
    }

    pub const fn side_effect(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::SideEffect)
    }

    pub const fn create_only(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::CreateOnly)
    }

    pub const fn untracked(name: &'static str) -> Self {
        Self::with_role(name, FieldRole::Untracked)
    }

    pub const fn normalized(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub const fn api_name(mut self, api_name: &'static str) -> Self {
        self.api_name = api_name;
        self
    }

    /// Keep the field out of the create payload (URL scopes, attachments)
    pub const fn not_in_create(mut self) -> Self {
        self.in_create = false;
        self
    }
}

/// Static description of a resource kind
#[derive(Debug)]
pub struct ResourceSchema {
    /// Kind name used in logs and errors
    pub kind: &'static str,
    pub fields: &'static [FieldRule],
    /// Fields that must carry a value before the kind can be created
    pub required_for_create: &'static [&'static str],
    pub identity: IdentityRules,
    pub endpoints: Endpoints,
}

impl ResourceSchema {
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.name == name)
    }

    /// Comparison normalizer for a field; unknown fields compare verbatim.
    pub fn normalizer_for(&self, name: &str) -> Normalizer {
        self.rule(name)
            .map(|rule| rule.normalizer)
            .unwrap_or(Normalizer::Verbatim)
    }

    /// Create payload from every explicitly valued create field
    pub fn create_payload(&self, desired: &DesiredSpec) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|rule| rule.in_create)
            .filter_map(|rule| {
                desired
                    .value(rule.name)
                    .map(|value| (rule.api_name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Rename changed fields to their payload names
    pub fn update_payload(&self, changes: &Map<String, Value>) -> Map<String, Value> {
        changes
            .iter()
            .map(|(name, value)| {
                let api_name = self
                    .rule(name)
                    .map(|rule| rule.api_name.to_string())
                    .unwrap_or_else(|| name.clone());
                (api_name, value.clone())
            })
            .collect()
    }
}
