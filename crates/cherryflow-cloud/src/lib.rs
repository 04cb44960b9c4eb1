//! CherryFlow Cloud Reconciliation
//!
//! This crate provides the provider-independent core of CherryFlow:
//! given a desired specification for one resource, it finds the matching
//! remote resource, computes the operations that converge it and applies
//! them in a safe order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    Reconciler                    │
//! │  resolve ─► diff ─► plan ─► apply ─► wait ─► get │
//! └───────┬───────────────┬──────────────────┬───────┘
//!         │               │                  │
//! ┌───────▼──────┐ ┌──────▼───────┐ ┌────────▼───────┐
//! │ ResourceKind │ │   Gateway    │ │     Waiter     │
//! │ (schema,     │ │ (endpoints,  │ │ (poll until    │
//! │  normalize)  │ │  statuses)   │ │  converged)    │
//! └──────────────┘ └──────┬───────┘ └────────────────┘
//!                         │
//!                  ┌──────▼───────┐
//!                  │  Transport   │
//!                  │ (provider)   │
//!                  └──────────────┘
//! ```
//!
//! Providers such as `cherryflow-cloud-cherry` supply the transport and a
//! [`ResourceKind`] per managed resource type.

pub mod diff;
pub mod error;
pub mod field;
pub mod gather;
pub mod gateway;
pub mod identity;
pub mod kind;
pub mod normalize;
pub mod observed;
pub mod operation;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod transport;
pub mod waiter;

#[cfg(test)]
mod testing;

// Re-exports
pub use diff::ChangeSet;
pub use error::{CloudError, Result};
pub use field::{DesiredSpec, Field};
pub use gather::GatherQuery;
pub use gateway::{Endpoints, Gateway, RequestTemplate};
pub use identity::{IdentityKey, IdentityRules, MatchMode};
pub use kind::{Convergence, DesiredState, PlanContext, ResourceKind};
pub use normalize::Normalizer;
pub use observed::{ObservedResource, ResourceId};
pub use operation::{Operation, OperationPlan, Phase, PlanSummary, SideEffectKind};
pub use provider::{AuthStatus, CloudProvider};
pub use reconciler::{ReconcileOutcome, ReconcileRequest, ReconcileState, Reconciler};
pub use schema::{FieldRole, FieldRule, ResourceSchema};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
pub use waiter::WaitPolicy;
