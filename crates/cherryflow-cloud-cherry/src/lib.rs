//! Cherry Servers provider for CherryFlow
//!
//! This crate implements the CloudProvider trait for Cherry Servers,
//! enabling CherryFlow to converge SSH keys, projects, servers, floating
//! IPs and block storage volumes to a declared state.
//!
//! # Features
//!
//! - REST transport over `reqwest` with per-request timeouts
//! - Identity resolution by ID or by natural key within a project or team
//! - Server reinstalls (opt-in) with convergence waiting
//! - Storage attach, detach and resize; floating IP targeting
//! - Read-only gather queries
//!
//! # Requirements
//!
//! - `CHERRY_AUTH_TOKEN` (or `CHERRY_AUTH_KEY`) env var
//! - Optional `CHERRY_BASE_URL` to point at another API root
//!
//! # Example
//!
//! ```ignore
//! use cherryflow_cloud::{CloudProvider, DesiredSpec, DesiredState, ReconcileRequest};
//! use cherryflow_cloud_cherry::{CherryProvider, ClientConfig};
//!
//! let provider = CherryProvider::connect(&ClientConfig::from_env()?).await?;
//!
//! let desired = DesiredSpec::new()
//!     .with("project_id", 7955)
//!     .with("hostname", "web-1")
//!     .with("region", "LT-Siauliai")
//!     .with("plan", "B1-1-1gb-20s-shared")
//!     .with("image", "ubuntu_22_04_64bit");
//!
//! let outcome = provider
//!     .reconcile("server", &ReconcileRequest::new(desired, DesiredState::Active))
//!     .await?;
//! println!("changed: {}", outcome.changed);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod resources;

pub use client::HttpTransport;
pub use config::ClientConfig;
pub use error::{CherryError, Result};
pub use provider::CherryProvider;
pub use resources::{FloatingIp, Project, ResourceType, Server, SshKey, Storage};
