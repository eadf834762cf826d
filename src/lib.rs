//! Visitors operator - Kubernetes operator for the three-tier visitors application
//!
//! A `VisitorsApp` custom resource describes a MySQL database, a backend API,
//! and a web frontend. The operator creates each tier's objects, waits for the
//! database before touching the tiers that depend on it, and repairs drift in
//! the backend replica count and the frontend title.
//!
//! # Architecture
//!
//! ```text
//! reconcile -> run_tier (per tier) -> TierEnsurer -> ensure_resource -> API server
//! ```
//!
//! Every pass performs at most one create or one deployment patch and then
//! asks the runtime to requeue, so the app converges over several short
//! passes. Status patches ride along without ending the pass.
//!
//! # Modules
//!
//! - [`crd`] - The VisitorsApp Custom Resource Definition
//! - [`config`] - Images, ports, and name postfixes injected into every ensurer
//! - [`workload`] - Labels, names, owner references, and desired objects
//! - [`ensurer`] - The Resource Ensurer and the three tier ensurers
//! - [`controller`] - Kubernetes client seam, Tier Director, and reconcile loop
//! - [`events`] - Kubernetes Event publishing
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod ensurer;
pub mod error;
pub mod events;
pub mod telemetry;
pub mod workload;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
