//! Controller for the VisitorsApp CRD
//!
//! The reconciliation logic follows the Kubernetes controller pattern:
//! observe the app, run each tier through the Tier Director, and let the
//! runtime requeue until every tier has converged.

mod client;
mod director;
mod visitors;

#[cfg(test)]
pub use client::MockKubeClient;
pub use client::{KubeClient, KubeClientImpl, FIELD_MANAGER};
pub use director::run_tier;
pub use visitors::{error_policy, reconcile, Context, CONTROLLER_NAME, RETRY_DELAY};
