//! Integration tests for the visitors operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how users interact with VisitorsApp resources in real-world scenarios.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading, updating, and deleting
//!   VisitorsApp resources through the Kubernetes API
//!
//! - `reconcile_stories`: Stories about how the reconciler builds the tiers
//!   one object per pass, gates on the database, and repairs drift
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod helpers;
mod reconcile_stories;
