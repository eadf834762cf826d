//! Workload building blocks for the visitors tiers
//!
//! Every object the operator creates is built from the helpers here:
//! - the tier label set (also the Deployment/Service selector)
//! - deterministic names derived from the owning VisitorsApp
//! - the controller owner reference that lets the garbage collector clean up
//! - [`DesiredResource`], the single type the Resource Ensurer accepts
//!
//! Labels and names are pure functions of (app name, tier) so that lookups
//! stay stable across reconciliations.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, Secret, SecretKeySelector,
    Service,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::Resource;

use crate::crd::VisitorsApp;
use crate::Error;

/// Value of the `app` label on every object
pub const APP_LABEL_VALUE: &str = "visitors";

/// Label key carrying the owning VisitorsApp name
pub const OWNER_LABEL_KEY: &str = "visitorssite_cr";

/// Label key carrying the tier name
pub const TIER_LABEL_KEY: &str = "tier";

// =============================================================================
// Tiers
// =============================================================================

/// One of the three application tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// MySQL database
    Database,
    /// Visitors backend API
    Backend,
    /// Visitors web UI
    Frontend,
}

impl Tier {
    /// Dependency order: each tier may only run once the previous one passed
    pub const ORDER: [Tier; 3] = [Tier::Database, Tier::Backend, Tier::Frontend];

    /// Value used for the `tier` label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "mysql",
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Labels, names, ownership
// =============================================================================

/// Label set for a tier of the given app
pub fn labels(app_name: &str, tier: Tier) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), APP_LABEL_VALUE.to_string()),
        (OWNER_LABEL_KEY.to_string(), app_name.to_string()),
        (TIER_LABEL_KEY.to_string(), tier.as_str().to_string()),
    ])
}

/// Resource name for an app and a tier-specific postfix
pub fn resource_name(app_name: &str, postfix: &str) -> String {
    format!("{app_name}{postfix}")
}

/// Controller owner reference pointing at the VisitorsApp
///
/// Fails if the app has not been persisted yet (no uid), since the garbage
/// collector cannot follow a reference without one.
pub fn owner_reference(app: &VisitorsApp) -> Result<OwnerReference, Error> {
    app.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal(
            "owner-reference",
            format!(
                "VisitorsApp {} has no uid",
                app.metadata.name.as_deref().unwrap_or_default()
            ),
        )
    })
}

/// Object metadata shared by every created resource
pub fn object_meta(
    name: String,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    owner: OwnerReference,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        owner_references: Some(vec![owner]),
        ..Default::default()
    }
}

// =============================================================================
// Template helpers
// =============================================================================

/// Plain `name=value` environment variable
pub fn env_value(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

/// Environment variable read from a key of a Secret
pub fn env_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// Single-container Deployment selecting pods by the tier label set
pub fn deployment(
    metadata: ObjectMeta,
    labels: &BTreeMap<String, String>,
    replicas: i32,
    container: Container,
) -> Deployment {
    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

// =============================================================================
// Desired resources
// =============================================================================

/// Kinds of object the Resource Ensurer handles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// core/v1 Secret
    Secret,
    /// apps/v1 Deployment
    Deployment,
    /// core/v1 Service
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret => f.write_str("Secret"),
            Self::Deployment => f.write_str("Deployment"),
            Self::Service => f.write_str("Service"),
        }
    }
}

/// A fully built object that should exist in the cluster
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredResource {
    /// Credentials secret
    Secret(Secret),
    /// Tier deployment
    Deployment(Deployment),
    /// Tier service
    Service(Service),
}

impl DesiredResource {
    /// Kind of the wrapped object
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Secret(_) => ResourceKind::Secret,
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::Service(_) => ResourceKind::Service,
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Secret(s) => &s.metadata,
            Self::Deployment(d) => &d.metadata,
            Self::Service(s) => &s.metadata,
        }
    }

    /// Object name
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Object namespace
    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }
}
