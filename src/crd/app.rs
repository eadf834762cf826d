//! VisitorsApp Custom Resource Definition
//!
//! A VisitorsApp describes the three-tier visitors application: a MySQL
//! database, the backend API, and the web frontend. The operator owns every
//! Deployment, Service, and Secret it creates for the app.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a VisitorsApp
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "app.my.domain",
    version = "v1alpha1",
    kind = "VisitorsApp",
    plural = "visitorsapps",
    shortname = "va",
    status = "VisitorsAppStatus",
    namespaced,
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Backend","type":"string","jsonPath":".status.backendImage"}"#,
    printcolumn = r#"{"name":"Frontend","type":"string","jsonPath":".status.frontendImage"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VisitorsAppSpec {
    /// Replica count for the database and backend tiers
    pub size: i32,

    /// Title shown by the frontend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Backend image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_image: Option<String>,

    /// Frontend image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_image: Option<String>,
}

impl VisitorsAppSpec {
    /// The frontend title, empty when unset
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// Validate the app specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.size < 1 {
            return Err(crate::Error::validation(format!(
                "size must be at least 1, got {}",
                self.size
            )));
        }

        for (field, image) in [
            ("backendImage", &self.backend_image),
            ("frontendImage", &self.frontend_image),
        ] {
            if matches!(image.as_deref(), Some(i) if i.trim().is_empty()) {
                return Err(crate::Error::validation(format!(
                    "{field} must not be empty when set"
                )));
            }
        }

        Ok(())
    }
}

/// Status for a VisitorsApp
///
/// Records the image last applied by each tier that reports status.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitorsAppStatus {
    /// Image applied to the backend deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_image: Option<String>,

    /// Image applied to the frontend deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_image: Option<String>,
}
