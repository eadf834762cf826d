//! Operator configuration
//!
//! Everything a tier ensurer needs besides the VisitorsApp itself: images,
//! ports, and the postfixes that turn an app name into resource names.
//! Built once at startup (see `main.rs`) and shared read-only.

use std::time::Duration;

/// Default backend image
pub const DEFAULT_BACKEND_IMAGE: &str = "jdob/visitors-service:1.0.0";

/// Default frontend image
pub const DEFAULT_FRONTEND_IMAGE: &str = "jdob/visitors-webui:1.0.0";

/// Default database image
pub const DEFAULT_DATABASE_IMAGE: &str = "mysql:5.7";

/// Name postfixes appended to the VisitorsApp name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamePostfixes {
    /// Database deployment
    pub database_deployment: String,
    /// Database (headless) service
    pub database_service: String,
    /// Database credentials secret
    pub database_auth: String,
    /// Backend deployment
    pub backend_deployment: String,
    /// Backend service
    pub backend_service: String,
    /// Frontend deployment
    pub frontend_deployment: String,
    /// Frontend service
    pub frontend_service: String,
}

impl Default for NamePostfixes {
    fn default() -> Self {
        Self {
            database_deployment: "-mysql".to_string(),
            database_service: "-mysql-service".to_string(),
            database_auth: "-mysql-auth".to_string(),
            backend_deployment: "-backend".to_string(),
            backend_service: "-backend-service".to_string(),
            frontend_deployment: "-frontend".to_string(),
            frontend_service: "-frontend-service".to_string(),
        }
    }
}

/// Configuration shared by all tier ensurers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Database container image
    pub database_image: String,
    /// Backend container image, unless the app overrides it
    pub backend_image: String,
    /// Frontend container image, unless the app overrides it
    pub frontend_image: String,
    /// Backend container and service port
    pub backend_port: i32,
    /// Backend NodePort
    pub backend_node_port: i32,
    /// Frontend container and service port
    pub frontend_port: i32,
    /// Frontend NodePort
    pub frontend_node_port: i32,
    /// Resource name postfixes
    pub postfixes: NamePostfixes,
    /// Upper bound on a single reconciliation pass
    pub reconcile_timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            database_image: DEFAULT_DATABASE_IMAGE.to_string(),
            backend_image: DEFAULT_BACKEND_IMAGE.to_string(),
            frontend_image: DEFAULT_FRONTEND_IMAGE.to_string(),
            backend_port: 8000,
            backend_node_port: 30685,
            frontend_port: 3000,
            frontend_node_port: 30686,
            postfixes: NamePostfixes::default(),
            reconcile_timeout: Duration::from_secs(30),
        }
    }
}

impl OperatorConfig {
    /// Check port ranges before any resource is built from this config
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, port) in [
            ("backend port", self.backend_port),
            ("frontend port", self.frontend_port),
        ] {
            if !(1..=65535).contains(&port) {
                return Err(crate::Error::validation(format!(
                    "{name} {port} is outside 1-65535"
                )));
            }
        }
        for (name, port) in [
            ("backend node port", self.backend_node_port),
            ("frontend node port", self.frontend_node_port),
        ] {
            if !(30000..=32767).contains(&port) {
                return Err(crate::Error::validation(format!(
                    "{name} {port} is outside the NodePort range 30000-32767"
                )));
            }
        }
        if self.backend_node_port == self.frontend_node_port {
            return Err(crate::Error::validation(
                "backend and frontend node ports must differ",
            ));
        }
        if self.reconcile_timeout.is_zero() {
            return Err(crate::Error::validation(
                "reconcile timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
