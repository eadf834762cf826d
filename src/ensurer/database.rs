//! MySQL tier: credentials secret, deployment, headless service
//!
//! The database gates the other tiers: until its deployment reports exactly
//! one ready replica, backend and frontend are not touched. The deployment
//! follows the app size like the backend does, but the gate still counts one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Secret, Service, ServicePort, ServiceSpec,
};
use kube::ResourceExt;
use tracing::{debug, info};

use super::{ensure_step, EnsurerContext, StepResult, TierEnsurer};
use crate::crd::VisitorsApp;
use crate::events::AppEvent;
use crate::workload::{self, DesiredResource, Tier};
use crate::Error;

/// Database name created inside MySQL and used by the backend
pub const DATABASE_NAME: &str = "visitors";

/// MySQL listen port
pub const MYSQL_PORT: i32 = 3306;

/// Secret key holding the database user
pub const USERNAME_KEY: &str = "username";

/// Secret key holding the database password
pub const PASSWORD_KEY: &str = "password";

const DATABASE_USER: &str = "visitors-user";
const DATABASE_PASSWORD: &str = "visitors-pass";
const ROOT_PASSWORD: &str = "password";

/// Ensurer for the MySQL tier
pub struct DatabaseEnsurer {
    ctx: EnsurerContext,
}

impl DatabaseEnsurer {
    /// Create the ensurer
    pub fn new(ctx: EnsurerContext) -> Self {
        Self { ctx }
    }

    fn secret_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(&app.name_any(), &self.ctx.config.postfixes.database_auth)
    }

    fn deployment_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(
            &app.name_any(),
            &self.ctx.config.postfixes.database_deployment,
        )
    }

    fn service_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(&app.name_any(), &self.ctx.config.postfixes.database_service)
    }

    /// Credentials secret read by both MySQL and the backend
    pub fn build_secret(&self, app: &VisitorsApp) -> Result<Secret, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Database);
        Ok(Secret {
            metadata: workload::object_meta(
                self.secret_name(app),
                &app.namespace().unwrap_or_default(),
                &labels,
                workload::owner_reference(app)?,
            ),
            type_: Some("Opaque".to_string()),
            string_data: Some(BTreeMap::from([
                (USERNAME_KEY.to_string(), DATABASE_USER.to_string()),
                (PASSWORD_KEY.to_string(), DATABASE_PASSWORD.to_string()),
            ])),
            ..Default::default()
        })
    }

    /// MySQL deployment scaled to the app size
    pub fn build_deployment(&self, app: &VisitorsApp) -> Result<Deployment, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Database);
        let secret = self.secret_name(app);

        let container = Container {
            name: "visitors-mysql".to_string(),
            image: Some(self.ctx.config.database_image.clone()),
            ports: Some(vec![ContainerPort {
                container_port: MYSQL_PORT,
                name: Some("mysql".to_string()),
                ..Default::default()
            }]),
            env: Some(vec![
                workload::env_value("MYSQL_ROOT_PASSWORD", ROOT_PASSWORD),
                workload::env_value("MYSQL_DATABASE", DATABASE_NAME),
                workload::env_from_secret("MYSQL_USER", &secret, USERNAME_KEY),
                workload::env_from_secret("MYSQL_PASSWORD", &secret, PASSWORD_KEY),
            ]),
            ..Default::default()
        };

        let metadata = workload::object_meta(
            self.deployment_name(app),
            &app.namespace().unwrap_or_default(),
            &labels,
            workload::owner_reference(app)?,
        );
        Ok(workload::deployment(
            metadata,
            &labels,
            app.spec.size,
            container,
        ))
    }

    /// Headless service giving MySQL a stable DNS name
    pub fn build_service(&self, app: &VisitorsApp) -> Result<Service, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Database);
        Ok(Service {
            metadata: workload::object_meta(
                self.service_name(app),
                &app.namespace().unwrap_or_default(),
                &labels,
                workload::owner_reference(app)?,
            ),
            spec: Some(ServiceSpec {
                selector: Some(labels),
                cluster_ip: Some("None".to_string()),
                ports: Some(vec![ServicePort {
                    port: MYSQL_PORT,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

#[async_trait]
impl TierEnsurer for DatabaseEnsurer {
    fn tier(&self) -> Tier {
        Tier::Database
    }

    async fn ensure_secret(&self, app: &VisitorsApp) -> StepResult {
        let secret = self.build_secret(app)?;
        ensure_step(&self.ctx, app, DesiredResource::Secret(secret)).await
    }

    async fn ensure_deployment(&self, app: &VisitorsApp) -> StepResult {
        let deployment = self.build_deployment(app)?;
        ensure_step(&self.ctx, app, DesiredResource::Deployment(deployment)).await
    }

    async fn ensure_service(&self, app: &VisitorsApp) -> StepResult {
        let service = self.build_service(app)?;
        ensure_step(&self.ctx, app, DesiredResource::Service(service)).await
    }

    /// Ready only when the deployment reports exactly one ready replica
    ///
    /// A deployment that cannot be found yet counts as not ready.
    async fn check_readiness(&self, app: &VisitorsApp) -> Result<bool, Error> {
        let name = self.deployment_name(app);
        let namespace = app.namespace().unwrap_or_default();

        let ready_replicas = self
            .ctx
            .kube
            .get_deployment(&name, &namespace)
            .await?
            .and_then(|d| d.status)
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);

        if ready_replicas == 1 {
            debug!(deployment = %name, "database ready");
            return Ok(true);
        }

        info!(deployment = %name, ready_replicas, "database not ready");
        self.ctx
            .events
            .publish(
                app,
                AppEvent::DatabaseNotReady {
                    deployment: name,
                    ready_replicas,
                },
            )
            .await;
        Ok(false)
    }
}
