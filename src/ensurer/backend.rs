//! Backend API tier
//!
//! Runs `size` replicas of the visitors service, connected to MySQL through
//! the database service name and the credentials secret. Reports its image
//! in status and keeps the live replica count at `size`.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use tracing::debug;

use super::database::{DATABASE_NAME, PASSWORD_KEY, USERNAME_KEY};
use super::{correct_deployment_drift, ensure_step, EnsurerContext, StepResult, TierEnsurer};
use crate::crd::{VisitorsApp, VisitorsAppStatus};
use crate::workload::{self, DesiredResource, Tier};
use crate::Error;

/// Ensurer for the backend tier
pub struct BackendEnsurer {
    ctx: EnsurerContext,
}

impl BackendEnsurer {
    /// Create the ensurer
    pub fn new(ctx: EnsurerContext) -> Self {
        Self { ctx }
    }

    fn deployment_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(
            &app.name_any(),
            &self.ctx.config.postfixes.backend_deployment,
        )
    }

    fn service_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(&app.name_any(), &self.ctx.config.postfixes.backend_service)
    }

    /// Image the backend runs: the app override, else the configured default
    pub fn image(&self, app: &VisitorsApp) -> String {
        app.spec
            .backend_image
            .clone()
            .unwrap_or_else(|| self.ctx.config.backend_image.clone())
    }

    /// Backend deployment scaled to the app size
    pub fn build_deployment(&self, app: &VisitorsApp) -> Result<Deployment, Error> {
        let app_name = app.name_any();
        let labels = workload::labels(&app_name, Tier::Backend);
        let postfixes = &self.ctx.config.postfixes;
        let secret = workload::resource_name(&app_name, &postfixes.database_auth);
        let mysql_service = workload::resource_name(&app_name, &postfixes.database_service);

        let container = Container {
            name: "visitors-service".to_string(),
            image: Some(self.image(app)),
            ports: Some(vec![ContainerPort {
                container_port: self.ctx.config.backend_port,
                name: Some("visitors".to_string()),
                ..Default::default()
            }]),
            env: Some(vec![
                workload::env_value("MYSQL_DATABASE", DATABASE_NAME),
                workload::env_value("MYSQL_SERVICE_HOST", &mysql_service),
                workload::env_from_secret("MYSQL_USERNAME", &secret, USERNAME_KEY),
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

    /// NodePort service exposing the backend outside the cluster
    pub fn build_service(&self, app: &VisitorsApp) -> Result<Service, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Backend);
        let config = &self.ctx.config;
        Ok(Service {
            metadata: workload::object_meta(
                self.service_name(app),
                &app.namespace().unwrap_or_default(),
                &labels,
                workload::owner_reference(app)?,
            ),
            spec: Some(ServiceSpec {
                selector: Some(labels),
                type_: Some("NodePort".to_string()),
                ports: Some(vec![ServicePort {
                    protocol: Some("TCP".to_string()),
                    port: config.backend_port,
                    target_port: Some(IntOrString::Int(config.backend_port)),
                    node_port: Some(config.backend_node_port),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

/// Set the replica count to `size` if it differs
///
/// An unset replica count is the Kubernetes default of one.
fn repair_replicas(deployment: &mut Deployment, size: i32) -> Result<Option<String>, Error> {
    let spec = deployment
        .spec
        .as_mut()
        .ok_or_else(|| Error::internal("backend-drift", "deployment has no spec"))?;

    let live = spec.replicas.unwrap_or(1);
    if live == size {
        return Ok(None);
    }
    spec.replicas = Some(size);
    Ok(Some(format!("replicas {live} -> {size}")))
}

#[async_trait]
impl TierEnsurer for BackendEnsurer {
    fn tier(&self) -> Tier {
        Tier::Backend
    }

    async fn ensure_deployment(&self, app: &VisitorsApp) -> StepResult {
        let deployment = self.build_deployment(app)?;
        ensure_step(&self.ctx, app, DesiredResource::Deployment(deployment)).await
    }

    async fn ensure_service(&self, app: &VisitorsApp) -> StepResult {
        let service = self.build_service(app)?;
        ensure_step(&self.ctx, app, DesiredResource::Service(service)).await
    }

    async fn update_status(&self, app: &VisitorsApp) -> Result<(), Error> {
        let image = self.image(app);
        let current = app.status.as_ref().and_then(|s| s.backend_image.as_deref());
        if current == Some(image.as_str()) {
            debug!(%image, "backend status up to date");
            return Ok(());
        }

        let status = VisitorsAppStatus {
            backend_image: Some(image),
            ..Default::default()
        };
        self.ctx
            .kube
            .patch_app_status(
                &app.name_any(),
                &app.namespace().unwrap_or_default(),
                &status,
            )
            .await
    }

    async fn correct_drift(&self, app: &VisitorsApp) -> StepResult {
        let size = app.spec.size;
        correct_deployment_drift(&self.ctx, app, &self.deployment_name(app), move |d| {
            repair_replicas(d, size)
        })
        .await
    }
}
