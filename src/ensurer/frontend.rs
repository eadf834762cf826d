//! Web UI tier
//!
//! One replica of the visitors web UI. The app title reaches the UI through
//! the `REACT_APP_TITLE` variable, which is also the field kept in sync when
//! the title changes.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use tracing::debug;

use super::{correct_deployment_drift, ensure_step, EnsurerContext, StepResult, TierEnsurer};
use crate::crd::{VisitorsApp, VisitorsAppStatus};
use crate::workload::{self, DesiredResource, Tier};
use crate::Error;

/// Environment variable carrying the title into the UI
pub const TITLE_ENV: &str = "REACT_APP_TITLE";

/// Ensurer for the frontend tier
pub struct FrontendEnsurer {
    ctx: EnsurerContext,
}

impl FrontendEnsurer {
    /// Create the ensurer
    pub fn new(ctx: EnsurerContext) -> Self {
        Self { ctx }
    }

    fn deployment_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(
            &app.name_any(),
            &self.ctx.config.postfixes.frontend_deployment,
        )
    }

    fn service_name(&self, app: &VisitorsApp) -> String {
        workload::resource_name(&app.name_any(), &self.ctx.config.postfixes.frontend_service)
    }

    /// Image the frontend runs: the app override, else the configured default
    pub fn image(&self, app: &VisitorsApp) -> String {
        app.spec
            .frontend_image
            .clone()
            .unwrap_or_else(|| self.ctx.config.frontend_image.clone())
    }

    /// Single-replica UI deployment
    pub fn build_deployment(&self, app: &VisitorsApp) -> Result<Deployment, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Frontend);

        let title = app.spec.title();
        let env = if title.is_empty() {
            None
        } else {
            Some(vec![workload::env_value(TITLE_ENV, title)])
        };

        let container = Container {
            name: "visitors-webui".to_string(),
            image: Some(self.image(app)),
            ports: Some(vec![ContainerPort {
                container_port: self.ctx.config.frontend_port,
                name: Some("visitors".to_string()),
                ..Default::default()
            }]),
            env,
            ..Default::default()
        };

        let metadata = workload::object_meta(
            self.deployment_name(app),
            &app.namespace().unwrap_or_default(),
            &labels,
            workload::owner_reference(app)?,
        );
        Ok(workload::deployment(metadata, &labels, 1, container))
    }

    /// NodePort service exposing the UI outside the cluster
    pub fn build_service(&self, app: &VisitorsApp) -> Result<Service, Error> {
        let labels = workload::labels(&app.name_any(), Tier::Frontend);
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
                    port: config.frontend_port,
                    target_port: Some(IntOrString::Int(config.frontend_port)),
                    node_port: Some(config.frontend_node_port),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

/// Bring the first env var of the first container in line with `title`
///
/// The first env var is the title by construction. A deployment that has
/// lost its env entirely gets it back, unless the title is empty.
fn repair_title(deployment: &mut Deployment, title: &str) -> Result<Option<String>, Error> {
    let container = deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .and_then(|p| p.containers.first_mut())
        .ok_or_else(|| Error::internal("frontend-drift", "deployment has no containers"))?;

    let env = container.env.get_or_insert_with(Vec::new);
    match env.first_mut() {
        Some(var) => {
            let live = var.value.clone().unwrap_or_default();
            if live == title {
                return Ok(None);
            }
            var.value = Some(title.to_string());
            var.value_from = None;
            Ok(Some(format!("title {live:?} -> {title:?}")))
        }
        None if title.is_empty() => Ok(None),
        None => {
            env.push(workload::env_value(TITLE_ENV, title));
            Ok(Some(format!("title set to {title:?}")))
        }
    }
}

#[async_trait]
impl TierEnsurer for FrontendEnsurer {
    fn tier(&self) -> Tier {
        Tier::Frontend
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
        let current = app
            .status
            .as_ref()
            .and_then(|s| s.frontend_image.as_deref());
        if current == Some(image.as_str()) {
            debug!(%image, "frontend status up to date");
            return Ok(());
        }

        let status = VisitorsAppStatus {
            frontend_image: Some(image),
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
        let title = app.spec.title().to_string();
        correct_deployment_drift(&self.ctx, app, &self.deployment_name(app), move |d| {
            repair_title(d, &title)
        })
        .await
    }
}
