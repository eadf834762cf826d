//! Tier ensurers
//!
//! A tier ensurer knows how to build the objects of one tier and how that
//! tier gates, reports status, and repairs drift. The Tier Director in
//! [`crate::controller`] drives every ensurer through the same sequence:
//!
//! ```text
//! secret -> deployment -> service -> readiness gate -> status -> drift
//! ```
//!
//! Each step returns a [`StepResult`]. `Ok(None)` lets the sequence continue;
//! anything else ends the reconciliation pass. A pass makes at most one
//! create or one deployment patch. The status step may add a status patch
//! without ending the pass.

mod backend;
mod database;
mod frontend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, warn};

pub use backend::BackendEnsurer;
pub use database::DatabaseEnsurer;
pub use frontend::FrontendEnsurer;

use crate::config::OperatorConfig;
use crate::controller::KubeClient;
use crate::crd::VisitorsApp;
use crate::events::{AppEvent, EventPublisher};
use crate::workload::{DesiredResource, Tier};
use crate::Error;

/// Outcome of one step of a tier sequence
///
/// `Ok(None)` continues, `Ok(Some(action))` ends the pass with that requeue
/// instruction, `Err` ends the pass and hands the error to the error policy.
pub type StepResult = Result<Option<Action>, Error>;

/// Delay before re-checking a tier that is not ready yet
pub const NOT_READY_DELAY: Duration = Duration::from_secs(5);

/// Delay before retrying drift correction on a Deployment that is not visible yet
pub const DRIFT_LOOKUP_DELAY: Duration = Duration::from_secs(5);

/// Requeue without delay: the pass changed something and stopped
pub fn requeue_now() -> Action {
    Action::requeue(Duration::ZERO)
}

/// Capabilities every tier provides
///
/// Steps a tier has nothing to do for default to "continue".
#[async_trait]
pub trait TierEnsurer: Send + Sync {
    /// Which tier this ensurer manages
    fn tier(&self) -> Tier;

    /// Ensure the tier's secret exists
    async fn ensure_secret(&self, _app: &VisitorsApp) -> StepResult {
        Ok(None)
    }

    /// Ensure the tier's deployment exists
    async fn ensure_deployment(&self, app: &VisitorsApp) -> StepResult;

    /// Ensure the tier's service exists
    async fn ensure_service(&self, app: &VisitorsApp) -> StepResult;

    /// Whether later tiers may proceed
    async fn check_readiness(&self, _app: &VisitorsApp) -> Result<bool, Error> {
        Ok(true)
    }

    /// Record the tier's image in the app status
    async fn update_status(&self, _app: &VisitorsApp) -> Result<(), Error> {
        Ok(())
    }

    /// Repair divergence between the app and the live deployment
    async fn correct_drift(&self, _app: &VisitorsApp) -> StepResult {
        Ok(None)
    }
}

/// Collaborators shared by all tier ensurers
#[derive(Clone)]
pub struct EnsurerContext {
    /// Cluster access
    pub kube: Arc<dyn KubeClient>,
    /// Kubernetes Event sink
    pub events: Arc<dyn EventPublisher>,
    /// Images, ports, and name postfixes
    pub config: Arc<OperatorConfig>,
}

impl EnsurerContext {
    /// Bundle the collaborators
    pub fn new(
        kube: Arc<dyn KubeClient>,
        events: Arc<dyn EventPublisher>,
        config: Arc<OperatorConfig>,
    ) -> Self {
        Self {
            kube,
            events,
            config,
        }
    }

    /// The three tier ensurers in dependency order
    pub fn tier_ensurers(&self) -> Vec<Arc<dyn TierEnsurer>> {
        vec![
            Arc::new(DatabaseEnsurer::new(self.clone())),
            Arc::new(BackendEnsurer::new(self.clone())),
            Arc::new(FrontendEnsurer::new(self.clone())),
        ]
    }
}

// =============================================================================
// Resource Ensurer
// =============================================================================

/// Create `desired` if no object of its kind and name exists
///
/// Returns `Ok(true)` when the object was just created (the pass should
/// stop), `Ok(false)` when it already existed. An existing object is never
/// compared against `desired` or modified.
pub async fn ensure_resource(
    kube: &dyn KubeClient,
    desired: &DesiredResource,
) -> Result<bool, Error> {
    let kind = desired.kind();
    let name = desired.name();
    let namespace = desired.namespace();

    if kube.resource_exists(kind, name, namespace).await? {
        debug!(%kind, %name, "resource exists");
        return Ok(false);
    }

    info!(%kind, %name, %namespace, "creating resource");
    if let Err(e) = kube.create_resource(desired).await {
        warn!(%kind, %name, error = %e, "failed to create resource");
        return Err(e);
    }
    Ok(true)
}

/// Run [`ensure_resource`] as a tier step, announcing creations as Events
pub(crate) async fn ensure_step(
    ctx: &EnsurerContext,
    app: &VisitorsApp,
    desired: DesiredResource,
) -> StepResult {
    if !ensure_resource(ctx.kube.as_ref(), &desired).await? {
        return Ok(None);
    }

    ctx.events
        .publish(
            app,
            AppEvent::ResourceCreated {
                kind: desired.kind(),
                name: desired.name().to_string(),
            },
        )
        .await;
    Ok(Some(requeue_now()))
}

/// Shared drift correction for tiers that own a single-container Deployment
///
/// `repair` compares the one field the tier cares about and, on mismatch,
/// fixes it in place and returns a description of the change.
pub(crate) async fn correct_deployment_drift<F>(
    ctx: &EnsurerContext,
    app: &VisitorsApp,
    deployment_name: &str,
    repair: F,
) -> StepResult
where
    F: FnOnce(&mut Deployment) -> Result<Option<String>, Error> + Send,
{
    let namespace = app.namespace().unwrap_or_default();

    let Some(mut live) = ctx.kube.get_deployment(deployment_name, &namespace).await? else {
        warn!(
            deployment = %deployment_name,
            "deployment not visible yet, retrying drift check"
        );
        return Ok(Some(Action::requeue(DRIFT_LOOKUP_DELAY)));
    };

    let Some(change) = repair(&mut live)? else {
        debug!(deployment = %deployment_name, "no drift");
        return Ok(None);
    };

    info!(deployment = %deployment_name, %change, "correcting drift");
    if let Err(e) = ctx.kube.replace_deployment(&live).await {
        warn!(deployment = %deployment_name, error = %e, "failed to update deployment");
        return Err(e);
    }

    ctx.events
        .publish(
            app,
            AppEvent::DriftCorrected {
                deployment: deployment_name.to_string(),
                change,
            },
        )
        .await;
    Ok(Some(requeue_now()))
}
