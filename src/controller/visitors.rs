//! VisitorsApp reconciliation
//!
//! One pass walks the tiers in dependency order (database, backend,
//! frontend) and stops at the first tier that asks to stop. The runtime
//! re-invokes the pass according to the returned [`Action`], so the app
//! converges over several short passes rather than one long one.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::client::{KubeClient, KubeClientImpl};
use super::director::run_tier;
use crate::config::OperatorConfig;
use crate::crd::VisitorsApp;
use crate::ensurer::EnsurerContext;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::Error;

/// Name the controller reports in Events and field managers
pub const CONTROLLER_NAME: &str = "visitors-operator";

/// Requeue delay after a retryable error
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Controller context shared by every reconciliation
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Kubernetes Event sink
    pub events: Arc<dyn EventPublisher>,
    /// Images, ports, name postfixes, and timeouts
    pub config: Arc<OperatorConfig>,
}

impl Context {
    /// Create a context talking to the cluster through `client`
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            config: Arc::new(config),
        }
    }

    /// Create a context for testing with a custom client
    ///
    /// Events are discarded.
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, config: OperatorConfig) -> Self {
        Self {
            kube,
            events: Arc::new(crate::test_support::NoopEventPublisher),
            config: Arc::new(config),
        }
    }

    fn ensurer_context(&self) -> EnsurerContext {
        EnsurerContext::new(
            self.kube.clone(),
            self.events.clone(),
            self.config.clone(),
        )
    }
}

/// Reconcile a VisitorsApp
///
/// The pass is bounded by the configured reconcile timeout. Hitting it drops
/// every in-flight API call and reports [`Error::Timeout`].
#[instrument(
    skip(app, ctx),
    fields(app = %app.name_any(), namespace = %app.namespace().unwrap_or_default())
)]
pub async fn reconcile(app: Arc<VisitorsApp>, ctx: Arc<Context>) -> Result<Action, Error> {
    let timeout = ctx.config.reconcile_timeout;
    match tokio::time::timeout(timeout, reconcile_pass(&app, &ctx)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "reconciliation pass timed out");
            Err(Error::Timeout(timeout))
        }
    }
}

async fn reconcile_pass(app: &VisitorsApp, ctx: &Context) -> Result<Action, Error> {
    let name = app.name_any();
    let namespace = app
        .namespace()
        .ok_or_else(|| Error::validation(format!("VisitorsApp {name} has no namespace")))?;

    // The cached object may be stale; act on what the API server has now
    let Some(current) = ctx.kube.get_app(&name, &namespace).await? else {
        info!("VisitorsApp no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    if let Err(e) = current.spec.validate() {
        warn!(error = %e, "invalid VisitorsApp spec, waiting for a fix");
        return Ok(Action::await_change());
    }

    debug!(size = current.spec.size, "reconciling VisitorsApp");

    for ensurer in ctx.ensurer_context().tier_ensurers() {
        if let Some(action) = run_tier(ensurer.as_ref(), &current).await? {
            debug!(tier = %ensurer.tier(), ?action, "pass stopped");
            return Ok(action);
        }
    }

    info!("all tiers converged");
    Ok(Action::await_change())
}

/// Error policy for the VisitorsApp controller
///
/// Retryable errors requeue after [`RETRY_DELAY`]; permanent ones wait for
/// the app (or an owned object) to change.
pub fn error_policy(app: Arc<VisitorsApp>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(
            %error,
            app = %app.name_any(),
            "reconciliation failed, retrying"
        );
        Action::requeue(RETRY_DELAY)
    } else {
        error!(
            %error,
            app = %app.name_any(),
            "reconciliation failed permanently"
        );
        Action::await_change()
    }
}
