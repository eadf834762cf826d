//! Tier Director
//!
//! Drives one tier ensurer through the fixed step sequence. The first step
//! that does not return "continue" ends the whole reconciliation pass, which
//! keeps every pass to at most one create or one deployment patch, plus a
//! status patch when the recorded image changed.

use kube::runtime::controller::Action;
use tracing::{debug, instrument};

use crate::crd::VisitorsApp;
use crate::ensurer::{StepResult, TierEnsurer, NOT_READY_DELAY};

/// Run the step sequence for one tier
///
/// secret -> deployment -> service -> readiness gate -> status -> drift.
/// Returns `Ok(None)` only when every step let the pass continue.
#[instrument(skip(ensurer, app), fields(tier = %ensurer.tier()))]
pub async fn run_tier(ensurer: &dyn TierEnsurer, app: &VisitorsApp) -> StepResult {
    if let Some(action) = ensurer.ensure_secret(app).await? {
        return Ok(Some(action));
    }
    if let Some(action) = ensurer.ensure_deployment(app).await? {
        return Ok(Some(action));
    }
    if let Some(action) = ensurer.ensure_service(app).await? {
        return Ok(Some(action));
    }

    if !ensurer.check_readiness(app).await? {
        return Ok(Some(Action::requeue(NOT_READY_DELAY)));
    }

    ensurer.update_status(app).await?;

    if let Some(action) = ensurer.correct_drift(app).await? {
        return Ok(Some(action));
    }

    debug!("tier converged");
    Ok(None)
}
