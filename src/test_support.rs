//! Shared test fixtures
//!
//! [`FakeCluster`] is an in-memory stand-in for the API server that records
//! every mutation, so tests can assert on what a reconciliation pass did.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::core::ErrorResponse;

use crate::config::OperatorConfig;
use crate::controller::{Context, KubeClient};
use crate::crd::{VisitorsApp, VisitorsAppSpec, VisitorsAppStatus};
use crate::ensurer::EnsurerContext;
use crate::events::{AppEvent, EventPublisher};
use crate::workload::{DesiredResource, ResourceKind};
use crate::Error;

/// A persisted-looking VisitorsApp in the `default` namespace
pub(crate) fn sample_app(name: &str, size: i32) -> VisitorsApp {
    let mut app = VisitorsApp::new(
        name,
        VisitorsAppSpec {
            size,
            ..Default::default()
        },
    );
    app.metadata.namespace = Some("default".to_string());
    app.metadata.uid = Some(format!("uid-{name}"));
    app
}

/// Kubernetes API error with the given status code
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} from fake cluster"),
        reason: reason.to_string(),
        code,
    }))
}

/// Ensurer collaborators backed by `kube`, with events discarded
pub(crate) fn ensurer_context(kube: Arc<dyn KubeClient>) -> EnsurerContext {
    EnsurerContext::new(
        kube,
        Arc::new(NoopEventPublisher),
        Arc::new(OperatorConfig::default()),
    )
}

/// Controller context backed by `kube`, with events discarded
pub(crate) fn test_context(kube: Arc<dyn KubeClient>) -> Arc<Context> {
    Arc::new(Context::for_testing(kube, OperatorConfig::default()))
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn meta_key(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> Key {
    key(
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

#[derive(Default)]
struct ClusterState {
    apps: BTreeMap<Key, VisitorsApp>,
    secrets: BTreeMap<Key, Secret>,
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
    created: Vec<(ResourceKind, String)>,
    replaced: Vec<Deployment>,
    status_patches: Vec<VisitorsAppStatus>,
}

impl ClusterState {
    fn contains(&self, kind: ResourceKind, k: &Key) -> bool {
        match kind {
            ResourceKind::Secret => self.secrets.contains_key(k),
            ResourceKind::Deployment => self.deployments.contains_key(k),
            ResourceKind::Service => self.services.contains_key(k),
        }
    }

    fn store(&mut self, resource: &DesiredResource) {
        match resource {
            DesiredResource::Secret(s) => {
                self.secrets.insert(meta_key(&s.metadata), s.clone());
            }
            DesiredResource::Deployment(d) => {
                self.deployments.insert(meta_key(&d.metadata), d.clone());
            }
            DesiredResource::Service(s) => {
                self.services.insert(meta_key(&s.metadata), s.clone());
            }
        }
    }
}

/// In-memory cluster implementing [`KubeClient`]
///
/// Creates fail with 409 when the object exists; replaces and status patches
/// fail with 404 when it does not. Status patches are merged into the stored
/// app the way a JSON merge patch would.
#[derive(Default)]
pub(crate) struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap()
    }

    /// Store an app without recording a mutation
    pub(crate) fn insert_app(&self, app: VisitorsApp) {
        self.state().apps.insert(meta_key(&app.metadata), app);
    }

    /// Delete an app; owned objects stay until the garbage collector runs
    pub(crate) fn remove_app(&self, namespace: &str, name: &str) {
        self.state().apps.remove(&key(namespace, name));
    }

    pub(crate) fn app(&self, namespace: &str, name: &str) -> Option<VisitorsApp> {
        self.state().apps.get(&key(namespace, name)).cloned()
    }

    /// Store an object without recording a mutation
    pub(crate) fn insert(&self, resource: DesiredResource) {
        self.state().store(&resource);
    }

    pub(crate) fn contains(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        self.state().contains(kind, &key(namespace, name))
    }

    pub(crate) fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state().deployments.get(&key(namespace, name)).cloned()
    }

    /// Simulate the deployment controller reporting ready pods
    pub(crate) fn set_ready_replicas(&self, namespace: &str, name: &str, ready: i32) {
        if let Some(d) = self.state().deployments.get_mut(&key(namespace, name)) {
            d.status
                .get_or_insert_with(DeploymentStatus::default)
                .ready_replicas = Some(ready);
        }
    }

    /// Every create, in order
    pub(crate) fn created(&self) -> Vec<(ResourceKind, String)> {
        self.state().created.clone()
    }

    /// Every deployment replace, in order
    pub(crate) fn replaced(&self) -> Vec<Deployment> {
        self.state().replaced.clone()
    }

    /// Every status patch, in order
    pub(crate) fn status_patches(&self) -> Vec<VisitorsAppStatus> {
        self.state().status_patches.clone()
    }

    /// Total writes of any kind
    pub(crate) fn mutation_count(&self) -> usize {
        let state = self.state();
        state.created.len() + state.replaced.len() + state.status_patches.len()
    }
}

#[async_trait]
impl KubeClient for FakeCluster {
    async fn get_app(&self, name: &str, namespace: &str) -> Result<Option<VisitorsApp>, Error> {
        Ok(self.app(namespace, name))
    }

    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<bool, Error> {
        Ok(self.contains(kind, namespace, name))
    }

    async fn create_resource(&self, resource: &DesiredResource) -> Result<(), Error> {
        let mut state = self.state();
        let k = key(resource.namespace(), resource.name());
        if state.contains(resource.kind(), &k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        state.store(resource);
        state
            .created
            .push((resource.kind(), resource.name().to_string()));
        Ok(())
    }

    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error> {
        Ok(self.deployment(namespace, name))
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        let mut state = self.state();
        let k = meta_key(&deployment.metadata);
        if !state.deployments.contains_key(&k) {
            return Err(api_error(404, "NotFound"));
        }
        state.deployments.insert(k, deployment.clone());
        state.replaced.push(deployment.clone());
        Ok(())
    }

    async fn patch_app_status(
        &self,
        name: &str,
        namespace: &str,
        status: &VisitorsAppStatus,
    ) -> Result<(), Error> {
        let mut state = self.state();
        let Some(app) = state.apps.get_mut(&key(namespace, name)) else {
            return Err(api_error(404, "NotFound"));
        };

        let merged = app.status.get_or_insert_with(VisitorsAppStatus::default);
        if status.backend_image.is_some() {
            merged.backend_image = status.backend_image.clone();
        }
        if status.frontend_image.is_some() {
            merged.frontend_image = status.frontend_image.clone();
        }
        state.status_patches.push(status.clone());
        Ok(())
    }
}

/// Event publisher that remembers every reason it was given
#[derive(Default)]
pub(crate) struct RecordingEventPublisher {
    reasons: Mutex<Vec<String>>,
}

impl RecordingEventPublisher {
    pub(crate) fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, _app: &VisitorsApp, event: AppEvent) {
        self.reasons.lock().unwrap().push(event.reason().to_string());
    }
}

/// Event publisher that drops everything
pub(crate) struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _app: &VisitorsApp, _event: AppEvent) {}
}
