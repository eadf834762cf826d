//! Kubernetes client seam for the VisitorsApp controller
//!
//! Everything the reconciler reads or writes goes through [`KubeClient`], so
//! tests can swap in mocks or an in-memory cluster.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{VisitorsApp, VisitorsAppStatus};
use crate::workload::{DesiredResource, ResourceKind};
use crate::Error;

/// Field manager recorded on writes made by the operator
pub const FIELD_MANAGER: &str = "visitors-operator";

/// Trait abstracting Kubernetes client operations for VisitorsApp
///
/// Lookups return `Ok(None)` / `Ok(false)` when the object is absent; any
/// other API failure is an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a VisitorsApp by name and namespace
    async fn get_app(&self, name: &str, namespace: &str) -> Result<Option<VisitorsApp>, Error>;

    /// Check whether an object of the given kind exists
    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<bool, Error>;

    /// Create an object in its own namespace
    async fn create_resource(&self, resource: &DesiredResource) -> Result<(), Error>;

    /// Get a Deployment by name and namespace
    async fn get_deployment(&self, name: &str, namespace: &str)
        -> Result<Option<Deployment>, Error>;

    /// Replace a Deployment previously read with [`KubeClient::get_deployment`]
    ///
    /// The resourceVersion of the read object guards against lost updates.
    async fn replace_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Merge-patch the status of a VisitorsApp
    ///
    /// Unset fields of `status` are left untouched on the server.
    async fn patch_app_status(
        &self,
        name: &str,
        namespace: &str,
        status: &VisitorsAppStatus,
    ) -> Result<(), Error>;
}

/// Body of a merge patch that sets `status` on a VisitorsApp
pub(crate) fn status_merge_patch(status: &VisitorsAppStatus) -> Result<serde_json::Value, Error> {
    let status = serde_json::to_value(status)
        .map_err(|e| Error::serialization(format!("VisitorsApp status: {e}")))?;
    Ok(serde_json::json!({ "status": status }))
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_app(&self, name: &str, namespace: &str) -> Result<Option<VisitorsApp>, Error> {
        let api: Api<VisitorsApp> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<bool, Error> {
        let found = match kind {
            ResourceKind::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name).await?.is_some()
            }
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name).await?.is_some()
            }
            ResourceKind::Service => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(name).await?.is_some()
            }
        };
        Ok(found)
    }

    async fn create_resource(&self, resource: &DesiredResource) -> Result<(), Error> {
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        let namespace = resource.namespace();

        match resource {
            DesiredResource::Secret(secret) => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, secret).await?;
            }
            DesiredResource::Deployment(deployment) => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, deployment).await?;
            }
            DesiredResource::Service(service) => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                api.create(&params, service).await?;
            }
        }

        debug!(kind = %resource.kind(), name = %resource.name(), "created resource");
        Ok(())
    }

    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        let name = deployment
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal("replace-deployment", "deployment has no name"))?;
        let namespace = deployment
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::internal("replace-deployment", "deployment has no namespace"))?;

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.replace(name, &params, deployment).await?;
        Ok(())
    }

    async fn patch_app_status(
        &self,
        name: &str,
        namespace: &str,
        status: &VisitorsAppStatus,
    ) -> Result<(), Error> {
        let api: Api<VisitorsApp> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = status_merge_patch(status)?;

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}
