//! Shared setup for the kind integration tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Client, CustomResourceExt};

use visitors_operator::controller::FIELD_MANAGER;
use visitors_operator::crd::{VisitorsApp, VisitorsAppSpec};

const CRD_NAME: &str = "visitorsapps.app.my.domain";

/// Connect to the current cluster and make sure the VisitorsApp CRD is served
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let client = Client::try_default()
        .await
        .map_err(|e| format!("failed to create client: {e}"))?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        CRD_NAME,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&VisitorsApp::crd()),
    )
    .await
    .map_err(|e| format!("failed to install CRD: {e}"))?;

    tokio::time::timeout(
        Duration::from_secs(30),
        await_condition(crds, CRD_NAME, conditions::is_crd_established()),
    )
    .await
    .map_err(|_| "timed out waiting for CRD to be established".to_string())?
    .map_err(|e| format!("failed waiting for CRD: {e}"))?;

    Ok(client)
}

/// Create a fresh namespace for one test
pub async fn create_namespace(client: &Client, name: &str) -> Result<(), String> {
    let api: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match api.create(&PostParams::default(), &ns).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
        Err(e) => Err(format!("failed to create namespace {name}: {e}")),
    }
}

/// Delete a test namespace and everything in it
pub async fn cleanup_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// A VisitorsApp ready to be created in `namespace`
pub fn sample_app(name: &str, namespace: &str, size: i32) -> VisitorsApp {
    let mut app = VisitorsApp::new(
        name,
        VisitorsAppSpec {
            size,
            title: Some("Visitors".to_string()),
            ..Default::default()
        },
    );
    app.metadata.namespace = Some(namespace.to_string());
    app
}
