//! Integration tests for the reconciler against a real API server
//!
//! No pods need to become ready in these tests: the database readiness
//! gate is exercised by checking that nothing past it gets created while
//! MySQL is still starting.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::Client;

use visitors_operator::config::OperatorConfig;
use visitors_operator::controller::{reconcile, Context};
use visitors_operator::crd::VisitorsApp;

use super::helpers::{cleanup_namespace, create_namespace, ensure_test_cluster, sample_app};

/// Run passes until the reconciler stops asking for an immediate requeue
async fn reconcile_until_settled(client: &Client, app: &VisitorsApp) -> Action {
    let ctx = Arc::new(Context::new(client.clone(), OperatorConfig::default()));
    for _ in 0..10 {
        let action = reconcile(Arc::new(app.clone()), ctx.clone())
            .await
            .expect("reconcile failed");
        if action != Action::requeue(Duration::ZERO) {
            return action;
        }
    }
    panic!("reconciler kept requeueing");
}

/// Story: A new app gets its database tier first
///
/// The reconciler creates the secret, deployment, and headless service for
/// MySQL, then waits. Backend and frontend objects must not exist yet.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_database_tier_is_built_first() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "visitors-reconcile-db";
    create_namespace(&client, ns).await.expect("namespace");

    let apps: Api<VisitorsApp> = Api::namespaced(client.clone(), ns);
    let app = apps
        .create(&PostParams::default(), &sample_app("demo", ns, 1))
        .await
        .expect("failed to create VisitorsApp");

    let action = reconcile_until_settled(&client, &app).await;
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));

    let secrets: Api<Secret> = Api::namespaced(client.clone(), ns);
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    let services: Api<Service> = Api::namespaced(client.clone(), ns);

    let secret = secrets.get("demo-mysql-auth").await.expect("secret");
    let owner = &secret.metadata.owner_references.expect("owner")[0];
    assert_eq!(owner.kind, "VisitorsApp");
    assert_eq!(owner.name, "demo");

    deployments.get("demo-mysql").await.expect("mysql deployment");
    let headless = services.get("demo-mysql-service").await.expect("mysql service");
    assert_eq!(
        headless.spec.and_then(|s| s.cluster_ip).as_deref(),
        Some("None")
    );

    // Unless MySQL became ready in the meantime, nothing past the gate exists
    let mysql_ready = deployments
        .get("demo-mysql")
        .await
        .ok()
        .and_then(|d| d.status)
        .and_then(|s| s.ready_replicas)
        == Some(1);
    if !mysql_ready {
        assert!(deployments.get_opt("demo-backend").await.unwrap().is_none());
        assert!(deployments.get_opt("demo-frontend").await.unwrap().is_none());
    }

    cleanup_namespace(&client, ns).await;
}

/// Story: Reconciling a deleted app does nothing
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_deleted_app_is_ignored() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "visitors-reconcile-gone";
    create_namespace(&client, ns).await.expect("namespace");

    let app = sample_app("ghost", ns, 1);
    let ctx = Arc::new(Context::new(client.clone(), OperatorConfig::default()));
    let action = reconcile(Arc::new(app), ctx)
        .await
        .expect("reconcile failed");
    assert_eq!(action, Action::await_change());

    let secrets: Api<Secret> = Api::namespaced(client.clone(), ns);
    assert!(secrets.get_opt("ghost-mysql-auth").await.unwrap().is_none());

    cleanup_namespace(&client, ns).await;
}
