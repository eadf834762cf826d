//! Visitors operator - reconciles VisitorsApp resources into a running application

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use visitors_operator::config::{
    NamePostfixes, OperatorConfig, DEFAULT_BACKEND_IMAGE, DEFAULT_DATABASE_IMAGE,
    DEFAULT_FRONTEND_IMAGE,
};
use visitors_operator::controller::{error_policy, reconcile, Context, FIELD_MANAGER};
use visitors_operator::crd::VisitorsApp;
use visitors_operator::telemetry;

/// Visitors operator - runs the three-tier visitors application on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "visitors-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Emit logs as JSON objects instead of human-readable lines
    #[arg(long, env = "VISITORS_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches VisitorsApp resources, plus the Deployments and Services they
    /// own, and reconciles each app tier by tier.
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "VISITORS_NAMESPACE")]
    namespace: Option<String>,

    /// Database container image
    #[arg(long, env = "VISITORS_DATABASE_IMAGE", default_value = DEFAULT_DATABASE_IMAGE)]
    database_image: String,

    /// Backend container image, unless the app overrides it
    #[arg(long, env = "VISITORS_BACKEND_IMAGE", default_value = DEFAULT_BACKEND_IMAGE)]
    backend_image: String,

    /// Frontend container image, unless the app overrides it
    #[arg(long, env = "VISITORS_FRONTEND_IMAGE", default_value = DEFAULT_FRONTEND_IMAGE)]
    frontend_image: String,

    /// Backend container and service port
    #[arg(long, env = "VISITORS_BACKEND_PORT", default_value = "8000")]
    backend_port: i32,

    /// Backend NodePort
    #[arg(long, env = "VISITORS_BACKEND_NODE_PORT", default_value = "30685")]
    backend_node_port: i32,

    /// Frontend container and service port
    #[arg(long, env = "VISITORS_FRONTEND_PORT", default_value = "3000")]
    frontend_port: i32,

    /// Frontend NodePort
    #[arg(long, env = "VISITORS_FRONTEND_NODE_PORT", default_value = "30686")]
    frontend_node_port: i32,

    /// Upper bound on a single reconciliation pass, in seconds
    #[arg(long, env = "VISITORS_RECONCILE_TIMEOUT_SECS", default_value = "30")]
    reconcile_timeout_secs: u64,

    /// Postfix of the database deployment name
    #[arg(long, env = "VISITORS_DATABASE_DEPLOYMENT_POSTFIX", default_value = "-mysql")]
    database_deployment_postfix: String,

    /// Postfix of the database service name
    #[arg(
        long,
        env = "VISITORS_DATABASE_SERVICE_POSTFIX",
        default_value = "-mysql-service"
    )]
    database_service_postfix: String,

    /// Postfix of the database credentials secret name
    #[arg(long, env = "VISITORS_DATABASE_AUTH_POSTFIX", default_value = "-mysql-auth")]
    database_auth_postfix: String,

    /// Postfix of the backend deployment name
    #[arg(long, env = "VISITORS_BACKEND_DEPLOYMENT_POSTFIX", default_value = "-backend")]
    backend_deployment_postfix: String,

    /// Postfix of the backend service name
    #[arg(
        long,
        env = "VISITORS_BACKEND_SERVICE_POSTFIX",
        default_value = "-backend-service"
    )]
    backend_service_postfix: String,

    /// Postfix of the frontend deployment name
    #[arg(
        long,
        env = "VISITORS_FRONTEND_DEPLOYMENT_POSTFIX",
        default_value = "-frontend"
    )]
    frontend_deployment_postfix: String,

    /// Postfix of the frontend service name
    #[arg(
        long,
        env = "VISITORS_FRONTEND_SERVICE_POSTFIX",
        default_value = "-frontend-service"
    )]
    frontend_service_postfix: String,
}

impl ControllerArgs {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig {
            database_image: self.database_image.clone(),
            backend_image: self.backend_image.clone(),
            frontend_image: self.frontend_image.clone(),
            backend_port: self.backend_port,
            backend_node_port: self.backend_node_port,
            frontend_port: self.frontend_port,
            frontend_node_port: self.frontend_node_port,
            postfixes: NamePostfixes {
                database_deployment: self.database_deployment_postfix.clone(),
                database_service: self.database_service_postfix.clone(),
                database_auth: self.database_auth_postfix.clone(),
                backend_deployment: self.backend_deployment_postfix.clone(),
                backend_service: self.backend_service_postfix.clone(),
                frontend_deployment: self.frontend_deployment_postfix.clone(),
                frontend_service: self.frontend_service_postfix.clone(),
            },
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_secs),
        }
    }
}

#[derive(Parser, Debug)]
struct DefaultControllerCli {
    #[command(flatten)]
    args: ControllerArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&VisitorsApp::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    telemetry::init_tracing(cli.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let args = match cli.command {
        Some(Commands::Controller(args)) => args,
        // No subcommand: controller mode configured from the environment
        None => DefaultControllerCli::parse_from(["visitors-operator"]).args,
    };
    run_controller(args).await
}

/// Install or update the VisitorsApp CRD
///
/// Uses server-side apply so upgrades replace the stored schema.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing VisitorsApp CRD...");
    crds.patch(
        "visitorsapps.app.my.domain",
        &params,
        &Patch::Apply(&VisitorsApp::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install VisitorsApp CRD: {}", e))?;

    tracing::info!("VisitorsApp CRD installed/updated");
    Ok(())
}

/// Namespaced or cluster-wide API, depending on the watch namespace
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("Visitors controller starting...");

    let config = args.operator_config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid operator configuration: {}", e))?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    // Operator installs its own CRD on startup
    ensure_crd_installed(&client).await?;

    let namespace = args.namespace.as_deref();
    match namespace {
        Some(ns) => tracing::info!(namespace = %ns, "Watching a single namespace"),
        None => tracing::info!("Watching all namespaces"),
    }
    let apps: Api<VisitorsApp> = scoped_api(&client, namespace);
    let deployments: Api<Deployment> = scoped_api(&client, namespace);
    let services: Api<Service> = scoped_api(&client, namespace);

    let ctx = Arc::new(Context::new(client, config));

    tracing::info!("Starting VisitorsApp controller...");
    Controller::new(apps, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((app, action)) => {
                    tracing::debug!(app = %app.name, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Visitors controller shutting down");
    Ok(())
}
