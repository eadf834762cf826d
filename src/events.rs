//! Kubernetes Events left on a VisitorsApp
//!
//! Creations, drift repairs, and database waits show up under
//! `kubectl describe visitorsapp`. Publishing never fails a pass: a rejected
//! Event is logged and dropped.

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

use crate::crd::VisitorsApp;
use crate::workload::ResourceKind;

/// Something a tier step did or is waiting on
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    /// A missing tier object was created
    ResourceCreated {
        /// Kind of the new object
        kind: ResourceKind,
        /// Name of the new object
        name: String,
    },
    /// A live Deployment was brought back in line with the app
    DriftCorrected {
        /// Deployment that was replaced
        deployment: String,
        /// What changed, e.g. `replicas 1 -> 3`
        change: String,
    },
    /// The database gate is closed
    DatabaseNotReady {
        /// Database deployment being waited on
        deployment: String,
        /// Ready replicas it reported
        ready_replicas: i32,
    },
}

impl AppEvent {
    /// Value of the REASON column in `kubectl get events`
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ResourceCreated { .. } => "ResourceCreated",
            Self::DriftCorrected { .. } => "DriftCorrected",
            Self::DatabaseNotReady { .. } => "DatabaseNotReady",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Self::ResourceCreated { .. } => "Create",
            Self::DriftCorrected { .. } => "Update",
            Self::DatabaseNotReady { .. } => "Wait",
        }
    }

    /// Human-readable message attached to the Event
    pub fn note(&self) -> String {
        match self {
            Self::ResourceCreated { kind, name } => format!("Created {kind} {name}"),
            Self::DriftCorrected { deployment, change } => {
                format!("Deployment {deployment}: {change}")
            }
            Self::DatabaseNotReady {
                deployment,
                ready_replicas,
            } => format!("Waiting for {deployment}: {ready_replicas} ready replicas, want 1"),
        }
    }

    fn to_event(&self) -> Event {
        Event {
            type_: EventType::Normal,
            reason: self.reason().to_string(),
            note: Some(self.note()),
            action: self.action().to_string(),
            secondary: None,
        }
    }
}

/// Sink for [`AppEvent`]s
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Record `event` against `app`
    async fn publish(&self, app: &VisitorsApp, event: AppEvent);
}

/// Publisher backed by the kube runtime [`Recorder`]
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Report as `controller_name`, tagged with the pod name when `POD_NAME` is set
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, app: &VisitorsApp, event: AppEvent) {
        let reference = app.object_ref(&());
        if let Err(e) = self.recorder.publish(&event.to_event(), &reference).await {
            warn!(reason = event.reason(), error = %e, "failed to publish event");
        }
    }
}
