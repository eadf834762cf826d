//! Custom Resource Definitions for the visitors operator

mod app;

pub use app::{VisitorsApp, VisitorsAppSpec, VisitorsAppStatus};
