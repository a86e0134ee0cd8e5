//! Web server endpoints.
//!
//! All metrics endpoints authenticate the caller before they look at any parameters, so a
//! caller without access gets the same response for every resource.

use axum::Router;
use axum::routing::{get, post};

use crate::service::ServiceState;

mod common;
mod health_check;
mod metric_details;
mod metrics;
mod store;
mod tags;

pub use self::common::BadMetricsRequest;

/// Returns the router with all endpoints of the service.
#[rustfmt::skip]
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/healthcheck/live/", get(health_check::handle))
        .route("/organizations/{org}/metrics/", get(metrics::list).put(metrics::update))
        .route("/organizations/{org}/metrics/tags/", get(tags::list_tags))
        .route("/organizations/{org}/metrics/tags/{tag}/", get(tags::list_tag_values))
        .route("/organizations/{org}/metrics/{mri}/", get(metric_details::handle))
        .route("/internal/metrics/store/", post(store::handle))
}
