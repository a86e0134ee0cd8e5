//! The HTTP API of the sieve metrics visibility service.
//!
//! This crate contains the [`run`] function which starts the server. The server lists the metrics
//! observed in the projects of an organization, annotated with their blocking state, and lets
//! clients block and unblock metrics and their tags:
//!
//! | Method | Path | |
//! |---|---|---|
//! | `GET` | `/organizations/{org}/metrics/` | Lists the metrics catalog. |
//! | `PUT` | `/organizations/{org}/metrics/` | Updates the blocking state of a metric. |
//! | `GET` | `/organizations/{org}/metrics/{mri}/` | Details of a single metric. |
//! | `GET` | `/organizations/{org}/metrics/tags/` | Visible tag keys of a metric. |
//! | `GET` | `/organizations/{org}/metrics/tags/{tag}/` | Visible values of a tag. |
//! | `POST` | `/internal/metrics/store/` | Writes metric observations. |
//! | `GET` | `/healthcheck/live/` | Liveness check. |
//!
//! All metrics endpoints require a bearer token with one of the `org:read`, `org:write` or
//! `org:admin` scopes. Writing observations requires `org:write` or `org:admin`.
//!
//! Errors are returned as JSON objects with a `detail` message and the chain of `causes`.
//!
//! See the [`Config`] documentation for more information on configuration options.
#![warn(missing_docs)]

use std::sync::Arc;

use sieve_config::Config;

mod constants;
mod endpoints;
mod extractors;
mod middlewares;
mod server;
mod service;
mod statsd;
mod utils;

#[cfg(test)]
mod testutils;

pub use self::server::{App, HttpServer, ServerError, make_app};
pub use self::service::{ServiceError, ServiceState};

/// Runs the sieve web server.
///
/// This boots the entire server application and blocks the current thread until a shutdown
/// signal is received or a fatal error happens.
pub fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("sieve-http")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let service = ServiceState::start(config.clone())?;
        HttpServer::new(config, service).serve().await?;
        Ok(())
    })
}
