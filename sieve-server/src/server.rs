use std::sync::Arc;

use axum::ServiceExt;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderValue, header};
use axum_server::Handle;
use sieve_config::Config;
use sieve_statsd::metric;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::constants;
use crate::endpoints;
use crate::middlewares::{self, CatchPanicLayer, NormalizePath};
use crate::service::ServiceState;
use crate::statsd::ServerCounters;

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or serving failed.
    #[error("bind to interface failed")]
    BindFailed(#[from] std::io::Error),
}

/// The application with all routes and middlewares.
pub type App = NormalizePath<axum::Router>;

/// Builds the axum application with all routes and middleware.
pub fn make_app(service: ServiceState) -> App {
    // Layers added first are called first: requests go from top to bottom, responses from bottom
    // to top.
    let middleware = ServiceBuilder::new()
        .layer(axum::middleware::from_fn(middlewares::metrics))
        .layer(CatchPanicLayer::custom(middlewares::handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(constants::SERVER),
        ))
        .layer(middlewares::trace_http_layer())
        .layer(DefaultBodyLimit::max(service.config().max_body_size()));

    let router = endpoints::routes().layer(middleware).with_state(service);

    // Rewriting the path must happen before routing, so this wraps the router.
    NormalizePath::new(router)
}

/// HTTP server hosting the metrics API.
///
/// The server stops on `SIGINT` and gives in-flight requests until the configured shutdown
/// timeout to complete.
pub struct HttpServer {
    config: Arc<Config>,
    service: ServiceState,
}

impl HttpServer {
    /// Creates the server for the configured listen address.
    pub fn new(config: Arc<Config>, service: ServiceState) -> Self {
        Self { config, service }
    }

    /// Binds the listen address and serves requests until a shutdown signal is received.
    pub async fn serve(self) -> Result<(), ServerError> {
        let Self { config, service } = self;

        let addr = config.listen_addr();
        let handle = Handle::new();
        let app = ServiceExt::<Request>::into_make_service(make_app(service));

        let shutdown_timeout = config.shutdown_timeout();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                sieve_log::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to listen for shutdown signal"
                );
                return;
            }

            sieve_log::info!("shutting down HTTP server");
            shutdown.graceful_shutdown(Some(shutdown_timeout));
        });

        sieve_log::info!("spawning http server");
        sieve_log::info!("  listening on http://{addr}/");
        metric!(counter(ServerCounters::ServerStarting) += 1);

        axum_server::bind(addr)
            .handle(handle)
            .serve(app)
            .await?;

        sieve_log::info!("HTTP server stopped");
        Ok(())
    }
}
