use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use sieve_statsd::metric;

use crate::statsd::{ServerCounters, ServerTimers};

/// A middleware that records request metrics.
///
/// Must be registered on the router so the matched route is known.
pub async fn metrics(matched: Option<MatchedPath>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = matched.as_ref().map_or("unknown", MatchedPath::as_str).to_owned();
    let method = request.method().clone();

    let response = next.run(request).await;

    metric!(
        timer(ServerTimers::RequestDuration) = start.elapsed(),
        route = &route,
        method = method.as_str(),
    );
    metric!(
        counter(ServerCounters::Requests) += 1,
        route = &route,
        method = method.as_str(),
        status_code = response.status().as_str(),
    );

    response
}
