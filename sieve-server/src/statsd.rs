use sieve_statsd::{CounterMetric, TimerMetric};

/// Counter metrics for the HTTP server.
pub enum ServerCounters {
    /// Incremented when the HTTP server starts listening.
    ServerStarting,
    /// Incremented for every handled request.
    ///
    /// This metric is tagged with:
    ///  - `route`: The matched route, for example `/organizations/{org}/metrics/`.
    ///  - `method`: The HTTP method.
    ///  - `status_code`: The response status code.
    Requests,
    /// Incremented for every request rejected by authentication or missing scopes.
    ///
    /// This metric is tagged with:
    ///  - `reason`: `missing`, `unknown` or `forbidden`.
    AuthRejected,
    /// Incremented when a request handler panicked.
    HandlerPanic,
}

impl CounterMetric for ServerCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::ServerStarting => "server.starting",
            Self::Requests => "requests",
            Self::AuthRejected => "requests.auth_rejected",
            Self::HandlerPanic => "server.handler_panic",
        }
    }
}

/// Timer metrics for the HTTP server.
pub enum ServerTimers {
    /// Total time spent handling a request.
    ///
    /// This metric is tagged with:
    ///  - `route`: The matched route.
    ///  - `method`: The HTTP method.
    RequestDuration,
}

impl TimerMetric for ServerTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::RequestDuration => "requests.duration",
        }
    }
}
