use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Type of the layer returned by [`trace_http_layer`].
pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    DefaultMakeSpan,
    tower_http::trace::DefaultOnRequest,
    DefaultOnResponse,
>;

/// Creates a layer that wraps requests in a debug span.
///
/// Responses are logged at trace level and server errors at debug level. Server errors that need
/// attention are logged by the handlers themselves.
pub fn trace_http_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::TRACE))
        .on_failure(DefaultOnFailure::new().level(Level::DEBUG))
}
