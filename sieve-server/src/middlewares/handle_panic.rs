use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sieve_statsd::metric;
pub use tower_http::catch_panic::CatchPanicLayer;

use crate::statsd::ServerCounters;
use crate::utils::ApiErrorResponse;

/// Handler function for the [`CatchPanicLayer`] middleware.
///
/// The panic message is logged, but never returned to the client.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("no error details");

    sieve_log::error!(panic = message, "panic in request handler");
    metric!(counter(ServerCounters::HandlerPanic) += 1);

    let body = ApiErrorResponse::with_detail("internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_is_hidden() {
        let captures = sieve_statsd::with_capturing_test_client(|| {
            let response = handle_panic(Box::new("secret state"));
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        });

        assert_eq!(captures, ["server.handler_panic:1|c"]);
    }
}
