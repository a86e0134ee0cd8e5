//! Middlewares for the HTTP server.
//!
//! See [`make_app`](crate::server) for where these middlewares are registered.

mod handle_panic;
mod metrics;
mod normalize_path;
mod trace;

pub use self::handle_panic::*;
pub use self::metrics::*;
pub use self::normalize_path::*;
pub use self::trace::*;
