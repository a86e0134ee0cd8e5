//! Configuration for the sieve metrics visibility service.
//!
//! The configuration is loaded from a `config.yml` file in a configuration folder. All sections
//! are optional and fall back to defaults suitable for local development, which use in-memory
//! backends and listen on localhost.
//!
//! ```yaml
//! http:
//!   host: 0.0.0.0
//!   port: 3000
//! redis: redis://127.0.0.1:6379
//! indexer:
//!   cache_size: 100000
//! auth:
//!   tokens:
//!     - token: secret
//!       scopes: [org:read]
//! ```
#![warn(missing_docs)]

mod config;

pub use self::config::*;
