//! Basic types for the sieve API schema used across multiple crates.

#![warn(missing_docs)]

pub mod metrics;
pub mod organization;
pub mod project;
