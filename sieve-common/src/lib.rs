//! Common functionality for the sieve crates.
#![warn(missing_docs)]

mod macros;
mod time;

pub use self::time::*;
