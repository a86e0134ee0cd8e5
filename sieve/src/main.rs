//! The sieve binary.
//!
//! Sieve lists the metrics observed in the projects of an organization and controls their
//! visibility: metrics and individual tag keys can be blocked per project.
//!
//! # Running
//!
//! ```text
//! sieve run --config .sieve --port 3000
//! ```
//!
//! Without a `redis` section in the config, the string index and blocking state are held in
//! memory and lost on restart. Build with the `redis` feature to persist them.
//!
//! To inspect the effective configuration including all overrides, run `sieve config show`.

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            sieve_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
