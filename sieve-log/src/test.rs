use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub fn __init_test(crate_name: &'static str) {
    // Errors from dependencies, everything from sieve and the calling crate.
    let env_filter = [crate::TARGET_PREFIX, crate_name]
        .into_iter()
        .filter_map(|target| format!("{target}=TRACE").parse().ok())
        .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive);

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

/// Initialize the logger for testing.
///
/// This logs to the stdout registered by the Rust test runner, and only captures logs from the
/// calling crate and the sieve crates.
///
/// # Example
///
/// ```ignore
/// sieve_log::init_test!();
/// ```
#[macro_export]
macro_rules! init_test {
    () => {
        $crate::__init_test(::std::env!("CARGO_CRATE_NAME"));
    };
}
