/// The value of the `Server` response header.
pub const SERVER: &str = concat!("sieve/", env!("CARGO_PKG_VERSION"));

/// Scopes that grant read access to metrics of an organization.
pub const READ_SCOPES: &[&str] = &["org:read", "org:write", "org:admin"];

/// Scopes that allow writing observations into metric storage.
pub const WRITE_SCOPES: &[&str] = &["org:write", "org:admin"];
