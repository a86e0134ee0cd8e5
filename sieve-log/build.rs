use std::env;
use std::process::{Command, Stdio};

/// Returns the git revision of the checkout, if available.
fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .stderr(Stdio::inherit())
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

fn main() {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();

    match git_revision() {
        Some(revision) => println!("cargo:rustc-env=SIEVE_RELEASE=sieve@{version}+{revision}"),
        None => println!("cargo:rustc-env=SIEVE_RELEASE=sieve@{version}"),
    }

    println!("cargo:rerun-if-changed=build.rs");
}
