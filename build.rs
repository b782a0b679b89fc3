//! Stamps the binary with the commit and build time shown by `storefront --version`.
//!
//! Either value can be pinned through the environment for reproducible builds.

use std::process::Command;

const COMMIT_VAR: &str = "STOREFRONT_BUILD_GIT_HASH";
const TIMESTAMP_VAR: &str = "STOREFRONT_BUILD_TIMESTAMP";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    for var in [COMMIT_VAR, TIMESTAMP_VAR] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let commit = pinned_or(COMMIT_VAR, "git", &["rev-parse", "--short=12", "HEAD"]);
    let built = pinned_or(TIMESTAMP_VAR, "date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]);
    println!("cargo:rustc-env={COMMIT_VAR}={commit}");
    println!("cargo:rustc-env={TIMESTAMP_VAR}={built}");
}

fn pinned_or(var: &str, program: &str, args: &[&str]) -> String {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| command_output(program, args))
        .unwrap_or_else(|| "unknown".to_string())
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
