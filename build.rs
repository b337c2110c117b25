// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=CURIO_VERSION");

    // Packagers can pin the version without a git checkout
    let version = std::env::var("CURIO_VERSION").unwrap_or_else(|_| build_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Crate version with the short commit appended when building from git
/// (e.g. "0.1.0+3f2a9c1"), or the bare crate version otherwise.
fn build_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match short_commit_hash() {
        Some(hash) => format!("{}+{}", pkg_version, hash),
        None => pkg_version,
    }
}

fn short_commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if hash.is_empty() { None } else { Some(hash) }
}
