// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_RELAY_VERSION");

    // Packagers can pin the version string explicitly
    let version = std::env::var("CAMERA_RELAY_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Build a version string from git metadata.
///
/// - exact tag `v0.1.0` becomes `0.1.0-abcdef1`
/// - `v0.1.0-5-gabcdef1` (commits after a tag) becomes `0.1.0-dirty-abcdef1`
/// - no git at all falls back to the crate version
fn describe_version() -> String {
    let described = git(&["describe", "--tags", "--always", "--match", "v*"]);
    let commit = git(&["rev-parse", "--short", "HEAD"]);

    let Some(described) = described else {
        return match commit {
            Some(hash) => format!("{}-{}", env!("CARGO_PKG_VERSION"), hash),
            None => env!("CARGO_PKG_VERSION").to_string(),
        };
    };

    let described = described.strip_prefix('v').unwrap_or(&described).to_string();

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
        return format!("{}-dirty-{}", parts[2], hash);
    }

    match commit {
        Some(hash) if hash != described => format!("{}-{}", described, hash),
        _ => described,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
