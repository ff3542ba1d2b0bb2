//! Dependency-direction conformance for the fork isolation boundary.
//!
//! Upstream crates may be depended upon by fork crates, never the
//! reverse. Walking the workspace manifests keeps the rule automated
//! instead of a convention in a comment.

use std::fs;
use std::path::{Path, PathBuf};

/// Crates that track upstream and must stay fork-agnostic.
const UPSTREAM: &[&str] = &[
    "mailhub-core",
    "mailhub-backend",
    "mailhub-hooks",
    "mailhub-storage",
    "mailhub-ingest",
];

/// Fork-specific crates, reachable only from the composition root.
const FORK: &[&str] = &["mailhub-postgres", "mailhub-webhooks"];

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn read_manifest(path: &Path) -> toml::Value {
    let raw = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    toml::from_str(&raw).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn dependency_names(manifest: &toml::Value) -> Vec<String> {
    let mut names = Vec::new();
    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        if let Some(table) = manifest.get(section).and_then(|v| v.as_table()) {
            names.extend(table.keys().cloned());
        }
    }
    names
}

#[test]
fn test_upstream_crates_never_depend_on_fork_crates() {
    for member in UPSTREAM {
        let manifest = read_manifest(
            &workspace_root()
                .join("crates")
                .join(member)
                .join("Cargo.toml"),
        );
        for dependency in dependency_names(&manifest) {
            assert!(
                !FORK.contains(&dependency.as_str()),
                "upstream crate '{member}' depends on fork crate '{dependency}'"
            );
        }
    }
}

#[test]
fn test_every_workspace_member_is_classified() {
    let manifest = read_manifest(&workspace_root().join("Cargo.toml"));
    let members = manifest["workspace"]["members"]
        .as_array()
        .expect("workspace members");

    for member in members {
        let name = member
            .as_str()
            .expect("member path")
            .trim_start_matches("crates/");
        assert!(
            UPSTREAM.contains(&name) || FORK.contains(&name),
            "workspace member '{name}' is not classified as upstream or fork"
        );
    }
}

#[test]
fn test_fork_crates_are_optional_feature_gated_root_dependencies() {
    let manifest = read_manifest(&workspace_root().join("Cargo.toml"));
    let dependencies = manifest["dependencies"].as_table().expect("dependencies");
    let features = manifest["features"].as_table().expect("features");

    for fork in FORK {
        let dependency = dependencies
            .get(*fork)
            .unwrap_or_else(|| panic!("root does not declare fork crate '{fork}'"));
        assert_eq!(
            dependency.get("optional").and_then(|v| v.as_bool()),
            Some(true),
            "fork crate '{fork}' must be an optional root dependency"
        );

        let gate = format!("dep:{fork}");
        let gated = features.values().any(|flags| {
            flags
                .as_array()
                .is_some_and(|flags| flags.iter().any(|f| f.as_str() == Some(gate.as_str())))
        });
        assert!(gated, "fork crate '{fork}' is not gated behind a cargo feature");
    }
}

#[test]
fn test_fork_crates_may_depend_on_upstream() {
    // Sanity check of the allowed direction: the webhook crate builds on
    // the upstream hook and ingest crates.
    let manifest = read_manifest(
        &workspace_root()
            .join("crates")
            .join("mailhub-webhooks")
            .join("Cargo.toml"),
    );
    let names = dependency_names(&manifest);
    assert!(names.iter().any(|n| n == "mailhub-hooks"));
    assert!(names.iter().any(|n| n == "mailhub-ingest"));
}
