use super::*;
use std::str::FromStr;

#[test]
fn test_reference_simple_name_defaults() {
    let reference = ImageReference::parse("consul").unwrap();
    assert_eq!(reference.registry(), None);
    assert_eq!(reference.registry_or_default(), "registry.hub.docker.com");
    assert_eq!(reference.repository(), "consul");
    assert_eq!(reference.tag(), "latest");
    assert!(!reference.has_explicit_tag());
}

#[test]
fn test_reference_missing_tag_yields_latest() {
    for raw in [
        "alpine",
        "team/app",
        "localhost/app",
        "localhost:5000/app",
        "myregistry.example.com/deep/path/app",
    ] {
        let reference = ImageReference::parse(raw).unwrap();
        assert_eq!(reference.tag(), "latest", "input: {}", raw);
    }
}

#[test]
fn test_reference_with_tag() {
    let reference = ImageReference::parse("alpine:3.10").unwrap();
    assert_eq!(reference.registry(), None);
    assert_eq!(reference.repository(), "alpine");
    assert_eq!(reference.tag(), "3.10");
    assert!(reference.has_explicit_tag());
}

#[test]
fn test_reference_with_registry() {
    let reference = ImageReference::parse("myregistry.example.com/alpine:3.10").unwrap();
    assert_eq!(reference.registry(), Some("myregistry.example.com"));
    assert_eq!(reference.repository(), "alpine");
    assert_eq!(reference.tag(), "3.10");
}

#[test]
fn test_reference_registry_with_port_and_no_tag() {
    let reference = ImageReference::parse("localhost:5000/team/app").unwrap();
    assert_eq!(reference.registry(), Some("localhost:5000"));
    assert_eq!(reference.repository(), "team/app");
    assert_eq!(reference.tag(), "latest");
}

#[test]
fn test_reference_localhost_registry() {
    let reference = ImageReference::parse("localhost/app:dev").unwrap();
    assert_eq!(reference.registry(), Some("localhost"));
    assert_eq!(reference.repository(), "app");
    assert_eq!(reference.tag(), "dev");
}

#[test]
fn test_reference_namespace_is_not_registry() {
    let reference = ImageReference::parse("hashicorp/consul:1.6").unwrap();
    assert_eq!(reference.registry(), None);
    assert_eq!(reference.repository(), "hashicorp/consul");
    assert_eq!(reference.tag(), "1.6");
}

#[test]
fn test_reference_with_digest() {
    let raw = "ghcr.io/user/app@sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";
    let reference = ImageReference::parse(raw).unwrap();
    assert_eq!(reference.registry(), Some("ghcr.io"));
    assert_eq!(reference.repository(), "user/app");
    assert_eq!(reference.tag(), "latest");
    assert!(reference.digest().unwrap().starts_with("sha256:"));
}

#[test]
fn test_reference_empty_fails() {
    for raw in ["", "   "] {
        let err = ImageReference::parse(raw).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }
}

#[test]
fn test_reference_empty_components_fail() {
    for raw in ["repo:", "myregistry.example.com/", "a//b", "app@"] {
        assert!(ImageReference::parse(raw).is_err(), "input: {}", raw);
    }
}

#[test]
fn test_reference_from_str() {
    let reference = ImageReference::from_str("ghcr.io/user/repo:v1").unwrap();
    assert_eq!(reference.repository(), "user/repo");
}

#[test]
fn test_reference_display_fills_tag() {
    let reference = ImageReference::parse("myregistry.example.com/alpine").unwrap();
    assert_eq!(reference.to_string(), "myregistry.example.com/alpine:latest");
    assert_eq!(reference.name(), "myregistry.example.com/alpine");
}

#[test]
fn test_tag_qualified() {
    assert_eq!(tag_qualified("consul").unwrap(), "consul:latest");
    assert_eq!(
        tag_qualified("myregistry.example.com/alpine:3.10").unwrap(),
        "myregistry.example.com/alpine:3.10"
    );
    assert_eq!(
        tag_qualified("localhost:5000/app").unwrap(),
        "localhost:5000/app:latest"
    );
    assert!(tag_qualified("").is_err());
}

#[test]
fn test_canonical_registry_maps_hub_aliases() {
    for host in ["docker.io", "index.docker.io", "registry-1.docker.io"] {
        assert_eq!(canonical_registry(host), DEFAULT_REGISTRY, "host: {}", host);
    }
    assert_eq!(canonical_registry("registry.hub.docker.com"), DEFAULT_REGISTRY);
    assert_eq!(canonical_registry("localhost:5000"), "localhost:5000");
}

#[test]
fn test_is_default_registry() {
    assert!(ImageReference::parse("alpine").unwrap().is_default_registry());
    assert!(ImageReference::parse("docker.io/alpine").unwrap().is_default_registry());
    assert!(
        ImageReference::parse("index.docker.io/team/app")
            .unwrap()
            .is_default_registry()
    );
    assert!(!ImageReference::parse("ghcr.io/alpine").unwrap().is_default_registry());
}

#[test]
fn test_store_key_matches_engine_names() {
    let cases = [
        ("alpine", "alpine:latest"),
        ("alpine:3.10", "alpine:3.10"),
        ("docker.io/alpine:3.10", "alpine:3.10"),
        ("docker.io/library/alpine:3.10", "alpine:3.10"),
        ("index.docker.io/team/app:1.0", "team/app:1.0"),
        ("library/alpine", "alpine:latest"),
        ("myregistry.example.com/alpine:3.10", "myregistry.example.com/alpine:3.10"),
        ("localhost:5000/consul", "localhost:5000/consul:latest"),
        ("ghcr.io/team/app@sha256:abc", "ghcr.io/team/app:latest"),
    ];
    for (raw, expected) in cases {
        assert_eq!(
            ImageReference::parse(raw).unwrap().store_key(),
            expected,
            "input: {}",
            raw
        );
    }
}
