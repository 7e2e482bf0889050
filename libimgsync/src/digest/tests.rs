use super::*;
use std::str::FromStr;

#[test]
fn test_digest_from_string_is_opaque() {
    let digest = Digest::from_str("sha256:abc").unwrap();
    assert_eq!(digest.as_str(), "sha256:abc");
}

#[test]
fn test_digest_trims_whitespace() {
    let digest = Digest::from_str("  sha256:abc \n").unwrap();
    assert_eq!(digest.to_string(), "sha256:abc");
}

#[test]
fn test_digest_empty_fails() {
    let digest = Digest::from_str("");
    assert!(matches!(digest.unwrap_err(), SyncError::Parse { .. }));
}

#[test]
fn test_digest_sha256_of_bytes() {
    let digest = Digest::sha256(b"test blob content");
    assert!(digest.as_str().starts_with("sha256:"));
    assert_eq!(digest.as_str().len(), "sha256:".len() + 64);
    assert_eq!(digest, Digest::sha256(b"test blob content"));
}

#[test]
fn test_digest_serializes_as_string() {
    let digest = Digest::from_str("sha256:abc").unwrap();
    assert_eq!(serde_json::to_string(&digest).unwrap(), "\"sha256:abc\"");
}
