use super::*;
use crate::registry::normalize_target;

#[test]
fn test_client_config_default() {
    let config = ClientConfig::new();
    assert_eq!(config.timeout_seconds, 30);
    assert_eq!(config.max_idle_per_host, 10);
}

#[test]
fn test_client_config_builder_chaining() {
    let config = ClientConfig::new()
        .with_timeout(120)
        .with_max_idle_per_host(50);
    assert_eq!(config.timeout_seconds, 120);
    assert_eq!(config.max_idle_per_host, 50);
}

#[test]
fn test_client_with_custom_config() {
    let client = Client::with_config(ClientConfig::new().with_timeout(5)).unwrap();
    assert_eq!(client.timeout_seconds(), 5);
}

#[test]
fn test_manifest_response_status_helpers() {
    let response = ManifestResponse {
        status: 401,
        digest: None,
        challenge: Some("Bearer realm=\"x\"".to_string()),
        body: Vec::new(),
    };
    assert!(response.is_unauthorized());
    assert!(!response.is_success());
}

#[test]
fn test_get_manifest_returns_non_success_status() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/v2/app/manifests/latest")
        .with_status(404)
        .with_body("not found")
        .create();

    let target = normalize_target(Some(&server.url()), "app", "latest");
    let response = Client::new()
        .unwrap()
        .get_manifest(&target, "application/json", None)
        .unwrap();

    mock.assert();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, b"not found");
    assert_eq!(response.digest, None);
}

#[test]
fn test_get_manifest_sends_accept_and_authorization() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/v2/app/manifests/1.0")
        .match_header("accept", "application/vnd.test+json")
        .match_header("authorization", "Bearer t0k3n")
        .with_status(200)
        .with_header("Docker-Content-Digest", " sha256:abc ")
        .with_header("WWW-Authenticate", "")
        .create();

    let target = normalize_target(Some(&server.url()), "app", "1.0");
    let response = Client::new()
        .unwrap()
        .get_manifest(&target, "application/vnd.test+json", Some("Bearer t0k3n"))
        .unwrap();

    mock.assert();
    assert!(response.is_success());
    assert_eq!(response.digest.as_deref(), Some("sha256:abc"));
    assert_eq!(response.challenge, None);
}

#[test]
fn test_get_manifest_connection_refused_is_registry_error() {
    // Port 9 (discard) on localhost is closed in test environments.
    let target = normalize_target(Some("http://127.0.0.1:9"), "app", "latest");
    let err = Client::with_config(ClientConfig::new().with_timeout(2))
        .unwrap()
        .get_manifest(&target, "application/json", None)
        .unwrap_err();

    assert!(matches!(err, SyncError::Registry { .. }));
}

#[test]
fn test_fetch_token_server_error_is_registry_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/token")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create();

    let target = normalize_target(Some(&server.url()), "app", "latest");
    let challenge = AuthChallenge {
        scheme: "Bearer".to_string(),
        realm: format!("{}/token", server.url()),
        service: None,
        scope: None,
    };

    let err = Client::new()
        .unwrap()
        .fetch_token(&target, &challenge, &Credentials::Anonymous)
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Registry {
            status_code: Some(500),
            ..
        }
    ));
}

#[test]
fn test_fetch_token_empty_body_is_auth_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/token")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create();

    let target = normalize_target(Some(&server.url()), "app", "latest");
    let challenge = AuthChallenge {
        scheme: "Bearer".to_string(),
        realm: format!("{}/token", server.url()),
        service: Some("registry.test".to_string()),
        scope: None,
    };

    let err = Client::new()
        .unwrap()
        .fetch_token(&target, &challenge, &Credentials::Anonymous)
        .unwrap_err();

    assert!(err.is_auth());
}
