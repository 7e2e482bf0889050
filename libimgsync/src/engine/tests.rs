use super::*;
use mockito::Matcher;
use std::io::Cursor;

const PUSH_STREAM: &str = r#"{"status":"The push refers to repository [myregistry.example.com/alpine]"}
{"status":"Preparing","progressDetail":{},"id":"1bfeebd65323"}
{"status":"Pushed","progressDetail":{},"id":"1bfeebd65323"}
{"status":"3.10: digest: sha256:451eee8bedcb2f029756dc3e9d73bab0e7943c1ac55cff3a4861c52a0fdd3e98 size: 528"}
{"progressDetail":{},"aux":{"Tag":"3.10","Digest":"sha256:451eee8bedcb2f029756dc3e9d73bab0e7943c1ac55cff3a4861c52a0fdd3e98","Size":528}}
"#;

const PUSHED_DIGEST: &str =
    "sha256:451eee8bedcb2f029756dc3e9d73bab0e7943c1ac55cff3a4861c52a0fdd3e98";

fn drain(input: &str, cancellation: &Cancellation) -> Result<Option<Digest>> {
    consume_stream(
        Cursor::new(input.to_string()),
        "push",
        "https://myregistry.example.com",
        &mut |_| {},
        cancellation,
    )
}

#[test]
fn test_progress_event_digest_from_aux() {
    let event = ProgressEvent::parse_line(
        r#"{"aux":{"Tag":"latest","Digest":"sha256:aaa","Size":10}}"#,
    )
    .unwrap();
    assert_eq!(event.digest().unwrap().as_str(), "sha256:aaa");
    assert_eq!(event.aux.unwrap().size, Some(10));
}

#[test]
fn test_progress_event_without_digest() {
    let event = ProgressEvent::parse_line(r#"{"status":"Pushed","id":"abc"}"#).unwrap();
    assert!(event.digest().is_none());
    assert!(event.error_message().is_none());
}

#[test]
fn test_progress_event_error_detail_only() {
    let event =
        ProgressEvent::parse_line(r#"{"errorDetail":{"message":"manifest invalid"}}"#).unwrap();
    assert_eq!(event.error_message(), Some("manifest invalid"));
}

#[test]
fn test_progress_event_malformed_line() {
    let err = ProgressEvent::parse_line("not json").unwrap_err();
    assert!(matches!(err, SyncError::Engine { .. }));
}

#[test]
fn test_is_auth_failure() {
    assert!(is_auth_failure("unauthorized: authentication required"));
    assert!(is_auth_failure("denied: requested access to the resource is denied"));
    assert!(!is_auth_failure("blob upload unknown"));
}

#[test]
fn test_consume_stream_returns_final_digest() {
    let digest = drain(PUSH_STREAM, &Cancellation::new()).unwrap();
    assert_eq!(digest.unwrap().as_str(), PUSHED_DIGEST);
}

#[test]
fn test_consume_stream_hands_every_event_to_sink() {
    let mut seen = Vec::new();
    consume_stream(
        Cursor::new(PUSH_STREAM),
        "push",
        "registry",
        &mut |event| seen.push(event.clone()),
        &Cancellation::new(),
    )
    .unwrap();

    assert_eq!(seen.len(), 5);
    assert_eq!(seen[1].id.as_deref(), Some("1bfeebd65323"));
}

#[test]
fn test_consume_stream_without_digest() {
    let stream = "{\"status\":\"Pulling from library/alpine\"}\n\n{\"status\":\"Done\"}\n";
    assert_eq!(drain(stream, &Cancellation::new()).unwrap(), None);
}

#[test]
fn test_consume_stream_error_event_is_engine_error() {
    let stream = concat!(
        "{\"status\":\"Preparing\"}\n",
        "{\"error\":\"blob upload invalid\",\"errorDetail\":{\"message\":\"blob upload invalid\"}}\n",
    );
    let err = drain(stream, &Cancellation::new()).unwrap_err();
    assert!(matches!(err, SyncError::Engine { .. }));
    assert!(err.to_string().contains("blob upload invalid"));
}

#[test]
fn test_consume_stream_denied_is_auth_error() {
    let stream = "{\"error\":\"denied: requested access to the resource is denied\"}\n";
    let err = drain(stream, &Cancellation::new()).unwrap_err();
    match err {
        SyncError::Auth { registry, .. } => {
            assert_eq!(registry, "https://myregistry.example.com")
        }
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[test]
fn test_consume_stream_already_cancelled() {
    let cancellation = Cancellation::new();
    cancellation.cancel();

    let err = drain(PUSH_STREAM, &cancellation).unwrap_err();
    assert!(matches!(err, SyncError::Cancelled { .. }));
}

#[test]
fn test_consume_stream_cancelled_mid_stream() {
    let cancellation = Cancellation::new();
    let handle = cancellation.clone();
    let mut events = 0;

    let err = consume_stream(
        Cursor::new(PUSH_STREAM),
        "push",
        "registry",
        &mut |_| {
            events += 1;
            handle.cancel();
        },
        &cancellation,
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled { .. }));
    assert_eq!(events, 1);
}

/// Reader whose reads block on the engine and observe a cancel meanwhile.
struct CancelDuringRead {
    inner: Cursor<&'static str>,
    handle: Cancellation,
}

impl std::io::Read for CancelDuringRead {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.handle.cancel();
        std::io::Read::read(&mut self.inner, buf)
    }
}

#[test]
fn test_consume_stream_cancel_during_blocked_read_discards_event() {
    let cancellation = Cancellation::new();
    let reader = std::io::BufReader::new(CancelDuringRead {
        inner: Cursor::new(PUSH_STREAM),
        handle: cancellation.clone(),
    });
    let mut events = 0;

    let err = consume_stream(reader, "push", "registry", &mut |_| events += 1, &cancellation)
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled { .. }));
    assert_eq!(events, 0);
}

#[test]
fn test_image_record_has_tag_matches_hub_aliases() {
    let record = ImageRecord {
        id: "sha256:be4e".to_string(),
        repo_tags: vec!["alpine:3.10".to_string(), "team/app:1.0".to_string()],
        ..Default::default()
    };

    assert!(record.has_tag("alpine:3.10"));
    assert!(record.has_tag("docker.io/library/alpine:3.10"));
    assert!(record.has_tag("index.docker.io/team/app:1.0"));
    assert!(!record.has_tag("docker.io/library/alpine:3.11"));
    assert!(!record.has_tag("ghcr.io/team/app:1.0"));
}

#[test]
fn test_image_record_from_engine_json() {
    let json = r#"[
        {"Id":"sha256:be4e","ParentId":"","RepoTags":["alpine:3.10","myregistry.example.com/alpine:3.10"],
         "RepoDigests":["alpine@sha256:451e","myregistry.example.com/alpine@sha256:451e"],"Size":5581746},
        {"Id":"sha256:dead","RepoTags":null,"RepoDigests":null}
    ]"#;
    let records: Vec<ImageRecord> = serde_json::from_str(json).unwrap();

    assert_eq!(records.len(), 2);
    assert!(records[0].has_tag("myregistry.example.com/alpine:3.10"));
    assert!(!records[0].has_tag("myregistry.example.com/alpine"));
    assert_eq!(
        records[0]
            .repo_digest_for("myregistry.example.com/alpine")
            .unwrap()
            .as_str(),
        "sha256:451e"
    );
    assert!(records[1].repo_tags.is_empty());
    assert!(records[1].digest.is_none());
}

#[test]
fn test_engine_base_url() {
    assert_eq!(
        engine_base_url("tcp://127.0.0.1:2375", false).unwrap(),
        "http://127.0.0.1:2375"
    );
    assert_eq!(
        engine_base_url("tcp://docker.internal:2376/", true).unwrap(),
        "https://docker.internal:2376"
    );
    assert_eq!(
        engine_base_url("http://127.0.0.1:9999", true).unwrap(),
        "http://127.0.0.1:9999"
    );
    assert!(matches!(
        engine_base_url("", false).unwrap_err(),
        SyncError::Config { .. }
    ));
    assert!(engine_base_url("npipe:////./pipe/docker_engine", false).is_err());
}

#[test]
fn test_tls_material_from_cert_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ca.pem"), "CA").unwrap();
    std::fs::write(dir.path().join("cert.pem"), "CERT").unwrap();
    std::fs::write(dir.path().join("key.pem"), "KEY").unwrap();

    let material = TlsMaterial::from_cert_path(dir.path()).unwrap();
    assert_eq!(material.ca, "CA");
    assert_eq!(material.key, "KEY");
    assert!(!format!("{:?}", material).contains("KEY"));
}

#[test]
fn test_tls_material_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ca.pem"), "CA").unwrap();

    let err = TlsMaterial::from_cert_path(dir.path()).unwrap_err();
    assert!(matches!(err, SyncError::Config { path: Some(_), .. }));
}

#[test]
fn test_tls_with_invalid_pem_is_config_error() {
    let material = TlsMaterial {
        ca: "garbage".to_string(),
        cert: "garbage".to_string(),
        key: "garbage".to_string(),
    };
    let err = HttpEngine::with_config(
        "tcp://127.0.0.1:2376",
        Some(&material),
        &ClientConfig::default(),
        DEFAULT_STREAM_TIMEOUT,
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Config { .. }));
}

#[test]
fn test_http_engine_tag_image() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/images/alpine:3.10/tag")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("repo".into(), "myregistry.example.com/alpine".into()),
            Matcher::UrlEncoded("tag".into(), "3.10".into()),
        ]))
        .with_status(201)
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    engine
        .tag_image("alpine:3.10", "myregistry.example.com/alpine", "3.10")
        .unwrap();
    mock.assert();
}

#[test]
fn test_http_engine_tag_missing_image() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/images/ghost:1.0/tag")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"message":"No such image: ghost:1.0"}"#)
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    let err = engine.tag_image("ghost:1.0", "x/ghost", "1.0").unwrap_err();

    assert!(matches!(err, SyncError::Engine { .. }));
    assert!(err.to_string().contains("No such image: ghost:1.0"));
}

#[test]
fn test_http_engine_push_sends_registry_auth() {
    let auth = RegistryAuth::for_registry(
        "https://myregistry.example.com",
        &crate::auth::Credentials::basic("user", "pass"),
    );
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/images/myregistry.example.com/alpine/push")
        .match_query(Matcher::UrlEncoded("tag".into(), "3.10".into()))
        .match_header(REGISTRY_AUTH_HEADER, auth.to_header_value().unwrap().as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PUSH_STREAM)
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    let mut events = 0;
    let digest = engine
        .push_image(
            "myregistry.example.com/alpine",
            "3.10",
            &auth,
            &mut |_| events += 1,
            &Cancellation::new(),
        )
        .unwrap();

    mock.assert();
    assert_eq!(events, 5);
    assert_eq!(digest.unwrap().as_str(), PUSHED_DIGEST);
}

#[test]
fn test_http_engine_push_cancelled_before_request() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();

    let cancellation = Cancellation::new();
    cancellation.cancel();

    let engine = HttpEngine::new(&server.url()).unwrap();
    let err = engine
        .push_image(
            "myregistry.example.com/alpine",
            "3.10",
            &RegistryAuth::default(),
            &mut |_| {},
            &cancellation,
        )
        .unwrap_err();

    mock.assert();
    assert!(matches!(err, SyncError::Cancelled { .. }));
}

#[test]
fn test_http_engine_pull_image() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/images/create")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fromImage".into(), "alpine".into()),
            Matcher::UrlEncoded("tag".into(), "3.10".into()),
        ]))
        .match_header(REGISTRY_AUTH_HEADER, Matcher::Any)
        .with_status(200)
        .with_body("{\"status\":\"Pulling from library/alpine\"}\n{\"status\":\"Status: Downloaded newer image for alpine:3.10\"}\n")
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    engine
        .pull_image(
            "alpine",
            "3.10",
            &RegistryAuth::default(),
            &mut |_| {},
            &Cancellation::new(),
        )
        .unwrap();
    mock.assert();
}

#[test]
fn test_http_engine_pull_denied() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/images/create")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{\"error\":\"pull access denied for private/app\"}\n")
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    let err = engine
        .pull_image(
            "private/app",
            "latest",
            &RegistryAuth::default(),
            &mut |_| {},
            &Cancellation::new(),
        )
        .unwrap_err();

    match err {
        SyncError::Auth { registry, .. } => assert_eq!(registry, "registry.hub.docker.com"),
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[test]
fn test_http_engine_list_images_with_reference_filter() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/images/json")
        .match_query(Matcher::UrlEncoded(
            "filters".into(),
            r#"{"reference":["myregistry.example.com/alpine:3.10"]}"#.into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"Id":"sha256:be4e","RepoTags":["myregistry.example.com/alpine:3.10"],"RepoDigests":[]}]"#)
        .create();

    let engine = HttpEngine::new(&server.url()).unwrap();
    let images = engine
        .list_images(Some("myregistry.example.com/alpine:3.10"))
        .unwrap();

    mock.assert();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, "sha256:be4e");
}

#[test]
fn test_http_engine_unreachable() {
    let engine = HttpEngine::with_config(
        "tcp://127.0.0.1:9",
        None,
        &ClientConfig::new().with_timeout(2),
        DEFAULT_STREAM_TIMEOUT,
    )
    .unwrap();

    let err = engine.list_images(None).unwrap_err();
    assert!(matches!(err, SyncError::Engine { .. }));
}
