//! Container engine client.
//!
//! The orchestrator only needs four engine operations (tag, push, pull and
//! list), expressed by the [`Engine`] trait. [`HttpEngine`] implements them
//! against the Docker Engine HTTP API over TCP, optionally with TLS client
//! authentication.

mod progress;

#[cfg(test)]
pub(crate) mod fake;

pub use progress::{ErrorDetail, ProgressEvent, PushAux, consume_stream, is_auth_failure};

use crate::auth::RegistryAuth;
use crate::client::ClientConfig;
use crate::config::EngineEndpoint;
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use crate::reference::ImageReference;
use reqwest::StatusCode;
use reqwest::blocking::{Client as ReqwestClient, RequestBuilder, Response};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Header carrying base64url-encoded registry credentials.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Upper bound for a single push or pull stream, in seconds.
pub const DEFAULT_STREAM_TIMEOUT: u64 = 1800;

/// Operations the orchestrator needs from a container engine.
pub trait Engine: Send + Sync {
    /// Adds the tag `repository:tag` to the local image `source`.
    fn tag_image(&self, source: &str, repository: &str, tag: &str) -> Result<()>;

    /// Pushes `name:tag` and returns the digest announced by the engine.
    fn push_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<Option<Digest>>;

    /// Pulls `name:tag` into the local image store.
    fn pull_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<()>;

    /// Lists local images, restricted to those matching `reference` when given.
    fn list_images(&self, reference: Option<&str>) -> Result<Vec<ImageRecord>>;
}

/// Shared flag aborting a streaming engine operation.
///
/// Clones observe the same flag, so one can be handed to a signal handler
/// while another travels with the push.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Takes effect at the next status event.
    ///
    /// A stream that sends nothing keeps the reader blocked until the engine
    /// writes another line or `engine.stream_timeout` expires; the flag is
    /// only seen between events.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A locally known image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageRecord {
    /// Engine image ID (`sha256:...` of the image config)
    pub id: String,
    /// Tag-qualified names pointing at this image
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repo_tags: Vec<String>,
    /// `repository@digest` entries for registries the image was pushed to or
    /// pulled from
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repo_digests: Vec<String>,
    /// Manifest digest reported by the push that produced this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl ImageRecord {
    /// Returns true when `tag_qualified` is one of the image's tags.
    ///
    /// Tags are compared by store key, so `docker.io/library/alpine:3.10`
    /// matches an engine tag of `alpine:3.10`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::engine::ImageRecord;
    ///
    /// let record = ImageRecord {
    ///     repo_tags: vec!["alpine:3.10".to_string()],
    ///     ..Default::default()
    /// };
    /// assert!(record.has_tag("docker.io/library/alpine:3.10"));
    /// assert!(!record.has_tag("ghcr.io/alpine:3.10"));
    /// ```
    pub fn has_tag(&self, tag_qualified: &str) -> bool {
        let wanted = ImageReference::parse(tag_qualified)
            .map(|r| r.store_key())
            .ok();
        self.repo_tags.iter().any(|tag| {
            tag == tag_qualified
                || wanted.as_ref().is_some_and(|key| {
                    ImageReference::parse(tag).is_ok_and(|r| &r.store_key() == key)
                })
        })
    }

    /// Returns the repo digest recorded for `repository` (`[registry/]repo`,
    /// no tag).
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::engine::ImageRecord;
    ///
    /// let record = ImageRecord {
    ///     repo_digests: vec!["ghcr.io/team/app@sha256:abc".to_string()],
    ///     ..Default::default()
    /// };
    /// assert_eq!(record.repo_digest_for("ghcr.io/team/app").unwrap().as_str(), "sha256:abc");
    /// assert!(record.repo_digest_for("team/app").is_none());
    /// ```
    pub fn repo_digest_for(&self, repository: &str) -> Option<Digest> {
        self.repo_digests.iter().find_map(|entry| {
            let (name, digest) = entry.split_once('@')?;
            (name == repository).then(|| digest.parse().ok()).flatten()
        })
    }
}

/// PEM-encoded TLS client material for the engine endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: String,
    pub cert: String,
    pub key: String,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca", &format_args!("{} bytes", self.ca.len()))
            .field("cert", &format_args!("{} bytes", self.cert.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

impl TlsMaterial {
    /// Reads `ca.pem`, `cert.pem` and `key.pem` from a directory.
    pub fn from_cert_path(dir: &Path) -> Result<Self> {
        let read = |file: &str| {
            let path = dir.join(file);
            std::fs::read_to_string(&path).map_err(|e| {
                SyncError::config_with_source(
                    format!("Failed to read {}", file),
                    Some(path.display().to_string()),
                    e,
                )
            })
        };

        Ok(Self {
            ca: read("ca.pem")?,
            cert: read("cert.pem")?,
            key: read("key.pem")?,
        })
    }
}

/// Converts an engine host into the base URL requests are sent to.
///
/// `tcp://` and bare `host:port` become `http://`, or `https://` when TLS is
/// configured; explicit `http(s)://` is kept. Unix sockets cannot be reached
/// by the HTTP client.
///
/// # Examples
///
/// ```
/// use libimgsync::engine::engine_base_url;
///
/// assert_eq!(engine_base_url("tcp://10.0.0.5:2376", true).unwrap(), "https://10.0.0.5:2376");
/// assert_eq!(engine_base_url("localhost:2375", false).unwrap(), "http://localhost:2375");
/// assert!(engine_base_url("unix:///var/run/docker.sock", false).is_err());
/// ```
pub fn engine_base_url(host: &str, tls: bool) -> Result<String> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(SyncError::config("engine host is empty", None::<String>));
    }
    if host.starts_with("unix://") || host.starts_with("npipe://") {
        return Err(SyncError::config(
            format!(
                "engine host {} is a local socket; expose the engine over tcp",
                host
            ),
            None::<String>,
        ));
    }

    if host.starts_with("http://") || host.starts_with("https://") {
        return Ok(host.to_string());
    }

    let scheme = if tls { "https" } else { "http" };
    let address = host.strip_prefix("tcp://").unwrap_or(host);
    Ok(format!("{}://{}", scheme, address))
}

#[derive(Deserialize)]
struct EngineMessage {
    message: String,
}

/// Docker Engine API client.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    base_url: String,
    http_client: ReqwestClient,
    timeout_seconds: u64,
    stream_timeout_seconds: u64,
}

impl HttpEngine {
    /// Connects to a plain-HTTP engine with default settings.
    pub fn new(host: &str) -> Result<Self> {
        Self::with_config(host, None, &ClientConfig::default(), DEFAULT_STREAM_TIMEOUT)
    }

    /// Connects as described by the engine configuration section.
    ///
    /// With SSH forwarding configured the client dials the forward's local
    /// address; the tunnel itself must already be up.
    pub fn from_endpoint(endpoint: &EngineEndpoint, client: &ClientConfig) -> Result<Self> {
        endpoint.validate()?;
        let tls = endpoint.tls_material()?;

        if let Some(forward) = &endpoint.forward {
            info!(
                local = %forward.local_address,
                remote = %forward.remote_address,
                end_host = %forward.end_host.address,
                "reaching engine through ssh forward"
            );
        }

        Self::with_config(
            endpoint.dial_address(),
            tls.as_ref(),
            client,
            endpoint.stream_timeout,
        )
    }

    /// Connects with explicit TLS material and timeouts.
    pub fn with_config(
        host: &str,
        tls: Option<&TlsMaterial>,
        client: &ClientConfig,
        stream_timeout_seconds: u64,
    ) -> Result<Self> {
        let base_url = engine_base_url(host, tls.is_some())?;

        let mut builder = ReqwestClient::builder()
            .timeout(Duration::from_secs(client.timeout_seconds))
            .pool_max_idle_per_host(client.max_idle_per_host)
            .user_agent(concat!("imgsync/", env!("CARGO_PKG_VERSION")));

        if let Some(material) = tls {
            let ca = reqwest::Certificate::from_pem(material.ca.as_bytes()).map_err(|e| {
                SyncError::config_with_source("Invalid engine CA certificate", None::<String>, e)
            })?;
            let identity_pem = format!("{}\n{}", material.cert, material.key);
            let identity = reqwest::Identity::from_pem(identity_pem.as_bytes()).map_err(|e| {
                SyncError::config_with_source(
                    "Invalid engine client certificate or key",
                    None::<String>,
                    e,
                )
            })?;
            builder = builder.add_root_certificate(ca).identity(identity);
        }

        let http_client = builder.build().map_err(|e| {
            SyncError::config_with_source("Failed to create engine client", None::<String>, e)
        })?;

        debug!(%base_url, tls = tls.is_some(), "engine client ready");
        Ok(Self {
            base_url,
            http_client,
            timeout_seconds: client.timeout_seconds,
            stream_timeout_seconds,
        })
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(&self, request: RequestBuilder, operation: &str, timeout: u64) -> Result<Response> {
        let response = request.send().map_err(|e| {
            let message = if e.is_timeout() {
                format!(
                    "{} timed out after {} seconds at {}",
                    operation, timeout, self.base_url
                )
            } else if e.is_connect() {
                format!("Failed to connect to engine at {}", self.base_url)
            } else {
                format!("{} failed at {}", operation, self.base_url)
            };
            SyncError::engine_with_source(message, e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<EngineMessage>(&body)
            .map(|m| m.message)
            .unwrap_or_else(|_| body.trim().to_string());

        Err(match status {
            StatusCode::NOT_FOUND => {
                SyncError::engine(format!("{}: no such image: {}", operation, message))
            }
            _ => SyncError::engine(format!(
                "{} failed with HTTP {}: {}",
                operation,
                status.as_u16(),
                message
            )),
        })
    }

    fn open_stream(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
        auth: &RegistryAuth,
        cancellation: &Cancellation,
    ) -> Result<BufReader<Response>> {
        if cancellation.is_cancelled() {
            return Err(SyncError::cancelled(operation));
        }

        let request = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .query(query)
            .header(REGISTRY_AUTH_HEADER, auth.to_header_value()?)
            .timeout(Duration::from_secs(self.stream_timeout_seconds));

        let response = self.send(request, operation, self.stream_timeout_seconds)?;
        Ok(BufReader::new(response))
    }
}

fn registry_of(name: &str, auth: &RegistryAuth) -> String {
    if !auth.server_address.is_empty() {
        return auth.server_address.clone();
    }
    ImageReference::parse(name)
        .map(|r| r.registry_or_default().to_string())
        .unwrap_or_else(|_| name.to_string())
}

impl Engine for HttpEngine {
    fn tag_image(&self, source: &str, repository: &str, tag: &str) -> Result<()> {
        let url = format!("{}/images/{}/tag", self.base_url, source);
        let request = self
            .http_client
            .post(url)
            .query(&[("repo", repository), ("tag", tag)]);

        self.send(request, "tag", self.timeout_seconds)?;
        info!(source, repository, tag, "tagged image");
        Ok(())
    }

    fn push_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<Option<Digest>> {
        debug!(name, tag, anonymous = auth.is_anonymous(), "pushing image");
        let stream = self.open_stream(
            &format!("/images/{}/push", name),
            &[("tag", tag)],
            "push",
            auth,
            cancellation,
        )?;
        let digest = consume_stream(
            stream,
            "push",
            &registry_of(name, auth),
            sink,
            cancellation,
        )?;
        info!(name, tag, digest = ?digest, "pushed image");
        Ok(digest)
    }

    fn pull_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<()> {
        debug!(name, tag, anonymous = auth.is_anonymous(), "pulling image");
        let stream = self.open_stream(
            "/images/create",
            &[("fromImage", name), ("tag", tag)],
            "pull",
            auth,
            cancellation,
        )?;
        consume_stream(
            stream,
            "pull",
            &registry_of(name, auth),
            sink,
            cancellation,
        )?;
        info!(name, tag, "pulled image");
        Ok(())
    }

    fn list_images(&self, reference: Option<&str>) -> Result<Vec<ImageRecord>> {
        let mut request = self
            .http_client
            .get(format!("{}/images/json", self.base_url));
        if let Some(reference) = reference {
            let filters = serde_json::json!({ "reference": [reference] }).to_string();
            request = request.query(&[("filters", filters)]);
        }

        let response = self.send(request, "list images", self.timeout_seconds)?;
        let images: Vec<ImageRecord> = response
            .json()
            .map_err(|e| SyncError::engine_with_source("Failed to parse image list", e))?;

        debug!(count = images.len(), reference, "listed images");
        Ok(images)
    }
}
