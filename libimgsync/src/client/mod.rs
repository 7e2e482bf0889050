//! HTTP client for registry communication.
//!
//! A thin blocking client built on reqwest that issues the two requests the
//! digest resolver needs: manifest fetches against the distribution v2 API
//! and token exchanges against a registry's auth realm. Interpreting the
//! results (challenge handling, fallback) is left to [`crate::registry`].

use crate::auth::{AuthChallenge, Credentials, TokenResponse};
use crate::error::{Result, SyncError};
use crate::registry::ManifestTarget;
use reqwest::StatusCode;
use reqwest::blocking::{Client as ReqwestClient, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Header carrying the manifest digest in registry responses.
pub const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Configuration for the HTTP client.
///
/// # Examples
///
/// ```
/// use libimgsync::client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_timeout(60)
///     .with_max_idle_per_host(20);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Maximum idle connections per host (default: 10)
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_idle_per_host: 10,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the maximum idle connections per host.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }
}

/// Raw outcome of a manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResponse {
    /// HTTP status returned by the registry
    pub status: u16,
    /// Value of the `Docker-Content-Digest` header, if any
    pub digest: Option<String>,
    /// Value of the `WWW-Authenticate` header, if any
    pub challenge: Option<String>,
    /// Response body (the manifest on success, an error document otherwise)
    pub body: Vec<u8>,
}

impl ManifestResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for a 401 status.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }
}

/// Blocking HTTP client shared by every resolution of a session.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    /// The underlying HTTP client
    http_client: ReqwestClient,
    /// Timeout applied to every request, kept for error messages
    timeout_seconds: u64,
}

impl Client {
    /// Creates a new client with default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::client::Client;
    ///
    /// let client = Client::new().unwrap();
    /// assert_eq!(client.timeout_seconds(), 30);
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(concat!("imgsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SyncError::config_with_source("Failed to create HTTP client", None::<String>, e)
            })?;

        Ok(Self {
            http_client,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Returns the per-request timeout in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Fetches `GET /v2/{repository}/manifests/{tag}`.
    ///
    /// Non-success statuses are returned, not raised, so the caller can drive
    /// the auth challenge. Only transport failures are errors.
    pub fn get_manifest(
        &self,
        target: &ManifestTarget,
        accept: &str,
        authorization: Option<&str>,
    ) -> Result<ManifestResponse> {
        let url = target.url();
        debug!(%url, accept, authenticated = authorization.is_some(), "fetching manifest");

        let mut request = self.http_client.get(&url).header(ACCEPT, accept);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request
            .send()
            .map_err(|e| self.translate_reqwest_error(e, target))?;

        let status = response.status().as_u16();
        let digest = header_value(&response, CONTENT_DIGEST_HEADER);
        let challenge = header_value(&response, WWW_AUTHENTICATE.as_str());
        let body = response
            .bytes()
            .map_err(|e| {
                SyncError::registry(
                    &target.registry_url,
                    &target.repository,
                    &target.tag,
                    "Failed to read manifest response",
                )
                .with_source(e)
            })?
            .to_vec();

        debug!(status, digest = ?digest, "manifest response");
        Ok(ManifestResponse {
            status,
            digest,
            challenge,
            body,
        })
    }

    /// Exchanges credentials for a bearer token at the challenge's realm.
    ///
    /// Issues `GET {realm}?service={service}&scope=repository:{repository}:pull`,
    /// with Basic authentication when credentials are supplied.
    pub fn fetch_token(
        &self,
        target: &ManifestTarget,
        challenge: &AuthChallenge,
        credentials: &Credentials,
    ) -> Result<String> {
        let scope = format!("repository:{}:pull", target.repository);
        let mut query = Vec::with_capacity(2);
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }
        query.push(("scope", scope.as_str()));

        debug!(realm = %challenge.realm, %scope, "requesting registry token");
        let mut request = self.http_client.get(&challenge.realm).query(&query);
        if let Credentials::Basic { username, password } = credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .map_err(|e| self.translate_reqwest_error(e, target))?;
        let response = Self::check_token_status(response, target)?;

        let token: TokenResponse = response.json().map_err(|e| {
            SyncError::registry(
                &target.registry_url,
                &target.repository,
                &target.tag,
                "Failed to parse token response",
            )
            .with_source(e)
        })?;

        token.into_token().ok_or_else(|| {
            SyncError::auth(
                &target.registry_url,
                format!("token endpoint {} returned no token", challenge.realm),
                None,
            )
        })
    }

    /// Translates a token endpoint status into an error.
    fn check_token_status(response: Response, target: &ManifestTarget) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response
            .text()
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::auth(
                &target.registry_url,
                format!("token exchange rejected by {}: {}", url, body.trim()),
                Some(status.as_u16()),
            )),
            _ => Err(SyncError::registry(
                &target.registry_url,
                &target.repository,
                &target.tag,
                format!("token exchange failed at {}: HTTP {}", url, status.as_u16()),
            )
            .with_status(status.as_u16())),
        }
    }

    /// Translates a reqwest error into a SyncError.
    fn translate_reqwest_error(&self, error: reqwest::Error, target: &ManifestTarget) -> SyncError {
        let message = if error.is_timeout() {
            format!(
                "Request to {} timed out after {} seconds",
                target.registry_url, self.timeout_seconds
            )
        } else if error.is_connect() {
            format!("Failed to connect to registry at {}", target.registry_url)
        } else {
            format!("Network error communicating with {}", target.registry_url)
        };
        SyncError::registry(&target.registry_url, &target.repository, &target.tag, message)
            .with_source(error)
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
