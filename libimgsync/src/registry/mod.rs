//! Registry digest resolution.
//!
//! Learns the content digest a registry holds for `repository:tag` without
//! pulling any layers: one manifest request, an optional token exchange, and
//! at most one retry asking for the legacy manifest format.

use crate::auth::{AuthChallenge, CredentialMap, Credentials, normalize_registry_address};
use crate::client::{Client, ManifestResponse};
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use crate::oci;
use crate::reference::{DEFAULT_NAMESPACE, DEFAULT_REGISTRY, ImageReference, canonical_registry};
use std::collections::HashSet;
use tracing::{debug, info, warn};


/// Normalized location of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTarget {
    /// Registry base URL with scheme, e.g. `https://registry.hub.docker.com`
    pub registry_url: String,
    /// Repository path as the registry names it, e.g. `library/consul`
    pub repository: String,
    /// Tag to resolve
    pub tag: String,
}

impl ManifestTarget {
    /// Returns the manifest endpoint URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::registry::normalize_target;
    ///
    /// let target = normalize_target(None, "consul", "latest");
    /// assert_eq!(
    ///     target.url(),
    ///     "https://registry.hub.docker.com/v2/library/consul/manifests/latest"
    /// );
    /// ```
    pub fn url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.registry_url, self.repository, self.tag
        )
    }
}

/// Normalizes `{registry, repository}` the way the registry names them.
///
/// | explicit registry | default registry | repository has `/` | result                          |
/// |-------------------|------------------|--------------------|---------------------------------|
/// | no                | yes              | no                 | default host, `library/{repo}`  |
/// | no                | yes              | yes                | default host, repo              |
/// | yes               | yes              | no                 | host, strip prefix, `library/`  |
/// | yes               | any              | any                | host, strip `{registry}/` prefix|
///
/// `docker.io`, `index.docker.io` and `registry-1.docker.io` count as the
/// default registry. An empty tag resolves to `latest`.
pub fn normalize_target(registry: Option<&str>, repository: &str, tag: &str) -> ManifestTarget {
    let explicit = registry.map(str::trim).filter(|r| !r.is_empty());
    let host = explicit.unwrap_or(DEFAULT_REGISTRY);
    let bare_host = strip_scheme(host).trim_end_matches('/');
    let is_default = canonical_registry(bare_host) == DEFAULT_REGISTRY;

    let repository = match explicit {
        Some(registry) => strip_registry_prefix(repository, registry, bare_host),
        None => repository,
    };

    let repository = match (is_default, repository.contains('/')) {
        (true, false) => format!("{}/{}", DEFAULT_NAMESPACE, repository),
        _ => repository.to_string(),
    };

    let tag = if tag.is_empty() {
        crate::reference::DEFAULT_TAG
    } else {
        tag
    };

    ManifestTarget {
        registry_url: normalize_registry_address(host),
        repository,
        tag: tag.to_string(),
    }
}

fn strip_scheme(address: &str) -> &str {
    address
        .strip_prefix("https://")
        .or_else(|| address.strip_prefix("http://"))
        .unwrap_or(address)
}

fn strip_registry_prefix<'a>(repository: &'a str, registry: &str, bare_host: &str) -> &'a str {
    [registry, bare_host]
        .iter()
        .find_map(|prefix| {
            repository
                .strip_prefix(prefix.trim_end_matches('/'))
                .and_then(|rest| rest.strip_prefix('/'))
        })
        .unwrap_or(repository)
}

/// Manifest media type family requested from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// Docker v2 and OCI manifests and indexes
    Modern,
    /// Docker schema 1, for registries that serve nothing else
    Legacy,
}

impl ManifestFormat {
    /// Returns the `Accept` header value for this format.
    pub fn accept(&self) -> String {
        match self {
            Self::Modern => oci::modern_accept_header(),
            Self::Legacy => oci::DOCKER_MANIFEST_V1_SIGNED.to_string(),
        }
    }

    fn from_fallback(force_fallback: bool) -> Self {
        if force_fallback {
            Self::Legacy
        } else {
            Self::Modern
        }
    }
}

/// Resolves manifest digests directly from registries.
#[derive(Debug, Clone)]
pub struct DigestResolver {
    client: Client,
    insecure: HashSet<String>,
}

impl DigestResolver {
    /// Creates a resolver over a shared HTTP client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            insecure: HashSet::new(),
        }
    }

    /// Marks registry hosts that are reached over plain HTTP when a
    /// reference names them.
    pub fn with_insecure_registries<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insecure
            .extend(hosts.into_iter().map(|h| h.into().trim().to_string()));
        self
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolves the digest of `repository:tag` with a single format.
    ///
    /// `force_fallback` requests the legacy manifest format instead of the
    /// modern one. A 401 triggers one token exchange and one retry; a second
    /// rejection is an authentication error.
    pub fn resolve_digest(
        &self,
        registry: Option<&str>,
        repository: &str,
        tag: &str,
        credentials: &Credentials,
        force_fallback: bool,
    ) -> Result<Digest> {
        let target = normalize_target(registry, repository, tag);
        self.resolve_target(&target, credentials, ManifestFormat::from_fallback(force_fallback))
    }

    /// Resolves with the modern format, retrying exactly once with the legacy
    /// format on a registry failure.
    ///
    /// Authentication failures are returned without the retry.
    pub fn resolve_digest_with_fallback(
        &self,
        registry: Option<&str>,
        repository: &str,
        tag: &str,
        credentials: &Credentials,
    ) -> Result<Digest> {
        let target = normalize_target(registry, repository, tag);
        match self.resolve_target(&target, credentials, ManifestFormat::Modern) {
            Ok(digest) => Ok(digest),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                warn!(
                    url = %target.url(),
                    error = %e,
                    "manifest request failed, retrying with legacy manifest format"
                );
                self.resolve_target(&target, credentials, ManifestFormat::Legacy)
            }
        }
    }

    /// Parses a raw reference and resolves its digest, taking credentials
    /// for its registry from the map.
    ///
    /// A reference pinned with `@digest` fetches `manifests/{digest}`, so the
    /// result is the pinned manifest or an error when the registry no longer
    /// holds it.
    pub fn resolve_reference(&self, raw: &str, credentials: &CredentialMap) -> Result<Digest> {
        let reference = ImageReference::parse(raw)?;
        let registry = reference.registry().map(|host| {
            if self.insecure.contains(host) {
                format!("http://{}", host)
            } else {
                host.to_string()
            }
        });

        // A pinned digest is resolved in place of the tag.
        let tag = reference.digest().unwrap_or(reference.tag());
        let target = normalize_target(registry.as_deref(), reference.repository(), tag);
        let creds = credentials
            .get(&target.registry_url)
            .or_else(|| credentials.get(reference.registry_or_default()))
            .cloned()
            .unwrap_or(Credentials::Anonymous);

        let digest = self.resolve_digest_with_fallback(
            registry.as_deref(),
            reference.repository(),
            tag,
            &creds,
        )?;
        info!(reference = raw, %digest, "resolved registry digest");
        Ok(digest)
    }

    fn resolve_target(
        &self,
        target: &ManifestTarget,
        credentials: &Credentials,
        format: ManifestFormat,
    ) -> Result<Digest> {
        let accept = format.accept();
        let mut response = self.client.get_manifest(target, &accept, None)?;

        if response.is_unauthorized() {
            let authorization = self.authorize(target, &response, credentials)?;
            response = self
                .client
                .get_manifest(target, &accept, Some(&authorization))?;
            if response.is_unauthorized() {
                return Err(SyncError::auth(
                    &target.registry_url,
                    format!(
                        "access to {} denied after authentication",
                        target.repository
                    ),
                    Some(401),
                ));
            }
        }

        Self::digest_from_response(target, response, format)
    }

    /// Builds the Authorization header answering a 401 challenge.
    fn authorize(
        &self,
        target: &ManifestTarget,
        response: &ManifestResponse,
        credentials: &Credentials,
    ) -> Result<String> {
        let header = response.challenge.as_deref().ok_or_else(|| {
            SyncError::auth(
                &target.registry_url,
                "registry returned 401 without a WWW-Authenticate challenge",
                Some(401),
            )
        })?;
        let challenge = AuthChallenge::parse(header).map_err(|e| {
            SyncError::auth(
                &target.registry_url,
                format!("unusable auth challenge: {}", e),
                Some(401),
            )
        })?;

        if challenge.is_bearer() {
            debug!(realm = %challenge.realm, "answering bearer challenge");
            let token = self.client.fetch_token(target, &challenge, credentials)?;
            return Ok(Credentials::bearer(token)
                .to_header_value()
                .unwrap_or_default());
        }

        credentials.to_header_value().ok_or_else(|| {
            SyncError::auth(
                &target.registry_url,
                format!(
                    "registry requires {} authentication and no credentials are configured",
                    challenge.scheme
                ),
                Some(401),
            )
        })
    }

    fn digest_from_response(
        target: &ManifestTarget,
        response: ManifestResponse,
        format: ManifestFormat,
    ) -> Result<Digest> {
        match response.status {
            200..=299 => match response.digest {
                Some(digest) => digest.parse(),
                None if response.body.is_empty() => Err(SyncError::registry(
                    &target.registry_url,
                    &target.repository,
                    &target.tag,
                    "manifest response carried neither a digest header nor a body",
                )),
                None => {
                    debug!(?format, "no digest header, hashing manifest body");
                    Ok(Digest::sha256(&response.body))
                }
            },
            403 => Err(SyncError::auth(
                &target.registry_url,
                format!("access to {} forbidden", target.repository),
                Some(403),
            )),
            404 => Err(SyncError::registry(
                &target.registry_url,
                &target.repository,
                &target.tag,
                "manifest not found",
            )
            .with_status(404)),
            status => Err(SyncError::registry(
                &target.registry_url,
                &target.repository,
                &target.tag,
                format!(
                    "unexpected HTTP {}: {}",
                    status,
                    String::from_utf8_lossy(&response.body).trim()
                ),
            )
            .with_status(status)),
        }
    }
}
