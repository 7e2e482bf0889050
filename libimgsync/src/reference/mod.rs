//! Image reference parsing.
//!
//! Splits a human-supplied image string such as
//! `myregistry.example.com:5000/team/app:1.2` into its registry, repository
//! and tag parts, filling in the defaults Docker tooling assumes.

use crate::error::{Result, SyncError};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Host of the public default registry.
pub const DEFAULT_REGISTRY: &str = "registry.hub.docker.com";

/// Other hosts that name the default registry.
pub const DEFAULT_REGISTRY_ALIASES: &[&str] =
    &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// Hosts engines drop from the names they list Docker Hub images under.
const ENGINE_HUB_HOSTS: &[&str] = &["docker.io", "index.docker.io"];

/// Tag assumed when a reference carries none.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace the default registry uses for unqualified image names.
pub const DEFAULT_NAMESPACE: &str = "library";

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    registry: Option<String>,
    repository: String,
    tag: String,
    explicit_tag: bool,
    digest: Option<String>,
}

impl ImageReference {
    /// Parses a raw image string.
    ///
    /// The first path segment is treated as a registry host when it contains
    /// a `.` or a `:`, or is exactly `localhost`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::reference::ImageReference;
    ///
    /// let r = ImageReference::parse("myregistry.example.com/alpine:3.10").unwrap();
    /// assert_eq!(r.registry(), Some("myregistry.example.com"));
    /// assert_eq!(r.repository(), "alpine");
    /// assert_eq!(r.tag(), "3.10");
    ///
    /// let r = ImageReference::parse("consul").unwrap();
    /// assert_eq!(r.registry(), None);
    /// assert_eq!(r.tag(), "latest");
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(SyncError::parse(raw, "reference is empty"));
        }

        let (name, digest) = match input.split_once('@') {
            Some((_, "")) => return Err(SyncError::parse(raw, "digest is empty")),
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (input, None),
        };

        let (registry, path) = match name.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (Some(first.to_string()), rest),
            _ => (None, name),
        };

        // With the registry host removed, any remaining ':' separates the tag.
        let (repository, tag) = match path.rsplit_once(':') {
            Some((_, "")) => return Err(SyncError::parse(raw, "tag is empty")),
            Some((repository, tag)) => (repository, Some(tag)),
            None => (path, None),
        };

        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(SyncError::parse(raw, "repository is empty"));
        }
        if tag.is_some_and(|t| t.contains('/')) {
            return Err(SyncError::parse(raw, "tag contains '/'"));
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
            explicit_tag: tag.is_some(),
            digest,
        })
    }

    /// Returns the registry host, if one was written in the reference.
    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Returns the registry host, falling back to [`DEFAULT_REGISTRY`].
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Returns the repository path.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the tag, `latest` when none was written.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns true when the raw reference spelled out a tag.
    pub fn has_explicit_tag(&self) -> bool {
        self.explicit_tag
    }

    /// Returns the `@digest` suffix, if present.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Returns true when the reference points at the default registry under
    /// any of its names, or names no registry at all.
    pub fn is_default_registry(&self) -> bool {
        self.registry
            .as_deref()
            .is_none_or(|r| canonical_registry(r) == DEFAULT_REGISTRY)
    }

    /// Returns the name an engine lists the image under.
    ///
    /// Docker Hub images written with `docker.io/` or `index.docker.io/` lose
    /// the host, and single-segment `library/` repositories lose the
    /// namespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::reference::ImageReference;
    ///
    /// let r = ImageReference::parse("docker.io/library/alpine:3.10").unwrap();
    /// assert_eq!(r.familiar_name(), "alpine");
    /// let r = ImageReference::parse("docker.io/team/app").unwrap();
    /// assert_eq!(r.familiar_name(), "team/app");
    /// let r = ImageReference::parse("ghcr.io/library/alpine").unwrap();
    /// assert_eq!(r.familiar_name(), "ghcr.io/library/alpine");
    /// ```
    pub fn familiar_name(&self) -> String {
        match self.registry.as_deref() {
            Some(host) if !ENGINE_HUB_HOSTS.contains(&host) => self.name(),
            _ => match self.repository.strip_prefix("library/") {
                Some(rest) if !rest.contains('/') => rest.to_string(),
                _ => self.repository.clone(),
            },
        }
    }

    /// Returns `familiar_name:tag`, the key pushed images are stored and
    /// matched under. Any `@digest` suffix is left out.
    pub fn store_key(&self) -> String {
        format!("{}:{}", self.familiar_name(), self.tag)
    }

    /// Returns `[registry/]repository`, the name engines tag and push by.
    pub fn name(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        }
    }
}

impl FromStr for ImageReference {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name(), self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Returns the reference with `:latest` appended when it carries no tag.
///
/// The result is only used as a lookup key; the caller's reference is left
/// as written.
///
/// # Examples
///
/// ```
/// use libimgsync::reference::tag_qualified;
///
/// assert_eq!(tag_qualified("consul").unwrap(), "consul:latest");
/// assert_eq!(tag_qualified("localhost:5000/app").unwrap(), "localhost:5000/app:latest");
/// assert_eq!(tag_qualified("alpine:3.10").unwrap(), "alpine:3.10");
/// ```
pub fn tag_qualified(raw: &str) -> Result<String> {
    let reference = ImageReference::parse(raw)?;
    let raw = raw.trim();
    if reference.has_explicit_tag() {
        return Ok(raw.to_string());
    }
    Ok(match raw.split_once('@') {
        Some((name, digest)) => format!("{}:{}@{}", name, DEFAULT_TAG, digest),
        None => format!("{}:{}", raw, DEFAULT_TAG),
    })
}

/// Maps Docker Hub host aliases to [`DEFAULT_REGISTRY`]; any other host is
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use libimgsync::reference::canonical_registry;
///
/// assert_eq!(canonical_registry("docker.io"), "registry.hub.docker.com");
/// assert_eq!(canonical_registry("ghcr.io"), "ghcr.io");
/// ```
pub fn canonical_registry(host: &str) -> &str {
    if DEFAULT_REGISTRY_ALIASES.contains(&host) {
        DEFAULT_REGISTRY
    } else {
        host
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}
