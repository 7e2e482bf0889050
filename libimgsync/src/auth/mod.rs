//! Registry authentication.
//!
//! Holds the credential types the resolver and the engine consume: per-call
//! [`Credentials`], the read-only [`CredentialMap`] keyed by normalized
//! registry address, the `WWW-Authenticate` challenge parser that drives the
//! token exchange, and the `X-Registry-Auth` payload pushed to the engine.

use crate::error::{Result, SyncError};
use crate::reference::canonical_registry;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;


/// Credentials for registry authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication (anonymous access)
    Anonymous,

    /// HTTP Basic authentication with username and password
    Basic {
        /// Username for authentication
        username: String,
        /// Password for authentication
        password: String,
    },

    /// Bearer token obtained from a token exchange
    Bearer {
        /// The bearer token
        token: String,
    },
}

impl Credentials {
    /// Creates anonymous credentials.
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    /// Creates Basic authentication credentials.
    ///
    /// An empty username yields anonymous credentials, matching how an unset
    /// registry auth entry behaves.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::auth::Credentials;
    ///
    /// let creds = Credentials::basic("username", "password");
    /// assert!(matches!(creds, Credentials::Basic { .. }));
    /// assert_eq!(Credentials::basic("", ""), Credentials::Anonymous);
    /// ```
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        if username.is_empty() {
            return Self::Anonymous;
        }
        Self::Basic {
            username,
            password: password.into(),
        }
    }

    /// Creates Bearer token credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Returns the Authorization header value for these credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::auth::Credentials;
    ///
    /// let creds = Credentials::basic("user", "pass");
    /// assert_eq!(creds.to_header_value().unwrap(), "Basic dXNlcjpwYXNz");
    /// ```
    pub fn to_header_value(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password);
                let encoded = general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {}", encoded))
            }
            Self::Bearer { token } => Some(format!("Bearer {}", token)),
        }
    }
}

/// Normalizes a registry address to carry a scheme.
///
/// The same registry can be written with or without `http(s)://` in
/// configuration and image names; lookups always use the normalized form.
/// Docker Hub aliases such as `docker.io` collapse onto the default registry
/// host.
///
/// # Examples
///
/// ```
/// use libimgsync::auth::normalize_registry_address;
///
/// assert_eq!(normalize_registry_address("ghcr.io"), "https://ghcr.io");
/// assert_eq!(normalize_registry_address("http://localhost:5000"), "http://localhost:5000");
/// assert_eq!(normalize_registry_address("docker.io"), "https://registry.hub.docker.com");
/// ```
pub fn normalize_registry_address(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    let (scheme, host) = match address.split_once("://") {
        Some((scheme @ ("http" | "https"), host)) => (scheme, host),
        _ => ("https", address),
    };
    format!("{}://{}", scheme, canonical_registry(host))
}

/// Read-only mapping from normalized registry address to credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialMap {
    entries: HashMap<String, Credentials>,
}

impl CredentialMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds credentials for a registry, normalizing its address.
    ///
    /// Only used while assembling the map; sessions never write to it.
    pub fn with(mut self, address: &str, credentials: Credentials) -> Self {
        self.entries
            .insert(normalize_registry_address(address), credentials);
        self
    }

    /// Looks up credentials for a registry written in any form.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::auth::{CredentialMap, Credentials};
    ///
    /// let map = CredentialMap::new().with("ghcr.io", Credentials::basic("u", "p"));
    /// assert!(map.get("https://ghcr.io").is_some());
    /// assert!(map.get("quay.io").is_none());
    /// ```
    pub fn get(&self, address: &str) -> Option<&Credentials> {
        self.entries.get(&normalize_registry_address(address))
    }

    /// Returns credentials for a registry, anonymous when none are known.
    pub fn get_or_anonymous(&self, address: &str) -> Credentials {
        self.get(address).cloned().unwrap_or(Credentials::Anonymous)
    }

    /// Returns the number of registries with credentials.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no credentials are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Credentials)> for CredentialMap {
    fn from_iter<I: IntoIterator<Item = (String, Credentials)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (address, creds)| map.with(&address, creds))
    }
}

/// Information parsed from a WWW-Authenticate header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// The authentication scheme (e.g., "Bearer")
    pub scheme: String,

    /// The authentication realm
    pub realm: String,

    /// The service identifier
    pub service: Option<String>,

    /// The scope being requested
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parses a WWW-Authenticate header value.
    ///
    /// Example header: `Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/consul:pull"`
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::auth::AuthChallenge;
    ///
    /// let header = r#"Bearer realm="https://auth.example.com/token",service="registry""#;
    /// let challenge = AuthChallenge::parse(header).unwrap();
    /// assert_eq!(challenge.scheme, "Bearer");
    /// ```
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();

        let (scheme, params) = header
            .split_once(' ')
            .ok_or_else(|| SyncError::parse(header, "invalid WWW-Authenticate header format"))?;

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for (key, value) in split_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| {
            SyncError::parse(header, "WWW-Authenticate header missing 'realm' parameter")
        })?;

        Ok(Self {
            scheme: scheme.to_string(),
            realm,
            service,
            scope,
        })
    }

    /// Returns true for the bearer token scheme.
    pub fn is_bearer(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("bearer")
    }
}

/// Splits `key="value",key2="v,2"` pairs, honouring commas inside quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in params.chars().chain(std::iter::once(',')) {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if let Some((key, value)) = current.split_once('=') {
                    pairs.push((
                        key.trim().to_ascii_lowercase(),
                        value.trim().trim_matches('"').to_string(),
                    ));
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    pairs
}

/// Body returned by a registry token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Token as issued by Docker-style token servers
    #[serde(default)]
    pub token: Option<String>,
    /// Token as issued by OAuth2-style token servers
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    /// Returns whichever token field the server filled in.
    pub fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

/// Credentials in the shape the engine expects in `X-Registry-Auth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryAuth {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(rename = "serveraddress", skip_serializing_if = "String::is_empty")]
    pub server_address: String,
}

impl RegistryAuth {
    /// Builds the engine auth payload for a registry.
    ///
    /// Anonymous and bearer credentials produce an empty payload; the engine
    /// then pushes without authentication.
    pub fn for_registry(server_address: &str, credentials: &Credentials) -> Self {
        match credentials {
            Credentials::Basic { username, password } => Self {
                username: username.clone(),
                password: password.clone(),
                server_address: server_address.to_string(),
            },
            Credentials::Anonymous | Credentials::Bearer { .. } => Self::default(),
        }
    }

    /// Returns true when no credentials are carried.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Encodes the payload as base64url JSON for the `X-Registry-Auth` header.
    pub fn to_header_value(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| SyncError::engine_with_source("Failed to encode registry auth", e))?;
        Ok(general_purpose::URL_SAFE.encode(json))
    }
}
