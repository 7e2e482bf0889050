//! Engine, network and registry credential configuration.
//!
//! Loaded from YAML over built-in defaults. The engine host can be
//! overridden with `IMGSYNC_HOST`.

use crate::auth::{CredentialMap, Credentials, normalize_registry_address};
use crate::client::ClientConfig;
use crate::engine::{DEFAULT_STREAM_TIMEOUT, TlsMaterial};
use crate::error::{Result, SyncError};
use config::{Config as ConfigRs, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;


/// Environment variable overriding `engine.host`.
pub const HOST_ENV: &str = "IMGSYNC_HOST";

const REDACTED: &str = "***";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineEndpoint,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub registry_auth: Vec<RegistryAuthEntry>,
    /// Registry hosts reached over plain HTTP
    #[serde(default)]
    pub insecure_registries: Vec<String>,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(s, FileFormat::Yaml));
        Self::from_builder(builder)
    }

    /// Loads a `Config` from an optional file path, applying `IMGSYNC_HOST`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_host(path, std::env::var(HOST_ENV).ok())
    }

    /// Loads a `Config` from an optional file path with an explicit engine
    /// host override.
    pub fn load_with_host(path: Option<&Path>, host: Option<String>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(p) = path {
            builder = builder.add_source(File::from(p).required(true));
        }
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            builder = builder.set_override("engine.host", host).map_err(|e| {
                SyncError::config_with_source("Invalid engine host override", None::<String>, e)
            })?;
        }

        Self::from_builder(builder).map_err(|e| match (e, path) {
            (SyncError::Config { message, source, .. }, Some(p)) => SyncError::Config {
                message,
                path: Some(p.display().to_string()),
                source,
            },
            (e, _) => e,
        })
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = ConfigRs::try_from(&Config::default()).map_err(|e| {
            SyncError::config_with_source("Failed to build default configuration", None::<String>, e)
        })?;
        Ok(ConfigRs::builder().add_source(defaults))
    }

    /// Creates a `Config` from a `config::ConfigBuilder`.
    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                SyncError::config_with_source(
                    "Failed to deserialize configuration",
                    None::<String>,
                    e,
                )
            })
    }

    /// Checks settings that are individually valid but conflict.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.network.timeout == 0 {
            return Err(SyncError::config(
                "network.timeout must be greater than zero",
                None::<String>,
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.registry_auth {
            if entry.address.trim().is_empty() {
                return Err(SyncError::config(
                    "registry_auth entry has an empty address",
                    None::<String>,
                ));
            }
            if !seen.insert(normalize_registry_address(&entry.address)) {
                return Err(SyncError::config(
                    format!("duplicate registry_auth entry for {}", entry.address),
                    None::<String>,
                ));
            }
        }
        Ok(())
    }

    /// Builds the read-only credential map from `registry_auth`.
    pub fn credential_map(&self) -> CredentialMap {
        self.registry_auth
            .iter()
            .map(|entry| {
                (
                    entry.address.clone(),
                    Credentials::basic(&entry.username, &entry.password),
                )
            })
            .collect()
    }

    /// Returns a copy with passwords and key material masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some(REDACTED.to_string());
            }
        };

        mask(&mut copy.engine.key_material);
        if let Some(forward) = copy.engine.forward.as_mut() {
            mask(&mut forward.end_host.password);
            if let Some(bastion) = forward.bastion_host.as_mut() {
                mask(&mut bastion.password);
            }
        }
        for entry in copy.registry_auth.iter_mut() {
            if !entry.password.is_empty() {
                entry.password = REDACTED.to_string();
            }
        }
        copy
    }
}

/// Where and how to reach the container engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineEndpoint {
    #[serde(default = "default_engine_host")]
    pub host: String,

    /// PEM text of the CA certificate
    #[serde(default)]
    pub ca_material: Option<String>,

    /// PEM text of the client certificate
    #[serde(default)]
    pub cert_material: Option<String>,

    /// PEM text of the client key
    #[serde(default)]
    pub key_material: Option<String>,

    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`
    #[serde(default)]
    pub cert_path: Option<String>,

    #[serde(default)]
    pub forward: Option<ForwardConfig>,

    /// Upper bound for a push or pull stream, in seconds
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout: u64,
}

impl Default for EngineEndpoint {
    fn default() -> Self {
        Self {
            host: default_engine_host(),
            ca_material: None,
            cert_material: None,
            key_material: None,
            cert_path: None,
            forward: None,
            stream_timeout: default_stream_timeout(),
        }
    }
}

fn default_engine_host() -> String {
    "tcp://localhost:2375".to_string()
}

fn default_stream_timeout() -> u64 {
    DEFAULT_STREAM_TIMEOUT
}

impl EngineEndpoint {
    fn has_material(&self) -> bool {
        [&self.ca_material, &self.cert_material, &self.key_material]
            .iter()
            .any(|m| m.is_some())
    }

    /// Validates TLS and forwarding settings.
    ///
    /// Inline TLS material must be complete and excludes `cert_path`.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::config("engine.host is empty", None::<String>));
        }

        if self.has_material() {
            let complete = [&self.ca_material, &self.cert_material, &self.key_material]
                .iter()
                .all(|m| m.as_deref().is_some_and(|v| !v.trim().is_empty()));
            if !complete {
                return Err(SyncError::config(
                    "ca_material, cert_material, and key_material must be specified",
                    None::<String>,
                ));
            }
            if self.cert_path.is_some() {
                return Err(SyncError::config(
                    "cert_path must not be specified",
                    None::<String>,
                ));
            }
        }

        if self.stream_timeout == 0 {
            return Err(SyncError::config(
                "engine.stream_timeout must be greater than zero",
                None::<String>,
            ));
        }

        if let Some(forward) = &self.forward {
            forward.validate()?;
        }
        Ok(())
    }

    /// Returns the TLS material to present to the engine, if any.
    pub fn tls_material(&self) -> Result<Option<TlsMaterial>> {
        if let (Some(ca), Some(cert), Some(key)) =
            (&self.ca_material, &self.cert_material, &self.key_material)
        {
            return Ok(Some(TlsMaterial {
                ca: ca.clone(),
                cert: cert.clone(),
                key: key.clone(),
            }));
        }

        self.cert_path
            .as_deref()
            .map(|dir| TlsMaterial::from_cert_path(Path::new(dir)))
            .transpose()
    }

    /// Returns the address the engine client connects to.
    pub fn dial_address(&self) -> &str {
        match &self.forward {
            Some(forward) => &forward.local_address,
            None => &self.host,
        }
    }
}

/// SSH port forward reaching the engine through an optional bastion host.
///
/// The tunnel is set up outside this crate; the engine client only dials
/// `local_address`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardConfig {
    #[serde(default)]
    pub bastion_host: Option<SshHost>,
    pub end_host: SshHost,
    pub local_address: String,
    pub remote_address: String,
}

impl ForwardConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(bastion) = &self.bastion_host {
            bastion.validate("bastion_host")?;
        }
        self.end_host.validate("end_host")?;

        for (field, value) in [
            ("local_address", &self.local_address),
            ("remote_address", &self.remote_address),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::config(
                    format!("engine.forward.{} must be specified", field),
                    None::<String>,
                ));
            }
        }
        Ok(())
    }
}

/// One SSH hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SshHost {
    pub address: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_file: Option<String>,
}

impl SshHost {
    fn validate(&self, role: &str) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(SyncError::config(
                format!("engine.forward.{}.address must be specified", role),
                None::<String>,
            ));
        }
        Ok(())
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_max_idle_per_host() -> usize {
    10
}

impl Network {
    /// Returns the HTTP client settings for these values.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.timeout)
            .with_max_idle_per_host(self.max_idle_per_host)
    }
}

/// Credentials for one registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryAuthEntry {
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
