//! Registry image sessions.
//!
//! A [`Session`] bundles the engine client, the digest resolver and the
//! credential map for the lifetime of a run. It is read-only after
//! construction and can be shared across threads.

use crate::auth::CredentialMap;
use crate::client::Client;
use crate::config::Config;
use crate::digest::Digest;
use crate::engine::{Cancellation, Engine, HttpEngine, ProgressEvent};
use crate::error::{Result, SyncError};
use crate::push::tag_and_push;
use crate::reference::ImageReference;
use crate::registry::DigestResolver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};


/// State of one source image mirrored to a target registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryImage {
    /// Local (or pullable) image to copy
    #[serde(alias = "local_name")]
    pub source_name: String,
    /// Registry reference the image is pushed to
    #[serde(alias = "remote_name")]
    pub target_name: String,
    /// Manifest digest of the pushed image, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_digest: Option<Digest>,
}

impl RegistryImage {
    pub fn new(source_name: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            target_name: target_name.into(),
            sha256_digest: None,
        }
    }

    /// Returns a copy carrying `digest`.
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.sha256_digest = Some(digest);
        self
    }
}

/// Long-lived handle over an engine, a resolver and credentials.
#[derive(Debug)]
pub struct Session<E: Engine> {
    engine: E,
    resolver: DigestResolver,
    credentials: CredentialMap,
}

impl Session<HttpEngine> {
    /// Builds a session talking to the engine described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client_config = config.network.client_config();

        let engine = HttpEngine::from_endpoint(&config.engine, &client_config)?;
        let resolver = DigestResolver::new(Client::with_config(client_config)?)
            .with_insecure_registries(config.insecure_registries.iter().cloned());

        Ok(Self::new(engine, resolver, config.credential_map()))
    }
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, resolver: DigestResolver, credentials: CredentialMap) -> Self {
        Self {
            engine,
            resolver,
            credentials,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn resolver(&self) -> &DigestResolver {
        &self.resolver
    }

    pub fn credentials(&self) -> &CredentialMap {
        &self.credentials
    }

    /// Tags and pushes `source_name` as `target_name`, returning the state
    /// with the pushed digest.
    pub fn create(
        &self,
        source_name: &str,
        target_name: &str,
        cancellation: &Cancellation,
    ) -> Result<RegistryImage> {
        self.create_with_progress(
            source_name,
            target_name,
            &mut |event| debug!(status = ?event.status, id = ?event.id, "engine progress"),
            cancellation,
        )
    }

    /// Like [`Session::create`], handing every engine status event to `sink`.
    pub fn create_with_progress(
        &self,
        source_name: &str,
        target_name: &str,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<RegistryImage> {
        let result = tag_and_push(
            &self.engine,
            source_name,
            target_name,
            &self.credentials,
            sink,
            cancellation,
        )?;

        let key = ImageReference::parse(target_name)?.store_key();
        let digest = result.digest(&key).cloned().ok_or_else(|| {
            SyncError::engine(format!("push result holds no digest for {}", key))
        })?;

        info!(source = source_name, target = %key, %digest, "image synchronized");
        Ok(RegistryImage::new(source_name, target_name).with_digest(digest))
    }

    /// Re-pushes the image; identical inputs converge on the same digest.
    pub fn update(
        &self,
        source_name: &str,
        target_name: &str,
        cancellation: &Cancellation,
    ) -> Result<RegistryImage> {
        self.create(source_name, target_name, cancellation)
    }

    /// Resolves the digest the target registry currently serves for
    /// `target_name`, without pulling or pushing.
    pub fn read(&self, target_name: &str) -> Result<Digest> {
        self.resolver
            .resolve_reference(target_name, &self.credentials)
    }

    /// Refreshes a state from the registry.
    pub fn refresh(&self, state: &RegistryImage) -> Result<RegistryImage> {
        let digest = self.read(&state.target_name)?;
        Ok(state.clone().with_digest(digest))
    }

    /// Returns the engine image ID tagged with `target_name`; any `@digest`
    /// suffix is ignored.
    pub fn local_digest(&self, target_name: &str) -> Result<Digest> {
        let key = ImageReference::parse(target_name)?.store_key();
        let image = self
            .engine
            .list_images(Some(&key))?
            .into_iter()
            .find(|image| image.has_tag(&key))
            .ok_or_else(|| SyncError::engine(format!("Can't find image: {}", key)))?;

        debug!(image = %key, id = %image.id, "found local image");
        image.id.parse()
    }

    /// Removes nothing: pushed images stay in the registry.
    pub fn delete(&self, state: &RegistryImage) -> Result<()> {
        debug!(target = %state.target_name, "delete leaves registry image in place");
        Ok(())
    }

    /// Returns true when the registry still serves `digest` for `target_name`.
    pub fn is_current(&self, target_name: &str, digest: &Digest) -> Result<bool> {
        Ok(&self.read(target_name)? == digest)
    }
}
