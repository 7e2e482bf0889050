//! Tag-and-push orchestration.
//!
//! Copies a local image to a target registry through the engine: make sure
//! the source exists locally, tag it with the target name, push, and record
//! the pushed image under its tag-qualified name.

use crate::auth::{CredentialMap, RegistryAuth, normalize_registry_address};
use crate::engine::{Cancellation, Engine, ImageRecord, ProgressEvent};
use crate::error::{Result, SyncError};
use crate::reference::ImageReference;
use crate::store::PushResult;
use tracing::{debug, info, warn};


/// Tags `local` as `target` and pushes it.
///
/// Credentials for the target registry come from `credentials`; without an
/// entry the push is anonymous. The digest announced by the push stream is
/// authoritative. When the stream names none, the engine's repo digest for
/// the target repository is used; when that is missing too the push fails
/// rather than report a guessed digest.
///
/// The result is keyed by the target's store key: tag-qualified, and named
/// the way the engine lists it, e.g. `consul:latest` for a target written as
/// `consul` and `alpine:3.10` for `docker.io/library/alpine:3.10`. Targets
/// pinned with `@digest` are rejected with a parse error.
pub fn tag_and_push<E: Engine + ?Sized>(
    engine: &E,
    local: &str,
    target: &str,
    credentials: &CredentialMap,
    sink: &mut dyn FnMut(&ProgressEvent),
    cancellation: &Cancellation,
) -> Result<PushResult> {
    let local_ref = ImageReference::parse(local)?;
    let target_ref = ImageReference::parse(target)?;
    if target_ref.digest().is_some() {
        return Err(SyncError::parse(
            target,
            "push target cannot be pinned to a digest",
        ));
    }
    let source = local.trim();

    ensure_local(engine, source, &local_ref, credentials, sink, cancellation)?;

    let name = target_ref.name();
    engine.tag_image(source, &name, target_ref.tag())?;

    let auth = registry_auth(&target_ref, credentials);
    if auth.is_anonymous() {
        info!(
            registry = target_ref.registry_or_default(),
            "no credentials configured, pushing anonymously"
        );
    }

    let pushed = engine.push_image(&name, target_ref.tag(), &auth, sink, cancellation)?;

    let key = target_ref.store_key();
    let mut record = find_record(engine, &key)?.unwrap_or_else(|| {
        warn!(image = %key, "pushed image missing from engine image list");
        ImageRecord {
            repo_tags: vec![key.clone()],
            ..Default::default()
        }
    });

    let digest = pushed
        .or_else(|| {
            debug!(image = %key, "push stream carried no digest, using repo digest");
            record.repo_digest_for(&target_ref.familiar_name())
        })
        .ok_or_else(|| {
            SyncError::engine(format!("push of {} completed without reporting a digest", key))
        })?;

    info!(image = %key, %digest, "pushed image");
    record.digest = Some(digest);

    let mut result = PushResult::new();
    result.insert(key, record);
    Ok(result)
}

/// Pulls the source image when the engine does not hold it yet.
fn ensure_local<E: Engine + ?Sized>(
    engine: &E,
    source: &str,
    reference: &ImageReference,
    credentials: &CredentialMap,
    sink: &mut dyn FnMut(&ProgressEvent),
    cancellation: &Cancellation,
) -> Result<()> {
    let key = match reference.digest() {
        Some(_) => source.to_string(),
        None => reference.store_key(),
    };

    let present = engine
        .list_images(Some(&key))?
        .iter()
        .any(|image| reference.digest().is_some() || image.has_tag(&key));
    if present {
        debug!(image = %key, "source image present locally");
        return Ok(());
    }

    info!(image = %key, "source image not found locally, pulling");
    let tag = reference.digest().unwrap_or(reference.tag());
    engine.pull_image(
        &reference.name(),
        tag,
        &registry_auth(reference, credentials),
        sink,
        cancellation,
    )
}

fn registry_auth(reference: &ImageReference, credentials: &CredentialMap) -> RegistryAuth {
    let address = normalize_registry_address(reference.registry_or_default());
    RegistryAuth::for_registry(&address, &credentials.get_or_anonymous(&address))
}

fn find_record<E: Engine + ?Sized>(engine: &E, key: &str) -> Result<Option<ImageRecord>> {
    Ok(engine
        .list_images(Some(key))?
        .into_iter()
        .find(|image| image.has_tag(key)))
}
