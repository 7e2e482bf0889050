//! Manifest media types.
//!
//! OCI media types come from the `oci-spec` crate; the Docker distribution
//! types it does not model are spelled out here.

use oci_spec::image::MediaType;

/// Docker image manifest, schema 2.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker manifest list (multi-platform), schema 2.
pub const DOCKER_MANIFEST_LIST_V2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// Signed Docker image manifest, schema 1. Requested only as a fallback for
/// registries that serve nothing newer.
pub const DOCKER_MANIFEST_V1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";

/// Returns the `Accept` header for a modern manifest request.
///
/// The Docker v2 type is listed first: registries answering with it return
/// the same digest the engine reports after a push.
///
/// # Examples
///
/// ```
/// let accept = libimgsync::oci::modern_accept_header();
/// assert!(accept.starts_with("application/vnd.docker.distribution.manifest.v2+json"));
/// assert!(accept.contains("application/vnd.oci.image.manifest.v1+json"));
/// ```
pub fn modern_accept_header() -> String {
    [
        DOCKER_MANIFEST_V2.to_string(),
        DOCKER_MANIFEST_LIST_V2.to_string(),
        MediaType::ImageManifest.to_string(),
        MediaType::ImageIndex.to_string(),
    ]
    .join(", ")
}
