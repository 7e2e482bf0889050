//! imgsync - Container Image Synchronization Library
//!
//! imgsync copies a container image from a local engine to a target
//! registry and reports the content digest the registry holds for it. The
//! digest can later be re-checked straight from the registry's manifest
//! endpoint without pulling any image data.
//!
//! # Quick Start
//!
//! ```no_run
//! use libimgsync::{Cancellation, Config, Session};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let session = Session::from_config(&config)?;
//!
//!     // Tag and push a local image, learning its registry digest
//!     let state = session.create(
//!         "alpine:3.10",
//!         "myregistry.example.com/alpine:3.10",
//!         &Cancellation::new(),
//!     )?;
//!     println!("{:?}", state.sha256_digest);
//!
//!     // Later: ask the registry directly
//!     let digest = session.read("myregistry.example.com/alpine:3.10")?;
//!     println!("{}", digest);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Main Types
//!
//! - [`Session`] - Engine, resolver and credentials for one run
//! - [`DigestResolver`] - Registry manifest digest lookups
//! - [`ImageReference`] - Image reference parsing with registry defaults
//! - [`ImageStore`] - Images produced by a push, by tag-qualified name
//! - [`Config`] - Engine endpoint, network and credential settings
//!
//! # Architecture
//!
//! - **Session** ([`session`]) - Recommended entry point
//! - **Low-level modules** - Reference parsing, registry resolution, engine
//!   access and push orchestration (hidden from docs)

#![warn(clippy::all)]

/// Returns the libimgsync crate version.
///
/// # Examples
///
/// ```
/// let version = libimgsync::version();
/// assert!(!version.is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod session;
pub use session::{RegistryImage, Session};

// Re-export commonly used types for convenience
pub use auth::{CredentialMap, Credentials};
pub use config::Config;
pub use digest::Digest;
pub use engine::{Cancellation, Engine, HttpEngine, ImageRecord, ProgressEvent};
pub use error::{Result, SyncError};
pub use push::tag_and_push;
pub use reference::ImageReference;
pub use registry::DigestResolver;
pub use store::{ImageStore, PushResult};

#[doc(hidden)]
pub mod auth;
#[doc(hidden)]
pub mod client;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod digest;
#[doc(hidden)]
pub mod engine;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod oci;
#[doc(hidden)]
pub mod push;
#[doc(hidden)]
pub mod reference;
#[doc(hidden)]
pub mod registry;
#[doc(hidden)]
pub mod store;
