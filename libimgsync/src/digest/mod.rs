//! Content digests.
//!
//! A digest is treated as an opaque `algorithm:hex` value. It is never
//! validated beyond being present; registries and engines are trusted to
//! hand back well-formed values.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// An opaque content digest such as `sha256:7173b8...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Computes the sha256 digest of raw bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::Digest;
    ///
    /// let digest = Digest::sha256(b"");
    /// assert_eq!(
    ///     digest.as_str(),
    ///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    pub fn sha256(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest(format!("sha256:{:x}", hasher.finalize()))
    }

    /// Returns the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Digest {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SyncError::parse(s, "digest is empty"));
        }
        Ok(Digest(s.to_string()))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
