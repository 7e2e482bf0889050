//! Locally known images, keyed by tag-qualified reference.

use crate::digest::Digest;
use crate::engine::ImageRecord;
use std::collections::HashMap;


/// Images produced by a push, keyed by `[registry/]repository:tag`.
///
/// Keys are store keys (see [`crate::reference::ImageReference::store_key`]):
/// tag-qualified, with Docker Hub hosts and `library/` dropped. Lookups are
/// exact, so a reference written without a tag must be qualified first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageStore {
    images: HashMap<String, ImageRecord>,
}

/// Outcome of a tag-and-push, owned by its caller.
pub type PushResult = ImageStore;

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an image under a tag-qualified reference, replacing any
    /// previous entry.
    pub fn insert(&mut self, tag_qualified: impl Into<String>, record: ImageRecord) {
        self.images.insert(tag_qualified.into(), record);
    }

    /// Returns the image recorded for a tag-qualified reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::engine::ImageRecord;
    /// use libimgsync::store::ImageStore;
    ///
    /// let mut store = ImageStore::new();
    /// store.insert("alpine:3.10", ImageRecord::default());
    /// assert!(store.lookup("alpine:3.10").is_some());
    /// assert!(store.lookup("alpine").is_none());
    /// ```
    pub fn lookup(&self, tag_qualified: &str) -> Option<&ImageRecord> {
        self.images.get(tag_qualified)
    }

    /// Returns the push digest recorded for a tag-qualified reference.
    pub fn digest(&self, tag_qualified: &str) -> Option<&Digest> {
        self.lookup(tag_qualified)?.digest.as_ref()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageRecord)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v))
    }
}
