//! In-memory engine for orchestrator and session tests.

use super::{Cancellation, Engine, ImageRecord, ProgressEvent};
use crate::auth::RegistryAuth;
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    images: Vec<ImageRecord>,
    calls: Vec<String>,
    auths: Vec<RegistryAuth>,
}

/// Engine double holding images in memory.
///
/// Pushes announce `push_digest` and record it as a repo digest, mimicking a
/// registry that stores identical content under the same digest.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<State>,
    pub push_digest: Option<Digest>,
    pub push_error: Option<String>,
    pub record_repo_digest: bool,
}

impl FakeEngine {
    pub fn new(push_digest: &str) -> Self {
        Self {
            push_digest: Some(push_digest.parse().unwrap()),
            record_repo_digest: true,
            ..Default::default()
        }
    }

    pub fn with_image(self, id: &str, tags: &[&str]) -> Self {
        self.state.lock().unwrap().images.push(ImageRecord {
            id: id.to_string(),
            repo_tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn auths(&self) -> Vec<RegistryAuth> {
        self.state.lock().unwrap().auths.clone()
    }
}

impl Engine for FakeEngine {
    fn tag_image(&self, source: &str, repository: &str, tag: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("tag {} {}:{}", source, repository, tag));

        let source_key = crate::reference::tag_qualified(source)?;
        let target = format!("{}:{}", repository, tag);
        for image in state.images.iter_mut() {
            image.repo_tags.retain(|t| t != &target);
        }
        let image = state
            .images
            .iter_mut()
            .find(|i| i.has_tag(&source_key))
            .ok_or_else(|| SyncError::engine(format!("tag: no such image: {}", source)))?;
        image.repo_tags.push(target);
        Ok(())
    }

    fn push_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        sink: &mut dyn FnMut(&ProgressEvent),
        cancellation: &Cancellation,
    ) -> Result<Option<Digest>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("push {}:{}", name, tag));
        state.auths.push(auth.clone());

        if cancellation.is_cancelled() {
            return Err(SyncError::cancelled("push"));
        }
        if let Some(message) = &self.push_error {
            return Err(SyncError::engine(format!("push failed: {}", message)));
        }

        sink(&ProgressEvent {
            status: Some("Pushed".to_string()),
            ..Default::default()
        });

        let key = format!("{}:{}", name, tag);
        if let (Some(digest), true) = (&self.push_digest, self.record_repo_digest) {
            let entry = format!("{}@{}", name, digest);
            if let Some(image) = state.images.iter_mut().find(|i| i.has_tag(&key)) {
                if !image.repo_digests.contains(&entry) {
                    image.repo_digests.push(entry);
                }
            }
        }
        Ok(self.push_digest.clone())
    }

    fn pull_image(
        &self,
        name: &str,
        tag: &str,
        auth: &RegistryAuth,
        _sink: &mut dyn FnMut(&ProgressEvent),
        _cancellation: &Cancellation,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("pull {}:{}", name, tag));
        state.auths.push(auth.clone());
        state.images.push(ImageRecord {
            id: format!("sha256:pulled-{}", name),
            repo_tags: vec![format!("{}:{}", name, tag)],
            ..Default::default()
        });
        Ok(())
    }

    fn list_images(&self, reference: Option<&str>) -> Result<Vec<ImageRecord>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("list {}", reference.unwrap_or("*")));
        Ok(state
            .images
            .iter()
            .filter(|i| reference.is_none_or(|r| i.has_tag(r)))
            .cloned()
            .collect())
    }
}
