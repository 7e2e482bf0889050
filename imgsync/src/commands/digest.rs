use crate::context::AppContext;
use crate::format::{Formattable, OutputFormat};
use libimgsync::{Digest, Engine, Session};
use serde::Serialize;

/// Where a reported digest was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestSource {
    /// Manifest digest served by the target registry
    Registry,
    /// Image ID held by the local engine
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub target: String,
    pub digest: Digest,
    pub source: DigestSource,
}

impl Formattable for DigestReport {
    fn format_pretty(&self) -> String {
        self.digest.to_string()
    }
}

/// Looks up the digest for `target` in the registry, or in the engine when
/// `local` is set.
pub fn lookup_digest<E: Engine>(
    session: &Session<E>,
    target: &str,
    local: bool,
) -> libimgsync::Result<DigestReport> {
    let (digest, source) = if local {
        (session.local_digest(target)?, DigestSource::Local)
    } else {
        (session.read(target)?, DigestSource::Registry)
    };

    Ok(DigestReport {
        target: target.to_string(),
        digest,
        source,
    })
}

/// Handle the digest command
pub fn handle_digest(ctx: &AppContext, target: &str, local: bool, format: OutputFormat) {
    let session = super::open_session(ctx);
    match lookup_digest(&session, target, local) {
        Ok(report) => super::print_formatted(ctx, &report, format),
        Err(e) => super::fail(ctx, &e),
    }
}

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;
