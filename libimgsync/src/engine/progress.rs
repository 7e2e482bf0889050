//! Engine status streams.
//!
//! Push and pull report progress as newline-delimited JSON objects. The last
//! object of a successful push carries the pushed manifest digest, either in
//! `aux` or in a `"{tag}: digest: {digest} size: {n}"` status line.

use super::Cancellation;
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{debug, trace};

/// One object of an engine status stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        rename = "errorDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_detail: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<PushAux>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Summary attached to the final event of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PushAux {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ProgressEvent {
    /// Parses one line of a status stream.
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| {
            SyncError::engine_with_source(format!("Malformed engine status line: {}", line), e)
        })
    }

    /// Returns the failure reported by this event, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.error_detail.as_ref()?.message.as_deref())
            .filter(|m| !m.is_empty())
    }

    /// Returns the manifest digest announced by this event, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::engine::ProgressEvent;
    ///
    /// let event = ProgressEvent::parse_line(
    ///     r#"{"status":"3.10: digest: sha256:abc size: 528"}"#,
    /// ).unwrap();
    /// assert_eq!(event.digest().unwrap().as_str(), "sha256:abc");
    /// ```
    pub fn digest(&self) -> Option<Digest> {
        let from_aux = self
            .aux
            .as_ref()
            .and_then(|aux| aux.digest.as_deref())
            .and_then(|d| d.parse().ok());

        from_aux.or_else(|| digest_from_status(self.status.as_deref()?))
    }
}

fn digest_from_status(status: &str) -> Option<Digest> {
    let (_, rest) = status.split_once("digest: ")?;
    rest.split_whitespace().next()?.parse().ok()
}

/// Returns true when an engine error text means the registry refused the
/// credentials.
pub fn is_auth_failure(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["unauthorized", "denied", "authentication required"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Reads a status stream to its end.
///
/// Every event is handed to `sink`. Cancellation is checked after each line
/// is read and before it is handled, so a cancel issued while a read is
/// blocked is seen once that read returns; the event is then discarded.
/// Returning drops the reader, which aborts the transfer. Returns the last
/// digest the stream announced.
pub fn consume_stream<R: BufRead>(
    reader: R,
    operation: &str,
    registry: &str,
    sink: &mut dyn FnMut(&ProgressEvent),
    cancellation: &Cancellation,
) -> Result<Option<Digest>> {
    let mut digest = None;

    for line in reader.lines() {
        if cancellation.is_cancelled() {
            debug!(operation, "status stream cancelled");
            return Err(SyncError::cancelled(operation));
        }

        let line = line.map_err(|e| {
            SyncError::engine_with_source(format!("Failed to read {} stream", operation), e)
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = ProgressEvent::parse_line(line)?;
        trace!(?event, "status event");
        sink(&event);

        if let Some(message) = event.error_message() {
            return Err(if is_auth_failure(message) {
                SyncError::auth(registry, message, None)
            } else {
                SyncError::engine(format!("{} failed: {}", operation, message))
            });
        }

        if let Some(found) = event.digest() {
            digest = Some(found);
        }
    }

    if cancellation.is_cancelled() {
        return Err(SyncError::cancelled(operation));
    }
    Ok(digest)
}
