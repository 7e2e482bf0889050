use crate::context::AppContext;
use crate::format::{Formattable, OutputFormat, OutputFormatter};
use libimgsync::{Cancellation, Engine, ProgressEvent, RegistryImage, Session};

impl Formattable for RegistryImage {
    fn format_pretty(&self) -> String {
        let digest = self
            .sha256_digest
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        format!(
            "Source: {}\nTarget: {}\nDigest: {}",
            self.source_name, self.target_name, digest
        )
    }
}

/// One-line description of an engine progress event for the spinner.
pub fn progress_message(event: &ProgressEvent) -> Option<String> {
    let status = event.status.as_deref()?;
    Some(match (&event.id, &event.progress) {
        (Some(id), Some(progress)) => format!("{}: {} {}", id, status, progress),
        (Some(id), None) => format!("{}: {}", id, status),
        _ => status.to_string(),
    })
}

/// Pushes `source` as `target`, driving a spinner from engine progress.
pub fn push_image<E: Engine>(
    session: &Session<E>,
    formatter: &dyn OutputFormatter,
    source: &str,
    target: &str,
    cancellation: &Cancellation,
) -> libimgsync::Result<RegistryImage> {
    let pb = formatter.spinner(&format!("Pushing {} to {}", source, target));

    let result = session.create_with_progress(
        source,
        target,
        &mut |event| {
            if let Some(message) = progress_message(event) {
                pb.set_message(message);
            }
        },
        cancellation,
    );

    match result {
        Ok(state) => {
            formatter.finish_progress(pb, &format!("Pushed {}", target));
            Ok(state)
        }
        Err(e) => {
            pb.finish_and_clear();
            Err(e)
        }
    }
}

/// Handle the push command
pub fn handle_push(ctx: &AppContext, source: &str, target: &str, format: OutputFormat) {
    let session = super::open_session(ctx);
    match push_image(
        &session,
        ctx.formatter.as_ref(),
        source,
        target,
        &Cancellation::new(),
    ) {
        Ok(state) => super::print_formatted(ctx, &state, format),
        Err(e) => super::fail(ctx, &e),
    }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
