use crate::context::AppContext;
use libimgsync::{HttpEngine, Session};

/// Check command handlers
pub mod check;

/// Config command handlers
pub mod config;

/// Digest command handlers
pub mod digest;

/// Push command handlers
pub mod push;

/// Version command handlers
pub mod version;

/// Opens a session for the resolved configuration, exiting on failure.
pub(crate) fn open_session(ctx: &AppContext) -> Session<HttpEngine> {
    tracing::debug!(host = %ctx.config.engine.host, "opening session");
    match Session::from_config(&ctx.config) {
        Ok(session) => session,
        Err(e) => fail(ctx, &e),
    }
}

/// Reports `err` and exits with status 1.
pub(crate) fn fail(ctx: &AppContext, err: &dyn std::fmt::Display) -> ! {
    ctx.formatter.error(&err.to_string());
    std::process::exit(1)
}

/// Prints `item` in the requested format, exiting on serialization errors.
pub(crate) fn print_formatted<T: crate::format::Formattable>(
    ctx: &AppContext,
    item: &T,
    format: crate::format::OutputFormat,
) {
    match crate::format::format_output(item, format) {
        Ok(output) => println!("{}", output),
        Err(e) => fail(ctx, &format!("formatting output: {}", e)),
    }
}
