use crate::context::AppContext;
use crate::format::{Formattable, OutputFormat};
use libimgsync::{Digest, Engine, Session};
use serde::Serialize;

/// Exit status when the registry serves a different digest
pub const DRIFT_EXIT_CODE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub target: String,
    pub expected: Digest,
    pub actual: Digest,
    pub current: bool,
}

impl Formattable for CheckReport {
    fn format_pretty(&self) -> String {
        if self.current {
            format!("{} is current ({})", self.target, self.actual)
        } else {
            format!(
                "{} has drifted\n  expected: {}\n  actual:   {}",
                self.target, self.expected, self.actual
            )
        }
    }
}

/// Compares `expected` against the digest the registry serves for `target`.
pub fn check_digest<E: Engine>(
    session: &Session<E>,
    target: &str,
    expected: &Digest,
) -> libimgsync::Result<CheckReport> {
    let actual = session.read(target)?;
    Ok(CheckReport {
        target: target.to_string(),
        current: &actual == expected,
        expected: expected.clone(),
        actual,
    })
}

/// Handle the check command
pub fn handle_check(ctx: &AppContext, target: &str, expected: &str, format: OutputFormat) {
    let expected: Digest = match expected.parse() {
        Ok(digest) => digest,
        Err(e) => super::fail(ctx, &e),
    };

    let session = super::open_session(ctx);
    match check_digest(&session, target, &expected) {
        Ok(report) => {
            super::print_formatted(ctx, &report, format);
            if !report.current {
                ctx.formatter
                    .warning(&format!("{} no longer serves {}", target, report.expected));
                std::process::exit(DRIFT_EXIT_CODE);
            }
        }
        Err(e) => super::fail(ctx, &e),
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
