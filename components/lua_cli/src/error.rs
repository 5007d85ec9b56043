//! Error types for the CLI

use crate::cli::ErrorFormat;
use core_types::{Error, StackTraceElement};
use serde_json::json;

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Failure reported by the bridge
    #[error(transparent)]
    Lua(#[from] Error),

    /// File I/O error
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// REPL error
    #[error("REPL error: {0}")]
    Repl(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Renders an error report in the requested format.
///
/// The text form lists the message, then every cause, then the interpreter
/// stack trace of the outermost error.
pub fn render_error(error: &CliError, format: ErrorFormat) -> String {
    let (kind, frames) = match error {
        CliError::Lua(inner) => (format!("{:?}", inner.kind()), stack_trace(inner)),
        CliError::Io(_) => ("Io".to_string(), Vec::new()),
        CliError::Repl(_) => ("Repl".to_string(), Vec::new()),
    };
    let causes = causes(error);

    match format {
        ErrorFormat::Json => json!({
            "kind": kind,
            "message": error.to_string(),
            "causes": causes,
            "stack_trace": frames,
        })
        .to_string(),
        ErrorFormat::Text => {
            let mut report = format!("{} error: {}", kind, error);
            for cause in &causes {
                report.push_str("\ncaused by: ");
                report.push_str(cause);
            }
            for frame in &frames {
                report.push_str("\n    at ");
                report.push_str(&frame.to_string());
            }
            report
        }
    }
}

fn stack_trace(error: &Error) -> Vec<StackTraceElement> {
    error
        .lua_error()
        .and_then(|envelope| envelope.stack_trace.clone())
        .unwrap_or_default()
}

fn causes(error: &CliError) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = std::error::Error::source(error);
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}
