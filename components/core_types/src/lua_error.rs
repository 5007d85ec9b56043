//! Error envelope carried through the interpreter.

use crate::{Error, StackTraceElement};
use std::fmt;
use std::sync::Arc;

/// Structured failure carrier embedded in the interpreter as an opaque value.
///
/// The message handler attaches the reconstructed stack trace to an existing
/// envelope in place, so an envelope raised by a failing host callable keeps
/// its cause while gaining the interpreter frames.
///
/// # Examples
///
/// ```
/// use core_types::LuaError;
///
/// let error = LuaError::new("test:1: boom");
/// assert_eq!(error.message.as_deref(), Some("test:1: boom"));
/// assert!(error.stack_trace.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LuaError {
    /// Display message, usually location-prefixed
    pub message: Option<String>,
    /// Relevant interpreter frames, innermost first; `None` until attached
    pub stack_trace: Option<Vec<StackTraceElement>>,
    /// Host error that caused this failure
    pub cause: Option<Arc<Error>>,
}

impl LuaError {
    /// Creates an envelope holding only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            stack_trace: None,
            cause: None,
        }
    }

    /// Creates an envelope for a failing host callable.
    pub fn with_cause(message: impl Into<String>, cause: Arc<Error>) -> Self {
        Self {
            message: Some(message.into()),
            stack_trace: None,
            cause: Some(cause),
        }
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), _) => f.write_str(message)?,
            (None, Some(cause)) => write!(f, "{}", cause)?,
            (None, None) => f.write_str("(no message)")?,
        }
        if let Some(trace) = &self.stack_trace {
            for element in trace {
                write!(f, "\n\tat {}", element)?;
            }
        }
        Ok(())
    }
}
