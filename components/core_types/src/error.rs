//! Typed errors raised by bridge operations.
//!
//! Every failure that crosses from the interpreter into the host surfaces as
//! one [`Error`] variant. Precondition failures map to the argument, state and
//! null variants; interpreter status codes map to the runtime, syntax, memory,
//! finalizer and message handler variants.

use crate::LuaError;
use std::fmt;
use std::sync::Arc;

/// Result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument violated a precondition
    IllegalArgument,
    /// The bridge or interpreter was in the wrong state for the operation
    IllegalState,
    /// A required reference was absent
    NullReference,
    /// Runtime failure raised by the interpreter or a host callable
    Runtime,
    /// Chunk failed to compile
    Syntax,
    /// Interpreter allocation failed
    MemoryAllocation,
    /// A `__gc` metamethod raised an error
    GcMetamethod,
    /// The message handler itself failed
    MessageHandler,
    /// Reading or writing a stream failed
    Io,
    /// A host callable panicked
    HostPanic,
    /// A host-defined error passed through the bridge
    External,
    /// Unrecoverable failure with no structure
    Fatal,
}

/// Typed failure of a bridge operation.
///
/// # Examples
///
/// ```
/// use core_types::{Error, ErrorKind, RuntimeError};
///
/// let error = Error::Runtime(RuntimeError::new("test:1: boom"));
/// assert_eq!(error.kind(), ErrorKind::Runtime);
/// assert_eq!(error.to_string(), "test:1: boom");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// An argument violated a precondition (bad index, bad type, bad count)
    #[error("{0}")]
    IllegalArgument(String),
    /// The operation is not allowed in the current state
    #[error("{0}")]
    IllegalState(String),
    /// A required reference was null
    #[error("{0}")]
    NullReference(String),
    /// Interpreter runtime failure
    #[error(transparent)]
    Runtime(RuntimeError),
    /// Chunk failed to compile
    #[error("{0}")]
    Syntax(String),
    /// Interpreter ran out of memory
    #[error("{0}")]
    MemoryAllocation(String),
    /// A `__gc` metamethod raised an error
    #[error("{0}")]
    GcMetamethod(String),
    /// The message handler raised an error while handling another
    #[error("{0}")]
    MessageHandler(String),
    /// Stream failure while loading, dumping or persisting
    #[error("{0}")]
    Io(Arc<std::io::Error>),
    /// Host callable panicked; the payload message is kept
    #[error("host function panicked: {0}")]
    HostPanic(String),
    /// Arbitrary host error passed through the interpreter
    #[error("{0}")]
    External(Arc<dyn std::error::Error + Send + Sync>),
    /// Unrecoverable failure, typically an error value that could not be
    /// converted to a message
    #[error("{0}")]
    Fatal(String),
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IllegalArgument(_) => ErrorKind::IllegalArgument,
            Error::IllegalState(_) => ErrorKind::IllegalState,
            Error::NullReference(_) => ErrorKind::NullReference,
            Error::Runtime(_) => ErrorKind::Runtime,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::MemoryAllocation(_) => ErrorKind::MemoryAllocation,
            Error::GcMetamethod(_) => ErrorKind::GcMetamethod,
            Error::MessageHandler(_) => ErrorKind::MessageHandler,
            Error::Io(_) => ErrorKind::Io,
            Error::HostPanic(_) => ErrorKind::HostPanic,
            Error::External(_) => ErrorKind::External,
            Error::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Wraps an arbitrary host error.
    pub fn external<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::External(Arc::new(error))
    }

    /// Returns the interpreter error envelope if this is a runtime error
    /// carrying one.
    pub fn lua_error(&self) -> Option<&LuaError> {
        match self {
            Error::Runtime(runtime) => runtime.lua_error(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Error::Runtime(err)
    }
}

/// Runtime failure raised inside the interpreter.
///
/// Carries the display message, the host error that caused it (when a host
/// callable failed), and the error envelope with its reconstructed
/// interpreter stack trace.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    message: String,
    cause: Option<Arc<Error>>,
    lua_error: Option<LuaError>,
}

impl RuntimeError {
    /// Creates a runtime error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            lua_error: None,
        }
    }

    /// Creates a runtime error with a message and a causing host error.
    pub fn with_cause(message: impl Into<String>, cause: Arc<Error>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause),
            lua_error: None,
        }
    }

    /// Attaches the interpreter error envelope.
    pub fn set_lua_error(&mut self, lua_error: LuaError) {
        self.lua_error = Some(lua_error);
    }

    /// The display message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The causing host error, if any.
    pub fn cause(&self) -> Option<&Arc<Error>> {
        self.cause.as_ref()
    }

    /// The interpreter error envelope, if any.
    pub fn lua_error(&self) -> Option<&LuaError> {
        self.lua_error.as_ref()
    }

    /// The reconstructed interpreter stack trace; empty when unavailable.
    pub fn stack_trace(&self) -> &[crate::StackTraceElement] {
        self.lua_error
            .as_ref()
            .and_then(|e| e.stack_trace.as_deref())
            .unwrap_or(&[])
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
