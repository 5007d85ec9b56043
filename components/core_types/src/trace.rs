//! Reconstructed interpreter call frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One relevant frame of an interpreter call stack.
///
/// Built from the interpreter's debug records. The source has its `=` or `@`
/// directive prefix removed.
///
/// # Examples
///
/// ```
/// use core_types::StackTraceElement;
///
/// let frame = StackTraceElement {
///     what: Some("Lua".to_string()),
///     namewhat: Some("global".to_string()),
///     name: Some("fail".to_string()),
///     source: Some("script.lua".to_string()),
///     line: 3,
/// };
///
/// assert_eq!(frame.to_string(), "fail (script.lua:3)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTraceElement {
    /// Frame kind: `Lua`, `main` or `C`
    pub what: Option<String>,
    /// How the function was named: `global`, `local`, `method`, `field`,
    /// `upvalue` or empty
    pub namewhat: Option<String>,
    /// Function name, if the interpreter could determine one
    pub name: Option<String>,
    /// Chunk name without directive prefix
    pub source: Option<String>,
    /// Current line, or -1 when not available
    pub line: i32,
}

impl StackTraceElement {
    /// Whether this frame is the main chunk of a loaded source.
    pub fn is_main_chunk(&self) -> bool {
        self.what.as_deref() == Some("main")
    }
}

impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name)?,
            None if self.is_main_chunk() => f.write_str("main chunk")?,
            None => f.write_str("?")?,
        }
        match (&self.source, self.line) {
            (Some(source), line) if line >= 0 => write!(f, " ({}:{})", source, line),
            (Some(source), _) => write!(f, " ({})", source),
            (None, _) => Ok(()),
        }
    }
}
