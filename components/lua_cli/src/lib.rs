//! Lua Bridge CLI Library
//!
//! Provides the Runtime struct and supporting modules for the `lua-bridge`
//! command line tool.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod repl;
pub mod runtime;

pub use cli::{Cli, ErrorFormat};
pub use error::{render_error, CliError, CliResult};
pub use runtime::Runtime;
