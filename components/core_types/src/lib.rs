//! Core Lua bridge types and error handling.
//!
//! This crate provides the host-side vocabulary shared by every bridge
//! component: the typed error model, the error envelope carried through the
//! interpreter, reconstructed stack trace elements, and the small enums that
//! mirror interpreter constants.
//!
//! # Overview
//!
//! - [`Error`] - Typed failures raised by bridge operations
//! - [`RuntimeError`] - Interpreter runtime failure with cause chain
//! - [`LuaError`] - Error envelope embedded in the interpreter
//! - [`StackTraceElement`] - One reconstructed interpreter call frame
//! - [`LuaType`], [`GcAction`], [`ArithOp`], [`RelOp`], [`ThreadStatus`]
//!
//! # Examples
//!
//! ```
//! use core_types::{Error, ErrorKind, LuaType};
//!
//! let error = Error::IllegalArgument("illegal index".to_string());
//! assert_eq!(error.kind(), ErrorKind::IllegalArgument);
//! assert_eq!(error.to_string(), "illegal index");
//!
//! assert_eq!(LuaType::from_code(5), LuaType::Table);
//! assert_eq!(LuaType::Table.name(), "table");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod lua_error;
mod trace;
mod types;

pub use error::{Error, ErrorKind, Result, RuntimeError};
pub use lua_error::LuaError;
pub use trace::StackTraceElement;
pub use types::{ArithOp, GcAction, LuaType, RelOp, ThreadStatus};
