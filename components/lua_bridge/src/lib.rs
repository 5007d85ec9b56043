//! Call bridge between the Lua interpreter and host code.
//!
//! Every interpreter entry point runs behind a stack guard and, when it can
//! fail, inside a protected call frame. Interpreter failures come back as a
//! typed [`Error`] carrying the reconstructed stack trace. Host functions are
//! called through a trampoline that keeps interpreter jumps away from host
//! frames, and host objects embedded in the interpreter are released by its
//! garbage collector.
//!
//! # Overview
//!
//! - [`LuaState`] - Handle to an interpreter instance and the whole API
//! - [`HostFunction`] - Host code callable from the interpreter
//! - [`Config`] - Tunables, loadable from TOML
//! - [`Library`] - Standard libraries
//! - [`ActivationRecord`] - Debug interface frame
//! - [`PersistedValue`] - Persisted value graph
//! - [`LuaValueRef`] - Host handle pinning an interpreter value
//!
//! # Examples
//!
//! ```
//! use lua_bridge::{LuaState, Result};
//!
//! let lua = LuaState::new().unwrap();
//! lua.register("twice", |lua: &LuaState| -> Result<usize> {
//!     let n = lua.to_integer(1)?;
//!     lua.push_integer(n * 2)?;
//!     Ok(1)
//! })
//! .unwrap();
//! lua.load_str("return twice(21)", "=example").unwrap();
//! lua.call(0, 1).unwrap();
//! assert_eq!(lua.to_integer(-1).unwrap(), 42);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod callback;
mod check;
mod config;
mod coroutine;
mod debug;
mod embed;
mod env;
mod guard;
mod library;
mod persist;
mod protect;
mod state;
mod stream;
mod table;
mod trace;
mod translate;
mod util;
mod value_ref;

pub use callback::{host_function, HostFunction};
pub use config::Config;
pub use core_types::{
    ArithOp, Error, ErrorKind, GcAction, LuaError, LuaType, RelOp, Result, RuntimeError,
    StackTraceElement, ThreadStatus,
};
pub use debug::ActivationRecord;
pub use env::is_available;
pub use library::Library;
pub use lua_sys::{lua_State, LUA_MULTRET, LUA_REGISTRYINDEX};
pub use persist::PersistedValue;
pub use state::LuaState;
pub use value_ref::LuaValueRef;
