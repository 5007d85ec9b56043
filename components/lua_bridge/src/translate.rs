//! Error translator.
//!
//! Maps an interpreter status and the error value on top of the stack to a
//! typed [`Error`]. The value is left in place; callers decide whether to pop
//! it.

use crate::embed;
use crate::util::{c_ptr, to_rust_string};
use core_types::{Error, RuntimeError};
use lua_sys::*;
use std::os::raw::c_int;
use std::ptr;

unsafe extern "C-unwind" fn tostring_body(l: *mut lua_State) -> c_int {
    luaL_tolstring(l, 1, ptr::null_mut());
    1
}

/// Converts the value at `index` to a host string, honouring `__tostring`.
/// A conversion that raises yields [`Error::Fatal`].
pub(crate) unsafe fn describe(l: *mut lua_State, index: c_int) -> Result<String, Error> {
    if let Some(message) = embed::lua_error_message(l, index) {
        return Ok(message);
    }
    let index = lua_absindex(l, index);
    if matches!(lua_type(l, index), LUA_TSTRING | LUA_TNUMBER) {
        lua_pushvalue(l, index);
        let message = to_rust_string(l, -1).unwrap_or_default();
        lua_pop(l, 1);
        return Ok(message);
    }
    if lua_checkstack(l, 2) == 0 {
        return Err(Error::Fatal("stack overflow converting error value".to_string()));
    }
    lua_pushcfunction(l, tostring_body);
    lua_pushvalue(l, index);
    let status = lua_pcall(l, 1, 1, 0);
    let result = if status == LUA_OK {
        Ok(to_rust_string(l, -1).unwrap_or_default())
    } else {
        let reason = to_rust_string(l, -1)
            .unwrap_or_else(|| "error value cannot be converted to a string".to_string());
        Err(Error::Fatal(reason))
    };
    lua_pop(l, 1);
    result
}

/// Translates `status` using the error value on top of the stack.
pub(crate) unsafe fn translate(l: *mut lua_State, status: c_int) -> Error {
    let make: fn(String) -> Error = match status {
        LUA_ERRRUN => return runtime_error(l),
        LUA_ERRSYNTAX => Error::Syntax,
        LUA_ERRMEM => Error::MemoryAllocation,
        LUA_ERRGCMM => Error::GcMetamethod,
        LUA_ERRERR => Error::MessageHandler,
        other => return Error::Fatal(format!("unexpected interpreter status {}", other)),
    };
    match describe(l, -1) {
        Ok(message) => make(message),
        Err(fatal) => fatal,
    }
}

unsafe fn runtime_error(l: *mut lua_State) -> Error {
    if let Some(envelope) = embed::to_lua_error(l, -1) {
        let envelope = envelope.borrow().clone();
        let mut runtime = match (&envelope.message, &envelope.cause) {
            (Some(message), Some(cause)) => RuntimeError::with_cause(message.clone(), cause.clone()),
            (None, Some(cause)) => RuntimeError::with_cause(cause.to_string(), cause.clone()),
            (Some(message), None) => RuntimeError::new(message.clone()),
            (None, None) => RuntimeError::new(String::new()),
        };
        runtime.set_lua_error(envelope);
        return Error::Runtime(runtime);
    }
    match describe(l, -1) {
        Ok(message) => Error::Runtime(RuntimeError::new(message)),
        Err(fatal) => fatal,
    }
}

/// Pushes the location of the caller at `level` concatenated with `message`.
pub(crate) unsafe fn push_located_message(l: *mut lua_State, level: c_int, message: &'static [u8]) {
    luaL_where(l, level);
    lua_pushstring(l, c_ptr(message));
    lua_concat(l, 2);
}
