//! Coroutine resume coordinator.
//!
//! Resuming moves the arguments onto the target thread, runs it, and moves
//! results or the error value back. A failed thread is dead but its stack is
//! intact, so the trace is built against it before the value is moved.

use crate::embed;
use crate::guard::{check_arg, check_nelems, check_stack, check_type};
use crate::protect::protect;
use crate::state::LuaState;
use crate::trace;
use crate::translate;
use crate::util::to_rust_string;
use core_types::{Error, LuaError, LuaType, Result, StackTraceElement, ThreadStatus};
use lua_sys::*;
use std::os::raw::c_int;
use std::ptr;

impl LuaState {
    /// Pops a function and pushes a new thread that will run it.
    pub fn new_thread(&self) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, -1, LuaType::Function)?;
            protect(l, 1, 1, |l| {
                let thread = lua_newthread(l);
                lua_insert(l, 1);
                lua_xmove(l, thread, 1);
            })
        }
    }

    /// Resumes the thread at `index` with the top `nargs` values as
    /// arguments. On success the values it yielded or returned are pushed and
    /// their count returned.
    ///
    /// On failure the arguments are consumed and the error value is left on
    /// the stack.
    pub fn resume(&self, index: i32, nargs: i32) -> Result<i32> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Thread)?;
            check_arg(nargs >= 0, "illegal argument count")?;
            check_nelems(l, nargs + 1)?;
            let thread = lua_tothread(l, index);
            check_stack(thread, nargs)?;
            lua_xmove(l, thread, nargs);
            let status = lua_resume(thread, l, nargs);
            tracing::trace!(status, nargs, "resumed thread");
            match status {
                LUA_OK | LUA_YIELD => {
                    let count = lua_gettop(thread);
                    check_stack(l, count)?;
                    lua_xmove(thread, l, count);
                    Ok(count)
                }
                _ => Err(transfer_error(l, thread, status)),
            }
        }
    }

    /// Status of the thread at `index`.
    pub fn status(&self, index: i32) -> Result<ThreadStatus> {
        let l = self.enter()?;
        unsafe {
            check_type(l, index, LuaType::Thread)?;
            let code = lua_status(lua_tothread(l, index));
            ThreadStatus::from_code(code)
                .ok_or_else(|| Error::Fatal(format!("unexpected thread status {}", code)))
        }
    }
}

/// Moves the error value of a failed thread to `l` with the thread's trace
/// attached, and translates it.
unsafe fn transfer_error(l: *mut lua_State, thread: *mut lua_State, status: c_int) -> Error {
    let frames = if lua_checkstack(thread, 2) != 0 {
        trace::capture(thread, 0)
    } else {
        None
    };
    lua_xmove(thread, l, 1);
    match (frames, embed::to_lua_error(l, -1)) {
        (Some(frames), Some(envelope)) => {
            if let Ok(mut envelope) = envelope.try_borrow_mut() {
                envelope.stack_trace = Some(frames);
            }
        }
        (Some(frames), None) if status == LUA_ERRRUN => {
            if wrap_error_value(l, frames).is_err() {
                tracing::trace!("error value transferred without a stack trace");
            }
        }
        _ => {}
    }
    translate::translate(l, status)
}

/// Replaces the error value on top with an envelope carrying `frames`. On
/// failure the raw value stays in place.
///
/// The value is converted first, by a body that holds nothing across the
/// conversion. `frames` only enters the second body, which can fail on
/// allocation alone.
unsafe fn wrap_error_value(l: *mut lua_State, frames: Vec<StackTraceElement>) -> Result<()> {
    lua_pushvalue(l, -1);
    let message = protect(l, 1, 0, |l| {
        luaL_tolstring(l, 1, ptr::null_mut());
        to_rust_string(l, -1).unwrap_or_default()
    })?;
    protect(l, 0, 1, move |l| {
        embed::push_lua_error(
            l,
            LuaError {
                message: Some(message),
                stack_trace: Some(frames),
                cause: None,
            },
        );
    })?;
    lua_remove(l, -2);
    Ok(())
}
