//! Protected call frame.
//!
//! Runs a body under `lua_pcall` with the message handler installed below
//! it, so an interpreter error unwinds to a known boundary and comes back as
//! a typed error. The body is handed over as an explicit parameter block
//! through a light userdata.

use crate::trace;
use crate::translate;
use core_types::{Error, Result};
use lua_sys::*;
use std::os::raw::{c_int, c_void};

struct Params<F, R> {
    body: Option<F>,
    result: Option<R>,
    nresults: c_int,
}

unsafe extern "C-unwind" fn do_call<F, R>(l: *mut lua_State) -> c_int
where
    F: FnOnce(*mut lua_State) -> R,
{
    let params = lua_touserdata(l, 1).cast::<Params<F, R>>();
    lua_remove(l, 1);
    // The block lives in the frame of `protect`, which outlives this call.
    if let Some(body) = (*params).body.take() {
        let result = body(l);
        (*params).result = Some(result);
    }
    (*params).nresults
}

/// Calls `body` in protected mode.
///
/// The top `nargs` values become the body's stack, starting at index 1. On
/// return the top `nresults` values of the body's stack replace them. The
/// body must only hold values without destructors across interpreter calls
/// that may raise. On failure the error value is popped.
///
/// Needs three free stack slots beyond the arguments.
pub(crate) unsafe fn protect<F, R>(
    l: *mut lua_State,
    nargs: c_int,
    nresults: c_int,
    body: F,
) -> Result<R>
where
    F: FnOnce(*mut lua_State) -> R,
{
    let mut params = Params {
        body: Some(body),
        result: None,
        nresults,
    };
    let base = lua_gettop(l) - nargs + 1;
    lua_pushcfunction(l, trace::message_handler);
    lua_pushcfunction(l, do_call::<F, R>);
    lua_pushlightuserdata(l, (&mut params as *mut Params<F, R>).cast::<c_void>());
    lua_rotate(l, base, 3);
    let status = lua_pcall(l, nargs + 1, nresults, base);
    lua_remove(l, base);
    if status != LUA_OK {
        let error = translate::translate(l, status);
        lua_pop(l, 1);
        tracing::trace!(status, "protected call failed: {}", error);
        return Err(error);
    }
    params
        .result
        .take()
        .ok_or_else(|| Error::Fatal("protected call produced no result".to_string()))
}

/// Calls the value below the top `nargs` values with the message handler
/// installed. On failure the error value is popped.
pub(crate) unsafe fn call(l: *mut lua_State, nargs: c_int, nresults: c_int) -> Result<()> {
    let base = lua_gettop(l) - nargs;
    lua_pushcfunction(l, trace::message_handler);
    lua_insert(l, base);
    let status = lua_pcall(l, nargs, nresults, base);
    lua_remove(l, base);
    if status != LUA_OK {
        let error = translate::translate(l, status);
        lua_pop(l, 1);
        tracing::trace!(status, "call failed: {}", error);
        return Err(error);
    }
    Ok(())
}
