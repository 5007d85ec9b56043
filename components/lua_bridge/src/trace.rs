//! Stack trace builder and message handler.
//!
//! A frame is relevant when it has a name or a source. Native frames only
//! carry the interpreter's `[C]` placeholder, which is not a source: they
//! appear by name, and never as the innermost frame, which is the raising
//! function itself.

use crate::embed;
use crate::util::{c_ptr, from_c_str, to_rust_string};
use core_types::{LuaError, StackTraceElement};
use lua_sys::*;
use std::os::raw::c_int;
use std::ptr;
use tracing::warn;

/// Error value left by the message handler when no trace could be built.
pub(crate) const FRAMES_UNAVAILABLE: &[u8] = b"stack frames unavailable\0";

fn strip_directive(source: String) -> String {
    match source.strip_prefix('=').or_else(|| source.strip_prefix('@')) {
        Some(stripped) => stripped.to_string(),
        None => source,
    }
}

unsafe fn relevant_element(ar: &lua_Debug, innermost: bool) -> Option<StackTraceElement> {
    let what = from_c_str(ar.what);
    let name = from_c_str(ar.name).filter(|name| !name.is_empty());
    let native = what.as_deref() == Some("C");
    if native && innermost {
        return None;
    }
    let source = if native {
        None
    } else {
        from_c_str(ar.source).map(strip_directive)
    };
    if name.is_none() && source.is_none() {
        return None;
    }
    Some(StackTraceElement {
        what,
        namewhat: from_c_str(ar.namewhat).filter(|namewhat| !namewhat.is_empty()),
        name,
        source,
        line: ar.currentline,
    })
}

unsafe fn count_relevant(l: *mut lua_State, first_level: c_int) -> usize {
    let mut ar = lua_Debug::default();
    let mut count = 0;
    let mut level = first_level;
    while lua_getstack(l, level, &mut ar) != 0 {
        lua_getinfo(l, c_ptr(b"nSl\0"), &mut ar);
        if relevant_element(&ar, level == first_level).is_some() {
            count += 1;
        }
        level += 1;
    }
    count
}

/// Walks the call stack of `l` from `first_level` outwards. Returns `None`
/// if the frame vector cannot be allocated.
pub(crate) unsafe fn capture(l: *mut lua_State, first_level: c_int) -> Option<Vec<StackTraceElement>> {
    let count = count_relevant(l, first_level);
    let mut frames = Vec::new();
    if frames.try_reserve_exact(count).is_err() {
        return None;
    }
    let mut ar = lua_Debug::default();
    let mut level = first_level;
    while frames.len() < count && lua_getstack(l, level, &mut ar) != 0 {
        lua_getinfo(l, c_ptr(b"nSl\0"), &mut ar);
        if let Some(element) = relevant_element(&ar, level == first_level) {
            frames.push(element);
        }
        level += 1;
    }
    Some(frames)
}

/// Message handler installed below every protected call.
///
/// Attaches the trace to an existing envelope, or coerces the error value to
/// a string and wraps it in a new envelope. The coercion may raise, so it runs
/// before any host value exists in this frame.
pub(crate) unsafe extern "C-unwind" fn message_handler(l: *mut lua_State) -> c_int {
    if lua_checkstack(l, LUA_MINSTACK) == 0 {
        return 1;
    }
    let wrapped = embed::is_lua_error(l, 1);
    if !wrapped {
        luaL_tolstring(l, 1, ptr::null_mut());
    }
    if !decorate(l, wrapped) {
        warn!("stack trace unavailable for error value");
        lua_pushstring(l, c_ptr(FRAMES_UNAVAILABLE));
    }
    1
}

unsafe fn decorate(l: *mut lua_State, wrapped: bool) -> bool {
    let Some(frames) = capture(l, 1) else {
        return false;
    };
    if wrapped {
        match embed::to_lua_error(l, 1) {
            Some(envelope) => match envelope.try_borrow_mut() {
                Ok(mut envelope) => envelope.stack_trace = Some(frames),
                Err(_) => return false,
            },
            None => return false,
        }
        lua_pushvalue(l, 1);
    } else {
        let message = to_rust_string(l, -1).unwrap_or_default();
        embed::push_lua_error(
            l,
            LuaError {
                message: Some(message),
                stack_trace: Some(frames),
                cause: None,
            },
        );
    }
    true
}
