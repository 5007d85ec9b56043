//! Stack guard.
//!
//! Precondition checks run before any interpreter primitive. A failed check
//! returns the error without touching interpreter state, so the stack depth is
//! unchanged.

use core_types::{Error, LuaType, Result};
use lua_sys::*;
use std::os::raw::c_int;

/// Whether `index` is acceptable: a stack slot in range or the registry.
/// Upvalue pseudo-indices are never valid from the host side.
pub(crate) unsafe fn valid_index(l: *mut lua_State, index: c_int) -> bool {
    let top = lua_gettop(l);
    let index = if index <= 0 {
        if index > LUA_REGISTRYINDEX {
            top + index + 1
        } else {
            return index == LUA_REGISTRYINDEX;
        }
    } else {
        index
    };
    index >= 1 && index <= top
}

pub(crate) unsafe fn check_stack(l: *mut lua_State, space: c_int) -> Result<()> {
    if space >= 0 && lua_checkstack(l, space) != 0 {
        Ok(())
    } else {
        Err(Error::IllegalState("stack overflow".to_string()))
    }
}

pub(crate) unsafe fn check_index(l: *mut lua_State, index: c_int) -> Result<()> {
    check_arg(valid_index(l, index), "illegal index")
}

/// Like [`check_index`] but pseudo-indices are rejected.
pub(crate) unsafe fn check_real_index(l: *mut lua_State, index: c_int) -> Result<()> {
    let top = lua_gettop(l);
    let index = if index <= 0 { top + index + 1 } else { index };
    check_arg(index >= 1 && index <= top, "illegal index")
}

pub(crate) unsafe fn check_type(l: *mut lua_State, index: c_int, expected: LuaType) -> Result<()> {
    check_index(l, index)?;
    check_arg(lua_type(l, index) == expected.code(), "illegal type")
}

pub(crate) unsafe fn check_nelems(l: *mut lua_State, n: c_int) -> Result<()> {
    check_state(lua_gettop(l) >= n, "stack underflow")
}

pub(crate) fn check_not_null<T>(ptr: *const T) -> Result<()> {
    if ptr.is_null() {
        Err(Error::NullReference("null".to_string()))
    } else {
        Ok(())
    }
}

pub(crate) fn check_arg(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::IllegalArgument(msg.to_string()))
    }
}

pub(crate) fn check_state(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::IllegalState(msg.to_string()))
    }
}
