//! Host Teardown Integration Tests
//!
//! An interpreter created outside the bridge can outlive its bridge handle.
//! These tests drive such an interpreter through the raw API after the
//! handle is closed.

use lua_bridge::LuaState;
use lua_sys::{
    lua_State, lua_close, lua_gc, lua_getglobal, lua_pcall, lua_pushnil, lua_setglobal,
    lua_tostring, luaL_newstate, LUA_GCCOLLECT,
};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::rc::Rc;

fn name(bytes: &'static [u8]) -> *const c_char {
    bytes.as_ptr().cast()
}

fn foreign_state() -> *mut lua_State {
    let l = unsafe { luaL_newstate() };
    assert!(!l.is_null());
    l
}

/// Test: collecting an embedded object after teardown leaves it alone
#[test]
fn test_gc_after_host_teardown_is_noop() {
    let l = foreign_state();
    let lua = unsafe { LuaState::attach(l) }.unwrap();
    assert!(!lua.is_owned());

    let object = Rc::new(7u64);
    lua.push_object(Rc::clone(&object)).unwrap();
    lua.set_global("obj").unwrap();
    assert_eq!(Rc::strong_count(&object), 2);

    lua.close().unwrap();
    assert!(!lua.is_open());
    assert!(!lua_bridge::is_available());

    unsafe {
        lua_pushnil(l);
        lua_setglobal(l, name(b"obj\0"));
        lua_gc(l, LUA_GCCOLLECT, 0);
    }
    assert_eq!(Rc::strong_count(&object), 2);

    drop(lua);
    unsafe { lua_close(l) };
    assert_eq!(Rc::strong_count(&object), 2);
}

/// Test: collecting an embedded object while attached releases it
#[test]
fn test_gc_while_attached_releases() {
    let l = foreign_state();
    let lua = unsafe { LuaState::attach(l) }.unwrap();

    let object = Rc::new(7u64);
    lua.push_object(Rc::clone(&object)).unwrap();
    lua.pop(1).unwrap();
    lua.gc(lua_bridge::GcAction::Collect, 0).unwrap();
    assert_eq!(Rc::strong_count(&object), 1);

    lua.close().unwrap();
    unsafe { lua_close(l) };
}

/// Test: a host function called after teardown raises instead of running
#[test]
fn test_host_function_after_teardown() {
    let l = foreign_state();
    let lua = unsafe { LuaState::attach(l) }.unwrap();
    let calls = Rc::new(std::cell::Cell::new(0));
    let counter = Rc::clone(&calls);
    lua.register("f", move |_: &LuaState| {
        counter.set(counter.get() + 1);
        Ok(0)
    })
    .unwrap();
    lua.close().unwrap();

    let message = unsafe {
        lua_getglobal(l, name(b"f\0"));
        let status = lua_pcall(l, 0, 0, 0);
        assert_ne!(status, 0);
        let message = CStr::from_ptr(lua_tostring(l, -1)).to_string_lossy().into_owned();
        lua_close(l);
        message
    };
    assert!(message.contains("no host state"));
    assert_eq!(calls.get(), 0);
}

/// Test: closing one attached state leaves another state's collector working
#[test]
fn test_teardown_is_per_instance() {
    let first_raw = foreign_state();
    let second_raw = foreign_state();
    let first = unsafe { LuaState::attach(first_raw) }.unwrap();
    let second = unsafe { LuaState::attach(second_raw) }.unwrap();

    let object = Rc::new(7u64);
    second.push_object(Rc::clone(&object)).unwrap();
    second.pop(1).unwrap();

    first.close().unwrap();
    assert!(lua_bridge::is_available());
    unsafe { lua_gc(second_raw, LUA_GCCOLLECT, 0) };
    assert_eq!(Rc::strong_count(&object), 1);

    second.close().unwrap();
    assert!(!lua_bridge::is_available());
    unsafe {
        lua_close(first_raw);
        lua_close(second_raw);
    }
}

/// Test: a value handle dropped after teardown leaves the registry alone
#[test]
fn test_value_ref_after_teardown() {
    let l = foreign_state();
    let lua = unsafe { LuaState::attach(l) }.unwrap();
    lua.push_integer(11).unwrap();
    let pinned = lua.to_value_ref(-1).unwrap();
    lua.pop(1).unwrap();

    lua.close().unwrap();
    assert!(pinned.push().is_err());
    drop(pinned);
    drop(lua);
    unsafe { lua_close(l) };
}
