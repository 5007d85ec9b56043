//! Contract tests for the bridge API
//!
//! These tests verify the public API behaves as documented.

use lua_bridge::{is_available, ErrorKind, GcAction, LuaState, LuaType, PersistedValue, ThreadStatus};
use std::io::{Seek, SeekFrom};
use std::rc::Rc;

/// Test LuaState::new() returns an open, owned state with an empty stack
#[test]
fn test_new_contract() {
    let lua = LuaState::new().unwrap();
    assert!(lua.is_open());
    assert!(lua.is_owned());
    assert_eq!(lua.top().unwrap(), 0);
    assert!(is_available());
}

/// Test close() rejects operations afterwards and is idempotent
#[test]
fn test_close_contract() {
    let lua = LuaState::new().unwrap();
    lua.close().unwrap();
    lua.close().unwrap();
    assert_eq!(lua.top().unwrap_err().kind(), ErrorKind::IllegalState);
}

/// Test close() from inside a running call is refused
#[test]
fn test_close_while_processing_contract() {
    let lua = LuaState::new().unwrap();
    lua.register("shut", |lua: &LuaState| {
        let error = lua.close().unwrap_err();
        lua.push_string(&error.to_string())?;
        Ok(1)
    })
    .unwrap();
    lua.load_str("return shut()", "=c").unwrap();
    lua.call(0, 1).unwrap();
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("Lua is processing"));
    assert!(lua.is_open());
}

/// Test call() consumes the function and arguments on failure
#[test]
fn test_call_failure_contract() {
    let lua = LuaState::new().unwrap();
    lua.push_integer(10).unwrap();
    lua.push_nil().unwrap();
    lua.push_integer(1).unwrap();
    let error = lua.call(1, 1).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(lua.top().unwrap(), 1);
}

/// Test call() with LUA_MULTRET pushes every result
#[test]
fn test_call_multret_contract() {
    let lua = LuaState::new().unwrap();
    lua.load_str("return 1, 2, 3", "=m").unwrap();
    lua.call(0, lua_bridge::LUA_MULTRET).unwrap();
    assert_eq!(lua.top().unwrap(), 3);
}

/// Test to_object() filters by type and to_host_object() does not
#[test]
fn test_object_contract() {
    let lua = LuaState::new().unwrap();
    let object = Rc::new(vec![1u8, 2, 3]);
    lua.push_object(Rc::clone(&object)).unwrap();

    let typed = lua.to_object::<Vec<u8>>(1).unwrap().unwrap();
    assert!(Rc::ptr_eq(&typed, &object));
    assert!(lua.to_object::<String>(1).unwrap().is_none());
    assert!(lua.to_host_object(1).unwrap().is_some());
    assert_eq!(lua.type_of(1).unwrap(), LuaType::Userdata);
}

/// Test embedded objects cannot have their metatable replaced from Lua
#[test]
fn test_object_metatable_protected_contract() {
    let lua = LuaState::new().unwrap();
    lua.open_libs().unwrap();
    lua.push_object(Rc::new(1u32)).unwrap();
    lua.set_global("obj").unwrap();
    lua.load_str("return getmetatable(obj)", "=g").unwrap();
    lua.call(0, 1).unwrap();
    assert_eq!(lua.type_of(-1).unwrap(), LuaType::Boolean);
}

/// Test yield_values() clears the intent after each return
#[test]
fn test_yield_flag_contract() {
    let lua = LuaState::new().unwrap();
    lua.register("y", |lua: &LuaState| lua.yield_values(0)).unwrap();
    lua.register("plain", |_: &LuaState| Ok(0)).unwrap();
    lua.load_str("y() plain() return 'end'", "=co").unwrap();
    lua.new_thread().unwrap();

    assert_eq!(lua.resume(1, 0).unwrap(), 0);
    assert_eq!(lua.status(1).unwrap(), ThreadStatus::Yield);
    assert_eq!(lua.resume(1, 0).unwrap(), 1);
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("end"));
    assert_eq!(lua.status(1).unwrap(), ThreadStatus::Ok);
}

/// Test load() accepts any reader and dump() any writer
#[test]
fn test_stream_contract() {
    let lua = LuaState::new().unwrap();
    lua.load_str("return 'from file'", "=dump").unwrap();

    let mut file = tempfile::tempfile().unwrap();
    lua.dump(&mut file, false).unwrap();
    lua.pop(1).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    lua.load(&mut file, "=file", "b").unwrap();
    lua.call(0, 1).unwrap();
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("from file"));
}

/// Test persist() and unpersist() through a file
#[test]
fn test_persist_contract() {
    let lua = LuaState::new().unwrap();
    lua.load_str("return { 1, 2, name = 'n', nested = { true } }", "=p").unwrap();
    lua.call(0, 1).unwrap();
    lua.new_table(0, 0).unwrap();

    let mut file = tempfile::tempfile().unwrap();
    lua.persist(&mut file, 2, 1).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    lua.unpersist(&mut file, 2).unwrap();

    assert_eq!(lua.table_size(3).unwrap(), 4);
    lua.get_field(3, "nested").unwrap();
    lua.raw_get_i(-1, 1).unwrap();
    assert!(lua.to_boolean(-1).unwrap());
}

/// Test snapshot() produces the documented tree
#[test]
fn test_snapshot_contract() {
    let lua = LuaState::new().unwrap();
    lua.new_table(0, 0).unwrap();
    lua.push_string("s").unwrap();
    assert_eq!(
        lua.snapshot(1, 2).unwrap(),
        PersistedValue::String(b"s".to_vec())
    );
}

/// Test gc() reports memory in use
#[test]
fn test_gc_contract() {
    let lua = LuaState::new().unwrap();
    let kilobytes = lua.gc(GcAction::Count, 0).unwrap();
    let bytes = lua.gc(GcAction::CountBytes, 0).unwrap();
    assert!(kilobytes > 0);
    assert!((0..1024).contains(&bytes));
}
