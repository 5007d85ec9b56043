//! Unit tests for bridge components

use lua_bridge::{
    host_function, ArithOp, Config, Error, ErrorKind, GcAction, Library, LuaState, LuaType,
    ThreadStatus,
};
use std::cell::Cell;
use std::rc::Rc;

fn lua_with_libs() -> LuaState {
    let lua = LuaState::new().unwrap();
    lua.open_libs().unwrap();
    lua
}

fn run(lua: &LuaState, source: &str, name: &str, results: i32) {
    lua.load_str(source, name).unwrap();
    lua.call(0, results).unwrap();
}

// ============================================================================
// Stack Guard Tests
// ============================================================================

#[test]
fn test_invalid_index_leaves_stack_unchanged() {
    let lua = LuaState::new().unwrap();
    lua.push_integer(1).unwrap();
    lua.push_integer(2).unwrap();

    let error = lua.push_value(7).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::IllegalArgument);
    assert_eq!(error.to_string(), "illegal index");
    assert_eq!(lua.top().unwrap(), 2);
}

#[test]
fn test_stack_overflow_request() {
    let lua = LuaState::new().unwrap();
    let error = lua.ensure_stack(2_000_000).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::IllegalState);
    assert_eq!(error.to_string(), "stack overflow");
    assert_eq!(lua.top().unwrap(), 0);
}

#[test]
fn test_underflow_and_type_checks() {
    let lua = LuaState::new().unwrap();
    assert_eq!(lua.set_global("x").unwrap_err().to_string(), "stack underflow");
    lua.push_integer(3).unwrap();
    let error = lua.raw_get_i(1, 1).unwrap_err();
    assert_eq!(error.to_string(), "illegal type");
    assert_eq!(lua.top().unwrap(), 1);
}

#[test]
fn test_predicates_on_invalid_index_are_false() {
    let lua = LuaState::new().unwrap();
    assert!(lua.is_none(1).unwrap());
    assert!(!lua.is_nil(1).unwrap());
    assert!(!lua.is_number(1).unwrap());
    assert!(!lua.is_string(1).unwrap());
    assert_eq!(lua.type_of(1).unwrap(), LuaType::None);
    assert!(!lua.raw_equal(1, 2).unwrap());
}

#[test]
fn test_registry_is_valid_but_upvalue_index_is_not() {
    let lua = LuaState::new().unwrap();
    assert!(lua.is_table(lua_bridge::LUA_REGISTRYINDEX).unwrap());
    assert!(lua.push_value(lua_bridge::LUA_REGISTRYINDEX - 1).is_err());
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn test_number_conversions() {
    let lua = LuaState::new().unwrap();
    lua.push_string("12").unwrap();
    lua.push_number(2.5).unwrap();
    lua.push_boolean(false).unwrap();

    assert_eq!(lua.to_integer_x(1).unwrap(), Some(12));
    assert_eq!(lua.to_integer_x(2).unwrap(), None);
    assert_eq!(lua.to_number(2).unwrap(), 2.5);
    assert_eq!(lua.to_number_x(3).unwrap(), None);
    assert!(!lua.to_boolean(3).unwrap());
    assert!(lua.to_boolean(1).unwrap());
}

#[test]
fn test_to_string_of_non_string_is_none() {
    let lua = LuaState::new().unwrap();
    lua.new_table(0, 0).unwrap();
    assert_eq!(lua.to_string(1).unwrap(), None);
    assert!(lua.to_display_string(1).unwrap().starts_with("table: "));
    assert_eq!(lua.top().unwrap(), 1);
}

#[test]
fn test_bytes_round_trip_with_nul() {
    let lua = LuaState::new().unwrap();
    lua.push_bytes(b"a\0b").unwrap();
    assert_eq!(lua.to_bytes(-1).unwrap().unwrap(), b"a\0b".to_vec());
    assert_eq!(lua.raw_len(-1).unwrap(), 3);
}

// ============================================================================
// Error Translation Tests
// ============================================================================

#[test]
fn test_runtime_error_carries_trace() {
    let lua = lua_with_libs();
    lua.load_str("error('boom')", "=test").unwrap();
    let error = lua.call(0, 0).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert!(error.to_string().starts_with("test:1:"));
    let envelope = error.lua_error().unwrap();
    let frames = envelope.stack_trace.as_ref().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].what.as_deref(), Some("main"));
    assert_eq!(frames[0].source.as_deref(), Some("test"));
    assert_eq!(frames[0].line, 1);
    assert_eq!(lua.top().unwrap(), 0);
}

#[test]
fn test_non_string_error_value() {
    let lua = lua_with_libs();
    lua.load_str("error({})", "=t").unwrap();
    let error = lua.call(0, 0).unwrap_err();
    assert!(error.to_string().starts_with("table: "));
}

#[test]
fn test_failing_tostring_in_error_value() {
    let lua = lua_with_libs();
    lua.load_str(
        "error(setmetatable({}, { __tostring = function() error('nested') end }))",
        "=t",
    )
    .unwrap();
    let error = lua.call(0, 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert!(error.to_string().contains("nested"));
    assert_eq!(lua.top().unwrap(), 0);
}

#[test]
fn test_gc_metamethod_error() {
    let lua = lua_with_libs();
    run(
        &lua,
        "setmetatable({}, { __gc = function() error('in gc') end })",
        "=gc",
        0,
    );
    let error = lua.gc(GcAction::Collect, 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::GcMetamethod);
    assert!(error.to_string().contains("in gc"));
}

// ============================================================================
// Host Function Tests
// ============================================================================

#[test]
fn test_nested_callback_keeps_cause_chain() {
    let lua = lua_with_libs();
    lua.register("inner", |_: &LuaState| -> lua_bridge::Result<usize> {
        Err(Error::IllegalState("inner failed".to_string()))
    })
    .unwrap();
    lua.register("outer", |lua: &LuaState| {
        lua.get_global("callback")?;
        lua.call(0, 0)?;
        Ok(0)
    })
    .unwrap();
    run(&lua, "function callback() inner() end", "=defs", 0);

    let main = lua.as_ptr();
    lua.load_str("outer()", "=entry").unwrap();
    let error = lua.call(0, 0).unwrap_err();
    assert_eq!(lua.as_ptr(), main);

    let runtime = match &error {
        Error::Runtime(runtime) => runtime,
        other => panic!("unexpected {:?}", other),
    };
    assert!(runtime.message().starts_with("entry:1:"));
    let outer_cause = runtime.cause().unwrap();
    assert_eq!(outer_cause.kind(), ErrorKind::Runtime);
    let inner_cause = match outer_cause.as_ref() {
        Error::Runtime(inner) => inner.cause().unwrap(),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(inner_cause.kind(), ErrorKind::IllegalState);
    assert_eq!(inner_cause.to_string(), "inner failed");
}

#[test]
fn test_host_error_caught_by_pcall() {
    let lua = lua_with_libs();
    lua.register("fail", |_: &LuaState| -> lua_bridge::Result<usize> {
        Err(Error::IllegalArgument("nope".to_string()))
    })
    .unwrap();
    run(&lua, "local ok, e = pcall(fail) return ok, tostring(e)", "=pc", 2);
    assert!(!lua.to_boolean(1).unwrap());
    assert_eq!(lua.to_string(2).unwrap().as_deref(), Some("nope"));
}

#[test]
fn test_host_function_receives_arguments() {
    let lua = LuaState::new().unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    lua.register("count", move |lua: &LuaState| {
        counter.set(counter.get() + 1);
        lua.push_integer(i64::from(lua.top()?))?;
        Ok(1)
    })
    .unwrap();
    run(&lua, "return count(1, 2, 3)", "=args", 1);
    assert_eq!(lua.to_integer(-1).unwrap(), 3);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_host_function_is_released_by_collector() {
    let lua = LuaState::new().unwrap();
    let marker = Rc::new(());
    let held = Rc::clone(&marker);
    lua.push_function(move |_: &LuaState| {
        let _ = &held;
        Ok(0)
    })
    .unwrap();
    assert_eq!(Rc::strong_count(&marker), 2);
    lua.pop(1).unwrap();
    lua.gc(GcAction::Collect, 0).unwrap();
    assert_eq!(Rc::strong_count(&marker), 1);
}

#[test]
fn test_shared_host_function_in_module() {
    let lua = lua_with_libs();
    let hello = host_function(|lua: &LuaState| {
        lua.push_string("hello")?;
        Ok(1)
    });
    lua.register_module("greet", &[("hello", hello)], false).unwrap();
    lua.pop(1).unwrap();
    run(&lua, "return require('greet').hello()", "=req", 1);
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("hello"));
}

// ============================================================================
// Coroutine Tests
// ============================================================================

#[test]
fn test_coroutine_from_lua_library_with_host_yield() {
    let lua = lua_with_libs();
    lua.register("give", |lua: &LuaState| lua.yield_values(lua.top()? as usize))
        .unwrap();
    run(
        &lua,
        "local co = coroutine.wrap(function() give(1) give(2) return 3 end) return co() + co() + co()",
        "=wrap",
        1,
    );
    assert_eq!(lua.to_integer(-1).unwrap(), 6);
}

#[test]
fn test_resume_dead_thread_fails() {
    let lua = LuaState::new().unwrap();
    lua.load_str("return 1", "=once").unwrap();
    lua.new_thread().unwrap();
    assert_eq!(lua.resume(1, 0).unwrap(), 1);
    lua.pop(1).unwrap();
    let error = lua.resume(1, 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(lua.top().unwrap(), 2);
    assert_eq!(lua.status(1).unwrap(), ThreadStatus::RuntimeError);
}

// ============================================================================
// Configuration and Library Tests
// ============================================================================

#[test]
fn test_config_from_toml() {
    let config = Config::from_toml_str("min_stack = 40\nopen_libs = true").unwrap();
    assert_eq!(config.min_stack, 40);
    let lua = LuaState::with_config(config).unwrap();
    assert_eq!(lua.get_global("table").unwrap(), LuaType::Table);
}

#[test]
fn test_config_rejects_unknown_fields() {
    assert!(Config::from_toml_str("stack = 1").is_err());
}

#[test]
fn test_open_lib_by_name() {
    let lua = LuaState::new().unwrap();
    lua.open_lib(Library::from_name("string").unwrap()).unwrap();
    run(&lua, "return string.rep('ab', 2)", "=s", 1);
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("abab"));
}

#[test]
fn test_arith_error_is_runtime() {
    let lua = LuaState::new().unwrap();
    lua.push_integer(1).unwrap();
    lua.new_table(0, 0).unwrap();
    let error = lua.arith(ArithOp::Add).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(lua.top().unwrap(), 0);
}
