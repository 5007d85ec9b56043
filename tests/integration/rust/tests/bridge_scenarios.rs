//! Bridge Scenario Integration Tests
//!
//! Exercises the bridge end to end: stack guards, error translation, host
//! callbacks, embedded objects and coroutines working together.

use core_types::{Error, ErrorKind, ThreadStatus};
use lua_bridge::{LuaState, Result};
use std::cell::Cell;
use std::rc::Rc;

fn lua_with_libs() -> LuaState {
    let lua = LuaState::new().expect("state creation failed");
    lua.open_libs().expect("opening libraries failed");
    lua
}

/// Test: every precondition failure leaves the stack depth unchanged
#[test]
fn test_precondition_walls_keep_depth() {
    let lua = LuaState::new().unwrap();
    lua.push_integer(1).unwrap();
    lua.push_string("two").unwrap();
    lua.new_table(0, 0).unwrap();

    let attempts: Vec<Box<dyn Fn() -> Result<()> + '_>> = vec![
        Box::new(|| lua.push_value(99)),
        Box::new(|| lua.raw_get_i(1, 1).map(|_| ())),
        Box::new(|| lua.get_field(8, "x").map(|_| ())),
        Box::new(|| lua.call(5, 0)),
        Box::new(|| lua.concat(9)),
        Box::new(|| lua.insert(4)),
        Box::new(|| lua.resume(2, 0).map(|_| ())),
        Box::new(|| lua.load(&b"return 1"[..], "=m", "x")),
    ];
    for attempt in &attempts {
        assert!(attempt().is_err());
        assert_eq!(lua.top().unwrap(), 3);
    }
}

/// Test: error("boom") yields a location-prefixed message and one frame
#[test]
fn test_runtime_error_message_and_trace() {
    let lua = lua_with_libs();
    lua.load_str("local unused = 1\nerror('boom')", "=script").unwrap();
    let error = lua.call(0, 0).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(error.to_string(), "script:2: boom");
    let frames = error.lua_error().unwrap().stack_trace.clone().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].source.as_deref(), Some("script"));
    assert_eq!(frames[0].line, 2);
    assert_eq!(lua.top().unwrap(), 0);
}

/// Test: an embedded object comes back as the same host object
#[test]
fn test_embedded_object_round_trip() {
    let lua = lua_with_libs();
    let object = Rc::new(String::from("payload"));
    lua.push_object(Rc::clone(&object)).unwrap();
    lua.set_global("obj").unwrap();

    lua.load_str("local t = { obj } return t[1], type(obj)", "=embed")
        .unwrap();
    lua.call(0, 2).unwrap();

    let back = lua.to_object::<String>(1).unwrap().unwrap();
    assert!(Rc::ptr_eq(&back, &object));
    assert!(lua.to_object::<Vec<u8>>(1).unwrap().is_none());
    assert_eq!(lua.to_string(2).unwrap().as_deref(), Some("userdata"));
    assert!(lua.to_object::<String>(2).unwrap().is_none());
}

/// Test: setting the yield intent twice still yields once
#[test]
fn test_yield_intent_is_idempotent() {
    let lua = LuaState::new().unwrap();
    lua.register("pause", |lua: &LuaState| {
        lua.yield_values(0)?;
        lua.yield_values(0)
    })
    .unwrap();
    lua.register("noop", |_: &LuaState| Ok(0)).unwrap();
    lua.load_str("pause() noop() noop() return 'done'", "=co").unwrap();
    lua.new_thread().unwrap();

    assert_eq!(lua.resume(1, 0).unwrap(), 0);
    assert_eq!(lua.status(1).unwrap(), ThreadStatus::Yield);
    assert_eq!(lua.resume(1, 0).unwrap(), 1);
    assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("done"));
}

/// Test: a failing resume leaves the error value and carries a trace
#[test]
fn test_failing_resume() {
    let lua = lua_with_libs();
    lua.load_str("local x = nil\nreturn x.field", "=co").unwrap();
    lua.new_thread().unwrap();
    let depth = lua.top().unwrap();

    let error = lua.resume(1, 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(lua.top().unwrap(), depth + 1);
    assert_eq!(lua.status(1).unwrap(), ThreadStatus::RuntimeError);

    let frames = error.lua_error().unwrap().stack_trace.clone().unwrap();
    assert!(!frames.is_empty());
    assert_eq!(frames[0].source.as_deref(), Some("co"));
    assert_eq!(frames[0].line, 2);
}

/// Test: a panic two callbacks deep surfaces as the innermost cause
#[test]
fn test_nested_callback_panic_cause_chain() {
    let lua = lua_with_libs();
    lua.register("explode", |_: &LuaState| -> Result<usize> {
        panic!("deep failure")
    })
    .unwrap();
    lua.register("relay", |lua: &LuaState| {
        lua.get_global("middle")?;
        lua.call(0, 0)?;
        Ok(0)
    })
    .unwrap();
    lua.load_str("function middle() explode() end", "=defs").unwrap();
    lua.call(0, 0).unwrap();

    let main = lua.as_ptr();
    lua.load_str("relay()", "=entry").unwrap();
    let error = lua.call(0, 0).unwrap_err();
    assert_eq!(lua.as_ptr(), main);
    assert_eq!(lua.top().unwrap(), 0);

    let mut innermost = &error;
    while let Error::Runtime(runtime) = innermost {
        match runtime.cause() {
            Some(cause) => innermost = cause.as_ref(),
            None => break,
        }
    }
    assert_eq!(innermost.kind(), ErrorKind::HostPanic);
    assert!(innermost.to_string().contains("deep failure"));
}

/// Test: host code called from a coroutine runs against that thread
#[test]
fn test_callback_currency_in_coroutine() {
    let lua = lua_with_libs();
    let main = lua.as_ptr();
    let seen = Rc::new(Cell::new(0usize));
    let record = Rc::clone(&seen);
    lua.register("where", move |lua: &LuaState| {
        record.set(lua.as_ptr() as usize);
        lua.push_boolean(lua.is_yieldable()?)?;
        Ok(1)
    })
    .unwrap();

    lua.load_str("return where()", "=co").unwrap();
    lua.new_thread().unwrap();
    assert_eq!(lua.resume(1, 0).unwrap(), 1);

    assert!(lua.to_boolean(-1).unwrap());
    assert_ne!(seen.get(), 0);
    assert_ne!(seen.get(), main as usize);
    assert_eq!(lua.as_ptr(), main);
}

/// Test: a named host function between script frames appears in the trace
#[test]
fn test_trace_keeps_named_host_frames() {
    let lua = lua_with_libs();
    lua.register("relay", |lua: &LuaState| {
        lua.get_global("fail")?;
        lua.call(0, 0)?;
        Ok(0)
    })
    .unwrap();
    lua.load_str("function fail() error('inner') end", "=defs").unwrap();
    lua.call(0, 0).unwrap();

    lua.load_str("relay()", "=entry").unwrap();
    let error = lua.call(0, 0).unwrap_err();
    let Error::Runtime(outer) = &error else {
        panic!("unexpected {:?}", error);
    };
    let outer_frames = outer.lua_error().unwrap().stack_trace.clone().unwrap();
    assert_eq!(outer_frames.len(), 1);
    assert_eq!(outer_frames[0].source.as_deref(), Some("entry"));

    let inner = outer.cause().unwrap().as_ref();
    let frames = inner.lua_error().unwrap().stack_trace.clone().unwrap();
    let names: Vec<Option<&str>> = frames.iter().map(|f| f.name.as_deref()).collect();
    assert_eq!(names, vec![None, Some("relay"), None]);
    assert_eq!(frames[0].source.as_deref(), Some("defs"));
    assert_eq!(frames[1].what.as_deref(), Some("C"));
    assert_eq!(frames[1].source, None);
    assert_eq!(frames[2].source.as_deref(), Some("entry"));
}

/// Test: host functions validate their arguments with located errors
#[test]
fn test_argument_checks_from_script() {
    let lua = lua_with_libs();
    lua.register("repeat_text", |lua: &LuaState| {
        let text = lua.check_string(1)?;
        let count = lua.check_integer_or(2, 2)?;
        lua.check_arg(2, count >= 0, "negative count")?;
        lua.push_string(&text.repeat(count as usize))?;
        Ok(1)
    })
    .unwrap();

    lua.load_str("return repeat_text('ab'), repeat_text(7, 3)", "=args").unwrap();
    lua.call(0, 2).unwrap();
    assert_eq!(lua.to_string(1).unwrap().as_deref(), Some("abab"));
    assert_eq!(lua.to_string(2).unwrap().as_deref(), Some("777"));
    lua.set_top(0).unwrap();

    lua.load_str("local s = repeat_text('x', -1)", "=args").unwrap();
    let error = lua.call(0, 0).unwrap_err();
    assert_eq!(
        error.to_string(),
        "args:1: bad argument #2 to 'repeat_text' (negative count)"
    );
    let Error::Runtime(runtime) = &error else {
        panic!("unexpected {:?}", error);
    };
    assert_eq!(runtime.cause().unwrap().kind(), ErrorKind::IllegalArgument);
}

/// Test: a pinned value outlives the stack slot it came from
#[test]
fn test_value_ref_across_calls() {
    let lua = lua_with_libs();
    lua.load_str("return function(n) return n * 3 end", "=ref").unwrap();
    lua.call(0, 1).unwrap();
    let triple = lua.to_value_ref(-1).unwrap();
    lua.set_top(0).unwrap();
    lua.gc(lua_bridge::GcAction::Collect, 0).unwrap();

    for n in 1..=3 {
        assert_eq!(triple.push().unwrap(), lua_bridge::LuaType::Function);
        lua.push_integer(n).unwrap();
        lua.call(1, 1).unwrap();
        assert_eq!(lua.to_integer(-1).unwrap(), n * 3);
        lua.pop(1).unwrap();
    }
    assert_eq!(triple.state().unwrap().as_ptr(), lua.as_ptr());
}
