//! Unit tests for Error, RuntimeError and LuaError

use core_types::{Error, ErrorKind, LuaError, RuntimeError, StackTraceElement};
use std::error::Error as _;
use std::sync::Arc;

fn frame(name: Option<&str>, source: &str, line: i32) -> StackTraceElement {
    StackTraceElement {
        what: Some("Lua".to_string()),
        namewhat: name.map(|_| "global".to_string()),
        name: name.map(str::to_string),
        source: Some(source.to_string()),
        line,
    }
}

#[test]
fn test_runtime_error_without_envelope_has_empty_trace() {
    let error = RuntimeError::new("boom");
    assert!(error.stack_trace().is_empty());
    assert!(error.lua_error().is_none());
    assert!(error.cause().is_none());
}

#[test]
fn test_runtime_error_exposes_envelope_trace() {
    let mut envelope = LuaError::new("script:2: boom");
    envelope.stack_trace = Some(vec![frame(Some("fail"), "script", 2), frame(None, "script", 5)]);

    let mut error = RuntimeError::new("script:2: boom");
    error.set_lua_error(envelope);

    let trace = error.stack_trace();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].name.as_deref(), Some("fail"));
    assert_eq!(trace[1].line, 5);
}

#[test]
fn test_cause_chain_walks_through_source() {
    let innermost = Arc::new(Error::IllegalArgument("bad".to_string()));
    let middle = Arc::new(Error::Runtime(RuntimeError::with_cause("middle", innermost)));
    let outer = Error::Runtime(RuntimeError::with_cause("outer", middle));

    let mut messages = vec![outer.to_string()];
    let mut current = outer.source();
    while let Some(error) = current {
        messages.push(error.to_string());
        current = error.source();
    }
    assert_eq!(messages, vec!["outer", "middle", "bad"]);
}

#[test]
fn test_lua_error_accessor_on_error() {
    let mut runtime = RuntimeError::new("x");
    runtime.set_lua_error(LuaError::new("x"));
    let error = Error::Runtime(runtime);
    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert!(error.lua_error().is_some());
    assert!(Error::Fatal("x".to_string()).lua_error().is_none());
}

#[test]
fn test_external_error_display() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
    let error = Error::external(io);
    assert_eq!(error.kind(), ErrorKind::External);
    assert_eq!(error.to_string(), "disk gone");
}

#[test]
fn test_host_panic_display() {
    let error = Error::HostPanic("oops".to_string());
    assert_eq!(error.to_string(), "host function panicked: oops");
}
