//! Contract tests for core_types
//!
//! These tests pin the public surface the bridge components depend on.

use core_types::{Error, ErrorKind, LuaError, Result, RuntimeError, StackTraceElement};
use std::sync::Arc;

/// Contract: every error variant reports its own kind
#[test]
fn contract_every_variant_has_kind() {
    let cases = vec![
        (Error::IllegalArgument("a".into()), ErrorKind::IllegalArgument),
        (Error::IllegalState("a".into()), ErrorKind::IllegalState),
        (Error::NullReference("a".into()), ErrorKind::NullReference),
        (Error::Runtime(RuntimeError::new("a")), ErrorKind::Runtime),
        (Error::Syntax("a".into()), ErrorKind::Syntax),
        (Error::MemoryAllocation("a".into()), ErrorKind::MemoryAllocation),
        (Error::GcMetamethod("a".into()), ErrorKind::GcMetamethod),
        (Error::MessageHandler("a".into()), ErrorKind::MessageHandler),
        (std::io::Error::new(std::io::ErrorKind::Other, "a").into(), ErrorKind::Io),
        (Error::HostPanic("a".into()), ErrorKind::HostPanic),
        (Error::Fatal("a".into()), ErrorKind::Fatal),
    ];
    for (error, kind) in cases {
        assert_eq!(error.kind(), kind);
    }
}

/// Contract: errors are cloneable and shareable across threads
#[test]
fn contract_error_clone_keeps_cause() {
    let cause = Arc::new(Error::IllegalState("inner".into()));
    let error = Error::Runtime(RuntimeError::with_cause("outer", cause.clone()));
    let copy = error.clone();
    match copy {
        Error::Runtime(runtime) => assert!(Arc::ptr_eq(runtime.cause().unwrap(), &cause)),
        other => panic!("unexpected {:?}", other),
    }
}

/// Contract: the envelope carries message, trace and cause
#[test]
fn contract_lua_error_fields() {
    let envelope = LuaError {
        message: Some("m".into()),
        stack_trace: Some(Vec::<StackTraceElement>::new()),
        cause: None,
    };
    assert_eq!(envelope.message.as_deref(), Some("m"));
    assert_eq!(envelope.stack_trace.as_ref().map(Vec::len), Some(0));
}

/// Contract: Result alias uses the bridge error
#[test]
fn contract_result_alias() {
    fn fails() -> Result<()> {
        Err(Error::NullReference("null".into()))
    }
    assert_eq!(fails().unwrap_err().kind(), ErrorKind::NullReference);
}
