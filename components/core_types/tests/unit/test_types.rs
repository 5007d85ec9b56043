//! Unit tests for interpreter constant mirrors

use core_types::{GcAction, LuaType, RelOp, ThreadStatus};

#[test]
fn test_lua_type_names() {
    assert_eq!(LuaType::Nil.name(), "nil");
    assert_eq!(LuaType::LightUserdata.name(), "userdata");
    assert_eq!(LuaType::Userdata.name(), "userdata");
    assert_eq!(LuaType::Thread.name(), "thread");
    assert_eq!(LuaType::None.name(), "no value");
}

#[test]
fn test_gc_action_codes() {
    assert_eq!(GcAction::Collect.code(), 2);
    assert_eq!(GcAction::CountBytes.code(), 4);
    assert_eq!(GcAction::IsRunning.code(), 9);
}

#[test]
fn test_rel_op_codes() {
    assert_eq!(RelOp::Eq.code(), 0);
    assert_eq!(RelOp::Lt.code(), 1);
    assert_eq!(RelOp::Le.code(), 2);
}

#[test]
fn test_thread_status_from_code() {
    assert_eq!(ThreadStatus::from_code(0), Some(ThreadStatus::Ok));
    assert_eq!(ThreadStatus::from_code(1), Some(ThreadStatus::Yield));
    assert_eq!(ThreadStatus::from_code(2), Some(ThreadStatus::RuntimeError));
    assert_eq!(ThreadStatus::from_code(7), None);
}
