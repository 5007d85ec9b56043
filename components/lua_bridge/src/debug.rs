//! Debug interface: activation records and on-demand stack traces.

use crate::guard::{check_arg, check_stack};
use crate::state::LuaState;
use crate::trace;
use crate::util::{c_string, from_c_str};
use core_types::{Error, Result, StackTraceElement};
use lua_sys::*;
use std::ffi::CStr;
use std::fmt;

/// Snapshot of a call stack frame, taken by [`LuaState::get_stack`] or
/// [`LuaState::get_info`].
///
/// Only the fields selected when it was taken are filled. The record holds
/// no reference into the interpreter and stays valid after the frame
/// returns.
#[derive(Clone)]
pub struct ActivationRecord {
    level: i32,
    /// Name of the function, if it could be found
    pub name: Option<String>,
    /// Role of the name: global, local, method, field, upvalue or empty
    pub namewhat: Option<String>,
    /// Frame kind: `Lua`, `C`, `main` or `tail`
    pub what: Option<String>,
    /// Chunk name the function was defined in
    pub source: Option<String>,
    /// Printable form of the source
    pub short_source: Option<String>,
    /// Line being executed, or -1
    pub current_line: i32,
    /// First line of the function definition
    pub line_defined: i32,
    /// Last line of the function definition
    pub last_line_defined: i32,
    /// Number of upvalues
    pub upvalue_count: u8,
    /// Number of fixed parameters
    pub parameter_count: u8,
    /// Whether the function takes variable arguments
    pub is_vararg: bool,
    /// Whether the frame was entered by a tail call
    pub is_tail_call: bool,
}

impl ActivationRecord {
    fn at(level: i32) -> Self {
        Self {
            level,
            name: None,
            namewhat: None,
            what: None,
            source: None,
            short_source: None,
            current_line: -1,
            line_defined: 0,
            last_line_defined: 0,
            upvalue_count: 0,
            parameter_count: 0,
            is_vararg: false,
            is_tail_call: false,
        }
    }

    /// Stack level the record was taken at.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl fmt::Debug for ActivationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationRecord")
            .field("level", &self.level)
            .field("name", &self.name)
            .field("what", &self.what)
            .field("source", &self.source)
            .field("current_line", &self.current_line)
            .finish()
    }
}

impl LuaState {
    /// Activation record of the function at `level`, where 0 is the running
    /// function, with no descriptive fields filled. `None` if the stack is
    /// shallower.
    pub fn get_stack(&self, level: i32) -> Result<Option<ActivationRecord>> {
        self.get_info(level, "")
    }

    /// Activation record of the function at `level` with the information
    /// selected by `what`, a combination of `n` (names), `S` (source), `l`
    /// (current line), `t` (tail call) and `u` (upvalues and parameters).
    /// `None` if the stack is shallower than `level`.
    pub fn get_info(&self, level: i32, what: &str) -> Result<Option<ActivationRecord>> {
        let l = self.enter()?;
        check_arg(level >= 0, "illegal level")?;
        check_arg(
            what.chars().all(|c| "nSltu".contains(c)),
            "illegal option",
        )?;
        let options = c_string(what)?;
        let mut raw = lua_Debug::default();
        unsafe {
            check_stack(l, 1)?;
            if lua_getstack(l, level, &mut raw) == 0 {
                return Ok(None);
            }
            if lua_getinfo(l, options.as_ptr(), &mut raw) == 0 {
                return Err(Error::IllegalArgument("illegal option".to_string()));
            }
            let mut record = ActivationRecord::at(level);
            if what.contains('n') {
                record.name = from_c_str(raw.name);
                record.namewhat = from_c_str(raw.namewhat).filter(|s| !s.is_empty());
            }
            if what.contains('S') {
                record.what = from_c_str(raw.what);
                record.source = from_c_str(raw.source);
                record.short_source = Some(
                    CStr::from_ptr(raw.short_src.as_ptr())
                        .to_string_lossy()
                        .into_owned(),
                );
                record.line_defined = raw.linedefined;
                record.last_line_defined = raw.lastlinedefined;
            }
            if what.contains('l') {
                record.current_line = raw.currentline;
            }
            if what.contains('t') {
                record.is_tail_call = raw.istailcall != 0;
            }
            if what.contains('u') {
                record.upvalue_count = raw.nups;
                record.parameter_count = raw.nparams;
                record.is_vararg = raw.isvararg != 0;
            }
            Ok(Some(record))
        }
    }

    /// Relevant frames of the current call stack, innermost first.
    pub fn stack_trace(&self) -> Result<Vec<StackTraceElement>> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 2)?;
            trace::capture(l, 0)
                .ok_or_else(|| Error::MemoryAllocation("stack frames unavailable".to_string()))
        }
    }
}
