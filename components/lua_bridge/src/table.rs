//! Globals, tables, operators and references.
//!
//! Operations that may invoke metamethods run in a protected frame. The body
//! runs in a fresh frame, so the target table is passed in as argument 1.

use crate::guard::{check_arg, check_index, check_nelems, check_stack, check_type};
use crate::protect::protect;
use crate::state::LuaState;
use crate::util::c_string;
use core_types::{ArithOp, LuaType, RelOp, Result};
use lua_sys::*;
use std::os::raw::c_int;

impl LuaState {
    /// Pushes the global `name` and returns its type.
    pub fn get_global(&self, name: &str) -> Result<LuaType> {
        let l = self.enter()?;
        let name = c_string(name)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, |l| LuaType::from_code(lua_getglobal(l, name.as_ptr())))
        }
    }

    /// Pops a value and assigns it to the global `name`.
    pub fn set_global(&self, name: &str) -> Result<()> {
        let l = self.enter()?;
        let name = c_string(name)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_nelems(l, 1)?;
            protect(l, 1, 0, |l| lua_setglobal(l, name.as_ptr()))
        }
    }

    /// Pushes `t[key]` for the value `t` at `index`.
    pub fn get_field(&self, index: i32, key: &str) -> Result<LuaType> {
        let l = self.enter()?;
        let key = c_string(key)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            lua_pushvalue(l, index);
            protect(l, 1, 1, |l| LuaType::from_code(lua_getfield(l, 1, key.as_ptr())))
        }
    }

    /// Pops a value and assigns `t[key] = value` for the value `t` at `index`.
    pub fn set_field(&self, index: i32, key: &str) -> Result<()> {
        let l = self.enter()?;
        let key = c_string(key)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            check_nelems(l, 1)?;
            lua_pushvalue(l, index);
            lua_insert(l, -2);
            protect(l, 2, 0, |l| lua_setfield(l, 1, key.as_ptr()))
        }
    }

    /// Replaces the key on top with `t[key]` for the value `t` at `index`.
    pub fn get_table(&self, index: i32) -> Result<LuaType> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            check_nelems(l, 1)?;
            lua_pushvalue(l, index);
            lua_insert(l, -2);
            protect(l, 2, 1, |l| LuaType::from_code(lua_gettable(l, 1)))
        }
    }

    /// Pops key and value and assigns `t[key] = value` for the value `t` at
    /// `index`.
    pub fn set_table(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            check_nelems(l, 2)?;
            lua_pushvalue(l, index);
            lua_insert(l, -3);
            protect(l, 3, 0, |l| lua_settable(l, 1))
        }
    }

    /// Pushes the table `t[key]`, creating it if absent. Returns true if the
    /// table already existed.
    pub fn get_subtable(&self, index: i32, key: &str) -> Result<bool> {
        let l = self.enter()?;
        let key = c_string(key)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            lua_pushvalue(l, index);
            protect(l, 1, 1, |l| luaL_getsubtable(l, 1, key.as_ptr()) != 0)
        }
    }

    /// Pops a key and pushes the next key and value of the table at `index`.
    /// Returns false and pushes nothing at the end of the traversal.
    pub fn next(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            check_nelems(l, 1)?;
            lua_pushvalue(l, index);
            lua_insert(l, -2);
            let more = protect(l, 2, 2, |l| {
                let more = lua_next(l, 1) != 0;
                if !more {
                    lua_pushnil(l);
                    lua_pushnil(l);
                }
                more
            })?;
            if !more {
                lua_pop(l, 2);
            }
            Ok(more)
        }
    }

    /// Pushes a new table with preallocated array and hash parts.
    pub fn new_table(&self, array: i32, record: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_arg(array >= 0 && record >= 0, "illegal size")?;
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, move |l| lua_createtable(l, array, record))
        }
    }

    /// Compares two values, honouring metamethods. Invalid indices compare
    /// false.
    pub fn compare(&self, index1: i32, index2: i32, op: RelOp) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            if !crate::guard::valid_index(l, index1) || !crate::guard::valid_index(l, index2) {
                return Ok(false);
            }
            let index2 = lua_absindex(l, index2);
            lua_pushvalue(l, index1);
            lua_pushvalue(l, index2);
            let code = op.code();
            protect(l, 2, 0, move |l| lua_compare(l, 1, 2, code) != 0)
        }
    }

    /// `a == b`, honouring `__eq`.
    pub fn equal(&self, index1: i32, index2: i32) -> Result<bool> {
        self.compare(index1, index2, RelOp::Eq)
    }

    /// `a < b`, honouring `__lt`.
    pub fn less_than(&self, index1: i32, index2: i32) -> Result<bool> {
        self.compare(index1, index2, RelOp::Lt)
    }

    /// Pushes the length of the value at `index`, honouring `__len`.
    pub fn len(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            lua_pushvalue(l, index);
            protect(l, 1, 1, |l| lua_len(l, 1))
        }
    }

    /// Length of the value at `index` as an integer, honouring `__len`.
    pub fn length(&self, index: i32) -> Result<i64> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            lua_pushvalue(l, index);
            protect(l, 1, 0, |l| luaL_len(l, 1))
        }
    }

    /// Pops `count` values and pushes their concatenation.
    pub fn concat(&self, count: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_arg(count >= 0, "illegal count")?;
            check_stack(l, self.min_stack())?;
            check_nelems(l, count)?;
            protect(l, count, 1, move |l| lua_concat(l, count))
        }
    }

    /// Pops the operands of `op` and pushes the result.
    pub fn arith(&self, op: ArithOp) -> Result<()> {
        let l = self.enter()?;
        let operands: c_int = if op.is_unary() { 1 } else { 2 };
        unsafe {
            check_stack(l, self.min_stack())?;
            check_nelems(l, operands)?;
            let code = op.code();
            protect(l, operands, 1, move |l| lua_arith(l, code))
        }
    }

    /// Pops a value and stores it in the table at `index` under a fresh
    /// integer key, which is returned.
    pub fn reference(&self, index: i32) -> Result<i32> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            check_nelems(l, 1)?;
            lua_pushvalue(l, index);
            lua_insert(l, -2);
            protect(l, 2, 0, |l| luaL_ref(l, 1))
        }
    }

    /// Releases a reference created by [`LuaState::reference`].
    pub fn unreference(&self, index: i32, reference: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            lua_pushvalue(l, index);
            protect(l, 1, 0, move |l| luaL_unref(l, 1, reference))
        }
    }

    /// Number of entries in the table at `index`, counted by traversal.
    pub fn table_size(&self, index: i32) -> Result<i64> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            lua_pushvalue(l, index);
            protect(l, 1, 0, |l| {
                let mut count = 0;
                lua_pushnil(l);
                while lua_next(l, 1) != 0 {
                    lua_pop(l, 1);
                    count += 1;
                }
                count
            })
        }
    }

    /// Moves `count` array elements of the table at `index` from position
    /// `from` to position `to`, without metamethods. Overlapping ranges are
    /// handled.
    pub fn table_move(&self, index: i32, from: i64, to: i64, count: i64) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_arg(count >= 0, "illegal count")?;
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            lua_pushvalue(l, index);
            protect(l, 1, 0, move |l| {
                if from < to {
                    for i in (0..count).rev() {
                        lua_rawgeti(l, 1, from + i);
                        lua_rawseti(l, 1, to + i);
                    }
                } else if from > to {
                    for i in 0..count {
                        lua_rawgeti(l, 1, from + i);
                        lua_rawseti(l, 1, to + i);
                    }
                }
            })
        }
    }

    /// Pushes a shallow copy of the table at `index`. The copy has no
    /// metatable.
    pub fn copy_table(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            lua_pushvalue(l, index);
            protect(l, 1, 1, |l| {
                lua_createtable(l, 0, 0);
                lua_pushnil(l);
                while lua_next(l, 1) != 0 {
                    lua_pushvalue(l, -2);
                    lua_insert(l, -2);
                    lua_rawset(l, 2);
                }
            })
        }
    }
}
