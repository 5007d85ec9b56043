//! Lua state handle, lifecycle and stack primitives.
//!
//! A [`LuaState`] is a cheap, cloneable handle. All handles of one instance
//! share the same inner record, which tracks the main interpreter thread, the
//! current Execution Thread, and the yield intent of the running host
//! callable.

use crate::config::Config;
use crate::embed;
use crate::env;
use crate::guard::{
    check_arg, check_index, check_nelems, check_not_null, check_real_index, check_stack,
    check_type, valid_index,
};
use crate::protect::{self, protect};
use crate::util;
use core_types::{Error, LuaType, Result};
use lua_sys::*;
use std::any::Any;
use std::cell::Cell;
use std::os::raw::c_int;
use std::ptr;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Shared record behind every handle of one instance.
pub(crate) struct StateInner {
    /// Main interpreter thread; null once closed
    pub(crate) main: Cell<*mut lua_State>,
    /// Current Execution Thread; null once closed
    pub(crate) thread: Cell<*mut lua_State>,
    /// Yield intent set by the running host callable
    pub(crate) yield_flag: Cell<bool>,
    pub(crate) owned: bool,
    pub(crate) config: Config,
}

impl StateInner {
    /// Reads and clears the yield intent.
    pub(crate) fn take_yield_intent(&self) -> bool {
        self.yield_flag.replace(false)
    }
}

impl Drop for StateInner {
    fn drop(&mut self) {
        let main = self.main.get();
        if main.is_null() {
            return;
        }
        unsafe {
            if self.owned {
                env::bind(main);
                lua_close(main);
                debug!("closed Lua state on drop");
            } else {
                embed::clear_state_ref(main);
                debug!("released attached Lua state on drop");
            }
            env::unbind(main);
        }
    }
}

/// Handle to a Lua interpreter instance.
///
/// Not `Send`: an instance is confined to the native thread that created it.
/// Cloning the handle does not clone the interpreter.
///
/// # Examples
///
/// ```
/// use lua_bridge::LuaState;
///
/// let lua = LuaState::new().unwrap();
/// lua.load_str("return 6 * 7", "=example").unwrap();
/// lua.call(0, 1).unwrap();
/// assert_eq!(lua.to_integer(-1).unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct LuaState {
    pub(crate) inner: Rc<StateInner>,
}

impl LuaState {
    /// Creates a new interpreter instance owned by this handle.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Creates a new owned interpreter instance with `config`.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let l = unsafe { luaL_newstate() };
        if l.is_null() {
            return Err(Error::MemoryAllocation(
                "cannot allocate Lua state".to_string(),
            ));
        }
        let open_libs = config.open_libs;
        let state = Self::bind(l, l, true, config);
        state.install()?;
        if open_libs {
            state.open_libs()?;
        }
        debug!(?l, "created Lua state");
        Ok(state)
    }

    /// Attaches to an interpreter created elsewhere. The handle does not own
    /// it: closing only detaches.
    ///
    /// # Safety
    ///
    /// `l` must point to a live interpreter thread that stays valid until the
    /// handle is closed or dropped, and that is only used from this native
    /// thread while attached.
    pub unsafe fn attach(l: *mut lua_State) -> Result<Self> {
        check_not_null(l)?;
        lua_rawgeti(l, LUA_REGISTRYINDEX, LUA_RIDX_MAINTHREAD);
        let main = lua_tothread(l, -1);
        lua_pop(l, 1);
        let state = Self::bind(main, l, false, Config::default());
        state.install()?;
        debug!(?l, "attached Lua state");
        Ok(state)
    }

    fn bind(main: *mut lua_State, thread: *mut lua_State, owned: bool, config: Config) -> Self {
        Self {
            inner: Rc::new(StateInner {
                main: Cell::new(main),
                thread: Cell::new(thread),
                yield_flag: Cell::new(false),
                owned,
                config,
            }),
        }
    }

    fn install(&self) -> Result<()> {
        let l = self.enter()?;
        let weak: Weak<dyn Any> = Rc::downgrade(&self.inner) as Weak<dyn Any>;
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 0, move |l| {
                embed::install(l);
                embed::store_state_ref(l, weak);
            })
        }
    }

    /// Closes the instance. An owned interpreter is destroyed; an attached
    /// one is detached and its host environment on this thread is released.
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let main = self.inner.main.get();
        if main.is_null() {
            return Ok(());
        }
        env::bind(main);
        unsafe {
            let mut ar = lua_Debug::default();
            if self.inner.thread.get() != main || lua_getstack(main, 0, &mut ar) != 0 {
                return Err(Error::IllegalState("Lua is processing".to_string()));
            }
            embed::clear_state_ref(main);
            if self.inner.owned {
                lua_close(main);
            }
            env::unbind(main);
        }
        self.inner.main.set(ptr::null_mut());
        self.inner.thread.set(ptr::null_mut());
        debug!(owned = self.inner.owned, "closed Lua state");
        Ok(())
    }

    /// Whether the instance is still open.
    pub fn is_open(&self) -> bool {
        !self.inner.main.get().is_null()
    }

    /// Whether this handle owns the interpreter.
    pub fn is_owned(&self) -> bool {
        self.inner.owned
    }

    /// Raw pointer of the current Execution Thread, or null once closed.
    pub fn as_ptr(&self) -> *mut lua_State {
        self.inner.thread.get()
    }

    /// The configuration the instance was created with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Checks that the instance is open, binds the host environment and
    /// returns the current Execution Thread.
    pub(crate) fn enter(&self) -> Result<*mut lua_State> {
        let thread = self.inner.thread.get();
        if thread.is_null() {
            return Err(Error::IllegalState("Lua state is closed".to_string()));
        }
        env::bind(self.inner.main.get());
        Ok(thread)
    }

    pub(crate) fn min_stack(&self) -> c_int {
        self.inner.config.min_stack
    }

    pub(crate) fn is_main_thread(&self, l: *mut lua_State) -> bool {
        l == self.inner.main.get()
    }

    // -- Stack --

    /// Ensures `space` free slots on the current thread.
    pub fn ensure_stack(&self, space: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe { check_stack(l, space) }
    }

    /// Number of values on the stack.
    pub fn top(&self) -> Result<i32> {
        let l = self.enter()?;
        Ok(unsafe { lua_gettop(l) })
    }

    /// Sets the stack top, filling new slots with nil.
    pub fn set_top(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            if index >= 0 {
                let grow = index - lua_gettop(l);
                if grow > 0 {
                    check_stack(l, grow)?;
                }
            } else {
                check_real_index(l, index)?;
            }
            lua_settop(l, index);
        }
        Ok(())
    }

    /// Converts `index` to an absolute index.
    pub fn abs_index(&self, index: i32) -> Result<i32> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(lua_absindex(l, index))
        }
    }

    /// Pushes a copy of the value at `index`.
    pub fn push_value(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            check_index(l, index)?;
            lua_pushvalue(l, index);
        }
        Ok(())
    }

    /// Pops `count` values.
    pub fn pop(&self, count: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_arg(count >= 0, "illegal count")?;
            check_nelems(l, count)?;
            lua_pop(l, count);
        }
        Ok(())
    }

    /// Moves the top value to `index`, shifting values up.
    pub fn insert(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_real_index(l, index)?;
            lua_insert(l, index);
        }
        Ok(())
    }

    /// Removes the value at `index`, shifting values down.
    pub fn remove(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_real_index(l, index)?;
            lua_remove(l, index);
        }
        Ok(())
    }

    /// Pops the top value into `index`.
    pub fn replace(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_nelems(l, 1)?;
            check_index(l, index)?;
            lua_replace(l, index);
        }
        Ok(())
    }

    /// Copies the value at `from` into `to`.
    pub fn copy(&self, from: i32, to: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_index(l, from)?;
            check_index(l, to)?;
            lua_copy(l, from, to);
        }
        Ok(())
    }

    // -- Push --

    /// Pushes nil.
    pub fn push_nil(&self) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            lua_pushnil(l);
        }
        Ok(())
    }

    /// Pushes a boolean.
    pub fn push_boolean(&self, value: bool) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            lua_pushboolean(l, c_int::from(value));
        }
        Ok(())
    }

    /// Pushes an integer.
    pub fn push_integer(&self, value: i64) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            lua_pushinteger(l, value);
        }
        Ok(())
    }

    /// Pushes a float.
    pub fn push_number(&self, value: f64) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            lua_pushnumber(l, value);
        }
        Ok(())
    }

    /// Pushes a string.
    pub fn push_string(&self, value: &str) -> Result<()> {
        self.push_bytes(value.as_bytes())
    }

    /// Pushes a byte string.
    pub fn push_bytes(&self, value: &[u8]) -> Result<()> {
        let l = self.enter()?;
        let data = value.as_ptr();
        let len = value.len();
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, move |l| {
                lua_pushlstring(l, data.cast(), len);
            })
        }
    }

    /// Pushes the global table.
    pub fn push_global_table(&self) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            lua_pushglobaltable(l);
        }
        Ok(())
    }

    /// Calls the function below the top `nargs` values in protected mode and
    /// pushes `nresults` results, or all of them for
    /// [`LUA_MULTRET`](lua_sys::LUA_MULTRET). The function and its arguments
    /// are consumed either way.
    pub fn call(&self, nargs: i32, nresults: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_arg(nargs >= 0, "illegal argument count")?;
            check_arg(
                nresults >= 0 || nresults == LUA_MULTRET,
                "illegal return count",
            )?;
            check_nelems(l, nargs + 1)?;
            check_stack(l, nresults.max(0) + self.min_stack())?;
            protect::call(l, nargs, nresults)
        }
    }

    // -- Type predicates --

    fn type_code(&self, index: i32) -> Result<c_int> {
        let l = self.enter()?;
        unsafe {
            if valid_index(l, index) {
                Ok(lua_type(l, index))
            } else {
                Ok(LUA_TNONE)
            }
        }
    }

    /// Type of the value at `index`; [`LuaType::None`] for an invalid index.
    pub fn type_of(&self, index: i32) -> Result<LuaType> {
        self.type_code(index).map(LuaType::from_code)
    }

    /// Interpreter name of `kind`.
    pub fn type_name(&self, kind: LuaType) -> &'static str {
        kind.name()
    }

    /// Whether the index is invalid.
    pub fn is_none(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TNONE)
    }

    /// Whether the value is nil.
    pub fn is_nil(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TNIL)
    }

    /// Whether the index is invalid or the value is nil.
    pub fn is_none_or_nil(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? <= LUA_TNIL)
    }

    /// Whether the value is a boolean.
    pub fn is_boolean(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TBOOLEAN)
    }

    /// Whether the value is a number or a string convertible to one.
    pub fn is_number(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { valid_index(l, index) && lua_isnumber(l, index) != 0 })
    }

    /// Whether the value is an integer.
    pub fn is_integer(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { valid_index(l, index) && lua_isinteger(l, index) != 0 })
    }

    /// Whether the value is a string or a number.
    pub fn is_string(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { valid_index(l, index) && lua_isstring(l, index) != 0 })
    }

    /// Whether the value is a table.
    pub fn is_table(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TTABLE)
    }

    /// Whether the value is a function.
    pub fn is_function(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TFUNCTION)
    }

    /// Whether the value is a C function, including host functions.
    pub fn is_c_function(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { valid_index(l, index) && lua_iscfunction(l, index) != 0 })
    }

    /// Whether the value is a full or light userdata.
    pub fn is_userdata(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { valid_index(l, index) && lua_isuserdata(l, index) != 0 })
    }

    /// Whether the value is a light userdata.
    pub fn is_light_userdata(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TLIGHTUSERDATA)
    }

    /// Whether the value is a thread.
    pub fn is_thread(&self, index: i32) -> Result<bool> {
        Ok(self.type_code(index)? == LUA_TTHREAD)
    }

    // -- Conversion --

    /// Truthiness of the value at `index`.
    pub fn to_boolean(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(lua_toboolean(l, index) != 0)
        }
    }

    /// Integer value, or 0 when not convertible.
    pub fn to_integer(&self, index: i32) -> Result<i64> {
        Ok(self.to_integer_x(index)?.unwrap_or(0))
    }

    /// Integer value, or `None` when not convertible.
    pub fn to_integer_x(&self, index: i32) -> Result<Option<i64>> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            let mut isnum = 0;
            let value = lua_tointegerx(l, index, &mut isnum);
            Ok((isnum != 0).then_some(value))
        }
    }

    /// Float value, or 0.0 when not convertible.
    pub fn to_number(&self, index: i32) -> Result<f64> {
        Ok(self.to_number_x(index)?.unwrap_or(0.0))
    }

    /// Float value, or `None` when not convertible.
    pub fn to_number_x(&self, index: i32) -> Result<Option<f64>> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            let mut isnum = 0;
            let value = lua_tonumberx(l, index, &mut isnum);
            Ok((isnum != 0).then_some(value))
        }
    }

    /// String value; numbers are converted in place. `None` for other types.
    pub fn to_string(&self, index: i32) -> Result<Option<String>> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(util::to_rust_string(l, index))
        }
    }

    /// Raw bytes of a string; numbers are converted in place.
    pub fn to_bytes(&self, index: i32) -> Result<Option<Vec<u8>>> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(util::to_bytes(l, index))
        }
    }

    /// Identity of a reference value as an address; 0 for other values.
    pub fn to_pointer(&self, index: i32) -> Result<usize> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(lua_topointer(l, index) as usize)
        }
    }

    /// Converts any value to a string using `__tostring` and `__name`.
    pub fn to_display_string(&self, index: i32) -> Result<String> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            lua_pushvalue(l, index);
            let text = protect(l, 1, 0, |l| {
                luaL_tolstring(l, 1, ptr::null_mut());
                util::to_rust_string(l, -1).unwrap_or_default()
            })?;
            Ok(text)
        }
    }

    // -- Raw access --

    /// Primitive equality without metamethods; false for invalid indices.
    pub fn raw_equal(&self, index1: i32, index2: i32) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            Ok(valid_index(l, index1)
                && valid_index(l, index2)
                && lua_rawequal(l, index1, index2) != 0)
        }
    }

    /// Raw length of strings, tables and userdata.
    pub fn raw_len(&self, index: i32) -> Result<usize> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            Ok(lua_rawlen(l, index))
        }
    }

    /// Replaces the key on top with `table[key]` without metamethods.
    pub fn raw_get(&self, index: i32) -> Result<LuaType> {
        let l = self.enter()?;
        unsafe {
            check_type(l, index, LuaType::Table)?;
            check_nelems(l, 1)?;
            Ok(LuaType::from_code(lua_rawget(l, index)))
        }
    }

    /// Pushes `table[n]` without metamethods.
    pub fn raw_get_i(&self, index: i32, n: i64) -> Result<LuaType> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            check_type(l, index, LuaType::Table)?;
            Ok(LuaType::from_code(lua_rawgeti(l, index, n)))
        }
    }

    /// Pops key and value and assigns `table[key] = value` without
    /// metamethods.
    pub fn raw_set(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            check_nelems(l, 2)?;
            let index = lua_absindex(l, index);
            lua_pushvalue(l, index);
            lua_insert(l, -3);
            protect(l, 3, 0, |l| lua_rawset(l, 1))
        }
    }

    /// Pops a value and assigns `table[n] = value` without metamethods.
    pub fn raw_set_i(&self, index: i32, n: i64) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, index, LuaType::Table)?;
            check_nelems(l, 1)?;
            let index = lua_absindex(l, index);
            lua_pushvalue(l, index);
            lua_insert(l, -2);
            protect(l, 2, 0, move |l| lua_rawseti(l, 1, n))
        }
    }

    // -- Metatables --

    /// Pushes the metatable of the value and returns true, or pushes nothing
    /// and returns false.
    pub fn get_metatable(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 1)?;
            check_index(l, index)?;
            Ok(lua_getmetatable(l, index) != 0)
        }
    }

    /// Pops a table or nil and sets it as the metatable of the value.
    pub fn set_metatable(&self, index: i32) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_index(l, index)?;
            check_nelems(l, 1)?;
            check_arg(
                matches!(lua_type(l, -1), LUA_TTABLE | LUA_TNIL),
                "illegal type",
            )?;
            lua_setmetatable(l, index);
        }
        Ok(())
    }

    /// Pushes the `key` field of the value's metatable if present.
    pub fn get_metafield(&self, index: i32, key: &str) -> Result<LuaType> {
        let l = self.enter()?;
        let key = util::c_string(key)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_index(l, index)?;
            Ok(LuaType::from_code(luaL_getmetafield(l, index, key.as_ptr())))
        }
    }
}
