//! Host callable trampoline.
//!
//! Every host function is a C closure over [`trampoline`] whose single
//! upvalue is an embedded [`HostCallable`]. The trampoline resolves the owning
//! state, rebinds the current Execution Thread for the duration of the call,
//! and turns the host outcome into a return, a yield, or a raised envelope.
//!
//! Interpreter jumps skip host destructors, so [`dispatch`] finishes all host
//! work and drops its values before [`trampoline`] jumps.

use crate::embed;
use crate::guard::{check_arg, check_index, check_stack};
use crate::protect::protect;
use crate::state::{LuaState, StateInner};
use crate::translate::push_located_message;
use crate::util::{c_ptr, to_rust_string};
use core_types::{Error, LuaError, Result};
use lua_sys::*;
use std::any::Any;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

/// A function the interpreter can call.
///
/// `invoke` receives the state with its arguments at indices `1..=top` and
/// returns how many values from the top of the stack are results. To yield,
/// return [`LuaState::yield_values`].
pub trait HostFunction: 'static {
    /// Runs the function.
    fn invoke(&self, lua: &LuaState) -> Result<usize>;
}

impl<F> HostFunction for F
where
    F: Fn(&LuaState) -> Result<usize> + 'static,
{
    fn invoke(&self, lua: &LuaState) -> Result<usize> {
        self(lua)
    }
}

/// Wraps a closure as a shareable host function.
pub fn host_function<F>(function: F) -> Rc<dyn HostFunction>
where
    F: Fn(&LuaState) -> Result<usize> + 'static,
{
    Rc::new(function)
}

/// Upvalue payload of a host function closure.
pub(crate) struct HostCallable(pub(crate) Rc<dyn HostFunction>);

/// Scoped binding of the current Execution Thread. Restores the previous
/// binding when dropped, including on unwind.
struct ThreadBinding<'a> {
    inner: &'a StateInner,
    saved: *mut lua_State,
}

impl<'a> ThreadBinding<'a> {
    fn enter(inner: &'a StateInner, thread: *mut lua_State) -> Self {
        let saved = inner.thread.replace(thread);
        Self { inner, saved }
    }
}

impl Drop for ThreadBinding<'_> {
    fn drop(&mut self) {
        self.inner.thread.set(self.saved);
    }
}

enum Raise {
    Located(&'static [u8]),
    Envelope(LuaError),
}

enum Outcome {
    Return(c_int),
    Yield(c_int),
    Raise(Raise),
}

/// Entry point of every host function.
pub(crate) unsafe extern "C-unwind" fn trampoline(l: *mut lua_State) -> c_int {
    match dispatch(l) {
        Outcome::Return(n) => n,
        Outcome::Yield(n) => lua_yield(l, n),
        Outcome::Raise(Raise::Located(message)) => {
            push_located_message(l, 1, message);
            lua_error(l)
        }
        Outcome::Raise(Raise::Envelope(envelope)) => {
            embed::push_lua_error(l, envelope);
            lua_error(l)
        }
    }
}

unsafe fn dispatch(l: *mut lua_State) -> Outcome {
    let Some(inner) = embed::host_state(l) else {
        return Outcome::Raise(Raise::Located(b"no host state\0"));
    };
    let Some(callable) = embed::to_typed::<HostCallable>(l, lua_upvalueindex(1)) else {
        return Outcome::Raise(Raise::Located(b"no host callable\0"));
    };
    let lua = LuaState { inner };
    let result = {
        let _binding = ThreadBinding::enter(&lua.inner, l);
        lua.inner.yield_flag.set(false);
        let function = Rc::clone(&callable.0);
        panic::catch_unwind(AssertUnwindSafe(|| function.invoke(&lua)))
            .unwrap_or_else(|payload| Err(Error::HostPanic(panic_message(payload.as_ref()))))
    };
    let yielding = lua.inner.take_yield_intent();
    let count = match result {
        Ok(count) => count,
        Err(error) => return Outcome::Raise(Raise::Envelope(envelope_for(l, error))),
    };
    let count = match c_int::try_from(count) {
        Ok(count) if count <= lua_gettop(l) => count,
        _ => return Outcome::Raise(Raise::Located(b"illegal return count\0")),
    };
    if yielding {
        if lua.is_main_thread(l) {
            return Outcome::Raise(Raise::Located(b"not in a thread\0"));
        }
        return Outcome::Yield(count);
    }
    Outcome::Return(count)
}

unsafe fn envelope_for(l: *mut lua_State, error: Error) -> LuaError {
    let location = if lua_checkstack(l, 2) != 0 {
        luaL_where(l, 1);
        let location = to_rust_string(l, -1).unwrap_or_default();
        lua_pop(l, 1);
        location
    } else {
        String::new()
    };
    LuaError::with_cause(format!("{}{}", location, error), Arc::new(error))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl LuaState {
    /// Pushes a host function.
    pub fn push_function<F>(&self, function: F) -> Result<()>
    where
        F: Fn(&LuaState) -> Result<usize> + 'static,
    {
        self.push_function_rc(Rc::new(function))
    }

    /// Pushes a shared host function.
    pub fn push_function_rc(&self, function: Rc<dyn HostFunction>) -> Result<()> {
        let l = self.enter()?;
        let callable: Rc<dyn Any> = Rc::new(HostCallable(function));
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, move |l| {
                embed::push_owned(l, callable);
                lua_pushcclosure(l, trampoline, 1);
            })
        }
    }

    /// Sets the global `name` to a host function.
    pub fn register<F>(&self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&LuaState) -> Result<usize> + 'static,
    {
        self.push_function(function)?;
        self.set_global(name)
    }

    /// Creates a module table holding `functions`, records it in
    /// `package.loaded` under `name` and, if `global` is set, as the global
    /// `name`. The module table is left on the stack.
    pub fn register_module(
        &self,
        name: &str,
        functions: &[(&str, Rc<dyn HostFunction>)],
        global: bool,
    ) -> Result<()> {
        let l = self.enter()?;
        let key = crate::util::c_string(name)?;
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, |l| {
                luaL_getsubtable(l, LUA_REGISTRYINDEX, c_ptr(b"_LOADED\0"));
                if lua_getfield(l, -1, key.as_ptr()) != LUA_TTABLE {
                    lua_pop(l, 1);
                    lua_createtable(l, 0, 0);
                    lua_pushvalue(l, -1);
                    lua_setfield(l, -3, key.as_ptr());
                }
                lua_remove(l, -2);
            })?;
        }
        let filled = functions.iter().try_for_each(|(field, function)| {
            self.push_function_rc(Rc::clone(function))?;
            self.set_field(-2, field)
        });
        if let Err(error) = filled {
            self.pop(1)?;
            return Err(error);
        }
        if global {
            self.push_value(-1)?;
            self.set_global(name)?;
        }
        Ok(())
    }

    /// Whether the value at `index` is a host function.
    pub fn is_host_function(&self, index: i32) -> Result<bool> {
        let l = self.enter()?;
        unsafe {
            if !crate::guard::valid_index(l, index) {
                return Ok(false);
            }
            let native = lua_tocfunction(l, index);
            Ok(native.map_or(false, |native| native as usize == trampoline as usize))
        }
    }

    /// The host function at `index`, or `None` if the value is not one.
    pub fn to_host_function(&self, index: i32) -> Result<Option<Rc<dyn HostFunction>>> {
        if !self.is_host_function(index)? {
            return Ok(None);
        }
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            if lua_getupvalue(l, index, 1).is_null() {
                return Ok(None);
            }
            let function = embed::to_typed::<HostCallable>(l, -1).map(|callable| Rc::clone(&callable.0));
            lua_pop(l, 1);
            Ok(function)
        }
    }

    /// Requests that the running host function yield its top `count` values
    /// when it returns. Returns `count` for use as the return value.
    pub fn yield_values(&self, count: usize) -> Result<usize> {
        let l = self.enter()?;
        unsafe {
            check_arg(
                c_int::try_from(count).map_or(false, |count| count <= lua_gettop(l)),
                "illegal return count",
            )?;
        }
        self.inner.yield_flag.set(true);
        Ok(count)
    }

    /// Whether the current thread may yield.
    pub fn is_yieldable(&self) -> Result<bool> {
        let l = self.enter()?;
        Ok(unsafe { lua_isyieldable(l) != 0 })
    }

    /// Pushes a host object as an embedded strong reference.
    pub fn push_object<T: Any>(&self, object: Rc<T>) -> Result<()> {
        self.push_host_object(object)
    }

    /// Pushes a type-erased host object as an embedded strong reference.
    pub fn push_host_object(&self, object: Rc<dyn Any>) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 1, move |l| embed::push_owned(l, object))
        }
    }

    /// Whether the value at `index` is an embedded host object.
    pub fn is_host_object(&self, index: i32) -> Result<bool> {
        Ok(self.to_host_object(index)?.is_some())
    }

    /// The embedded host object at `index`, or `None` if the value is not
    /// one.
    pub fn to_host_object(&self, index: i32) -> Result<Option<Rc<dyn Any>>> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, 2)?;
            check_index(l, index)?;
            Ok(embed::to_host_ref(l, index))
        }
    }

    /// The embedded host object at `index` if it is a `T`.
    pub fn to_object<T: Any>(&self, index: i32) -> Result<Option<Rc<T>>> {
        Ok(self
            .to_host_object(index)?
            .and_then(|object| object.downcast::<T>().ok()))
    }
}
