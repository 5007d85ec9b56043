//! Object embedding layer.
//!
//! Host objects enter the interpreter as full userdata holding a [`HostRef`].
//! The variant is chosen at embedding time: ordinary objects are owned
//! (strong), the state's own registry entry only observes (weak). Extraction
//! checks the userdata shape and that its metatable is the per-state sentinel,
//! compared by identity.

use crate::env;
use crate::state::StateInner;
use crate::util::c_ptr;
use core_types::LuaError;
use lua_sys::*;
use std::any::Any;
use std::cell::RefCell;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::{Rc, Weak};
use tracing::warn;

/// Registry key of the sentinel metatable of embedded host objects.
pub(crate) const HOST_OBJECT: &[u8] = b"lua_bridge.HostObject\0";
/// Registry key of the weak self-reference to the owning state.
pub(crate) const HOST_STATE: &[u8] = b"lua_bridge.HostState\0";
/// Registry key of the metatable of the self-reference.
const HOST_STATE_META: &[u8] = b"lua_bridge.HostStateMeta\0";

/// Payload of an embedded host reference.
pub(crate) enum HostRef {
    Owned(Rc<dyn Any>),
    Observed(Weak<dyn Any>),
    /// Left behind by the finalizer so a resurrected userdata is inert.
    Released,
}

impl HostRef {
    fn get(&self) -> Option<Rc<dyn Any>> {
        match self {
            HostRef::Owned(object) => Some(Rc::clone(object)),
            HostRef::Observed(object) => object.upgrade(),
            HostRef::Released => None,
        }
    }
}

/// Creates the sentinel and self-reference metatables. Raises on allocation
/// failure, so run it protected.
pub(crate) unsafe fn install(l: *mut lua_State) {
    if luaL_newmetatable(l, c_ptr(HOST_OBJECT)) != 0 {
        lua_pushcfunction(l, gc_host_ref);
        lua_setfield(l, -2, c_ptr(b"__gc\0"));
        lua_pushcfunction(l, tostring_host_ref);
        lua_setfield(l, -2, c_ptr(b"__tostring\0"));
        lua_pushboolean(l, 0);
        lua_setfield(l, -2, c_ptr(b"__metatable\0"));
    }
    lua_pop(l, 1);
    if luaL_newmetatable(l, c_ptr(HOST_STATE_META)) != 0 {
        lua_pushcfunction(l, gc_host_ref);
        lua_setfield(l, -2, c_ptr(b"__gc\0"));
        lua_pushboolean(l, 0);
        lua_setfield(l, -2, c_ptr(b"__metatable\0"));
    }
    lua_pop(l, 1);
}

unsafe fn push_host_ref(l: *mut lua_State, host_ref: HostRef, metatable: &'static [u8]) {
    let ud = lua_newuserdata(l, std::mem::size_of::<HostRef>()).cast::<HostRef>();
    ptr::write(ud, host_ref);
    luaL_getmetatable(l, c_ptr(metatable));
    lua_setmetatable(l, -2);
}

/// Pushes a strong reference to `object`. Raises on allocation failure.
pub(crate) unsafe fn push_owned(l: *mut lua_State, object: Rc<dyn Any>) {
    push_host_ref(l, HostRef::Owned(object), HOST_OBJECT);
}

/// Stores the weak self-reference in the registry. Raises on allocation
/// failure.
pub(crate) unsafe fn store_state_ref(l: *mut lua_State, state: Weak<dyn Any>) {
    push_host_ref(l, HostRef::Observed(state), HOST_STATE_META);
    lua_setfield(l, LUA_REGISTRYINDEX, c_ptr(HOST_STATE));
}

/// Clears the self-reference so later trampolines see no host state.
pub(crate) unsafe fn clear_state_ref(l: *mut lua_State) {
    lua_pushnil(l);
    lua_setfield(l, LUA_REGISTRYINDEX, c_ptr(HOST_STATE));
}

/// Resolves the owning state through the registry self-reference.
pub(crate) unsafe fn host_state(l: *mut lua_State) -> Option<Rc<StateInner>> {
    lua_getfield(l, LUA_REGISTRYINDEX, c_ptr(HOST_STATE));
    let state = if lua_type(l, -1) == LUA_TUSERDATA
        && lua_rawlen(l, -1) == std::mem::size_of::<HostRef>()
    {
        let host_ref = &*lua_touserdata(l, -1).cast::<HostRef>();
        match host_ref {
            HostRef::Observed(state) => state.upgrade(),
            _ => None,
        }
    } else {
        None
    };
    lua_pop(l, 1);
    state.and_then(|state| state.downcast::<StateInner>().ok())
}

/// Whether the value at `index` carries the host object brand. Needs two free
/// stack slots.
pub(crate) unsafe fn is_branded(l: *mut lua_State, index: c_int) -> bool {
    let index = lua_absindex(l, index);
    if lua_type(l, index) != LUA_TUSERDATA
        || lua_rawlen(l, index) != std::mem::size_of::<HostRef>()
    {
        return false;
    }
    if lua_getmetatable(l, index) == 0 {
        return false;
    }
    luaL_getmetatable(l, c_ptr(HOST_OBJECT));
    let branded = lua_rawequal(l, -1, -2) != 0;
    lua_pop(l, 2);
    branded
}

/// Extracts the host object at `index`; `None` if the value is not a branded
/// host reference or its target is gone.
pub(crate) unsafe fn to_host_ref(l: *mut lua_State, index: c_int) -> Option<Rc<dyn Any>> {
    if !is_branded(l, index) {
        return None;
    }
    let host_ref = &*lua_touserdata(l, index).cast::<HostRef>();
    host_ref.get()
}

/// Extracts a host object of type `T`.
pub(crate) unsafe fn to_typed<T: Any>(l: *mut lua_State, index: c_int) -> Option<Rc<T>> {
    to_host_ref(l, index).and_then(|object| object.downcast::<T>().ok())
}

/// Extracts an error envelope.
pub(crate) unsafe fn to_lua_error(l: *mut lua_State, index: c_int) -> Option<Rc<RefCell<LuaError>>> {
    to_typed::<RefCell<LuaError>>(l, index)
}

/// Whether the value at `index` is an error envelope. Holds no host value
/// when it returns, so it is safe to call before raising.
pub(crate) unsafe fn is_lua_error(l: *mut lua_State, index: c_int) -> bool {
    to_lua_error(l, index).is_some()
}

/// Pushes an error envelope. Raises on allocation failure.
pub(crate) unsafe fn push_lua_error(l: *mut lua_State, error: LuaError) {
    push_owned(l, Rc::new(RefCell::new(error)));
}

/// Message of the envelope at `index`, falling back to its cause.
pub(crate) unsafe fn lua_error_message(l: *mut lua_State, index: c_int) -> Option<String> {
    to_lua_error(l, index).map(|envelope| {
        let envelope = envelope.borrow();
        match (&envelope.message, &envelope.cause) {
            (Some(message), _) => message.clone(),
            (None, Some(cause)) => cause.to_string(),
            (None, None) => String::new(),
        }
    })
}

/// Finalizer shared by both metatables. Releases whichever reference the
/// userdata holds, unless the host environment of its instance is gone.
unsafe extern "C-unwind" fn gc_host_ref(l: *mut lua_State) -> c_int {
    lua_rawgeti(l, LUA_REGISTRYINDEX, LUA_RIDX_MAINTHREAD);
    let main = lua_tothread(l, -1);
    lua_pop(l, 1);
    if !env::is_bound(main) {
        warn!("host environment unavailable; leaving embedded reference in place");
        return 0;
    }
    let ud = lua_touserdata(l, 1).cast::<HostRef>();
    if ud.is_null() {
        return 0;
    }
    let released = ptr::replace(ud, HostRef::Released);
    if panic::catch_unwind(AssertUnwindSafe(move || drop(released))).is_err() {
        warn!("host object panicked while being dropped");
    }
    0
}

unsafe extern "C-unwind" fn tostring_host_ref(l: *mut lua_State) -> c_int {
    if let Some(message) = lua_error_message(l, 1) {
        lua_pushlstring(l, message.as_ptr().cast(), message.len());
        return 1;
    }
    let text = format!("host object: {:p}", lua_topointer(l, 1));
    lua_pushlstring(l, text.as_ptr().cast(), text.len());
    1
}
