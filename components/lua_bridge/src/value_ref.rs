//! Host handles to interpreter values.
//!
//! A [`LuaValueRef`] pins a value through a registry reference so the host
//! can hold it across calls without keeping it on the stack. Dropping the
//! handle releases the reference, unless the instance is closed or its host
//! environment is gone.

use crate::env;
use crate::state::{LuaState, StateInner};
use core_types::{Error, LuaType, Result};
use lua_sys::{LUA_REFNIL, LUA_REGISTRYINDEX};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

/// A registry-pinned handle to a value of one instance.
///
/// Does not keep the instance alive. Once the instance is closed the handle
/// can no longer push its value, and dropping it does nothing.
///
/// # Examples
///
/// ```
/// use lua_bridge::LuaState;
///
/// let lua = LuaState::new().unwrap();
/// lua.push_string("kept").unwrap();
/// let kept = lua.to_value_ref(-1).unwrap();
/// lua.set_top(0).unwrap();
///
/// kept.push().unwrap();
/// assert_eq!(lua.to_string(-1).unwrap().as_deref(), Some("kept"));
/// ```
pub struct LuaValueRef {
    state: Weak<StateInner>,
    reference: i32,
}

impl LuaState {
    /// Pins the value at `index` and returns a handle to it. The stack is
    /// unchanged.
    pub fn to_value_ref(&self, index: i32) -> Result<LuaValueRef> {
        let top = self.top()?;
        self.push_value(index)?;
        match self.reference(LUA_REGISTRYINDEX) {
            Ok(reference) => {
                trace!(reference, "pinned value");
                Ok(LuaValueRef {
                    state: Rc::downgrade(&self.inner),
                    reference,
                })
            }
            Err(error) => {
                self.set_top(top)?;
                Err(error)
            }
        }
    }
}

impl LuaValueRef {
    /// Handle of the instance the value belongs to, while it is open.
    pub fn state(&self) -> Option<LuaState> {
        self.state
            .upgrade()
            .map(|inner| LuaState { inner })
            .filter(LuaState::is_open)
    }

    /// Pushes the value onto the current Execution Thread of its instance
    /// and returns its type.
    pub fn push(&self) -> Result<LuaType> {
        let lua = self
            .state()
            .ok_or_else(|| Error::IllegalState("Lua state is closed".to_string()))?;
        lua.raw_get_i(LUA_REGISTRYINDEX, i64::from(self.reference))
    }

    pub(crate) fn reference(&self) -> i32 {
        self.reference
    }
}

impl fmt::Debug for LuaValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaValueRef")
            .field("reference", &self.reference)
            .finish()
    }
}

impl Drop for LuaValueRef {
    fn drop(&mut self) {
        if self.reference == LUA_REFNIL {
            return;
        }
        let Some(lua) = self.state() else {
            return;
        };
        if !env::is_bound(lua.inner.main.get()) {
            warn!(reference = self.reference, "host environment unavailable; leaving value pinned");
            return;
        }
        if let Err(error) = lua.unreference(LUA_REGISTRYINDEX, self.reference) {
            warn!(reference = self.reference, %error, "failed to release value reference");
        }
    }
}
