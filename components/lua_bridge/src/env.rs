//! Per-thread host environment binding.
//!
//! Every public bridge operation binds the environment of its instance on the
//! calling native thread, keyed by the instance's main interpreter thread.
//! Closing an attached state releases that instance only. Finalizers of
//! embedded host references consult the binding of their own instance and do
//! nothing once it is gone, so an interpreter that outlives its host can
//! still collect garbage.

use lua_sys::lua_State;
use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    static BOUND: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

pub(crate) fn bind(main: *mut lua_State) {
    let _ = BOUND.try_with(|bound| bound.borrow_mut().insert(main as usize));
}

pub(crate) fn unbind(main: *mut lua_State) {
    let _ = BOUND.try_with(|bound| bound.borrow_mut().remove(&(main as usize)));
}

/// Whether the instance whose main thread is `main` is bound on the current
/// native thread.
pub(crate) fn is_bound(main: *mut lua_State) -> bool {
    BOUND
        .try_with(|bound| bound.borrow().contains(&(main as usize)))
        .unwrap_or(false)
}

/// Whether a host environment is available on the current native thread,
/// that is, whether any instance is bound on it.
///
/// Returns `false` during thread teardown.
pub fn is_available() -> bool {
    BOUND
        .try_with(|bound| !bound.borrow().is_empty())
        .unwrap_or(false)
}
