//! Standard libraries and the garbage collector.

use crate::guard::check_stack;
use crate::protect::protect;
use crate::state::LuaState;
use core_types::{GcAction, Result};
use lua_sys::*;
use std::os::raw::c_char;
use tracing::debug;

/// A standard library of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    /// Basic functions, opened into the global table
    Base,
    /// Module system
    Package,
    /// Coroutine manipulation
    Coroutine,
    /// Table manipulation
    Table,
    /// Input and output
    Io,
    /// Operating system facilities
    Os,
    /// String manipulation
    String,
    /// UTF-8 support
    Utf8,
    /// Mathematical functions
    Math,
    /// Debug interface
    Debug,
}

impl Library {
    /// Every library, in the order the interpreter's own loader opens them.
    pub const ALL: [Library; 10] = [
        Library::Base,
        Library::Package,
        Library::Coroutine,
        Library::Table,
        Library::Io,
        Library::Os,
        Library::String,
        Library::Math,
        Library::Utf8,
        Library::Debug,
    ];

    /// Module name under which the library is registered.
    pub fn name(self) -> &'static str {
        match self {
            Library::Base => LUA_GNAME,
            Library::Package => LUA_LOADLIBNAME,
            Library::Coroutine => LUA_COLIBNAME,
            Library::Table => LUA_TABLIBNAME,
            Library::Io => LUA_IOLIBNAME,
            Library::Os => LUA_OSLIBNAME,
            Library::String => LUA_STRLIBNAME,
            Library::Utf8 => LUA_UTF8LIBNAME,
            Library::Math => LUA_MATHLIBNAME,
            Library::Debug => LUA_DBLIBNAME,
        }
    }

    /// Looks a library up by module name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|library| library.name() == name)
    }

    fn c_name(self) -> &'static [u8] {
        match self {
            Library::Base => b"_G\0",
            Library::Package => b"package\0",
            Library::Coroutine => b"coroutine\0",
            Library::Table => b"table\0",
            Library::Io => b"io\0",
            Library::Os => b"os\0",
            Library::String => b"string\0",
            Library::Utf8 => b"utf8\0",
            Library::Math => b"math\0",
            Library::Debug => b"debug\0",
        }
    }

    fn opener(self) -> lua_CFunction {
        match self {
            Library::Base => luaopen_base,
            Library::Package => luaopen_package,
            Library::Coroutine => luaopen_coroutine,
            Library::Table => luaopen_table,
            Library::Io => luaopen_io,
            Library::Os => luaopen_os,
            Library::String => luaopen_string,
            Library::Utf8 => luaopen_utf8,
            Library::Math => luaopen_math,
            Library::Debug => luaopen_debug,
        }
    }
}

impl LuaState {
    /// Opens `library` and sets its global.
    pub fn open_lib(&self, library: Library) -> Result<()> {
        let l = self.enter()?;
        let name = library.c_name().as_ptr().cast::<c_char>();
        let opener = library.opener();
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 0, move |l| {
                luaL_requiref(l, name, opener, 1);
                lua_pop(l, 1);
            })?;
        }
        debug!(library = library.name(), "opened library");
        Ok(())
    }

    /// Opens every standard library.
    pub fn open_libs(&self) -> Result<()> {
        Library::ALL
            .into_iter()
            .try_for_each(|library| self.open_lib(library))
    }

    /// Runs a garbage collector command. The result depends on the action:
    /// counts for [`GcAction::Count`] and [`GcAction::CountBytes`], previous
    /// values for the tuning actions, and 0 otherwise.
    pub fn gc(&self, action: GcAction, data: i32) -> Result<i32> {
        let l = self.enter()?;
        let code = action.code();
        unsafe {
            check_stack(l, self.min_stack())?;
            protect(l, 0, 0, move |l| lua_gc(l, code, data))
        }
    }
}
