//! Chunk loading and dumping over host streams.

use crate::guard::{check_arg, check_nelems, check_stack};
use crate::state::LuaState;
use crate::translate;
use crate::util::c_string;
use core_types::{Error, Result};
use lua_sys::*;
use std::io::{self, Read, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::trace;

struct ReadState<'a> {
    reader: &'a mut dyn Read,
    buffer: Vec<u8>,
    error: Option<io::Error>,
}

unsafe extern "C-unwind" fn read_chunk(
    _l: *mut lua_State,
    data: *mut c_void,
    size: *mut usize,
) -> *const c_char {
    let state = &mut *data.cast::<ReadState<'_>>();
    *size = 0;
    if state.error.is_some() {
        return ptr::null();
    }
    let ReadState { reader, buffer, .. } = &mut *state;
    let read = panic::catch_unwind(AssertUnwindSafe(|| loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => break other,
        }
    }));
    match read {
        Ok(Ok(0)) => ptr::null(),
        Ok(Ok(n)) => {
            *size = n;
            state.buffer.as_ptr().cast()
        }
        Ok(Err(e)) => {
            state.error = Some(e);
            ptr::null()
        }
        Err(_) => {
            state.error = Some(io::Error::new(io::ErrorKind::Other, "reader panicked"));
            ptr::null()
        }
    }
}

struct WriteState<'a> {
    writer: &'a mut dyn Write,
    error: Option<io::Error>,
}

unsafe extern "C-unwind" fn write_chunk(
    _l: *mut lua_State,
    p: *const c_void,
    size: usize,
    data: *mut c_void,
) -> c_int {
    let state = &mut *data.cast::<WriteState<'_>>();
    if size == 0 {
        return 0;
    }
    let bytes = std::slice::from_raw_parts(p.cast::<u8>(), size);
    let writer = &mut state.writer;
    match panic::catch_unwind(AssertUnwindSafe(|| writer.write_all(bytes))) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            state.error = Some(e);
            1
        }
        Err(_) => {
            state.error = Some(io::Error::new(io::ErrorKind::Other, "writer panicked"));
            1
        }
    }
}

impl LuaState {
    /// Loads a chunk from `reader` and pushes it as a function.
    ///
    /// `mode` is `"t"` for text, `"b"` for binary or `"bt"` for either. A read
    /// failure is reported as [`Error::Io`] and nothing is pushed.
    pub fn load<R: Read>(&self, mut reader: R, chunk_name: &str, mode: &str) -> Result<()> {
        let l = self.enter()?;
        check_arg(matches!(mode, "t" | "b" | "bt"), "illegal mode")?;
        let chunk_name = c_string(chunk_name)?;
        let mode = c_string(mode)?;
        let mut state = ReadState {
            reader: &mut reader,
            buffer: vec![0; self.config().read_buffer_size],
            error: None,
        };
        unsafe {
            check_stack(l, self.min_stack())?;
            let status = lua_load(
                l,
                read_chunk,
                (&mut state as *mut ReadState<'_>).cast(),
                chunk_name.as_ptr(),
                mode.as_ptr(),
            );
            if let Some(error) = state.error.take() {
                lua_pop(l, 1);
                return Err(Error::from(error));
            }
            if status != LUA_OK {
                let error = translate::translate(l, status);
                lua_pop(l, 1);
                trace!(status, "load failed: {}", error);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Loads a text chunk from a string.
    pub fn load_str(&self, source: &str, chunk_name: &str) -> Result<()> {
        self.load(source.as_bytes(), chunk_name, "t")
    }

    /// Writes the function on top of the stack as a binary chunk. With
    /// `strip` set, debug information is omitted.
    pub fn dump<W: Write>(&self, mut writer: W, strip: bool) -> Result<()> {
        let l = self.enter()?;
        unsafe {
            check_nelems(l, 1)?;
            check_arg(
                lua_type(l, -1) == LUA_TFUNCTION && lua_iscfunction(l, -1) == 0,
                "illegal type",
            )?;
            let mut state = WriteState {
                writer: &mut writer,
                error: None,
            };
            lua_dump(
                l,
                write_chunk,
                (&mut state as *mut WriteState<'_>).cast(),
                c_int::from(strip),
            );
            if let Some(error) = state.error.take() {
                return Err(Error::from(error));
            }
        }
        writer.flush()?;
        Ok(())
    }
}
