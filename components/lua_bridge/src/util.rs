//! Conversions between host strings and interpreter strings.

use core_types::{Error, Result};
use lua_sys::*;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};

/// Pointer to a NUL-terminated byte string constant.
pub(crate) fn c_ptr(bytes: &'static [u8]) -> *const c_char {
    debug_assert_eq!(bytes.last(), Some(&0));
    bytes.as_ptr().cast()
}

/// Converts a host string for use as an interpreter name or key.
pub(crate) fn c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::IllegalArgument("string contains NUL byte".to_string()))
}

/// Copies a C string returned by the interpreter.
pub(crate) unsafe fn from_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Bytes of the string or number at `index`, converting numbers in place.
pub(crate) unsafe fn to_bytes(l: *mut lua_State, index: c_int) -> Option<Vec<u8>> {
    let mut len = 0usize;
    let ptr = lua_tolstring(l, index, &mut len);
    if ptr.is_null() {
        return None;
    }
    Some(std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec())
}

/// Lossy host string of the string or number at `index`.
pub(crate) unsafe fn to_rust_string(l: *mut lua_State, index: c_int) -> Option<String> {
    to_bytes(l, index).map(|bytes| match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
