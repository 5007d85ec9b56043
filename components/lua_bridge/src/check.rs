//! Argument checks for host functions.
//!
//! A failed check returns [`Error::IllegalArgument`] naming the argument and
//! the running function, as in `bad argument #2 to 'f' (number expected, got
//! nil)`. Returned from a host function, the message gains the caller's
//! location like any other host error.
//!
//! The `_or` variants return the default when the argument is absent or nil.

use crate::state::LuaState;
use core_types::{Error, LuaType, Result};
use std::any::Any;
use std::rc::Rc;

impl LuaState {
    /// Fails with an argument error carrying `message` unless `condition`
    /// holds.
    pub fn check_arg(&self, arg: i32, condition: bool, message: &str) -> Result<()> {
        if condition {
            Ok(())
        } else {
            Err(self.arg_error(arg, message))
        }
    }

    /// The argument as an integer. Floats with an exact integer value and
    /// numeric strings are converted.
    pub fn check_integer(&self, arg: i32) -> Result<i64> {
        if self.is_none(arg)? {
            return Err(self.arg_type_error(arg, LuaType::Number.name()));
        }
        match self.to_integer_x(arg)? {
            Some(value) => Ok(value),
            None if self.is_number(arg)? => {
                Err(self.arg_error(arg, "number has no integer representation"))
            }
            None => Err(self.arg_type_error(arg, LuaType::Number.name())),
        }
    }

    /// Like [`LuaState::check_integer`], with a default.
    pub fn check_integer_or(&self, arg: i32, default: i64) -> Result<i64> {
        if self.is_none_or_nil(arg)? {
            return Ok(default);
        }
        self.check_integer(arg)
    }

    /// The argument as a float. Numeric strings are converted.
    pub fn check_number(&self, arg: i32) -> Result<f64> {
        if self.is_none(arg)? {
            return Err(self.arg_type_error(arg, LuaType::Number.name()));
        }
        self.to_number_x(arg)?
            .ok_or_else(|| self.arg_type_error(arg, LuaType::Number.name()))
    }

    /// Like [`LuaState::check_number`], with a default.
    pub fn check_number_or(&self, arg: i32, default: f64) -> Result<f64> {
        if self.is_none_or_nil(arg)? {
            return Ok(default);
        }
        self.check_number(arg)
    }

    /// The argument as a string. A number is accepted and converted in
    /// place.
    pub fn check_string(&self, arg: i32) -> Result<String> {
        if !self.is_string(arg)? {
            return Err(self.arg_type_error(arg, LuaType::String.name()));
        }
        self.to_string(arg)?
            .ok_or_else(|| self.arg_type_error(arg, LuaType::String.name()))
    }

    /// Like [`LuaState::check_string`], with a default.
    pub fn check_string_or(&self, arg: i32, default: &str) -> Result<String> {
        if self.is_none_or_nil(arg)? {
            return Ok(default.to_string());
        }
        self.check_string(arg)
    }

    /// The argument as raw bytes. A number is accepted and converted in
    /// place.
    pub fn check_bytes(&self, arg: i32) -> Result<Vec<u8>> {
        if !self.is_string(arg)? {
            return Err(self.arg_type_error(arg, LuaType::String.name()));
        }
        self.to_bytes(arg)?
            .ok_or_else(|| self.arg_type_error(arg, LuaType::String.name()))
    }

    /// Position of the argument in `options`. An absent or nil argument
    /// selects `default` when one is given.
    pub fn check_option(&self, arg: i32, options: &[&str], default: Option<&str>) -> Result<usize> {
        let value = match default {
            Some(default) => self.check_string_or(arg, default)?,
            None => self.check_string(arg)?,
        };
        options
            .iter()
            .position(|option| *option == value)
            .ok_or_else(|| self.arg_error(arg, &format!("invalid option '{}'", value)))
    }

    /// Fails unless the argument has type `expected`.
    pub fn check_type(&self, arg: i32, expected: LuaType) -> Result<()> {
        if self.type_of(arg)? == expected {
            Ok(())
        } else {
            Err(self.arg_type_error(arg, expected.name()))
        }
    }

    /// The argument as an embedded host object of type `T`.
    pub fn check_object<T: Any>(&self, arg: i32) -> Result<Rc<T>> {
        let object = if self.is_none(arg)? {
            None
        } else {
            self.to_object::<T>(arg)?
        };
        object.ok_or_else(|| self.arg_type_error(arg, std::any::type_name::<T>()))
    }

    fn arg_type_error(&self, arg: i32, expected: &str) -> Error {
        let actual = self
            .type_of(arg)
            .map(LuaType::name)
            .unwrap_or(LuaType::None.name());
        self.arg_error(arg, &format!("{} expected, got {}", expected, actual))
    }

    /// Builds the argument error, adjusting the position for method calls
    /// where the receiver is argument 1.
    fn arg_error(&self, arg: i32, extra: &str) -> Error {
        let frame = self.get_info(0, "n").ok().flatten();
        let (name, namewhat) = match frame {
            Some(frame) => (frame.name, frame.namewhat),
            None => (None, None),
        };
        let arg = if namewhat.as_deref() == Some("method") {
            arg - 1
        } else {
            arg
        };
        let argument = if arg > 0 {
            format!("argument #{}", arg)
        } else {
            "self argument".to_string()
        };
        let message = match name {
            Some(name) => format!("bad {} to '{}' ({})", argument, name, extra),
            None => format!("bad {} ({})", argument, extra),
        };
        Error::IllegalArgument(message)
    }
}
