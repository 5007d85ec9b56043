//! Bridge configuration.
//!
//! Defaults match the interpreter's own guarantees; a TOML document can
//! override any subset of the fields.

use core_types::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for a [`LuaState`](crate::LuaState).
///
/// # Examples
///
/// ```
/// use lua_bridge::Config;
///
/// let config = Config::from_toml_str("read_buffer_size = 512").unwrap();
/// assert_eq!(config.read_buffer_size, 512);
/// assert_eq!(config.min_stack, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Free stack slots guaranteed before each operation
    pub min_stack: i32,
    /// Buffer size used when reading chunks and persisted values
    pub read_buffer_size: usize,
    /// Open the standard libraries when the state is created
    pub open_libs: bool,
    /// Deepest table nesting accepted when persisting or restoring a value
    pub max_persist_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_stack: lua_sys::LUA_MINSTACK,
            read_buffer_size: 4096,
            open_libs: false,
            max_persist_depth: 200,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML, then validates it.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)
            .map_err(|e| Error::IllegalArgument(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_stack <= 0 {
            return Err(Error::IllegalArgument(
                "min_stack must be positive".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::IllegalArgument(
                "read_buffer_size must be positive".to_string(),
            ));
        }
        if self.max_persist_depth == 0 {
            return Err(Error::IllegalArgument(
                "max_persist_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
