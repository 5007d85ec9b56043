//! Runtime orchestration for Lua execution
//!
//! The Runtime owns one interpreter state, registers the CLI's host
//! functions and turns chunk results into display strings.

use crate::error::CliResult;
use core_types::Result;
use lua_bridge::{Config, LuaState, LUA_MULTRET};
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::rc::Rc;
use tracing::debug;

/// Interpreter state plus the output captured from `host_print`
pub struct Runtime {
    lua: LuaState,
    output: Rc<RefCell<Vec<String>>>,
    echo: Rc<Cell<bool>>,
}

impl Runtime {
    /// Create a runtime from a bridge configuration
    ///
    /// # Example
    /// ```
    /// use lua_bridge::Config;
    /// use lua_cli::Runtime;
    ///
    /// let runtime = Runtime::new(Config::default()).unwrap();
    /// assert!(runtime.state().is_open());
    /// ```
    pub fn new(config: Config) -> CliResult<Self> {
        let lua = LuaState::with_config(config)?;
        let output = Rc::new(RefCell::new(Vec::new()));
        let echo = Rc::new(Cell::new(true));

        let sink = Rc::clone(&output);
        let echoing = Rc::clone(&echo);
        lua.register("host_print", move |lua: &LuaState| -> Result<usize> {
            let count = lua.top()?;
            let mut parts = Vec::with_capacity(count as usize);
            for index in 1..=count {
                parts.push(lua.to_display_string(index)?);
            }
            let line = parts.join("\t");
            if echoing.get() {
                println!("{}", line);
            }
            sink.borrow_mut().push(line);
            Ok(0)
        })?;

        Ok(Self { lua, output, echo })
    }

    /// Create a runtime from an optional TOML config file
    ///
    /// Without a file the standard libraries are opened. `bare` overrides
    /// both cases and keeps the state without libraries.
    pub fn from_config_file(path: Option<&str>, bare: bool) -> CliResult<Self> {
        let mut config = match path {
            Some(path) => Config::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Config {
                open_libs: true,
                ..Config::default()
            },
        };
        if bare {
            config.open_libs = false;
        }
        debug!(?config, "runtime configuration");
        Self::new(config)
    }

    /// Enable or disable echoing `host_print` output to stdout
    pub fn with_echo(self, echo: bool) -> Self {
        self.echo.set(echo);
        self
    }

    /// Lines printed by `host_print` so far
    pub fn output(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    /// The underlying interpreter state
    pub fn state(&self) -> &LuaState {
        &self.lua
    }

    /// Execute a Lua file, source or precompiled
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be opened, fails to load or
    /// raises an error
    pub fn execute_file(&mut self, path: &str) -> CliResult<Vec<String>> {
        let file = File::open(path)?;
        let base = self.lua.top()?;
        self.lua.load(file, &format!("@{}", path), "bt")?;
        self.collect_results(base)
    }

    /// Execute a Lua source string and return its results as display strings
    ///
    /// # Example
    /// ```
    /// use lua_bridge::Config;
    /// use lua_cli::Runtime;
    ///
    /// let mut runtime = Runtime::new(Config::default()).unwrap();
    /// let results = runtime.execute_string("return 1 + 2", "=eval").unwrap();
    /// assert_eq!(results, vec!["3".to_string()]);
    /// ```
    pub fn execute_string(&mut self, source: &str, chunk_name: &str) -> CliResult<Vec<String>> {
        let base = self.lua.top()?;
        self.lua.load_str(source, chunk_name)?;
        self.collect_results(base)
    }

    /// Start the REPL (Read-Eval-Print Loop)
    pub fn repl(&mut self) -> CliResult<()> {
        crate::repl::run_repl(self)
    }

    fn collect_results(&mut self, base: i32) -> CliResult<Vec<String>> {
        self.lua.call(0, LUA_MULTRET)?;
        let top = self.lua.top()?;
        let mut results = Vec::with_capacity((top - base) as usize);
        for index in base + 1..=top {
            results.push(self.lua.to_display_string(index)?);
        }
        self.lua.set_top(base)?;
        Ok(results)
    }
}
