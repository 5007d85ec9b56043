//! Value persistence.
//!
//! A value graph of nil, booleans, numbers, strings and tables is captured as
//! a [`PersistedValue`] tree and encoded with bincode. Shared and cyclic
//! tables are written once and referenced by id afterwards. Values found in a
//! permanents table are written as their substitute key instead; on restore
//! the inverse permanents table maps the key back to the live value.
//!
//! On the wire the tree is flattened to a prefix-ordered node list, so
//! decoding never recurses. Table nesting is bounded by
//! [`Config::max_persist_depth`](crate::Config::max_persist_depth) in every
//! direction: capture, decode and restore.

use crate::embed;
use crate::guard::{check_index, check_stack, check_type};
use crate::state::LuaState;
use crate::util;
use core_types::{Error, LuaType, Result};
use lua_sys::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::os::raw::c_int;
use std::ptr;
use tracing::trace;

/// Snapshot of a persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PersistedValue {
    /// `nil`
    Nil,
    /// A boolean
    Boolean(bool),
    /// An integer number
    Integer(i64),
    /// A float number
    Number(f64),
    /// A byte string
    String(Vec<u8>),
    /// First occurrence of a table
    Table {
        /// Identifier later occurrences refer to
        id: u32,
        /// Key and value pairs in traversal order
        entries: Vec<(PersistedValue, PersistedValue)>,
        /// Metatable, if any
        metatable: Option<Box<PersistedValue>>,
    },
    /// Repeated occurrence of the table with this id
    Reference(u32),
    /// Value substituted by a permanents key
    Permanent(Box<PersistedValue>),
}

/// Walks a value graph with raw accesses only, so the walk never allocates
/// interpreter memory.
struct Walker {
    perms: c_int,
    seen: HashMap<usize, u32>,
    next_id: u32,
    max_depth: usize,
}

fn too_deep(max_depth: usize) -> Error {
    Error::IllegalArgument(format!(
        "value nested deeper than {} tables",
        max_depth
    ))
}

impl Walker {
    unsafe fn primitive(l: *mut lua_State, index: c_int) -> Option<PersistedValue> {
        match lua_type(l, index) {
            LUA_TNIL => Some(PersistedValue::Nil),
            LUA_TBOOLEAN => Some(PersistedValue::Boolean(lua_toboolean(l, index) != 0)),
            LUA_TNUMBER if lua_isinteger(l, index) != 0 => Some(PersistedValue::Integer(
                lua_tointegerx(l, index, ptr::null_mut()),
            )),
            LUA_TNUMBER => Some(PersistedValue::Number(lua_tonumberx(
                l,
                index,
                ptr::null_mut(),
            ))),
            LUA_TSTRING => Some(PersistedValue::String(
                util::to_bytes(l, index).unwrap_or_default(),
            )),
            _ => None,
        }
    }

    unsafe fn value(
        &mut self,
        l: *mut lua_State,
        index: c_int,
        depth: usize,
    ) -> Result<PersistedValue> {
        let index = lua_absindex(l, index);
        if let Some(value) = Self::primitive(l, index) {
            return Ok(value);
        }
        if let Some(key) = self.permanent(l, index)? {
            return Ok(PersistedValue::Permanent(Box::new(key)));
        }
        match lua_type(l, index) {
            LUA_TTABLE => self.table(l, index, depth),
            kind => Err(Error::IllegalArgument(format!(
                "cannot persist a {} value",
                LuaType::from_code(kind).name()
            ))),
        }
    }

    unsafe fn permanent(&mut self, l: *mut lua_State, index: c_int) -> Result<Option<PersistedValue>> {
        check_stack(l, 2)?;
        lua_pushvalue(l, index);
        lua_rawget(l, self.perms);
        let key = match lua_type(l, -1) {
            LUA_TNIL => Ok(None),
            _ => Self::primitive(l, -1)
                .map(Some)
                .ok_or_else(|| Error::IllegalArgument("illegal permanent key".to_string())),
        };
        lua_pop(l, 1);
        key
    }

    unsafe fn table(
        &mut self,
        l: *mut lua_State,
        index: c_int,
        depth: usize,
    ) -> Result<PersistedValue> {
        let address = lua_topointer(l, index) as usize;
        if let Some(&id) = self.seen.get(&address) {
            return Ok(PersistedValue::Reference(id));
        }
        if depth >= self.max_depth {
            return Err(too_deep(self.max_depth));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(address, id);
        check_stack(l, 3)?;
        let mut entries = Vec::new();
        lua_pushnil(l);
        while lua_next(l, index) != 0 {
            let entry = self
                .value(l, -2, depth + 1)
                .and_then(|key| Ok((key, self.value(l, -1, depth + 1)?)));
            match entry {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    lua_pop(l, 2);
                    return Err(error);
                }
            }
            lua_pop(l, 1);
        }
        let metatable = if lua_getmetatable(l, index) != 0 {
            let metatable = self.value(l, -1, depth + 1);
            lua_pop(l, 1);
            Some(Box::new(metatable?))
        } else {
            None
        };
        Ok(PersistedValue::Table {
            id,
            entries,
            metatable,
        })
    }
}

/// Wire form of one [`PersistedValue`] node. A table node is followed by
/// its key and value nodes, then its metatable node when present; a
/// permanent node is followed by its key node.
#[derive(Debug, Serialize, Deserialize)]
enum Node {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(Vec<u8>),
    Table { id: u32, entries: u32, metatable: bool },
    Reference(u32),
    Permanent,
}

fn flatten(value: &PersistedValue, nodes: &mut Vec<Node>) -> Result<()> {
    match value {
        PersistedValue::Nil => nodes.push(Node::Nil),
        PersistedValue::Boolean(value) => nodes.push(Node::Boolean(*value)),
        PersistedValue::Integer(value) => nodes.push(Node::Integer(*value)),
        PersistedValue::Number(value) => nodes.push(Node::Number(*value)),
        PersistedValue::String(bytes) => nodes.push(Node::String(bytes.clone())),
        PersistedValue::Table {
            id,
            entries,
            metatable,
        } => {
            nodes.push(Node::Table {
                id: *id,
                entries: u32::try_from(entries.len())
                    .map_err(|_| Error::IllegalArgument("table too large".to_string()))?,
                metatable: metatable.is_some(),
            });
            for (key, value) in entries {
                flatten(key, nodes)?;
                flatten(value, nodes)?;
            }
            if let Some(metatable) = metatable {
                flatten(metatable, nodes)?;
            }
        }
        PersistedValue::Reference(id) => nodes.push(Node::Reference(*id)),
        PersistedValue::Permanent(key) => {
            nodes.push(Node::Permanent);
            flatten(key, nodes)?;
        }
    }
    Ok(())
}

fn unflatten(
    nodes: &mut std::vec::IntoIter<Node>,
    depth: usize,
    max_depth: usize,
) -> Result<PersistedValue> {
    let node = nodes
        .next()
        .ok_or_else(|| Error::IllegalArgument("truncated persisted value".to_string()))?;
    Ok(match node {
        Node::Nil => PersistedValue::Nil,
        Node::Boolean(value) => PersistedValue::Boolean(value),
        Node::Integer(value) => PersistedValue::Integer(value),
        Node::Number(value) => PersistedValue::Number(value),
        Node::String(bytes) => PersistedValue::String(bytes),
        Node::Reference(id) => PersistedValue::Reference(id),
        Node::Table {
            id,
            entries,
            metatable,
        } => {
            if depth >= max_depth {
                return Err(too_deep(max_depth));
            }
            let count = entries as usize;
            let mut list = Vec::with_capacity(count.min(nodes.len() / 2));
            for _ in 0..count {
                let key = unflatten(nodes, depth + 1, max_depth)?;
                let value = unflatten(nodes, depth + 1, max_depth)?;
                list.push((key, value));
            }
            let metatable = if metatable {
                Some(Box::new(unflatten(nodes, depth + 1, max_depth)?))
            } else {
                None
            };
            PersistedValue::Table {
                id,
                entries: list,
                metatable,
            }
        }
        Node::Permanent => {
            if depth >= max_depth {
                return Err(too_deep(max_depth));
            }
            PersistedValue::Permanent(Box::new(unflatten(nodes, depth + 1, max_depth)?))
        }
    })
}

fn codec_error(error: bincode::Error) -> Error {
    match *error {
        bincode::ErrorKind::Io(error) => Error::from(error),
        other => Error::external(other),
    }
}

fn permanents_name(registry: &'static [u8]) -> String {
    String::from_utf8_lossy(&registry[..registry.len() - 1]).into_owned()
}

impl LuaState {
    /// Captures the value at `index`. Values that are keys of the
    /// permanents table at `perms` are captured as the mapped key.
    pub fn snapshot(&self, perms: i32, index: i32) -> Result<PersistedValue> {
        let l = self.enter()?;
        unsafe {
            check_stack(l, self.min_stack())?;
            check_type(l, perms, LuaType::Table)?;
            check_index(l, index)?;
            let top = lua_gettop(l);
            let running = lua_gc(l, LUA_GCISRUNNING, 0) != 0;
            lua_gc(l, LUA_GCSTOP, 0);
            let mut walker = Walker {
                perms: lua_absindex(l, perms),
                seen: HashMap::new(),
                next_id: 1,
                max_depth: self.config().max_persist_depth,
            };
            let value = walker.value(l, index, 0);
            lua_settop(l, top);
            if running {
                lua_gc(l, LUA_GCRESTART, 0);
            }
            value
        }
    }

    /// Writes the value at `index` to `writer`.
    pub fn persist<W: Write>(&self, writer: W, perms: i32, index: i32) -> Result<()> {
        let value = self.snapshot(perms, index)?;
        let mut nodes = Vec::new();
        flatten(&value, &mut nodes)?;
        bincode::serialize_into(writer, &nodes).map_err(codec_error)?;
        trace!("persisted value");
        Ok(())
    }

    /// Pushes a value rebuilt from `value`. Permanent keys are looked up in
    /// the inverse permanents table at `perms`. Nothing is pushed on failure,
    /// including when `value` nests deeper than the configured limit.
    pub fn push_persisted(&self, value: &PersistedValue, perms: i32) -> Result<()> {
        let l = self.enter()?;
        let perms = unsafe {
            check_type(l, perms, LuaType::Table)?;
            lua_absindex(l, perms)
        };
        let top = self.top()?;
        self.new_table(0, 0)?;
        let scratch = self.abs_index(-1)?;
        match self.restore(value, perms, scratch, 0) {
            Ok(()) => self.remove(scratch),
            Err(error) => {
                self.set_top(top)?;
                Err(error)
            }
        }
    }

    /// Reads a value written by [`LuaState::persist`] and pushes it.
    pub fn unpersist<R: Read>(&self, reader: R, perms: i32) -> Result<()> {
        let reader = BufReader::with_capacity(self.config().read_buffer_size, reader);
        let nodes: Vec<Node> = bincode::deserialize_from(reader).map_err(codec_error)?;
        let mut nodes = nodes.into_iter();
        let value = unflatten(&mut nodes, 0, self.config().max_persist_depth)?;
        if !nodes.as_slice().is_empty() {
            return Err(Error::IllegalArgument(
                "trailing data after persisted value".to_string(),
            ));
        }
        self.push_persisted(&value, perms)
    }

    fn restore(&self, value: &PersistedValue, perms: i32, scratch: i32, depth: usize) -> Result<()> {
        let max_depth = self.config().max_persist_depth;
        match value {
            PersistedValue::Nil => self.push_nil(),
            PersistedValue::Boolean(value) => self.push_boolean(*value),
            PersistedValue::Integer(value) => self.push_integer(*value),
            PersistedValue::Number(value) => self.push_number(*value),
            PersistedValue::String(bytes) => self.push_bytes(bytes),
            PersistedValue::Table {
                id,
                entries,
                metatable,
            } => {
                if depth >= max_depth {
                    return Err(too_deep(max_depth));
                }
                let size = i32::try_from(entries.len()).unwrap_or(i32::MAX);
                self.new_table(0, size)?;
                let table = self.abs_index(-1)?;
                self.push_value(table)?;
                self.raw_set_i(scratch, i64::from(*id))?;
                for (key, value) in entries {
                    self.restore(key, perms, scratch, depth + 1)?;
                    self.restore(value, perms, scratch, depth + 1)?;
                    self.raw_set(table)?;
                }
                if let Some(metatable) = metatable {
                    self.restore(metatable, perms, scratch, depth + 1)?;
                    if !self.is_table(-1)? {
                        return Err(Error::IllegalArgument("illegal metatable".to_string()));
                    }
                    self.set_metatable(table)?;
                }
                Ok(())
            }
            PersistedValue::Reference(id) => {
                if self.raw_get_i(scratch, i64::from(*id))? == LuaType::Nil {
                    return Err(Error::IllegalArgument(format!(
                        "unknown table reference {}",
                        id
                    )));
                }
                Ok(())
            }
            PersistedValue::Permanent(key) => {
                if depth >= max_depth {
                    return Err(too_deep(max_depth));
                }
                self.restore(key, perms, scratch, depth + 1)?;
                if self.raw_get(perms)? == LuaType::Nil {
                    return Err(Error::IllegalArgument("unknown permanent".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Pushes a permanents table mapping the C functions and tables of the
    /// loaded libraries, and the host object metatable, to stable names.
    pub fn push_system_permanents(&self) -> Result<()> {
        self.push_permanents(false)
    }

    /// Pushes the inverse of [`LuaState::push_system_permanents`].
    pub fn push_system_inverse_permanents(&self) -> Result<()> {
        self.push_permanents(true)
    }

    fn push_permanents(&self, inverse: bool) -> Result<()> {
        self.new_table(0, 0)?;
        let result = self.abs_index(-1)?;
        let filled = self.fill_permanents(result, inverse);
        if filled.is_err() {
            self.set_top(result)?;
        }
        filled
    }

    fn fill_permanents(&self, result: i32, inverse: bool) -> Result<()> {
        self.get_field(LUA_REGISTRYINDEX, "_LOADED")?;
        if self.is_table(-1)? {
            let loaded = self.abs_index(-1)?;
            self.push_nil()?;
            while self.next(loaded)? {
                if self.type_of(-2)? == LuaType::String && self.is_table(-1)? {
                    let module = self.to_string(-2)?.unwrap_or_default();
                    self.add_permanent(result, -1, &format!("lib.{}", module), inverse)?;
                    let library = self.abs_index(-1)?;
                    self.push_nil()?;
                    while self.next(library)? {
                        if self.type_of(-2)? == LuaType::String && self.is_c_function(-1)? {
                            let field = self.to_string(-2)?.unwrap_or_default();
                            self.add_permanent(result, -1, &format!("{}.{}", module, field), inverse)?;
                        }
                        self.pop(1)?;
                    }
                }
                self.pop(1)?;
            }
        }
        self.pop(1)?;
        let sentinel = permanents_name(embed::HOST_OBJECT);
        if self.get_field(LUA_REGISTRYINDEX, &sentinel)? == LuaType::Table {
            self.add_permanent(result, -1, &sentinel, inverse)?;
        }
        self.pop(1)
    }

    fn add_permanent(&self, table: i32, index: i32, name: &str, inverse: bool) -> Result<()> {
        let value = self.abs_index(index)?;
        if inverse {
            self.push_string(name)?;
            self.push_value(value)?;
        } else {
            self.push_value(value)?;
            self.push_string(name)?;
        }
        self.raw_set(table)
    }
}
