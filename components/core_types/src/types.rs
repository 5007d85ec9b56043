//! Host-side mirrors of interpreter constants.

/// Type of an interpreter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaType {
    /// Index is not valid (`LUA_TNONE`)
    None,
    /// `nil`
    Nil,
    /// `true` or `false`
    Boolean,
    /// Raw pointer without metatable
    LightUserdata,
    /// Integer or float
    Number,
    /// Byte string
    String,
    /// Table
    Table,
    /// Lua or C function
    Function,
    /// Full userdata, including embedded host objects
    Userdata,
    /// Coroutine
    Thread,
}

impl LuaType {
    /// Maps an interpreter type code; unknown codes map to [`LuaType::None`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => LuaType::Nil,
            1 => LuaType::Boolean,
            2 => LuaType::LightUserdata,
            3 => LuaType::Number,
            4 => LuaType::String,
            5 => LuaType::Table,
            6 => LuaType::Function,
            7 => LuaType::Userdata,
            8 => LuaType::Thread,
            _ => LuaType::None,
        }
    }

    /// The interpreter type code.
    pub fn code(self) -> i32 {
        match self {
            LuaType::None => -1,
            LuaType::Nil => 0,
            LuaType::Boolean => 1,
            LuaType::LightUserdata => 2,
            LuaType::Number => 3,
            LuaType::String => 4,
            LuaType::Table => 5,
            LuaType::Function => 6,
            LuaType::Userdata => 7,
            LuaType::Thread => 8,
        }
    }

    /// The name the interpreter uses for this type.
    pub fn name(self) -> &'static str {
        match self {
            LuaType::None => "no value",
            LuaType::Nil => "nil",
            LuaType::Boolean => "boolean",
            LuaType::LightUserdata | LuaType::Userdata => "userdata",
            LuaType::Number => "number",
            LuaType::String => "string",
            LuaType::Table => "table",
            LuaType::Function => "function",
            LuaType::Thread => "thread",
        }
    }
}

/// Garbage collector command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcAction {
    /// Stop the collector
    Stop,
    /// Restart the collector
    Restart,
    /// Full collection cycle
    Collect,
    /// Memory in use, in kilobytes
    Count,
    /// Remainder of memory in use, in bytes
    CountBytes,
    /// Incremental step
    Step,
    /// Set the pause value
    SetPause,
    /// Set the step multiplier
    SetStepMul,
    /// Whether the collector is running
    IsRunning,
}

impl GcAction {
    /// The interpreter command code.
    pub fn code(self) -> i32 {
        match self {
            GcAction::Stop => 0,
            GcAction::Restart => 1,
            GcAction::Collect => 2,
            GcAction::Count => 3,
            GcAction::CountBytes => 4,
            GcAction::Step => 5,
            GcAction::SetPause => 6,
            GcAction::SetStepMul => 7,
            GcAction::IsRunning => 9,
        }
    }
}

/// Arithmetic or bitwise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `/`
    Div,
    /// `//`
    IDiv,
    /// `&`
    BAnd,
    /// `|`
    BOr,
    /// `~`
    BXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// unary `-`
    Unm,
    /// unary `~`
    BNot,
}

impl ArithOp {
    /// The interpreter operator code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the operator takes a single operand.
    pub fn is_unary(self) -> bool {
        matches!(self, ArithOp::Unm | ArithOp::BNot)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// `==`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl RelOp {
    /// The interpreter operator code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Status of an execution thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Runnable: not started, finished, or the running thread
    Ok,
    /// Suspended in a yield
    Yield,
    /// Died with a runtime error
    RuntimeError,
    /// Died with a syntax error
    SyntaxError,
    /// Died out of memory
    MemoryError,
    /// Died in a `__gc` metamethod
    GcMetamethodError,
    /// Died in the message handler
    MessageHandlerError,
}

impl ThreadStatus {
    /// Maps an interpreter status code; `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ThreadStatus::Ok),
            1 => Some(ThreadStatus::Yield),
            2 => Some(ThreadStatus::RuntimeError),
            3 => Some(ThreadStatus::SyntaxError),
            4 => Some(ThreadStatus::MemoryError),
            5 => Some(ThreadStatus::GcMetamethodError),
            6 => Some(ThreadStatus::MessageHandlerError),
            _ => None,
        }
    }
}
