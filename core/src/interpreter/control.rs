//! Control flow and exception propagation

use super::builtins::exceptions::ExcType;
use super::object::Val;
use crate::error::TraceEntry;

/* ===================== Control Flow ===================== */

/// How a statement finished
///
/// Anything other than `Next` unwinds the enclosing blocks until a loop
/// (`Break`, `Continue`) or a function call (`Return`) consumes it.
#[derive(Debug, Clone)]
pub(crate) enum Control {
    Next,
    Break,
    Continue,
    Return(Val),
}

/* ===================== Interrupts ===================== */

/// Why the host stopped an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    TimedOut,
    Cancelled,
}

/* ===================== Exceptions ===================== */

/// A guest exception in flight
#[derive(Debug, Clone)]
pub(crate) enum Exc {
    /// An exception instance created by guest code
    Object(Val),
    /// A built-in exception not yet materialised as an instance
    Pending { ty: ExcType, args: Vec<Val> },
}

#[derive(Debug, Clone)]
pub(crate) struct Raised {
    pub exc: Exc,
    /// Frames unwound so far, innermost first
    pub traceback: Vec<TraceEntry>,
}

/// Everything that aborts evaluation
///
/// Exceptions can be caught by guest handlers. Interrupts cannot: they
/// skip every `except` and `finally` on the way out.
#[derive(Debug, Clone)]
pub(crate) enum Throw {
    Exception(Box<Raised>),
    Interrupt(Interrupt),
}

impl Throw {
    pub fn new(ty: ExcType, message: impl Into<String>) -> Self {
        Self::with_args(ty, vec![Val::from(message.into())])
    }

    pub fn with_args(ty: ExcType, args: Vec<Val>) -> Self {
        Throw::Exception(Box::new(Raised {
            exc: Exc::Pending { ty, args },
            traceback: Vec::new(),
        }))
    }

    /// Raise an existing exception instance
    pub fn object(exc: Val) -> Self {
        Throw::Exception(Box::new(Raised {
            exc: Exc::Object(exc),
            traceback: Vec::new(),
        }))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::IndexError, message)
    }

    /// `KeyError` carries the missing key itself
    pub fn key_error(key: Val) -> Self {
        Self::with_args(ExcType::KeyError, vec![key])
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(ExcType::NameError, format!("name '{}' is not defined", name))
    }

    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new(
            ExcType::AttributeError,
            format!("'{}' object has no attribute '{}'", type_name, attr),
        )
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ExcType::ZeroDivisionError, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ExcType::OverflowError, message)
    }

    /// The built-in type of a pending exception
    pub fn pending_type(&self) -> Option<ExcType> {
        match self {
            Throw::Exception(raised) => match &raised.exc {
                Exc::Pending { ty, .. } => Some(*ty),
                Exc::Object(_) => None,
            },
            Throw::Interrupt(_) => None,
        }
    }
}

impl From<Interrupt> for Throw {
    fn from(interrupt: Interrupt) -> Self {
        Throw::Interrupt(interrupt)
    }
}

/// Result of evaluating guest code
pub(crate) type EvalResult<T = Val> = Result<T, Throw>;

/* ===================== Limits ===================== */

/// Longest string, list or tuple a single guest operation may build
pub(crate) const MAX_SEQUENCE: usize = 1 << 24;

/// Deepest container nesting walked outside the interpreter's own
/// recursion accounting: host conversion, hashing and plain rendering
pub(crate) const MAX_NESTING: usize = 256;

/// Reject a result length past [`MAX_SEQUENCE`] before allocating it
pub(crate) fn check_length(len: usize) -> EvalResult<()> {
    if len > MAX_SEQUENCE {
        return Err(Throw::overflow("sequence is too long"));
    }
    Ok(())
}
