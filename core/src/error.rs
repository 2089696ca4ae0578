//! Error taxonomy surfaced to the host
//!
//! Three outcomes are kept apart so a host can tell them apart without
//! string matching:
//!
//! - [`CompileErrorSet`]: every diagnostic from one failed compile
//! - [`RuntimeError`]: one guest exception that escaped all guest handlers
//! - [`Error::TimedOut`] / [`Error::Cancelled`]: the host stopped the script
//!
//! [`Error`] wraps all of them together with misuse of a closed state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/* ===================== Diagnostics ===================== */

/// Severity of a compile diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Compilation fails
    Error,
    /// Reported alongside a successful compile
    Warning,
}

/// One structured compile diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct Diagnostic {
    /// Line number (1-based)
    pub line: usize,
    /// Column number in characters (1-based)
    pub column: usize,
    /// Human-readable message
    pub message: String,
    /// Which pass or rule produced it (e.g. `syntax`, `break-outside-loop`)
    pub rule: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(line: usize, column: usize, message: impl Into<String>, rule: &str) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            rule: rule.to_string(),
            severity: Severity::Error,
        }
    }

    pub fn warning(line: usize, column: usize, message: impl Into<String>, rule: &str) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            rule: rule.to_string(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// All diagnostics from one failed compile
///
/// Never empty. Diagnostics are ordered by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrorSet {
    name: String,
    diagnostics: Vec<Diagnostic>,
}

impl CompileErrorSet {
    /// Build a set from a non-empty list of diagnostics.
    ///
    /// An empty list is replaced with a single generic diagnostic so the
    /// set always has a representative.
    pub fn new(name: impl Into<String>, mut diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::error(1, 1, "compilation failed", "syntax"));
        }
        diagnostics.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));
        Self {
            name: name.into(),
            diagnostics,
        }
    }

    /// Diagnostic name of the source (e.g. a file label)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The representative diagnostic (the earliest one)
    pub fn first(&self) -> &Diagnostic {
        &self.diagnostics[0]
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

impl fmt::Display for CompileErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}:{}:{}: {}", self.name, d.line, d.column, d.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrorSet {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.first())
    }
}

/* ===================== Runtime Errors ===================== */

/// Host-facing classification of a guest exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ZeroDivision,
    NameNotFound,
    TypeMismatch,
    IndexOutOfRange,
    KeyNotFound,
    ValueInvalid,
    AttributeMissing,
    /// Any other guest-raised exception
    Other,
}

impl ErrorKind {
    /// Guest exception class used when the host raises this kind
    pub fn exception_name(self) -> &'static str {
        match self {
            ErrorKind::ZeroDivision => "ZeroDivisionError",
            ErrorKind::NameNotFound => "NameError",
            ErrorKind::TypeMismatch => "TypeError",
            ErrorKind::IndexOutOfRange => "IndexError",
            ErrorKind::KeyNotFound => "KeyError",
            ErrorKind::ValueInvalid => "ValueError",
            ErrorKind::AttributeMissing => "AttributeError",
            ErrorKind::Other => "RuntimeError",
        }
    }
}

/// One frame of a guest traceback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Diagnostic name of the code the frame belongs to
    pub file: String,
    /// Function name, or `<module>` for top-level code
    pub function: String,
    /// Line number (1-based)
    pub line: usize,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}", self.file, self.line, self.function)
    }
}

/// A guest exception that escaped every guest-level handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{exception}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    /// Guest class name, e.g. `ZeroDivisionError` or a user-defined class
    pub exception: String,
    /// Rendered exception message
    pub message: String,
    /// Frames the exception travelled through, outermost first
    pub traceback: Vec<TraceEntry>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exception: kind.exception_name().to_string(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Raise a specific guest exception class by name.
    ///
    /// Names that are not built-in exception classes fall back to the class
    /// implied by `kind`.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = exception.into();
        self
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueInvalid, message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyNotFound, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexOutOfRange, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Innermost frame, where the exception was raised
    pub fn location(&self) -> Option<&TraceEntry> {
        self.traceback.last()
    }

    /// Line where the exception was raised, if known
    pub fn line(&self) -> Option<usize> {
        self.location().map(|t| t.line)
    }

    /// Render the exception together with its traceback
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.traceback.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for entry in &self.traceback {
                out.push_str(&format!(
                    "  File \"{}\", line {}, in {}\n",
                    entry.file, entry.line, entry.function
                ));
            }
        }
        out.push_str(&self.to_string());
        out
    }
}

/* ===================== Top-Level Error ===================== */

/// Every failure the embedding API can report
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source did not compile
    #[error(transparent)]
    Compile(#[from] CompileErrorSet),

    /// Guest code raised an unhandled exception
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The deadline passed before execution finished
    #[error("execution timed out after {}ms", .limit.as_millis())]
    TimedOut { limit: Duration },

    /// The cancellation token fired before execution finished
    #[error("execution was cancelled")]
    Cancelled,

    /// The state was closed before the call
    #[error("state is closed")]
    StateClosed,

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True when the host stopped the script (timeout or cancellation)
    pub fn is_interrupted(&self) -> bool {
        self.is_timeout() || self.is_cancelled()
    }

    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_compile(&self) -> Option<&CompileErrorSet> {
        match self {
            Error::Compile(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
