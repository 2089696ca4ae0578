//! Host bridge: native callables, native modules and guest output
//!
//! A [`Callable`] is a host function scripts can call like any other. It
//! receives a [`CallContext`] for the running state plus the converted
//! arguments, and returns an optional result (`None` becomes the guest's
//! `None`). Returning `Err(RuntimeError)` raises a guest exception that
//! scripts can catch.

use crate::error::RuntimeError;
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/* ===================== Callables ===================== */

type HostFn =
    dyn Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>, RuntimeError> + Send + Sync;

/// A host function exposed to scripts
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<HostFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    /// A callable that does not need the calling state
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self::new(name, move |_ctx, args| func(args).map(Some))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.func)(ctx, args).map(|result| result.unwrap_or(Value::None))
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.func) as *const () as usize
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

/// Check the argument count of a host callable
pub fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), RuntimeError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(RuntimeError::type_error(format!(
            "{}() takes {} argument{} but {} were given",
            name,
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )))
    }
}

/* ===================== Call Context ===================== */

/// What a running state offers to host callables
pub(crate) trait HostAccess {
    fn get_global(&self, name: &str) -> Option<Value>;
    fn set_global(&mut self, name: &str, value: Value);
    fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RuntimeError>;
    fn is_interrupted(&self) -> bool;
}

/// Access to the calling state from inside a host callable
pub struct CallContext<'a> {
    access: &'a mut dyn HostAccess,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(access: &'a mut dyn HostAccess) -> Self {
        Self { access }
    }

    /// Read a global of the calling state; missing names are `None`
    pub fn get_global(&self, name: &str) -> Value {
        self.access.get_global(name).unwrap_or(Value::None)
    }

    pub fn set_global(&mut self, name: &str, value: impl Into<Value>) {
        self.access.set_global(name, value.into());
    }

    /// Call a script function (or any callable value) received from the script
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        self.access.call_value(callee, args)
    }

    /// True once the current execution's deadline passed or it was cancelled
    pub fn is_interrupted(&self) -> bool {
        self.access.is_interrupted()
    }
}

/* ===================== Native Modules ===================== */

/// A module assembled from host values, importable by scripts
#[derive(Debug, Clone, Default)]
pub struct HostModule {
    name: String,
    members: Vec<(String, Value)>,
}

impl HostModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a member value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a host function member
    pub fn function<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        let callable = Callable::new(name, func);
        self.with(name, callable)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.members.push((name, value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[(String, Value)] {
        &self.members
    }
}

/* ===================== Output ===================== */

/// Destination of the guest `print` builtin
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}

/// Writes to the process's standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        // A closed stdout is not the script's problem
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Collects guest output in memory
#[derive(Debug, Default, Clone)]
pub struct OutputBuffer(Arc<Mutex<String>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }

    /// Drain the buffer
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.lock())
    }
}

impl OutputSink for OutputBuffer {
    fn write(&self, text: &str) {
        self.0.lock().push_str(text);
    }
}
