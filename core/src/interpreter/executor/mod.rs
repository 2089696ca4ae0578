//! Tree-walking executor
//!
//! The executor walks the AST recursively. Statements finish with a
//! [`Control`] value; exceptions and host interrupts travel as the error
//! side of [`EvalResult`], so `?` unwinds them through every nesting level.
//!
//! One [`Interpreter`] lives for one execution. It borrows the [`Machine`]
//! (namespace, module cache, exception classes), the capability set and
//! the interruption checkpoint, and keeps the stack of active frames.

mod attributes;
mod calls;
mod expressions;
pub(crate) mod format;
mod operators;
mod sequences;
mod statements;

#[cfg(test)]
mod tests;

use super::bridge;
use super::builtins::{self, exceptions::ExcType};
use super::checkpoint::Checkpoint;
use super::control::{EvalResult, Exc, Raised, Throw};
use super::machine::Machine;
use super::object::{Args, Function, Instance, Scope, Val};
use super::Program;
use crate::capability::CapabilitySet;
use crate::error::{ErrorKind, RuntimeError, TraceEntry};
use crate::host::HostAccess;
use crate::value::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/* ===================== Frames ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Module,
    Function,
    Class,
}

/// One activation: module code, a function call or a class body
#[derive(Clone)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    pub globals: Scope,
    /// Function locals or the class namespace; module frames use `globals`
    pub locals: Option<Scope>,
    /// Enclosing function scopes, innermost last
    pub closure: Vec<Scope>,
    pub function: Option<Arc<Function>>,
    pub file: Arc<str>,
    pub name: Arc<str>,
    /// Line of the statement being executed
    pub line: usize,
}

impl Frame {
    pub fn module(globals: Scope, file: Arc<str>) -> Self {
        Self {
            kind: FrameKind::Module,
            globals,
            locals: None,
            closure: Vec::new(),
            function: None,
            file,
            name: Arc::from("<module>"),
            line: 1,
        }
    }

    /// The scope plain assignments write to
    pub fn local_scope(&self) -> &Scope {
        self.locals.as_ref().unwrap_or(&self.globals)
    }

    /// Scopes a function defined in this frame closes over
    pub fn closure_for_child(&self) -> Vec<Scope> {
        let mut closure = self.closure.clone();
        if self.kind == FrameKind::Function {
            if let Some(locals) = &self.locals {
                closure.push(locals.clone());
            }
        }
        closure
    }

    fn trace_entry(&self) -> TraceEntry {
        TraceEntry {
            file: self.file.to_string(),
            function: self.name.to_string(),
            line: self.line,
        }
    }
}

/* ===================== Interpreter ===================== */

pub(crate) struct Interpreter<'a> {
    pub machine: &'a mut Machine,
    pub caps: &'a CapabilitySet,
    checkpoint: &'a mut Checkpoint,
    /// Guest call depth
    depth: usize,
    /// Exceptions being handled, innermost last, for bare `raise`
    handling: Vec<Box<Raised>>,
    /// Active frames, innermost last
    stack: Vec<Frame>,
    /// Frame used when the host calls in with no guest code running
    base: Frame,
    /// Containers being rendered by `repr`, for cycle detection
    rendering: Vec<usize>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        machine: &'a mut Machine,
        caps: &'a CapabilitySet,
        checkpoint: &'a mut Checkpoint,
    ) -> Self {
        let base = Frame::module(machine.globals.clone(), Arc::from("<host>"));
        Self {
            machine,
            caps,
            checkpoint,
            depth: 0,
            handling: Vec::new(),
            stack: Vec::new(),
            base,
            rendering: Vec::new(),
        }
    }

    /// Poll the interruption checkpoint
    pub fn check_interrupt(&mut self) -> EvalResult<()> {
        self.checkpoint.check().map_err(Throw::Interrupt)
    }

    /// Run `f` one level deeper in the guest recursion count
    ///
    /// Native walks over nested containers (comparison, `repr`) share the
    /// limit with guest calls, so a deep or cyclic structure raises
    /// `RecursionError` instead of exhausting the native stack.
    pub(crate) fn descend<T>(
        &mut self,
        context: &str,
        f: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        if self.depth >= self.machine.recursion_limit {
            return Err(Throw::new(
                ExcType::RecursionError,
                format!("maximum recursion depth exceeded {}", context),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Sleep in short slices so deadlines and cancellation stay responsive
    pub fn sleep(&mut self, duration: Duration) -> EvalResult<()> {
        let until = Instant::now() + duration;
        loop {
            self.check_interrupt()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep((until - now).min(SLEEP_SLICE));
        }
    }

    pub(crate) fn frame(&self) -> &Frame {
        self.stack.last().unwrap_or(&self.base)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(frame) => frame,
            None => &mut self.base,
        }
    }

    /// Run `body` inside `frame`, recording the frame in the traceback of
    /// any exception that escapes it
    pub(crate) fn with_frame<T>(
        &mut self,
        frame: Frame,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.stack.push(frame);
        let result = body(self);
        let frame = self.stack.pop();
        match result {
            Err(Throw::Exception(mut raised)) => {
                if let Some(frame) = frame {
                    raised.traceback.push(frame.trace_entry());
                }
                Err(Throw::Exception(raised))
            }
            other => other,
        }
    }

    /// Execute a compiled program against `globals`
    pub fn run_program(&mut self, program: &Program, globals: Scope) -> EvalResult<Option<Val>> {
        let frame = Frame::module(globals, program.name.clone());
        self.with_frame(frame, |interp| {
            if let Some(expr) = program.expression() {
                interp.frame_mut().line = expr.span().line();
                return interp.eval(expr).map(Some);
            }
            interp.exec_block(&program.body)?;
            Ok(None)
        })
    }

    /* ===================== Names ===================== */

    /// Builtins visible to this execution
    pub(crate) fn builtin(&self, name: &str) -> Option<Val> {
        builtins::lookup(name, self.caps).or_else(|| {
            if name == "object" {
                return Some(Val::Class(self.machine.object.clone()));
            }
            ExcType::from_name(name).map(|ty| Val::Class(self.machine.exception_class(ty)))
        })
    }

    pub(crate) fn load_name(&self, name: &str) -> EvalResult {
        let frame = self.frame();
        let global_only = frame
            .function
            .as_ref()
            .is_some_and(|f| f.def.declares_global(name));

        if !global_only {
            if let Some(locals) = &frame.locals {
                if let Some(v) = locals.lock().get(name) {
                    return Ok(v.clone());
                }
            }
            for scope in frame.closure.iter().rev() {
                if let Some(v) = scope.lock().get(name) {
                    return Ok(v.clone());
                }
            }
        }
        if let Some(v) = frame.globals.lock().get(name) {
            return Ok(v.clone());
        }
        self.builtin(name).ok_or_else(|| Throw::name_error(name))
    }

    /// The scope an assignment to `name` writes to
    fn binding_scope(&self, name: &str) -> EvalResult<Scope> {
        let frame = self.frame();
        if let Some(function) = &frame.function {
            if function.def.declares_global(name) {
                return Ok(frame.globals.clone());
            }
            if function.def.declares_nonlocal(name) {
                return frame
                    .closure
                    .iter()
                    .rev()
                    .find(|scope| scope.lock().contains_key(name))
                    .cloned()
                    .ok_or_else(|| {
                        Throw::new(
                            ExcType::NameError,
                            format!("no binding for nonlocal '{}' found", name),
                        )
                    });
            }
        }
        Ok(frame.local_scope().clone())
    }

    pub(crate) fn store_name(&mut self, name: &str, value: Val) -> EvalResult<()> {
        let scope = self.binding_scope(name)?;
        scope.lock().insert(Arc::from(name), value);
        Ok(())
    }

    pub(crate) fn delete_name(&mut self, name: &str) -> EvalResult<()> {
        let scope = self.binding_scope(name)?;
        let removed = scope.lock().remove(name);
        removed.map(|_| ()).ok_or_else(|| Throw::name_error(name))
    }

    /* ===================== Exceptions ===================== */

    /// Create a built-in exception instance
    pub(crate) fn new_exception(&self, ty: ExcType, args: Vec<Val>) -> Val {
        let instance = Instance::new(self.machine.exception_class(ty));
        instance
            .attrs
            .lock()
            .insert(Arc::from("args"), Val::tuple(args));
        Val::Instance(instance)
    }

    /// Turn an exception in flight into an instance
    pub(crate) fn materialize(&self, exc: Exc) -> Val {
        match exc {
            Exc::Object(val) => val,
            Exc::Pending { ty, args } => self.new_exception(ty, args),
        }
    }

    /// `str(exc)`
    pub(crate) fn exception_message(&mut self, exc: &Val) -> EvalResult<String> {
        let Val::Instance(instance) = exc else {
            return self.to_str(exc);
        };
        if let Some(method @ Val::Function(_)) = instance.class.lookup("__str__") {
            let text = self.call(&method, Args::new(vec![exc.clone()]))?;
            return self.to_str(&text);
        }
        let args = instance.attrs.lock().get("args").cloned();
        match args {
            Some(Val::Tuple(items)) => match items.len() {
                0 => Ok(String::new()),
                1 if instance.class.exception_type() == Some(ExcType::KeyError) => {
                    self.repr(&items[0])
                }
                1 => self.to_str(&items[0]),
                _ => self.repr(&Val::Tuple(items)),
            },
            Some(other) => self.to_str(&other),
            None => Ok(String::new()),
        }
    }

    /// Host-facing form of an exception that escaped every handler
    pub(crate) fn to_runtime_error(&mut self, raised: Raised) -> RuntimeError {
        let exc = self.materialize(raised.exc);
        let (exception, kind) = match &exc {
            Val::Instance(instance) => (
                instance.class.name.to_string(),
                instance
                    .class
                    .exception_type()
                    .map(ExcType::kind)
                    .unwrap_or(ErrorKind::Other),
            ),
            other => (other.type_name(), ErrorKind::Other),
        };
        let message = self.exception_message(&exc).unwrap_or_default();
        let mut traceback = raised.traceback;
        traceback.reverse();
        RuntimeError {
            kind,
            exception,
            message,
            traceback,
        }
    }

    /// Guest exception for an error returned by a host callable
    pub(crate) fn host_error(&self, err: RuntimeError) -> Throw {
        let ty = ExcType::from_name(&err.exception)
            .or_else(|| ExcType::from_name(err.kind.exception_name()))
            .unwrap_or(ExcType::RuntimeError);
        Throw::new(ty, err.message)
    }
}

/* ===================== Host Access ===================== */

impl HostAccess for Interpreter<'_> {
    fn get_global(&self, name: &str) -> Option<Value> {
        self.machine.globals.lock().get(name).map(bridge::to_value)
    }

    fn set_global(&mut self, name: &str, value: Value) {
        let value = bridge::from_value(&value);
        self.machine.globals.lock().insert(Arc::from(name), value);
    }

    fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let callee = bridge::from_value(callee);
        let args = args.iter().map(bridge::from_value).collect();
        match self.call(&callee, Args::new(args)) {
            Ok(result) => Ok(bridge::to_value(&result)),
            Err(Throw::Exception(raised)) => Err(self.to_runtime_error(*raised)),
            Err(Throw::Interrupt(_)) => Err(RuntimeError::other("execution interrupted")),
        }
    }

    fn is_interrupted(&self) -> bool {
        self.checkpoint.poll().is_some()
    }
}
