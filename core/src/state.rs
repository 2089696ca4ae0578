//! Isolated interpreter states
//!
//! A [`State`] owns a global namespace, a capability set, registered host
//! callables and modules, and an open/closed flag. States share nothing
//! with each other; one state is used from one thread at a time (every
//! mutating method takes `&mut self`).
//!
//! # Example
//!
//! ```rust
//! use ember_core::State;
//! use std::time::Duration;
//!
//! let mut state = State::new();
//! state.set_global("n", 7)?;
//! state.run_with_timeout("result = n * n", Duration::from_millis(50))?;
//! assert_eq!(state.get_global("result")?.as_int(), Some(49));
//! # Ok::<(), ember_core::Error>(())
//! ```

use crate::capability::{Builtin, BuiltinGroup, CapabilityPolicy, CapabilitySet, StdModule};
use crate::code::Code;
use crate::config::{EmberConfig, DEFAULT_RECURSION_LIMIT, DEFAULT_STACK_SIZE};
use crate::controller::{ExecutionController, Outcome};
use crate::error::{CompileErrorSet, Error, ErrorKind, Result, RuntimeError};
use crate::host::{CallContext, Callable, HostModule, OutputSink, StdoutSink};
use crate::interpreter::bridge;
use crate::interpreter::machine::Machine;
use crate::interpreter::object::Val;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const RUN_NAME: &str = "<string>";
const EVAL_NAME: &str = "<eval>";

/* ===================== Builder ===================== */

/// Configures a [`State`] before it is created
pub struct StateBuilder {
    caps: CapabilitySet,
    recursion_limit: usize,
    stack_size: usize,
    default_timeout: Option<Duration>,
    output: Arc<dyn OutputSink>,
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self {
            caps: CapabilityPolicy::default().to_set(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            stack_size: DEFAULT_STACK_SIZE,
            default_timeout: None,
            output: Arc::new(StdoutSink),
        }
    }
}

impl StateBuilder {
    /// Start from the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every capability, including those of the default policy
    pub fn bare(mut self) -> Self {
        self.caps = CapabilitySet::none();
        self
    }

    /// Replace the capabilities with a policy
    pub fn policy(mut self, policy: &CapabilityPolicy) -> Self {
        self.caps = policy.to_set();
        self
    }

    pub fn module(mut self, module: StdModule) -> Self {
        self.caps.enable_module(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = StdModule>) -> Self {
        for module in modules {
            self.caps.enable_module(module);
        }
        self
    }

    pub fn all_modules(mut self) -> Self {
        self.caps.enable_all_modules();
        self
    }

    pub fn builtin(mut self, builtin: Builtin) -> Self {
        self.caps.enable_builtin(builtin);
        self
    }

    pub fn builtin_group(mut self, group: BuiltinGroup) -> Self {
        self.caps.enable_builtin_group(group);
        self
    }

    /// Maximum guest call depth
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Stack of the execution thread in bytes; `0` runs on the caller
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Timeout for `run`, `execute`, `eval` and `call` when none is given
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Where guest `print` writes
    pub fn output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.output = sink;
        self
    }

    pub fn build(self) -> State {
        let id = Uuid::new_v4();
        tracing::info!(
            state_id = %id,
            modules = ?self.caps.modules(),
            builtins = ?self.caps.builtins(),
            "state created"
        );
        State {
            id,
            inner: Some(Inner {
                machine: Machine::new(self.output, self.recursion_limit),
                caps: self.caps,
                stack_size: self.stack_size,
                default_timeout: self.default_timeout,
            }),
        }
    }
}

/* ===================== State ===================== */

struct Inner {
    machine: Machine,
    caps: CapabilitySet,
    stack_size: usize,
    default_timeout: Option<Duration>,
}

/// Limits for one execution
#[derive(Default)]
struct Limits {
    timeout: Option<Duration>,
    token: Option<CancellationToken>,
}

/// An isolated interpreter instance
pub struct State {
    id: Uuid,
    /// `None` once closed
    inner: Option<Inner>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// A state with the default capability policy
    pub fn new() -> Self {
        StateBuilder::new().build()
    }

    /// A state with no modules and no opt-in builtins
    pub fn bare() -> Self {
        StateBuilder::new().bare().build()
    }

    pub fn builder() -> StateBuilder {
        StateBuilder::new()
    }

    /// A state configured from an [`EmberConfig`]
    pub fn from_config(config: &EmberConfig) -> Self {
        let mut builder = StateBuilder::new()
            .recursion_limit(config.limits.recursion_limit)
            .stack_size(config.limits.stack_size)
            .default_timeout(config.limits.default_timeout());
        builder.caps = config.capabilities.to_set();
        builder.build()
    }

    /// Identifier used in log events
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release everything the state owns
    ///
    /// Values already handed to the host stay valid. Closing twice is a
    /// no-op.
    pub fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.machine.clear();
            tracing::info!(state_id = %self.id, "state closed");
        }
    }

    fn inner(&self) -> Result<&Inner> {
        self.inner.as_ref().ok_or(Error::StateClosed)
    }

    fn inner_mut(&mut self) -> Result<&mut Inner> {
        self.inner.as_mut().ok_or(Error::StateClosed)
    }

    /* ===================== Globals ===================== */

    pub fn set_global(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = bridge::from_value(&value.into());
        let inner = self.inner_mut()?;
        inner.machine.globals.lock().insert(Arc::from(name), value);
        Ok(())
    }

    /// A global's value, or `Value::None` when it is not bound
    pub fn get_global(&self, name: &str) -> Result<Value> {
        let inner = self.inner()?;
        let value = inner.machine.globals.lock().get(name).cloned();
        Ok(value.as_ref().map(bridge::to_value).unwrap_or(Value::None))
    }

    /// A snapshot of every global, skipping dunder names
    pub fn globals(&self) -> Result<HashMap<String, Value>> {
        let inner = self.inner()?;
        let entries: Vec<(String, Val)> = inner
            .machine
            .globals
            .lock()
            .iter()
            .filter(|(name, _)| !(name.starts_with("__") && name.ends_with("__")))
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Ok(entries
            .into_iter()
            .map(|(name, value)| (name, bridge::to_value(&value)))
            .collect())
    }

    /* ===================== Registration ===================== */

    /// Bind a host callable as a global
    pub fn register_callable(&mut self, name: &str, callable: Callable) -> Result<()> {
        self.set_global(name, Value::Callable(callable))
    }

    /// Bind a host closure as a global
    pub fn register_fn<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> std::result::Result<Option<Value>, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.register_callable(name, Callable::new(name, func))
    }

    /// Make guest source importable as `name` (dotted names allowed)
    ///
    /// Not subject to the module capability gate.
    pub fn register_guest_module(&mut self, name: &str, source: &str) -> Result<()> {
        let inner = self.inner_mut()?;
        let program = crate::interpreter::compile(source, name)
            .map_err(|diagnostics| CompileErrorSet::new(name, diagnostics))?;
        inner.machine.register_guest_module(name, program);
        tracing::debug!(module = name, "registered guest module");
        Ok(())
    }

    /// Make a native module importable; not capability gated
    pub fn register_host_module(&mut self, module: HostModule) -> Result<()> {
        let inner = self.inner_mut()?;
        inner.machine.register_host_module(&module);
        tracing::debug!(module = module.name(), "registered host module");
        Ok(())
    }

    /// Attribute of a module this state has imported
    ///
    /// `None` when the module was never imported or lacks the attribute.
    pub fn get_module_attr(&self, module: &str, attr: &str) -> Result<Option<Value>> {
        let inner = self.inner()?;
        Ok(inner
            .machine
            .module_attr(module, attr)
            .as_ref()
            .map(bridge::to_value))
    }

    /* ===================== Capabilities ===================== */

    pub fn enable_module(&mut self, module: StdModule) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        if inner.caps.enable_module(module) {
            tracing::debug!(state_id = %id, %module, "module enabled");
        }
        Ok(())
    }

    /// Disable a module and drop it from the import cache
    pub fn disable_module(&mut self, module: StdModule) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        if inner.caps.disable_module(module) {
            inner.machine.evict_module(module.name());
            tracing::debug!(state_id = %id, %module, "module disabled");
        }
        Ok(())
    }

    pub fn enable_all_modules(&mut self) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        inner.caps.enable_all_modules();
        tracing::debug!(state_id = %id, "all modules enabled");
        Ok(())
    }

    pub fn enable_builtin(&mut self, builtin: Builtin) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        if inner.caps.enable_builtin(builtin) {
            tracing::debug!(state_id = %id, %builtin, "builtin enabled");
        }
        Ok(())
    }

    pub fn enable_builtin_group(&mut self, group: BuiltinGroup) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        inner.caps.enable_builtin_group(group);
        tracing::debug!(state_id = %id, ?group, "builtin group enabled");
        Ok(())
    }

    pub fn disable_builtin(&mut self, builtin: Builtin) -> Result<()> {
        let id = self.id;
        let inner = self.inner_mut()?;
        if inner.caps.disable_builtin(builtin) {
            tracing::debug!(state_id = %id, %builtin, "builtin disabled");
        }
        Ok(())
    }

    /// False once closed
    pub fn is_module_enabled(&self, module: StdModule) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.caps.is_module_enabled(module))
    }

    /// False once closed
    pub fn is_builtin_enabled(&self, builtin: Builtin) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.caps.is_builtin_enabled(builtin))
    }

    /// Empty once closed
    pub fn enabled_modules(&self) -> Vec<StdModule> {
        self.inner
            .as_ref()
            .map(|inner| inner.caps.modules())
            .unwrap_or_default()
    }

    /// Empty once closed
    pub fn enabled_builtins(&self) -> Vec<Builtin> {
        self.inner
            .as_ref()
            .map(|inner| inner.caps.builtins())
            .unwrap_or_default()
    }

    /* ===================== Compile / Execute ===================== */

    /// Compile without touching the namespace
    pub fn compile(&self, source: &str, name: &str) -> Result<Code> {
        self.inner()?;
        Ok(Code::compile(source, name)?)
    }

    pub fn execute(&mut self, code: &Code) -> Result<()> {
        self.execute_code(code, Limits::default()).map(|_| ())
    }

    pub fn execute_with_timeout(&mut self, code: &Code, timeout: Duration) -> Result<()> {
        let limits = Limits {
            timeout: Some(timeout),
            token: None,
        };
        self.execute_code(code, limits).map(|_| ())
    }

    pub fn execute_with_cancellation(
        &mut self,
        code: &Code,
        token: &CancellationToken,
    ) -> Result<()> {
        let limits = Limits {
            timeout: None,
            token: Some(token.clone()),
        };
        self.execute_code(code, limits).map(|_| ())
    }

    /// Execute under a timeout and a cancellation token at once
    ///
    /// Whichever fires first ends the execution.
    pub fn execute_with_limits(
        &mut self,
        code: &Code,
        timeout: Option<Duration>,
        token: Option<&CancellationToken>,
    ) -> Result<()> {
        let limits = Limits {
            timeout,
            token: token.cloned(),
        };
        self.execute_code(code, limits).map(|_| ())
    }

    /// Execute under a caller-configured controller
    ///
    /// The controller's own timeout, token and stack size apply, and the
    /// outcome comes back unmapped. The controller keeps its final phase.
    pub fn execute_with(
        &mut self,
        controller: &mut ExecutionController,
        code: &Code,
    ) -> Result<Outcome> {
        let program = code.program();
        let id = self.id;
        let inner = self.inner_mut()?;
        tracing::debug!(state_id = %id, code = code.name(), "executing under controller");
        Ok(controller.run(&mut inner.machine, &inner.caps, |machine, caps, checkpoint| {
            machine.execute(program, caps, checkpoint)
        }))
    }

    /// Compile and execute in one step
    pub fn run(&mut self, source: &str) -> Result<()> {
        let code = self.compile(source, RUN_NAME)?;
        self.execute(&code)
    }

    pub fn run_with_timeout(&mut self, source: &str, timeout: Duration) -> Result<()> {
        let code = self.compile(source, RUN_NAME)?;
        self.execute_with_timeout(&code, timeout)
    }

    pub fn run_with_cancellation(&mut self, source: &str, token: &CancellationToken) -> Result<()> {
        let code = self.compile(source, RUN_NAME)?;
        self.execute_with_cancellation(&code, token)
    }

    /// Evaluate one expression against the globals
    pub fn eval(&mut self, expression: &str) -> Result<Value> {
        self.eval_with_limits(expression, None, None)
    }

    /// Evaluate one expression under a timeout and/or a cancellation token
    pub fn eval_with_limits(
        &mut self,
        expression: &str,
        timeout: Option<Duration>,
        token: Option<&CancellationToken>,
    ) -> Result<Value> {
        self.inner()?;
        let code = Code::compile_expression(expression, EVAL_NAME)?;
        let limits = Limits {
            timeout,
            token: token.cloned(),
        };
        let value = self.execute_code(&code, limits)?;
        Ok(value.unwrap_or(Value::None))
    }

    /// Call a callable bound to a global name
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let inner = self.inner()?;
        let callee = inner.machine.globals.lock().get(name).cloned();
        let Some(callee) = callee else {
            return Err(RuntimeError::new(
                ErrorKind::NameNotFound,
                format!("name '{}' is not defined", name),
            )
            .into());
        };
        let args: Vec<Val> = args.iter().map(bridge::from_value).collect();
        let value = self.drive(Limits::default(), move |machine, caps, checkpoint| {
            machine.call(&callee, args, caps, checkpoint)
        })?;
        Ok(value.unwrap_or(Value::None))
    }

    fn execute_code(&mut self, code: &Code, limits: Limits) -> Result<Option<Value>> {
        let program = code.program();
        tracing::debug!(state_id = %self.id, code = code.name(), "executing");
        self.drive(limits, |machine, caps, checkpoint| {
            machine.execute(program, caps, checkpoint)
        })
    }

    /// Run a job under the controller and map its outcome to a result
    fn drive<F>(&mut self, limits: Limits, job: F) -> Result<Option<Value>>
    where
        F: FnOnce(
                &mut Machine,
                &CapabilitySet,
                &mut crate::interpreter::checkpoint::Checkpoint,
            ) -> crate::interpreter::ExecResult
            + Send,
    {
        let inner = self.inner_mut()?;
        let timeout = limits.timeout.or(inner.default_timeout);
        let mut controller = ExecutionController::new()
            .stack_size(inner.stack_size)
            .timeout(timeout)
            .cancellation(limits.token);

        match controller.run(&mut inner.machine, &inner.caps, job) {
            Outcome::Completed(value) => Ok(value),
            Outcome::Failed(err) => Err(Error::Runtime(err)),
            Outcome::TimedOut => Err(Error::TimedOut {
                limit: timeout.unwrap_or_default(),
            }),
            Outcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_state_has_no_capabilities() {
        let state = State::bare();
        assert!(state.enabled_modules().is_empty());
        assert!(state.enabled_builtins().is_empty());
    }

    #[test]
    fn test_default_state_uses_curated_policy() {
        let state = State::new();
        assert!(state.is_module_enabled(StdModule::Math));
        assert!(!state.is_module_enabled(StdModule::Time));
        assert!(state.enabled_builtins().is_empty());
    }

    #[test]
    fn test_missing_global_reads_as_none() {
        let state = State::bare();
        assert_eq!(state.get_global("nothing").unwrap(), Value::None);
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let mut state = State::bare();
        state.set_global("x", 1).unwrap();
        state.close();
        state.close();
        assert!(state.is_closed());
        assert!(matches!(state.get_global("x"), Err(Error::StateClosed)));
        assert!(matches!(state.run("x = 2"), Err(Error::StateClosed)));
        assert!(matches!(state.compile("x", "x"), Err(Error::StateClosed)));
        assert!(matches!(
            state.enable_module(StdModule::Math),
            Err(Error::StateClosed)
        ));
    }

    #[test]
    fn test_from_config() {
        let mut config = EmberConfig::default();
        config.capabilities.modules = vec![StdModule::Time];
        config.limits.stack_size = 0;
        let state = State::from_config(&config);
        assert_eq!(state.enabled_modules(), vec![StdModule::Time]);
    }
}
