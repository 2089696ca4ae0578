//! Per-state engine data
//!
//! A [`Machine`] is everything one state's scripts can reach: the global
//! namespace, the import cache, registered modules, the class objects of
//! the built-in hierarchy, and the output sink. Executions borrow it
//! mutably, so one state runs one script at a time.

use super::bridge;
use super::builtins::exceptions::{build_classes, ExcType};
use super::builtins::functions::{exception_init, object_init};
use super::checkpoint::Checkpoint;
use super::control::Throw;
use super::executor::Interpreter;
use super::object::{new_scope, Args, Class, Module, Namespace, Scope, Val};
use super::{ExecResult, Program};
use crate::capability::CapabilitySet;
use crate::host::{HostModule, OutputSink};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Machine {
    pub globals: Scope,
    pub object: Arc<Class>,
    exceptions: HashMap<ExcType, Arc<Class>>,
    /// Import cache by dotted name
    pub modules: HashMap<String, Arc<Module>>,
    /// Host-registered guest source modules, compiled
    pub guest_modules: HashMap<String, Arc<Program>>,
    /// Host-registered native modules
    pub host_modules: HashMap<String, Arc<Module>>,
    pub output: Arc<dyn OutputSink>,
    /// Backs the `random` module
    pub rng: StdRng,
    pub recursion_limit: usize,
}

impl Machine {
    pub fn new(output: Arc<dyn OutputSink>, recursion_limit: usize) -> Self {
        let mut object_attrs = Namespace::new();
        object_attrs.insert(Arc::from("__init__"), Val::Native(object_init()));
        let object = Class::root("object", object_attrs);

        let exceptions = build_classes(&object);
        if let Some(base) = exceptions.get(&ExcType::BaseException) {
            base.attrs
                .lock()
                .insert(Arc::from("__init__"), Val::Native(exception_init()));
        }

        Self {
            globals: main_scope(),
            object,
            exceptions,
            modules: HashMap::new(),
            guest_modules: HashMap::new(),
            host_modules: HashMap::new(),
            output,
            rng: StdRng::from_entropy(),
            recursion_limit,
        }
    }

    /// Class object of a built-in exception
    pub fn exception_class(&self, ty: ExcType) -> Arc<Class> {
        self.exceptions
            .get(&ty)
            .cloned()
            .unwrap_or_else(|| self.object.clone())
    }

    /// Run a program against the global namespace
    pub fn execute(
        &mut self,
        program: &Program,
        caps: &CapabilitySet,
        checkpoint: &mut Checkpoint,
    ) -> ExecResult {
        let globals = self.globals.clone();
        let mut interp = Interpreter::new(self, caps, checkpoint);
        let result = interp.run_program(program, globals);
        finish(&mut interp, result)
    }

    /// Call a guest value with guest arguments
    pub fn call(
        &mut self,
        callee: &Val,
        args: Vec<Val>,
        caps: &CapabilitySet,
        checkpoint: &mut Checkpoint,
    ) -> ExecResult {
        let mut interp = Interpreter::new(self, caps, checkpoint);
        let result = interp.call(callee, Args::new(args)).map(Some);
        finish(&mut interp, result)
    }

    pub fn register_guest_module(&mut self, name: &str, program: Program) {
        self.modules.remove(name);
        self.guest_modules.insert(name.to_string(), Arc::new(program));
    }

    pub fn register_host_module(&mut self, module: &HostModule) {
        let globals = new_scope();
        {
            let mut scope = globals.lock();
            scope.insert(Arc::from("__name__"), Val::from(module.name()));
            for (name, value) in module.members() {
                scope.insert(Arc::from(name.as_str()), bridge::from_value(value));
            }
        }
        let name = module.name().to_string();
        self.modules.remove(&name);
        self.host_modules
            .insert(name.clone(), Module::new(&name, globals));
    }

    /// Attribute of an already imported module
    pub fn module_attr(&self, module: &str, attr: &str) -> Option<Val> {
        self.modules.get(module).and_then(|m| m.get(attr))
    }

    /// Drop a module and its submodules from the import cache
    pub fn evict_module(&mut self, name: &str) {
        let prefix = format!("{}.", name);
        self.modules
            .retain(|cached, _| cached != name && !cached.starts_with(&prefix));
    }

    /// Release everything scripts could reach
    pub fn clear(&mut self) {
        self.globals.lock().clear();
        self.modules.clear();
        self.guest_modules.clear();
        self.host_modules.clear();
    }
}

fn main_scope() -> Scope {
    let scope = new_scope();
    scope
        .lock()
        .insert(Arc::from("__name__"), Val::from("__main__"));
    scope
}

fn finish(interp: &mut Interpreter<'_>, result: Result<Option<Val>, Throw>) -> ExecResult {
    match result {
        Ok(value) => ExecResult::Completed(value),
        Err(Throw::Exception(raised)) => ExecResult::Raised(interp.to_runtime_error(*raised)),
        Err(Throw::Interrupt(interrupt)) => ExecResult::Interrupted(interrupt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OutputBuffer;
    use crate::interpreter::compile;

    fn machine() -> Machine {
        Machine::new(Arc::new(OutputBuffer::new()), 100)
    }

    #[test]
    fn test_exception_classes_derive_from_object() {
        let machine = machine();
        let value_error = machine.exception_class(ExcType::ValueError);
        assert!(value_error.is_subclass(&machine.object));
        assert!(value_error.lookup("__init__").is_some());
    }

    #[test]
    fn test_execute_accumulates_globals() {
        let mut machine = machine();
        let caps = CapabilitySet::none();
        let program = compile("x = 40\ndef bump(n):\n    return n + 2\n", "main").unwrap();
        let mut checkpoint = Checkpoint::unarmed();
        assert!(matches!(
            machine.execute(&program, &caps, &mut checkpoint),
            ExecResult::Completed(None)
        ));

        let bump = machine.globals.lock().get("bump").cloned().unwrap();
        match machine.call(&bump, vec![Val::Int(40)], &caps, &mut checkpoint) {
            ExecResult::Completed(Some(Val::Int(42))) => {}
            _ => panic!("expected 42"),
        }
    }

    #[test]
    fn test_evict_drops_submodules() {
        let mut machine = machine();
        for name in ["pkg", "pkg.sub", "pkgx"] {
            machine
                .modules
                .insert(name.to_string(), Module::new(name, new_scope()));
        }
        machine.evict_module("pkg");
        assert!(machine.modules.contains_key("pkgx"));
        assert_eq!(machine.modules.len(), 1);
    }
}
