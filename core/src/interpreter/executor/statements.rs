//! Statement execution

use super::{Frame, FrameKind, Interpreter};
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{Control, EvalResult, Exc, Raised, Throw};
use crate::interpreter::object::{new_scope, Args, Class, Function, Module, Val};
use crate::interpreter::types::{Alias, ClassDef, ExceptHandler, Expr, Stmt};
use std::sync::Arc;

impl Interpreter<'_> {
    /// Execute statements until one of them transfers control
    pub(crate) fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<Control> {
        for stmt in body {
            let control = self.exec_stmt(stmt)?;
            if !matches!(control, Control::Next) {
                return Ok(control);
            }
        }
        Ok(Control::Next)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Control> {
        self.frame_mut().line = stmt.span().line();
        self.check_interrupt()?;

        match stmt {
            Stmt::Expr { expr, .. } => {
                self.eval(expr)?;
            }

            Stmt::Assign { targets, value, .. } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }

            Stmt::AugAssign {
                target, op, value, ..
            } => self.exec_aug_assign(target, *op, value)?,

            Stmt::If {
                test, body, orelse, ..
            } => {
                let test = self.eval(test)?;
                return if self.truthy(&test)? {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                };
            }

            Stmt::While { test, body, .. } => loop {
                let value = self.eval(test)?;
                if !self.truthy(&value)? {
                    break;
                }
                match self.exec_block(body)? {
                    Control::Break => break,
                    Control::Return(v) => return Ok(Control::Return(v)),
                    Control::Next | Control::Continue => {}
                }
            },

            Stmt::For {
                target, iter, body, ..
            } => {
                let iterable = self.eval(iter)?;
                let mut cursor = self.iterate(&iterable)?;
                while let Some(item) = self.next_item(&mut cursor)? {
                    self.assign(target, item)?;
                    match self.exec_block(body)? {
                        Control::Break => break,
                        Control::Return(v) => return Ok(Control::Return(v)),
                        Control::Next | Control::Continue => {}
                    }
                }
            }

            Stmt::Break { .. } => return Ok(Control::Break),
            Stmt::Continue { .. } => return Ok(Control::Continue),
            Stmt::Pass { .. } => {}

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Val::None,
                };
                return Ok(Control::Return(value));
            }

            Stmt::FunctionDef { def, .. } => {
                let function = self.make_function(def)?;
                self.store_name(&def.name, function)?;
            }

            Stmt::ClassDef { def, .. } => self.exec_class(def)?,

            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => return self.exec_try(body, handlers, orelse, finalbody),

            Stmt::Raise { exc, .. } => return Err(self.exec_raise(exc.as_ref())?),

            // Collected on the function definition by the parser
            Stmt::Global { .. } | Stmt::Nonlocal { .. } => {}

            Stmt::Import { names, .. } => {
                for alias in names {
                    self.exec_import(alias)?;
                }
            }

            Stmt::ImportFrom { module, names, .. } => self.exec_import_from(module, names)?,

            Stmt::Delete { targets, .. } => {
                for target in targets {
                    self.delete(target)?;
                }
            }

            Stmt::Assert { test, msg, .. } => {
                let value = self.eval(test)?;
                if !self.truthy(&value)? {
                    let args = match msg {
                        Some(msg) => vec![self.eval(msg)?],
                        None => Vec::new(),
                    };
                    return Err(Throw::with_args(ExcType::AssertionError, args));
                }
            }
        }
        Ok(Control::Next)
    }

    /* ===================== Assignment ===================== */

    pub(crate) fn assign(&mut self, target: &Expr, value: Val) -> EvalResult<()> {
        match target {
            Expr::Name { name, .. } => self.store_name(name, value),
            Expr::Attribute { object, name, .. } => {
                let object = self.eval(object)?;
                self.set_attr(&object, name, value)
            }
            Expr::Subscript { object, index, .. } => {
                let object = self.eval(object)?;
                if let Expr::Slice {
                    lower, upper, step, ..
                } = index.as_ref()
                {
                    let bounds = self.eval_slice_bounds(lower, upper, step)?;
                    return self.set_slice(&object, bounds, value);
                }
                let index = self.eval(index)?;
                self.set_item(&object, index, value)
            }
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                let items = self.collect(&value)?;
                if items.len() != elts.len() {
                    let message = if items.len() > elts.len() {
                        format!("too many values to unpack (expected {})", elts.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            elts.len(),
                            items.len()
                        )
                    };
                    return Err(Throw::value_error(message));
                }
                for (target, item) in elts.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
            other => Err(Throw::new(
                ExcType::SyntaxError,
                format!("cannot assign to {}", other.describe()),
            )),
        }
    }

    fn exec_aug_assign(
        &mut self,
        target: &Expr,
        op: crate::interpreter::types::BinaryOp,
        value: &Expr,
    ) -> EvalResult<()> {
        match target {
            Expr::Name { name, .. } => {
                let current = self.load_name(name)?;
                let rhs = self.eval(value)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.store_name(name, result)
            }
            Expr::Attribute { object, name, .. } => {
                let object = self.eval(object)?;
                let current = self.get_attr(&object, name)?;
                let rhs = self.eval(value)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.set_attr(&object, name, result)
            }
            Expr::Subscript { object, index, .. } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                let current = self.get_item(&object, &index)?;
                let rhs = self.eval(value)?;
                let result = self.inplace_op(op, current, rhs)?;
                self.set_item(&object, index, result)
            }
            other => Err(Throw::new(
                ExcType::SyntaxError,
                format!("'{}' is an illegal expression for augmented assignment", other.describe()),
            )),
        }
    }

    fn delete(&mut self, target: &Expr) -> EvalResult<()> {
        match target {
            Expr::Name { name, .. } => self.delete_name(name),
            Expr::Attribute { object, name, .. } => {
                let object = self.eval(object)?;
                self.del_attr(&object, name)
            }
            Expr::Subscript { object, index, .. } => {
                let object = self.eval(object)?;
                if let Expr::Slice {
                    lower, upper, step, ..
                } = index.as_ref()
                {
                    let bounds = self.eval_slice_bounds(lower, upper, step)?;
                    return self.del_slice(&object, bounds);
                }
                let index = self.eval(index)?;
                self.del_item(&object, &index)
            }
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                for elt in elts {
                    self.delete(elt)?;
                }
                Ok(())
            }
            other => Err(Throw::new(
                ExcType::SyntaxError,
                format!("cannot delete {}", other.describe()),
            )),
        }
    }

    /* ===================== Classes ===================== */

    fn exec_class(&mut self, def: &Arc<ClassDef>) -> EvalResult<()> {
        let mut bases = Vec::with_capacity(def.bases.len());
        for base in &def.bases {
            match self.eval(base)? {
                Val::Class(class) => bases.push(class),
                other => {
                    return Err(Throw::type_error(format!(
                        "bases must be classes, not '{}'",
                        other.type_name()
                    )))
                }
            }
        }
        if bases.is_empty() {
            bases.push(self.machine.object.clone());
        }

        let namespace = new_scope();
        let frame = {
            let outer = self.frame();
            Frame {
                kind: FrameKind::Class,
                globals: outer.globals.clone(),
                locals: Some(namespace.clone()),
                closure: outer.closure_for_child(),
                function: None,
                file: outer.file.clone(),
                name: Arc::from(def.name.as_str()),
                line: def.span.line(),
            }
        };
        self.with_frame(frame, |interp| interp.exec_block(&def.body))?;

        let attrs = std::mem::take(&mut *namespace.lock());
        let class = Class::new(&def.name, bases, attrs, None).map_err(Throw::type_error)?;
        for value in class.attrs.lock().values() {
            if let Val::Function(function) = value {
                set_owner(function, &class);
            }
        }
        self.store_name(&def.name, Val::Class(class))
    }

    /* ===================== Exceptions ===================== */

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
    ) -> EvalResult<Control> {
        let result = match self.exec_block(body) {
            Err(Throw::Exception(raised)) => self.handle(raised, handlers),
            Ok(Control::Next) => self.exec_block(orelse),
            other => other,
        };

        if finalbody.is_empty() || matches!(result, Err(Throw::Interrupt(_))) {
            return result;
        }
        match self.exec_block(finalbody)? {
            Control::Next => result,
            // return/break/continue in `finally` wins
            control => Ok(control),
        }
    }

    /// Run the first matching handler, or re-raise
    fn handle(&mut self, raised: Box<Raised>, handlers: &[ExceptHandler]) -> EvalResult<Control> {
        let Raised { exc, traceback } = *raised;
        let exc = self.materialize(exc);
        let class = match &exc {
            Val::Instance(instance) => instance.class.clone(),
            _ => return Err(Throw::object(exc)),
        };

        for handler in handlers {
            if let Some(kind) = &handler.kind {
                let kind = self.eval(kind)?;
                if !self.exception_matches(&class, &kind)? {
                    continue;
                }
            }

            if let Some(name) = &handler.name {
                self.store_name(name, exc.clone())?;
            }
            self.handling.push(Box::new(Raised {
                exc: Exc::Object(exc.clone()),
                traceback: traceback.clone(),
            }));
            let result = self.exec_block(&handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                // The name is unbound again after the handler; it may already be gone
                let _ = self.delete_name(name);
            }
            return result;
        }

        Err(Throw::Exception(Box::new(Raised {
            exc: Exc::Object(exc),
            traceback,
        })))
    }

    fn exception_matches(&mut self, class: &Arc<Class>, kind: &Val) -> EvalResult<bool> {
        match kind {
            Val::Class(expected) if expected.exception_type().is_some() => {
                Ok(class.is_subclass(expected))
            }
            Val::Tuple(kinds) => {
                for kind in kinds.iter() {
                    if self.exception_matches(class, kind)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Err(Throw::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            )),
        }
    }

    /// Build the exception a `raise` statement throws
    fn exec_raise(&mut self, exc: Option<&Expr>) -> EvalResult<Throw> {
        let Some(expr) = exc else {
            return Ok(match self.handling.last() {
                Some(raised) => Throw::Exception(raised.clone()),
                None => Throw::new(ExcType::RuntimeError, "No active exception to reraise"),
            });
        };

        match self.eval(expr)? {
            Val::Class(class) if class.exception_type().is_some() => {
                let instance = self.call(&Val::Class(class), Args::default())?;
                Ok(Throw::object(instance))
            }
            value @ Val::Instance(_) if is_exception(&value) => Ok(Throw::object(value)),
            _ => Ok(Throw::type_error("exceptions must derive from BaseException")),
        }
    }

    /* ===================== Imports ===================== */

    fn exec_import(&mut self, alias: &Alias) -> EvalResult<()> {
        let module = self.import_module(&alias.name)?;
        match &alias.asname {
            Some(asname) => self.store_name(asname, Val::Module(module)),
            None => {
                let top = alias.name.split('.').next().unwrap_or(&alias.name);
                let top = self.import_module(top)?;
                let name = top.name.to_string();
                self.store_name(&name, Val::Module(top))
            }
        }
    }

    fn exec_import_from(&mut self, module_name: &str, names: &[Alias]) -> EvalResult<()> {
        let module = self.import_module(module_name)?;

        if names.is_empty() {
            for (name, value) in public_names(&module) {
                self.store_name(&name, value)?;
            }
            return Ok(());
        }

        for alias in names {
            let value = match module.get(&alias.name) {
                Some(value) => value,
                None => {
                    let submodule = format!("{}.{}", module_name, alias.name);
                    match self.import_module(&submodule) {
                        Ok(sub) => Val::Module(sub),
                        Err(Throw::Interrupt(i)) => return Err(Throw::Interrupt(i)),
                        Err(_) => {
                            return Err(Throw::new(
                                ExcType::ImportError,
                                format!(
                                    "cannot import name '{}' from '{}'",
                                    alias.name, module_name
                                ),
                            ))
                        }
                    }
                }
            };
            let bound = alias.asname.as_deref().unwrap_or(&alias.name);
            self.store_name(bound, value)?;
        }
        Ok(())
    }

    /// Find, load and cache a module by dotted name
    pub(crate) fn import_module(&mut self, name: &str) -> EvalResult<Arc<Module>> {
        if let Some(module) = self.machine.modules.get(name) {
            return Ok(module.clone());
        }

        let parent = match name.rsplit_once('.') {
            Some((parent, _)) => Some(self.import_module(parent)?),
            None => None,
        };

        let module = self.load_module(name)?;
        if let Some(parent) = parent {
            let child = name.rsplit('.').next().unwrap_or(name);
            parent.set(child, Val::Module(module.clone()));
        }
        Ok(module)
    }

    fn load_module(&mut self, name: &str) -> EvalResult<Arc<Module>> {
        if let Some(module) = self.machine.host_modules.get(name) {
            let module = module.clone();
            self.machine.modules.insert(name.to_string(), module.clone());
            return Ok(module);
        }

        if let Some(program) = self.machine.guest_modules.get(name).cloned() {
            let globals = new_scope();
            globals
                .lock()
                .insert(Arc::from("__name__"), Val::from(name));
            let module = Module::new(name, globals.clone());
            self.machine.modules.insert(name.to_string(), module.clone());
            tracing::debug!(module = name, "executing guest module");
            if let Err(err) = self.run_program(&program, globals) {
                self.machine.modules.remove(name);
                return Err(err);
            }
            return Ok(module);
        }

        if self.caps.allows_module_named(name) {
            if let Some(module) = crate::interpreter::stdlib::load(name) {
                self.machine.modules.insert(name.to_string(), module.clone());
                return Ok(module);
            }
        }

        // A package that only exists because a submodule was registered
        let prefix = format!("{}.", name);
        let is_package = self
            .machine
            .guest_modules
            .keys()
            .chain(self.machine.host_modules.keys())
            .any(|registered| registered.starts_with(&prefix));
        if is_package {
            let globals = new_scope();
            globals
                .lock()
                .insert(Arc::from("__name__"), Val::from(name));
            let module = Module::new(name, globals);
            self.machine.modules.insert(name.to_string(), module.clone());
            return Ok(module);
        }

        Err(Throw::new(
            ExcType::ModuleNotFoundError,
            format!("No module named '{}'", name),
        ))
    }
}

fn set_owner(function: &Arc<Function>, class: &Arc<Class>) {
    *function.owner.lock() = Some(Arc::downgrade(class));
}

fn is_exception(value: &Val) -> bool {
    matches!(value, Val::Instance(instance) if instance.class.exception_type().is_some())
}

/// Names `from module import *` binds
fn public_names(module: &Module) -> Vec<(String, Val)> {
    let globals = module.globals.lock();
    if let Some(Val::List(all)) = globals.get("__all__") {
        let names: Vec<String> = all
            .lock()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        return names
            .into_iter()
            .filter_map(|name| globals.get(name.as_str()).map(|v| (name.clone(), v.clone())))
            .collect();
    }
    globals
        .iter()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
