//! Calling functions, methods, classes and host callables

use super::{Frame, FrameKind, Interpreter};
use crate::interpreter::bridge::{self, ToHost};
use crate::interpreter::builtins::{self, exceptions::ExcType};
use crate::interpreter::control::{Control, EvalResult, Throw};
use crate::interpreter::object::{
    Args, Class, DictMap, Function, Instance, Method, Namespace, Scope, Val,
};
use crate::interpreter::types::{FunctionDef, Param};
use crate::host::{CallContext, Callable};
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

impl Interpreter<'_> {
    pub(crate) fn call(&mut self, callee: &Val, args: Args) -> EvalResult {
        self.check_interrupt()?;
        match callee {
            Val::Function(function) => self.call_function(function, args),
            Val::Native(native) => (native.call)(self, args),
            Val::Method(method) => match method.as_ref() {
                Method::Bound { receiver, func } => {
                    self.call(func, args.with_receiver(receiver.clone()))
                }
                Method::Native { receiver, func } => {
                    (func.call)(self, args.with_receiver(receiver.clone()))
                }
            },
            Val::Class(class) => self.instantiate(class, args),
            Val::Type(ty) => builtins::construct(self, *ty, args),
            Val::Host(callable) => self.call_host(callable, args),
            Val::Instance(instance) => match instance.class.lookup("__call__") {
                Some(method) => self.call(&method, args.with_receiver(callee.clone())),
                None => Err(not_callable(callee)),
            },
            other => Err(not_callable(other)),
        }
    }

    /// Create a function object for a `def` or `lambda` in the current frame
    pub(crate) fn make_function(&mut self, def: &Arc<FunctionDef>) -> EvalResult {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }
        let mut kwdefaults = Vec::with_capacity(def.kwonly.len());
        for param in &def.kwonly {
            kwdefaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }

        let frame = self.frame();
        Ok(Val::Function(Arc::new(Function {
            def: def.clone(),
            defaults,
            kwdefaults,
            globals: frame.globals.clone(),
            closure: frame.closure_for_child(),
            file: frame.file.clone(),
            owner: Mutex::new(None),
        })))
    }

    fn call_function(&mut self, function: &Arc<Function>, args: Args) -> EvalResult {
        if self.depth >= self.machine.recursion_limit {
            return Err(Throw::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        let locals = bind_arguments(function, args)?;
        let frame = Frame {
            kind: FrameKind::Function,
            globals: function.globals.clone(),
            locals: Some(locals),
            closure: function.closure.clone(),
            function: Some(function.clone()),
            file: function.file.clone(),
            name: Arc::from(function.def.name.as_str()),
            line: function.def.span.line(),
        };

        self.depth += 1;
        let result = self.with_frame(frame, |interp| interp.exec_block(&function.def.body));
        self.depth -= 1;

        match result? {
            Control::Return(value) => Ok(value),
            _ => Ok(Val::None),
        }
    }

    fn instantiate(&mut self, class: &Arc<Class>, args: Args) -> EvalResult {
        let instance = Instance::new(class.clone());
        if class.exception_type().is_some() {
            instance
                .attrs
                .lock()
                .insert(Arc::from("args"), Val::tuple(args.positional.clone()));
        }
        let instance = Val::Instance(instance);

        if let Some(init) = class.lookup("__init__") {
            let result = self.call(&init, args.with_receiver(instance.clone()))?;
            if !matches!(result, Val::None) {
                return Err(Throw::type_error(format!(
                    "__init__() should return None, not '{}'",
                    result.type_name()
                )));
            }
        }
        Ok(instance)
    }

    fn call_host(&mut self, callable: &Callable, args: Args) -> EvalResult {
        if let Some((key, _)) = args.keywords.first() {
            return Err(Throw::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                callable.name(),
                key
            )));
        }

        let mut to_host = ToHost::new();
        let host_args: Vec<Value> = args.positional.iter().map(|a| to_host.convert(a)).collect();
        let result = {
            let mut ctx = CallContext::new(self);
            callable.call(&mut ctx, &host_args)
        };
        // The callable may have run past the deadline
        self.check_interrupt()?;

        match result {
            Ok(value) => Ok(bridge::from_value(&value)),
            Err(err) => Err(self.host_error(err)),
        }
    }
}

fn not_callable(value: &Val) -> Throw {
    Throw::type_error(format!("'{}' object is not callable", value.type_name()))
}

/* ===================== Argument Binding ===================== */

/// Bind call arguments to a function's parameters
fn bind_arguments(function: &Function, args: Args) -> EvalResult<Scope> {
    let def = &function.def;
    let name = def.name.as_str();
    let Args {
        positional,
        keywords,
    } = args;

    let mut slots: Vec<Option<Val>> = vec![None; def.params.len()];
    let mut extra = Vec::new();
    for (i, value) in positional.into_iter().enumerate() {
        match slots.get_mut(i) {
            Some(slot) => *slot = Some(value),
            None => extra.push(value),
        }
    }
    if !extra.is_empty() && def.vararg.is_none() {
        return Err(too_many_positional(function, def.params.len() + extra.len()));
    }

    let mut kwonly: Vec<Option<Val>> = vec![None; def.kwonly.len()];
    let mut kwargs = DictMap::new();
    for (key, value) in keywords {
        let slot = match def.params.iter().position(|p| *p.name == *key) {
            Some(i) => Some(&mut slots[i]),
            None => def
                .kwonly
                .iter()
                .position(|p| *p.name == *key)
                .map(|i| &mut kwonly[i]),
        };
        match slot {
            Some(slot) if slot.is_some() => {
                return Err(Throw::type_error(format!(
                    "{}() got multiple values for argument '{}'",
                    name, key
                )))
            }
            Some(slot) => *slot = Some(value),
            None if def.kwarg.is_some() => {
                let key = Val::Str(key);
                kwargs.insert(key.hash_key()?, (key, value));
            }
            None => {
                return Err(Throw::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    name, key
                )))
            }
        }
    }

    let missing = fill_defaults(&mut slots, &function.defaults, &def.params);
    if !missing.is_empty() {
        return Err(missing_arguments(name, &missing, "positional"));
    }
    let missing = fill_defaults(&mut kwonly, &function.kwdefaults, &def.kwonly);
    if !missing.is_empty() {
        return Err(missing_arguments(name, &missing, "keyword-only"));
    }

    let mut locals = Namespace::new();
    for (param, value) in def.params.iter().zip(slots) {
        locals.insert(Arc::from(param.name.as_str()), value.unwrap_or_default());
    }
    if let Some(vararg) = &def.vararg {
        locals.insert(Arc::from(vararg.as_str()), Val::tuple(extra));
    }
    for (param, value) in def.kwonly.iter().zip(kwonly) {
        locals.insert(Arc::from(param.name.as_str()), value.unwrap_or_default());
    }
    if let Some(kwarg) = &def.kwarg {
        locals.insert(Arc::from(kwarg.as_str()), Val::dict(kwargs));
    }
    Ok(Arc::new(Mutex::new(locals)))
}

/// Fill empty slots from defaults, returning the names still missing
fn fill_defaults(
    slots: &mut [Option<Val>],
    defaults: &[Option<Val>],
    params: &[Param],
) -> Vec<String> {
    let mut missing = Vec::new();
    for (i, slot) in slots.iter_mut().enumerate() {
        if slot.is_none() {
            match defaults.get(i).cloned().flatten() {
                Some(default) => *slot = Some(default),
                None => missing.push(params[i].name.clone()),
            }
        }
    }
    missing
}

fn too_many_positional(function: &Function, given: usize) -> Throw {
    let total = function.def.params.len();
    let required = function.defaults.iter().filter(|d| d.is_none()).count();
    let takes = if required == total {
        total.to_string()
    } else {
        format!("from {} to {}", required, total)
    };
    Throw::type_error(format!(
        "{}() takes {} positional argument{} but {} {} given",
        function.def.name,
        takes,
        if total == 1 { "" } else { "s" },
        given,
        if given == 1 { "was" } else { "were" }
    ))
}

fn missing_arguments(name: &str, missing: &[String], kind: &str) -> Throw {
    let quoted: Vec<String> = missing.iter().map(|m| format!("'{}'", m)).collect();
    let list = match quoted.as_slice() {
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
        [] => String::new(),
    };
    Throw::type_error(format!(
        "{}() missing {} required {} argument{}: {}",
        name,
        missing.len(),
        kind,
        if missing.len() == 1 { "" } else { "s" },
        list
    ))
}
