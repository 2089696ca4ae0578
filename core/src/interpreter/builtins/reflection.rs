//! Opt-in reflection and dynamic execution builtins

use super::exceptions::ExcType;
use super::methods;
use crate::error::Diagnostic;
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::{Frame, Interpreter};
use crate::interpreter::object::{new_scope, Args, DictMap, HashKey, Namespace, NativeFn, Scope, Val};
use crate::interpreter::{compile, compile_expression};
use std::collections::BTreeSet;
use std::sync::Arc;

const DYNAMIC_SOURCE: &str = "<string>";

pub(super) fn lookup(name: &str) -> Option<&'static NativeFn> {
    Some(match name {
        "getattr" => native!("getattr", getattr),
        "setattr" => native!("setattr", setattr),
        "hasattr" => native!("hasattr", hasattr),
        "delattr" => native!("delattr", delattr),
        "dir" => native!("dir", dir),
        "vars" => native!("vars", vars),
        "globals" => native!("globals", globals),
        "locals" => native!("locals", locals),
        "eval" => native!("eval", eval),
        "exec" => native!("exec", exec),
        _ => return None,
    })
}

fn attr_name<'v>(value: &'v Val) -> EvalResult<&'v str> {
    value.as_str().ok_or_else(|| {
        Throw::type_error(format!(
            "attribute name must be string, not '{}'",
            value.type_name()
        ))
    })
}

/* ===================== Attributes ===================== */

fn getattr(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("getattr", 2, 3)?;
    let name = attr_name(&args.positional[1])?;
    match interp.get_attr(&args.positional[0], name) {
        Err(err) if args.len() == 3 && err_is(&err, ExcType::AttributeError) => {
            Ok(args.positional[2].clone())
        }
        other => other,
    }
}

fn hasattr(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("hasattr", 2, 2)?;
    let name = attr_name(&args.positional[1])?;
    match interp.get_attr(&args.positional[0], name) {
        Ok(_) => Ok(Val::Bool(true)),
        Err(err) if err_is(&err, ExcType::AttributeError) => Ok(Val::Bool(false)),
        Err(err) => Err(err),
    }
}

fn setattr(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("setattr", 3, 3)?;
    let name = attr_name(&args.positional[1])?;
    interp.set_attr(&args.positional[0], name, args.positional[2].clone())?;
    Ok(Val::None)
}

fn delattr(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("delattr", 2, 2)?;
    let name = attr_name(&args.positional[1])?;
    interp.del_attr(&args.positional[0], name)?;
    Ok(Val::None)
}

/// Whether a pending or raised exception is (a subclass of) `ty`
fn err_is(err: &Throw, ty: ExcType) -> bool {
    use crate::interpreter::control::Exc;
    let Throw::Exception(raised) = err else {
        return false;
    };
    let mut found = match &raised.exc {
        Exc::Pending { ty, .. } => Some(*ty),
        Exc::Object(Val::Instance(instance)) => instance.class.exception_type(),
        Exc::Object(_) => None,
    };
    while let Some(current) = found {
        if current == ty {
            return true;
        }
        found = current.parent();
    }
    false
}

/* ===================== Namespaces ===================== */

fn dir(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("dir", 0, 1)?;
    let mut names = BTreeSet::new();
    match args.get(0) {
        None => {
            let scope = interp.frame().local_scope().clone();
            names.extend(scope.lock().keys().map(|k| k.to_string()));
        }
        Some(Val::Instance(instance)) => {
            names.extend(instance.attrs.lock().keys().map(|k| k.to_string()));
            for class in instance.class.mro_with_self() {
                names.extend(class.attrs.lock().keys().map(|k| k.to_string()));
            }
        }
        Some(Val::Class(class)) => {
            for class in class.mro_with_self() {
                names.extend(class.attrs.lock().keys().map(|k| k.to_string()));
            }
        }
        Some(Val::Module(module)) => {
            names.extend(module.globals.lock().keys().map(|k| k.to_string()));
        }
        Some(Val::Type(ty)) => names.extend(methods::names(*ty).iter().map(|n| n.to_string())),
        Some(other) => {
            names.extend(methods::names(other.builtin_type()).iter().map(|n| n.to_string()))
        }
    }
    Ok(Val::list(names.into_iter().map(Val::from).collect()))
}

/// A dict copy of a namespace
fn snapshot(namespace: &Namespace) -> Val {
    let map: DictMap = namespace
        .iter()
        .map(|(k, v)| (HashKey::Str(k.clone()), (Val::Str(k.clone()), v.clone())))
        .collect();
    Val::dict(map)
}

fn vars(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("vars", 0, 1)?;
    match args.get(0) {
        None => Ok(snapshot(&interp.frame().local_scope().lock())),
        Some(Val::Module(module)) => Ok(snapshot(&module.globals.lock())),
        Some(Val::Instance(instance)) => Ok(snapshot(&instance.attrs.lock())),
        Some(Val::Class(class)) => Ok(snapshot(&class.attrs.lock())),
        Some(_) => Err(Throw::type_error(
            "vars() argument must have __dict__ attribute",
        )),
    }
}

fn globals(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("globals", 0, 0)?;
    Ok(snapshot(&interp.frame().globals.lock()))
}

fn locals(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("locals", 0, 0)?;
    Ok(snapshot(&interp.frame().local_scope().lock()))
}

/* ===================== Dynamic Execution ===================== */

fn syntax_error(diagnostics: Vec<Diagnostic>) -> Throw {
    let message = match diagnostics.first() {
        Some(d) => format!("{} ({}, line {})", d.message, DYNAMIC_SOURCE, d.line),
        None => format!("invalid syntax ({})", DYNAMIC_SOURCE),
    };
    Throw::new(ExcType::SyntaxError, message)
}

fn source_arg<'v>(name: &str, value: &'v Val) -> EvalResult<&'v str> {
    value.as_str().ok_or_else(|| {
        Throw::type_error(format!(
            "{}() arg 1 must be a string, not {}",
            name,
            value.type_name()
        ))
    })
}

/// A scope seeded from a guest dict; string keys only
fn scope_from_dict(name: &str, value: &Val) -> EvalResult<Option<Scope>> {
    match value {
        Val::None => Ok(None),
        Val::Dict(map) => {
            let mut namespace = Namespace::new();
            for (key, item) in map.lock().values() {
                if let Val::Str(key) = key {
                    namespace.insert(key.clone(), item.clone());
                }
            }
            let scope = new_scope();
            *scope.lock() = namespace;
            Ok(Some(scope))
        }
        other => Err(Throw::type_error(format!(
            "{}() globals must be a dict, not {}",
            name,
            other.type_name()
        ))),
    }
}

/// Write a scope's bindings back into the dict it was seeded from
fn write_back(scope: &Scope, target: &Val) -> EvalResult<()> {
    let Val::Dict(map) = target else {
        return Ok(());
    };
    let entries: Vec<(Arc<str>, Val)> = scope
        .lock()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut map = map.lock();
    for (key, value) in entries {
        let key = Val::Str(key);
        map.insert(key.hash_key()?, (key, value));
    }
    Ok(())
}

fn eval(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("eval", 1, 2)?;
    let source = source_arg("eval", &args.positional[0])?;
    let program = compile_expression(source.trim(), DYNAMIC_SOURCE).map_err(syntax_error)?;
    let Some(expr) = program.expression() else {
        return Ok(Val::None);
    };

    match args.get(1).map(|g| scope_from_dict("eval", g)).transpose()?.flatten() {
        Some(scope) => {
            let frame = Frame::module(scope.clone(), Arc::from(DYNAMIC_SOURCE));
            let result = interp.with_frame(frame, |interp| interp.eval(expr));
            write_back(&scope, &args.positional[1])?;
            result
        }
        None => interp.eval(expr),
    }
}

fn exec(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("exec", 1, 2)?;
    let source = source_arg("exec", &args.positional[0])?;
    let program = compile(source, DYNAMIC_SOURCE).map_err(syntax_error)?;

    match args.get(1).map(|g| scope_from_dict("exec", g)).transpose()?.flatten() {
        Some(scope) => {
            let result = interp.run_program(&program, scope.clone());
            write_back(&scope, &args.positional[1])?;
            result?;
        }
        None => {
            let line = interp.frame().line;
            let result = interp.exec_block(&program.body);
            interp.frame_mut().line = line;
            result?;
        }
    }
    Ok(Val::None)
}
