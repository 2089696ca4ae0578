//! Standard modules
//!
//! Each module is a plain table of members built on first import. The
//! capability check happens in the importer; by the time [`load`] runs,
//! the module is known to be enabled.

mod cmath;
mod json;
mod math;
mod random;
mod string;
mod time;

use super::control::{EvalResult, Throw};
use super::object::{new_scope, Args, Module, Val};
use crate::capability::StdModule;
use std::sync::Arc;

/// Build a standard module by name
pub(crate) fn load(name: &str) -> Option<Arc<Module>> {
    let module = StdModule::from_name(name)?;
    let members = match module {
        StdModule::Math => math::members(),
        StdModule::Cmath => cmath::members(),
        StdModule::Json => json::members(),
        StdModule::Random => random::members(),
        StdModule::Time => time::members(),
        StdModule::String => string::members(),
    };

    let globals = new_scope();
    {
        let mut scope = globals.lock();
        scope.insert(Arc::from("__name__"), Val::from(name));
        for (member, value) in members {
            scope.insert(Arc::from(member), value);
        }
    }
    tracing::debug!(module = name, "loaded standard module");
    Some(Module::new(name, globals))
}

type Members = Vec<(&'static str, Val)>;

/* ===================== Argument Helpers ===================== */

/// A real-number argument
fn real(args: &Args, index: usize, func: &str) -> EvalResult<f64> {
    match args.get(index) {
        Some(value) => value.as_float().ok_or_else(|| {
            Throw::type_error(format!(
                "{}() argument must be a real number, not '{}'",
                func,
                value.type_name()
            ))
        }),
        None => Err(Throw::type_error(format!(
            "{}() missing required argument (pos {})",
            func,
            index + 1
        ))),
    }
}

/// An integer argument; bools count, floats do not
fn integer(args: &Args, index: usize, func: &str) -> EvalResult<i64> {
    match args.get(index) {
        Some(value) => value.as_int().ok_or_else(|| {
            Throw::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        }),
        None => Err(Throw::type_error(format!(
            "{}() missing required argument (pos {})",
            func,
            index + 1
        ))),
    }
}

fn domain_error() -> Throw {
    Throw::value_error("math domain error")
}

fn range_error() -> Throw {
    Throw::overflow("math range error")
}
