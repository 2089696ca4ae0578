//! Attribute access

use super::Interpreter;
use crate::interpreter::builtins::{exceptions::ExcType, methods};
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::object::{Args, Method, SuperProxy, Val};
use std::sync::Arc;

impl Interpreter<'_> {
    pub(crate) fn get_attr(&mut self, object: &Val, name: &str) -> EvalResult {
        match object {
            Val::Instance(instance) => {
                if name == "__class__" {
                    return Ok(Val::Class(instance.class.clone()));
                }
                let own = instance.attrs.lock().get(name).cloned();
                if let Some(value) = own {
                    return Ok(value);
                }
                if let Some(value) = instance.class.lookup(name) {
                    return Ok(bind(object, value));
                }
                if let Some(hook) = instance.class.lookup("__getattr__") {
                    let args = Args::new(vec![object.clone(), Val::from(name)]);
                    return self.call(&hook, args);
                }
                return Err(Throw::attribute_error(&instance.class.name, name));
            }

            Val::Class(class) => {
                match name {
                    "__name__" => return Ok(Val::from(&*class.name)),
                    "__bases__" => {
                        let bases = class.bases.iter().cloned().map(Val::Class).collect();
                        return Ok(Val::tuple(bases));
                    }
                    "__mro__" => {
                        let mro = class.mro_with_self().into_iter().map(Val::Class).collect();
                        return Ok(Val::tuple(mro));
                    }
                    _ => {}
                }
                return class.lookup(name).ok_or_else(|| {
                    Throw::new(
                        ExcType::AttributeError,
                        format!("type object '{}' has no attribute '{}'", class.name, name),
                    )
                });
            }

            Val::Module(module) => {
                return module.get(name).ok_or_else(|| {
                    Throw::new(
                        ExcType::AttributeError,
                        format!("module '{}' has no attribute '{}'", module.name, name),
                    )
                });
            }

            Val::Super(proxy) => return self.super_attr(proxy, name),

            Val::Function(function) if name == "__name__" => {
                return Ok(Val::from(function.def.name.as_str()));
            }
            Val::Native(native) if name == "__name__" => return Ok(Val::from(native.name)),
            Val::Host(callable) if name == "__name__" => return Ok(Val::from(callable.name())),

            Val::Type(ty) => {
                if name == "__name__" {
                    return Ok(Val::from(ty.name()));
                }
                // Unbound method: `str.upper("abc")`
                return methods::lookup(*ty, name)
                    .map(Val::Native)
                    .ok_or_else(|| {
                        Throw::new(
                            ExcType::AttributeError,
                            format!("type object '{}' has no attribute '{}'", ty.name(), name),
                        )
                    });
            }

            Val::Complex(c) => match name {
                "real" => return Ok(Val::Float(c.re)),
                "imag" => return Ok(Val::Float(c.im)),
                _ => {}
            },
            Val::Int(_) | Val::Bool(_) | Val::Float(_) => match name {
                "real" => return Ok(object.clone()),
                "imag" => {
                    return Ok(match object {
                        Val::Float(_) => Val::Float(0.0),
                        _ => Val::Int(0),
                    })
                }
                _ => {}
            },
            _ => {}
        }

        match methods::lookup(object.builtin_type(), name) {
            Some(func) => Ok(Val::Method(Arc::new(Method::Native {
                receiver: object.clone(),
                func,
            }))),
            None => Err(Throw::attribute_error(&object.type_name(), name)),
        }
    }

    /// Attribute lookup that skips the proxy's class in the receiver's MRO
    fn super_attr(&mut self, proxy: &SuperProxy, name: &str) -> EvalResult {
        let mro = match &proxy.receiver {
            Val::Instance(instance) => instance.class.mro_with_self(),
            Val::Class(class) => class.mro_with_self(),
            _ => Vec::new(),
        };
        let start = mro
            .iter()
            .position(|c| Arc::ptr_eq(c, &proxy.class))
            .map_or(mro.len(), |i| i + 1);

        for class in &mro[start..] {
            let found = class.attrs.lock().get(name).cloned();
            if let Some(value) = found {
                return Ok(match &proxy.receiver {
                    Val::Instance(_) => bind(&proxy.receiver, value),
                    _ => value,
                });
            }
        }
        Err(Throw::attribute_error("super", name))
    }

    pub(crate) fn set_attr(&mut self, object: &Val, name: &str, value: Val) -> EvalResult<()> {
        match object {
            Val::Instance(instance) => {
                if let Some(hook @ Val::Function(_)) = instance.class.lookup("__setattr__") {
                    let args = Args::new(vec![object.clone(), Val::from(name), value]);
                    self.call(&hook, args)?;
                    return Ok(());
                }
                instance.attrs.lock().insert(Arc::from(name), value);
                Ok(())
            }
            Val::Class(class) => {
                class.attrs.lock().insert(Arc::from(name), value);
                Ok(())
            }
            Val::Module(module) => {
                module.set(name, value);
                Ok(())
            }
            other => Err(Throw::new(
                ExcType::AttributeError,
                format!(
                    "'{}' object has no attribute '{}' and no __dict__ for setting new attributes",
                    other.type_name(),
                    name
                ),
            )),
        }
    }

    pub(crate) fn del_attr(&mut self, object: &Val, name: &str) -> EvalResult<()> {
        let removed = match object {
            Val::Instance(instance) => instance.attrs.lock().remove(name),
            Val::Class(class) => class.attrs.lock().remove(name),
            Val::Module(module) => module.globals.lock().remove(name),
            _ => None,
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(Throw::attribute_error(&object.type_name(), name)),
        }
    }
}

/// Bind functions found on a class to the receiver
fn bind(receiver: &Val, value: Val) -> Val {
    match value {
        Val::Function(_) | Val::Native(_) => Val::Method(Arc::new(Method::Bound {
            receiver: receiver.clone(),
            func: value,
        })),
        other => other,
    }
}
