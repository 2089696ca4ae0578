//! Host-facing value model
//!
//! [`Value`] is what crosses the boundary between host code and scripts.
//! Scalars and strings are copied. Containers are shared handles on the
//! host side, but every crossing into or out of a script deep-copies them,
//! so a script never aliases host storage and vice versa.
//!
//! Anything the model does not recognise travels as [`UserData`]: an
//! opaque handle the script can pass around and hand back unchanged.

mod complex;
mod convert;
mod dict;
pub(crate) mod repr;

#[cfg(test)]
mod tests;

pub use complex::Complex64;
pub use convert::{IntOverflow, IntPolicy};
pub use dict::{Dict, DictKey, List, Tuple};

use crate::host::Callable;
use crate::interpreter::bridge::GuestObject;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/* ===================== User Data ===================== */

/// Opaque host object carried through scripts untouched
///
/// Scripts can store, pass and return it; only the host can look inside.
/// Identity is preserved: the same handle comes back out.
#[derive(Clone)]
pub struct UserData {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl UserData {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn from_arc(inner: Arc<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self { inner, type_name }
    }

    /// Borrow the payload as `T` when it has that type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Rust type name of the payload, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn ptr_eq(&self, other: &UserData) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserData({})", self.type_name)
    }
}

/* ===================== Value ===================== */

/// A value exchanged between host and script
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    List(List),
    Tuple(Tuple),
    Dict(Dict),
    UserData(UserData),
    Callable(Callable),
}

impl Value {
    /// Convert any host value.
    ///
    /// Recognised primitives, strings, containers and `Value`s themselves
    /// convert structurally. Everything else is wrapped as [`UserData`].
    pub fn from_host<T: Any + Send + Sync>(value: T) -> Value {
        convert::from_host(value)
    }

    /// Guest-facing type name, as `type(x).__name__` would report it
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::UserData(u) if u.is::<GuestObject>() => u.type_name(),
            Value::UserData(_) => "userdata",
            Value::Callable(_) => "builtin_function_or_method",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Value::Complex(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_user_data(&self) -> Option<&UserData> {
        match self {
            Value::UserData(u) => Some(u),
            _ => None,
        }
    }

    /// Borrow a user-data payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_user_data().and_then(|u| u.downcast_ref::<T>())
    }

    /// Render as the script's `repr()` would
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut HashSet::new());
        out
    }

    fn write_repr(&self, out: &mut String, seen: &mut HashSet<usize>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&repr::float_repr(*f)),
            Value::Complex(c) => out.push_str(&repr::complex_repr(c.re, c.im)),
            Value::Str(s) => out.push_str(&repr::string_repr(s)),
            Value::List(list) => {
                if !seen.insert(list.addr()) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                for (i, item) in list.to_vec().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, seen);
                }
                out.push(']');
                seen.remove(&list.addr());
            }
            Value::Tuple(tuple) => {
                out.push('(');
                for (i, item) in tuple.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, seen);
                }
                if tuple.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                if !seen.insert(dict.addr()) {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (i, (k, v)) in dict.entries().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&k.to_string());
                    out.push_str(": ");
                    v.write_repr(out, seen);
                }
                out.push('}');
                seen.remove(&dict.addr());
            }
            Value::UserData(u) if u.is::<GuestObject>() => {
                out.push_str(&format!("<{} object>", u.type_name()))
            }
            Value::UserData(u) => out.push_str(&format!("<userdata {}>", u.type_name())),
            Value::Callable(c) => out.push_str(&format!("<built-in function {}>", c.name())),
        }
    }

    /// JSON view of the value, when it has one
    ///
    /// Fails for user data, callables, complex numbers and non-finite
    /// floats.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Json::Number(serde_json::Number::from_f64(*f)?),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(l) => Json::Array(
                l.to_vec()
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Tuple(t) => {
                Json::Array(t.iter().map(Value::to_json).collect::<Option<Vec<_>>>()?)
            }
            Value::Dict(d) => {
                let mut map = serde_json::Map::new();
                for (k, v) in d.entries() {
                    let key = match k {
                        DictKey::Str(s) => s,
                        DictKey::None => "null".to_string(),
                        DictKey::Bool(b) => b.to_string(),
                        DictKey::Int(i) => i.to_string(),
                        DictKey::Float(f) => repr::float_repr(f),
                    };
                    map.insert(key, v.to_json()?);
                }
                Json::Object(map)
            }
            Value::Complex(_) | Value::UserData(_) | Value::Callable(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut HashSet::new())
    }
}

impl Value {
    /// Structural equality
    ///
    /// A pair of containers already under comparison further up counts as
    /// equal, so cyclic values compare in finite time.
    fn equals(&self, other: &Value, active: &mut HashSet<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || !active.insert(pair) {
                    return true;
                }
                let equal = equal_items(&a.to_vec(), &b.to_vec(), active);
                active.remove(&pair);
                equal
            }
            (Value::Tuple(a), Value::Tuple(b)) => equal_items(a.as_slice(), b.as_slice(), active),
            (Value::Dict(a), Value::Dict(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || !active.insert(pair) {
                    return true;
                }
                let (a_entries, b_entries) = (a.entries(), b.entries());
                let equal = a_entries.len() == b_entries.len()
                    && a_entries.iter().all(|(k, v)| {
                        b_entries
                            .iter()
                            .any(|(k2, v2)| k == k2 && v.equals(v2, active))
                    });
                active.remove(&pair);
                equal
            }
            (Value::UserData(a), Value::UserData(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

fn equal_items(a: &[Value], b: &[Value], active: &mut HashSet<(usize, usize)>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y, active))
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Renders as the script's `str()` would: strings unquoted, everything
/// else as its repr
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.repr()),
        }
    }
}
