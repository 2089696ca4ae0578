//! Conversions from host types into [`Value`]

use super::{Complex64, Dict, DictKey, List, Tuple, UserData, Value};
use crate::host::Callable;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/* ===================== Wide Integers ===================== */

/// What to do with a host integer that does not fit in 64 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntPolicy {
    /// Clamp to `i64::MIN` / `i64::MAX`
    #[default]
    Saturate,
    /// Keep the low 64 bits (two's complement)
    Wrap,
    /// Convert to the nearest float
    Float,
}

/// A host integer outside the 64-bit range
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("integer {0} does not fit in 64 bits")]
pub struct IntOverflow(pub i128);

impl Value {
    /// Convert a wide integer using an explicit overflow policy
    pub fn from_wide_int(value: i128, policy: IntPolicy) -> Value {
        if let Ok(v) = i64::try_from(value) {
            return Value::Int(v);
        }
        match policy {
            IntPolicy::Saturate => Value::Int(if value < 0 { i64::MIN } else { i64::MAX }),
            IntPolicy::Wrap => Value::Int(value as i64),
            IntPolicy::Float => Value::Float(value as f64),
        }
    }

    /// Convert a wide integer, failing when it does not fit
    pub fn try_from_wide_int(value: i128) -> Result<Value, IntOverflow> {
        i64::try_from(value)
            .map(Value::Int)
            .map_err(|_| IntOverflow(value))
    }
}

/* ===================== From Impls ===================== */

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_lossless_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::from_wide_int(v as i128, IntPolicy::Saturate)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from_wide_int(v as i128, IntPolicy::Saturate)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::from_wide_int(v as i128, IntPolicy::Saturate)
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        Value::from_wide_int(v, IntPolicy::Saturate)
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        Value::from_wide_int(i128::try_from(v).unwrap_or(i128::MAX), IntPolicy::Saturate)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Complex64> for Value {
    fn from(c: Complex64) -> Self {
        Value::Complex(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Str(c.to_string())
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(l)
    }
}

impl From<Tuple> for Value {
    fn from(t: Tuple) -> Self {
        Value::Tuple(t)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<UserData> for Value {
    fn from(u: UserData) -> Self {
        Value::UserData(u)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Callable(c)
    }
}

impl From<DictKey> for Value {
    fn from(k: DictKey) -> Self {
        match k {
            DictKey::None => Value::None,
            DictKey::Bool(b) => Value::Bool(b),
            DictKey::Int(i) => Value::Int(i),
            DictKey::Float(f) => Value::Float(f),
            DictKey::Str(s) => Value::Str(s),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::None)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<DictKey>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(map: HashMap<K, V>) -> Self {
        Value::Dict(map.into_iter().collect())
    }
}

impl<K: Into<DictKey>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Value::Dict(map.into_iter().collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(Tuple::new(vec![a.into(), b.into()]))
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(Tuple::new(vec![a.into(), b.into(), c.into()]))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => match n.as_u64() {
                    Some(u) => Value::from(u),
                    None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Dict(map.into_iter().collect()),
        }
    }
}

/* ===================== Any-Typed Conversion ===================== */

/// Structural conversion when `T` is a recognised type, user data otherwise
pub(super) fn from_host<T: Any + Send + Sync>(value: T) -> Value {
    let type_name = std::any::type_name::<T>();
    let boxed: Box<dyn Any + Send + Sync> = Box::new(value);

    macro_rules! recognise {
        ($boxed:ident: $($t:ty),* $(,)?) => {
            $(
                let $boxed = match $boxed.downcast::<$t>() {
                    Ok(v) => return Value::from(*v),
                    Err(other) => other,
                };
            )*
        };
    }

    recognise!(boxed:
        Value, (), bool,
        i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, i128, u128,
        f32, f64, Complex64,
        String, &'static str, char,
        List, Tuple, Dict, UserData, Callable, DictKey,
        serde_json::Value,
        Option<Value>, Vec<Value>,
        Vec<bool>, Vec<i64>, Vec<i32>, Vec<f64>, Vec<String>, Vec<&'static str>,
        HashMap<String, Value>, HashMap<String, i64>, HashMap<String, f64>,
        HashMap<String, String>, HashMap<String, bool>,
        BTreeMap<String, Value>, BTreeMap<String, i64>, BTreeMap<String, String>,
    );

    Value::UserData(UserData::from_arc(Arc::from(boxed), type_name))
}
