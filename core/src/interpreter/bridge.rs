//! Conversion between guest objects and host [`Value`]s
//!
//! Both directions deep-copy containers. A memo keyed by container address
//! keeps shared and cyclic structure intact within one conversion. Guest
//! objects with no host counterpart travel as [`UserData`] wrapping a
//! [`GuestObject`], and turn back into the very same object on the way in.
//!
//! Copying stops [`MAX_NESTING`] levels down. Deeper containers cross as
//! opaque handles ([`GuestObject`] outward, [`HostObject`] inward) that
//! unwrap to the original when they come back.

use super::control::MAX_NESTING;
use super::executor::format;
use super::object::{DictMap, Val};
use crate::value::{Dict, DictKey, List, Tuple, UserData, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A guest object held by the host
pub(crate) struct GuestObject(pub Val);

/// A host value held by a script, nested too deep to copy
pub(crate) struct HostObject(pub Value);

fn guest_object(val: &Val) -> Value {
    Value::UserData(UserData::from_arc(
        Arc::new(GuestObject(val.clone())),
        guest_type_name(val),
    ))
}

/* ===================== Guest to Host ===================== */

#[derive(Default)]
pub(crate) struct ToHost {
    memo: HashMap<usize, Value>,
    depth: usize,
}

impl ToHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(&mut self, val: &Val) -> Value {
        if matches!(val, Val::List(_) | Val::Tuple(_) | Val::Dict(_)) {
            if self.depth >= MAX_NESTING {
                return guest_object(val);
            }
            self.depth += 1;
            let value = self.convert_container(val);
            self.depth -= 1;
            return value;
        }
        match val {
            Val::None => Value::None,
            Val::Bool(b) => Value::Bool(*b),
            Val::Int(i) => Value::Int(*i),
            Val::Float(f) => Value::Float(*f),
            Val::Complex(c) => Value::Complex(*c),
            Val::Str(s) => Value::Str(s.to_string()),
            Val::Host(callable) => Value::Callable(callable.clone()),
            Val::UserData(data) => match data.downcast_ref::<HostObject>() {
                Some(HostObject(inner)) => inner.clone(),
                None => Value::UserData(data.clone()),
            },
            other => guest_object(other),
        }
    }

    fn convert_container(&mut self, val: &Val) -> Value {
        match val {
            Val::List(items) => {
                let addr = Arc::as_ptr(items) as *const () as usize;
                if let Some(seen) = self.memo.get(&addr) {
                    return seen.clone();
                }
                let list = List::new();
                self.memo.insert(addr, Value::List(list.clone()));
                let snapshot = items.lock().clone();
                for item in &snapshot {
                    let converted = self.convert(item);
                    list.push(converted);
                }
                Value::List(list)
            }
            Val::Tuple(items) => Value::Tuple(Tuple::new(
                items.iter().map(|item| self.convert(item)).collect(),
            )),
            Val::Dict(map) => {
                let addr = Arc::as_ptr(map) as *const () as usize;
                if let Some(seen) = self.memo.get(&addr) {
                    return seen.clone();
                }
                let dict = Dict::new();
                self.memo.insert(addr, Value::Dict(dict.clone()));
                let entries: Vec<(Val, Val)> = map.lock().values().cloned().collect();
                for (k, v) in &entries {
                    let value = self.convert(v);
                    dict.insert(host_key(k), value);
                }
                Value::Dict(dict)
            }
            other => guest_object(other),
        }
    }
}

/// Dict keys outside the host key space render as their repr
fn host_key(key: &Val) -> DictKey {
    match key {
        Val::None => DictKey::None,
        Val::Bool(b) => DictKey::Bool(*b),
        Val::Int(i) => DictKey::Int(*i),
        Val::Float(f) => DictKey::Float(*f),
        Val::Str(s) => DictKey::Str(s.to_string()),
        other => DictKey::Str(format::plain_repr(other)),
    }
}

fn guest_type_name(val: &Val) -> &'static str {
    match val {
        Val::Instance(_) => "object",
        Val::Class(_) => "type",
        Val::Super(_) => "super",
        Val::Method(_) => "method",
        other => other.builtin_type().name(),
    }
}

/// Convert one value with a fresh memo
pub(crate) fn to_value(val: &Val) -> Value {
    ToHost::new().convert(val)
}

/* ===================== Host to Guest ===================== */

#[derive(Default)]
pub(crate) struct FromHost {
    memo: HashMap<usize, Val>,
    depth: usize,
}

impl FromHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(&mut self, value: &Value) -> Val {
        if matches!(value, Value::List(_) | Value::Tuple(_) | Value::Dict(_)) {
            if self.depth >= MAX_NESTING {
                return Val::UserData(UserData::from_arc(
                    Arc::new(HostObject(value.clone())),
                    value.type_name(),
                ));
            }
            self.depth += 1;
            let val = self.convert_container(value);
            self.depth -= 1;
            return val;
        }
        match value {
            Value::None => Val::None,
            Value::Bool(b) => Val::Bool(*b),
            Value::Int(i) => Val::Int(*i),
            Value::Float(f) => Val::Float(*f),
            Value::Complex(c) => Val::Complex(*c),
            Value::Str(s) => Val::from(s.as_str()),
            Value::Callable(callable) => Val::Host(callable.clone()),
            Value::UserData(data) => match data.downcast_ref::<GuestObject>() {
                Some(GuestObject(inner)) => inner.clone(),
                None => Val::UserData(data.clone()),
            },
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) => self.convert_container(value),
        }
    }

    fn convert_container(&mut self, value: &Value) -> Val {
        match value {
            Value::List(list) => {
                if let Some(seen) = self.memo.get(&list.addr()) {
                    return seen.clone();
                }
                let out = Val::list(Vec::new());
                self.memo.insert(list.addr(), out.clone());
                let items: Vec<Val> = list.to_vec().iter().map(|v| self.convert(v)).collect();
                if let Val::List(storage) = &out {
                    *storage.lock() = items;
                }
                out
            }
            Value::Tuple(tuple) => Val::tuple(tuple.iter().map(|v| self.convert(v)).collect()),
            Value::Dict(dict) => {
                if let Some(seen) = self.memo.get(&dict.addr()) {
                    return seen.clone();
                }
                let out = Val::dict(DictMap::new());
                self.memo.insert(dict.addr(), out.clone());
                let mut map = DictMap::new();
                for (k, v) in dict.entries() {
                    let key = guest_key(k);
                    let value = self.convert(&v);
                    // Host keys are always scalars, so they always hash
                    if let Ok(hashed) = key.hash_key() {
                        map.insert(hashed, (key, value));
                    }
                }
                if let Val::Dict(storage) = &out {
                    *storage.lock() = map;
                }
                out
            }
            other => self.convert(other),
        }
    }
}

fn guest_key(key: DictKey) -> Val {
    match key {
        DictKey::None => Val::None,
        DictKey::Bool(b) => Val::Bool(b),
        DictKey::Int(i) => Val::Int(i),
        DictKey::Float(f) => Val::Float(f),
        DictKey::Str(s) => Val::from(s),
    }
}

/// Convert one value with a fresh memo
pub(crate) fn from_value(value: &Value) -> Val {
    FromHost::new().convert(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Callable;

    #[test]
    fn test_containers_are_copied_both_ways() {
        let host = List::from_vec(vec![Value::Int(1), Value::from("a")]);
        let guest = from_value(&Value::List(host.clone()));
        host.push(3);

        let Val::List(items) = &guest else {
            unreachable!("expected a list, got {:?}", guest);
        };
        assert_eq!(items.lock().len(), 2);

        let back = to_value(&guest);
        assert_eq!(back, Value::List(List::from_vec(vec![Value::Int(1), Value::from("a")])));
        assert!(!back.as_list().unwrap().ptr_eq(&host));
    }

    #[test]
    fn test_cycles_survive_conversion() {
        let list = Val::list(vec![Val::Int(1)]);
        if let Val::List(items) = &list {
            items.lock().push(list.clone());
        }

        let host = to_value(&list);
        let outer = host.as_list().unwrap();
        assert_eq!(outer.len(), 2);
        assert!(outer.get(1).as_list().unwrap().ptr_eq(outer));
        assert_eq!(host.repr(), "[1, [...]]");
    }

    #[test]
    fn test_guest_objects_round_trip_by_identity() {
        let module = super::super::object::Module::new("m", super::super::object::new_scope());
        let val = Val::Module(module);
        let host = to_value(&val);
        assert_eq!(host.type_name(), "module");
        assert!(from_value(&host).is(&val));
    }

    #[test]
    fn test_non_scalar_keys_become_repr_strings() {
        let pairs = vec![
            (Val::tuple(vec![Val::Int(1), Val::Int(2)]), Val::from("pair")),
            (Val::Int(3), Val::from("three")),
        ];
        let dict = Val::dict_from_pairs(pairs).unwrap();
        let host = to_value(&dict);
        let dict = host.as_dict().unwrap();
        assert_eq!(dict.get("(1, 2)"), Value::from("pair"));
        assert_eq!(dict.get(3), Value::from("three"));
    }

    #[test]
    fn test_deep_guest_nesting_crosses_as_a_handle() {
        let mut guest = Val::list(Vec::new());
        for _ in 0..MAX_NESTING + 50 {
            guest = Val::list(vec![guest]);
        }

        let host = to_value(&guest);
        let mut level = host.clone();
        for _ in 0..MAX_NESTING {
            level = level.as_list().unwrap().get(0);
        }
        assert_eq!(level.type_name(), "list");
        assert!(level.as_user_data().is_some());

        // The handle unwraps to the original guest list on the way back in
        let inner = from_value(&level);
        let mut expected = guest.clone();
        for _ in 0..MAX_NESTING {
            let Val::List(items) = &expected else {
                unreachable!("expected a list");
            };
            let next = items.lock()[0].clone();
            expected = next;
        }
        assert!(inner.is(&expected));
    }

    #[test]
    fn test_deep_host_nesting_round_trips() {
        let mut host = Value::List(List::new());
        for _ in 0..MAX_NESTING + 50 {
            host = Value::List(List::from_vec(vec![host]));
        }
        let back = to_value(&from_value(&host));
        assert_eq!(back, host);
    }

    #[test]
    fn test_callables_and_user_data_pass_through() {
        let callable = Callable::from_fn("id", |args| Ok(args[0].clone()));
        let back = to_value(&from_value(&Value::Callable(callable.clone())));
        assert!(back.as_callable().unwrap().ptr_eq(&callable));

        let data = UserData::new(42u8);
        let back = to_value(&from_value(&Value::UserData(data.clone())));
        assert!(back.as_user_data().unwrap().ptr_eq(&data));
    }
}
