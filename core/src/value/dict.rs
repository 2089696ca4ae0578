//! Host-side containers: lists, tuples and insertion-ordered dictionaries

use super::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/* ===================== List ===================== */

/// Mutable shared sequence
///
/// Clones share the same storage. Index lookups past the end yield
/// [`Value::None`].
#[derive(Clone, Default)]
pub struct List(Arc<Mutex<Vec<Value>>>);

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Arc::new(Mutex::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Element at `index`, or `Value::None` when out of range
    pub fn get(&self, index: usize) -> Value {
        self.0.lock().get(index).cloned().unwrap_or(Value::None)
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.lock().push(value.into());
    }

    /// Replace the element at `index`; returns false when out of range
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let mut items = self.0.lock();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the current elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        List::from_vec(items)
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        List::from_vec(iter.into_iter().collect())
    }
}

/* ===================== Tuple ===================== */

/// Immutable sequence
#[derive(Clone)]
pub struct Tuple(Arc<[Value]>);

impl Tuple {
    pub fn new(items: Vec<Value>) -> Self {
        Self(items.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element at `index`, or `Value::None` when out of range
    pub fn get(&self, index: usize) -> Value {
        self.0.get(index).cloned().unwrap_or(Value::None)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl Default for Tuple {
    fn default() -> Self {
        Tuple::new(Vec::new())
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(items: Vec<Value>) -> Self {
        Tuple::new(items)
    }
}

/* ===================== Dictionary ===================== */

/// Key space of a host dictionary: strings and scalars
///
/// Numeric keys compare by value, so `Int(1)`, `Float(1.0)` and
/// `Bool(true)` address the same entry, as they do inside scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl DictKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DictKey::Str(s) => Some(s),
            _ => None,
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            DictKey::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            DictKey::Int(i) => Some(*i as f64),
            DictKey::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DictKey::None, DictKey::None) => true,
            (DictKey::Str(a), DictKey::Str(b)) => a == b,
            (DictKey::Int(a), DictKey::Int(b)) => a == b,
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for DictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictKey::None => write!(f, "None"),
            DictKey::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            DictKey::Int(i) => write!(f, "{}", i),
            DictKey::Float(x) => write!(f, "{}", super::repr::float_repr(*x)),
            DictKey::Str(s) => write!(f, "{}", super::repr::string_repr(s)),
        }
    }
}

impl From<&str> for DictKey {
    fn from(s: &str) -> Self {
        DictKey::Str(s.to_string())
    }
}

impl From<String> for DictKey {
    fn from(s: String) -> Self {
        DictKey::Str(s)
    }
}

impl From<&String> for DictKey {
    fn from(s: &String) -> Self {
        DictKey::Str(s.clone())
    }
}

impl From<i64> for DictKey {
    fn from(i: i64) -> Self {
        DictKey::Int(i)
    }
}

impl From<i32> for DictKey {
    fn from(i: i32) -> Self {
        DictKey::Int(i as i64)
    }
}

impl From<bool> for DictKey {
    fn from(b: bool) -> Self {
        DictKey::Bool(b)
    }
}

impl From<f64> for DictKey {
    fn from(f: f64) -> Self {
        DictKey::Float(f)
    }
}

/// Mutable shared mapping that remembers insertion order
///
/// Clones share the same storage. Missing keys yield [`Value::None`]
/// from [`Dict::get`].
#[derive(Clone, Default)]
pub struct Dict(Arc<Mutex<Vec<(DictKey, Value)>>>);

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Value under `key`, or `Value::None` when absent
    pub fn get(&self, key: impl Into<DictKey>) -> Value {
        self.try_get(key).unwrap_or(Value::None)
    }

    /// Value under `key`, distinguishing absence from a stored `None`
    pub fn try_get(&self, key: impl Into<DictKey>) -> Option<Value> {
        let key = key.into();
        self.0
            .lock()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: impl Into<DictKey>) -> bool {
        let key = key.into();
        self.0.lock().iter().any(|(k, _)| *k == key)
    }

    /// Insert or replace; replacing keeps the original position
    pub fn insert(&self, key: impl Into<DictKey>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut entries = self.0.lock();
        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        entries.push((key, value));
        None
    }

    pub fn remove(&self, key: impl Into<DictKey>) -> Option<Value> {
        let key = key.into();
        let mut entries = self.0.lock();
        let index = entries.iter().position(|(k, _)| *k == key)?;
        Some(entries.remove(index).1)
    }

    pub fn keys(&self) -> Vec<DictKey> {
        self.0.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the entries in insertion order
    pub fn entries(&self) -> Vec<(DictKey, Value)> {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Dict) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<K: Into<DictKey>, V: Into<Value>> FromIterator<(K, V)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}
