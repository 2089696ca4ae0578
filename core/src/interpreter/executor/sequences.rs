//! Iteration, subscripts and slices

use super::Interpreter;
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{EvalResult, Exc, Throw};
use crate::interpreter::object::{Args, IterState, RangeVal, Val};
use crate::interpreter::types::Expr;
use parking_lot::Mutex;
use std::sync::Arc;

/// A running iteration
pub(crate) enum Cursor {
    Range { next: i64, remaining: usize, step: i64 },
    Items(std::vec::IntoIter<Val>),
    /// An iterator object; advancing it is visible to every holder
    Shared(Arc<Mutex<IterState>>),
    /// An instance implementing `__next__`
    Protocol(Val),
}

/// Evaluated `lower:upper:step`
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SliceBounds {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub step: Option<i64>,
}

impl SliceBounds {
    /// Start, step and length for a sequence of `len` items
    pub fn indices(&self, len: usize) -> EvalResult<(i64, i64, usize)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(Throw::value_error("slice step cannot be zero"));
        }
        let len = len as i64;
        let clamp = |bound: Option<i64>, default: i64| -> i64 {
            match bound {
                None => default,
                Some(i) if i < 0 => {
                    let i = i.saturating_add(len);
                    if i < 0 {
                        if step < 0 {
                            -1
                        } else {
                            0
                        }
                    } else {
                        i
                    }
                }
                Some(i) if i >= len => {
                    if step < 0 {
                        len - 1
                    } else {
                        len
                    }
                }
                Some(i) => i,
            }
        };
        let (start, stop) = if step > 0 {
            (clamp(self.lower, 0), clamp(self.upper, len))
        } else {
            (clamp(self.lower, len - 1), clamp(self.upper, -1))
        };
        let count = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) / -step + 1
        } else {
            0
        };
        Ok((start, step, count as usize))
    }

    /// Positions selected in a sequence of `len` items
    pub fn positions(&self, len: usize) -> EvalResult<Vec<usize>> {
        let (start, step, count) = self.indices(len)?;
        Ok((0..count as i64).map(|k| (start + k * step) as usize).collect())
    }
}

/// Resolve a possibly negative index against `len`
fn seq_index(index: &Val, len: usize, what: &str) -> EvalResult<usize> {
    let Some(i) = index.as_int() else {
        return Err(Throw::type_error(format!(
            "{} indices must be integers or slices, not {}",
            what,
            index.type_name()
        )));
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(Throw::index_error(format!("{} index out of range", what)));
    }
    Ok(resolved as usize)
}

impl Interpreter<'_> {
    /* ===================== Iteration ===================== */

    pub(crate) fn iterate(&mut self, value: &Val) -> EvalResult<Cursor> {
        Ok(match value {
            Val::List(items) => Cursor::Items(items.lock().clone().into_iter()),
            Val::Tuple(items) => Cursor::Items(items.to_vec().into_iter()),
            Val::Str(s) => Cursor::Items(
                s.chars()
                    .map(|c| Val::from(c.to_string()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Val::Dict(map) => Cursor::Items(
                map.lock()
                    .values()
                    .map(|(k, _)| k.clone())
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Val::Range(range) => Cursor::Range {
                next: range.start,
                remaining: range.len(),
                step: range.step,
            },
            Val::Iter(state) => Cursor::Shared(state.clone()),
            Val::Instance(instance) => {
                let Some(method) = instance.class.lookup("__iter__") else {
                    return Err(not_iterable(value));
                };
                let iterator = self.call(&method, Args::new(vec![value.clone()]))?;
                match &iterator {
                    Val::Instance(inner) if inner.class.lookup("__next__").is_some() => {
                        Cursor::Protocol(iterator)
                    }
                    Val::Instance(_) => {
                        return Err(Throw::type_error(format!(
                            "iter() returned non-iterator of type '{}'",
                            iterator.type_name()
                        )))
                    }
                    _ => self.iterate(&iterator)?,
                }
            }
            other => return Err(not_iterable(other)),
        })
    }

    pub(crate) fn next_item(&mut self, cursor: &mut Cursor) -> EvalResult<Option<Val>> {
        self.check_interrupt()?;
        Ok(match cursor {
            Cursor::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Val::Int(value))
            }
            Cursor::Items(items) => items.next(),
            Cursor::Shared(state) => state.lock().next(),
            Cursor::Protocol(iterator) => {
                let iterator = iterator.clone();
                let Val::Instance(instance) = &iterator else {
                    return Ok(None);
                };
                let Some(method) = instance.class.lookup("__next__") else {
                    return Ok(None);
                };
                match self.call(&method, Args::new(vec![iterator.clone()])) {
                    Ok(value) => Some(value),
                    Err(err) if is_stop_iteration(&err) => None,
                    Err(err) => return Err(err),
                }
            }
        })
    }

    /// All items of an iterable
    pub(crate) fn collect(&mut self, value: &Val) -> EvalResult<Vec<Val>> {
        match value {
            Val::List(items) => return Ok(items.lock().clone()),
            Val::Tuple(items) => return Ok(items.to_vec()),
            _ => {}
        }
        let mut cursor = self.iterate(value)?;
        let mut out = Vec::new();
        while let Some(item) = self.next_item(&mut cursor)? {
            out.push(item);
        }
        Ok(out)
    }

    /* ===================== Subscripts ===================== */

    pub(crate) fn get_item(&mut self, object: &Val, index: &Val) -> EvalResult {
        match object {
            Val::List(items) => {
                let items = items.lock();
                let i = seq_index(index, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Val::Tuple(items) => {
                let i = seq_index(index, items.len(), "tuple")?;
                Ok(items[i].clone())
            }
            Val::Str(s) => {
                if index.as_int().is_none() {
                    return Err(Throw::type_error(format!(
                        "string indices must be integers, not '{}'",
                        index.type_name()
                    )));
                }
                let chars: Vec<char> = s.chars().collect();
                let i = seq_index(index, chars.len(), "string")?;
                Ok(Val::from(chars[i].to_string()))
            }
            Val::Range(range) => {
                let i = seq_index(index, range.len(), "range object")?;
                Ok(Val::Int(range.get(i)))
            }
            Val::Dict(map) => {
                let key = index.hash_key()?;
                let found = map.lock().get(&key).map(|(_, v)| v.clone());
                match found {
                    Some(value) => Ok(value),
                    None => Err(Throw::key_error(index.clone())),
                }
            }
            Val::Instance(instance) => match instance.class.lookup("__getitem__") {
                Some(method) => self.call(&method, Args::new(vec![object.clone(), index.clone()])),
                None => Err(not_subscriptable(object)),
            },
            Val::Type(_) | Val::Class(_) => Ok(object.clone()),
            other => Err(not_subscriptable(other)),
        }
    }

    pub(crate) fn set_item(&mut self, object: &Val, index: Val, value: Val) -> EvalResult<()> {
        match object {
            Val::List(items) => {
                let mut items = items.lock();
                let len = items.len();
                let i = seq_index(&index, len, "list").map_err(|err| match err.pending_type() {
                    Some(ExcType::IndexError) => {
                        Throw::index_error("list assignment index out of range")
                    }
                    _ => err,
                })?;
                items[i] = value;
                Ok(())
            }
            Val::Dict(map) => {
                let key = index.hash_key()?;
                let mut map = map.lock();
                match map.get_mut(&key) {
                    Some(entry) => entry.1 = value,
                    None => {
                        map.insert(key, (index, value));
                    }
                }
                Ok(())
            }
            Val::Instance(instance) => match instance.class.lookup("__setitem__") {
                Some(method) => {
                    self.call(&method, Args::new(vec![object.clone(), index, value]))?;
                    Ok(())
                }
                None => Err(no_item_assignment(object)),
            },
            other => Err(no_item_assignment(other)),
        }
    }

    pub(crate) fn del_item(&mut self, object: &Val, index: &Val) -> EvalResult<()> {
        match object {
            Val::List(items) => {
                let mut items = items.lock();
                let len = items.len();
                let i = seq_index(index, len, "list").map_err(|err| match err.pending_type() {
                    Some(ExcType::IndexError) => {
                        Throw::index_error("list assignment index out of range")
                    }
                    _ => err,
                })?;
                items.remove(i);
                Ok(())
            }
            Val::Dict(map) => {
                let key = index.hash_key()?;
                match map.lock().remove(&key) {
                    Some(_) => Ok(()),
                    None => Err(Throw::key_error(index.clone())),
                }
            }
            Val::Instance(instance) => match instance.class.lookup("__delitem__") {
                Some(method) => {
                    self.call(&method, Args::new(vec![object.clone(), index.clone()]))?;
                    Ok(())
                }
                None => Err(Throw::type_error(format!(
                    "'{}' object does not support item deletion",
                    object.type_name()
                ))),
            },
            other => Err(Throw::type_error(format!(
                "'{}' object does not support item deletion",
                other.type_name()
            ))),
        }
    }

    /* ===================== Slices ===================== */

    pub(crate) fn eval_slice_bounds(
        &mut self,
        lower: &Option<Box<Expr>>,
        upper: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> EvalResult<SliceBounds> {
        Ok(SliceBounds {
            lower: self.slice_bound(lower)?,
            upper: self.slice_bound(upper)?,
            step: self.slice_bound(step)?,
        })
    }

    fn slice_bound(&mut self, expr: &Option<Box<Expr>>) -> EvalResult<Option<i64>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Val::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                Throw::type_error(
                    "slice indices must be integers or None or have an __index__ method",
                )
            }),
        }
    }

    pub(crate) fn get_slice(&mut self, object: &Val, bounds: SliceBounds) -> EvalResult {
        match object {
            Val::List(items) => {
                let items = items.lock();
                let picked = bounds.positions(items.len())?;
                Ok(Val::list(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Val::Tuple(items) => {
                let picked = bounds.positions(items.len())?;
                Ok(Val::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Val::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let picked = bounds.positions(chars.len())?;
                Ok(Val::from(picked.into_iter().map(|i| chars[i]).collect::<String>()))
            }
            Val::Range(range) => {
                let (start, step, count) = bounds.indices(range.len())?;
                let first = range.get(start.max(0) as usize);
                let step = range.step.saturating_mul(step);
                let stop = first.saturating_add(step.saturating_mul(count as i64));
                Ok(Val::Range(RangeVal {
                    start: first,
                    stop,
                    step,
                }))
            }
            Val::Instance(instance) => match instance.class.lookup("__getitem__") {
                Some(method) => {
                    let slice = Val::tuple(vec![
                        bounds.lower.map_or(Val::None, Val::Int),
                        bounds.upper.map_or(Val::None, Val::Int),
                        bounds.step.map_or(Val::None, Val::Int),
                    ]);
                    self.call(&method, Args::new(vec![object.clone(), slice]))
                }
                None => Err(not_subscriptable(object)),
            },
            other => Err(not_subscriptable(other)),
        }
    }

    pub(crate) fn set_slice(&mut self, object: &Val, bounds: SliceBounds, value: Val) -> EvalResult<()> {
        let Val::List(items) = object else {
            return Err(no_item_assignment(object));
        };
        let replacement = self.collect(&value)?;
        let mut items = items.lock();
        let (start, step, count) = bounds.indices(items.len())?;

        if step == 1 {
            let start = start.max(0) as usize;
            let end = start + count;
            items.splice(start..end, replacement);
            return Ok(());
        }
        if replacement.len() != count {
            return Err(Throw::value_error(format!(
                "attempt to assign sequence of size {} to extended slice of size {}",
                replacement.len(),
                count
            )));
        }
        for (k, item) in replacement.into_iter().enumerate() {
            let i = (start + k as i64 * step) as usize;
            items[i] = item;
        }
        Ok(())
    }

    pub(crate) fn del_slice(&mut self, object: &Val, bounds: SliceBounds) -> EvalResult<()> {
        let Val::List(items) = object else {
            return Err(Throw::type_error(format!(
                "'{}' object does not support item deletion",
                object.type_name()
            )));
        };
        let mut items = items.lock();
        let mut picked = bounds.positions(items.len())?;
        picked.sort_unstable();
        for i in picked.into_iter().rev() {
            items.remove(i);
        }
        Ok(())
    }
}

fn is_stop_iteration(err: &Throw) -> bool {
    match err {
        Throw::Exception(raised) => match &raised.exc {
            Exc::Pending { ty, .. } => *ty == ExcType::StopIteration,
            Exc::Object(Val::Instance(instance)) => instance
                .class
                .exception_type()
                .is_some_and(|ty| ty == ExcType::StopIteration),
            _ => false,
        },
        Throw::Interrupt(_) => false,
    }
}

fn not_iterable(value: &Val) -> Throw {
    Throw::type_error(format!("'{}' object is not iterable", value.type_name()))
}

fn not_subscriptable(value: &Val) -> Throw {
    Throw::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

fn no_item_assignment(value: &Val) -> Throw {
    Throw::new(
        ExcType::TypeError,
        format!(
            "'{}' object does not support item assignment",
            value.type_name()
        ),
    )
}
