//! Arithmetic, comparison and truth testing

use super::Interpreter;
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{check_length, EvalResult, Throw};
use crate::interpreter::object::{Args, Val};
use crate::interpreter::types::{BinaryOp, CmpOp, UnaryOp};
use crate::value::Complex64;
use std::cmp::Ordering;

/// Elements copied between checkpoint polls when repeating a sequence
const REPEAT_CHUNK: usize = 1 << 16;

/* ===================== Numbers ===================== */

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
    Complex(Complex64),
}

impl Num {
    fn of(value: &Val) -> Option<Num> {
        match value {
            Val::Bool(b) => Some(Num::Int(*b as i64)),
            Val::Int(i) => Some(Num::Int(*i)),
            Val::Float(f) => Some(Num::Float(*f)),
            Val::Complex(c) => Some(Num::Complex(*c)),
            _ => None,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
            Num::Complex(c) => c.re,
        }
    }

    fn to_complex(self) -> Complex64 {
        match self {
            Num::Complex(c) => c,
            other => Complex64::from(other.to_f64()),
        }
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> EvalResult {
    let overflow = || Throw::overflow("integer overflow");
    Ok(Val::Int(match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if b == 0 {
                return Err(Throw::zero_division("division by zero"));
            }
            return Ok(Val::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(Throw::zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(Throw::zero_division("integer modulo by zero"));
            }
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(Throw::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Val::Float((a as f64).powf(b as f64)));
            }
            match u32::try_from(b) {
                Ok(exp) => a.checked_pow(exp).ok_or_else(overflow)?,
                Err(_) => match a {
                    0 | 1 => a,
                    -1 if b % 2 == 0 => 1,
                    -1 => -1,
                    _ => return Err(overflow()),
                },
            }
        }
        BinaryOp::LShift => {
            if b < 0 {
                return Err(Throw::value_error("negative shift count"));
            }
            if a == 0 {
                0
            } else if b >= 63 {
                return Err(overflow());
            } else {
                let shifted = a << b;
                if shifted >> b != a {
                    return Err(overflow());
                }
                shifted
            }
        }
        BinaryOp::RShift => {
            if b < 0 {
                return Err(Throw::value_error("negative shift count"));
            }
            if b >= 64 {
                if a < 0 {
                    -1
                } else {
                    0
                }
            } else {
                a >> b
            }
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
    }))
}

/// Floor division and modulo with the sign conventions of the language
pub(crate) fn float_divmod(a: f64, b: f64) -> (f64, f64) {
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 {
        if (b < 0.0) != (rem < 0.0) {
            rem += b;
            div -= 1.0;
        }
    } else {
        rem = 0.0f64.copysign(b);
    }
    let floor = if div != 0.0 {
        let f = div.floor();
        if div - f > 0.5 {
            f + 1.0
        } else {
            f
        }
    } else {
        0.0f64.copysign(a / b)
    };
    (floor, rem)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> EvalResult<Option<Val>> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(Throw::zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(Throw::zero_division("float floor division by zero"));
            }
            float_divmod(a, b).0
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(Throw::zero_division("float modulo by zero"));
            }
            float_divmod(a, b).1
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(Throw::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                let c = Complex64::from(a).powc(Complex64::from(b));
                return Ok(Some(Val::Complex(c)));
            }
            let r = a.powf(b);
            if r.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(Throw::overflow("(34, 'Numerical result out of range')"));
            }
            r
        }
        _ => return Ok(None),
    };
    Ok(Some(Val::Float(result)))
}

fn complex_op(op: BinaryOp, a: Complex64, b: Complex64) -> EvalResult<Option<Val>> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(Throw::zero_division("complex division by zero"));
            }
            a / b
        }
        BinaryOp::Pow => {
            if b.is_zero() {
                Complex64::new(1.0, 0.0)
            } else if a.is_zero() {
                if b.im != 0.0 || b.re < 0.0 {
                    return Err(Throw::zero_division(
                        "0.0 to a negative or complex power",
                    ));
                }
                Complex64::default()
            } else {
                a.powc(b)
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(Val::Complex(result)))
}

/// Numeric binary operation, or `None` when an operand is not a number
fn arithmetic(op: BinaryOp, left: &Val, right: &Val) -> EvalResult<Option<Val>> {
    if let (Val::Bool(a), Val::Bool(b)) = (left, right) {
        match op {
            BinaryOp::BitAnd => return Ok(Some(Val::Bool(a & b))),
            BinaryOp::BitOr => return Ok(Some(Val::Bool(a | b))),
            BinaryOp::BitXor => return Ok(Some(Val::Bool(a ^ b))),
            _ => {}
        }
    }
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Ok(None);
    };
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => int_op(op, a, b).map(Some),
        (Num::Complex(_), _) | (_, Num::Complex(_)) => {
            complex_op(op, a.to_complex(), b.to_complex())
        }
        _ => float_op(op, a.to_f64(), b.to_f64()),
    }
}

fn dunder(op: BinaryOp) -> (&'static str, &'static str) {
    match op {
        BinaryOp::Add => ("__add__", "__radd__"),
        BinaryOp::Sub => ("__sub__", "__rsub__"),
        BinaryOp::Mul => ("__mul__", "__rmul__"),
        BinaryOp::Div => ("__truediv__", "__rtruediv__"),
        BinaryOp::FloorDiv => ("__floordiv__", "__rfloordiv__"),
        BinaryOp::Mod => ("__mod__", "__rmod__"),
        BinaryOp::Pow => ("__pow__", "__rpow__"),
        BinaryOp::BitAnd => ("__and__", "__rand__"),
        BinaryOp::BitOr => ("__or__", "__ror__"),
        BinaryOp::BitXor => ("__xor__", "__rxor__"),
        BinaryOp::LShift => ("__lshift__", "__rlshift__"),
        BinaryOp::RShift => ("__rshift__", "__rrshift__"),
    }
}

fn inplace_dunder(op: BinaryOp) -> String {
    format!("__i{}", &dunder(op).0[2..])
}

/// Method on an instance's class, if the value is an instance
fn special_method(value: &Val, name: &str) -> Option<Val> {
    match value {
        Val::Instance(instance) => instance.class.lookup(name),
        _ => None,
    }
}

const IN_COMPARISON: &str = "in comparison";

fn repeat_count(value: &Val) -> Option<i64> {
    match value {
        Val::Int(_) | Val::Bool(_) => value.as_int(),
        _ => None,
    }
}

impl Interpreter<'_> {
    pub(crate) fn binary_op(&mut self, op: BinaryOp, left: Val, right: Val) -> EvalResult {
        if let Some(result) = arithmetic(op, &left, &right)? {
            return Ok(result);
        }
        if let Some(result) = self.sequence_op(op, &left, &right)? {
            return Ok(result);
        }

        let (forward, reflected) = dunder(op);
        if let Some(method) = special_method(&left, forward) {
            return self.call(&method, Args::new(vec![left.clone(), right]));
        }
        if let Some(method) = special_method(&right, reflected) {
            return self.call(&method, Args::new(vec![right.clone(), left]));
        }

        Err(Throw::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )))
    }

    /// `target op= value`; lists extend in place
    pub(crate) fn inplace_op(&mut self, op: BinaryOp, left: Val, right: Val) -> EvalResult {
        if let (BinaryOp::Add, Val::List(items)) = (op, &left) {
            let extra = self.collect(&right)?;
            let mut items = items.lock();
            check_length(items.len() + extra.len())?;
            items.extend(extra);
            drop(items);
            return Ok(left);
        }
        if let Some(method) = special_method(&left, &inplace_dunder(op)) {
            return self.call(&method, Args::new(vec![left.clone(), right]));
        }
        self.binary_op(op, left, right)
    }

    fn sequence_op(&mut self, op: BinaryOp, left: &Val, right: &Val) -> EvalResult<Option<Val>> {
        let result = match (op, left, right) {
            (BinaryOp::Add, Val::Str(a), Val::Str(b)) => {
                check_length(a.len() + b.len())?;
                Val::from(format!("{}{}", a, b))
            }
            (BinaryOp::Add, Val::List(a), Val::List(b)) => {
                let mut items = a.lock().clone();
                let tail = b.lock().clone();
                check_length(items.len() + tail.len())?;
                items.extend(tail);
                Val::list(items)
            }
            (BinaryOp::Add, Val::Tuple(a), Val::Tuple(b)) => {
                check_length(a.len() + b.len())?;
                Val::tuple(a.iter().chain(b.iter()).cloned().collect())
            }
            (BinaryOp::Mul, seq, count) | (BinaryOp::Mul, count, seq)
                if repeat_count(count).is_some()
                    && matches!(seq, Val::Str(_) | Val::List(_) | Val::Tuple(_)) =>
            {
                let n = repeat_count(count).unwrap_or(0).max(0) as usize;
                self.repeat(seq, n)?
            }
            (BinaryOp::Mod, Val::Str(template), args) => {
                Val::from(self.printf(template, args)?)
            }
            (BinaryOp::BitOr, Val::Dict(a), Val::Dict(b)) => {
                let mut merged = a.lock().clone();
                let other = b.lock().clone();
                for (key, entry) in other.iter() {
                    merged.insert(key.clone(), entry.clone());
                }
                Val::dict(merged)
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn repeat(&mut self, seq: &Val, n: usize) -> EvalResult {
        Ok(match seq {
            Val::Str(s) => {
                check_length(s.len().saturating_mul(n))?;
                Val::from(s.repeat(n))
            }
            Val::List(items) => {
                let items = items.lock().clone();
                Val::list(self.repeat_items(&items, n)?)
            }
            Val::Tuple(items) => Val::tuple(self.repeat_items(items, n)?),
            other => other.clone(),
        })
    }

    /// `items * n`, polling the checkpoint between chunks
    fn repeat_items(&mut self, items: &[Val], n: usize) -> EvalResult<Vec<Val>> {
        check_length(items.len().saturating_mul(n))?;
        let mut out = Vec::new();
        if items.is_empty() {
            return Ok(out);
        }
        let per_chunk = (REPEAT_CHUNK / items.len()).max(1);
        let mut left = n;
        while left > 0 {
            self.check_interrupt()?;
            let count = left.min(per_chunk);
            out.reserve(count * items.len());
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            left -= count;
        }
        Ok(out)
    }

    pub(crate) fn unary_op(&mut self, op: UnaryOp, operand: Val) -> EvalResult {
        if op == UnaryOp::Not {
            return Ok(Val::Bool(!self.truthy(&operand)?));
        }
        let result = match (op, &operand) {
            (UnaryOp::Neg, Val::Int(i)) => {
                Some(Val::Int(i.checked_neg().ok_or_else(|| Throw::overflow("integer overflow"))?))
            }
            (UnaryOp::Neg, Val::Bool(b)) => Some(Val::Int(-(*b as i64))),
            (UnaryOp::Neg, Val::Float(f)) => Some(Val::Float(-f)),
            (UnaryOp::Neg, Val::Complex(c)) => Some(Val::Complex(-*c)),
            (UnaryOp::Pos, Val::Int(_) | Val::Float(_) | Val::Complex(_)) => Some(operand.clone()),
            (UnaryOp::Pos, Val::Bool(b)) => Some(Val::Int(*b as i64)),
            (UnaryOp::Invert, Val::Int(i)) => Some(Val::Int(!i)),
            (UnaryOp::Invert, Val::Bool(b)) => Some(Val::Int(!(*b as i64))),
            _ => None,
        };
        if let Some(result) = result {
            return Ok(result);
        }

        let (name, symbol) = match op {
            UnaryOp::Neg => ("__neg__", "-"),
            UnaryOp::Pos => ("__pos__", "+"),
            _ => ("__invert__", "~"),
        };
        if let Some(method) = special_method(&operand, name) {
            return self.call(&method, Args::new(vec![operand]));
        }
        Err(Throw::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            operand.type_name()
        )))
    }

    /* ===================== Comparison ===================== */

    pub(crate) fn compare(&mut self, op: CmpOp, left: &Val, right: &Val) -> EvalResult {
        Ok(match op {
            CmpOp::Eq => {
                if let Some(method) = special_method(left, "__eq__") {
                    return self.call(&method, Args::new(vec![left.clone(), right.clone()]));
                }
                Val::Bool(self.equals(left, right)?)
            }
            CmpOp::NotEq => {
                if let Some(method) = special_method(left, "__ne__") {
                    return self.call(&method, Args::new(vec![left.clone(), right.clone()]));
                }
                if let Some(method) = special_method(left, "__eq__") {
                    let eq = self.call(&method, Args::new(vec![left.clone(), right.clone()]))?;
                    return Ok(Val::Bool(!self.truthy(&eq)?));
                }
                Val::Bool(!self.equals(left, right)?)
            }
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
                return self.order(op, left, right)
            }
            CmpOp::In => Val::Bool(self.contains(right, left)?),
            CmpOp::NotIn => Val::Bool(!self.contains(right, left)?),
            CmpOp::Is => Val::Bool(left.is(right)),
            CmpOp::IsNot => Val::Bool(!left.is(right)),
        })
    }

    /// Structural equality
    pub(crate) fn equals(&mut self, left: &Val, right: &Val) -> EvalResult<bool> {
        if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
            return Ok(match (a, b) {
                (Num::Int(a), Num::Int(b)) => a == b,
                (Num::Complex(_), _) | (_, Num::Complex(_)) => a.to_complex() == b.to_complex(),
                _ => a.to_f64() == b.to_f64(),
            });
        }

        match (left, right) {
            (Val::Str(a), Val::Str(b)) => Ok(a == b),
            (Val::List(a), Val::List(b)) => {
                if std::sync::Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let a = a.lock().clone();
                let b = b.lock().clone();
                self.descend(IN_COMPARISON, |interp| interp.equal_items(&a, &b))
            }
            (Val::Tuple(a), Val::Tuple(b)) => {
                self.descend(IN_COMPARISON, |interp| interp.equal_items(a, b))
            }
            (Val::Dict(a), Val::Dict(b)) => {
                if std::sync::Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let a = a.lock().clone();
                let b = b.lock().clone();
                if a.len() != b.len() {
                    return Ok(false);
                }
                self.descend(IN_COMPARISON, |interp| {
                    for (key, (_, value)) in a.iter() {
                        let Some((_, other)) = b.get(key) else {
                            return Ok(false);
                        };
                        if !(value.is(other) || interp.equals(value, other)?) {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                })
            }
            (Val::Range(a), Val::Range(b)) => {
                let (la, lb) = (a.len(), b.len());
                Ok(la == lb && (la == 0 || (a.start == b.start && (la == 1 || a.step == b.step))))
            }
            (Val::Instance(_), _) | (_, Val::Instance(_)) => {
                for (value, other) in [(left, right), (right, left)] {
                    if let Some(method) = special_method(value, "__eq__") {
                        let eq = self.call(&method, Args::new(vec![value.clone(), other.clone()]))?;
                        return self.truthy(&eq);
                    }
                }
                Ok(left.is(right))
            }
            _ => Ok(left.is(right)),
        }
    }

    fn equal_items(&mut self, a: &[Val], b: &[Val]) -> EvalResult<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !(x.is(y) || self.equals(x, y)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `<`, `<=`, `>`, `>=`
    fn order(&mut self, op: CmpOp, left: &Val, right: &Val) -> EvalResult {
        let holds = |ordering: Ordering| match op {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::LtE => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };

        match (Num::of(left), Num::of(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => return Ok(Val::Bool(holds(a.cmp(&b)))),
            (Some(a), Some(b))
                if !matches!(a, Num::Complex(_)) && !matches!(b, Num::Complex(_)) =>
            {
                let ordering = a.to_f64().partial_cmp(&b.to_f64());
                return Ok(Val::Bool(ordering.is_some_and(holds)));
            }
            _ => {}
        }

        match (left, right) {
            (Val::Str(a), Val::Str(b)) => return Ok(Val::Bool(holds(a.cmp(b)))),
            (Val::List(a), Val::List(b)) => {
                let a = a.lock().clone();
                let b = b.lock().clone();
                return self.descend(IN_COMPARISON, |interp| interp.order_items(op, &a, &b));
            }
            (Val::Tuple(a), Val::Tuple(b)) => {
                let (a, b) = (a.clone(), b.clone());
                return self.descend(IN_COMPARISON, |interp| interp.order_items(op, &a, &b));
            }
            _ => {}
        }

        let (forward, reflected) = match op {
            CmpOp::Lt => ("__lt__", "__gt__"),
            CmpOp::LtE => ("__le__", "__ge__"),
            CmpOp::Gt => ("__gt__", "__lt__"),
            _ => ("__ge__", "__le__"),
        };
        if let Some(method) = special_method(left, forward) {
            return self.call(&method, Args::new(vec![left.clone(), right.clone()]));
        }
        if let Some(method) = special_method(right, reflected) {
            return self.call(&method, Args::new(vec![right.clone(), left.clone()]));
        }

        Err(Throw::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )))
    }

    /// Lexicographic ordering of sequences
    fn order_items(&mut self, op: CmpOp, a: &[Val], b: &[Val]) -> EvalResult {
        for (x, y) in a.iter().zip(b) {
            if !(x.is(y) || self.equals(x, y)?) {
                return self.order(op, x, y);
            }
        }
        self.order(op, &Val::from(a.len()), &Val::from(b.len()))
    }

    /// `a < b` as a Rust bool, for sorting and `min`/`max`
    pub(crate) fn less_than(&mut self, left: &Val, right: &Val) -> EvalResult<bool> {
        let result = self.order(CmpOp::Lt, left, right)?;
        self.truthy(&result)
    }

    /// `item in container`
    pub(crate) fn contains(&mut self, container: &Val, item: &Val) -> EvalResult<bool> {
        match container {
            Val::Str(haystack) => match item {
                Val::Str(needle) => Ok(haystack.contains(&**needle)),
                other => Err(Throw::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Val::List(items) => {
                let items = items.lock().clone();
                self.contains_item(&items, item)
            }
            Val::Tuple(items) => {
                let items = items.clone();
                self.contains_item(&items, item)
            }
            Val::Dict(map) => {
                let key = item.hash_key()?;
                Ok(map.lock().contains_key(&key))
            }
            Val::Range(range) => {
                let Some(n) = Num::of(item).and_then(|n| match n {
                    Num::Int(i) => Some(i),
                    Num::Float(f) if f.fract() == 0.0 => Some(f as i64),
                    _ => None,
                }) else {
                    return Ok(false);
                };
                let offset = n as i128 - range.start as i128;
                let step = range.step as i128;
                let index = offset / step;
                Ok(offset % step == 0 && index >= 0 && (index as u128) < range.len() as u128)
            }
            Val::Instance(_) => {
                if let Some(method) = special_method(container, "__contains__") {
                    let result =
                        self.call(&method, Args::new(vec![container.clone(), item.clone()]))?;
                    return self.truthy(&result);
                }
                self.contains_iterated(container, item)
            }
            Val::Iter(_) => self.contains_iterated(container, item),
            other => Err(Throw::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    fn contains_item(&mut self, items: &[Val], item: &Val) -> EvalResult<bool> {
        for candidate in items {
            if candidate.is(item) || self.equals(candidate, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn contains_iterated(&mut self, container: &Val, item: &Val) -> EvalResult<bool> {
        let mut cursor = self.iterate(container)?;
        while let Some(candidate) = self.next_item(&mut cursor)? {
            if candidate.is(item) || self.equals(&candidate, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Truth value, consulting `__bool__` and `__len__` on instances
    pub(crate) fn truthy(&mut self, value: &Val) -> EvalResult<bool> {
        if !matches!(value, Val::Instance(_)) {
            return Ok(value.is_truthy());
        }
        if let Some(method) = special_method(value, "__bool__") {
            return match self.call(&method, Args::new(vec![value.clone()]))? {
                Val::Bool(b) => Ok(b),
                other => Err(Throw::type_error(format!(
                    "__bool__ should return bool, returned {}",
                    other.type_name()
                ))),
            };
        }
        if let Some(method) = special_method(value, "__len__") {
            let len = self.call(&method, Args::new(vec![value.clone()]))?;
            return match len.as_int() {
                Some(n) => Ok(n != 0),
                None => Err(Throw::new(
                    ExcType::TypeError,
                    format!("'{}' object cannot be interpreted as an integer", len.type_name()),
                )),
            };
        }
        Ok(true)
    }
}
