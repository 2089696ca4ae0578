//! Core builtin functions

use super::exceptions::ExcType;
use super::{float_to_int, index_arg};
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, BuiltinType, HashKey, NativeFn, SuperProxy, Val};
use crate::interpreter::types::BinaryOp;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Core builtin by name
pub(crate) fn lookup(name: &str) -> Option<&'static NativeFn> {
    Some(match name {
        "abs" => native!("abs", abs),
        "all" => native!("all", all),
        "any" => native!("any", any),
        "callable" => native!("callable", callable),
        "chr" => native!("chr", chr),
        "divmod" => native!("divmod", divmod),
        "enumerate" => native!("enumerate", enumerate),
        "filter" => native!("filter", filter),
        "format" => native!("format", format),
        "hash" => native!("hash", hash),
        "id" => native!("id", id),
        "isinstance" => native!("isinstance", isinstance),
        "issubclass" => native!("issubclass", issubclass),
        "iter" => native!("iter", iter),
        "len" => native!("len", len),
        "map" => native!("map", map),
        "max" => native!("max", max),
        "min" => native!("min", min),
        "next" => native!("next", next),
        "ord" => native!("ord", ord),
        "pow" => native!("pow", pow),
        "print" => native!("print", print),
        "repr" => native!("repr", repr),
        "reversed" => native!("reversed", reversed),
        "round" => native!("round", round),
        "sorted" => native!("sorted", sorted),
        "sum" => native!("sum", sum),
        "zip" => native!("zip", zip),
        "super" => native!("super", super_),
        _ => return None,
    })
}

/// `object.__init__`
pub(crate) fn object_init() -> &'static NativeFn {
    native!("__init__", object_init_impl)
}

/// `BaseException.__init__`
pub(crate) fn exception_init() -> &'static NativeFn {
    native!("__init__", exception_init_impl)
}

fn object_init_impl(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    if args.len() <= 1 && args.keywords.is_empty() {
        return Ok(Val::None);
    }
    let Some(Val::Instance(instance)) = args.get(0) else {
        return Err(Throw::type_error("descriptor '__init__' requires an 'object'"));
    };
    let inherited = matches!(
        instance.class.lookup("__init__"),
        Some(Val::Native(native)) if std::ptr::eq(native, object_init())
    );
    if inherited {
        Err(Throw::type_error(format!("{}() takes no arguments", instance.class.name)))
    } else {
        Err(Throw::type_error(
            "object.__init__() takes exactly one argument (the instance to initialize)",
        ))
    }
}

fn exception_init_impl(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    if !args.keywords.is_empty() {
        return Err(Throw::type_error(
            "BaseException.__init__() takes no keyword arguments",
        ));
    }
    let mut positional = args.positional.into_iter();
    if let Some(Val::Instance(instance)) = positional.next() {
        instance
            .attrs
            .lock()
            .insert(Arc::from("args"), Val::tuple(positional.collect()));
    }
    Ok(Val::None)
}

/* ===================== Numbers ===================== */

fn abs(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("abs", 1, 1)?;
    let value = &args.positional[0];
    match value {
        Val::Int(i) => i
            .checked_abs()
            .map(Val::Int)
            .ok_or_else(|| Throw::overflow("integer overflow")),
        Val::Bool(b) => Ok(Val::Int(*b as i64)),
        Val::Float(f) => Ok(Val::Float(f.abs())),
        Val::Complex(c) => Ok(Val::Float(c.norm())),
        Val::Instance(instance) => match instance.class.lookup("__abs__") {
            Some(method) => interp.call(&method, Args::new(vec![value.clone()])),
            None => Err(bad_operand("abs", value)),
        },
        other => Err(bad_operand("abs", other)),
    }
}

fn bad_operand(name: &str, value: &Val) -> Throw {
    Throw::type_error(format!(
        "bad operand type for {}(): '{}'",
        name,
        value.type_name()
    ))
}

fn divmod(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("divmod", 2, 2)?;
    let (a, b) = (args.positional[0].clone(), args.positional[1].clone());
    let quotient = interp.binary_op(BinaryOp::FloorDiv, a.clone(), b.clone())?;
    let remainder = interp.binary_op(BinaryOp::Mod, a, b)?;
    Ok(Val::tuple(vec![quotient, remainder]))
}

fn pow(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let modulus = args.take_keyword("mod");
    args.check("pow", 2, 3)?;
    let modulus = modulus.or_else(|| args.get(2).cloned()).unwrap_or(Val::None);
    let (base, exp) = (args.positional[0].clone(), args.positional[1].clone());
    if matches!(modulus, Val::None) {
        return interp.binary_op(BinaryOp::Pow, base, exp);
    }

    let (Some(base), Some(exp), Some(modulus)) = (base.as_int(), exp.as_int(), modulus.as_int())
    else {
        return Err(Throw::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if modulus == 0 {
        return Err(Throw::value_error("pow() 3rd argument cannot be 0"));
    }
    let m = modulus as i128;
    let mut base = (base as i128).rem_euclid(m.abs());
    let mut exp = exp as i128;
    if exp < 0 {
        base = mod_inverse(base, m.abs()).ok_or_else(|| {
            Throw::value_error("base is not invertible for the given modulus")
        })?;
        exp = -exp;
    }
    let mut result: i128 = 1 % m.abs();
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % m.abs();
        }
        base = base * base % m.abs();
        exp >>= 1;
    }
    // The result takes the sign of the modulus
    if m < 0 && result != 0 {
        result += m;
    }
    Ok(Val::Int(result as i64))
}

fn mod_inverse(a: i128, m: i128) -> Option<i128> {
    let (mut old_r, mut r) = (a, m);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    (old_r == 1).then(|| old_s.rem_euclid(m))
}

/// Round to `ndigits` decimal places using the exact binary value
///
/// Halfway cases go to the even neighbour, so `round(2.675, 2)` is 2.67:
/// the stored double sits just below the midpoint.
fn round_float(f: f64, ndigits: i64) -> f64 {
    if !f.is_finite() || ndigits > 400 {
        return f;
    }
    if ndigits >= 0 {
        let text = format!("{:.*}", ndigits as usize, f);
        return text.parse().unwrap_or(f);
    }
    if ndigits < -400 {
        return 0.0f64.copysign(f);
    }

    // Only the integer digits matter; a non-zero fraction breaks ties upward
    let magnitude = f.abs();
    let whole = magnitude.trunc();
    let digits = format!("{:.0}", whole);
    let places = (-ndigits) as usize;
    if places > digits.len() {
        return 0.0f64.copysign(f);
    }
    let (high, low) = digits.split_at(digits.len() - places);
    let half = format!("5{}", "0".repeat(places - 1));
    let last_is_odd = high
        .bytes()
        .last()
        .is_some_and(|d| (d - b'0') % 2 == 1);
    let up = match low.cmp(half.as_str()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => magnitude != whole || last_is_odd,
    };

    let mut kept: Vec<u8> = if high.is_empty() { b"0".to_vec() } else { high.as_bytes().to_vec() };
    if up {
        let mut i = kept.len();
        loop {
            if i == 0 {
                kept.insert(0, b'1');
                break;
            }
            i -= 1;
            if kept[i] == b'9' {
                kept[i] = b'0';
            } else {
                kept[i] += 1;
                break;
            }
        }
    }
    let text = format!("{}{}", String::from_utf8_lossy(&kept), "0".repeat(places));
    text.parse::<f64>().map_or(f, |rounded| rounded.copysign(f))
}

fn round(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let ndigits = args.take_keyword("ndigits");
    args.check("round", 1, 2)?;
    let ndigits = match ndigits.or_else(|| args.get(1).cloned()) {
        None | Some(Val::None) => None,
        Some(n) => Some(index_arg(&n)?),
    };
    let value = args.positional[0].clone();

    match (&value, ndigits) {
        (Val::Int(_) | Val::Bool(_), None) => Ok(Val::Int(value.as_int().unwrap_or_default())),
        (Val::Int(_) | Val::Bool(_), Some(n)) if n >= 0 => {
            Ok(Val::Int(value.as_int().unwrap_or_default()))
        }
        (Val::Int(_) | Val::Bool(_), Some(n)) => {
            let i = value.as_int().unwrap_or_default() as i128;
            let Some(unit) = u32::try_from(-n).ok().and_then(|e| 10i128.checked_pow(e)) else {
                return Ok(Val::Int(0));
            };
            let floor = i.div_euclid(unit) * unit;
            let rest = i - floor;
            let rounded = match (rest * 2).cmp(&unit) {
                std::cmp::Ordering::Less => floor,
                std::cmp::Ordering::Greater => floor + unit,
                std::cmp::Ordering::Equal if (floor / unit) % 2 == 0 => floor,
                std::cmp::Ordering::Equal => floor + unit,
            };
            i64::try_from(rounded)
                .map(Val::Int)
                .map_err(|_| Throw::overflow("integer overflow"))
        }
        (Val::Float(f), None) => float_to_int(f.round_ties_even()).map(Val::Int),
        (Val::Float(f), Some(n)) => Ok(Val::Float(round_float(*f, n))),
        (Val::Instance(instance), _) => match instance.class.lookup("__round__") {
            Some(method) => {
                let mut call = vec![value.clone()];
                if let Some(n) = ndigits {
                    call.push(Val::Int(n));
                }
                interp.call(&method, Args::new(call))
            }
            None => Err(no_round(&value)),
        },
        _ => Err(no_round(&value)),
    }
}

fn no_round(value: &Val) -> Throw {
    Throw::type_error(format!(
        "type {} doesn't define __round__ method",
        value.type_name()
    ))
}

fn sum(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let start = args.take_keyword("start");
    args.check("sum", 1, 2)?;
    let mut total = start.or_else(|| args.get(1).cloned()).unwrap_or(Val::Int(0));
    if matches!(total, Val::Str(_)) {
        return Err(Throw::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    let mut cursor = interp.iterate(&args.positional[0])?;
    while let Some(item) = interp.next_item(&mut cursor)? {
        total = interp.binary_op(BinaryOp::Add, total, item)?;
    }
    Ok(total)
}

/* ===================== Characters ===================== */

fn chr(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("chr", 1, 1)?;
    let code = index_arg(&args.positional[0])?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Val::from(c.to_string()))
        .ok_or_else(|| Throw::value_error("chr() arg not in range(0x110000)"))
}

fn ord(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("ord", 1, 1)?;
    match &args.positional[0] {
        Val::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Val::Int(c as i64)),
                _ => Err(Throw::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
            }
        }
        other => Err(Throw::type_error(format!(
            "ord() expected string of length 1, but {} found",
            other.type_name()
        ))),
    }
}

/* ===================== Objects ===================== */

fn callable(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("callable", 1, 1)?;
    Ok(Val::Bool(args.positional[0].is_callable()))
}

fn format(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("format", 1, 2)?;
    let spec = match args.get(1) {
        None => String::new(),
        Some(Val::Str(s)) => s.to_string(),
        Some(other) => {
            return Err(Throw::type_error(format!(
                "format() argument 2 must be str, not {}",
                other.type_name()
            )))
        }
    };
    interp
        .format_value(&args.positional[0], &spec)
        .map(Val::from)
}

fn hash(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("hash", 1, 1)?;
    let key = args.positional[0].hash_key()?;
    Ok(Val::Int(match key {
        HashKey::Int(i) => i,
        other => {
            let mut hasher = DefaultHasher::new();
            other.hash(&mut hasher);
            hasher.finish() as i64
        }
    }))
}

fn id(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("id", 1, 1)?;
    let value = &args.positional[0];
    let id = match value.addr() {
        Some(addr) => addr as i64,
        None => {
            let mut hasher = DefaultHasher::new();
            value.hash_key().ok().hash(&mut hasher);
            (hasher.finish() >> 1) as i64
        }
    };
    Ok(Val::Int(id))
}

fn repr(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("repr", 1, 1)?;
    interp.repr(&args.positional[0]).map(Val::from)
}

fn len(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("len", 1, 1)?;
    let value = &args.positional[0];
    let n = match value {
        Val::Str(s) => s.chars().count(),
        Val::List(items) => items.lock().len(),
        Val::Tuple(items) => items.len(),
        Val::Dict(map) => map.lock().len(),
        Val::Range(range) => range.len(),
        Val::Instance(instance) => {
            let Some(method) = instance.class.lookup("__len__") else {
                return Err(no_len(value));
            };
            let result = interp.call(&method, Args::new(vec![value.clone()]))?;
            return match result.as_int() {
                Some(n) if n >= 0 => Ok(Val::Int(n)),
                Some(_) => Err(Throw::value_error("__len__() should return >= 0")),
                None => Err(Throw::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    result.type_name()
                ))),
            };
        }
        other => return Err(no_len(other)),
    };
    Ok(Val::from(n))
}

fn no_len(value: &Val) -> Throw {
    Throw::type_error(format!("object of type '{}' has no len()", value.type_name()))
}

/// Whether `value` is an instance of the type or class `kind`
pub(crate) fn is_instance(interp: &Interpreter<'_>, value: &Val, kind: &Val) -> EvalResult<bool> {
    match kind {
        Val::Class(class) => Ok(match value {
            Val::Instance(instance) => instance.class.is_subclass(class),
            _ => Arc::ptr_eq(class, &interp.machine.object),
        }),
        Val::Type(ty) => Ok(match value {
            Val::Instance(_) => false,
            Val::Class(_) | Val::Type(_) => *ty == BuiltinType::Type,
            other => other.builtin_type().is_subtype(*ty),
        }),
        Val::Tuple(kinds) => {
            for kind in kinds.iter() {
                if is_instance(interp, value, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Throw::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

fn isinstance(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isinstance", 2, 2)?;
    is_instance(interp, &args.positional[0], &args.positional[1]).map(Val::Bool)
}

fn is_subclass(interp: &Interpreter<'_>, class: &Val, kind: &Val) -> EvalResult<bool> {
    match (class, kind) {
        (_, Val::Tuple(kinds)) => {
            for kind in kinds.iter() {
                if is_subclass(interp, class, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Val::Class(class), Val::Class(expected)) => Ok(class.is_subclass(expected)),
        (Val::Class(_), Val::Type(_)) => Ok(false),
        (Val::Type(_), Val::Class(expected)) => Ok(Arc::ptr_eq(expected, &interp.machine.object)),
        (Val::Type(ty), Val::Type(expected)) => Ok(ty.is_subtype(*expected)),
        (Val::Class(_) | Val::Type(_), _) => Err(Throw::type_error(
            "issubclass() arg 2 must be a class, a tuple of classes, or a union",
        )),
        _ => Err(Throw::type_error("issubclass() arg 1 must be a class")),
    }
}

fn issubclass(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("issubclass", 2, 2)?;
    is_subclass(interp, &args.positional[0], &args.positional[1]).map(Val::Bool)
}

fn super_(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("super", 0, 2)?;
    match (args.get(0), args.get(1)) {
        (Some(Val::Class(class)), Some(receiver)) => {
            let ok = match receiver {
                Val::Instance(instance) => instance.class.is_subclass(class),
                Val::Class(other) => other.is_subclass(class),
                _ => false,
            };
            if !ok {
                return Err(Throw::type_error(
                    "super(type, obj): obj must be an instance or subtype of type",
                ));
            }
            Ok(Val::Super(Arc::new(SuperProxy {
                class: class.clone(),
                receiver: receiver.clone(),
            })))
        }
        (Some(other), Some(_)) => Err(Throw::type_error(format!(
            "super() argument 1 must be a type, not {}",
            other.type_name()
        ))),
        _ => Err(Throw::new(ExcType::RuntimeError, "super(): no arguments")),
    }
}

/* ===================== Iteration ===================== */

fn all(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("all", 1, 1)?;
    let mut cursor = interp.iterate(&args.positional[0])?;
    while let Some(item) = interp.next_item(&mut cursor)? {
        if !interp.truthy(&item)? {
            return Ok(Val::Bool(false));
        }
    }
    Ok(Val::Bool(true))
}

fn any(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("any", 1, 1)?;
    let mut cursor = interp.iterate(&args.positional[0])?;
    while let Some(item) = interp.next_item(&mut cursor)? {
        if interp.truthy(&item)? {
            return Ok(Val::Bool(true));
        }
    }
    Ok(Val::Bool(false))
}

fn enumerate(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let start = args.take_keyword("start");
    args.check("enumerate", 1, 2)?;
    let mut n = match start.or_else(|| args.get(1).cloned()) {
        Some(start) => index_arg(&start)?,
        None => 0,
    };
    let items = interp.collect(&args.positional[0])?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(Val::tuple(vec![Val::Int(n), item]));
        n += 1;
    }
    Ok(Val::iter(out))
}

fn filter(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("filter", 2, 2)?;
    let predicate = args.positional[0].clone();
    let mut cursor = interp.iterate(&args.positional[1])?;
    let mut out = Vec::new();
    while let Some(item) = interp.next_item(&mut cursor)? {
        let keep = match &predicate {
            Val::None => interp.truthy(&item)?,
            func => {
                let result = interp.call(func, Args::new(vec![item.clone()]))?;
                interp.truthy(&result)?
            }
        };
        if keep {
            out.push(item);
        }
    }
    Ok(Val::iter(out))
}

fn map(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    if args.len() < 2 {
        return Err(Throw::type_error("map() must have at least two arguments."));
    }
    args.check("map", 2, usize::MAX)?;
    let func = args.positional[0].clone();
    let mut cursors = Vec::with_capacity(args.len() - 1);
    for iterable in &args.positional[1..] {
        cursors.push(interp.iterate(iterable)?);
    }
    let mut out = Vec::new();
    'rows: loop {
        let mut row = Vec::with_capacity(cursors.len());
        for cursor in cursors.iter_mut() {
            match interp.next_item(cursor)? {
                Some(item) => row.push(item),
                None => break 'rows,
            }
        }
        out.push(interp.call(&func, Args::new(row))?);
    }
    Ok(Val::iter(out))
}

fn zip(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let strict = match args.take_keyword("strict") {
        Some(value) => interp.truthy(&value)?,
        None => false,
    };
    args.check("zip", 0, usize::MAX)?;
    if args.len() == 0 {
        return Ok(Val::iter(Vec::new()));
    }
    let mut columns = Vec::with_capacity(args.len());
    for iterable in &args.positional {
        columns.push(interp.collect(iterable)?);
    }
    let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
    if strict {
        let first = columns[0].len();
        if let Some(n) = columns.iter().position(|c| c.len() != first) {
            let others = if n == 1 {
                "argument 1".to_string()
            } else {
                format!("arguments 1-{}", n)
            };
            return Err(Throw::value_error(format!(
                "zip() argument {} is {} than {}",
                n + 1,
                if columns[n].len() > first { "longer" } else { "shorter" },
                others
            )));
        }
    }
    let rows = (0..shortest)
        .map(|i| Val::tuple(columns.iter().map(|column| column[i].clone()).collect()))
        .collect();
    Ok(Val::iter(rows))
}

fn iter(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("iter", 1, 1)?;
    let value = &args.positional[0];
    match value {
        Val::Iter(_) => Ok(value.clone()),
        Val::Instance(instance) => match instance.class.lookup("__iter__") {
            Some(method) => interp.call(&method, Args::new(vec![value.clone()])),
            None => Err(Throw::type_error(format!(
                "'{}' object is not iterable",
                value.type_name()
            ))),
        },
        other => interp.collect(other).map(Val::iter),
    }
}

fn next(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("next", 1, 2)?;
    let value = &args.positional[0];
    let default = args.get(1).cloned();
    let item = match value {
        Val::Iter(state) => state.lock().next(),
        Val::Instance(instance) => {
            let Some(method) = instance.class.lookup("__next__") else {
                return Err(not_an_iterator(value));
            };
            match interp.call(&method, Args::new(vec![value.clone()])) {
                Ok(item) => Some(item),
                Err(err) if default.is_some() && is_stop(&err) => None,
                Err(err) => return Err(err),
            }
        }
        other => return Err(not_an_iterator(other)),
    };
    match (item, default) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Throw::with_args(ExcType::StopIteration, Vec::new())),
    }
}

fn not_an_iterator(value: &Val) -> Throw {
    Throw::type_error(format!("'{}' object is not an iterator", value.type_name()))
}

fn is_stop(err: &Throw) -> bool {
    use crate::interpreter::control::Exc;
    match err {
        Throw::Exception(raised) => match &raised.exc {
            Exc::Pending { ty, .. } => *ty == ExcType::StopIteration,
            Exc::Object(Val::Instance(instance)) => {
                instance.class.exception_type() == Some(ExcType::StopIteration)
            }
            Exc::Object(_) => false,
        },
        Throw::Interrupt(_) => false,
    }
}

fn reversed(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("reversed", 1, 1)?;
    let value = &args.positional[0];
    match value {
        Val::List(_) | Val::Tuple(_) | Val::Str(_) | Val::Range(_) | Val::Dict(_) => {
            let mut items = interp.collect(value)?;
            items.reverse();
            Ok(Val::iter(items))
        }
        Val::Instance(instance) => match instance.class.lookup("__reversed__") {
            Some(method) => interp.call(&method, Args::new(vec![value.clone()])),
            None => Err(not_reversible(value)),
        },
        other => Err(not_reversible(other)),
    }
}

fn not_reversible(value: &Val) -> Throw {
    Throw::type_error(format!("'{}' object is not reversible", value.type_name()))
}

fn sorted(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let key = args.take_keyword("key");
    let reverse = match args.take_keyword("reverse") {
        Some(value) => interp.truthy(&value)?,
        None => false,
    };
    args.check("sorted", 1, 1)?;
    let items = interp.collect(&args.positional[0])?;
    sort_values(interp, items, key, reverse).map(Val::list)
}

/// Stable sort with an optional key function; shared with `list.sort`
pub(crate) fn sort_values(
    interp: &mut Interpreter<'_>,
    items: Vec<Val>,
    key: Option<Val>,
    reverse: bool,
) -> EvalResult<Vec<Val>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let k = match &key {
            None | Some(Val::None) => item.clone(),
            Some(func) => interp.call(func, Args::new(vec![item.clone()]))?,
        };
        keyed.push((k, item));
    }
    let sorted = merge_sort(interp, keyed, reverse)?;
    Ok(sorted.into_iter().map(|(_, item)| item).collect())
}

fn merge_sort(
    interp: &mut Interpreter<'_>,
    mut items: Vec<(Val, Val)>,
    reverse: bool,
) -> EvalResult<Vec<(Val, Val)>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, reverse)?;
    let right = merge_sort(interp, right, reverse)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        // Equal keys keep their original order in both directions
        let take_right = if reverse {
            interp.less_than(&l.0, &r.0)?
        } else {
            interp.less_than(&r.0, &l.0)?
        };
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

/// `min` and `max`
fn extreme(interp: &mut Interpreter<'_>, mut args: Args, name: &str, want_max: bool) -> EvalResult {
    let key = args.take_keyword("key");
    let default = args.take_keyword("default");
    if args.len() == 0 {
        return Err(Throw::type_error(format!(
            "{} expected at least 1 argument, got 0",
            name
        )));
    }
    args.check(name, 1, usize::MAX)?;

    let items = if args.len() == 1 {
        interp.collect(&args.positional[0])?
    } else {
        if default.is_some() {
            return Err(Throw::type_error(format!(
                "Cannot specify a default for {}() with multiple positional arguments",
                name
            )));
        }
        args.positional
    };

    let mut best: Option<(Val, Val)> = None;
    for item in items {
        let k = match &key {
            None | Some(Val::None) => item.clone(),
            Some(func) => interp.call(func, Args::new(vec![item.clone()]))?,
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) if want_max => interp.less_than(best_key, &k)?,
            Some((best_key, _)) => interp.less_than(&k, best_key)?,
        };
        if replace {
            best = Some((k, item));
        }
    }
    match (best, default) {
        (Some((_, item)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Throw::value_error(format!(
            "{}() arg is an empty sequence",
            name
        ))),
    }
}

fn max(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    extreme(interp, args, "max", true)
}

fn min(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    extreme(interp, args, "min", false)
}

/* ===================== Output ===================== */

fn print(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let sep = text_keyword(args.take_keyword("sep"), "sep", " ")?;
    let end = text_keyword(args.take_keyword("end"), "end", "\n")?;
    args.take_keyword("flush");
    args.check("print", 0, usize::MAX)?;

    let mut parts = Vec::with_capacity(args.len());
    for value in &args.positional {
        parts.push(interp.to_str(value)?);
    }
    let mut line = parts.join(&sep);
    line.push_str(&end);
    interp.machine.output.write(&line);
    Ok(Val::None)
}

fn text_keyword(value: Option<Val>, name: &str, default: &str) -> EvalResult<String> {
    match value {
        None | Some(Val::None) => Ok(default.to_string()),
        Some(Val::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(Throw::type_error(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_inverse() {
        assert_eq!(mod_inverse(3, 7), Some(5));
        assert_eq!(mod_inverse(2, 4), None);
    }

    #[test]
    fn test_every_core_name_resolves() {
        for name in ["len", "print", "sorted", "zip", "super", "isinstance"] {
            assert_eq!(lookup(name).map(|f| f.name), Some(name));
        }
        assert!(lookup("eval").is_none());
    }
}
