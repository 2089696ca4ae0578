//! Built-in names
//!
//! Core functions are always present. The reflection and execution
//! builtins (`getattr`, `eval`, ...) resolve only when the capability set
//! enables them, so a script cannot reach one it was not granted even by
//! spelling its name.

pub(crate) mod exceptions;
pub(crate) mod functions;
pub(crate) mod methods;
mod reflection;

use crate::capability::CapabilitySet;
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, BuiltinType, Class, DictMap, Namespace, RangeVal, Val};
use crate::value::Complex64;
use std::num::IntErrorKind;

/// Resolve a builtin name under the given capabilities
pub(crate) fn lookup(name: &str, caps: &CapabilitySet) -> Option<Val> {
    if let Some(native) = functions::lookup(name) {
        return Some(Val::Native(native));
    }
    if let Some(ty) = BuiltinType::CONSTRUCTORS.into_iter().find(|t| t.name() == name) {
        return Some(Val::Type(ty));
    }
    if caps.allows_builtin_named(name) {
        return reflection::lookup(name).map(Val::Native);
    }
    None
}

/// Type of a value as a guest object
pub(crate) fn type_of(value: &Val) -> Val {
    match value {
        Val::Instance(instance) => Val::Class(instance.class.clone()),
        other => Val::Type(other.builtin_type()),
    }
}

/* ===================== Constructors ===================== */

/// Call a built-in type: `int("3")`, `list(range(3))`, `type(x)`
pub(crate) fn construct(interp: &mut Interpreter<'_>, ty: BuiltinType, mut args: Args) -> EvalResult {
    match ty {
        BuiltinType::Bool => {
            args.check("bool", 0, 1)?;
            match args.get(0) {
                Some(value) => Ok(Val::Bool(interp.truthy(value)?)),
                None => Ok(Val::Bool(false)),
            }
        }

        BuiltinType::Int => {
            let base = args.take_keyword("base");
            args.check("int", 0, 2)?;
            let base = match base.or_else(|| args.get(1).cloned()) {
                Some(b) => Some(index_arg(&b)?),
                None => None,
            };
            match (args.get(0), base) {
                (None, _) => Ok(Val::Int(0)),
                (Some(Val::Str(s)), base) => parse_int(s, base.unwrap_or(10)).map(Val::Int),
                (Some(_), Some(_)) => Err(Throw::type_error(
                    "int() can't convert non-string with explicit base",
                )),
                (Some(value), None) => to_int(interp, value),
            }
        }

        BuiltinType::Float => {
            args.check("float", 0, 1)?;
            match args.get(0) {
                None => Ok(Val::Float(0.0)),
                Some(Val::Str(s)) => parse_float(s).map(Val::Float),
                Some(value) => to_float(interp, value),
            }
        }

        BuiltinType::Complex => {
            let real = args.take_keyword("real");
            let imag = args.take_keyword("imag");
            args.check("complex", 0, 2)?;
            let real = real.or_else(|| args.get(0).cloned()).unwrap_or(Val::Int(0));
            let imag = imag.or_else(|| args.get(1).cloned()).unwrap_or(Val::Int(0));
            if let Val::Str(s) = &real {
                return parse_float(s)
                    .map(|re| Val::Complex(Complex64::new(re, 0.0)))
                    .map_err(|_| Throw::value_error("complex() arg is a malformed string"));
            }
            let part = |value: &Val| -> EvalResult<Complex64> {
                match value {
                    Val::Complex(c) => Ok(*c),
                    other => other.as_float().map(Complex64::from).ok_or_else(|| {
                        Throw::type_error(format!(
                            "complex() argument must be a string or a number, not '{}'",
                            other.type_name()
                        ))
                    }),
                }
            };
            let (re, im) = (part(&real)?, part(&imag)?);
            Ok(Val::Complex(Complex64::new(re.re - im.im, re.im + im.re)))
        }

        BuiltinType::Str => {
            args.check("str", 0, 1)?;
            match args.get(0) {
                None => Ok(Val::from("")),
                Some(value) => interp.to_str(value).map(Val::from),
            }
        }

        BuiltinType::List => {
            args.check("list", 0, 1)?;
            match args.get(0) {
                None => Ok(Val::list(Vec::new())),
                Some(value) => interp.collect(value).map(Val::list),
            }
        }

        BuiltinType::Tuple => {
            args.check("tuple", 0, 1)?;
            match args.get(0) {
                None => Ok(Val::tuple(Vec::new())),
                Some(Val::Tuple(items)) => Ok(Val::Tuple(items.clone())),
                Some(value) => interp.collect(value).map(Val::tuple),
            }
        }

        BuiltinType::Dict => {
            let keywords = std::mem::take(&mut args.keywords);
            args.check("dict", 0, 1)?;
            let mut map = match args.get(0) {
                None => DictMap::new(),
                Some(source) => dict_entries(interp, source)?,
            };
            for (key, value) in keywords {
                let key = Val::Str(key);
                map.insert(key.hash_key()?, (key, value));
            }
            Ok(Val::dict(map))
        }

        BuiltinType::Range => {
            args.check("range", 1, 3)?;
            let mut bounds = Vec::with_capacity(3);
            for value in &args.positional {
                bounds.push(index_arg(value)?);
            }
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => (0, 0, 1),
            };
            if step == 0 {
                return Err(Throw::value_error("range() arg 3 must not be zero"));
            }
            Ok(Val::Range(RangeVal { start, stop, step }))
        }

        BuiltinType::Type => match args.len() {
            1 if args.keywords.is_empty() => Ok(type_of(&args.positional[0])),
            3 => new_class(interp, args),
            _ => Err(Throw::type_error("type() takes 1 or 3 arguments")),
        },

        other => Err(Throw::type_error(format!(
            "cannot create '{}' instances",
            other.name()
        ))),
    }
}

/// `type(name, bases, namespace)`
fn new_class(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let (Some(Val::Str(name)), Some(Val::Tuple(bases)), Some(Val::Dict(namespace))) =
        (args.get(0), args.get(1), args.get(2))
    else {
        return Err(Throw::type_error(
            "type() argument 1 must be str, argument 2 a tuple, argument 3 a dict",
        ));
    };

    let mut classes = Vec::with_capacity(bases.len());
    for base in bases.iter() {
        match base {
            Val::Class(class) => classes.push(class.clone()),
            other => {
                return Err(Throw::type_error(format!(
                    "bases must be classes, not '{}'",
                    other.type_name()
                )))
            }
        }
    }
    if classes.is_empty() {
        classes.push(interp.machine.object.clone());
    }

    let mut attrs = Namespace::new();
    for (key, value) in namespace.lock().values() {
        let Val::Str(key) = key else {
            return Err(Throw::type_error("type() namespace keys must be strings"));
        };
        attrs.insert(key.clone(), value.clone());
    }
    let class = Class::new(name, classes, attrs, None).map_err(Throw::type_error)?;
    Ok(Val::Class(class))
}

/// Entries for `dict(source)`: a dict or an iterable of pairs
fn dict_entries(interp: &mut Interpreter<'_>, source: &Val) -> EvalResult<DictMap> {
    if let Val::Dict(map) = source {
        return Ok(map.lock().clone());
    }
    let mut map = DictMap::new();
    let items = interp.collect(source)?;
    for (n, item) in items.iter().enumerate() {
        let pair = match item {
            Val::List(_) | Val::Tuple(_) | Val::Str(_) => interp.collect(item)?,
            _ => {
                return Err(Throw::type_error(format!(
                    "cannot convert dictionary update sequence element #{} to a sequence",
                    n
                )))
            }
        };
        let [key, value] = <[Val; 2]>::try_from(pair).map_err(|pair| {
            Throw::value_error(format!(
                "dictionary update sequence element #{} has length {}; 2 is required",
                n,
                pair.len()
            ))
        })?;
        map.insert(key.hash_key()?, (key, value));
    }
    Ok(map)
}

/// An integer argument where the language requires one
pub(crate) fn index_arg(value: &Val) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        Throw::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/* ===================== Numeric Conversion ===================== */

/// `int(value)` for non-string values
fn to_int(interp: &mut Interpreter<'_>, value: &Val) -> EvalResult {
    match value {
        Val::Int(i) => Ok(Val::Int(*i)),
        Val::Bool(b) => Ok(Val::Int(*b as i64)),
        Val::Float(f) => float_to_int(*f).map(Val::Int),
        Val::Instance(instance) => match instance.class.lookup("__int__") {
            Some(method) => interp.call(&method, Args::new(vec![value.clone()])),
            None => Err(int_type_error(value)),
        },
        other => Err(int_type_error(other)),
    }
}

fn int_type_error(value: &Val) -> Throw {
    Throw::type_error(format!(
        "int() argument must be a string, a bytes-like object or a real number, not '{}'",
        value.type_name()
    ))
}

/// Truncate a float toward zero
pub(crate) fn float_to_int(f: f64) -> EvalResult<i64> {
    if f.is_nan() {
        return Err(Throw::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Throw::overflow("cannot convert float infinity to integer"));
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(Throw::overflow("int too large to convert"));
    }
    Ok(t as i64)
}

/// `float(value)` for non-string values
fn to_float(interp: &mut Interpreter<'_>, value: &Val) -> EvalResult {
    match value {
        Val::Float(f) => Ok(Val::Float(*f)),
        Val::Int(_) | Val::Bool(_) => Ok(Val::Float(value.as_float().unwrap_or_default())),
        Val::Instance(instance) => match instance.class.lookup("__float__") {
            Some(method) => interp.call(&method, Args::new(vec![value.clone()])),
            None => Err(float_type_error(value)),
        },
        other => Err(float_type_error(other)),
    }
}

fn float_type_error(value: &Val) -> Throw {
    Throw::type_error(format!(
        "float() argument must be a string or a real number, not '{}'",
        value.type_name()
    ))
}

/// Parse an integer literal the way `int(text, base)` does
pub(crate) fn parse_int(text: &str, base: i64) -> EvalResult<i64> {
    let invalid = || {
        Throw::value_error(format!(
            "invalid literal for int() with base {}: {}",
            base,
            crate::value::repr::string_repr(text)
        ))
    };
    if base != 0 && !(2..=36).contains(&base) {
        return Err(Throw::value_error("int() base must be >= 2 and <= 36, or 0"));
    }

    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let lower = unsigned.to_ascii_lowercase();
    let prefixed = |prefix: &str, radix: i64| -> Option<(i64, usize)> {
        (lower.starts_with(prefix) && (base == 0 || base == radix)).then_some((radix, 2))
    };
    let (radix, skip) = prefixed("0x", 16)
        .or_else(|| prefixed("0o", 8))
        .or_else(|| prefixed("0b", 2))
        .unwrap_or((if base == 0 { 10 } else { base }, 0));
    let digits = &unsigned[skip..];

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let leading_zero = digits.len() > 1 && digits.starts_with('0');
    if base == 0 && radix == 10 && leading_zero && digits.chars().any(|c| c != '0' && c != '_') {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let signed = if negative {
        format!("-{}", cleaned)
    } else {
        cleaned
    };
    i64::from_str_radix(&signed, radix as u32).map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            Throw::overflow("int too large to convert")
        }
        _ => invalid(),
    })
}

/// Parse a float literal the way `float(text)` does
pub(crate) fn parse_float(text: &str) -> EvalResult<f64> {
    let trimmed = text.trim();
    let (sign, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    let special = match unsigned.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(f) = special {
        return Ok(sign * f);
    }

    let valid = !unsigned.is_empty()
        && !unsigned.starts_with(['+', '-', '_'])
        && !unsigned.ends_with('_')
        && !unsigned.contains("__")
        && unsigned.chars().any(|c| c.is_ascii_digit());
    let cleaned: String = unsigned.chars().filter(|&c| c != '_').collect();
    match cleaned.parse::<f64>() {
        Ok(f) if valid => Ok(sign * f),
        _ => Err(Throw::value_error(format!(
            "could not convert string to float: {}",
            crate::value::repr::string_repr(text)
        ))),
    }
}
