//! `math`

use super::{domain_error, integer, range_error, real, Members};
use crate::interpreter::builtins::float_to_int;
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, Val};
use crate::interpreter::types::BinaryOp;
use std::f64::consts;

pub(super) fn members() -> Members {
    vec![
        ("pi", Val::Float(consts::PI)),
        ("e", Val::Float(consts::E)),
        ("tau", Val::Float(consts::TAU)),
        ("inf", Val::Float(f64::INFINITY)),
        ("nan", Val::Float(f64::NAN)),
        ("sqrt", Val::Native(native!("sqrt", sqrt))),
        ("exp", Val::Native(native!("exp", exp))),
        ("expm1", Val::Native(native!("expm1", expm1))),
        ("log", Val::Native(native!("log", log))),
        ("log2", Val::Native(native!("log2", log2))),
        ("log10", Val::Native(native!("log10", log10))),
        ("log1p", Val::Native(native!("log1p", log1p))),
        ("pow", Val::Native(native!("pow", pow))),
        ("sin", Val::Native(native!("sin", sin))),
        ("cos", Val::Native(native!("cos", cos))),
        ("tan", Val::Native(native!("tan", tan))),
        ("asin", Val::Native(native!("asin", asin))),
        ("acos", Val::Native(native!("acos", acos))),
        ("atan", Val::Native(native!("atan", atan))),
        ("atan2", Val::Native(native!("atan2", atan2))),
        ("sinh", Val::Native(native!("sinh", sinh))),
        ("cosh", Val::Native(native!("cosh", cosh))),
        ("tanh", Val::Native(native!("tanh", tanh))),
        ("degrees", Val::Native(native!("degrees", degrees))),
        ("radians", Val::Native(native!("radians", radians))),
        ("hypot", Val::Native(native!("hypot", hypot))),
        ("fabs", Val::Native(native!("fabs", fabs))),
        ("copysign", Val::Native(native!("copysign", copysign))),
        ("fmod", Val::Native(native!("fmod", fmod))),
        ("modf", Val::Native(native!("modf", modf))),
        ("floor", Val::Native(native!("floor", floor))),
        ("ceil", Val::Native(native!("ceil", ceil))),
        ("trunc", Val::Native(native!("trunc", trunc))),
        ("isnan", Val::Native(native!("isnan", isnan))),
        ("isinf", Val::Native(native!("isinf", isinf))),
        ("isfinite", Val::Native(native!("isfinite", isfinite))),
        ("isclose", Val::Native(native!("isclose", isclose))),
        ("factorial", Val::Native(native!("factorial", factorial))),
        ("gcd", Val::Native(native!("gcd", gcd))),
        ("lcm", Val::Native(native!("lcm", lcm))),
        ("comb", Val::Native(native!("comb", comb))),
        ("perm", Val::Native(native!("perm", perm))),
        ("isqrt", Val::Native(native!("isqrt", isqrt))),
        ("fsum", Val::Native(native!("fsum", fsum))),
        ("prod", Val::Native(native!("prod", prod))),
    ]
}

/// Apply a float function, mapping NaN and overflow to Python's errors
fn checked(x: f64, result: f64) -> EvalResult {
    if result.is_nan() && !x.is_nan() {
        return Err(domain_error());
    }
    if result.is_infinite() && x.is_finite() {
        return Err(range_error());
    }
    Ok(Val::Float(result))
}

fn unary(args: &Args, name: &str, f: fn(f64) -> f64) -> EvalResult {
    args.check(name, 1, 1)?;
    let x = real(args, 0, name)?;
    checked(x, f(x))
}

macro_rules! unary_functions {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
                unary(&args, stringify!($name), $f)
            }
        )*
    };
}

unary_functions! {
    sqrt => f64::sqrt,
    exp => f64::exp,
    expm1 => f64::exp_m1,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    sinh => f64::sinh,
    cosh => f64::cosh,
    tanh => f64::tanh,
    degrees => f64::to_degrees,
    radians => f64::to_radians,
    fabs => f64::abs,
}

/// Logarithm of a positive argument
fn positive_log(args: &Args, name: &str, f: fn(f64) -> f64) -> EvalResult {
    args.check(name, 1, 1)?;
    let x = real(args, 0, name)?;
    if x <= 0.0 {
        return Err(domain_error());
    }
    Ok(Val::Float(f(x)))
}

fn log(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("log", 1, 2)?;
    let x = real(&args, 0, "log")?;
    if x <= 0.0 {
        return Err(domain_error());
    }
    match args.get(1) {
        None => Ok(Val::Float(x.ln())),
        Some(_) => {
            let base = real(&args, 1, "log")?;
            if base <= 0.0 {
                return Err(domain_error());
            }
            let divisor = base.ln();
            if divisor == 0.0 {
                return Err(Throw::zero_division("float division by zero"));
            }
            Ok(Val::Float(x.ln() / divisor))
        }
    }
}

fn log2(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    positive_log(&args, "log2", f64::log2)
}

fn log10(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    positive_log(&args, "log10", f64::log10)
}

fn log1p(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("log1p", 1, 1)?;
    let x = real(&args, 0, "log1p")?;
    if x <= -1.0 {
        return Err(domain_error());
    }
    Ok(Val::Float(x.ln_1p()))
}

fn pow(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("pow", 2, 2)?;
    let x = real(&args, 0, "pow")?;
    let y = real(&args, 1, "pow")?;
    if x == 0.0 && y < 0.0 {
        return Err(domain_error());
    }
    let result = x.powf(y);
    if result.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(domain_error());
    }
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(range_error());
    }
    Ok(Val::Float(result))
}

fn atan2(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("atan2", 2, 2)?;
    let y = real(&args, 0, "atan2")?;
    let x = real(&args, 1, "atan2")?;
    Ok(Val::Float(y.atan2(x)))
}

fn hypot(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let mut total = 0.0f64;
    for i in 0..args.len() {
        total = total.hypot(real(&args, i, "hypot")?);
    }
    Ok(Val::Float(total))
}

fn copysign(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("copysign", 2, 2)?;
    let x = real(&args, 0, "copysign")?;
    let y = real(&args, 1, "copysign")?;
    Ok(Val::Float(x.copysign(y)))
}

fn fmod(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("fmod", 2, 2)?;
    let x = real(&args, 0, "fmod")?;
    let y = real(&args, 1, "fmod")?;
    if y == 0.0 || x.is_infinite() {
        return Err(domain_error());
    }
    Ok(Val::Float(x % y))
}

fn modf(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("modf", 1, 1)?;
    let x = real(&args, 0, "modf")?;
    let whole = x.trunc();
    let fraction = if x.is_infinite() { 0.0f64.copysign(x) } else { x - whole };
    Ok(Val::tuple(vec![Val::Float(fraction), Val::Float(whole)]))
}

/// Integer rounding helpers return ints unchanged
fn round_with(args: &Args, name: &str, f: fn(f64) -> f64) -> EvalResult {
    args.check(name, 1, 1)?;
    match &args.positional[0] {
        Val::Int(i) => Ok(Val::Int(*i)),
        Val::Bool(b) => Ok(Val::Int(*b as i64)),
        _ => float_to_int(f(real(args, 0, name)?)).map(Val::Int),
    }
}

fn floor(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    round_with(&args, "floor", f64::floor)
}

fn ceil(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    round_with(&args, "ceil", f64::ceil)
}

fn trunc(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    round_with(&args, "trunc", f64::trunc)
}

fn isnan(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isnan", 1, 1)?;
    Ok(Val::Bool(real(&args, 0, "isnan")?.is_nan()))
}

fn isinf(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isinf", 1, 1)?;
    Ok(Val::Bool(real(&args, 0, "isinf")?.is_infinite()))
}

fn isfinite(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isfinite", 1, 1)?;
    Ok(Val::Bool(real(&args, 0, "isfinite")?.is_finite()))
}

fn isclose(_: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let rel_tol = args.take_keyword("rel_tol");
    let abs_tol = args.take_keyword("abs_tol");
    args.check("isclose", 2, 2)?;
    let a = real(&args, 0, "isclose")?;
    let b = real(&args, 1, "isclose")?;
    let tolerance = |value: Option<Val>, default: f64| -> EvalResult<f64> {
        match value {
            None => Ok(default),
            Some(v) => v.as_float().ok_or_else(|| {
                Throw::type_error(format!("must be real number, not {}", v.type_name()))
            }),
        }
    };
    let rel_tol = tolerance(rel_tol, 1e-9)?;
    let abs_tol = tolerance(abs_tol, 0.0)?;
    if rel_tol < 0.0 || abs_tol < 0.0 {
        return Err(Throw::value_error("tolerances must be non-negative"));
    }
    if a == b {
        return Ok(Val::Bool(true));
    }
    if a.is_infinite() || b.is_infinite() {
        return Ok(Val::Bool(false));
    }
    let diff = (a - b).abs();
    Ok(Val::Bool(
        diff <= (rel_tol * b).abs() || diff <= (rel_tol * a).abs() || diff <= abs_tol,
    ))
}

fn overflow() -> Throw {
    Throw::overflow("integer overflow")
}

fn factorial(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("factorial", 1, 1)?;
    let n = integer(&args, 0, "factorial")?;
    if n < 0 {
        return Err(Throw::value_error(
            "factorial() not defined for negative values",
        ));
    }
    let mut total: i64 = 1;
    for k in 2..=n {
        total = total.checked_mul(k).ok_or_else(overflow)?;
    }
    Ok(Val::Int(total))
}

fn gcd_pair(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a as i64
}

fn gcd(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let mut result = 0;
    for i in 0..args.len() {
        result = gcd_pair(result, integer(&args, i, "gcd")?);
    }
    Ok(Val::Int(result))
}

fn lcm(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    let mut result: i64 = 1;
    for i in 0..args.len() {
        let n = integer(&args, i, "lcm")?;
        if n == 0 || result == 0 {
            result = 0;
            continue;
        }
        let g = gcd_pair(result, n);
        result = (result / g)
            .checked_mul(n)
            .map(i64::abs)
            .ok_or_else(overflow)?;
    }
    Ok(Val::Int(result))
}

/// `n! / (n-k)!`, optionally divided by `k!` as it goes
fn falling(n: i64, k: i64, choose: bool) -> EvalResult<i64> {
    let mut total: i64 = 1;
    for i in 0..k {
        total = total.checked_mul(n - i).ok_or_else(overflow)?;
        if choose {
            total /= i + 1;
        }
    }
    Ok(total)
}

fn nonnegative(name: &str, n: i64, k: i64) -> EvalResult<()> {
    if n < 0 {
        return Err(Throw::value_error("n must be a non-negative integer"));
    }
    if k < 0 {
        return Err(Throw::value_error(format!(
            "{}: k must be a non-negative integer",
            name
        )));
    }
    Ok(())
}

fn comb(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("comb", 2, 2)?;
    let n = integer(&args, 0, "comb")?;
    let k = integer(&args, 1, "comb")?;
    nonnegative("comb", n, k)?;
    if k > n {
        return Ok(Val::Int(0));
    }
    falling(n, k.min(n - k), true).map(Val::Int)
}

fn perm(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("perm", 1, 2)?;
    let n = integer(&args, 0, "perm")?;
    let k = match args.get(1) {
        None | Some(Val::None) => n,
        Some(_) => integer(&args, 1, "perm")?,
    };
    nonnegative("perm", n, k)?;
    if k > n {
        return Ok(Val::Int(0));
    }
    falling(n, k, false).map(Val::Int)
}

fn isqrt(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isqrt", 1, 1)?;
    let n = integer(&args, 0, "isqrt")?;
    if n < 0 {
        return Err(Throw::value_error("isqrt() argument must be nonnegative"));
    }
    let mut root = (n as f64).sqrt() as i64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
        root += 1;
    }
    Ok(Val::Int(root))
}

/// Neumaier-compensated sum
fn fsum(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("fsum", 1, 1)?;
    let items = interp.collect(&args.positional[0])?;
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;
    for item in &items {
        let x = item.as_float().ok_or_else(|| {
            Throw::type_error(format!("must be real number, not {}", item.type_name()))
        })?;
        let t = sum + x;
        if sum.abs() >= x.abs() {
            compensation += (sum - t) + x;
        } else {
            compensation += (x - t) + sum;
        }
        sum = t;
    }
    Ok(Val::Float(sum + compensation))
}

fn prod(interp: &mut Interpreter<'_>, mut args: Args) -> EvalResult {
    let start = args.take_keyword("start");
    args.check("prod", 1, 1)?;
    let items = interp.collect(&args.positional[0])?;
    let mut total = start.unwrap_or(Val::Int(1));
    for item in items {
        total = interp.binary_op(BinaryOp::Mul, total, item)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd_pair() {
        assert_eq!(gcd_pair(12, 18), 6);
        assert_eq!(gcd_pair(-12, 18), 6);
        assert_eq!(gcd_pair(0, 5), 5);
    }

    #[test]
    fn test_falling_products() {
        assert_eq!(falling(5, 2, true).unwrap(), 10);
        assert_eq!(falling(5, 2, false).unwrap(), 20);
        assert_eq!(falling(52, 5, true).unwrap(), 2_598_960);
        assert!(falling(100, 50, false).is_err());
    }

    #[test]
    fn test_checked_maps_nan_and_overflow() {
        assert!(checked(-1.0, f64::NAN).is_err());
        assert!(checked(1000.0, f64::INFINITY).is_err());
        assert!(checked(f64::INFINITY, f64::INFINITY).is_ok());
    }
}
