//! `cmath`

use super::{domain_error, real, Members};
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, Val};
use crate::value::Complex64;
use std::f64::consts;

pub(super) fn members() -> Members {
    vec![
        ("pi", Val::Float(consts::PI)),
        ("e", Val::Float(consts::E)),
        ("tau", Val::Float(consts::TAU)),
        ("inf", Val::Float(f64::INFINITY)),
        ("infj", Val::Complex(Complex64::new(0.0, f64::INFINITY))),
        ("sqrt", Val::Native(native!("sqrt", sqrt))),
        ("exp", Val::Native(native!("exp", exp))),
        ("log", Val::Native(native!("log", log))),
        ("log10", Val::Native(native!("log10", log10))),
        ("sin", Val::Native(native!("sin", sin))),
        ("cos", Val::Native(native!("cos", cos))),
        ("tan", Val::Native(native!("tan", tan))),
        ("phase", Val::Native(native!("phase", phase))),
        ("polar", Val::Native(native!("polar", polar))),
        ("rect", Val::Native(native!("rect", rect))),
        ("isnan", Val::Native(native!("isnan", isnan))),
        ("isinf", Val::Native(native!("isinf", isinf))),
        ("isfinite", Val::Native(native!("isfinite", isfinite))),
    ]
}

const I: Complex64 = Complex64::new(0.0, 1.0);

/// A complex argument; ints and floats widen
fn complex(args: &Args, index: usize, func: &str) -> EvalResult<Complex64> {
    match args.get(index) {
        Some(Val::Complex(c)) => Ok(*c),
        Some(value) => value.as_float().map(Complex64::from).ok_or_else(|| {
            Throw::type_error(format!(
                "{}() argument must be a number, not '{}'",
                func,
                value.type_name()
            ))
        }),
        None => Err(Throw::type_error(format!(
            "{}() missing required argument",
            func
        ))),
    }
}

fn unary(args: &Args, name: &str, f: fn(Complex64) -> Complex64) -> EvalResult {
    args.check(name, 1, 1)?;
    let z = complex(args, 0, name)?;
    Ok(Val::Complex(f(z)))
}

fn sin_of(z: Complex64) -> Complex64 {
    // (e^{iz} - e^{-iz}) / 2i
    ((I * z).exp() - (-(I * z)).exp()) / Complex64::new(0.0, 2.0)
}

fn cos_of(z: Complex64) -> Complex64 {
    ((I * z).exp() + (-(I * z)).exp()) / Complex64::new(2.0, 0.0)
}

fn sqrt(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    unary(&args, "sqrt", |z| z.sqrt())
}

fn exp(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    unary(&args, "exp", |z| z.exp())
}

fn sin(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    unary(&args, "sin", sin_of)
}

fn cos(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    unary(&args, "cos", cos_of)
}

fn tan(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    unary(&args, "tan", |z| sin_of(z) / cos_of(z))
}

fn log(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("log", 1, 2)?;
    let z = complex(&args, 0, "log")?;
    if z.is_zero() {
        return Err(domain_error());
    }
    match args.get(1) {
        None => Ok(Val::Complex(z.ln())),
        Some(_) => {
            let base = complex(&args, 1, "log")?;
            if base.is_zero() {
                return Err(domain_error());
            }
            let divisor = base.ln();
            if divisor.is_zero() {
                return Err(Throw::zero_division("complex division by zero"));
            }
            Ok(Val::Complex(z.ln() / divisor))
        }
    }
}

fn log10(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("log10", 1, 1)?;
    let z = complex(&args, 0, "log10")?;
    if z.is_zero() {
        return Err(domain_error());
    }
    Ok(Val::Complex(z.ln() / Complex64::from(consts::LN_10)))
}

fn phase(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("phase", 1, 1)?;
    Ok(Val::Float(complex(&args, 0, "phase")?.arg()))
}

fn polar(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("polar", 1, 1)?;
    let z = complex(&args, 0, "polar")?;
    Ok(Val::tuple(vec![Val::Float(z.norm()), Val::Float(z.arg())]))
}

fn rect(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("rect", 2, 2)?;
    let r = real(&args, 0, "rect")?;
    let phi = real(&args, 1, "rect")?;
    Ok(Val::Complex(Complex64::from_polar(r, phi)))
}

fn isnan(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isnan", 1, 1)?;
    let z = complex(&args, 0, "isnan")?;
    Ok(Val::Bool(z.re.is_nan() || z.im.is_nan()))
}

fn isinf(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isinf", 1, 1)?;
    let z = complex(&args, 0, "isinf")?;
    Ok(Val::Bool(z.re.is_infinite() || z.im.is_infinite()))
}

fn isfinite(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("isfinite", 1, 1)?;
    let z = complex(&args, 0, "isfinite")?;
    Ok(Val::Bool(z.re.is_finite() && z.im.is_finite()))
}
