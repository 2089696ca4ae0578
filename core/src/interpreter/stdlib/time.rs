//! `time`

use super::{real, Members};
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, Val};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub(super) fn members() -> Members {
    vec![
        ("time", Val::Native(native!("time", time))),
        ("time_ns", Val::Native(native!("time_ns", time_ns))),
        ("monotonic", Val::Native(native!("monotonic", monotonic))),
        ("perf_counter", Val::Native(native!("perf_counter", monotonic))),
        ("sleep", Val::Native(native!("sleep", sleep))),
    ]
}

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

fn time(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("time", 0, 0)?;
    Ok(Val::Float(since_epoch().as_secs_f64()))
}

fn time_ns(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("time_ns", 0, 0)?;
    Ok(Val::Int(since_epoch().as_nanos() as i64))
}

fn monotonic(_: &mut Interpreter<'_>, args: Args) -> EvalResult {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    args.check("monotonic", 0, 0)?;
    let origin = ORIGIN.get_or_init(Instant::now);
    Ok(Val::Float(origin.elapsed().as_secs_f64()))
}

/// Sleeps through the interpreter so deadlines still fire
fn sleep(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("sleep", 1, 1)?;
    let seconds = real(&args, 0, "sleep")?;
    if seconds.is_nan() {
        return Err(Throw::value_error("Invalid value NaN (not a number)"));
    }
    if seconds < 0.0 {
        return Err(Throw::value_error("sleep length must be non-negative"));
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| Throw::overflow("sleep length is too large"))?;
    interp.sleep(duration)?;
    Ok(Val::None)
}
