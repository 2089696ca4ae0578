//! `random`, backed by the state's own generator

use super::{integer, real, Members};
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::executor::Interpreter;
use crate::interpreter::object::{Args, Val};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub(super) fn members() -> Members {
    vec![
        ("seed", Val::Native(native!("seed", seed))),
        ("random", Val::Native(native!("random", random))),
        ("uniform", Val::Native(native!("uniform", uniform))),
        ("randint", Val::Native(native!("randint", randint))),
        ("randrange", Val::Native(native!("randrange", randrange))),
        ("choice", Val::Native(native!("choice", choice))),
        ("shuffle", Val::Native(native!("shuffle", shuffle))),
        ("sample", Val::Native(native!("sample", sample))),
    ]
}

fn seed(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("seed", 0, 1)?;
    interp.machine.rng = match args.get(0) {
        None | Some(Val::None) => StdRng::from_entropy(),
        Some(Val::Int(n)) => StdRng::seed_from_u64(*n as u64),
        Some(Val::Float(f)) => StdRng::seed_from_u64(f.to_bits()),
        Some(Val::Str(s)) => {
            let mut hasher = DefaultHasher::new();
            s.hash(&mut hasher);
            StdRng::seed_from_u64(hasher.finish())
        }
        Some(other) => {
            return Err(Throw::type_error(format!(
                "The only supported seed types are: None, int, float, str, not {}",
                other.type_name()
            )))
        }
    };
    Ok(Val::None)
}

fn random(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("random", 0, 0)?;
    Ok(Val::Float(interp.machine.rng.gen::<f64>()))
}

fn uniform(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("uniform", 2, 2)?;
    let a = real(&args, 0, "uniform")?;
    let b = real(&args, 1, "uniform")?;
    let t: f64 = interp.machine.rng.gen();
    Ok(Val::Float(a + (b - a) * t))
}

fn randint(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("randint", 2, 2)?;
    let a = integer(&args, 0, "randint")?;
    let b = integer(&args, 1, "randint")?;
    if a > b {
        return Err(Throw::value_error(format!(
            "empty range in randrange({}, {})",
            a,
            b.saturating_add(1)
        )));
    }
    Ok(Val::Int(interp.machine.rng.gen_range(a..=b)))
}

fn randrange(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("randrange", 1, 3)?;
    let (start, stop) = match args.len() {
        1 => (0, integer(&args, 0, "randrange")?),
        _ => (
            integer(&args, 0, "randrange")?,
            integer(&args, 1, "randrange")?,
        ),
    };
    let step = match args.get(2) {
        Some(_) => integer(&args, 2, "randrange")?,
        None => 1,
    };
    if step == 0 {
        return Err(Throw::value_error("zero step for randrange()"));
    }
    let width = stop as i128 - start as i128;
    let count = if step > 0 {
        (width + step as i128 - 1) / step as i128
    } else {
        (width + step as i128 + 1) / step as i128
    };
    if count <= 0 {
        return Err(Throw::value_error(format!(
            "empty range in randrange({}, {}, {})",
            start, stop, step
        )));
    }
    let k = interp.machine.rng.gen_range(0..count);
    Ok(Val::Int((start as i128 + k * step as i128) as i64))
}

fn choice(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("choice", 1, 1)?;
    let items = interp.collect(&args.positional[0])?;
    items
        .choose(&mut interp.machine.rng)
        .cloned()
        .ok_or_else(|| Throw::index_error("Cannot choose from an empty sequence"))
}

fn shuffle(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("shuffle", 1, 1)?;
    let Val::List(items) = &args.positional[0] else {
        return Err(Throw::type_error(format!(
            "'{}' object does not support item assignment",
            args.positional[0].type_name()
        )));
    };
    items.lock().shuffle(&mut interp.machine.rng);
    Ok(Val::None)
}

fn sample(interp: &mut Interpreter<'_>, args: Args) -> EvalResult {
    args.check("sample", 2, 2)?;
    let population = interp.collect(&args.positional[0])?;
    let k = integer(&args, 1, "sample")?;
    if k < 0 || k as usize > population.len() {
        return Err(Throw::value_error(
            "Sample larger than population or is negative",
        ));
    }
    let picked = index::sample(&mut interp.machine.rng, population.len(), k as usize);
    Ok(Val::list(
        picked.into_iter().map(|i| population[i].clone()).collect(),
    ))
}
