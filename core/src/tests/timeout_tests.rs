//! Tests for deadlines and cancellation through the state API

use crate::error::Error;
use crate::state::State;
use crate::value::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const SPIN: &str = "n = 0\nwhile True:\n    n += 1\n";

#[test]
fn test_run_with_timeout_stops_infinite_loop() {
    let mut state = State::bare();
    let started = Instant::now();
    let err = state
        .run_with_timeout(SPIN, Duration::from_millis(50))
        .unwrap_err();

    let Error::TimedOut { limit } = err else {
        panic!("expected a timeout, got {:?}", err);
    };
    assert_eq!(limit, Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        Error::TimedOut { limit }.to_string(),
        "execution timed out after 50ms"
    );
}

#[test]
fn test_state_is_usable_after_timeout() {
    let mut state = State::bare();
    assert!(state
        .run_with_timeout(SPIN, Duration::from_millis(100))
        .unwrap_err()
        .is_timeout());

    // Progress made before the deadline stays in the namespace
    assert!(state.get_global("n").unwrap().as_int().unwrap() > 0);

    state.run("done = n > 0").unwrap();
    assert_eq!(state.get_global("done").unwrap(), Value::Bool(true));
}

#[test]
fn test_fast_code_finishes_within_timeout() {
    let mut state = State::bare();
    state
        .run_with_timeout("total = sum(range(100))", Duration::from_secs(5))
        .unwrap();
    assert_eq!(state.get_global("total").unwrap(), Value::Int(4950));
}

#[test]
fn test_default_timeout_applies_to_every_run() {
    let mut state = State::builder()
        .bare()
        .default_timeout(Some(Duration::from_millis(30)))
        .build();

    let err = state.run(SPIN).unwrap_err();
    assert!(matches!(err, Error::TimedOut { limit } if limit == Duration::from_millis(30)));

    // An explicit limit wins over the default
    let err = state
        .run_with_timeout(SPIN, Duration::from_millis(10))
        .unwrap_err();
    assert!(matches!(err, Error::TimedOut { limit } if limit == Duration::from_millis(10)));
}

#[test]
fn test_timeout_is_not_catchable_by_guest() {
    let mut state = State::bare();
    let source = "
try:
    while True:
        pass
except Exception:
    swallowed = True
";
    let err = state
        .run_with_timeout(source, Duration::from_millis(20))
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(state.get_global("swallowed").unwrap(), Value::None);
}

#[test]
fn test_cancellation_from_another_thread() {
    let mut state = State::bare();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };

    let err = state.run_with_cancellation(SPIN, &token).unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, Error::Cancelled));
    assert!(err.is_interrupted());
}

#[test]
fn test_cancelled_token_stops_before_any_work() {
    let mut state = State::bare();
    let token = CancellationToken::new();
    token.cancel();

    let code = state.compile("ran = True", "job.py").unwrap();
    let err = state.execute_with_cancellation(&code, &token).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(state.get_global("ran").unwrap(), Value::None);
}

#[test]
fn test_first_limit_to_fire_wins() {
    let mut state = State::bare();
    let code = state.compile(SPIN, "spin.py").unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = state
        .execute_with_limits(&code, Some(Duration::from_secs(30)), Some(&token))
        .unwrap_err();
    assert!(err.is_cancelled());

    let idle = CancellationToken::new();
    let err = state
        .execute_with_limits(&code, Some(Duration::from_millis(20)), Some(&idle))
        .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_eval_with_limits() {
    let mut state = State::bare();
    state
        .run("def forever():\n    while True:\n        pass\n")
        .unwrap();

    let err = state
        .eval_with_limits("forever()", Some(Duration::from_millis(20)), None)
        .unwrap_err();
    assert!(err.is_timeout());

    let value = state
        .eval_with_limits("1 + 1", Some(Duration::from_secs(5)), None)
        .unwrap();
    assert_eq!(value, Value::Int(2));
}

#[test]
fn test_deep_recursion_is_a_guest_error_not_a_crash() {
    let mut state = State::builder().bare().recursion_limit(200).build();
    let err = state
        .run("def down(n):\n    return down(n + 1)\ndown(0)\n")
        .unwrap_err();
    let runtime = err.as_runtime().unwrap();
    assert_eq!(runtime.exception, "RecursionError");
}

#[test]
fn test_timeout_interrupts_large_repetition() {
    let mut state = State::bare();
    let started = Instant::now();
    let err = state
        .run_with_timeout("x = [0, 0, 0, 0] * (2**22)", Duration::from_millis(5))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(state.get_global("x").unwrap(), Value::None);
}
