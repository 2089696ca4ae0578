//! Tests for deadlines and cancellation

use super::helpers::{parse, Session};
use crate::capability::{CapabilitySet, StdModule};
use crate::host::HostModule;
use crate::interpreter::checkpoint::Checkpoint;
use crate::interpreter::{ExecResult, Interrupt};
use crate::value::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn interrupt_of(result: ExecResult) -> Interrupt {
    match result {
        ExecResult::Interrupted(interrupt) => interrupt,
        ExecResult::Completed(_) => panic!("expected an interrupt, completed"),
        ExecResult::Raised(err) => panic!("expected an interrupt, raised:\n{}", err.render()),
    }
}

#[test]
fn test_infinite_loop_times_out() {
    let mut session = Session::new();
    let program = parse("while True:\n    pass\n");
    let started = Instant::now();
    let result = session.execute(&program, &mut Checkpoint::with_timeout(Duration::from_millis(50)));
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_pre_cancelled_token_runs_nothing() {
    let mut session = Session::new();
    let token = CancellationToken::new();
    token.cancel();
    let program = parse("ran = True\n");
    let result = session.execute(&program, &mut Checkpoint::new(None, Some(token)));
    assert_eq!(interrupt_of(result), Interrupt::Cancelled);
    assert!(!session.has_global("ran"));
}

#[test]
fn test_cancel_from_another_thread() {
    let mut session = Session::new();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };
    let program = parse("n = 0\nwhile True:\n    n += 1\n");
    let result = session.execute(&program, &mut Checkpoint::new(None, Some(token)));
    canceller.join().unwrap();
    assert_eq!(interrupt_of(result), Interrupt::Cancelled);
    // Work done before the interrupt stays visible
    assert!(session.global("n").as_int().unwrap() > 0);
}

#[test]
fn test_handlers_cannot_catch_interrupts() {
    let mut session = Session::new();
    let program = parse(
        "
try:
    while True:
        pass
except BaseException:
    caught = True
finally:
    cleaned = True
",
    );
    let result = session.execute(&program, &mut Checkpoint::with_timeout(Duration::from_millis(20)));
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);
    assert!(!session.has_global("caught"));
    assert!(!session.has_global("cleaned"));
}

#[test]
fn test_sleep_is_interruptible() {
    let mut caps = CapabilitySet::none();
    caps.enable_module(StdModule::Time);
    let mut session = Session::with_caps(caps);
    let program = parse("import time\ntime.sleep(30)\n");
    let started = Instant::now();
    let result = session.execute(&program, &mut Checkpoint::with_timeout(Duration::from_millis(50)));
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_loop_inside_function_honours_deadline() {
    let mut session = Session::new();
    let program = parse(
        "
def spin(n):
    while True:
        n += 1
spin(0)
",
    );
    let result = session.execute(&program, &mut Checkpoint::with_timeout(Duration::from_millis(30)));
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);
}

#[test]
fn test_host_callable_sees_interruption() {
    let mut session = Session::new();
    let module = HostModule::new("waiter").function("wait", |ctx, _args| {
        let started = Instant::now();
        while !ctx.is_interrupted() && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(Some(Value::Bool(ctx.is_interrupted())))
    });
    session.machine.register_host_module(&module);

    let program = parse("from waiter import wait\nresult = wait()\n");
    let result = session.execute(&program, &mut Checkpoint::with_timeout(Duration::from_millis(30)));
    // The host call returned, but the interrupt wins over its result
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);
    assert!(!session.has_global("result"));
}

#[test]
fn test_machine_is_reusable_after_interrupt() {
    let mut session = Session::new();
    let spin = parse("while True:\n    pass\n");
    let result = session.execute(&spin, &mut Checkpoint::with_timeout(Duration::from_millis(10)));
    assert_eq!(interrupt_of(result), Interrupt::TimedOut);

    session.run("after = 'fine'");
    assert_eq!(session.global("after"), Value::from("fine"));
}
