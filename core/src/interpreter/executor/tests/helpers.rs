//! Test helpers for executor tests
//!
//! A [`Session`] is a machine with captured output, every capability
//! enabled and an unarmed checkpoint.

use crate::capability::{CapabilityPolicy, CapabilitySet};
use crate::error::RuntimeError;
use crate::host::OutputBuffer;
use crate::interpreter::checkpoint::Checkpoint;
use crate::interpreter::machine::Machine;
use crate::interpreter::{bridge, compile, compile_expression, ExecResult, Program};
use crate::value::Value;
use std::sync::Arc;

/// Kept low: tests run on the default test-thread stack
pub const RECURSION_LIMIT: usize = 30;

pub struct Session {
    pub machine: Machine,
    pub output: OutputBuffer,
    pub caps: CapabilitySet,
}

impl Session {
    pub fn new() -> Self {
        Self::with_caps(CapabilityPolicy::all().to_set())
    }

    pub fn with_caps(caps: CapabilitySet) -> Self {
        let output = OutputBuffer::new();
        let machine = Machine::new(Arc::new(output.clone()), RECURSION_LIMIT);
        Self {
            machine,
            output,
            caps,
        }
    }

    pub fn execute(&mut self, program: &Program, checkpoint: &mut Checkpoint) -> ExecResult {
        self.machine.execute(program, &self.caps, checkpoint)
    }

    pub fn exec(&mut self, source: &str) -> ExecResult {
        let program = parse(source);
        self.execute(&program, &mut Checkpoint::unarmed())
    }

    /// Run source that must complete
    pub fn run(&mut self, source: &str) -> &mut Self {
        match self.exec(source) {
            ExecResult::Completed(_) => self,
            ExecResult::Raised(err) => panic!("unexpected exception:\n{}", err.render()),
            ExecResult::Interrupted(interrupt) => panic!("unexpected interrupt: {:?}", interrupt),
        }
    }

    /// Run source that must raise
    pub fn raise(&mut self, source: &str) -> RuntimeError {
        match self.exec(source) {
            ExecResult::Raised(err) => err,
            ExecResult::Completed(_) => panic!("expected an exception"),
            ExecResult::Interrupted(interrupt) => panic!("unexpected interrupt: {:?}", interrupt),
        }
    }

    pub fn eval(&mut self, expression: &str) -> Value {
        let program = compile_expression(expression, "<eval>")
            .unwrap_or_else(|diagnostics| panic!("compile failed: {:?}", diagnostics));
        match self.execute(&program, &mut Checkpoint::unarmed()) {
            ExecResult::Completed(value) => value.as_ref().map(bridge::to_value).unwrap_or_default(),
            ExecResult::Raised(err) => panic!("unexpected exception:\n{}", err.render()),
            ExecResult::Interrupted(interrupt) => panic!("unexpected interrupt: {:?}", interrupt),
        }
    }

    pub fn global(&self, name: &str) -> Value {
        self.machine
            .globals
            .lock()
            .get(name)
            .map(bridge::to_value)
            .unwrap_or_default()
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.machine.globals.lock().get(name).is_some()
    }
}

pub fn parse(source: &str) -> Program {
    compile(source, "test.py").unwrap_or_else(|diagnostics| panic!("compile failed: {:?}", diagnostics))
}

/// Evaluate one expression in a fresh session
pub fn eval(expression: &str) -> Value {
    Session::new().eval(expression)
}

/// Repr of an expression evaluated in a fresh session
pub fn eval_repr(expression: &str) -> String {
    eval(expression).repr()
}

/// Run a program and return a global
pub fn run_global(source: &str, name: &str) -> Value {
    Session::new().run(source).global(name)
}

/// Run a program and return everything it printed
pub fn output(source: &str) -> String {
    let mut session = Session::new();
    session.run(source);
    session.output.take()
}

/// Run a program that must raise
pub fn raises(source: &str) -> RuntimeError {
    Session::new().raise(source)
}
