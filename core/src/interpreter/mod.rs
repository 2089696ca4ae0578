//! The ember language engine
//!
//! Three entry points make up the engine's contract with the control layer:
//!
//! - [`compile`] / [`compile_expression`]: source text to a [`Program`] or
//!   a non-empty list of diagnostics
//! - [`Machine::execute`](machine::Machine::execute): run a program against
//!   a namespace and a capability set
//! - [`Checkpoint`](checkpoint::Checkpoint): the interruption hook the
//!   executor polls at every safe point

/// Define a `&'static NativeFn` in place
macro_rules! native {
    ($name:literal, $func:path) => {{
        static NATIVE: $crate::interpreter::object::NativeFn =
            $crate::interpreter::object::NativeFn {
                name: $name,
                call: $func,
            };
        &NATIVE
    }};
}

pub mod parser;
pub mod types;

pub(crate) mod bridge;
pub(crate) mod builtins;
pub(crate) mod checkpoint;
pub(crate) mod control;
pub(crate) mod executor;
pub(crate) mod machine;
pub(crate) mod object;
pub(crate) mod stdlib;

pub use control::Interrupt;

use crate::error::{Diagnostic, RuntimeError};
use object::Val;
use parser::semantic_validator::Validator;
use std::sync::Arc;
use types::{Expr, Stmt};

/* ===================== Programs ===================== */

#[derive(Debug, Clone)]
pub(crate) enum ProgramKind {
    Module,
    /// A single expression whose value is the result
    Expression,
}

/// A compiled, validated unit of guest code
#[derive(Debug)]
pub(crate) struct Program {
    pub name: Arc<str>,
    pub kind: ProgramKind,
    pub body: Vec<Stmt>,
    pub warnings: Vec<Diagnostic>,
}

impl Program {
    /// The expression of an expression program
    pub fn expression(&self) -> Option<&Expr> {
        match (&self.kind, self.body.first()) {
            (ProgramKind::Expression, Some(Stmt::Expr { expr, .. })) => Some(expr),
            _ => None,
        }
    }
}

/// What one execution produced
#[derive(Debug)]
pub(crate) enum ExecResult {
    /// Finished normally; expression programs carry their value
    Completed(Option<Val>),
    Raised(RuntimeError),
    Interrupted(Interrupt),
}

/* ===================== Compilation ===================== */

/// Parse and validate a module
///
/// Errors come back all at once, ordered by position. Warnings ride along
/// on the program.
pub(crate) fn compile(source: &str, name: &str) -> Result<Program, Vec<Diagnostic>> {
    let body = parser::parse_module(source)?;
    finish(body, source, name, ProgramKind::Module)
}

/// Parse and validate a single expression
pub(crate) fn compile_expression(source: &str, name: &str) -> Result<Program, Vec<Diagnostic>> {
    let expr = parser::parse_expression(source)?;
    let span = expr.span();
    let body = vec![Stmt::Expr { expr, span }];
    finish(body, source, name, ProgramKind::Expression)
}

fn finish(
    body: Vec<Stmt>,
    source: &str,
    name: &str,
    kind: ProgramKind,
) -> Result<Program, Vec<Diagnostic>> {
    let (errors, warnings): (Vec<_>, Vec<_>) = Validator::new()
        .validate(&body, source)
        .into_iter()
        .partition(|e| e.is_error());

    if !errors.is_empty() {
        return Err(errors.into_iter().map(|e| e.into_diagnostic()).collect());
    }

    Ok(Program {
        name: Arc::from(name),
        kind,
        body,
        warnings: warnings.into_iter().map(|w| w.into_diagnostic()).collect(),
    })
}
