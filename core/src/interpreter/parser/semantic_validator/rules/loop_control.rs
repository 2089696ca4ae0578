//! Rules: Break / Continue Outside Loop
//!
//! `break` and `continue` must appear inside a `while` or `for` body of the
//! same function. A loop in an enclosing function does not count.
//!
//! # Invalid
//!
//! ```text
//! break
//!
//! while True:
//!     def f():
//!         continue
//! ```

use crate::interpreter::types::ast::Stmt;

use super::super::walk::{self, Context};
use super::super::{ValidationError, ValidationRule};

pub struct BreakOutsideLoopRule;

impl ValidationRule for BreakOutsideLoopRule {
    fn id(&self) -> &'static str {
        "break-outside-loop"
    }

    fn description(&self) -> &'static str {
        "'break' must be inside a loop"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::statements(body, Context::default(), &mut |stmt, ctx| {
            if let Stmt::Break { span } = stmt {
                if !ctx.in_loop {
                    errors.push(ValidationError::error(*span, "'break' outside loop", self.id()));
                }
            }
        });
        errors
    }
}

pub struct ContinueOutsideLoopRule;

impl ValidationRule for ContinueOutsideLoopRule {
    fn id(&self) -> &'static str {
        "continue-outside-loop"
    }

    fn description(&self) -> &'static str {
        "'continue' must be inside a loop"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::statements(body, Context::default(), &mut |stmt, ctx| {
            if let Stmt::Continue { span } = stmt {
                if !ctx.in_loop {
                    errors.push(ValidationError::error(
                        *span,
                        "'continue' not properly in loop",
                        self.id(),
                    ));
                }
            }
        });
        errors
    }
}
