//! Rule: Unreachable Code
//!
//! Warns about statements that follow `return`, `raise`, `break` or
//! `continue` in the same block. Reported once per block, at the first
//! unreachable statement.

use crate::interpreter::types::ast::Stmt;

use super::super::walk;
use super::super::{ValidationError, ValidationRule};

pub struct UnreachableCodeRule;

impl ValidationRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "unreachable-code"
    }

    fn description(&self) -> &'static str {
        "Code after return, raise, break or continue never runs"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::blocks(body, &mut |block| {
            if let Some(pos) = block.iter().position(Stmt::ends_flow) {
                if let Some(next) = block.get(pos + 1) {
                    errors.push(ValidationError::warning(
                        next.span(),
                        "unreachable code",
                        self.id(),
                    ));
                }
            }
        });
        errors
    }
}
