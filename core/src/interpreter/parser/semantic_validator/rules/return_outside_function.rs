//! Rule: Return Outside Function
//!
//! `return` is only meaningful inside a `def`. At module level or directly
//! in a class body it is an error.

use crate::interpreter::types::ast::Stmt;

use super::super::walk::{self, Context};
use super::super::{ValidationError, ValidationRule};

pub struct ReturnOutsideFunctionRule;

impl ValidationRule for ReturnOutsideFunctionRule {
    fn id(&self) -> &'static str {
        "return-outside-function"
    }

    fn description(&self) -> &'static str {
        "'return' must be inside a function"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::statements(body, Context::default(), &mut |stmt, ctx| {
            if let Stmt::Return { span, .. } = stmt {
                if !ctx.in_function {
                    errors.push(ValidationError::error(*span, "'return' outside function", self.id()));
                }
            }
        });
        errors
    }
}
