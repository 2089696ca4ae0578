//! Rule: Duplicate Argument
//!
//! A parameter name may be bound only once per signature, counting `*args`,
//! keyword-only parameters and `**kwargs`.
//!
//! # Invalid
//!
//! ```text
//! def f(a, b, a): ...
//! g = lambda x, *x: x
//! ```

use std::collections::HashSet;

use crate::interpreter::types::ast::Stmt;

use super::super::walk;
use super::super::{ValidationError, ValidationRule};

pub struct DuplicateArgumentRule;

impl ValidationRule for DuplicateArgumentRule {
    fn id(&self) -> &'static str {
        "duplicate-argument"
    }

    fn description(&self) -> &'static str {
        "Parameter names must be unique within a signature"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for def in walk::functions(body) {
            let mut seen = HashSet::new();
            for name in def.bound_names() {
                if !seen.insert(name) {
                    errors.push(ValidationError::error(
                        def.span,
                        format!(
                            "duplicate argument '{}' in function definition",
                            name
                        ),
                        self.id(),
                    ));
                }
            }
        }
        errors
    }
}
