//! Rule: Expression Depth
//!
//! Rejects expressions nested more than [`MAX_EXPRESSION_DEPTH`] levels
//! deep. Evaluation recurses once per level, so an unbounded tree could
//! exhaust the native stack.

use crate::interpreter::types::ast::Stmt;

use super::super::walk::{self, Context};
use super::super::{ValidationError, ValidationRule};

pub const MAX_EXPRESSION_DEPTH: usize = 200;

pub struct ExpressionDepthRule;

impl ValidationRule for ExpressionDepthRule {
    fn id(&self) -> &'static str {
        "expression-too-deep"
    }

    fn description(&self) -> &'static str {
        "Expressions must not nest too deeply"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::statements(body, Context::default(), &mut |stmt, _| {
            for root in walk::stmt_exprs(stmt) {
                let mut deepest = 0;
                walk::exprs(root, &mut |_, depth| deepest = deepest.max(depth));
                if deepest > MAX_EXPRESSION_DEPTH {
                    errors.push(ValidationError::error(
                        root.span(),
                        format!(
                            "expression is too deeply nested ({} levels, limit {})",
                            deepest, MAX_EXPRESSION_DEPTH
                        ),
                        self.id(),
                    ));
                }
            }
        });
        errors
    }
}
