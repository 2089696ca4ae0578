//! Rule: Nonlocal At Module Level
//!
//! `nonlocal` rebinds a name in an enclosing function, so it has no meaning
//! outside one.

use crate::interpreter::types::ast::Stmt;

use super::super::walk::{self, Context};
use super::super::{ValidationError, ValidationRule};

pub struct NonlocalAtModuleLevelRule;

impl ValidationRule for NonlocalAtModuleLevelRule {
    fn id(&self) -> &'static str {
        "nonlocal-at-module-level"
    }

    fn description(&self) -> &'static str {
        "'nonlocal' must be inside a nested function"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        walk::statements(body, Context::default(), &mut |stmt, ctx| {
            if let Stmt::Nonlocal { span, .. } = stmt {
                if !ctx.in_function {
                    errors.push(ValidationError::error(
                        *span,
                        "nonlocal declaration not allowed at module level",
                        self.id(),
                    ));
                }
            }
        });
        errors
    }
}
