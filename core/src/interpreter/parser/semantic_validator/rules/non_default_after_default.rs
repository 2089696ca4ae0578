//! Rule: Non-Default Argument After Default Argument
//!
//! Among positional parameters, once one has a default every later one must
//! too. Keyword-only parameters (after `*args`) are exempt.

use crate::interpreter::types::ast::Stmt;

use super::super::walk;
use super::super::{ValidationError, ValidationRule};

pub struct NonDefaultAfterDefaultRule;

impl ValidationRule for NonDefaultAfterDefaultRule {
    fn id(&self) -> &'static str {
        "non-default-after-default"
    }

    fn description(&self) -> &'static str {
        "Required parameters must come before parameters with defaults"
    }

    fn validate(&self, body: &[Stmt], _source: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for def in walk::functions(body) {
            let mut seen_default = false;
            for param in &def.params {
                if param.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    errors.push(ValidationError::error(
                        param.span,
                        "non-default argument follows default argument",
                        self.id(),
                    ));
                    break;
                }
            }
        }
        errors
    }
}
