//! Semantic Validation for ember programs
//!
//! Rule-based checks that run after parsing to catch errors the grammar
//! can't enforce: `break` outside a loop, duplicate parameters, and so on.
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationError** - The output of validation (errors and warnings)
//!
//! Rules share the traversal helpers in [`walk`]. A new rule is one file in
//! `rules/` plus a line in [`Validator::new`].

pub mod rules;
pub mod walk;

use crate::error::{Diagnostic, Severity};
use crate::interpreter::types::ast::{Span, Stmt};

// ============================================================================
// Validation Error Types
// ============================================================================

/// A problem found by semantic analysis
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The source location of the issue
    pub span: Span,
    /// Human-readable message
    pub message: String,
    pub severity: Severity,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

impl ValidationError {
    pub fn error(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    pub fn warning(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
        }
    }

    /// Check if this is an error (not a warning)
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic {
            line: self.span.line(),
            column: self.span.column(),
            message: self.message,
            rule: self.rule_id.to_string(),
            severity: self.severity,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            severity,
            self.span.line(),
            self.span.column(),
            self.message,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Each rule checks one aspect of the program and does not depend on the
/// results of other rules.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "break-outside-loop")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the validation over a module body
    fn validate(&self, body: &[Stmt], source: &str) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a validator with all built-in rules
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Error rules
                Box::new(rules::BreakOutsideLoopRule),
                Box::new(rules::ContinueOutsideLoopRule),
                Box::new(rules::ReturnOutsideFunctionRule),
                Box::new(rules::NonlocalAtModuleLevelRule),
                Box::new(rules::DuplicateArgumentRule),
                Box::new(rules::NonDefaultAfterDefaultRule),
                Box::new(rules::ExpressionDepthRule),
                // Warning rules
                Box::new(rules::UnreachableCodeRule),
            ],
        }
    }

    /// Run all validation rules and collect errors, ordered by position
    pub fn validate(&self, body: &[Stmt], source: &str) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(body, source))
            .collect();
        errors.sort_by_key(|e| (e.span.start_line, e.span.start_col));
        errors
    }

    /// List all registered rules as (id, description)
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate a parsed module and return everything found
pub fn validate_module(body: &[Stmt], source: &str) -> Vec<ValidationError> {
    Validator::new().validate(body, source)
}

/// Check if a module has any validation errors (not just warnings)
pub fn has_errors(body: &[Stmt], source: &str) -> bool {
    validate_module(body, source).iter().any(|e| e.is_error())
}
