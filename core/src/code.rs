//! Compiled code units
//!
//! A [`Code`] is compiled once and can run any number of times, against
//! any number of states. Each run binds to the target state's current
//! globals, so definitions accumulate across runs.

use crate::error::{CompileErrorSet, Diagnostic};
use crate::interpreter::{self, Program};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// An immutable compiled unit with its diagnostic name
#[derive(Clone)]
pub struct Code {
    inner: Arc<CodeInner>,
}

struct CodeInner {
    program: Program,
    digest: String,
}

impl Code {
    /// Compile a module
    ///
    /// Every error found is reported together. Warnings do not fail the
    /// compile; they are logged and kept on the result.
    pub fn compile(source: &str, name: &str) -> Result<Code, CompileErrorSet> {
        let compiled = interpreter::compile(source, name);
        Self::finish(source, name, compiled)
    }

    /// Compile a single expression whose value is the result of running it
    pub fn compile_expression(source: &str, name: &str) -> Result<Code, CompileErrorSet> {
        let compiled = interpreter::compile_expression(source.trim(), name);
        Self::finish(source, name, compiled)
    }

    fn finish(
        source: &str,
        name: &str,
        compiled: Result<Program, Vec<Diagnostic>>,
    ) -> Result<Code, CompileErrorSet> {
        let program = compiled.map_err(|diagnostics| {
            tracing::debug!(name, errors = diagnostics.len(), "compilation failed");
            CompileErrorSet::new(name, diagnostics)
        })?;

        for warning in &program.warnings {
            tracing::warn!(
                name,
                line = warning.line,
                rule = %warning.rule,
                "{}",
                warning.message
            );
        }

        let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
        Ok(Code {
            inner: Arc::new(CodeInner { program, digest }),
        })
    }

    /// Name used in diagnostics and tracebacks
    pub fn name(&self) -> &str {
        &self.inner.program.name
    }

    /// Non-fatal diagnostics from compilation
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.inner.program.warnings
    }

    /// Hex SHA-256 of the source, for host-side caching
    pub fn digest(&self) -> &str {
        &self.inner.digest
    }

    pub(crate) fn program(&self) -> &Program {
        &self.inner.program
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("name", &self.name())
            .field("digest", &self.digest())
            .finish()
    }
}
