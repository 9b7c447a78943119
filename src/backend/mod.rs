//! Compilation backend interface.
//!
//! The engine never parses or runs code itself. A [`Backend`] creates
//! sessions, a [`BackendSession`] compiles submissions against everything
//! that ran before in it, and a [`Submission`] can emit its compiled form
//! for external debuggers.
//!
//! [`CalcBackend`] is a small expression language shipped with the crate.

mod calc;

pub use calc::{CalcBackend, CalcSession, CalcSubmission, RuntimeFault};

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::host::ScriptHostContext;
use crate::value::ScriptValue;

/// Severity of a backend diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A message reported by the backend while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            column,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "({},{}): {}: {}", self.line, self.column, severity, self.message)
    }
}

/// A variable visible in a session, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableBinding {
    pub name: String,
    pub type_name: String,
}

impl VariableBinding {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Render as `"{type} {name}"`.
    pub fn render(&self) -> String {
        format!("{} {}", self.type_name, self.name)
    }
}

/// Creates execution sessions.
pub trait Backend: Send + Sync {
    type Session: BackendSession;

    /// Start a new session seeded with the given host context.
    fn create_session(&self, host: ScriptHostContext) -> Result<Self::Session, BoxError>;
}

/// A backend execution context that accumulates bindings across submissions.
pub trait BackendSession: Send + 'static {
    type Submission: Submission;

    /// Compile source text against the current state of the session.
    ///
    /// On failure the error diagnostics are returned. Compiling must not
    /// change the bindings visible through [`current_bindings`](Self::current_bindings).
    fn compile_submission(&mut self, source: &str) -> Result<Self::Submission, Vec<Diagnostic>>;

    /// Run a compiled submission. Side effects of a faulting submission
    /// remain in the session.
    fn execute(&mut self, submission: Self::Submission) -> Result<ScriptValue, BoxError>;

    /// Bindings currently visible, in declaration order. Shadowed bindings
    /// are included.
    fn current_bindings(&self) -> Vec<VariableBinding>;
}

/// A compiled unit of source text.
pub trait Submission {
    /// Warnings produced while compiling.
    fn diagnostics(&self) -> &[Diagnostic] {
        &[]
    }

    /// Write the loadable image to `code` and debug symbols to `symbols`.
    fn emit(&self, code: &mut dyn Write, symbols: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        assert_eq!(
            Diagnostic::error(3, 7, "unexpected `)`").to_string(),
            "(3,7): error: unexpected `)`"
        );
        assert_eq!(
            Diagnostic::warning(1, 1, "unused value").to_string(),
            "(1,1): warning: unused value"
        );
    }

    #[test]
    fn test_binding_render() {
        let binding = VariableBinding::new("x", "int");
        assert_eq!(binding.render(), "int x");
    }
}
