//! Execution result types.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::Diagnostic;
use crate::session::SessionKey;
use crate::value::ScriptValue;

/// Where the debug artifact pair of one execution was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Loadable image.
    pub code: PathBuf,
    /// Debug symbols matching `code`.
    pub symbols: PathBuf,
}

/// Result of executing one submission.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Value of the submission.
    pub value: ScriptValue,
    /// Non-error diagnostics reported while compiling.
    pub diagnostics: Vec<Diagnostic>,
    /// Key the resulting state was stored under.
    pub session: SessionKey,
    /// Whether an existing session was resumed rather than created.
    pub resumed: bool,
    /// Compile plus execute time.
    pub duration: Duration,
    /// Artifact pair, when running with debug artifacts enabled.
    pub artifacts: Option<ArtifactPaths>,
}

impl ExecutionResult {
    /// Create a new execution result.
    pub fn new(value: ScriptValue, session: SessionKey, duration: Duration) -> Self {
        Self {
            value,
            session,
            duration,
            ..Self::default()
        }
    }

    /// Mark the result as coming from a resumed session.
    pub fn resumed(mut self, resumed: bool) -> Self {
        self.resumed = resumed;
        self
    }

    /// Attach compiler diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Check whether the submission produced a value.
    pub fn has_value(&self) -> bool {
        !self.value.is_unit()
    }

    /// Check whether the compiler reported anything.
    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
