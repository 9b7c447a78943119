//! Error types for script-session.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::Diagnostic;
use crate::execution::{ArtifactWriteFailure, ExecutionResult};

/// Boxed error produced by a backend while running compiled code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for script-session operations.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The submission did not compile. Diagnostics come straight from the backend.
    #[error("compilation failed: {}", render_diagnostics(.diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    /// Compiled code raised while executing.
    ///
    /// When artifacts were enabled and writing them failed before the
    /// fault, that failure is carried in `artifact`.
    #[error("execution fault: {source}{}", artifact_note(.artifact))]
    ExecutionFault {
        #[source]
        source: BoxError,
        artifact: Option<Box<ArtifactWriteFailure>>,
    },

    /// Writing the debug code or symbol stream failed.
    ///
    /// The submission was still executed and its session stored; the result
    /// of that execution is carried here.
    #[error("failed to write artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        result: Box<ExecutionResult>,
    },

    /// The script could not be turned into compilable source text.
    #[error("failed to process {}: {message}", path.display())]
    Preprocess { path: PathBuf, message: String },

    /// The backend refused to create a session.
    #[error("backend error: {0}")]
    Backend(String),

    /// The blocking task running an execution panicked or was cancelled.
    #[error("execution task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl ScriptError {
    /// Wrap a backend execution failure.
    pub fn fault(source: impl Into<BoxError>) -> Self {
        Self::ExecutionFault {
            source: source.into(),
            artifact: None,
        }
    }

    /// The artifact write that failed during this execution, if any.
    pub fn artifact_failure(&self) -> Option<&ArtifactWriteFailure> {
        match self {
            Self::ExecutionFault { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }

    /// Backend diagnostics, if this is a compilation error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Compilation { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

fn artifact_note(artifact: &Option<Box<ArtifactWriteFailure>>) -> String {
    artifact
        .as_ref()
        .map(|failure| format!(" (also {})", failure))
        .unwrap_or_default()
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience Result type for script-session operations.
pub type Result<T> = std::result::Result<T, ScriptError>;
