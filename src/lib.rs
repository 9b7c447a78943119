//! # script-session
//!
//! Incremental script execution with resumable sessions.
//!
//! A script is compiled and run against a session. The resulting state is
//! kept in a [`SessionStore`] under a [`SessionKey`], so the next script
//! submitted under the same key sees every variable the previous ones
//! declared.
//!
//! ## Features
//!
//! - **Resumable sessions**: state survives between submissions per key
//! - **Debug artifacts**: optional code and symbol files next to each script
//! - **Introspection**: list the variables a session currently holds
//! - **Pluggable backends**: compilers plug in through [`Backend`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use script_session::{CalcBackend, ScriptExecutor, SessionKey};
//!
//! fn main() -> script_session::Result<()> {
//!     script_session::logging::try_init().ok();
//!
//!     let executor = ScriptExecutor::local(CalcBackend);
//!     let key = SessionKey::new("quickstart");
//!
//!     executor.execute_code("var answer = 40;", &[], &[], Some(&key))?;
//!     let result = executor.execute_code("answer + 2", &[], &[], Some(&key))?;
//!
//!     println!("{} ({:?})", result.value, executor.list_variables(&key));
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod files;
pub mod host;
pub mod logging;
pub mod repl;
pub mod session;
pub mod value;

// Re-export commonly used types
pub use backend::{
    Backend, BackendSession, CalcBackend, Diagnostic, Severity, Submission, VariableBinding,
};
pub use error::{BoxError, Result, ScriptError};
pub use execution::{ArtifactLayout, ArtifactPaths, ExecutionResult, ScriptExecutor};
pub use files::{FilePreProcessor, FileSystem, LocalFileSystem, PreProcessor};
pub use host::{ScriptHostContext, ScriptPack, StaticPack};
pub use session::{SessionKey, SessionState, SessionStore};
pub use value::ScriptValue;
