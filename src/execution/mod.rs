//! Script execution engine.
//!
//! This module provides:
//! - Session creation and resumption per [`SessionKey`](crate::SessionKey)
//! - Debug artifact emission next to the script
//! - Variable introspection between submissions
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use script_session::{CalcBackend, ScriptExecutor, SessionKey};
//!
//! let executor = ScriptExecutor::local(CalcBackend);
//! let key = SessionKey::new("demo");
//!
//! let result = executor
//!     .execute(Path::new("setup.csx"), &[], &[], Some(&key))
//!     .unwrap();
//! println!("value: {}", result.value);
//!
//! for variable in executor.list_variables(&key) {
//!     println!("{}", variable);
//! }
//! ```

mod artifact;
mod executor;
mod result;
mod variables;

pub use artifact::{ArtifactEmitter, ArtifactLayout, ArtifactWriteFailure};
pub use executor::ScriptExecutor;
pub use result::{ArtifactPaths, ExecutionResult};
pub use variables::list_variables;
