//! File access and source pre-processing collaborators.
//!
//! The engine only touches the file system through [`FileSystem`] and only
//! obtains source text through [`PreProcessor`], so both can be replaced by
//! in-memory stand-ins.

mod local;
mod preprocess;

pub use local::LocalFileSystem;
pub use preprocess::{FilePreProcessor, ProcessedScript};

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// File-system operations used by the engine.
pub trait FileSystem: Send + Sync {
    /// Directory a script runs from.
    fn working_directory(&self, script: &Path) -> PathBuf;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Open a file for writing, creating it or truncating an existing one.
    fn create_file(&self, path: &Path) -> std::io::Result<Box<dyn Write + Send>>;

    /// Delete a file. Missing files are not an error.
    fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    /// Read a whole file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Turns a script path into final compilable text.
pub trait PreProcessor: Send + Sync {
    fn process_file(&self, path: &Path) -> Result<String>;
}
