//! Debug artifact emission.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::result::ArtifactPaths;
use crate::backend::Submission;
use crate::files::FileSystem;

/// Naming scheme for emitted artifacts.
///
/// For `dir/script.csx` the pair is
/// `dir/<output_dir>/script.<code_extension>` and
/// `dir/<output_dir>/script.<symbol_extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLayout {
    /// Directory under the working directory.
    pub output_dir: String,
    /// Extension of the loadable image.
    pub code_extension: String,
    /// Extension of the symbol file.
    pub symbol_extension: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            output_dir: "bin".to_string(),
            code_extension: "dll".to_string(),
            symbol_extension: "pdb".to_string(),
        }
    }
}

impl ArtifactLayout {
    /// Artifact paths for a script. Depends only on the arguments.
    pub fn paths(&self, working_dir: &Path, script: &Path) -> ArtifactPaths {
        let base = script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        let dir = working_dir.join(&self.output_dir);

        ArtifactPaths {
            code: dir.join(format!("{}.{}", base, self.code_extension)),
            symbols: dir.join(format!("{}.{}", base, self.symbol_extension)),
        }
    }
}

/// An artifact write that failed.
#[derive(Error, Debug)]
#[error("failed to write artifact {}: {source}", path.display())]
pub struct ArtifactWriteFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Writes compiled submissions and their symbols next to the script.
///
/// Both streams are produced in memory first. If either file then fails to
/// write, both paths are deleted so no half-written pair is left behind.
#[derive(Debug, Clone, Default)]
pub struct ArtifactEmitter {
    layout: ArtifactLayout,
}

impl ArtifactEmitter {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Emit `submission` for `script` running from `working_dir`.
    pub fn emit<U: Submission>(
        &self,
        fs: &dyn FileSystem,
        working_dir: &Path,
        script: &Path,
        submission: &U,
    ) -> Result<ArtifactPaths, ArtifactWriteFailure> {
        let paths = self.layout.paths(working_dir, script);

        let mut code = Vec::new();
        let mut symbols = Vec::new();
        submission
            .emit(&mut code, &mut symbols)
            .map_err(|source| ArtifactWriteFailure {
                path: paths.code.clone(),
                source,
            })?;

        if let Some(dir) = paths.code.parent() {
            fs.create_dir_all(dir).map_err(|source| ArtifactWriteFailure {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        for (path, bytes) in [(&paths.code, &code), (&paths.symbols, &symbols)] {
            if let Err(source) = write_file(fs, path, bytes) {
                // Leave neither file behind.
                let _ = fs.remove_file(&paths.code);
                let _ = fs.remove_file(&paths.symbols);
                return Err(ArtifactWriteFailure {
                    path: path.clone(),
                    source,
                });
            }
        }

        debug!(
            code = %paths.code.display(),
            symbols = %paths.symbols.display(),
            code_bytes = code.len(),
            symbol_bytes = symbols.len(),
            "artifacts written"
        );
        Ok(paths)
    }
}

fn write_file(fs: &dyn FileSystem, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs.create_file(path)?;
    file.write_all(bytes)?;
    file.flush()
}
