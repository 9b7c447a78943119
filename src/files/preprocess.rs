//! `#load` / `#r` directive expansion.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{FileSystem, PreProcessor};
use crate::error::ScriptError;
use crate::Result;

const LOAD_DIRECTIVE: &str = "#load";
const REFERENCE_DIRECTIVE: &str = "#r";

/// Output of pre-processing one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedScript {
    /// Final compilable text.
    pub code: String,
    /// Names given to `#r` directives, in order of first appearance.
    pub references: Vec<String>,
    /// Every file that contributed text, root first.
    pub loaded: Vec<PathBuf>,
}

/// Pre-processor that inlines `#load "file"` directives.
///
/// Loaded paths are relative to the file containing the directive. Each
/// file is inlined once; a file that (transitively) loads itself is an
/// error. `#r` lines are stripped and collected as references.
pub struct FilePreProcessor {
    fs: Arc<dyn FileSystem>,
}

impl FilePreProcessor {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Expand a script and report what was loaded.
    pub fn process(&self, path: &Path) -> Result<ProcessedScript> {
        let mut out = ProcessedScript::default();
        let mut stack = Vec::new();
        self.expand(&normalize(path), &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand(
        &self,
        path: &Path,
        stack: &mut Vec<PathBuf>,
        out: &mut ProcessedScript,
    ) -> Result<()> {
        if stack.iter().any(|p| p == path) {
            return Err(ScriptError::Preprocess {
                path: path.to_path_buf(),
                message: format!(
                    "include cycle: {}",
                    stack
                        .iter()
                        .chain(std::iter::once(&path.to_path_buf()))
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                ),
            });
        }
        if out.loaded.iter().any(|p| p == path) {
            trace!(path = %path.display(), "already loaded");
            return Ok(());
        }

        let text = self
            .fs
            .read_to_string(path)
            .map_err(|e| ScriptError::Preprocess {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        out.loaded.push(path.to_path_buf());
        stack.push(path.to_path_buf());

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for (number, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(rest) = directive(trimmed, LOAD_DIRECTIVE) {
                let target = quoted(rest).ok_or_else(|| ScriptError::Preprocess {
                    path: path.to_path_buf(),
                    message: format!("line {}: expected `#load \"path\"`", number + 1),
                })?;
                self.expand(&normalize(&base.join(target)), stack, out)?;
            } else if let Some(rest) = directive(trimmed, REFERENCE_DIRECTIVE) {
                let name = quoted(rest).unwrap_or(rest).to_string();
                if !out.references.contains(&name) {
                    out.references.push(name);
                }
            } else {
                out.code.push_str(line);
                out.code.push('\n');
            }
        }

        stack.pop();
        Ok(())
    }
}

impl PreProcessor for FilePreProcessor {
    fn process_file(&self, path: &Path) -> Result<String> {
        let processed = self.process(path)?;
        if !processed.references.is_empty() {
            debug!(
                script = %path.display(),
                references = ?processed.references,
                "ignoring assembly references"
            );
        }
        Ok(processed.code)
    }
}

/// Text after `name` if `line` is that directive.
fn directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn quoted(text: &str) -> Option<&str> {
    text.strip_prefix('"')?.strip_suffix('"')
}

/// Lexically resolve `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::LocalFileSystem;
    use std::fs;
    use tempfile::tempdir;

    fn preprocessor() -> FilePreProcessor {
        FilePreProcessor::new(Arc::new(LocalFileSystem::new()))
    }

    #[test]
    fn test_plain_file() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.csx");
        fs::write(&main, "var x = 1;\nx + 1").unwrap();

        let code = preprocessor().process_file(&main).unwrap();
        assert_eq!(code, "var x = 1;\nx + 1\n");
    }

    #[test]
    fn test_load_is_inlined_relative_to_includer() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("a.csx"), "#load \"b.csx\"\nvar a = b + 1;").unwrap();
        fs::write(dir.path().join("lib").join("b.csx"), "var b = 1;").unwrap();
        let main = dir.path().join("main.csx");
        fs::write(&main, "#load \"lib/a.csx\"\n#load \"./lib/b.csx\"\na").unwrap();

        let processed = preprocessor().process(&main).unwrap();
        assert_eq!(processed.code, "var b = 1;\nvar a = b + 1;\na\n");
        assert_eq!(processed.loaded.len(), 3);
    }

    #[test]
    fn test_references_are_collected() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.csx");
        fs::write(&main, "#r \"System.Data\"\n#r System.Data\n1").unwrap();

        let processed = preprocessor().process(&main).unwrap();
        assert_eq!(processed.code, "1\n");
        assert_eq!(processed.references, ["System.Data"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csx"), "#load \"b.csx\"").unwrap();
        fs::write(dir.path().join("b.csx"), "#load \"a.csx\"").unwrap();

        let err = preprocessor()
            .process_file(&dir.path().join("a.csx"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::Preprocess { .. }));
        assert!(err.to_string().contains("include cycle"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = preprocessor()
            .process_file(&dir.path().join("nope.csx"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::Preprocess { .. }));
    }

    #[test]
    fn test_malformed_load() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.csx");
        fs::write(&main, "#load lib.csx").unwrap();
        assert!(preprocessor().process_file(&main).is_err());
    }

    #[test]
    fn test_directive_requires_separator() {
        assert_eq!(directive("#load \"x\"", "#load"), Some("\"x\""));
        assert_eq!(directive("#loader", "#load"), None);
        assert_eq!(directive("#r \"x\"", "#r"), Some("\"x\""));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
    }
}
