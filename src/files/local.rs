//! `std::fs` backed file system.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::FileSystem;

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn working_directory(&self, script: &Path) -> PathBuf {
        match script.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn create_file(&self, path: &Path) -> std::io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_working_directory() {
        let fs = LocalFileSystem::new();
        assert_eq!(
            fs.working_directory(Path::new("/scripts/main.csx")),
            PathBuf::from("/scripts")
        );
        assert_eq!(fs.working_directory(Path::new("main.csx")), PathBuf::from("."));
    }

    #[test]
    fn test_create_file_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let fs = LocalFileSystem::new();

        let mut first = fs.create_file(&path).unwrap();
        first.write_all(b"a much longer first payload").unwrap();
        first.flush().unwrap();
        drop(first);

        let mut second = fs.create_file(&path).unwrap();
        second.write_all(b"short").unwrap();
        second.flush().unwrap();
        drop(second);

        assert_eq!(fs.read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        assert!(fs.remove_file(&dir.path().join("missing")).is_ok());
    }

    #[test]
    fn test_create_dir_all() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("bin");
        LocalFileSystem.create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
