//! Pluggable file readers
//!
//! Config files are located by trying every registered reader, in
//! registration order, against every search-path prefix. The first reader
//! whose `exists` check passes supplies the text.

use std::collections::HashMap;
use std::path::Path;

use crate::error::GimletError;

pub trait FileReader: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> Result<String, GimletError>;
}

/// Reads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl FileReader for FsReader {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn read(&self, path: &str) -> Result<String, GimletError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Serves files from memory, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    files: HashMap<String, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl FileReader for MemoryReader {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<String, GimletError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| GimletError::FileNotFound { path: path.to_string() })
    }
}

/// Join a search-path prefix and a relative path. Absolute paths and the
/// empty prefix leave `path` unchanged.
pub fn join_search_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() || Path::new(path).is_absolute() {
        return path.to_string();
    }
    Path::new(prefix).join(path).to_string_lossy().into_owned()
}
