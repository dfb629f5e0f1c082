//! Settings for a config context
//!
//! Loaded from YAML, every field optional:
//!
//! ```yaml
//! search_paths: ["", "configs/"]
//! max_line_length: 80
//! continuation_indent: 4
//! skip_unknown: false
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::GimletError;

/// Extra search paths, separated like `PATH`.
pub const SEARCH_PATH_ENV: &str = "GIMLET_SEARCH_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Prefixes tried, in order, for relative file and include paths.
    pub search_paths: Vec<String>,

    /// Column at which rendered bindings wrap.
    pub max_line_length: usize,

    /// Indent for continuation lines of wrapped values.
    pub continuation_indent: usize,

    /// Skip bindings for unknown configurables instead of failing.
    pub skip_unknown: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_paths: vec![String::new()],
            max_line_length: 80,
            continuation_indent: 4,
            skip_unknown: false,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GimletError> {
        // an empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GimletError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GimletError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => GimletError::Io(e),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Append search paths from `GIMLET_SEARCH_PATH`.
    pub fn with_env(self) -> Self {
        match std::env::var_os(SEARCH_PATH_ENV) {
            Some(paths) => self.with_search_paths(
                std::env::split_paths(&paths).map(|p| p.to_string_lossy().into_owned()),
            ),
            None => self,
        }
    }

    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        for path in paths {
            if !self.search_paths.contains(&path) {
                self.search_paths.push(path);
            }
        }
        self
    }
}
