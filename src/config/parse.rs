//! Applying config text to a [`Config`]
//!
//! Parsed statements are applied in order: bindings go to the store, imports
//! are recorded (and handed to the import hook), includes are resolved
//! against the search paths and parsed recursively.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::Config;
use crate::error::GimletError;
use crate::parser::{BindingStatement, ConfigParser, ImportStatement, ParserDelegate, Statement};
use crate::reader::{join_search_path, FileReader};
use crate::reference::{Reference, MACRO_SELECTOR};
use crate::value::Value;

/// Which bindings for unregistered configurables to skip instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SkipUnknown {
    #[default]
    No,
    All,
    /// Only these selectors, as written in the config.
    Only(BTreeSet<String>),
}

impl SkipUnknown {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SkipUnknown::No)
    }

    fn allows(&self, selector: &str) -> bool {
        match self {
            SkipUnknown::No => false,
            SkipUnknown::All => true,
            SkipUnknown::Only(selectors) => selectors.contains(selector),
        }
    }
}

impl From<bool> for SkipUnknown {
    fn from(skip: bool) -> Self {
        if skip {
            SkipUnknown::All
        } else {
            SkipUnknown::No
        }
    }
}

impl<const N: usize> From<[&str; N]> for SkipUnknown {
    fn from(selectors: [&str; N]) -> Self {
        SkipUnknown::Only(selectors.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for SkipUnknown {
    fn from(selectors: Vec<String>) -> Self {
        SkipUnknown::Only(selectors.into_iter().collect())
    }
}

/// Called for every import statement. May register configurables.
pub trait ImportHook: Send + Sync {
    fn import(&self, config: &Config, import: &ImportStatement) -> anyhow::Result<()>;
}

impl<F> ImportHook for F
where
    F: Fn(&Config, &ImportStatement) -> anyhow::Result<()> + Send + Sync,
{
    fn import(&self, config: &Config, import: &ImportStatement) -> anyhow::Result<()> {
        self(config, import)
    }
}

/// A parsed file with the imports and includes it contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeTree {
    pub filename: String,
    pub imports: Vec<ImportStatement>,
    pub includes: Vec<IncludeTree>,
}

/// Builds references against a config's registry and constants.
///
/// References to unknown configurables are kept unresolved; ambiguous ones
/// are errors.
pub(crate) struct ConfigDelegate<'a> {
    config: &'a Config,
}

impl<'a> ConfigDelegate<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl ParserDelegate for ConfigDelegate<'_> {
    fn configurable_reference(
        &self,
        scoped_selector: &str,
        evaluate: bool,
    ) -> Result<Value, GimletError> {
        let reference = Reference::new(scoped_selector, evaluate);
        let resolved = self
            .config
            .inner
            .registry
            .read()
            .configurables
            .resolve(reference.selector())?;
        if resolved.is_none() {
            debug!(reference = %scoped_selector, "Keeping unresolved reference");
        }
        Ok(Value::Reference(reference))
    }

    fn macro_reference(&self, scoped_name: &str) -> Result<Value, GimletError> {
        let matches = self.config.inner.constants.read().matching(scoped_name);
        match matches.as_slice() {
            [] => Ok(Value::Reference(Reference::macro_named(scoped_name))),
            [constant] => Ok(Value::Reference(Reference::constant_named(constant))),
            _ => Err(GimletError::AmbiguousConstant {
                name: scoped_name.to_string(),
                matches,
            }),
        }
    }
}

impl Config {
    /// Parse `text` and apply its statements.
    pub fn parse_config(
        &self,
        text: &str,
        skip_unknown: impl Into<SkipUnknown>,
    ) -> Result<(), GimletError> {
        self.apply_text(text, None, &skip_unknown.into())?;
        Ok(())
    }

    /// Same as [`Config::parse_config`] on the lines joined by newlines.
    pub fn parse_config_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        skip_unknown: impl Into<SkipUnknown>,
    ) -> Result<(), GimletError> {
        let text: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        self.parse_config(&text.join("\n"), skip_unknown)
    }

    /// Find `path` under the search paths and parse it, following includes.
    #[instrument(skip(self, skip_unknown))]
    pub fn parse_config_file(
        &self,
        path: &str,
        skip_unknown: impl Into<SkipUnknown>,
    ) -> Result<IncludeTree, GimletError> {
        self.parse_file(path, &skip_unknown.into())
    }

    /// Parse every file, then `bindings`, then optionally finalize.
    pub fn parse_config_files_and_bindings<P: AsRef<str>, B: AsRef<str>>(
        &self,
        files: &[P],
        bindings: &[B],
        finalize_config: bool,
        skip_unknown: impl Into<SkipUnknown>,
    ) -> Result<Vec<IncludeTree>, GimletError> {
        let skip = skip_unknown.into();
        let trees = files
            .iter()
            .map(|file| self.parse_file(file.as_ref(), &skip))
            .collect::<Result<Vec<_>, _>>()?;
        self.parse_config_lines(bindings, skip)?;
        if finalize_config {
            self.finalize()?;
        }
        Ok(trees)
    }

    /// Parse a single value, resolving references against this config.
    pub fn parse_value(&self, text: &str) -> Result<Value, GimletError> {
        crate::parser::parse_value(text, &ConfigDelegate::new(self))
    }

    /// Try `reader` after the readers registered before it.
    pub fn register_file_reader(&self, reader: impl FileReader + 'static) {
        self.inner.readers.write().push(Arc::new(reader));
    }

    pub fn set_import_hook(&self, hook: impl ImportHook + 'static) {
        *self.inner.import_hook.write() = Some(Arc::new(hook));
    }

    /// Imports recorded so far, in the order first seen.
    pub fn imported_modules(&self) -> Vec<ImportStatement> {
        self.inner.imports.lock().clone()
    }

    fn parse_file(&self, path: &str, skip: &SkipUnknown) -> Result<IncludeTree, GimletError> {
        let search_paths = self.inner.settings.read().search_paths.clone();
        let readers = self.inner.readers.read().clone();
        for prefix in &search_paths {
            let candidate = join_search_path(prefix, path);
            let Some(reader) = readers.iter().find(|reader| reader.exists(&candidate)) else {
                continue;
            };
            info!(file = %candidate, "Parsing config file");
            let text = reader.read(&candidate)?;
            let (imports, includes) = self.apply_text(&text, Some(&candidate), skip)?;
            return Ok(IncludeTree {
                filename: candidate,
                imports,
                includes,
            });
        }
        Err(GimletError::FileNotFound { path: path.to_string() })
    }

    fn apply_text(
        &self,
        text: &str,
        origin: Option<&str>,
        skip: &SkipUnknown,
    ) -> Result<(Vec<ImportStatement>, Vec<IncludeTree>), GimletError> {
        let all = SkipUnknown::All;
        let skip = match skip {
            SkipUnknown::No if self.inner.settings.read().skip_unknown => &all,
            other => other,
        };
        let delegate = ConfigDelegate::new(self);
        let mut imports = Vec::new();
        let mut includes = Vec::new();
        for statement in ConfigParser::new(text, origin, &delegate)? {
            match statement? {
                Statement::Binding(binding) => self.apply_binding(binding, skip)?,
                Statement::Block(_) => {}
                Statement::Import(import) => {
                    if self.apply_import(&import, skip)? {
                        imports.push(import);
                    }
                }
                Statement::Include(include) => {
                    let tree = self
                        .parse_file(&include.path, skip)
                        .map_err(|e| e.at(&include.location.without_column()))?;
                    includes.push(tree);
                }
            }
        }
        Ok((imports, includes))
    }

    fn apply_binding(
        &self,
        binding: BindingStatement,
        skip: &SkipUnknown,
    ) -> Result<(), GimletError> {
        let location = binding.location.without_column();
        if binding.is_macro() {
            let name = binding.macro_name();
            return self
                .bind_parameter((name.as_str(), MACRO_SELECTOR, "value"), binding.value)
                .map_err(|e| e.at(&location));
        }

        let known = !self
            .inner
            .registry
            .read()
            .configurables
            .matching(&binding.selector)
            .is_empty();
        if !known && skip.allows(&binding.selector) {
            warn!(
                selector = %binding.selector,
                param = %binding.param,
                "Skipping binding for unknown configurable"
            );
            return Ok(());
        }
        self.bind_parameter(
            (binding.scope.as_str(), binding.selector.as_str(), binding.param.as_str()),
            binding.value,
        )
        .map_err(|e| e.at(&location))
    }

    /// Record `import`; `false` if it was skipped.
    fn apply_import(
        &self,
        import: &ImportStatement,
        skip: &SkipUnknown,
    ) -> Result<bool, GimletError> {
        let hook = self.inner.import_hook.read().clone();
        if let Some(hook) = hook {
            if let Err(source) = hook.import(self, import) {
                if skip.is_enabled() {
                    warn!(module = %import.module, error = %source, "Skipping failed import");
                    return Ok(false);
                }
                let error = GimletError::Import {
                    module: import.module.clone(),
                    source,
                };
                return Err(match &import.location {
                    Some(location) => error.at(&location.without_column()),
                    None => error,
                });
            }
        }
        debug!(module = %import.module, "Recorded import");
        let mut imports = self.inner.imports.lock();
        if !imports.contains(import) {
            imports.push(import.clone());
        }
        Ok(true)
    }
}
