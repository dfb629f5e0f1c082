//! Error types with fix suggestions
//!
//! Codes are grouped by category:
//! - GIM-010..019: registration
//! - GIM-020..029: resolution (selectors, parameters, scopes)
//! - GIM-030..039: required parameters
//! - GIM-040..049: config text syntax
//! - GIM-050..059: locking
//! - GIM-060..069: references, macros, constants, singletons
//! - GIM-070..079: files, includes, imports, settings
//! - GIM-080..089: calls into configurable targets
//! - GIM-090..099: finalization

use std::fmt;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Where a statement or token came from.
///
/// `origin` is the file name when the text was read from a file, `None` for
/// strings. `column` is 1-based and only present for token-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub origin: Option<String>,
    pub line: usize,
    pub column: Option<usize>,
    pub text: String,
}

impl Location {
    pub fn new(
        origin: Option<String>,
        line: usize,
        column: Option<usize>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            line,
            column,
            text: text.into(),
        }
    }

    /// Same location with the column dropped (statement-level errors).
    pub fn without_column(&self) -> Self {
        Self {
            column: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "\n  In file \"{}\", line {}", origin, self.line)?,
            None => write!(f, "\n  In bindings string line {}", self.line)?,
        }
        write!(f, "\n    {}", self.text.trim_end())?;
        if let Some(column) = self.column.filter(|c| *c > 0) {
            write!(f, "\n    {}^", " ".repeat(column - 1))?;
        }
        Ok(())
    }
}

/// A syntax error in config text. Always carries its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> Option<usize> {
        self.location.column
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.message, self.location)
    }
}

impl std::error::Error for ParseError {}

#[derive(Error, Debug)]
pub enum GimletError {
    // ─────────────────────────────────────────────────────────────
    // Registration errors (GIM-010 to GIM-019)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-010: Configurable name '{name}' is invalid")]
    InvalidName { name: String },

    #[error("GIM-011: Module '{module}' is invalid")]
    InvalidModule { module: String },

    #[error("GIM-012: A configurable matching '{selector}' already exists")]
    DuplicateConfigurable { selector: String },

    #[error("GIM-013: '{selector}' specifies both an allowlist and a denylist")]
    AllowDenyConflict { selector: String },

    #[error("GIM-014: Argument '{param}' in {list} not a parameter of '{selector}'")]
    UnknownListedParameter {
        param: String,
        list: &'static str,
        selector: String,
    },

    #[error("GIM-015: Invalid selector '{selector}'")]
    InvalidSelector { selector: String },

    #[error("GIM-016: Constants matching selector '{name}' already exist ({matches:?})")]
    DuplicateConstant { name: String, matches: Vec<String> },

    // ─────────────────────────────────────────────────────────────
    // Resolution errors (GIM-020 to GIM-028)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-020: No configurable matching '{selector}'")]
    UnknownConfigurable { selector: String },

    #[error("GIM-021: Ambiguous selector '{selector}', matches {matches:?}")]
    AmbiguousSelector { selector: String, matches: Vec<String> },

    #[error("GIM-022: Configurable '{selector}' doesn't have a parameter named '{param}'")]
    NoSuchParameter { selector: String, param: String },

    #[error("GIM-023: Configurable '{selector}' doesn't include kwarg '{param}' in its allowlist")]
    NotAllowlisted { selector: String, param: String },

    #[error("GIM-024: Configurable '{selector}' has denylisted kwarg '{param}'")]
    Denylisted { selector: String, param: String },

    #[error("GIM-025: Configurable '{selector}' has no bound parameters")]
    NoBindings { selector: String },

    #[error("GIM-026: Configurable '{selector}' has no value bound for parameter '{param}'")]
    NotBound { selector: String, param: String },

    #[error("GIM-027: Invalid scope '{scope}'")]
    InvalidScope { scope: String },

    #[error("GIM-028: Invalid binding key '{key}'")]
    InvalidBindingKey { key: String },

    // ─────────────────────────────────────────────────────────────
    // Required parameter errors (GIM-030 to GIM-031)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-030: Required bindings for `{configurable}` not provided in config: {missing:?}")]
    MissingRequired {
        configurable: String,
        missing: Vec<String>,
    },

    #[error("GIM-031: REQUIRED is not allowed for unnamed (vararg) parameters of '{configurable}'")]
    RequiredInVarargs { configurable: String },

    // ─────────────────────────────────────────────────────────────
    // Syntax errors (GIM-040)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-040: {0}")]
    Parse(#[from] ParseError),

    // ─────────────────────────────────────────────────────────────
    // Locking errors (GIM-050 to GIM-051)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-050: Attempted to {action} after the config was locked")]
    Locked { action: String },

    #[error("GIM-051: Finalize called twice (config already locked)")]
    AlreadyFinalized,

    // ─────────────────────────────────────────────────────────────
    // Reference, constant and singleton errors (GIM-060 to GIM-067)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-060: No configurable matching reference '{reference}'.{hint}")]
    UnresolvedReference { reference: String, hint: String },

    #[error("GIM-061: Reference '{reference}' must be evaluated (add '()')")]
    MacroNotEvaluated { reference: String },

    #[error("GIM-062: No bindings specified for '{reference}'")]
    MacroUnbound { reference: String },

    #[error("GIM-063: The config owning '{selector}' no longer exists")]
    ContextDropped { selector: String },

    #[error("GIM-064: No constant matching '{name}'")]
    UnknownConstant { name: String },

    #[error("GIM-065: Ambiguous constant selector '{name}', matches {matches:?}")]
    AmbiguousConstant { name: String, matches: Vec<String> },

    #[error("GIM-066: No singleton found for key '{key}', and no constructor was given")]
    SingletonMissing { key: String },

    #[error("GIM-067: The constructor for singleton '{key}' is not callable")]
    SingletonNotCallable { key: String },

    // ─────────────────────────────────────────────────────────────
    // File, import and settings errors (GIM-070 to GIM-073)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-070: Unable to open file: {path}")]
    FileNotFound { path: String },

    #[error("GIM-071: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GIM-072: Settings parse error: {0}")]
    Settings(#[from] serde_yaml::Error),

    #[error("GIM-073: Failed to import module '{module}': {source}")]
    Import {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Call errors (GIM-080 to GIM-081)
    // ─────────────────────────────────────────────────────────────
    #[error(
        "GIM-080: {source}{diagnostics}\n  In call to configurable '{configurable}'{}",
        scope_suffix(.scope)
    )]
    Call {
        configurable: String,
        scope: String,
        diagnostics: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "GIM-081: {message}{diagnostics}\n  In call to configurable '{configurable}'{}",
        scope_suffix(.scope)
    )]
    Signature {
        configurable: String,
        scope: String,
        message: String,
        diagnostics: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Finalization errors (GIM-090 to GIM-091)
    // ─────────────────────────────────────────────────────────────
    #[error("GIM-090: Received conflicting updates for '{key}' from finalize hooks")]
    ConflictingHookBindings { key: String },

    #[error("GIM-091: Finalize hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    /// An error raised while applying a parsed statement, annotated with the
    /// statement's location.
    #[error("{error}{location}")]
    Located {
        location: Location,
        #[source]
        error: Box<GimletError>,
    },
}

fn scope_suffix(scope: &str) -> String {
    if scope.is_empty() {
        String::new()
    } else {
        format!(" in scope '{}'", scope)
    }
}

impl GimletError {
    /// Attach `location` unless the error already carries one.
    pub fn at(self, location: &Location) -> Self {
        match self {
            GimletError::Parse(_) | GimletError::Located { .. } => self,
            other => GimletError::Located {
                location: location.clone(),
                error: Box::new(other),
            },
        }
    }

    /// The error with any location annotation stripped.
    pub fn root(&self) -> &GimletError {
        match self {
            GimletError::Located { error, .. } => error.root(),
            other => other,
        }
    }
}

impl FixSuggestion for GimletError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            GimletError::InvalidName { .. } | GimletError::InvalidModule { .. } => {
                Some("Use identifiers separated by periods, e.g. my.module.name")
            }
            GimletError::DuplicateConfigurable { .. } => {
                Some("Register under a different module, or enable interactive mode to replace it")
            }
            GimletError::AllowDenyConflict { .. } => {
                Some("Keep either the allowlist or the denylist")
            }
            GimletError::UnknownListedParameter { .. } => {
                Some("Only list parameters that appear in the target's signature")
            }
            GimletError::InvalidSelector { .. } => Some("Selectors look like module.name or name"),
            GimletError::DuplicateConstant { .. } => Some("Constant names must be unique"),
            GimletError::UnknownConfigurable { .. } => {
                Some("Check the selector spelling and that the configurable is registered")
            }
            GimletError::UnknownConstant { .. } => {
                Some("Register the constant before referencing it")
            }
            GimletError::AmbiguousSelector { .. } | GimletError::AmbiguousConstant { .. } => {
                Some("Add leading module components until the selector is unique")
            }
            GimletError::NoSuchParameter { .. } => {
                Some("Check the parameter name against the signature")
            }
            GimletError::NotAllowlisted { .. } | GimletError::Denylisted { .. } => {
                Some("This parameter is not configurable for this target")
            }
            GimletError::NoBindings { .. } | GimletError::NotBound { .. } => {
                Some("Bind the parameter before querying it")
            }
            GimletError::InvalidScope { .. } => Some("Scopes are names separated by '/'"),
            GimletError::InvalidBindingKey { .. } => Some("Use scope/selector.param"),
            GimletError::SingletonMissing { .. } | GimletError::SingletonNotCallable { .. } => {
                Some("Bind singleton.constructor to a reference, e.g. @MyClass")
            }
            GimletError::MissingRequired { .. } => Some("Bind the listed parameters in config"),
            GimletError::RequiredInVarargs { .. } => {
                Some("Pass REQUIRED only for named parameters")
            }
            GimletError::Parse(_) => Some("Fix the config syntax at the indicated position"),
            GimletError::Locked { .. } => Some("Wrap the modification in unlock_config()"),
            GimletError::AlreadyFinalized => Some("Call finalize() only once"),
            GimletError::UnresolvedReference { .. } => {
                Some("Register the referenced configurable before using it")
            }
            GimletError::MacroNotEvaluated { .. } => {
                Some("Reference macros as %name or @name/macro()")
            }
            GimletError::MacroUnbound { .. } => Some("Bind the macro, e.g. name = value"),
            GimletError::ContextDropped { .. } => {
                Some("Keep the Config alive while using its callables")
            }
            GimletError::FileNotFound { .. } => {
                Some("Check the path and the configured search paths")
            }
            GimletError::Io(_) => Some("Check file path and permissions"),
            GimletError::Settings(_) => Some("Check settings YAML syntax"),
            GimletError::Import { .. } => Some("Pass skip_unknown to ignore unknown imports"),
            GimletError::Call { .. } | GimletError::Signature { .. } => {
                Some("Compare the values supplied by config and caller with the signature")
            }
            GimletError::ConflictingHookBindings { .. } => {
                Some("Only one finalize hook may bind a given parameter")
            }
            GimletError::Hook(_) => None,
            GimletError::Located { error, .. } => error.fix_suggestion(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_quotes_line_and_points_at_column() {
        let loc = Location::new(Some("a.gin".into()), 3, Some(5), "x.y = Garbage  \n");
        let text = loc.to_string();
        assert!(text.contains("In file \"a.gin\", line 3"));
        assert!(text.contains("\n    x.y = Garbage\n"));
        assert!(text.ends_with("\n        ^"));
    }

    #[test]
    fn location_without_origin_mentions_string() {
        let loc = Location::new(None, 1, None, "a.b = 1");
        assert_eq!(loc.to_string(), "\n  In bindings string line 1\n    a.b = 1");
    }

    #[test]
    fn parse_errors_are_not_rewrapped() {
        let loc = Location::new(None, 2, Some(1), "bad");
        let err = GimletError::Parse(ParseError::new("Unexpected token.", loc.clone()));
        assert!(matches!(err.at(&loc), GimletError::Parse(_)));
    }

    #[test]
    fn located_errors_keep_root() {
        let loc = Location::new(None, 2, Some(4), "a.b = 1").without_column();
        let err = GimletError::UnknownConfigurable { selector: "a".into() }.at(&loc);
        assert!(matches!(err.root(), GimletError::UnknownConfigurable { .. }));
        assert!(err.to_string().contains("GIM-020"));
        assert!(err.to_string().contains("line 2"));
        // statement-level: no caret
        assert!(!err.to_string().contains('^'));
    }

    #[test]
    fn every_located_error_has_suggestion_of_inner() {
        let loc = Location::new(None, 1, None, "x");
        let err = GimletError::AlreadyFinalized.at(&loc);
        assert_eq!(err.fix_suggestion(), Some("Call finalize() only once"));
    }
}
