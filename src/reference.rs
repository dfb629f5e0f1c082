//! References to configurables
//!
//! `@scope/name` is an unevaluated reference: it materializes to a callable
//! that enters the reference's scopes each time it is invoked. `@scope/name()`
//! is evaluated: it materializes to the result of one call, made fresh for
//! every consuming call. `%name` is shorthand for an evaluated reference to the
//! built-in macro (or constant) configurable scoped under `name`.
//!
//! A reference keeps the selector as written and re-resolves it against the
//! registry whenever the registry generation changes.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::{Inner, ScopedCallable};

/// Selector of the built-in macro configurable.
pub const MACRO_SELECTOR: &str = "gimlet.macro";
/// Selector of the built-in constant lookup configurable.
pub const CONSTANT_SELECTOR: &str = "gimlet.constant";
/// Selector of the built-in singleton configurable.
pub const SINGLETON_SELECTOR: &str = "gimlet.singleton";

/// A scoped selector plus its cached resolution.
pub(crate) struct ScopedName {
    pub scoped_selector: String,
    pub scopes: Vec<String>,
    pub selector: String,
    /// (registry generation, complete selector)
    resolved: Mutex<Option<(u64, String)>>,
}

impl ScopedName {
    pub fn new(scoped_selector: &str) -> Self {
        let mut scopes: Vec<String> = scoped_selector.split('/').map(str::to_string).collect();
        let selector = scopes.pop().unwrap_or_default();
        Self {
            scoped_selector: scoped_selector.to_string(),
            scopes,
            selector,
            resolved: Mutex::new(None),
        }
    }

    pub fn cached(&self, generation: u64) -> Option<String> {
        match &*self.resolved.lock() {
            Some((g, selector)) if *g == generation => Some(selector.clone()),
            _ => None,
        }
    }

    pub fn store(&self, generation: u64, selector: &str) {
        *self.resolved.lock() = Some((generation, selector.to_string()));
    }
}

struct ReferenceInner {
    name: Arc<ScopedName>,
    evaluate: bool,
    callable: OnceCell<Arc<ScopedCallable>>,
}

#[derive(Clone)]
pub struct Reference {
    inner: Arc<ReferenceInner>,
}

impl Reference {
    pub fn new(scoped_selector: &str, evaluate: bool) -> Self {
        Self {
            inner: Arc::new(ReferenceInner {
                name: Arc::new(ScopedName::new(scoped_selector)),
                evaluate,
                callable: OnceCell::new(),
            }),
        }
    }

    /// `%name`: the value bound to macro `name`.
    pub fn macro_named(name: &str) -> Self {
        Self::new(&format!("{}/{}", name, MACRO_SELECTOR), true)
    }

    /// `%name` where `name` is a registered constant.
    pub fn constant_named(name: &str) -> Self {
        Self::new(&format!("{}/{}", name, CONSTANT_SELECTOR), true)
    }

    pub fn scoped_selector(&self) -> &str {
        &self.inner.name.scoped_selector
    }

    /// Selector as written, possibly partial.
    pub fn selector(&self) -> &str {
        &self.inner.name.selector
    }

    pub fn scopes(&self) -> &[String] {
        &self.inner.name.scopes
    }

    pub fn scope_str(&self) -> String {
        self.inner.name.scopes.join("/")
    }

    pub fn evaluate(&self) -> bool {
        self.inner.evaluate
    }

    /// Whether this reference targets the built-in macro configurable.
    pub fn is_macro(&self) -> bool {
        matches!(self.selector(), "macro" | MACRO_SELECTOR)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.selector(), "constant" | CONSTANT_SELECTOR)
    }

    pub(crate) fn name(&self) -> &Arc<ScopedName> {
        &self.inner.name
    }

    /// The callable this reference materializes to when unevaluated.
    ///
    /// Created once per reference, so every consumer receives the same object.
    pub(crate) fn callable(&self, config: &Weak<Inner>) -> Arc<ScopedCallable> {
        self.inner
            .callable
            .get_or_init(|| {
                Arc::new(ScopedCallable::from_name(config.clone(), self.inner.name.clone()))
            })
            .clone()
    }

    /// Literal text, `%name` for macros and constants.
    pub fn repr(&self) -> String {
        if self.evaluate() && (self.is_macro() || self.is_constant()) {
            format!("%{}", self.scope_str())
        } else if self.evaluate() {
            format!("@{}()", self.scoped_selector())
        } else {
            format!("@{}", self.scoped_selector())
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.scoped_selector() == other.scoped_selector() && self.evaluate() == other.evaluate()
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}
