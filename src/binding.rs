//! Binding keys and the binding store
//!
//! The store maps `(scope, complete selector)` to the parameters bound there.
//! Resolving the overrides visible under an active scope path merges every
//! prefix of the path, root first, so deeper scopes win per parameter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::GimletError;
use crate::scope::ScopePath;
use crate::selector_map::{is_identifier, is_valid_selector};
use crate::value::Value;

/// Parameters bound for one `(scope, selector)`.
pub type Params = BTreeMap<String, Value>;

/// `(scope, selector, param)` as written by a caller. The selector may be
/// partial until the config resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingKey {
    pub scope: ScopePath,
    pub selector: String,
    pub param: String,
}

impl BindingKey {
    pub fn new(scope: &str, selector: &str, param: &str) -> Result<Self, GimletError> {
        let invalid = || GimletError::InvalidBindingKey {
            key: format!("{}/{}.{}", scope, selector, param),
        };
        if !is_valid_selector(selector) || !is_identifier(param) {
            return Err(invalid());
        }
        Ok(Self {
            scope: ScopePath::parse(scope)?,
            selector: selector.to_string(),
            param: param.to_string(),
        })
    }

    /// Parse `scope/selector.param`.
    pub fn parse(key: &str) -> Result<Self, GimletError> {
        let (scope, rest) = key.rsplit_once('/').unwrap_or(("", key));
        match rest.rsplit_once('.') {
            Some((selector, param)) => Self::new(scope, selector, param),
            None => Err(GimletError::InvalidBindingKey { key: key.to_string() }),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scope.is_root() {
            write!(f, "{}/", self.scope)?;
        }
        write!(f, "{}.{}", self.selector, self.param)
    }
}

/// Anything that names a binding: `"scope/selector.param"`,
/// `(scope, selector, param)` or a parsed [`BindingKey`].
pub trait IntoBindingKey {
    fn into_binding_key(self) -> Result<BindingKey, GimletError>;
}

impl IntoBindingKey for BindingKey {
    fn into_binding_key(self) -> Result<BindingKey, GimletError> {
        Ok(self)
    }
}

impl IntoBindingKey for &str {
    fn into_binding_key(self) -> Result<BindingKey, GimletError> {
        BindingKey::parse(self)
    }
}

impl IntoBindingKey for &String {
    fn into_binding_key(self) -> Result<BindingKey, GimletError> {
        BindingKey::parse(self)
    }
}

impl IntoBindingKey for (&str, &str, &str) {
    fn into_binding_key(self) -> Result<BindingKey, GimletError> {
        BindingKey::new(self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindingStore {
    entries: HashMap<(String, String), Params>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, scope: &str, selector: &str, param: &str, value: Value) {
        self.entries
            .entry((scope.to_string(), selector.to_string()))
            .or_default()
            .insert(param.to_string(), value);
    }

    pub fn get(&self, scope: &str, selector: &str) -> Option<&Params> {
        self.entries.get(&(scope.to_string(), selector.to_string()))
    }

    pub fn query(&self, scope: &str, selector: &str, param: &str) -> Option<&Value> {
        self.get(scope, selector).and_then(|params| params.get(param))
    }

    /// Overrides visible to `selector` under `scope`.
    ///
    /// With `inherit` every prefix of `scope` contributes, shallow first;
    /// without it only bindings made exactly at `scope` count.
    pub fn merged(&self, selector: &str, scope: &ScopePath, inherit: bool) -> Params {
        let mut merged = Params::new();
        if !inherit {
            if let Some(params) = self.get(&scope.to_string(), selector) {
                merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            return merged;
        }
        for prefix in scope.prefixes() {
            if let Some(params) = self.get(&prefix, selector) {
                merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        merged
    }

    /// Merge `params` into the entry, keeping keys `params` doesn't mention.
    pub fn update(&mut self, scope: &str, selector: &str, params: Params) {
        self.entries
            .entry((scope.to_string(), selector.to_string()))
            .or_default()
            .extend(params);
    }

    /// Move every entry for `old` to `new`, in all scopes.
    pub fn rename_selector(&mut self, old: &str, new: &str) {
        let moved: Vec<(String, String)> = self
            .entries
            .keys()
            .filter(|(_, selector)| selector == old)
            .cloned()
            .collect();
        for key in moved {
            if let Some(params) = self.entries.remove(&key) {
                self.update(&key.0, new, params);
            }
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|(scope, selector), _| keep(scope, selector));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `((scope, selector), params)` in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &Params)> {
        self.entries.iter()
    }

    /// Every bound value, with the key it is bound under.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str, &str, &Value)> {
        self.entries.iter().flat_map(|((scope, selector), params)| {
            params.iter().map(move |(param, value)| {
                (scope.as_str(), selector.as_str(), param.as_str(), value)
            })
        })
    }
}
