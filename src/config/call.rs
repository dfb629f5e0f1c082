//! Calling configurables
//!
//! A call merges the bindings visible under the active scope, lets the
//! caller's arguments win, records what was used in the operative snapshot,
//! materializes references and finally invokes the target.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tracing::debug;

use super::{Config, Configurable, Inner};
use crate::binding::Params;
use crate::error::GimletError;
use crate::reference::{Reference, ScopedName};
use crate::scope::ScopePath;
use crate::signature::{ArgumentError, CallArgs, Signature};
use crate::value::Value;

const FINALIZE_HINT: &str = "\n\n    To catch this earlier, ensure finalize() is called.";

/// A configurable captured together with its scopes.
///
/// Calling it enters those scopes (replacing the caller's) for the duration
/// of the call. Holds the owning config weakly.
pub struct ScopedCallable {
    config: Weak<Inner>,
    name: Arc<ScopedName>,
}

impl ScopedCallable {
    pub(crate) fn from_name(config: Weak<Inner>, name: Arc<ScopedName>) -> Self {
        Self { config, name }
    }

    /// Scoped selector as written.
    pub fn selector(&self) -> &str {
        &self.name.scoped_selector
    }

    pub fn call(&self, args: CallArgs) -> Result<Value, GimletError> {
        let inner = self.config.upgrade().ok_or_else(|| GimletError::ContextDropped {
            selector: self.selector().to_string(),
        })?;
        Config { inner }.call_name(&self.name, args)
    }
}

impl fmt::Debug for ScopedCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedCallable").field(&self.selector()).finish()
    }
}

pub(super) fn unresolved_reference(reference: &Reference, hint: String) -> GimletError {
    GimletError::UnresolvedReference {
        reference: format!(
            "@{}{}",
            reference.selector(),
            if reference.evaluate() { "()" } else { "" }
        ),
        hint,
    }
}

impl Config {
    /// A callable for `scope/selector`, resolved against the registry each
    /// time the registry changes.
    pub fn configurable(&self, scoped_selector: &str) -> Result<Arc<ScopedCallable>, GimletError> {
        let name = ScopedName::new(scoped_selector);
        ScopePath::from_components(name.scopes.clone())?;
        self.get_configurable(&name.selector)?;
        Ok(Arc::new(ScopedCallable::from_name(
            Arc::downgrade(&self.inner),
            Arc::new(name),
        )))
    }

    /// Call the configurable named by `scoped_selector` with `args`.
    pub fn call(&self, scoped_selector: &str, args: CallArgs) -> Result<Value, GimletError> {
        let name = ScopedName::new(scoped_selector);
        let configurable = self.get_configurable(&name.selector)?;
        self.call_in_scopes(&configurable, &name.scopes, args)
    }

    pub(crate) fn call_name(
        &self,
        name: &ScopedName,
        args: CallArgs,
    ) -> Result<Value, GimletError> {
        let configurable = self
            .resolve_name(name)?
            .ok_or_else(|| GimletError::UnresolvedReference {
                reference: format!("@{}", name.selector),
                hint: FINALIZE_HINT.to_string(),
            })?;
        self.call_in_scopes(&configurable, &name.scopes, args)
    }

    /// Resolve `name`, reusing its cached resolution while the registry
    /// generation is unchanged. `None` if nothing matches.
    pub(crate) fn resolve_name(
        &self,
        name: &ScopedName,
    ) -> Result<Option<Arc<Configurable>>, GimletError> {
        let registry = self.inner.registry.read();
        let generation = self.inner.generation.load(Ordering::Acquire);
        if let Some(selector) = name.cached(generation) {
            if let Some(configurable) = registry.configurables.get(&selector) {
                return Ok(Some(configurable.clone()));
            }
        }
        let Some(selector) = registry.configurables.resolve(&name.selector)? else {
            return Ok(None);
        };
        name.store(generation, &selector);
        Ok(registry.configurables.get(&selector).cloned())
    }

    fn call_in_scopes(
        &self,
        configurable: &Configurable,
        scopes: &[String],
        args: CallArgs,
    ) -> Result<Value, GimletError> {
        if scopes.is_empty() {
            return self.call_configurable(configurable, args);
        }
        let _scope = self.scope_path(ScopePath::from_components(scopes.to_vec())?);
        self.call_configurable(configurable, args)
    }

    fn call_configurable(
        &self,
        configurable: &Configurable,
        args: CallArgs,
    ) -> Result<Value, GimletError> {
        let CallArgs {
            mut positional,
            mut keyword,
        } = args;
        let selector = configurable.selector();
        let signature = configurable.signature();
        let scope = self.current_scope();
        let scope_str = scope.to_string();

        let positional_names: Vec<String> = signature
            .positional_names()
            .take(positional.len())
            .map(str::to_string)
            .collect();
        if positional.iter().skip(positional_names.len()).any(Value::is_required) {
            return Err(GimletError::RequiredInVarargs {
                configurable: selector.to_string(),
            });
        }
        let required_positions: Vec<(usize, String)> = positional_names
            .iter()
            .enumerate()
            .filter(|(i, _)| positional[*i].is_required())
            .map(|(i, name)| (i, name.clone()))
            .collect();
        let required_keywords: Vec<String> = keyword
            .iter()
            .filter(|(_, value)| value.is_required())
            .map(|(name, _)| name.clone())
            .collect();
        let mut caller_supplied = BTreeSet::new();
        for (i, name) in positional_names.iter().enumerate() {
            if !positional[i].is_required() {
                caller_supplied.insert(name.clone());
            }
        }
        for (name, value) in &keyword {
            if !value.is_required() {
                caller_supplied.insert(name.clone());
            }
        }

        let mut overlay = self.inner.store.read().merged(selector, &scope, true);
        overlay.retain(|name, _| !caller_supplied.contains(name));
        let config_bound: Vec<String> = overlay.keys().cloned().collect();

        let mut operative = configurable.operative_defaults().clone();
        operative.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        operative.retain(|name, _| !caller_supplied.contains(name));
        self.inner.operative.lock().update(&scope_str, selector, operative);

        let mut overlay = self.materialize(overlay)?;

        let mut missing = Vec::new();
        let mut satisfied = BTreeSet::new();
        for (index, name) in &required_positions {
            match overlay.remove(name) {
                Some(value) => {
                    positional[*index] = value;
                    satisfied.insert(name.clone());
                }
                None => missing.push(name.clone()),
            }
        }
        for name in &required_keywords {
            if overlay.contains_key(name) {
                keyword.remove(name);
            } else {
                missing.push(name.clone());
            }
        }
        for param in &signature.params {
            let required_default = matches!(param.default, Some(Value::Required));
            if required_default
                && !caller_supplied.contains(&param.name)
                && !satisfied.contains(&param.name)
                && !overlay.contains_key(&param.name)
                && !missing.contains(&param.name)
            {
                missing.push(param.name.clone());
            }
        }
        if !missing.is_empty() {
            missing.sort_by_key(|name| {
                signature
                    .params
                    .iter()
                    .position(|p| &p.name == name)
                    .unwrap_or(usize::MAX)
            });
            return Err(GimletError::MissingRequired {
                configurable: self
                    .minimal_selector(selector)
                    .unwrap_or_else(|| selector.to_string()),
                missing,
            });
        }

        overlay.extend(keyword);
        let positional_count = positional.len();
        let bound: BTreeSet<String> = overlay.keys().cloned().collect();
        let diagnostics = || {
            call_diagnostics(
                signature,
                positional_count,
                &bound,
                &config_bound,
                &caller_supplied,
            )
        };

        let arguments = signature
            .bind(positional, overlay)
            .map_err(|message| GimletError::Signature {
                configurable: configurable.name().to_string(),
                scope: scope_str.clone(),
                message,
                diagnostics: diagnostics(),
            })?;

        debug!(configurable = %selector, scope = %scope_str, "Calling configurable");
        configurable
            .target()
            .invoke(self, arguments)
            .map_err(|source| GimletError::Call {
                configurable: configurable.name().to_string(),
                scope: scope_str.clone(),
                diagnostics: if source.is::<ArgumentError>() {
                    diagnostics()
                } else {
                    String::new()
                },
                source,
            })
    }

    /// Replace every reference in `params` with what it stands for.
    pub(crate) fn materialize(&self, params: Params) -> Result<Params, GimletError> {
        params
            .into_iter()
            .map(|(name, value)| Ok((name, self.materialize_value(&value)?)))
            .collect()
    }

    /// `value` with evaluated references replaced by a fresh call result and
    /// the others by their callable.
    pub fn materialize_value(&self, value: &Value) -> Result<Value, GimletError> {
        value.map_references(&mut |reference| self.materialize_reference(reference))
    }

    fn materialize_reference(&self, reference: &Reference) -> Result<Value, GimletError> {
        if self.resolve_name(reference.name())?.is_none() {
            return Err(unresolved_reference(reference, FINALIZE_HINT.to_string()));
        }
        if reference.evaluate() {
            debug!(reference = %reference.repr(), "Evaluating reference");
            self.call_name(reference.name(), CallArgs::new())
        } else {
            Ok(Value::Callable(reference.callable(&Arc::downgrade(&self.inner))))
        }
    }
}

/// Lists what config and caller supplied, when some positional parameters
/// received nothing.
fn call_diagnostics(
    signature: &Signature,
    positional_count: usize,
    bound: &BTreeSet<String>,
    config_bound: &[String],
    caller_supplied: &BTreeSet<String>,
) -> String {
    let mut unbound: Vec<&str> = signature
        .positional_names()
        .skip(positional_count)
        .filter(|name| !bound.contains(*name))
        .collect();
    if unbound.is_empty() {
        return String::new();
    }
    unbound.sort_unstable();
    format!(
        "\n  No values supplied by config or caller for arguments: {}\
         \n  Config had values bound for: {}\
         \n  Caller supplied values for: {}",
        name_list(unbound),
        name_list(config_bound.iter().map(String::as_str)),
        name_list(caller_supplied.iter().map(String::as_str)),
    )
}

fn name_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = names.into_iter().map(|name| format!("'{}'", name)).collect();
    format!("[{}]", quoted.join(", "))
}
