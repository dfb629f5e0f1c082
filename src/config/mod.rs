//! Config context
//!
//! A [`Config`] owns everything one configuration session needs:
//! - the registry of configurables, addressed by (partial) selectors
//! - the binding store and the operative snapshot
//! - constants, singletons and recorded imports
//! - one scope stack per thread
//!
//! `Config` is a handle; clones share the same state. Locks are taken in the
//! order registry, store, operative, and none is held while a target runs.

mod builtins;
mod call;
mod parse;

pub use call::ScopedCallable;
pub use parse::{ImportHook, IncludeTree, SkipUnknown};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::binding::{BindingKey, BindingStore, IntoBindingKey, Params};
use crate::error::GimletError;
use crate::parser::{ImportStatement, SyntaxDelegate};
use crate::reader::{FileReader, FsReader};
use crate::reference::{Reference, CONSTANT_SELECTOR, MACRO_SELECTOR};
use crate::render::{format_value, render, RenderInput, RenderOptions, Section};
use crate::scope::{ScopeGuard, ScopePath, ScopeStacks};
use crate::selector_map::{is_valid_selector, SelectorMap};
use crate::settings::Settings;
use crate::signature::{Signature, Target};
use crate::value::Value;

/// Runs during [`Config::finalize`] and returns extra bindings to apply.
pub type FinalizeHook =
    Arc<dyn Fn(&Config) -> anyhow::Result<Vec<(BindingKey, Value)>> + Send + Sync>;

/// A registered configurable.
pub struct Configurable {
    selector: String,
    name: String,
    module: Option<String>,
    allowlist: Option<BTreeSet<String>>,
    denylist: Option<BTreeSet<String>>,
    target: Arc<dyn Target>,
    defaults: OnceCell<Params>,
}

impl Configurable {
    /// Complete selector, `module.name`.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn signature(&self) -> &Signature {
        self.target.signature()
    }

    pub fn allowlist(&self) -> Option<&BTreeSet<String>> {
        self.allowlist.as_ref()
    }

    pub fn denylist(&self) -> Option<&BTreeSet<String>> {
        self.denylist.as_ref()
    }

    pub(crate) fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// Check that `param` may be bound for this configurable.
    pub fn validate_param(&self, param: &str) -> Result<(), GimletError> {
        if !self.signature().has_param(param) {
            return Err(GimletError::NoSuchParameter {
                selector: self.selector.clone(),
                param: param.to_string(),
            });
        }
        if let Some(allowlist) = &self.allowlist {
            if !allowlist.contains(param) {
                return Err(GimletError::NotAllowlisted {
                    selector: self.selector.clone(),
                    param: param.to_string(),
                });
            }
        }
        if let Some(denylist) = &self.denylist {
            if denylist.contains(param) {
                return Err(GimletError::Denylisted {
                    selector: self.selector.clone(),
                    param: param.to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_configurable(&self, param: &str) -> bool {
        let allowed = self.allowlist.as_ref().map_or(true, |list| list.contains(param));
        let denied = self.denylist.as_ref().map_or(false, |list| list.contains(param));
        allowed && !denied
    }

    /// Literal defaults config could have overridden, recorded as operative
    /// when config leaves them alone.
    pub(crate) fn operative_defaults(&self) -> &Params {
        self.defaults.get_or_init(|| {
            self.signature()
                .params
                .iter()
                .filter(|param| self.is_configurable(&param.name))
                .filter_map(|param| {
                    let default = param.default.as_ref()?;
                    format_value(default, &SyntaxDelegate)?;
                    Some((param.name.clone(), default.clone()))
                })
                .collect()
        })
    }

    fn moved_to(&self, container: &str) -> Self {
        Self {
            selector: format!("{}.{}", container, self.name),
            name: self.name.clone(),
            module: Some(container.to_string()),
            allowlist: self.allowlist.clone(),
            denylist: self.denylist.clone(),
            target: self.target.clone(),
            defaults: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Configurable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configurable")
            .field("selector", &self.selector)
            .field("allowlist", &self.allowlist)
            .field("denylist", &self.denylist)
            .finish()
    }
}

/// Everything needed to register a configurable.
pub struct Registration {
    name: String,
    module: Option<String>,
    allowlist: Option<Vec<String>>,
    denylist: Option<Vec<String>>,
    member_of: Option<String>,
    target: Arc<dyn Target>,
}

impl Registration {
    pub fn new(name: impl Into<String>, target: impl Target + 'static) -> Self {
        Self::from_arc(name, Arc::new(target))
    }

    pub fn from_arc(name: impl Into<String>, target: Arc<dyn Target>) -> Self {
        Self {
            name: name.into(),
            module: None,
            allowlist: None,
            denylist: None,
            member_of: None,
            target,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Only these parameters may be bound.
    pub fn allowlist<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// These parameters may not be bound.
    pub fn denylist<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Nest under `container`'s selector. If the container isn't registered
    /// yet, the member moves there once it is.
    pub fn member_of(mut self, container: impl Into<String>) -> Self {
        self.member_of = Some(container.into());
        self
    }
}

#[derive(Default)]
struct Registry {
    configurables: SelectorMap<Arc<Configurable>>,
    /// `(container selector, member selector)` for members whose container
    /// isn't registered yet.
    pending_members: Vec<(String, String)>,
}

impl Registry {
    fn lookup(&self, selector: &str) -> Result<Arc<Configurable>, GimletError> {
        self.configurables
            .get_match(selector)?
            .cloned()
            .ok_or_else(|| GimletError::UnknownConfigurable {
                selector: selector.to_string(),
            })
    }

    /// Move pending members of `container`; returns `(old, new)` selectors.
    fn adopt_members(&mut self, container: &str) -> Result<Vec<(String, String)>, GimletError> {
        let (adopted, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_members)
            .into_iter()
            .partition(|(wanted, _)| {
                container == wanted || container.ends_with(&format!(".{}", wanted))
            });
        self.pending_members = waiting;

        let mut moved = Vec::new();
        for (_, old) in adopted {
            if let Some(member) = self.configurables.remove(&old) {
                let member = Arc::new(member.moved_to(container));
                let new = member.selector.clone();
                self.configurables.insert(&new, member)?;
                moved.push((old, new));
            }
        }
        Ok(moved)
    }
}

pub(crate) struct Inner {
    registry: RwLock<Registry>,
    /// Bumped whenever an existing selector changes meaning.
    generation: AtomicU64,
    store: RwLock<BindingStore>,
    operative: Mutex<BindingStore>,
    constants: RwLock<SelectorMap<Value>>,
    singletons: Mutex<HashMap<String, Value>>,
    imports: Mutex<Vec<ImportStatement>>,
    pub(crate) scopes: ScopeStacks,
    locked: AtomicBool,
    interactive: AtomicBool,
    settings: RwLock<Settings>,
    readers: RwLock<Vec<Arc<dyn FileReader>>>,
    finalize_hooks: RwLock<Vec<FinalizeHook>>,
    import_hook: RwLock<Option<Arc<dyn ImportHook>>>,
}

/// A configuration context.
#[derive(Clone)]
pub struct Config {
    pub(crate) inner: Arc<Inner>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("configurables", &self.inner.registry.read().configurables.len())
            .field("bindings", &self.inner.store.read().len())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let config = Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                generation: AtomicU64::new(0),
                store: RwLock::new(BindingStore::new()),
                operative: Mutex::new(BindingStore::new()),
                constants: RwLock::new(SelectorMap::new()),
                singletons: Mutex::new(HashMap::new()),
                imports: Mutex::new(Vec::new()),
                scopes: ScopeStacks::default(),
                locked: AtomicBool::new(false),
                interactive: AtomicBool::new(false),
                settings: RwLock::new(settings),
                readers: RwLock::new(vec![Arc::new(FsReader)]),
                finalize_hooks: RwLock::new(Vec::new()),
                import_hook: RwLock::new(None),
            }),
        };
        builtins::install(&config);
        config
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    // ─────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────

    pub fn register(&self, registration: Registration) -> Result<Arc<Configurable>, GimletError> {
        if self.is_locked() {
            return Err(GimletError::Locked {
                action: "add a new configurable".into(),
            });
        }
        let Registration {
            name,
            module,
            allowlist,
            denylist,
            member_of,
            target,
        } = registration;

        if !is_valid_selector(&name) {
            return Err(GimletError::InvalidName { name });
        }
        if let Some(module) = &module {
            if !is_valid_selector(module) {
                return Err(GimletError::InvalidModule { module: module.clone() });
            }
        }

        let mut registry = self.inner.registry.write();
        let container = match &member_of {
            Some(container) => registry.configurables.resolve(container)?,
            None => None,
        };
        let module = container.clone().or(module);
        let selector = match &module {
            Some(module) => format!("{}.{}", module, name),
            None => name.clone(),
        };

        if allowlist.is_some() && denylist.is_some() {
            return Err(GimletError::AllowDenyConflict { selector });
        }
        for (list, params) in [("allowlist", &allowlist), ("denylist", &denylist)] {
            let unknown = params
                .iter()
                .flatten()
                .find(|param| !target.signature().has_param(param));
            if let Some(param) = unknown {
                return Err(GimletError::UnknownListedParameter {
                    param: param.clone(),
                    list,
                    selector,
                });
            }
        }

        if registry.configurables.contains(&selector) && !self.is_interactive() {
            return Err(GimletError::DuplicateConfigurable { selector });
        }

        let configurable = Arc::new(Configurable {
            selector: selector.clone(),
            name,
            module,
            allowlist: allowlist.map(|list| list.into_iter().collect()),
            denylist: denylist.map(|list| list.into_iter().collect()),
            target,
            defaults: OnceCell::new(),
        });
        let replaced = registry.configurables.insert(&selector, configurable.clone())?.is_some();
        if let (Some(wanted), None) = (member_of, &container) {
            registry.pending_members.push((wanted, selector.clone()));
        }
        let moved = registry.adopt_members(&selector)?;

        if replaced || !moved.is_empty() {
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
        }
        if !moved.is_empty() {
            let mut store = self.inner.store.write();
            let mut operative = self.inner.operative.lock();
            for (old, new) in &moved {
                debug!(from = %old, to = %new, "Moved member under its container");
                store.rename_selector(old, new);
                operative.rename_selector(old, new);
            }
        }
        debug!(selector = %selector, replaced, "Registered configurable");
        Ok(configurable)
    }

    /// The configurable `selector` resolves to.
    pub fn get_configurable(&self, selector: &str) -> Result<Arc<Configurable>, GimletError> {
        self.inner.registry.read().lookup(selector)
    }

    /// Shortest suffix of `selector` that still resolves to it.
    pub fn minimal_selector(&self, selector: &str) -> Option<String> {
        self.inner.registry.read().configurables.minimal(selector)
    }

    /// Complete selectors of every registered configurable, sorted.
    pub fn registered_selectors(&self) -> Vec<String> {
        let mut selectors: Vec<String> = self
            .inner
            .registry
            .read()
            .configurables
            .selectors()
            .cloned()
            .collect();
        selectors.sort();
        selectors
    }

    /// Let re-registration replace existing configurables.
    pub fn enter_interactive_mode(&self) {
        self.inner.interactive.store(true, Ordering::Release);
    }

    pub fn exit_interactive_mode(&self) {
        self.inner.interactive.store(false, Ordering::Release);
    }

    pub fn is_interactive(&self) -> bool {
        self.inner.interactive.load(Ordering::Acquire)
    }

    /// Interactive mode until the guard drops.
    pub fn interactive_mode(&self) -> InteractiveGuard<'_> {
        let previous = self.inner.interactive.swap(true, Ordering::AcqRel);
        InteractiveGuard { config: self, previous }
    }

    // ─────────────────────────────────────────────────────────────
    // Bindings
    // ─────────────────────────────────────────────────────────────

    /// Bind `value` to a parameter, e.g. `"train/model.Net.layers"`.
    pub fn bind_parameter(
        &self,
        key: impl IntoBindingKey,
        value: impl Into<Value>,
    ) -> Result<(), GimletError> {
        if self.is_locked() {
            return Err(GimletError::Locked {
                action: "modify bindings".into(),
            });
        }
        let key = key.into_binding_key()?;
        let registry = self.inner.registry.read();
        let configurable = registry.lookup(&key.selector)?;
        configurable.validate_param(&key.param)?;

        let value = value.into();
        debug!(key = %key, value = %value, "Binding parameter");
        self.inner
            .store
            .write()
            .bind(&key.scope.to_string(), configurable.selector(), &key.param, value);
        Ok(())
    }

    /// The value bound for `key`, unmaterialized.
    ///
    /// `%name` looks up the constant `name`, or failing that the macro `name`.
    pub fn query_parameter(&self, key: &str) -> Result<Value, GimletError> {
        let key = match key.strip_prefix('%') {
            Some(name) => {
                if let Some(value) = self.inner.constants.read().get_match(name)? {
                    return Ok(value.clone());
                }
                BindingKey::new(name, MACRO_SELECTOR, "value")?
            }
            None => BindingKey::parse(key)?,
        };

        let registry = self.inner.registry.read();
        let configurable = registry.lookup(&key.selector)?;
        configurable.validate_param(&key.param)?;
        let scope = key.scope.to_string();
        let store = self.inner.store.read();
        let params = store
            .get(&scope, configurable.selector())
            .ok_or_else(|| GimletError::NoBindings {
                selector: scoped_name(&scope, configurable.selector()),
            })?;
        params.get(&key.param).cloned().ok_or_else(|| GimletError::NotBound {
            selector: scoped_name(&scope, configurable.selector()),
            param: key.param.clone(),
        })
    }

    /// Bindings for `scope/selector`.
    ///
    /// With `inherit_scopes` the bindings of every enclosing scope are merged
    /// in, deeper scopes winning; without it only the exact scope counts.
    pub fn get_bindings(
        &self,
        scoped_selector: &str,
        inherit_scopes: bool,
    ) -> Result<Params, GimletError> {
        let (scope, selector) = scoped_selector.rsplit_once('/').unwrap_or(("", scoped_selector));
        let scope = ScopePath::parse(scope)?;
        let registry = self.inner.registry.read();
        let configurable = registry.lookup(selector)?;
        let params = self
            .inner
            .store
            .read()
            .merged(configurable.selector(), &scope, inherit_scopes);
        Ok(params)
    }

    /// Overrides visible to `selector` when called under `scope`.
    pub fn get_overrides(&self, selector: &str, scope: &ScopePath) -> Result<Params, GimletError> {
        let registry = self.inner.registry.read();
        let configurable = registry.lookup(selector)?;
        let params = self.inner.store.read().merged(configurable.selector(), scope, true);
        Ok(params)
    }

    /// Drop bindings, singletons, imports and the operative snapshot, and
    /// unlock. Constants survive unless `clear_constants`.
    pub fn clear_config(&self, clear_constants: bool) {
        self.inner.locked.store(false, Ordering::Release);
        self.inner.store.write().clear();
        self.inner.operative.lock().clear();
        self.inner.singletons.lock().clear();
        self.inner.imports.lock().clear();
        if clear_constants {
            self.inner.constants.write().clear();
        }
        info!(clear_constants, "Cleared config");
    }

    // ─────────────────────────────────────────────────────────────
    // Scopes and locking
    // ─────────────────────────────────────────────────────────────

    /// The innermost active scope on this thread.
    pub fn current_scope(&self) -> ScopePath {
        self.inner.scopes.current()
    }

    /// Extend the current scope by `name` (`a` or `a/b`). The empty name
    /// clears all active scopes until the guard drops.
    pub fn scope(&self, name: &str) -> Result<ScopeGuard<'_>, GimletError> {
        let path = if name.is_empty() {
            ScopePath::root()
        } else {
            self.current_scope().join(&ScopePath::parse(name)?)
        };
        Ok(ScopeGuard::enter(self, path))
    }

    /// Make `path` the active scope until the guard drops.
    pub fn scope_path(&self, path: ScopePath) -> ScopeGuard<'_> {
        ScopeGuard::enter(self, path)
    }

    pub fn lock_config(&self) {
        self.inner.locked.store(true, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Unlock until the guard drops, then restore the previous state.
    pub fn unlock_config(&self) -> UnlockGuard<'_> {
        let previous = self.inner.locked.swap(false, Ordering::AcqRel);
        UnlockGuard { config: self, previous }
    }

    // ─────────────────────────────────────────────────────────────
    // Constants and singletons
    // ─────────────────────────────────────────────────────────────

    /// Register a constant, referenced in config text as `%name`.
    pub fn constant(&self, name: &str, value: impl Into<Value>) -> Result<(), GimletError> {
        if !is_valid_selector(name) {
            return Err(GimletError::InvalidSelector {
                selector: name.to_string(),
            });
        }
        let mut constants = self.inner.constants.write();
        let matches = constants.matching(name);
        if !matches.is_empty() {
            return Err(GimletError::DuplicateConstant {
                name: name.to_string(),
                matches,
            });
        }
        constants.insert(name, value.into())?;
        debug!(constant = %name, "Registered constant");
        Ok(())
    }

    /// The constant `name` resolves to.
    pub fn constant_value(&self, name: &str) -> Result<Value, GimletError> {
        self.inner
            .constants
            .read()
            .get_match(name)?
            .cloned()
            .ok_or_else(|| GimletError::UnknownConstant { name: name.to_string() })
    }

    /// The singleton stored under `key`, built by calling `constructor` on
    /// first access.
    pub fn singleton_value(
        &self,
        key: &str,
        constructor: Option<&Value>,
    ) -> Result<Value, GimletError> {
        if let Some(value) = self.inner.singletons.lock().get(key) {
            return Ok(value.clone());
        }
        let constructor = match constructor {
            None | Some(Value::None) => {
                return Err(GimletError::SingletonMissing {
                    key: key.to_string(),
                })
            }
            Some(Value::Callable(callable)) => callable.clone(),
            Some(_) => {
                return Err(GimletError::SingletonNotCallable {
                    key: key.to_string(),
                })
            }
        };
        let value = constructor.call(Default::default())?;
        debug!(key = %key, "Constructed singleton");
        // a concurrent first access may have won; keep its value
        Ok(self
            .inner
            .singletons
            .lock()
            .entry(key.to_string())
            .or_insert(value)
            .clone())
    }

    // ─────────────────────────────────────────────────────────────
    // Finalization
    // ─────────────────────────────────────────────────────────────

    pub fn register_finalize_hook<F>(&self, hook: F)
    where
        F: Fn(&Config) -> anyhow::Result<Vec<(BindingKey, Value)>> + Send + Sync + 'static,
    {
        self.inner.finalize_hooks.write().push(Arc::new(hook));
    }

    /// Run finalize hooks, apply the bindings they return, then lock.
    pub fn finalize(&self) -> Result<(), GimletError> {
        if self.is_locked() {
            return Err(GimletError::AlreadyFinalized);
        }
        let hooks: Vec<FinalizeHook> = self.inner.finalize_hooks.read().clone();
        let mut seen = HashSet::new();
        let mut updates = Vec::new();
        for hook in hooks {
            let bindings = hook(self).map_err(|e| match e.downcast::<GimletError>() {
                Ok(error) => error,
                Err(other) => GimletError::Hook(other),
            })?;
            for (key, value) in bindings {
                let selector = self.get_configurable(&key.selector)?.selector().to_string();
                if !seen.insert((key.scope.clone(), selector, key.param.clone())) {
                    return Err(GimletError::ConflictingHookBindings { key: key.to_string() });
                }
                updates.push((key, value));
            }
        }
        for (key, value) in updates {
            self.bind_parameter(key, value)?;
        }
        self.lock_config();
        info!("Config finalized");
        Ok(())
    }

    /// Fail on the first reference that doesn't resolve to a configurable.
    pub fn validate_references(&self) -> Result<(), GimletError> {
        for (scope, selector, param, value) in self.binding_snapshot() {
            let mut references = Vec::new();
            value.walk(&mut |v| {
                if let Value::Reference(r) = v {
                    references.push(r.clone());
                }
            });
            for reference in references {
                if self.resolve_name(reference.name())?.is_none() {
                    let minimal = self.minimal_selector(&selector).unwrap_or(selector.clone());
                    let key = format!("{}.{}", scoped_name(&scope, &minimal), param);
                    return Err(call::unresolved_reference(
                        &reference,
                        format!(" In binding for '{}'.", key),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Every reference in the store; with `to`, only those resolving to that
    /// configurable.
    pub fn iterate_references(&self, to: Option<&str>) -> Result<Vec<Reference>, GimletError> {
        let target = match to {
            Some(selector) => Some(self.get_configurable(selector)?.selector().to_string()),
            None => None,
        };
        let mut references = Vec::new();
        for (_, _, _, value) in self.binding_snapshot() {
            value.walk(&mut |v| {
                if let Value::Reference(r) = v {
                    references.push(r.clone());
                }
            });
        }
        let Some(target) = target else {
            return Ok(references);
        };
        let mut matching = Vec::new();
        for reference in references {
            if let Some(configurable) = self.resolve_name(reference.name())? {
                if configurable.selector() == target {
                    matching.push(reference);
                }
            }
        }
        Ok(matching)
    }

    /// Bound values sorted by key, copied out of the store.
    fn binding_snapshot(&self) -> Vec<(String, String, String, Value)> {
        let store = self.inner.store.read();
        let mut bindings: Vec<_> = store
            .values()
            .map(|(scope, selector, param, value)| {
                (scope.to_string(), selector.to_string(), param.to_string(), value.clone())
            })
            .collect();
        drop(store);
        bindings.sort_by(|a, b| (&a.0, &a.1, &a.2).cmp(&(&b.0, &b.1, &b.2)));
        bindings
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────

    /// Every binding made so far, as config text.
    pub fn config_str(&self) -> String {
        let store = self.inner.store.read().clone();
        self.render_store(&store)
    }

    /// The values calls actually used, as config text.
    pub fn operative_config_str(&self) -> String {
        let operative = self.inner.operative.lock().clone();
        self.render_store(&operative)
    }

    fn render_store(&self, store: &BindingStore) -> String {
        let input = self.render_input(store);
        let options = RenderOptions::from(&*self.inner.settings.read());
        render(&input, &options, &parse::ConfigDelegate::new(self))
    }

    fn render_input(&self, store: &BindingStore) -> RenderInput {
        let registry = self.inner.registry.read();
        let mut input = RenderInput {
            imports: self.inner.imports.lock().clone(),
            ..Default::default()
        };
        for ((scope, selector), params) in store.iter() {
            match selector.as_str() {
                MACRO_SELECTOR => {
                    if let Some(value) = params.get("value") {
                        input.macros.push((scope.clone(), value.clone()));
                    }
                }
                CONSTANT_SELECTOR => {}
                _ => input.sections.push(Section {
                    scope: scope.clone(),
                    selector: selector.clone(),
                    name: registry
                        .configurables
                        .minimal(selector)
                        .unwrap_or_else(|| selector.clone()),
                    params: params.clone(),
                }),
            }
        }
        input
    }
}

fn scoped_name(scope: &str, selector: &str) -> String {
    if scope.is_empty() {
        selector.to_string()
    } else {
        format!("{}/{}", scope, selector)
    }
}

/// Restores the previous lock state when dropped.
#[must_use = "the config is locked again when the guard is dropped"]
pub struct UnlockGuard<'a> {
    config: &'a Config,
    previous: bool,
}

impl Drop for UnlockGuard<'_> {
    fn drop(&mut self) {
        self.config.inner.locked.store(self.previous, Ordering::Release);
    }
}

/// Restores the previous interactive mode when dropped.
#[must_use = "interactive mode ends when the guard is dropped"]
pub struct InteractiveGuard<'a> {
    config: &'a Config,
    previous: bool,
}

impl Drop for InteractiveGuard<'_> {
    fn drop(&mut self) {
        self.config.inner.interactive.store(self.previous, Ordering::Release);
    }
}
