//! Scope paths and per-thread scope stacks
//!
//! A scope path is a sequence of names (`outer/inner`). Each thread keeps its
//! own stack of active paths inside the owning [`crate::Config`]; entering a
//! scope pushes, dropping the returned guard pops.

use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use tracing::debug;

use crate::config::Config;
use crate::error::GimletError;
use crate::selector_map::is_valid_selector;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// The empty path (no scope).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `a/b/c`; the empty string is the root path.
    pub fn parse(path: &str) -> Result<Self, GimletError> {
        if path.is_empty() {
            return Ok(Self::root());
        }
        Self::from_components(path.split('/').map(str::to_string).collect())
    }

    pub fn from_components(components: Vec<String>) -> Result<Self, GimletError> {
        match components.iter().find(|c| !is_valid_selector(c)) {
            Some(bad) => Err(GimletError::InvalidScope { scope: bad.clone() }),
            None => Ok(Self(components)),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This path extended by `other`.
    pub fn join(&self, other: &ScopePath) -> ScopePath {
        let mut components = self.0.clone();
        components.extend(other.0.iter().cloned());
        ScopePath(components)
    }

    /// Every prefix as a scope string, shortest first, starting with `""`.
    pub fn prefixes(&self) -> impl Iterator<Item = String> + '_ {
        (0..=self.0.len()).map(move |i| self.0[..i].join("/"))
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Active scope stacks, one per thread.
#[derive(Default)]
pub(crate) struct ScopeStacks {
    stacks: DashMap<ThreadId, Vec<ScopePath>>,
}

impl ScopeStacks {
    pub fn current(&self) -> ScopePath {
        self.stacks
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
            .unwrap_or_default()
    }

    pub fn push(&self, path: ScopePath) {
        debug!(scope = %path, "Entering scope");
        self.stacks.entry(thread::current().id()).or_default().push(path);
    }

    pub fn pop(&self) {
        let id = thread::current().id();
        let now_empty = match self.stacks.get_mut(&id) {
            Some(mut stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.stacks.remove_if(&id, |_, stack| stack.is_empty());
        }
    }
}

/// Keeps a scope active until dropped.
///
/// Tied to the thread that entered the scope, so it is neither `Send` nor
/// `Sync`.
#[must_use = "the scope is exited when the guard is dropped"]
pub struct ScopeGuard<'a> {
    config: &'a Config,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn enter(config: &'a Config, path: ScopePath) -> Self {
        config.inner.scopes.push(path);
        Self {
            config,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.config.inner.scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = ScopePath::parse("a/b.c/d").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "a/b.c/d");
        assert!(ScopePath::parse("").unwrap().is_root());
    }

    #[test]
    fn test_invalid_components() {
        assert!(ScopePath::parse("a//b").is_err());
        assert!(ScopePath::parse("1a").is_err());
        assert!(ScopePath::parse("a b").is_err());
    }

    #[test]
    fn test_prefixes_start_at_root() {
        let path = ScopePath::parse("a/b").unwrap();
        let prefixes: Vec<String> = path.prefixes().collect();
        assert_eq!(prefixes, vec!["", "a", "a/b"]);
    }

    #[test]
    fn test_stacks_are_per_thread() {
        let stacks = std::sync::Arc::new(ScopeStacks::default());
        stacks.push(ScopePath::parse("main").unwrap());

        let other = stacks.clone();
        std::thread::spawn(move || {
            assert!(other.current().is_root());
            other.push(ScopePath::parse("worker").unwrap());
            assert_eq!(other.current().to_string(), "worker");
            other.pop();
        })
        .join()
        .unwrap();

        assert_eq!(stacks.current().to_string(), "main");
        stacks.pop();
        assert!(stacks.current().is_root());
        assert!(stacks.stacks.is_empty());
    }
}
