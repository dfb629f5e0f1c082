//! Selector map - dotted names with suffix matching
//!
//! A selector is a sequence of identifiers separated by periods, e.g.
//! `outer.inner.name`. Lookups accept any trailing run of components:
//! `name` and `inner.name` both match `outer.inner.name`, `outer` does not.
//!
//! Internally selectors are stored in a trie keyed by *reversed* components,
//! so a partial lookup walks at most as many nodes as the partial selector has
//! components, independent of how many selectors are stored.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GimletError;

/// Matches a valid (complete or partial) selector: `a`, `a.b`, `_x.y1`.
pub static SELECTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z_]\w*\.)*[a-zA-Z_]\w*$").expect("valid regex"));

/// Matches a single identifier.
pub static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_]\w*$").expect("valid regex"));

pub fn is_valid_selector(s: &str) -> bool {
    SELECTOR_RE.is_match(s)
}

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

#[derive(Debug, Clone, Default)]
struct Node {
    children: BTreeMap<String, Node>,
    /// Complete selector ending exactly at this node.
    terminal: Option<String>,
}

impl Node {
    /// Children plus the terminal marker.
    fn degree(&self) -> usize {
        self.children.len() + usize::from(self.terminal.is_some())
    }

    fn collect_terminals(&self, out: &mut Vec<String>) {
        if let Some(selector) = &self.terminal {
            out.push(selector.clone());
        }
        for child in self.children.values() {
            child.collect_terminals(out);
        }
    }

    /// Remove the terminal at the end of `components` (already reversed) and
    /// prune nodes left without children or terminal.
    fn remove(&mut self, components: &[&str]) -> bool {
        let Some((first, rest)) = components.split_first() else {
            return self.terminal.take().is_some();
        };
        let Some(child) = self.children.get_mut(*first) else {
            return false;
        };
        let removed = child.remove(rest);
        if removed && child.degree() == 0 {
            self.children.remove(*first);
        }
        removed
    }
}

/// Dict-like storage keyed by complete selectors, with partial matching.
#[derive(Debug, Clone)]
pub struct SelectorMap<V> {
    tree: Node,
    values: HashMap<String, V>,
}

impl<V> Default for SelectorMap<V> {
    fn default() -> Self {
        Self {
            tree: Node::default(),
            values: HashMap::new(),
        }
    }
}

impl<V> SelectorMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `value` with `complete_selector`, returning any previous value.
    pub fn insert(&mut self, complete_selector: &str, value: V) -> Result<Option<V>, GimletError> {
        if !is_valid_selector(complete_selector) {
            return Err(GimletError::InvalidSelector {
                selector: complete_selector.to_string(),
            });
        }

        let mut node = &mut self.tree;
        for component in complete_selector.rsplit('.') {
            node = node.children.entry(component.to_string()).or_default();
        }
        node.terminal = Some(complete_selector.to_string());
        Ok(self.values.insert(complete_selector.to_string(), value))
    }

    /// Exact lookup, no partial matching.
    pub fn get(&self, complete_selector: &str) -> Option<&V> {
        self.values.get(complete_selector)
    }

    pub fn get_mut(&mut self, complete_selector: &str) -> Option<&mut V> {
        self.values.get_mut(complete_selector)
    }

    pub fn contains(&self, complete_selector: &str) -> bool {
        self.values.contains_key(complete_selector)
    }

    /// Remove `complete_selector`, pruning trie nodes that become empty.
    pub fn remove(&mut self, complete_selector: &str) -> Option<V> {
        let value = self.values.remove(complete_selector)?;
        let components: Vec<&str> = complete_selector.rsplit('.').collect();
        self.tree.remove(&components);
        Some(value)
    }

    /// All complete selectors matching `partial_selector`, sorted.
    ///
    /// If `partial_selector` is itself a stored complete selector, only that
    /// selector is returned, even when it is also a suffix of longer ones.
    pub fn matching(&self, partial_selector: &str) -> Vec<String> {
        if self.values.contains_key(partial_selector) {
            return vec![partial_selector.to_string()];
        }

        let mut node = &self.tree;
        for component in partial_selector.rsplit('.') {
            match node.children.get(component) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut selectors = Vec::new();
        node.collect_terminals(&mut selectors);
        selectors.sort();
        selectors
    }

    /// The unique complete selector matching `partial_selector`.
    ///
    /// Returns `Ok(None)` when nothing matches; more than one match is an
    /// ambiguity error listing every candidate.
    pub fn resolve(&self, partial_selector: &str) -> Result<Option<String>, GimletError> {
        let mut matches = self.matching(partial_selector);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(GimletError::AmbiguousSelector {
                selector: partial_selector.to_string(),
                matches,
            }),
        }
    }

    /// Value of the unique selector matching `partial_selector`.
    pub fn get_match(&self, partial_selector: &str) -> Result<Option<&V>, GimletError> {
        Ok(self
            .resolve(partial_selector)?
            .and_then(|selector| self.values.get(&selector)))
    }

    pub fn get_all_matches(&self, partial_selector: &str) -> Vec<&V> {
        self.matching(partial_selector)
            .iter()
            .filter_map(|selector| self.values.get(selector))
            .collect()
    }

    /// Shortest trailing suffix of `complete_selector` that still resolves to it.
    ///
    /// Returns `None` if `complete_selector` isn't stored. Falls back to the
    /// complete selector when it is itself a suffix of another stored selector.
    pub fn minimal(&self, complete_selector: &str) -> Option<String> {
        if !self.values.contains_key(complete_selector) {
            return None;
        }

        let components: Vec<&str> = complete_selector.split('.').collect();
        let mut node = &self.tree;
        // Number of trailing components from which the path stays unbranched.
        let mut start: Option<usize> = None;
        for (depth, component) in components.iter().rev().enumerate() {
            if node.degree() == 1 {
                start.get_or_insert(depth);
            } else {
                start = None;
            }
            node = node.children.get(*component)?;
        }

        if node.degree() > 1 {
            return Some(complete_selector.to_string());
        }
        match start {
            None => Some(complete_selector.to_string()),
            // unbranched from the root: the only selector stored
            Some(0) => components.last().map(|last| last.to_string()),
            Some(n) => Some(components[components.len() - n..].join(".")),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree = Node::default();
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.values.iter()
    }

    pub fn selectors(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_operations() {
        let mut sm = SelectorMap::new();
        sm.insert("signifier", "signified").unwrap();
        sm.insert("module.chain.name", "value").unwrap();

        assert!(sm.contains("signifier"));
        assert_eq!(sm.get("signifier"), Some(&"signified"));
        assert_eq!(sm.get("module.chain.name"), Some(&"value"));
        assert_eq!(sm.get("nonexistent"), None);
    }

    #[test]
    fn invalid_selectors_rejected() {
        for bad in [".a", "a.", "0.a", "a.0", "$", "a.b!", "a..b", ""] {
            assert!(!is_valid_selector(bad), "{bad} should be invalid");
        }
        let mut sm = SelectorMap::new();
        assert!(matches!(
            sm.insert("0oops", 0),
            Err(GimletError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn exact_match_beats_suffix() {
        let mut sm = SelectorMap::new();
        sm.insert("more.specific.selector", 1).unwrap();
        sm.insert("specific.selector", 2).unwrap();

        assert_eq!(sm.get_match("specific.selector").unwrap(), Some(&2));
        assert_eq!(sm.get_match("more.specific.selector").unwrap(), Some(&1));
        assert_eq!(sm.get_all_matches("selector").len(), 2);
        assert_eq!(sm.matching("specific.selector"), vec!["specific.selector"]);

        // Suffix of another selector: no shorter form is unambiguous.
        assert_eq!(sm.minimal("specific.selector").unwrap(), "specific.selector");
        assert_eq!(
            sm.minimal("more.specific.selector").unwrap(),
            "more.specific.selector"
        );
    }

    #[test]
    fn partial_matching() {
        let mut sm = SelectorMap::new();
        sm.insert("a.a.a.name", "one").unwrap();
        sm.insert("a.a.b.name", "two").unwrap();
        sm.insert("a.a.a.moose", "three").unwrap();

        assert_eq!(sm.get_match("moose").unwrap(), Some(&"three"));
        assert_eq!(sm.get_match("a.name").unwrap(), Some(&"one"));
        assert_eq!(sm.get_match("b.name").unwrap(), Some(&"two"));
        assert_eq!(sm.get_match("a.a.b.name").unwrap(), Some(&"two"));
        assert_eq!(sm.get_match("nonexistent").unwrap(), None);
    }

    #[test]
    fn ambiguity_lists_all_matches() {
        let mut sm = SelectorMap::new();
        sm.insert("a.a.a.name", 1).unwrap();
        sm.insert("b.a.a.name", 2).unwrap();

        for partial in ["name", "a.name", "a.a.name"] {
            match sm.resolve(partial) {
                Err(GimletError::AmbiguousSelector { matches, .. }) => {
                    assert_eq!(matches, vec!["a.a.a.name", "b.a.a.name"]);
                }
                other => panic!("expected ambiguity, got {other:?}"),
            }
        }
        assert!(sm.resolve("a.a.a.name").is_ok());
        assert!(sm.resolve("b.a.a.name").is_ok());
    }

    #[test]
    fn minimal_selector() {
        let mut sm = SelectorMap::new();
        sm.insert("a.a.a.name", 1).unwrap();
        sm.insert("a.b.a.name", 2).unwrap();
        sm.insert("a.a.a.moose", 3).unwrap();

        assert_eq!(sm.minimal("a.a.a.moose").unwrap(), "moose");
        assert_eq!(sm.minimal("a.b.a.name").unwrap(), "b.a.name");
        assert_eq!(sm.minimal("missing"), None);
    }

    #[test]
    fn remove_prunes_and_shortens_minimal() {
        let mut sm = SelectorMap::new();
        sm.insert("a.a.a.name", 1).unwrap();
        sm.insert("a.b.a.name", 2).unwrap();
        sm.insert("a.a.a.moose", 3).unwrap();

        assert_eq!(sm.remove("a.a.a.name"), Some(1));
        assert_eq!(sm.len(), 2);
        assert!(!sm.contains("a.a.a.name"));
        assert_eq!(sm.get("a.a.a.moose"), Some(&3));
        assert_eq!(sm.minimal("a.b.a.name").unwrap(), "name");

        assert_eq!(sm.remove("a.a.a.moose"), Some(3));
        assert_eq!(sm.remove("a.a.a.moose"), None);
        assert_eq!(sm.remove("a.b.a.name"), Some(2));
        assert!(sm.is_empty());
        assert!(sm.matching("name").is_empty());
    }

    #[test]
    fn ambiguous_pair_minimal_depends_on_removal() {
        let mut sm = SelectorMap::new();
        sm.insert("foo.Bar", ()).unwrap();
        sm.insert("baz.Bar", ()).unwrap();
        sm.insert("other.Thing", ()).unwrap();

        assert!(sm.resolve("Bar").is_err());
        assert_eq!(sm.resolve("foo.Bar").unwrap().as_deref(), Some("foo.Bar"));
        assert_eq!(sm.minimal("foo.Bar").unwrap(), "foo.Bar");

        sm.remove("baz.Bar");
        assert_eq!(sm.minimal("foo.Bar").unwrap(), "Bar");
    }

    #[test]
    fn minimal_always_resolves_back() {
        let mut sm = SelectorMap::new();
        let selectors = [
            "x.y.z", "w.y.z", "z", "q.r", "a.b.c.d", "b.c.d", "k.c.d", "solo.leaf",
        ];
        for s in selectors {
            sm.insert(s, ()).unwrap();
        }
        for s in selectors {
            let minimal = sm.minimal(s).unwrap();
            assert_eq!(sm.resolve(&minimal).unwrap().as_deref(), Some(s), "{minimal}");
        }
    }
}
