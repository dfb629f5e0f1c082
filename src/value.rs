//! Config values
//!
//! `Value` covers the literal grammar (none, booleans, numbers, strings,
//! lists, tuples, dicts) plus the non-literal things that flow through
//! bindings: references, materialized callables, opaque host objects and
//! the `REQUIRED` sentinel.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::ScopedCallable;
use crate::reference::Reference;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Key/value pairs in source order. Equality ignores order.
    Dict(Vec<(Value, Value)>),
    /// A `@selector`, `@selector()` or `%macro` literal, not yet materialized.
    Reference(Reference),
    /// What an unevaluated reference materializes to.
    Callable(Arc<ScopedCallable>),
    /// A host object. Compared by identity, never literally representable.
    Opaque(Arc<dyn Any + Send + Sync>),
    /// Marks a parameter that must be supplied by config.
    Required,
}

impl Value {
    /// Build a dict, keeping the last value for duplicate keys.
    pub fn dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (key, value) in pairs {
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Value::Dict(out)
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Value::Required)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Arc<ScopedCallable>> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Dict lookup by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Dict(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Visit every nested value, children before their container.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Value)) {
        match self {
            Value::List(items) | Value::Tuple(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Value::Dict(pairs) => {
                for (_, value) in pairs {
                    value.walk(visit);
                }
            }
            _ => {}
        }
        visit(self);
    }

    /// Rebuild the value, replacing every reference with `f(reference)`.
    pub fn map_references<E>(
        &self,
        f: &mut dyn FnMut(&Reference) -> Result<Value, E>,
    ) -> Result<Value, E> {
        Ok(match self {
            Value::Reference(r) => f(r)?,
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| item.map_references(f))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Tuple(items) => Value::Tuple(
                items
                    .iter()
                    .map(|item| item.map_references(f))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Dict(pairs) => Value::Dict(
                pairs
                    .iter()
                    .map(|(k, v)| Ok((k.map_references(f)?, v.map_references(f)?)))
                    .collect::<Result<_, E>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Literal text for the value, in the config grammar.
    ///
    /// Non-literal values render as `<...>` placeholders that never parse back;
    /// use [`crate::render::format_value`] to get only round-trippable text.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    pub(crate) fn write_repr(&self, out: &mut String) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&repr_float(*f)),
            Value::Str(s) => out.push_str(&repr_str(s)),
            Value::List(items) => {
                out.push('[');
                write_items(items, out);
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                write_items(items, out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(pairs) => {
                out.push('{');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out);
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
            Value::Reference(r) => out.push_str(&r.repr()),
            Value::Callable(c) => out.push_str(&format!("<callable {}>", c.selector())),
            Value::Opaque(_) => out.push_str("<opaque>"),
            Value::Required => out.push_str("<REQUIRED>"),
        }
    }
}

fn write_items(items: &[Value], out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out);
    }
}

pub(crate) fn repr_float(f: f64) -> String {
    // Debug formatting is the shortest text that parses back to the same f64.
    format!("{:?}", f)
}

/// Quote a string the way the literal grammar reads it back.
pub(crate) fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{:02x}", code));
                } else if code <= 0xffff {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    out.push_str(&format!("\\U{:08x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) | (Value::Required, Value::Required) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other_value)| {
                            key == other_key && value == other_value
                        })
                    })
            }
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_scalars() {
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(Value::Bool(true).repr(), "True");
        assert_eq!(Value::Int(-42).repr(), "-42");
        assert_eq!(Value::Float(2.718).repr(), "2.718");
        assert_eq!(Value::Float(3.0).repr(), "3.0");
    }

    #[test]
    fn repr_strings_pick_quotes() {
        assert_eq!(repr_str("plain"), "'plain'");
        assert_eq!(repr_str("it's"), "\"it's\"");
        assert_eq!(repr_str("both ' and \""), "'both \\' and \"'");
        assert_eq!(repr_str("line\nbreak\\"), "'line\\nbreak\\\\'");
        assert_eq!(repr_str("\u{1}"), "'\\x01'");
    }

    #[test]
    fn repr_containers() {
        let v = Value::List(vec![
            Value::Int(1),
            Value::Tuple(vec![Value::from("a")]),
            Value::dict([(Value::from("k"), Value::Bool(false))]),
        ]);
        assert_eq!(v.repr(), "[1, ('a',), {'k': False}]");
        assert_eq!(Value::Tuple(vec![]).repr(), "()");
    }

    #[test]
    fn dict_equality_ignores_order() {
        let a = Value::dict([(Value::Int(1), Value::Int(2)), (Value::Int(3), Value::Int(4))]);
        let b = Value::dict([(Value::Int(3), Value::Int(4)), (Value::Int(1), Value::Int(2))]);
        let c = Value::dict([(Value::Int(3), Value::Int(4))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn dict_keeps_last_duplicate() {
        let d = Value::dict([(Value::Int(1), Value::Int(2)), (Value::Int(1), Value::Int(5))]);
        assert_eq!(d.get(&Value::Int(1)), Some(&Value::Int(5)));
        assert_eq!(d.repr(), "{1: 5}");
    }

    #[test]
    fn list_and_tuple_differ() {
        assert_ne!(Value::List(vec![]), Value::Tuple(vec![]));
    }

    #[test]
    fn opaque_compares_by_identity() {
        let a = Value::opaque(5u8);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::opaque(5u8));
        assert_eq!(a.downcast_ref::<u8>(), Some(&5));
    }

    #[test]
    fn walk_visits_nested_values() {
        let v = Value::List(vec![Value::Int(1), Value::List(vec![Value::Int(2)])]);
        let mut ints = Vec::new();
        v.walk(&mut |x| {
            if let Some(i) = x.as_int() {
                ints.push(i);
            }
        });
        assert_eq!(ints, vec![1, 2]);
    }
}
