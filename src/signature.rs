//! Configurable targets and their signatures
//!
//! A [`Target`] is the thing a configurable wraps: something with a declared
//! [`Signature`] that can be invoked with bound [`Arguments`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::config::Config;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// May be passed by position or by keyword.
    Positional,
    KeywordOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    /// Accepts extra positional arguments.
    pub var_positional: bool,
    /// Accepts extra keyword arguments.
    pub var_keyword: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a positional parameter without default.
    pub fn arg(self, name: &str) -> Self {
        self.push(name, ParamKind::Positional, None)
    }

    pub fn arg_default(self, name: &str, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::Positional, Some(default.into()))
    }

    pub fn kwarg(self, name: &str) -> Self {
        self.push(name, ParamKind::KeywordOnly, None)
    }

    pub fn kwarg_default(self, name: &str, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::KeywordOnly, Some(default.into()))
    }

    pub fn varargs(mut self) -> Self {
        self.var_positional = true;
        self
    }

    pub fn varkw(mut self) -> Self {
        self.var_keyword = true;
        self
    }

    fn push(mut self, name: &str, kind: ParamKind, default: Option<Value>) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            kind,
            default,
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether `name` could be passed by keyword.
    pub fn has_param(&self, name: &str) -> bool {
        self.var_keyword || self.param(name).is_some()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .map(|p| p.name.as_str())
    }

    /// Bind call arguments to parameters, applying defaults.
    pub fn bind(
        &self,
        positional: Vec<Value>,
        keyword: BTreeMap<String, Value>,
    ) -> Result<Arguments, String> {
        let positional_params: Vec<&Param> = self
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .collect();
        if positional.len() > positional_params.len() && !self.var_positional {
            return Err(format!(
                "takes {} positional argument{} but {} were given",
                positional_params.len(),
                if positional_params.len() == 1 { "" } else { "s" },
                positional.len()
            ));
        }

        let mut named = BTreeMap::new();
        let mut varargs = Vec::new();
        for (i, value) in positional.into_iter().enumerate() {
            match positional_params.get(i) {
                Some(param) => {
                    named.insert(param.name.clone(), value);
                }
                None => varargs.push(value),
            }
        }

        let mut varkw = BTreeMap::new();
        for (name, value) in keyword {
            if self.param(&name).is_some() {
                if named.contains_key(&name) {
                    return Err(format!("got multiple values for argument '{}'", name));
                }
                named.insert(name, value);
            } else if self.var_keyword {
                varkw.insert(name, value);
            } else {
                return Err(format!("got an unexpected keyword argument '{}'", name));
            }
        }

        let mut missing = Vec::new();
        for param in &self.params {
            if named.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    named.insert(param.name.clone(), default.clone());
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }
        if !missing.is_empty() {
            return Err(format!(
                "missing {} required argument{}: {}",
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
                missing.join(", ")
            ));
        }

        Ok(Arguments { named, varargs, varkw })
    }
}

/// What a caller passes to a configurable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.to_string(), value.into());
        self
    }
}

/// What a target receives: every declared parameter by name, plus extras.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub named: BTreeMap<String, Value>,
    pub varargs: Vec<Value>,
    pub varkw: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name).or_else(|| self.varkw.get(name))
    }

    /// The named argument, or an [`ArgumentError`].
    pub fn require(&self, name: &str) -> Result<&Value, ArgumentError> {
        self.get(name)
            .ok_or_else(|| ArgumentError::new(format!("argument '{}' was not supplied", name)))
    }

    pub fn int(&self, name: &str) -> Result<i64, ArgumentError> {
        let value = self.require(name)?;
        value
            .as_int()
            .ok_or_else(|| ArgumentError::new(format!("'{}' must be an int, got {}", name, value)))
    }

    pub fn float(&self, name: &str) -> Result<f64, ArgumentError> {
        let value = self.require(name)?;
        value
            .as_float()
            .ok_or_else(|| ArgumentError::new(format!("'{}' must be a float, got {}", name, value)))
    }

    pub fn str(&self, name: &str) -> Result<&str, ArgumentError> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| {
                ArgumentError::new(format!("'{}' must be a string, got {}", name, value))
            })
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.named.remove(name).or_else(|| self.varkw.remove(name))
    }
}

/// Signals that a target was called with arguments it can't accept.
///
/// When a target fails with this error, the call error carries the
/// diagnostics block listing what config and caller supplied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ArgumentError {
    pub message: String,
}

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Something a configurable can wrap.
pub trait Target: Send + Sync {
    fn signature(&self) -> &Signature;

    fn invoke(&self, config: &Config, args: Arguments) -> anyhow::Result<Value>;
}

/// A [`Target`] built from a closure.
pub struct FnTarget<F> {
    signature: Signature,
    f: F,
}

impl<F> FnTarget<F>
where
    F: Fn(&Config, Arguments) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> Target for FnTarget<F>
where
    F: Fn(&Config, Arguments) -> anyhow::Result<Value> + Send + Sync,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&self, config: &Config, args: Arguments) -> anyhow::Result<Value> {
        (self.f)(config, args)
    }
}

impl<F> fmt::Debug for FnTarget<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTarget").field("signature", &self.signature).finish()
    }
}
