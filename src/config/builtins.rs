//! Built-in configurables and finalize hooks
//!
//! - `gimlet.macro(value)` returns its bound value; `%name` evaluates it
//!   under scope `name`
//! - `gimlet.constant()` returns the constant named by the active scope
//! - `gimlet.singleton(constructor)` memoizes one value per active scope

use tracing::error;

use super::{Config, Registration};
use crate::binding::BindingKey;
use crate::error::GimletError;
use crate::reference::MACRO_SELECTOR;
use crate::signature::{ArgumentError, Arguments, FnTarget, Signature};
use crate::value::Value;

const MODULE: &str = "gimlet";

pub(super) fn install(config: &Config) {
    let builtins = [
        Registration::new("macro", FnTarget::new(Signature::new().arg("value"), macro_value)),
        Registration::new("constant", FnTarget::new(Signature::new(), constant_value)),
        Registration::new(
            "singleton",
            FnTarget::new(Signature::new().arg_default("constructor", Value::None), singleton),
        ),
    ];
    for registration in builtins {
        if let Err(e) = config.register(registration.module(MODULE)) {
            error!(error = %e, "Failed to install built-in configurable");
        }
    }
    config.register_finalize_hook(validate_macros);
    config.register_finalize_hook(find_unknown_references);
}

fn macro_value(_: &Config, mut args: Arguments) -> anyhow::Result<Value> {
    Ok(args
        .take("value")
        .ok_or_else(|| ArgumentError::new("macro called without a value"))?)
}

fn constant_value(config: &Config, _: Arguments) -> anyhow::Result<Value> {
    let name = config.current_scope().to_string();
    Ok(config.constant_value(&name)?)
}

fn singleton(config: &Config, args: Arguments) -> anyhow::Result<Value> {
    let key = config.current_scope().to_string();
    Ok(config.singleton_value(&key, args.get("constructor"))?)
}

/// Macros must be evaluated and bound.
fn validate_macros(config: &Config) -> anyhow::Result<Vec<(BindingKey, Value)>> {
    for reference in config.iterate_references(Some(MACRO_SELECTOR))? {
        if !reference.evaluate() {
            return Err(GimletError::MacroNotEvaluated {
                reference: reference.repr(),
            }
            .into());
        }
        let bound = config
            .inner
            .store
            .read()
            .get(&reference.scope_str(), MACRO_SELECTOR)
            .is_some();
        if !bound {
            return Err(GimletError::MacroUnbound {
                reference: reference.scoped_selector().to_string(),
            }
            .into());
        }
    }
    Ok(Vec::new())
}

fn find_unknown_references(config: &Config) -> anyhow::Result<Vec<(BindingKey, Value)>> {
    config.validate_references()?;
    Ok(Vec::new())
}
