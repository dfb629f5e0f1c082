//! Integration tests for registration, binding resolution and calls

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use gimlet::{
    BindingKey, CallArgs, Config, FnTarget, GimletError, Registration, ScopePath, Signature, Value,
};

/// Register `name` returning its named arguments as a dict.
fn echo(config: &Config, registration: Registration) {
    config.register(registration).unwrap();
}

fn echo_target(
    signature: Signature,
) -> FnTarget<impl Fn(&Config, gimlet::Arguments) -> anyhow::Result<Value>> {
    FnTarget::new(signature, |_, args| {
        Ok(Value::dict(
            args.named.into_iter().map(|(k, v)| (Value::from(k), v)),
        ))
    })
}

fn field(result: &Value, name: &str) -> Value {
    result.get(&Value::from(name)).cloned().unwrap_or(Value::None)
}

/// A configurable returning 0, 1, 2, ... on successive calls.
fn counter(config: &Config, name: &str) -> Arc<AtomicI64> {
    let count = Arc::new(AtomicI64::new(0));
    let seen = count.clone();
    config
        .register(Registration::new(
            name,
            FnTarget::new(Signature::new(), move |_, _| {
                Ok(Value::Int(seen.fetch_add(1, Ordering::SeqCst)))
            }),
        ))
        .unwrap();
    count
}

/// A configurable returning the scope it was called under.
fn where_am_i(config: &Config) {
    config
        .register(Registration::new(
            "WhereAmI",
            FnTarget::new(Signature::new(), |config, _| {
                Ok(Value::from(config.current_scope().to_string()))
            }),
        ))
        .unwrap();
}

// ============================================================================
// Selectors
// ============================================================================

#[test]
fn test_ambiguous_partial_selector() {
    let config = Config::new();
    echo(&config, Registration::new("Bar", echo_target(Signature::new().arg("x"))).module("foo"));
    echo(&config, Registration::new("Bar", echo_target(Signature::new().arg("x"))).module("baz"));

    let err = config.get_configurable("Bar").unwrap_err();
    assert!(matches!(err, GimletError::AmbiguousSelector { .. }));
    assert_eq!(config.get_configurable("foo.Bar").unwrap().selector(), "foo.Bar");

    let err = config.parse_config("Bar.x = 1", false).unwrap_err();
    assert!(matches!(err.root(), GimletError::AmbiguousSelector { .. }));
    assert!(err.to_string().contains("line 1"));

    config.parse_config("baz.Bar.x = 2", false).unwrap();
    assert_eq!(config.query_parameter("baz.Bar.x").unwrap(), Value::Int(2));
}

#[test]
fn test_minimal_selectors() {
    let config = Config::new();
    echo(&config, Registration::new("Bar", echo_target(Signature::new())).module("foo"));
    echo(&config, Registration::new("Bar", echo_target(Signature::new())).module("baz"));
    echo(&config, Registration::new("Qux", echo_target(Signature::new())).module("deep.pkg"));

    assert_eq!(config.minimal_selector("foo.Bar").as_deref(), Some("foo.Bar"));
    assert_eq!(config.minimal_selector("deep.pkg.Qux").as_deref(), Some("Qux"));
    assert_eq!(config.minimal_selector("nope.Qux"), None);
    assert!(config.registered_selectors().contains(&"deep.pkg.Qux".to_string()));
}

#[test]
fn test_minimal_shortens_after_removal() {
    let mut map = gimlet::SelectorMap::new();
    map.insert("foo.Bar", 1).unwrap();
    map.insert("baz.Bar", 2).unwrap();

    match map.resolve("Bar").unwrap_err() {
        GimletError::AmbiguousSelector { matches, .. } => {
            let mut matches = matches;
            matches.sort();
            assert_eq!(matches, vec!["baz.Bar".to_string(), "foo.Bar".to_string()]);
        }
        other => panic!("unexpected {other}"),
    }
    assert_eq!(map.resolve("foo.Bar").unwrap().as_deref(), Some("foo.Bar"));
    assert_eq!(map.minimal("foo.Bar").as_deref(), Some("foo.Bar"));

    assert_eq!(map.remove("baz.Bar"), Some(2));
    assert_eq!(map.minimal("foo.Bar").as_deref(), Some("Bar"));
    assert_eq!(map.resolve("Bar").unwrap().as_deref(), Some("foo.Bar"));
    assert_eq!(map.resolve("Qux").unwrap(), None);
}

#[test]
fn test_unknown_parameter_rejected() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x"))));
    let err = config.bind_parameter("f.nope", 1).unwrap_err();
    assert!(matches!(err, GimletError::NoSuchParameter { .. }));

    let err = config.parse_config("f.x = 1\nf.nope = 2\n", false).unwrap_err();
    assert!(err.to_string().contains("line 2"));
    // statements before the failure stay applied
    assert_eq!(config.query_parameter("f.x").unwrap(), Value::Int(1));
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_deeper_scope_wins() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x"))));
    config
        .parse_config("f.x = 1\na/f.x = 2\na/b/f.x = 3\n", false)
        .unwrap();

    let x = |config: &Config| field(&config.call("f", CallArgs::new()).unwrap(), "x");
    assert_eq!(x(&config), Value::Int(1));
    {
        let _a = config.scope("a").unwrap();
        assert_eq!(x(&config), Value::Int(2));
        {
            let _b = config.scope("b").unwrap();
            assert_eq!(config.current_scope().to_string(), "a/b");
            assert_eq!(x(&config), Value::Int(3));
            let _cleared = config.scope("").unwrap();
            assert_eq!(x(&config), Value::Int(1));
        }
        assert_eq!(x(&config), Value::Int(2));
    }
    {
        // a scope that only matches deeper in the path doesn't apply
        let _b = config.scope("b").unwrap();
        assert_eq!(x(&config), Value::Int(1));
    }
    assert_eq!(field(&config.call("a/b/f", CallArgs::new()).unwrap(), "x"), Value::Int(3));
    assert!(config.current_scope().is_root());
}

#[test]
fn test_get_bindings_inherit() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x").arg("y"))));
    config.parse_config("f.x = 1\nf.y = 1\ns/f.y = 2\n", false).unwrap();

    let inherited = config.get_bindings("s/f", true).unwrap();
    assert_eq!(inherited.get("x"), Some(&Value::Int(1)));
    assert_eq!(inherited.get("y"), Some(&Value::Int(2)));

    let exact = config.get_bindings("s/f", false).unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact.get("y"), Some(&Value::Int(2)));
}

#[test]
fn test_exact_bindings_at_root_scope() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x").arg("y"))));
    echo(&config, Registration::new("g", echo_target(Signature::new().arg("x"))));
    config.parse_config("f.x = 1\nf.y = 1\ns/f.y = 2\ns/g.x = 3\n", false).unwrap();

    let exact = config.get_bindings("f", false).unwrap();
    assert_eq!(exact.len(), 2);
    assert_eq!(exact.get("y"), Some(&Value::Int(1)));
    assert!(config.get_bindings("g", false).unwrap().is_empty());

    let root = config.get_overrides("f", &ScopePath::root()).unwrap();
    assert_eq!(root, exact);
    let scoped = config.get_overrides("f", &ScopePath::parse("s").unwrap()).unwrap();
    assert_eq!(scoped.get("x"), Some(&Value::Int(1)));
    assert_eq!(scoped.get("y"), Some(&Value::Int(2)));
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_caller_arguments_override_config() {
    let config = Config::new();
    let signature = Signature::new().arg("x").arg_default("y", 0);
    echo(&config, Registration::new("f", echo_target(signature)));
    config.parse_config("f.x = 1\nf.y = 2\n", false).unwrap();

    let result = config.call("f", CallArgs::new().kwarg("x", 10)).unwrap();
    assert_eq!(field(&result, "x"), Value::Int(10));
    assert_eq!(field(&result, "y"), Value::Int(2));

    let result = config.call("f", CallArgs::new().arg(7)).unwrap();
    assert_eq!(field(&result, "x"), Value::Int(7));

    let operative = config.operative_config_str();
    assert!(operative.contains("f.y = 2"));
    assert!(!operative.contains("f.x"));
}

#[test]
fn test_required_parameters() {
    let config = Config::new();
    echo(
        &config,
        Registration::new(
            "Model",
            echo_target(
                Signature::new()
                    .arg_default("units", Value::Required)
                    .arg_default("depth", 1),
            ),
        )
        .module("nets"),
    );

    let err = config.call("Model", CallArgs::new()).unwrap_err();
    match &err {
        GimletError::MissingRequired { configurable, missing } => {
            assert_eq!(configurable, "Model");
            assert_eq!(missing, &vec!["units".to_string()]);
        }
        other => panic!("unexpected {other}"),
    }

    // a caller-passed Required is satisfied by config, not by the caller
    let err = config
        .call("Model", CallArgs::new().kwarg("depth", Value::Required))
        .unwrap_err();
    match &err {
        GimletError::MissingRequired { missing, .. } => {
            assert_eq!(missing, &vec!["units".to_string(), "depth".to_string()]);
        }
        other => panic!("unexpected {other}"),
    }

    config.parse_config("Model.units = 8\nModel.depth = 3\n", false).unwrap();
    let result = config
        .call("Model", CallArgs::new().kwarg("depth", Value::Required))
        .unwrap();
    assert_eq!(field(&result, "units"), Value::Int(8));
    assert_eq!(field(&result, "depth"), Value::Int(3));
}

fn missing(err: GimletError) -> Vec<String> {
    match err {
        GimletError::MissingRequired { missing, .. } => missing,
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn test_positional_required_sentinel() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x").arg("y"))));

    let args = || CallArgs::new().arg(Value::Required).arg(2);
    assert_eq!(missing(config.call("f", args()).unwrap_err()), vec!["x"]);

    config.parse_config("f.x = 1", false).unwrap();
    let result = config.call("f", args()).unwrap();
    assert_eq!(field(&result, "x"), Value::Int(1));
    assert_eq!(field(&result, "y"), Value::Int(2));
}

#[test]
fn test_keyword_required_sentinel() {
    let config = Config::new();
    let signature = Signature::new().arg("x").arg_default("y", 0);
    echo(&config, Registration::new("f", echo_target(signature)));

    let args = || CallArgs::new().arg(1).kwarg("y", Value::Required);
    assert_eq!(missing(config.call("f", args()).unwrap_err()), vec!["y"]);

    config.parse_config("f.y = 5", false).unwrap();
    let result = config.call("f", args()).unwrap();
    assert_eq!(field(&result, "x"), Value::Int(1));
    assert_eq!(field(&result, "y"), Value::Int(5));
}

#[test]
fn test_required_default_with_each_sentinel_form() {
    let config = Config::new();
    let signature = Signature::new().arg_default("x", Value::Required);
    echo(&config, Registration::new("f", echo_target(signature)));
    let calls: [fn() -> CallArgs; 3] = [
        CallArgs::new,
        || CallArgs::new().arg(Value::Required),
        || CallArgs::new().kwarg("x", Value::Required),
    ];

    for args in &calls {
        assert_eq!(missing(config.call("f", args()).unwrap_err()), vec!["x"]);
    }

    config.parse_config("f.x = 1", false).unwrap();
    for args in &calls {
        let result = config.call("f", args()).unwrap();
        assert_eq!(field(&result, "x"), Value::Int(1));
    }
}

#[test]
fn test_all_missing_required_listed_in_signature_order() {
    let config = Config::new();
    let signature = Signature::new()
        .arg("a")
        .arg_default("b", Value::Required)
        .arg_default("c", 0);
    echo(&config, Registration::new("f", echo_target(signature)));
    let args = || CallArgs::new().arg(Value::Required).kwarg("c", Value::Required);

    assert_eq!(missing(config.call("f", args()).unwrap_err()), vec!["a", "b", "c"]);

    config.parse_config("f.b = 2", false).unwrap();
    assert_eq!(missing(config.call("f", args()).unwrap_err()), vec!["a", "c"]);

    config.parse_config("f.a = 1\nf.c = 3\n", false).unwrap();
    let result = config.call("f", args()).unwrap();
    assert_eq!(field(&result, "a"), Value::Int(1));
    assert_eq!(field(&result, "b"), Value::Int(2));
    assert_eq!(field(&result, "c"), Value::Int(3));
}

#[test]
fn test_missing_argument_diagnostics() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("a").arg("b"))));
    config.parse_config("f.a = 1", false).unwrap();

    let err = config.call("f", CallArgs::new()).unwrap_err();
    assert!(matches!(err, GimletError::Signature { .. }));
    let text = err.to_string();
    assert!(text.contains("No values supplied by config or caller for arguments: ['b']"));
    assert!(text.contains("Config had values bound for: ['a']"));
    assert!(text.contains("In call to configurable 'f'"));
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_evaluated_reference_called_per_use() {
    let config = Config::new();
    let count = counter(&config, "Make");
    echo(&config, Registration::new("user", echo_target(Signature::new().arg("dep"))));
    config.parse_config("user.dep = @Make()", false).unwrap();

    assert_eq!(field(&config.call("user", CallArgs::new()).unwrap(), "dep"), Value::Int(0));
    assert_eq!(field(&config.call("user", CallArgs::new()).unwrap(), "dep"), Value::Int(1));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unevaluated_reference_is_shared_callable() {
    let config = Config::new();
    let count = counter(&config, "Make");
    echo(&config, Registration::new("user", echo_target(Signature::new().arg("factory"))));
    config.parse_config("user.factory = @Make", false).unwrap();

    let first = field(&config.call("user", CallArgs::new()).unwrap(), "factory");
    let second = field(&config.call("user", CallArgs::new()).unwrap(), "factory");
    let (Some(a), Some(b)) = (first.as_callable(), second.as_callable()) else {
        panic!("expected callables, got {first} and {second}");
    };
    assert!(Arc::ptr_eq(a, b));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert_eq!(a.call(CallArgs::new()).unwrap(), Value::Int(0));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reference_scope_replaces_caller_scope() {
    let config = Config::new();
    where_am_i(&config);
    echo(&config, Registration::new("user", echo_target(Signature::new().arg("now").arg("later"))));
    config
        .parse_config("user.now = @inner/WhereAmI()\nuser.later = @inner/WhereAmI\n", false)
        .unwrap();

    let _outer = config.scope("outer").unwrap();
    let result = config.call("user", CallArgs::new()).unwrap();
    assert_eq!(field(&result, "now"), Value::from("inner"));

    let later = field(&result, "later");
    let callable = later.as_callable().unwrap();
    assert_eq!(callable.call(CallArgs::new()).unwrap(), Value::from("inner"));
    assert_eq!(config.current_scope().to_string(), "outer");
}

#[test]
fn test_unresolved_reference_deferred() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x"))));
    config.parse_config("f.x = @Later()", false).unwrap();

    let err = config.call("f", CallArgs::new()).unwrap_err();
    assert!(matches!(err, GimletError::UnresolvedReference { .. }));
    assert!(err.to_string().contains("@Later()"));
    assert!(err.to_string().contains("ensure finalize() is called"));

    let err = config.validate_references().unwrap_err();
    assert!(err.to_string().contains("In binding for 'f.x'."));

    let err = config.finalize().unwrap_err();
    assert!(matches!(err, GimletError::UnresolvedReference { .. }));
    assert!(!config.is_locked());

    // registering the target later resolves the stored reference
    counter(&config, "Later");
    assert_eq!(field(&config.call("f", CallArgs::new()).unwrap(), "x"), Value::Int(0));
    config.finalize().unwrap();
}

#[test]
fn test_reregistration_rebinds_references() {
    let config = Config::new();
    echo(&config, Registration::new("user", echo_target(Signature::new().arg("dep"))));
    config
        .register(Registration::new(
            "Make",
            FnTarget::new(Signature::new(), |_, _| Ok(Value::Int(1))),
        ))
        .unwrap();
    config.parse_config("user.dep = @Make()", false).unwrap();
    assert_eq!(field(&config.call("user", CallArgs::new()).unwrap(), "dep"), Value::Int(1));

    {
        let _interactive = config.interactive_mode();
        config
            .register(Registration::new(
                "Make",
                FnTarget::new(Signature::new(), |_, _| Ok(Value::Int(2))),
            ))
            .unwrap();
    }
    assert_eq!(field(&config.call("user", CallArgs::new()).unwrap(), "dep"), Value::Int(2));
}

#[test]
fn test_target_error_wrapped_with_context() {
    let config = Config::new();
    config
        .register(Registration::new(
            "Broken",
            FnTarget::new(Signature::new(), |_, _| Err(anyhow::anyhow!("disk on fire"))),
        ))
        .unwrap();
    let err = config.call("job/Broken", CallArgs::new()).unwrap_err();
    assert!(matches!(err, GimletError::Call { .. }));
    let text = err.to_string();
    assert!(text.contains("disk on fire"));
    assert!(text.contains("In call to configurable 'Broken'"));
    assert!(text.contains("job"));
    assert!(std::error::Error::source(&err).is_some());
}

// ============================================================================
// Constants and macros
// ============================================================================

#[test]
fn test_macros_and_constants_in_text() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("rate").arg("size"))));
    config.constant("sizes.large", 512).unwrap();
    config
        .parse_config("rate = 0.5\nf.rate = %rate\nf.size = %large\n", false)
        .unwrap();

    let result = config.call("f", CallArgs::new()).unwrap();
    assert_eq!(field(&result, "rate"), Value::Float(0.5));
    assert_eq!(field(&result, "size"), Value::Int(512));
    assert_eq!(config.query_parameter("%rate").unwrap(), Value::Float(0.5));
    assert_eq!(config.query_parameter("%large").unwrap(), Value::Int(512));

    let err = config.constant("large", 1).unwrap_err();
    assert!(matches!(err, GimletError::DuplicateConstant { .. }));
}

// ============================================================================
// Finalize and locking
// ============================================================================

#[test]
fn test_finalize_hook_bindings_then_lock() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x").arg("y"))));
    config.parse_config("f.x = 1", false).unwrap();
    config.register_finalize_hook(|config| {
        let x = config.query_parameter("f.x")?;
        Ok(vec![(BindingKey::parse("f.y")?, x)])
    });

    config.finalize().unwrap();
    assert!(config.is_locked());
    assert_eq!(config.query_parameter("f.y").unwrap(), Value::Int(1));

    let err = config.bind_parameter("f.x", 2).unwrap_err();
    assert!(matches!(err, GimletError::Locked { .. }));
    assert!(matches!(config.finalize().unwrap_err(), GimletError::AlreadyFinalized));

    {
        let _unlocked = config.unlock_config();
        config.bind_parameter("f.x", 2).unwrap();
    }
    assert!(config.is_locked());
    assert_eq!(config.query_parameter("f.x").unwrap(), Value::Int(2));

    config.clear_config(false);
    assert!(!config.is_locked());
    assert!(config.get_bindings("f", true).unwrap().is_empty());
}

#[test]
fn test_conflicting_hook_bindings() {
    let config = Config::new();
    echo(&config, Registration::new("f", echo_target(Signature::new().arg("x"))).module("pkg"));
    config.register_finalize_hook(|_| Ok(vec![(BindingKey::parse("f.x")?, Value::Int(1))]));
    config.register_finalize_hook(|_| Ok(vec![(BindingKey::parse("pkg.f.x")?, Value::Int(2))]));

    let err = config.finalize().unwrap_err();
    assert!(matches!(err, GimletError::ConflictingHookBindings { .. }));
    assert!(!config.is_locked());
}

#[test]
fn test_hook_failure_is_reported() {
    let config = Config::new();
    config.register_finalize_hook(|_| Err(anyhow::anyhow!("hook exploded")));
    let err = config.finalize().unwrap_err();
    assert!(matches!(err, GimletError::Hook(_)));
    assert!(err.to_string().contains("hook exploded"));
}

#[test]
fn test_skip_unknown_from_settings() {
    let settings = gimlet::Settings {
        skip_unknown: true,
        ..Default::default()
    };
    let config = Config::with_settings(settings);
    config.parse_config("nobody.x = 1", false).unwrap();
    assert!(config.config_str().is_empty());
}
