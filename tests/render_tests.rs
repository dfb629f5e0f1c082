//! Integration tests for config_str and operative_config_str

use gimlet::{CallArgs, Config, FnTarget, Registration, Settings, Signature, Value};

fn registered(settings: Settings) -> Config {
    let config = Config::with_settings(settings);
    let models = [
        ("Model", "nets", Signature::new().arg("units").arg_default("activation", "relu")),
        ("Adam", "optim", Signature::new().arg("rate").arg_default("beta", 0.9)),
        (
            "train",
            "loop",
            Signature::new().arg("model").arg("optimizer").kwarg_default("steps", 100),
        ),
    ];
    for (name, module, signature) in models {
        config
            .register(
                Registration::new(name, FnTarget::new(signature, |_, _| Ok(Value::None)))
                    .module(module),
            )
            .unwrap();
    }
    config
}

const CONFIG: &str = "\
import nets.layers
from optim import schedules as sched

rate = 0.001
widths = [64, 128]

train.model = @Model()
train.optimizer = @Adam
train.steps = 5000
Adam.rate = %rate
Model.units = %widths
eval/Model.units = [8]
eval/Model:
  activation = 'tanh'
";

#[test]
fn test_config_str_layout() {
    let config = Config::new();
    config
        .register(Registration::new(
            "f",
            FnTarget::new(Signature::new().arg("x"), |_, _| Ok(Value::None)),
        ))
        .unwrap();
    config.parse_config("import foo.bar\nlr = 0.5\nf.x = %lr\n", false).unwrap();

    let rule = format!("# {}", "=".repeat(78));
    let expected = format!(
        "import foo.bar\n\n# Macros:\n{rule}\nlr = 0.5\n\n# Parameters for f:\n{rule}\nf.x = %lr\n"
    );
    assert_eq!(config.config_str(), expected);
}

#[test]
fn test_config_str_round_trips() {
    let config = registered(Settings::default());
    config.parse_config(CONFIG, false).unwrap();
    let first = config.config_str();

    config.clear_config(false);
    assert!(config.config_str().is_empty());
    config.parse_config(&first, false).unwrap();
    assert_eq!(config.config_str(), first);

    assert!(first.contains("from optim import schedules as sched"));
    assert!(first.contains("# Parameters for eval/Model:"));
    assert!(first.contains("eval/Model.activation = 'tanh'"));
    assert!(first.contains("train.optimizer = @Adam\n"));
    assert!(first.contains("train.model = @Model()\n"));
}

#[test]
fn test_sections_sorted_by_name_then_scope() {
    let config = registered(Settings::default());
    config.parse_config(CONFIG, false).unwrap();
    let text = config.config_str();

    let adam = text.find("# Parameters for Adam:").unwrap();
    let model = text.find("# Parameters for Model:").unwrap();
    let eval_model = text.find("# Parameters for eval/Model:").unwrap();
    let train = text.find("# Parameters for train:").unwrap();
    assert!(adam < model);
    assert!(model < eval_model);
    assert!(eval_model < train);
}

#[test]
fn test_long_values_wrap() {
    let settings = Settings {
        max_line_length: 40,
        ..Default::default()
    };
    let config = registered(settings);
    let units: Vec<String> = (0..20).map(|i| (i * 1000).to_string()).collect();
    config
        .parse_config(&format!("Model.units = [{}]", units.join(", ")), false)
        .unwrap();

    let text = config.config_str();
    assert!(text.contains("Model.units = \\\n    [0,\n     1000,\n"));
    for line in text.lines() {
        assert!(line.chars().count() <= 40, "too long: {line}");
    }

    config.clear_config(false);
    config.parse_config(&text, false).unwrap();
    assert_eq!(config.config_str(), text);
}

#[test]
fn test_separator_counts_toward_line_length() {
    let settings = Settings {
        max_line_length: 40,
        ..Default::default()
    };
    let config = registered(settings);
    // Key and value take 11 + 29 columns; the " = " pushes it to 43.
    let name = "a".repeat(27);
    config
        .parse_config(&format!("Model.units = '{}'", name), false)
        .unwrap();

    let text = config.config_str();
    assert!(text.contains(&format!("Model.units = \\\n    '{}'\n", name)));
    for line in text.lines() {
        assert!(line.chars().count() <= 40, "too long: {line}");
    }
}

#[test]
fn test_unrepresentable_values_skipped() {
    let config = registered(Settings::default());
    config.bind_parameter("Model.units", Value::opaque(vec![1u8])).unwrap();
    let text = config.config_str();
    assert!(text.contains("# Parameters for Model:\n"));
    assert!(text.contains("# None."));
    assert!(!text.contains("Model.units"));
}

#[test]
fn test_operative_config_records_used_values() {
    let config = registered(Settings::default());
    config.parse_config(CONFIG, false).unwrap();
    assert!(!config.operative_config_str().contains("# Parameters"));

    config.call("Model", CallArgs::new()).unwrap();
    let operative = config.operative_config_str();
    assert!(operative.contains("Model.units = %widths"));
    assert!(operative.contains("Model.activation = 'relu'"));
    assert!(!operative.contains("Adam"));

    {
        let _eval = config.scope("eval").unwrap();
        config.call("Model", CallArgs::new().kwarg("units", 3)).unwrap();
    }
    let operative = config.operative_config_str();
    assert!(operative.contains("eval/Model.activation = 'tanh'"));
    assert!(!operative.contains("eval/Model.units"));
}
