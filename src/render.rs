//! Canonical config text rendering
//!
//! Output layout:
//! - sorted imports
//! - a `# Macros:` block of `name = value` lines
//! - one `# Parameters for scope/name:` block per (scope, selector), sorted by
//!   reversed selector components then reversed scope components
//!
//! A value is rendered only if parsing its text gives the value back; blocks
//! left without parameters say `# None.`.

use crate::binding::Params;
use crate::parser::{parse_value, ImportStatement, ParserDelegate};
use crate::settings::Settings;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_line_length: usize,
    pub continuation_indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for RenderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_line_length: settings.max_line_length,
            continuation_indent: settings.continuation_indent,
        }
    }
}

/// Parameters of one (scope, selector) block.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub scope: String,
    /// Complete selector, used for ordering.
    pub selector: String,
    /// Name printed in the output, usually the minimal selector.
    pub name: String,
    pub params: Params,
}

impl Section {
    pub fn scoped_name(&self) -> String {
        if self.scope.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.scope, self.name)
        }
    }
}

/// Everything the renderer needs, independent of any registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderInput {
    pub imports: Vec<ImportStatement>,
    /// `(macro name, value)`
    pub macros: Vec<(String, Value)>,
    pub sections: Vec<Section>,
}

/// Ordering key: selector components reversed, then scope components
/// reversed, case-insensitive.
pub fn sort_key(scope: &str, selector: &str) -> String {
    let selector = selector.to_lowercase();
    let scope = scope.to_lowercase();
    selector
        .split('.')
        .rev()
        .chain(scope.split('/').rev())
        .collect::<Vec<_>>()
        .join("/")
}

/// The value's literal text, if parsing it reproduces the value.
pub fn format_value(value: &Value, delegate: &dyn ParserDelegate) -> Option<String> {
    let literal = value.repr();
    match parse_value(&literal, delegate) {
        Ok(parsed) if parsed == *value => Some(literal),
        _ => None,
    }
}

/// Pretty-print `value` so lines stay within `width` where possible.
///
/// Containers that don't fit are split one item per line, aligned after the
/// opening bracket. Scalars are never split.
pub fn pformat(value: &Value, width: usize) -> String {
    let mut out = String::new();
    format_into(value, &mut out, 0, 0, width);
    out
}

fn format_into(value: &Value, out: &mut String, indent: usize, allowance: usize, width: usize) {
    let rep = value.repr();
    let max_width = width.saturating_sub(indent).saturating_sub(allowance);
    if rep.chars().count() <= max_width {
        out.push_str(&rep);
        return;
    }

    match value {
        Value::List(items) if !items.is_empty() => {
            out.push('[');
            format_items(items, out, indent + 1, allowance + 1, width);
            out.push(']');
        }
        Value::Tuple(items) if !items.is_empty() => {
            let end = if items.len() == 1 { ",)" } else { ")" };
            out.push('(');
            format_items(items, out, indent + 1, allowance + end.len(), width);
            out.push_str(end);
        }
        Value::Dict(pairs) if !pairs.is_empty() => {
            out.push('{');
            let indent = indent + 1;
            for (i, (key, item)) in pairs.iter().enumerate() {
                let last = i + 1 == pairs.len();
                if i > 0 {
                    out.push_str(",\n");
                    out.push_str(&" ".repeat(indent));
                }
                let key_rep = key.repr();
                out.push_str(&key_rep);
                out.push_str(": ");
                let item_allowance = if last { allowance + 1 } else { 1 };
                format_into(item, out, indent + key_rep.chars().count() + 2, item_allowance, width);
            }
            out.push('}');
        }
        _ => out.push_str(&rep),
    }
}

fn format_items(items: &[Value], out: &mut String, indent: usize, allowance: usize, width: usize) {
    for (i, item) in items.iter().enumerate() {
        let last = i + 1 == items.len();
        if i > 0 {
            out.push_str(",\n");
            out.push_str(&" ".repeat(indent));
        }
        format_into(item, out, indent, if last { allowance } else { 1 }, width);
    }
}

/// `key = value`, or `key = \` followed by the indented value when it doesn't
/// fit on one line.
pub fn format_binding(key: &str, value: &Value, options: &RenderOptions) -> String {
    let width = options
        .max_line_length
        .saturating_sub(options.continuation_indent);
    let formatted = pformat(value, width);
    let single_line = !formatted.contains('\n');
    let columns = key.chars().count() + " = ".len() + formatted.chars().count();
    if single_line && columns <= options.max_line_length {
        return format!("{} = {}", key, formatted);
    }
    let indent = " ".repeat(options.continuation_indent);
    let body: Vec<String> = formatted
        .split('\n')
        .map(|line| format!("{}{}", indent, line))
        .collect();
    format!("{} = \\\n{}", key, body.join("\n"))
}

/// Render `input` as config text.
pub fn render(
    input: &RenderInput,
    options: &RenderOptions,
    delegate: &dyn ParserDelegate,
) -> String {
    let rule = format!("# {}", "=".repeat(options.max_line_length.saturating_sub(2)));
    let mut lines: Vec<String> = Vec::new();

    let mut imports: Vec<String> = input.imports.iter().map(ImportStatement::format).collect();
    imports.sort();
    imports.dedup();
    if !imports.is_empty() {
        lines.extend(imports);
        lines.push(String::new());
    }

    let mut macros: Vec<(&String, String)> = input
        .macros
        .iter()
        .filter_map(|(name, value)| {
            format_value(value, delegate).map(|_| (name, format_binding(name, value, options)))
        })
        .collect();
    if !macros.is_empty() {
        macros.sort_by_key(|(name, _)| sort_key(name, ""));
        lines.push("# Macros:".to_string());
        lines.push(rule.clone());
        lines.extend(macros.into_iter().map(|(_, binding)| binding));
        lines.push(String::new());
    }

    let mut sections: Vec<&Section> = input.sections.iter().collect();
    sections.sort_by_key(|s| sort_key(&s.scope, &s.selector));
    for section in sections {
        let scoped_name = section.scoped_name();
        lines.push(format!("# Parameters for {}:", scoped_name));
        lines.push(rule.clone());
        let mut any = false;
        for (param, value) in &section.params {
            if format_value(value, delegate).is_none() {
                continue;
            }
            any = true;
            lines.push(format_binding(&format!("{}.{}", scoped_name, param), value, options));
        }
        if !any {
            lines.push("# None.".to_string());
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
