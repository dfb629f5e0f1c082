//! Config text parser
//!
//! A recursive-descent parser over literal values (numbers, strings, lists,
//! tuples, dicts, `True`/`False`/`None`) plus:
//! - scoped selectors (`scope/sub/module.name`)
//! - references `@selector` / `@selector()` and macros `%name`
//! - statements: `selector.param = value`, `selector:` blocks,
//!   `import a.b [as c]`, `from a import b [as c]`, `include "path"`
//!
//! The parser yields one [`Statement`] at a time. Constructing references is
//! delegated to a [`ParserDelegate`] so callers decide how names resolve.

mod token;

use std::fmt;

use crate::error::{GimletError, Location, ParseError};
use crate::reference::Reference;
use crate::selector_map::{is_identifier, is_valid_selector};
use crate::value::Value;

use token::{Lexer, Token, TokenKind};

/// Builds the values that `@...` and `%...` literals stand for.
pub trait ParserDelegate {
    fn configurable_reference(
        &self,
        scoped_selector: &str,
        evaluate: bool,
    ) -> Result<Value, GimletError>;

    fn macro_reference(&self, scoped_name: &str) -> Result<Value, GimletError>;
}

/// Delegate that builds references without consulting any registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntaxDelegate;

impl ParserDelegate for SyntaxDelegate {
    fn configurable_reference(
        &self,
        scoped_selector: &str,
        evaluate: bool,
    ) -> Result<Value, GimletError> {
        Ok(Value::Reference(Reference::new(scoped_selector, evaluate)))
    }

    fn macro_reference(&self, scoped_name: &str) -> Result<Value, GimletError> {
        Ok(Value::Reference(Reference::macro_named(scoped_name)))
    }
}

/// `scope/selector.param = value`. An empty `param` binds a macro named
/// `scope/selector`.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingStatement {
    pub scope: String,
    pub selector: String,
    pub param: String,
    pub value: Value,
    pub location: Location,
}

impl BindingStatement {
    pub fn is_macro(&self) -> bool {
        self.param.is_empty()
    }

    /// Macro name for a macro binding (`scope/selector`).
    pub fn macro_name(&self) -> String {
        if self.scope.is_empty() {
            self.selector.clone()
        } else {
            format!("{}/{}", self.scope, self.selector)
        }
    }
}

/// Header of a `scope/selector:` block. The block's bindings follow as
/// ordinary [`BindingStatement`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDeclaration {
    pub scope: String,
    pub selector: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ImportStatement {
    /// Complete dotted path of what is imported.
    pub module: String,
    pub alias: Option<String>,
    pub is_from: bool,
    pub location: Option<Location>,
}

impl ImportStatement {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            alias: None,
            is_from: false,
            location: None,
        }
    }

    fn split_module(&self) -> (Option<&str>, &str) {
        match self.module.rsplit_once('.') {
            Some((parent, last)) => (Some(parent), last),
            None => (None, &self.module),
        }
    }

    /// Statement text, e.g. `from a.b import c as d`.
    pub fn format(&self) -> String {
        let mut out = match (self.is_from, self.split_module()) {
            (true, (Some(parent), name)) => format!("from {} import {}", parent, name),
            _ => format!("import {}", self.module),
        };
        if let Some(alias) = &self.alias {
            out.push_str(" as ");
            out.push_str(alias);
        }
        out
    }

    /// Name the statement binds in the importing namespace.
    pub fn bound_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        if self.is_from {
            self.split_module().1.to_string()
        } else {
            self.module.split('.').next().unwrap_or_default().to_string()
        }
    }

    /// Dotted path under which the bound name is reachable.
    pub fn partial_path(&self) -> String {
        match (&self.alias, self.split_module().0) {
            (Some(alias), Some(parent)) => format!("{}.{}", parent, alias),
            (Some(alias), None) => alias.clone(),
            (None, _) if self.is_from => self.module.clone(),
            (None, _) => self.bound_name(),
        }
    }
}

impl PartialEq for ImportStatement {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.alias == other.alias && self.is_from == other.is_from
    }
}

impl Eq for ImportStatement {}

impl fmt::Display for ImportStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeStatement {
    pub path: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Binding(BindingStatement),
    Block(BlockDeclaration),
    Import(ImportStatement),
    Include(IncludeStatement),
}

impl Statement {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Statement::Binding(s) => Some(&s.location),
            Statement::Block(s) => Some(&s.location),
            Statement::Import(s) => s.location.as_ref(),
            Statement::Include(s) => Some(&s.location),
        }
    }
}

struct BlockState {
    scope: String,
    selector: String,
    header_col: usize,
    body_col: Option<usize>,
    location: Location,
}

pub struct ConfigParser<'d> {
    lexer: Lexer,
    current: Token,
    delegate: &'d dyn ParserDelegate,
    block: Option<BlockState>,
    done: bool,
}

impl<'d> ConfigParser<'d> {
    /// `origin` names the file the text came from, for error locations.
    pub fn new(
        text: &str,
        origin: Option<&str>,
        delegate: &'d dyn ParserDelegate,
    ) -> Result<Self, GimletError> {
        let mut lexer = Lexer::new(text, origin.map(str::to_string));
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            delegate,
            block: None,
            done: false,
        })
    }

    /// Parse the next statement, `None` at end of input.
    pub fn parse_statement(&mut self) -> Result<Option<Statement>, GimletError> {
        self.skip_whitespace_and_comments()?;

        if let Some(block) = &self.block {
            let inside = self.current.kind != TokenKind::Eof && self.current.col > block.header_col;
            if inside {
                return self.parse_block_binding().map(Some);
            }
            if block.body_col.is_none() {
                let location = block.location.clone();
                return Err(ParseError::new("Expected an indented block.", location).into());
            }
            self.block = None;
        }

        if self.current.kind == TokenKind::Eof {
            return Ok(None);
        }

        let statement_location = self.location(false);
        let header_col = self.current.col;
        let key = self.parse_selector(true, false)?;

        let statement = if self.current.is_op("=") {
            self.advance_one()?;
            let value = self.parse_value()?;
            let (scope, selector, param) = split_binding_key(&key);
            Statement::Binding(BindingStatement {
                scope,
                selector,
                param,
                value,
                location: statement_location,
            })
        } else if self.current.is_op(":") {
            self.advance_one()?;
            while self.current.kind == TokenKind::Comment {
                self.advance_one()?;
            }
            let (scope, selector) = match key.rsplit_once('/') {
                Some((scope, selector)) => (scope.to_string(), selector.to_string()),
                None => (String::new(), key),
            };
            self.block = Some(BlockState {
                scope: scope.clone(),
                selector: selector.clone(),
                header_col,
                body_col: None,
                location: statement_location.clone(),
            });
            Statement::Block(BlockDeclaration {
                scope,
                selector,
                location: statement_location,
            })
        } else if key == "import" {
            let module = self.parse_selector(false, false)?;
            let alias = self.parse_alias()?;
            Statement::Import(ImportStatement {
                module,
                alias,
                is_from: false,
                location: Some(statement_location),
            })
        } else if key == "from" {
            let parent = self.parse_selector(false, false)?;
            if !self.current.is_name("import") {
                return Err(self.syntax_error("Expected 'import'."));
            }
            self.advance_one()?;
            let name = self.parse_identifier()?;
            let alias = self.parse_alias()?;
            Statement::Import(ImportStatement {
                module: format!("{}.{}", parent, name),
                alias,
                is_from: true,
                location: Some(statement_location),
            })
        } else if key == "include" {
            let string_location = self.location(true);
            match self.maybe_parse_basic_type()? {
                Some(Value::Str(path)) => Statement::Include(IncludeStatement {
                    path,
                    location: statement_location,
                }),
                _ => {
                    let message = "Expected file path as string.";
                    return Err(ParseError::new(message, string_location).into());
                }
            }
        } else {
            return Err(self.syntax_error("Expected '='."));
        };

        self.expect_end_of_statement()?;
        Ok(Some(statement))
    }

    fn parse_block_binding(&mut self) -> Result<Statement, GimletError> {
        let col = self.current.col;
        let location = self.location(false);
        let (scope, selector, body_col) = match &self.block {
            Some(block) => (block.scope.clone(), block.selector.clone(), block.body_col),
            None => return Err(self.syntax_error("Unexpected indentation.")),
        };
        match body_col {
            Some(body_col) if body_col != col => {
                return Err(self.syntax_error("Inconsistent indentation in block."));
            }
            Some(_) => {}
            None => {
                if let Some(block) = self.block.as_mut() {
                    block.body_col = Some(col);
                }
            }
        }

        let param = self.parse_identifier()?;
        if !self.current.is_op("=") {
            return Err(self.syntax_error("Expected '='."));
        }
        self.advance_one()?;
        let value = self.parse_value()?;
        self.expect_end_of_statement()?;
        Ok(Statement::Binding(BindingStatement {
            scope,
            selector,
            param,
            value,
            location,
        }))
    }

    fn parse_alias(&mut self) -> Result<Option<String>, GimletError> {
        if self.current.is_name("as") {
            self.advance_one()?;
            return self.parse_identifier().map(Some);
        }
        Ok(None)
    }

    fn parse_identifier(&mut self) -> Result<String, GimletError> {
        let location = self.location(true);
        let name = self.parse_selector(false, false)?;
        if !is_identifier(&name) {
            return Err(ParseError::new("Expected an identifier.", location).into());
        }
        Ok(name)
    }

    fn expect_end_of_statement(&mut self) -> Result<(), GimletError> {
        match self.current.kind {
            TokenKind::Newline => self.advance_one(),
            TokenKind::Eof => Ok(()),
            _ => Err(self.syntax_error("Expected newline.")),
        }
    }

    /// Parse a single value. Trailing content is left unconsumed.
    pub fn parse_value(&mut self) -> Result<Value, GimletError> {
        if let Some(value) = self.maybe_parse_container()? {
            return Ok(value);
        }
        if let Some(value) = self.maybe_parse_basic_type()? {
            return Ok(value);
        }
        if let Some(value) = self.maybe_parse_reference()? {
            return Ok(value);
        }
        if let Some(value) = self.maybe_parse_macro()? {
            return Ok(value);
        }
        Err(self.syntax_error("Unable to parse value."))
    }

    /// True once only whitespace, comments and newlines remain.
    pub fn at_end(&mut self) -> Result<bool, GimletError> {
        while matches!(
            self.current.kind,
            TokenKind::Comment | TokenKind::Nl | TokenKind::Newline
        ) {
            self.advance_one()?;
        }
        Ok(self.current.kind == TokenKind::Eof)
    }

    fn advance_one(&mut self) -> Result<(), GimletError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), GimletError> {
        while matches!(self.current.kind, TokenKind::Comment | TokenKind::Nl) {
            self.advance_one()?;
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), GimletError> {
        self.advance_one()?;
        self.skip_whitespace_and_comments()
    }

    fn location(&self, with_column: bool) -> Location {
        self.lexer
            .location(self.current.line, with_column.then_some(self.current.col + 1))
    }

    fn syntax_error(&self, message: &str) -> GimletError {
        ParseError::new(message, self.location(true)).into()
    }

    /// Parse a dotted selector, optionally preceded by `/`-separated scopes.
    fn parse_selector(
        &mut self,
        scoped: bool,
        allow_periods_in_scope: bool,
    ) -> Result<String, GimletError> {
        if self.current.kind != TokenKind::Name {
            return Err(self.syntax_error("Unexpected token."));
        }

        let (line, begin_col) = (self.current.line, self.current.col);
        let mut end = (self.current.end_line, self.current.end_col);
        let mut parts = String::new();
        let mut expect_name = true;
        loop {
            let accepted = if expect_name {
                self.current.kind == TokenKind::Name
            } else {
                self.current.is_op("/") || self.current.is_op(".")
            };
            if !accepted {
                break;
            }
            parts.push_str(&self.current.text);
            end = (self.current.end_line, self.current.end_col);
            expect_name = !expect_name;
            self.advance_one()?;
        }
        self.skip_whitespace_and_comments()?;

        // Tokenizing drops whitespace, so compare against the raw source span.
        let untokenized: String = if end.0 == line {
            self.lexer
                .line_text(line)
                .chars()
                .skip(begin_col)
                .take(end.1.saturating_sub(begin_col))
                .collect()
        } else {
            String::new()
        };

        let mut components: Vec<&str> = parts.split('/').collect();
        let selector = components.pop().unwrap_or_default();
        let scope_valid = components.iter().all(|scope| {
            if allow_periods_in_scope {
                is_valid_selector(scope)
            } else {
                is_identifier(scope)
            }
        });
        let valid = scope_valid && is_valid_selector(selector) && (scoped || components.is_empty());
        if untokenized != parts || !valid {
            let location = self.lexer.location(line, Some(begin_col + 1));
            return Err(ParseError::new("Malformatted scope or selector.", location).into());
        }
        Ok(parts)
    }

    fn maybe_parse_container(&mut self) -> Result<Option<Value>, GimletError> {
        let close = match self.current.text.as_str() {
            "[" if self.current.kind == TokenKind::Op => "]",
            "(" if self.current.kind == TokenKind::Op => ")",
            "{" if self.current.kind == TokenKind::Op => "}",
            _ => return Ok(None),
        };
        self.advance()?;

        let mut items = Vec::new();
        let mut pairs = Vec::new();
        let mut saw_comma = false;
        while !self.current.is_op(close) {
            if close == "}" {
                let key = self.parse_value()?;
                if !self.current.is_op(":") {
                    return Err(self.syntax_error("Expected ':'."));
                }
                self.advance()?;
                pairs.push((key, self.parse_value()?));
            } else {
                items.push(self.parse_value()?);
            }

            if self.current.is_op(",") {
                saw_comma = true;
                self.advance()?;
            } else if !self.current.is_op(close) {
                return Err(self.syntax_error(&format!("Expected ',' or '{}'.", close)));
            }
        }
        self.advance()?;

        Ok(Some(match close {
            "]" => Value::List(items),
            "}" => Value::dict(pairs),
            // `(x)` is just x
            _ if items.len() == 1 && !saw_comma => items.remove(0),
            _ => Value::Tuple(items),
        }))
    }

    fn maybe_parse_basic_type(&mut self) -> Result<Option<Value>, GimletError> {
        let negative = self.current.is_op("-");
        if negative {
            self.advance()?;
        }

        let value = match &self.current.kind {
            TokenKind::Name if !negative => {
                let value = match self.current.text.as_str() {
                    "True" => Value::Bool(true),
                    "False" => Value::Bool(false),
                    "None" => Value::None,
                    other => {
                        return Err(self.syntax_error(&format!(
                            "Malformed literal.\n    Failed to parse token '{}'",
                            other
                        )))
                    }
                };
                self.advance()?;
                value
            }
            TokenKind::Number => {
                let text = if negative {
                    format!("-{}", self.current.text)
                } else {
                    self.current.text.clone()
                };
                let value = parse_number(&text).map_err(|message| {
                    self.syntax_error(&format!("{}\n    Failed to parse token '{}'", message, text))
                })?;
                self.advance()?;
                value
            }
            TokenKind::Str(_) if !negative => {
                // adjacent string literals concatenate
                let mut out = String::new();
                while let TokenKind::Str(s) = &self.current.kind {
                    out.push_str(s);
                    self.advance()?;
                }
                Value::Str(out)
            }
            _ if negative => return Err(self.syntax_error("Expected a number after '-'.")),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn maybe_parse_reference(&mut self) -> Result<Option<Value>, GimletError> {
        if !self.current.is_op("@") {
            return Ok(None);
        }
        let location = self.location(true);
        self.advance_one()?;
        let scoped_selector = self.parse_selector(true, true)?;

        let mut evaluate = false;
        if self.current.is_op("(") {
            evaluate = true;
            self.advance()?;
            if !self.current.is_op(")") {
                return Err(self.syntax_error("Expected ')'."));
            }
            self.advance_one()?;
        }
        self.skip_whitespace_and_comments()?;

        self.delegate
            .configurable_reference(&scoped_selector, evaluate)
            .map(Some)
            .map_err(|e| e.at(&location))
    }

    fn maybe_parse_macro(&mut self) -> Result<Option<Value>, GimletError> {
        if !self.current.is_op("%") {
            return Ok(None);
        }
        let location = self.location(true);
        self.advance_one()?;
        let scoped_name = self.parse_selector(true, true)?;

        self.delegate
            .macro_reference(&scoped_name)
            .map(Some)
            .map_err(|e| e.at(&location))
    }
}

impl Iterator for ConfigParser<'_> {
    type Item = Result<Statement, GimletError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_statement() {
            Ok(Some(statement)) => Some(Ok(statement)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Split `scope/selector.param` into its parts. No `.` means a macro binding.
fn split_binding_key(key: &str) -> (String, String, String) {
    let (scope, rest) = key.rsplit_once('/').unwrap_or(("", key));
    let (selector, param) = rest.rsplit_once('.').unwrap_or((rest, ""));
    (scope.to_string(), selector.to_string(), param.to_string())
}

fn parse_number(text: &str) -> Result<Value, String> {
    let clean = text.replace('_', "");
    let (negative, digits) = match clean.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, clean.as_str()),
    };
    if digits.ends_with(['j', 'J']) {
        return Err("Complex numbers are not supported.".to_string());
    }

    let lower = digits.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    let sign = if negative { "-" } else { "" };
    if let Some(radix) = radix {
        return i64::from_str_radix(&format!("{}{}", sign, &lower[2..]), radix)
            .map(Value::Int)
            .map_err(|e| format!("Invalid integer literal: {}", e));
    }

    if lower.contains(['.', 'e']) {
        return format!("{}{}", sign, lower)
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("Invalid float literal: {}", e));
    }

    if lower.len() > 1 && lower.starts_with('0') && lower.chars().any(|c| c != '0') {
        return Err("Leading zeros in decimal integer literals are not permitted.".to_string());
    }
    format!("{}{}", sign, lower)
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|e| format!("Invalid integer literal: {}", e))
}

/// Parse every statement in `text`.
pub fn parse_statements(
    text: &str,
    origin: Option<&str>,
    delegate: &dyn ParserDelegate,
) -> Result<Vec<Statement>, GimletError> {
    ConfigParser::new(text, origin, delegate)?.collect()
}

/// Parse `text` as exactly one value.
pub fn parse_value(text: &str, delegate: &dyn ParserDelegate) -> Result<Value, GimletError> {
    let mut parser = ConfigParser::new(text, None, delegate)?;
    parser.skip_whitespace_and_comments()?;
    let value = parser.parse_value()?;
    if !parser.at_end()? {
        return Err(parser.syntax_error("Unexpected trailing content."));
    }
    Ok(value)
}
