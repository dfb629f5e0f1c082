//! Tokenizer for config text
//!
//! Produces the token stream the recursive-descent parser consumes:
//! - Names, numbers, strings (with escapes decoded) and single-char operators
//! - `Newline` ends a logical line; `Nl` is a newline inside brackets or on a
//!   blank/comment-only line
//! - Backslash-newline joins physical lines

use crate::error::{Location, ParseError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    /// Decoded string contents; `Token::text` keeps the raw source.
    Str(String),
    Op,
    Comment,
    Newline,
    Nl,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 0-based column (in chars) of the first character.
    pub col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_name(&self, name: &str) -> bool {
        self.kind == TokenKind::Name && self.text == name
    }
}

pub(crate) struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    lines: Vec<String>,
    origin: Option<String>,
    depth: usize,
    line_has_content: bool,
}

impl Lexer {
    pub fn new(text: &str, origin: Option<String>) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
            origin,
            depth: 0,
            line_has_content: false,
        }
    }

    /// Raw text of a 1-based line, including its trailing newline.
    pub fn line_text(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn location(&self, line: usize, column: Option<usize>) -> Location {
        Location::new(self.origin.clone(), line, column, self.line_text(line))
    }

    fn error(&self, message: impl Into<String>, line: usize, col: usize) -> ParseError {
        ParseError::new(message, self.location(line, Some(col + 1)))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn token(&self, kind: TokenKind, start: usize, line: usize, col: usize) -> Token {
        Token {
            kind,
            text: self.chars[start..self.pos].iter().collect(),
            line,
            col,
            end_line: self.line,
            end_col: self.col,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            while matches!(self.peek(), Some(' ' | '\t' | '\x0c')) {
                self.bump();
            }

            let (start, line, col) = (self.pos, self.line, self.col);
            let Some(c) = self.peek() else {
                if self.depth > 0 {
                    return Err(self.error("EOF in multi-line statement.", line, col));
                }
                if self.line_has_content {
                    self.line_has_content = false;
                    return Ok(self.token(TokenKind::Newline, start, line, col));
                }
                return Ok(self.token(TokenKind::Eof, start, line, col));
            };

            match c {
                '#' => {
                    while !matches!(self.peek(), None | Some('\n' | '\r')) {
                        self.bump();
                    }
                    return Ok(self.token(TokenKind::Comment, start, line, col));
                }
                '\n' | '\r' => {
                    if c == '\r' {
                        self.pos += 1;
                        self.col += 1;
                    }
                    if self.peek() == Some('\n') {
                        self.bump();
                    } else {
                        self.line += 1;
                        self.col = 0;
                    }
                    let kind = if self.depth == 0 && self.line_has_content {
                        self.line_has_content = false;
                        TokenKind::Newline
                    } else {
                        TokenKind::Nl
                    };
                    let mut token = self.token(kind, start, line, col);
                    token.end_line = line;
                    token.end_col = col + 1;
                    return Ok(token);
                }
                '\\' => {
                    match (self.peek_at(1), self.peek_at(2)) {
                        (Some('\n'), _) => {
                            self.bump();
                            self.bump();
                        }
                        (Some('\r'), Some('\n')) => {
                            self.bump();
                            self.bump();
                            self.bump();
                        }
                        _ => {
                            return Err(self.error(
                                "Unexpected character after line continuation character.",
                                line,
                                col,
                            ))
                        }
                    }
                    continue;
                }
                _ => {}
            }

            self.line_has_content = true;
            if c.is_alphabetic() || c == '_' {
                return self.name_or_string(start, line, col);
            }
            let fraction = c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit());
            if c.is_ascii_digit() || fraction {
                return Ok(self.number(start, line, col));
            }
            if c == '\'' || c == '"' {
                return self.string(false, start, line, col);
            }

            self.bump();
            match c {
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            return Ok(self.token(TokenKind::Op, start, line, col));
        }
    }

    fn name_or_string(
        &mut self,
        start: usize,
        line: usize,
        col: usize,
    ) -> Result<Token, ParseError> {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        if matches!(self.peek(), Some('\'' | '"')) {
            let prefix = self.chars[start..self.pos]
                .iter()
                .collect::<String>()
                .to_lowercase();
            match prefix.as_str() {
                "r" => return self.string(true, start, line, col),
                "u" => return self.string(false, start, line, col),
                "b" | "br" | "rb" => {
                    return Err(self.error("Bytes literals are not supported.", line, col))
                }
                "f" | "fr" | "rf" => {
                    let message = "Formatted string literals are not supported.";
                    return Err(self.error(message, line, col));
                }
                _ => {}
            }
        }
        Ok(self.token(TokenKind::Name, start, line, col))
    }

    fn number(&mut self, start: usize, line: usize, col: usize) -> Token {
        let radix_prefix = self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));
        if radix_prefix {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.bump();
            }
            return self.token(TokenKind::Number, start, line, col);
        }

        self.digits();
        if self.peek() == Some('.') {
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent = match self.peek_at(1) {
                Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.digits();
            }
        }
        if matches!(self.peek(), Some('j' | 'J')) {
            self.bump();
        }
        self.token(TokenKind::Number, start, line, col)
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    /// Scan a string literal whose opening quote is at the current position.
    fn string(
        &mut self,
        raw: bool,
        start: usize,
        line: usize,
        col: usize,
    ) -> Result<Token, ParseError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("Expected string.", line, col));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            match self.bump() {
                None if triple => {
                    let message = "EOF while scanning triple-quoted string literal.";
                    return Err(self.error(message, line, col));
                }
                None | Some('\n') if !triple => {
                    return Err(self.error("EOL while scanning string literal.", line, col))
                }
                Some(c) if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                Some('\\') if raw => {
                    value.push('\\');
                    match self.bump() {
                        Some(c) => value.push(c),
                        None => {
                            return Err(self.error("EOL while scanning string literal.", line, col))
                        }
                    }
                }
                Some('\\') => self.escape(&mut value, line, col)?,
                Some(c) => value.push(c),
                None => unreachable!("handled above"),
            }
        }
        Ok(self.token(TokenKind::Str(value), start, line, col))
    }

    fn escape(&mut self, out: &mut String, line: usize, col: usize) -> Result<(), ParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("EOL while scanning string literal.", line, col));
        };
        match c {
            '\n' => {}
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            '\\' | '\'' | '"' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(self.char_from(code, line, col)?);
            }
            'x' | 'u' | 'U' => {
                let width = match c {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut code = 0u32;
                for _ in 0..width {
                    match self.peek().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            code = code * 16 + d;
                            self.bump();
                        }
                        None => {
                            return Err(self.error(format!("Truncated \\{} escape.", c), line, col));
                        }
                    }
                }
                out.push(self.char_from(code, line, col)?);
            }
            'N' => return Err(self.error("Named unicode escapes are not supported.", line, col)),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn char_from(&self, code: u32, line: usize, col: usize) -> Result<char, ParseError> {
        char::from_u32(code).ok_or_else(|| {
            self.error(format!("Invalid character code {:#x} in escape.", code), line, col)
        })
    }
}
