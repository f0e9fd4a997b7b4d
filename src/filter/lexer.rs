//! Token scanner for the argument region of a filter string.
//!
//! The type-query prefix is scanned directly by the parser; this lexer
//! handles everything from the opening parenthesis onward.

use crate::filter::expression::CompareOp;
use crate::utils::error::FilterParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Operator(CompareOp),
    Number(f64),
    Str(String),
    Regex { source: String, flags: String },
    Identifier(String),
    True,
    False,
    Null,
    Eof,
}

impl Token {
    /// Label used in "expected ..." error lists.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Operator(op) => format!("'{}'", op.symbol()),
            Token::Number(_) => "number".to_string(),
            Token::Str(_) => "string".to_string(),
            Token::Regex { .. } => "regex".to_string(),
            Token::Identifier(_) => "identifier".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

/// Build a parse error with line/column derived from the byte offset.
pub(crate) fn error_at(
    source: &str,
    offset: usize,
    message: String,
    expected: Vec<String>,
) -> FilterParseError {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let column = offset - prefix.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    FilterParseError {
        message,
        offset,
        line,
        column,
        expected,
    }
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Scans `source` starting at byte `start`; offsets in emitted tokens
    /// and errors index the full string.
    pub fn new(source: &'a str, start: usize) -> Self {
        Self { source, pos: start }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn error(&self, offset: usize, message: String, expected: Vec<String>) -> FilterParseError {
        error_at(self.source, offset, message, expected)
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, FilterParseError> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(ch) = self.bump() else {
            return Ok(SpannedToken {
                token: Token::Eof,
                offset,
            });
        };
        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '=' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::Operator(CompareOp::Eq)
                }
                Some('~') => {
                    self.bump();
                    Token::Operator(CompareOp::RegexMatch)
                }
                _ => {
                    return Err(self.error(
                        offset,
                        "unexpected '='".to_string(),
                        vec!["'=='".to_string(), "'=~'".to_string()],
                    ))
                }
            },
            '!' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::Operator(CompareOp::Ne)
                }
                Some('~') => {
                    self.bump();
                    Token::Operator(CompareOp::RegexNotMatch)
                }
                _ => {
                    return Err(self.error(
                        offset,
                        "unexpected '!'".to_string(),
                        vec!["'!='".to_string(), "'!~'".to_string()],
                    ))
                }
            },
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Operator(CompareOp::Lte)
                } else {
                    Token::Operator(CompareOp::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Operator(CompareOp::Gte)
                } else {
                    Token::Operator(CompareOp::Gt)
                }
            }
            '"' | '\'' => self.scan_string(offset, ch)?,
            '/' => self.scan_regex(offset)?,
            '-' | '0'..='9' => self.scan_number(offset, ch)?,
            c if is_identifier_start(c) => self.scan_identifier(offset, c),
            other => {
                return Err(self.error(offset, format!("unexpected character '{}'", other), vec![]))
            }
        };
        Ok(SpannedToken { token, offset })
    }

    fn scan_string(&mut self, offset: usize, quote: char) -> Result<Token, FilterParseError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(self.error(
                        offset,
                        "unterminated string".to_string(),
                        vec![format!("'{}'", quote)],
                    ))
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    None => {
                        return Err(self.error(
                            offset,
                            "unterminated string".to_string(),
                            vec![format!("'{}'", quote)],
                        ))
                    }
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(other) => text.push(other),
                },
                Some(other) => text.push(other),
            }
        }
        Ok(Token::Str(text))
    }

    fn scan_regex(&mut self, offset: usize) -> Result<Token, FilterParseError> {
        let mut source = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(self.error(
                        offset,
                        "unterminated regex".to_string(),
                        vec!["'/'".to_string()],
                    ))
                }
                Some('/') => break,
                Some('\\') => {
                    source.push('\\');
                    match self.bump() {
                        None => {
                            return Err(self.error(
                                offset,
                                "unterminated regex".to_string(),
                                vec!["'/'".to_string()],
                            ))
                        }
                        Some(escaped) => source.push(escaped),
                    }
                }
                Some(other) => source.push(other),
            }
        }
        let mut flags = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            flags.push(self.bump().unwrap_or_default());
        }
        Ok(Token::Regex { source, flags })
    }

    fn scan_number(&mut self, offset: usize, first: char) -> Result<Token, FilterParseError> {
        let mut text = String::new();
        text.push(first);
        if first == '-' && !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.error(offset, "unexpected '-'".to_string(), vec!["number".to_string()]));
        }
        // Hex literal, 0x prefix.
        if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.bump();
            let mut digits = String::new();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                digits.push(self.bump().unwrap_or_default());
            }
            if digits.is_empty() {
                return Err(self.error(
                    offset,
                    "malformed hex number".to_string(),
                    vec!["hex digit".to_string()],
                ));
            }
            let value = u64::from_str_radix(&digits, 16).map_err(|e| {
                self.error(offset, format!("malformed hex number: {}", e), vec![])
            })?;
            return Ok(Token::Number(value as f64));
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap_or_default());
        }
        if self.peek() == Some('.')
            && self.source[self.pos + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        {
            text.push(self.bump().unwrap_or_default());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap_or_default());
            }
        }
        let value: f64 = text
            .parse()
            .map_err(|e| self.error(offset, format!("malformed number: {}", e), vec![]))?;
        Ok(Token::Number(value))
    }

    fn scan_identifier(&mut self, _offset: usize, first: char) -> Token {
        let mut text = String::new();
        text.push(first);
        while self.peek().is_some_and(is_identifier_part) {
            text.push(self.bump().unwrap_or_default());
        }
        match text.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Identifier(text),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '@'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
