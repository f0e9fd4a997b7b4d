//! Recursive-descent parser for filter strings.
//!
//! Grammar:
//!
//! ```text
//! filter     := type-query? arguments?
//! type-query := substring | quoted-string | /regex/flags
//! arguments  := "(" (clause ("," clause)*)? ")"
//! clause     := value op value
//! op         := == | != | < | <= | > | >= | =~ | !~
//! value      := number | string | boolean | null | regex | array | object
//!             | reference
//! reference  := identifier ("." identifier | "[" (number | string) "]")*
//! ```
//!
//! A bare (unquoted) type query runs to the first `(` or the end of the
//! string; quoted and regex forms let the query contain parentheses.

use crate::filter::expression::{
    Access, ArgumentClause, FilterExpression, Operand, Reference, RegexLiteral, TypeQuery,
    PSEUDO_ATTRIBUTES,
};
use crate::filter::lexer::{error_at, Lexer, SpannedToken, Token};
use crate::utils::error::FilterParseError;
use regex::RegexBuilder;
use serde_json::Value;
use std::mem;

/// Parse a trimmed, non-empty filter string into an expression.
///
/// **Private** to the filter module; `Filter::set_from_string` is the
/// public entry point.
pub(crate) fn parse_filter(source: &str) -> Result<FilterExpression, FilterParseError> {
    if source.is_empty() {
        return Err(error_at(
            source,
            0,
            "filter expression expected".to_string(),
            vec!["type query".to_string(), "'('".to_string()],
        ));
    }

    let mut lexer = Lexer::new(source, 0);
    let type_query = match source.chars().next() {
        Some('/') | Some('"') | Some('\'') => {
            let spanned = lexer.next_token()?;
            match spanned.token {
                Token::Regex {
                    source: pattern,
                    flags,
                } => Some(TypeQuery::Pattern(compile_regex(
                    source,
                    &pattern,
                    &flags,
                    spanned.offset,
                )?)),
                Token::Str(text) => Some(substring_query(source, &text, spanned.offset)?),
                other => {
                    return Err(error_at(
                        source,
                        spanned.offset,
                        format!("unexpected {}", other.describe()),
                        vec!["type query".to_string()],
                    ))
                }
            }
        }
        Some('(') => None,
        _ => {
            let end = source.find('(').unwrap_or(source.len());
            let text = source[..end].trim_end();
            lexer = Lexer::new(source, end);
            if text.is_empty() {
                None
            } else {
                Some(substring_query(source, text, 0)?)
            }
        }
    };

    let mut parser = Parser::new(source, lexer)?;
    let arg_query = match parser.current.token {
        Token::Eof => None,
        Token::LParen => {
            parser.advance()?;
            Some(parser.parse_clauses()?)
        }
        _ => {
            return Err(parser.error(vec!["'('".to_string(), "end of input".to_string()]));
        }
    };
    if parser.current.token != Token::Eof {
        return Err(parser.error(vec!["end of input".to_string()]));
    }

    Ok(FilterExpression {
        type_query,
        arg_query,
    })
}

/// Build the case-insensitive substring matcher for a type query.
fn substring_query(
    source: &str,
    text: &str,
    offset: usize,
) -> Result<TypeQuery, FilterParseError> {
    let regex = RegexBuilder::new(&regex::escape(text))
        .case_insensitive(true)
        .build()
        .map_err(|e| error_at(source, offset, format!("invalid type query: {}", e), Vec::new()))?;
    Ok(TypeQuery::Substring {
        text: text.to_string(),
        regex,
    })
}

/// Compile a `/pattern/flags` literal. Flags `i` and `m` are honored, `g`
/// is accepted for familiarity and ignored.
fn compile_regex(
    source: &str,
    pattern: &str,
    flags: &str,
    offset: usize,
) -> Result<RegexLiteral, FilterParseError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            'g' => {}
            other => {
                return Err(error_at(
                    source,
                    offset,
                    format!("unknown regex flag '{}'", other),
                    vec!["'g'".to_string(), "'i'".to_string(), "'m'".to_string()],
                ))
            }
        }
    }
    let regex = builder.build().map_err(|e| {
        error_at(
            source,
            offset,
            format!("invalid regular expression: {}", e),
            Vec::new(),
        )
    })?;
    Ok(RegexLiteral {
        source: pattern.to_string(),
        flags: flags.to_string(),
        regex,
    })
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    current: SpannedToken,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, mut lexer: Lexer<'a>) -> Result<Self, FilterParseError> {
        let current = lexer.next_token()?;
        Ok(Self {
            source,
            lexer,
            current,
        })
    }

    /// Consume the current token, returning it, and pull the next one.
    fn advance(&mut self) -> Result<SpannedToken, FilterParseError> {
        let next = self.lexer.next_token()?;
        Ok(mem::replace(&mut self.current, next))
    }

    fn error(&self, expected: Vec<String>) -> FilterParseError {
        error_at(
            self.source,
            self.current.offset,
            format!("unexpected {}", self.current.token.describe()),
            expected,
        )
    }

    /// Clause list body; the opening paren has already been consumed.
    fn parse_clauses(&mut self) -> Result<Vec<ArgumentClause>, FilterParseError> {
        let mut clauses = Vec::new();
        if self.current.token == Token::RParen {
            self.advance()?;
            return Ok(clauses);
        }
        loop {
            clauses.push(self.parse_clause()?);
            match self.current.token {
                Token::Comma => {
                    self.advance()?;
                }
                Token::RParen => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.error(vec!["','".to_string(), "')'".to_string()])),
            }
        }
        Ok(clauses)
    }

    fn parse_clause(&mut self) -> Result<ArgumentClause, FilterParseError> {
        let lhs = self.parse_value()?;
        let op = match self.current.token {
            Token::Operator(op) => op,
            _ => return Err(self.error(vec!["comparison operator".to_string()])),
        };
        self.advance()?;
        let rhs = self.parse_value()?;
        Ok(ArgumentClause { lhs, op, rhs })
    }

    fn parse_value(&mut self) -> Result<Operand, FilterParseError> {
        match self.current.token.clone() {
            Token::Number(value) => {
                self.advance()?;
                Ok(Operand::Literal(number_value(value)))
            }
            Token::Str(text) => {
                self.advance()?;
                Ok(Operand::Literal(Value::String(text)))
            }
            Token::True => {
                self.advance()?;
                Ok(Operand::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(Operand::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance()?;
                Ok(Operand::Literal(Value::Null))
            }
            Token::Regex {
                source: pattern,
                flags,
            } => {
                let offset = self.current.offset;
                self.advance()?;
                Ok(Operand::Regex(compile_regex(
                    self.source,
                    &pattern,
                    &flags,
                    offset,
                )?))
            }
            Token::LBracket | Token::LBrace => Ok(Operand::Literal(self.parse_literal_value()?)),
            Token::Identifier(name) => self.parse_reference(name),
            _ => Err(self.error(vec!["value".to_string()])),
        }
    }

    /// Literal JSON values only; references and regexes are not allowed
    /// inside arrays or objects.
    fn parse_literal_value(&mut self) -> Result<Value, FilterParseError> {
        match self.current.token.clone() {
            Token::Number(value) => {
                self.advance()?;
                Ok(number_value(value))
            }
            Token::Str(text) => {
                self.advance()?;
                Ok(Value::String(text))
            }
            Token::True => {
                self.advance()?;
                Ok(Value::Bool(true))
            }
            Token::False => {
                self.advance()?;
                Ok(Value::Bool(false))
            }
            Token::Null => {
                self.advance()?;
                Ok(Value::Null)
            }
            Token::LBracket => {
                self.advance()?;
                let mut items = Vec::new();
                if self.current.token == Token::RBracket {
                    self.advance()?;
                    return Ok(Value::Array(items));
                }
                loop {
                    items.push(self.parse_literal_value()?);
                    match self.current.token {
                        Token::Comma => {
                            self.advance()?;
                        }
                        Token::RBracket => {
                            self.advance()?;
                            break;
                        }
                        _ => return Err(self.error(vec!["','".to_string(), "']'".to_string()])),
                    }
                }
                Ok(Value::Array(items))
            }
            Token::LBrace => {
                self.advance()?;
                let mut map = serde_json::Map::new();
                if self.current.token == Token::RBrace {
                    self.advance()?;
                    return Ok(Value::Object(map));
                }
                loop {
                    let key = match self.current.token.clone() {
                        Token::Str(text) => text,
                        Token::Identifier(name) => name,
                        _ => return Err(self.error(vec!["string key".to_string()])),
                    };
                    self.advance()?;
                    if self.current.token != Token::Colon {
                        return Err(self.error(vec!["':'".to_string()]));
                    }
                    self.advance()?;
                    let value = self.parse_literal_value()?;
                    map.insert(key, value);
                    match self.current.token {
                        Token::Comma => {
                            self.advance()?;
                        }
                        Token::RBrace => {
                            self.advance()?;
                            break;
                        }
                        _ => return Err(self.error(vec!["','".to_string(), "'}'".to_string()])),
                    }
                }
                Ok(Value::Object(map))
            }
            _ => Err(self.error(vec!["literal value".to_string()])),
        }
    }

    fn parse_reference(&mut self, base: String) -> Result<Operand, FilterParseError> {
        if base.starts_with('@') && !PSEUDO_ATTRIBUTES.contains(&base.as_str()) {
            return Err(error_at(
                self.source,
                self.current.offset,
                format!("unknown pseudo-attribute '{}'", base),
                PSEUDO_ATTRIBUTES
                    .iter()
                    .map(|name| format!("'{}'", name))
                    .collect(),
            ));
        }
        self.advance()?;
        let mut path = Vec::new();
        loop {
            match self.current.token.clone() {
                Token::Dot => {
                    self.advance()?;
                    let Token::Identifier(name) = self.current.token.clone() else {
                        return Err(self.error(vec!["identifier".to_string()]));
                    };
                    self.advance()?;
                    path.push(Access::Member(name));
                }
                Token::LBracket => {
                    self.advance()?;
                    let access = match self.current.token.clone() {
                        Token::Number(value) if value >= 0.0 && value.fract() == 0.0 => {
                            Access::Index(value as u64)
                        }
                        Token::Str(text) => Access::Member(text),
                        _ => {
                            return Err(self.error(vec![
                                "unsigned integer".to_string(),
                                "string".to_string(),
                            ]))
                        }
                    };
                    self.advance()?;
                    if self.current.token != Token::RBracket {
                        return Err(self.error(vec!["']'".to_string()]));
                    }
                    self.advance()?;
                    path.push(access);
                }
                _ => break,
            }
        }
        Ok(Operand::Reference(Reference { base, path }))
    }
}
