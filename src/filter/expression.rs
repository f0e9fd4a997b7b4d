//! Compiled filter expressions.
//!
//! A parsed filter is a pair of predicates: a type query matched against
//! event type names and an optional list of argument clauses evaluated
//! against each record's decoded arguments and pseudo-attributes.

use crate::event::EventType;
use crate::store::EventIterator;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators accepted between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    RegexMatch,
    RegexNotMatch,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::RegexMatch => "=~",
            CompareOp::RegexNotMatch => "!~",
        }
    }
}

/// A `/source/flags` literal with its compiled form.
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    pub source: String,
    pub flags: String,
    pub regex: Regex,
}

/// One step of a reference access chain: `.name` or `[key]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Member(String),
    Index(u64),
}

/// A dotted/indexed path into a record's argument payload, or a leading-`@`
/// pseudo-attribute resolved against the iterator itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub base: String,
    pub path: Vec<Access>,
}

/// Pseudo-attribute names accepted after `@`.
pub const PSEUDO_ATTRIBUTES: &[&str] =
    &["@time", "@duration", "@userDuration", "@ownDuration", "@flowId"];

/// One side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(Value),
    Regex(RegexLiteral),
    Reference(Reference),
}

/// A single `lhs op rhs` clause; clauses in a filter are ANDed.
#[derive(Debug, Clone)]
pub struct ArgumentClause {
    pub lhs: Operand,
    pub op: CompareOp,
    pub rhs: Operand,
}

/// The type-name half of a filter.
#[derive(Debug, Clone)]
pub enum TypeQuery {
    /// Case-insensitive substring match.
    Substring { text: String, regex: Regex },
    /// Explicit `/regex/flags` match.
    Pattern(RegexLiteral),
}

impl TypeQuery {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            TypeQuery::Substring { regex, .. } => regex.is_match(name),
            TypeQuery::Pattern(literal) => literal.regex.is_match(name),
        }
    }
}

/// A fully parsed filter expression.
///
/// `arg_query` distinguishes "no argument clause at all" (`None`) from an
/// empty clause list (`Some(vec![])`, written `name()`); both accept every
/// record, but the distinction survives for callers inspecting the parse.
#[derive(Debug, Clone, Default)]
pub struct FilterExpression {
    pub type_query: Option<TypeQuery>,
    pub arg_query: Option<Vec<ArgumentClause>>,
}

impl FilterExpression {
    /// Whether the given event type passes the type-name predicate.
    pub fn match_event_type(&self, event_type: &EventType) -> bool {
        match &self.type_query {
            Some(query) => query.matches(&event_type.name),
            None => true,
        }
    }

    pub fn has_argument_clauses(&self) -> bool {
        self.arg_query.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Whether the record under the iterator passes every argument clause.
    pub fn match_arguments(&self, it: &EventIterator<'_>) -> bool {
        match &self.arg_query {
            Some(clauses) => clauses.iter().all(|clause| clause.evaluate(it)),
            None => true,
        }
    }
}

impl ArgumentClause {
    /// Evaluate this clause against the record under the iterator.
    ///
    /// A reference that resolves to nothing compares equal to `null` and
    /// fails every ordering and regex-match test.
    pub fn evaluate(&self, it: &EventIterator<'_>) -> bool {
        match self.op {
            CompareOp::RegexMatch | CompareOp::RegexNotMatch => {
                let (literal, operand) = match (&self.lhs, &self.rhs) {
                    (_, Operand::Regex(literal)) => (literal, &self.lhs),
                    (Operand::Regex(literal), _) => (literal, &self.rhs),
                    _ => return false,
                };
                let matched = resolve_text(operand, it)
                    .map(|text| literal.regex.is_match(&text))
                    .unwrap_or(false);
                if self.op == CompareOp::RegexMatch {
                    matched
                } else {
                    !matched
                }
            }
            CompareOp::Eq | CompareOp::Ne => {
                let lhs = resolve(&self.lhs, it).unwrap_or(Value::Null);
                let rhs = resolve(&self.rhs, it).unwrap_or(Value::Null);
                let equal = value_equals(&lhs, &rhs);
                if self.op == CompareOp::Eq {
                    equal
                } else {
                    !equal
                }
            }
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                let (Some(lhs), Some(rhs)) = (resolve(&self.lhs, it), resolve(&self.rhs, it))
                else {
                    return false;
                };
                match compare_order(&lhs, &rhs) {
                    Some(Ordering::Less) => {
                        self.op == CompareOp::Lt || self.op == CompareOp::Lte
                    }
                    Some(Ordering::Equal) => {
                        self.op == CompareOp::Lte || self.op == CompareOp::Gte
                    }
                    Some(Ordering::Greater) => {
                        self.op == CompareOp::Gt || self.op == CompareOp::Gte
                    }
                    None => false,
                }
            }
        }
    }
}

/// Resolve an operand to a plain JSON value, or `None` when it does not
/// exist for this record (absent argument, regex operand).
fn resolve(operand: &Operand, it: &EventIterator<'_>) -> Option<Value> {
    match operand {
        Operand::Literal(value) => Some(value.clone()),
        Operand::Regex(_) => None,
        Operand::Reference(reference) => resolve_reference(reference, it),
    }
}

fn resolve_reference(reference: &Reference, it: &EventIterator<'_>) -> Option<Value> {
    let mut value = if reference.base.starts_with('@') {
        resolve_pseudo_attribute(&reference.base, it)?
    } else {
        it.argument(&reference.base)?
    };
    for access in &reference.path {
        value = match access {
            Access::Member(name) => match &value {
                Value::Object(map) => map.get(name)?.clone(),
                Value::Array(items) => {
                    let index: usize = name.parse().ok()?;
                    items.get(index)?.clone()
                }
                _ => return None,
            },
            Access::Index(index) => match &value {
                Value::Array(items) => items.get(*index as usize)?.clone(),
                Value::Object(map) => map.get(&index.to_string())?.clone(),
                _ => return None,
            },
        };
    }
    Some(value)
}

fn resolve_pseudo_attribute(name: &str, it: &EventIterator<'_>) -> Option<Value> {
    match name {
        "@time" => number(it.time()),
        "@duration" => number(it.total_duration()),
        "@userDuration" => number(it.user_duration()),
        "@ownDuration" => number(it.own_duration()),
        "@flowId" => Some(Value::from(it.child_flow_id())),
        _ => None,
    }
}

fn number(value: f64) -> Option<Value> {
    serde_json::Number::from_f64(value).map(Value::Number)
}

/// Text form used for regex matching: strings match their contents, other
/// values match their JSON rendering.
fn resolve_text(operand: &Operand, it: &EventIterator<'_>) -> Option<String> {
    match resolve(operand, it)? {
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Deep equality with numeric coercion, so `5` and `5.0` compare equal no
/// matter which representation the decoder produced.
fn value_equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| value_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| value_equals(x, y)))
        }
        _ => lhs == rhs,
    }
}

/// Ordering is defined for number pairs and string pairs only.
fn compare_order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl fmt::Display for TypeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeQuery::Substring { text, .. } => write!(f, "/{}/i", regex::escape(text)),
            TypeQuery::Pattern(literal) => write!(f, "/{}/{}", literal.source, literal.flags),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for access in &self.path {
            match access {
                Access::Member(name) if is_plain_identifier(name) => write!(f, ".{}", name)?,
                Access::Member(name) => write!(f, "[{:?}]", name)?,
                Access::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Regex(literal) => write!(f, "/{}/{}", literal.source, literal.flags),
            Operand::Reference(reference) => write!(f, "{}", reference),
        }
    }
}

impl fmt::Display for ArgumentClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.symbol(), self.rhs)
    }
}

/// Debugging rendering of the compiled form: the substring query shows
/// up as the regex it compiled into.
impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(query) = &self.type_query {
            write!(f, "{}", query)?;
        }
        if let Some(clauses) = &self.arg_query {
            f.write_str("(")?;
            for (n, clause) in clauses.iter().enumerate() {
                if n > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", clause)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
