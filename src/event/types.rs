//! Event classes, behavior flags, argument schemas, and signature parsing.

use crate::utils::error::SignatureError;
use std::cell::Cell;
use std::fmt;

/// Behavior flags carried on an event type and cached on every record.
///
/// Stored as a plain bitset so they can be tested cheaply during the
/// rescoping pass and by filters.
pub mod event_flag {
    /// Event fires frequently enough that tooling may want to elide it.
    pub const HIGH_FREQUENCY: u16 = 1 << 1;

    /// Time under this scope is tracing overhead, not user code.
    pub const SYSTEM_TIME: u16 = 1 << 2;

    /// Bookkeeping event hidden from normal views and counts.
    pub const INTERNAL: u16 = 1 << 3;

    /// Event merges its payload into the enclosing scope's arguments.
    pub const APPEND_SCOPE_DATA: u16 = 1 << 4;

    /// Event is part of the built-in control vocabulary.
    pub const BUILTIN: u16 = 1 << 5;

    /// Event appends data to a flow rather than a scope.
    pub const APPEND_FLOW_DATA: u16 = 1 << 6;
}

/// Whether a type produces interval records or point records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// Timed interval with start and end; may contain children.
    Scope,
    /// Point in time with no duration.
    Instance,
}

/// Semantic type of a single event argument, as written in signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Bool,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float32,
    Ascii,
    Utf8,
    FlowId,
    Any,
    /// Repeated form, e.g. `uint8[]`.
    Sequence(Box<ArgType>),
}

impl ArgType {
    /// Resolve a signature type name, including the legacy aliases.
    pub fn parse(name: &str) -> Result<ArgType, SignatureError> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix("[]") {
            return Ok(ArgType::Sequence(Box::new(ArgType::parse(inner)?)));
        }
        match name {
            "bool" => Ok(ArgType::Bool),
            "int8" | "byte" => Ok(ArgType::Int8),
            "int16" | "short" => Ok(ArgType::Int16),
            "int32" | "long" => Ok(ArgType::Int32),
            "uint8" | "octet" => Ok(ArgType::Uint8),
            "uint16" | "unsigned short" => Ok(ArgType::Uint16),
            "uint32" | "unsigned long" => Ok(ArgType::Uint32),
            "float32" | "float" => Ok(ArgType::Float32),
            "ascii" => Ok(ArgType::Ascii),
            "utf8" | "DOMString" => Ok(ArgType::Utf8),
            "flowId" => Ok(ArgType::FlowId),
            "any" => Ok(ArgType::Any),
            other => Err(SignatureError::UnknownArgType(other.to_string())),
        }
    }
}

/// One named argument in an event type's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name as written in the signature.
    pub name: String,

    /// Semantic type.
    pub arg_type: ArgType,

    /// Wire slot. Assigned in declaration order unless the signature pins
    /// one with an `@n` specifier.
    pub ordinal: usize,
}

/// A registered event type.
///
/// Instances live behind `Rc` handles owned by the [`EventTypeTable`];
/// re-registering a name hands back the same instance.
///
/// [`EventTypeTable`]: crate::event::EventTypeTable
#[derive(Debug)]
pub struct EventType {
    /// 1-based id assigned by the table on first registration.
    /// 0 until registered.
    pub id: u16,

    /// Globally unique name, e.g. `my.class#method`.
    pub name: String,

    /// Scope or instance.
    pub class: EventClass,

    /// Bitset of [`event_flag`] values.
    pub flags: u16,

    /// Ordered argument schema.
    pub args: Vec<ArgSpec>,

    /// Set when an append-data record has ever targeted this type, so
    /// argument rendering knows to look for non-schema keys.
    pub may_have_appended_args: Cell<bool>,
}

impl EventType {
    /// Create an unregistered type from its parts.
    pub fn new(name: impl Into<String>, class: EventClass, flags: u16, args: Vec<ArgSpec>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            class,
            flags,
            args,
            may_have_appended_args: Cell::new(false),
        }
    }

    /// Parse a scope type from a signature string.
    ///
    /// # Arguments
    /// * `signature` - e.g. `"my.class#method(uint32 count, ascii name)"`
    /// * `flags` - bitset of [`event_flag`] values, 0 for none
    pub fn create_scope(signature: &str, flags: u16) -> Result<EventType, SignatureError> {
        let (name, args) = parse_signature(signature)?;
        Ok(EventType::new(name, EventClass::Scope, flags, args))
    }

    /// Parse an instance type from a signature string.
    pub fn create_instance(signature: &str, flags: u16) -> Result<EventType, SignatureError> {
        let (name, args) = parse_signature(signature)?;
        Ok(EventType::new(name, EventClass::Instance, flags, args))
    }

    /// Whether this type carries the given flag.
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Parse `name(type arg, type arg@ordinal, ...)` into a name and schema.
///
/// A bare `name` with no parenthesis is an argument-free signature.
fn parse_signature(signature: &str) -> Result<(String, Vec<ArgSpec>), SignatureError> {
    let signature = signature.trim();
    let (name, arg_text) = match signature.find('(') {
        Some(open) => {
            let close = signature
                .rfind(')')
                .ok_or_else(|| SignatureError::Malformed(signature.to_string()))?;
            if close < open {
                return Err(SignatureError::Malformed(signature.to_string()));
            }
            (&signature[..open], &signature[open + 1..close])
        }
        None => (signature, ""),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(SignatureError::Malformed(signature.to_string()));
    }

    let mut args = Vec::new();
    for (index, part) in arg_text.split(',').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        // Ordinal specifier pins the wire slot: "uint32 count@4".
        let (decl, ordinal) = match part.split_once('@') {
            Some((decl, ord)) => {
                let ordinal = ord.trim().parse::<usize>().map_err(|_| {
                    SignatureError::Malformed(format!("bad ordinal in '{}'", part))
                })?;
                (decl.trim(), ordinal)
            }
            None => (part, index),
        };

        // The argument name is the last token; the type may contain spaces
        // ("unsigned long total").
        let (type_name, arg_name) = decl
            .rsplit_once(|c: char| c.is_whitespace())
            .ok_or_else(|| SignatureError::Malformed(format!("bad argument '{}'", part)))?;
        let arg_name = arg_name.trim();
        if arg_name.is_empty() || !arg_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(SignatureError::Malformed(format!("bad argument '{}'", part)));
        }

        args.push(ArgSpec {
            name: arg_name.to_string(),
            arg_type: ArgType::parse(type_name)?,
            ordinal,
        });
    }

    Ok((name.to_string(), args))
}

/// Builtin control vocabulary: signature, class, flags.
/// The rescoping pass and the ancillary indices key off these names.
const BUILTIN_DEFINITIONS: &[(&str, EventClass, u16)] = {
    use event_flag::*;
    &[
        (
            "wtf.event#define(uint16 wireId, uint16 eventClass, uint32 flags, ascii name, ascii args)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        ("wtf.trace#discontinuity()", EventClass::Instance, BUILTIN),
        (
            "wtf.zone#create(uint16 zoneId, ascii name, ascii type, ascii location)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        ("wtf.zone#delete(uint16 zoneId)", EventClass::Instance, BUILTIN | INTERNAL),
        ("wtf.zone#set(uint16 zoneId)", EventClass::Instance, BUILTIN | INTERNAL),
        ("wtf.scope#enter(ascii name)", EventClass::Scope, BUILTIN),
        (
            "wtf.scope#enterTracing()",
            EventClass::Scope,
            BUILTIN | INTERNAL | SYSTEM_TIME,
        ),
        ("wtf.scope#leave()", EventClass::Instance, BUILTIN | INTERNAL),
        (
            "wtf.scope#appendData(ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL | APPEND_SCOPE_DATA,
        ),
        (
            "wtf.flow#branch(flowId id, flowId parentId, ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        (
            "wtf.flow#extend(flowId id, ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        (
            "wtf.flow#terminate(flowId id, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        (
            "wtf.flow#appendData(flowId id, ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL | APPEND_FLOW_DATA,
        ),
        (
            "wtf.trace#mark(ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        (
            "wtf.trace#timeStamp(ascii name, any value)",
            EventClass::Instance,
            BUILTIN,
        ),
        (
            "wtf.timeRange#begin(uint32 id, ascii name, any value)",
            EventClass::Instance,
            BUILTIN | INTERNAL,
        ),
        ("wtf.timeRange#end(uint32 id)", EventClass::Instance, BUILTIN | INTERNAL),
        ("wtf.timing#frameStart(uint32 number)", EventClass::Instance, INTERNAL),
        ("wtf.timing#frameEnd(uint32 number)", EventClass::Instance, INTERNAL),
    ]
};

/// Parse the builtin control vocabulary. A definition that fails to parse
/// is skipped with an error log; the list above is static and covered by
/// tests, so this never fires in practice.
pub fn builtin_types() -> Vec<EventType> {
    let mut types = Vec::with_capacity(BUILTIN_DEFINITIONS.len());
    for &(signature, class, flags) in BUILTIN_DEFINITIONS {
        let parsed = match class {
            EventClass::Scope => EventType::create_scope(signature, flags),
            EventClass::Instance => EventType::create_instance(signature, flags),
        };
        match parsed {
            Ok(ty) => types.push(ty),
            Err(err) => log::error!("Bad builtin definition '{}': {}", signature, err),
        }
    }
    types
}
