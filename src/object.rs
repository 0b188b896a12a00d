//! Object kinds and attribute values
//!
//! Every relation points at either a source row or a literal row. This
//! module has the discriminant ([`ObjectKind`]), the raw stored reference
//! ([`ObjectRef`]), the shared handle for in-memory sources ([`SourceRef`])
//! and the resolved value forms handed to callers.

use crate::literal::{LiteralValue, ParsedLiteral};
use crate::source::Source;
use crate::uri::SourceUri;
use crate::{Error, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

// ========== Object Kind ==========

/// Discriminant for what a relation's object points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The object is another source
    Source,
    /// The object is a literal value
    Literal,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Source => "source",
            ObjectKind::Literal => "literal",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(ObjectKind::Source),
            "literal" => Ok(ObjectKind::Literal),
            _ => Err(Error::InvalidArgument(format!("unknown object kind: {s}"))),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored object reference: the row id plus which table it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Source(i64),
    Literal(i64),
}

impl ObjectRef {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Source(_) => ObjectKind::Source,
            ObjectRef::Literal(_) => ObjectKind::Literal,
        }
    }

    pub fn object_id(&self) -> i64 {
        match self {
            ObjectRef::Source(id) | ObjectRef::Literal(id) => *id,
        }
    }
}

// ========== Source Handle ==========

/// Shared mutable handle to an in-memory [`Source`].
///
/// Values pulled out of attribute collections and entries in the unsaved
/// identity map alias the same source, so that an id assigned at save time
/// is visible everywhere at once. Single-threaded by design.
#[derive(Clone)]
pub struct SourceRef(Rc<RefCell<Source>>);

impl SourceRef {
    pub fn new(source: Source) -> Self {
        Self(Rc::new(RefCell::new(source)))
    }

    /// The wrapped source's URI (cloned out of the cell)
    pub fn uri(&self) -> SourceUri {
        self.0.borrow().uri().clone()
    }

    /// The wrapped source's row id, if persisted
    pub fn id(&self) -> Option<i64> {
        self.0.borrow().id()
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    pub fn borrow(&self) -> Ref<'_, Source> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Source> {
        self.0.borrow_mut()
    }

    /// Whether two handles alias the same cell
    pub fn ptr_eq(&self, other: &SourceRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRef")
            .field("uri", &self.uri())
            .field("id", &self.id())
            .finish()
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

// ========== Resolved Values ==========

/// An attribute object resolved against the store.
///
/// `Class` is the reference-only form: the object is a source but only its
/// URI is materialized, never a full handle.
#[derive(Debug, Clone)]
pub enum SemanticObject {
    Source(SourceRef),
    Class(SourceUri),
    Literal(LiteralValue),
}

impl SemanticObject {
    /// The URI if this object is source-shaped
    pub fn as_uri(&self) -> Option<SourceUri> {
        match self {
            SemanticObject::Source(r) => Some(r.uri()),
            SemanticObject::Class(uri) => Some(uri.clone()),
            SemanticObject::Literal(_) => None,
        }
    }
}

/// An attribute value as handed to callers: literals come parsed.
#[derive(Debug, Clone)]
pub enum SemanticValue {
    Source(SourceRef),
    Class(SourceUri),
    Literal(ParsedLiteral),
}

impl SemanticValue {
    pub fn as_uri(&self) -> Option<SourceUri> {
        match self {
            SemanticValue::Source(r) => Some(r.uri()),
            SemanticValue::Class(uri) => Some(uri.clone()),
            SemanticValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&ParsedLiteral> {
        match self {
            SemanticValue::Literal(p) => Some(p),
            _ => None,
        }
    }
}

impl PartialEq for SemanticValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_uri(), other.as_uri()) {
            // Source-shaped values compare by URI, across variants.
            (Some(a), Some(b)) => a == b,
            (None, None) => match (self, other) {
                (SemanticValue::Literal(a), SemanticValue::Literal(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for SemanticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticValue::Source(r) => write!(f, "{}", r.uri()),
            SemanticValue::Class(uri) => write!(f, "{uri}"),
            SemanticValue::Literal(p) => write!(f, "{p}"),
        }
    }
}

// ========== Push Values ==========

/// What callers hand to `push`/`set`/`replace`: a URI, an existing source
/// handle, or a literal string.
#[derive(Debug, Clone)]
pub enum PushValue {
    Uri(SourceUri),
    Source(SourceRef),
    Literal(String),
}

impl PushValue {
    /// Parse a URI string into a push value
    pub fn uri(s: &str) -> Result<Self> {
        Ok(PushValue::Uri(SourceUri::parse(s)?))
    }

    /// Wrap a literal string
    pub fn literal(s: impl Into<String>) -> Self {
        PushValue::Literal(s.into())
    }

    /// Whether this push value denotes the same thing as a stored value.
    ///
    /// URIs and source handles match source-shaped values by URI; literal
    /// strings match literals by their parsed parts, so suffix order does
    /// not matter.
    pub fn matches(&self, value: &SemanticValue) -> bool {
        match self {
            PushValue::Uri(uri) => value.as_uri().as_ref() == Some(uri),
            PushValue::Source(r) => value.as_uri() == Some(r.uri()),
            PushValue::Literal(s) => match value {
                SemanticValue::Literal(p) => ParsedLiteral::parse(s) == *p,
                _ => false,
            },
        }
    }
}

impl From<SourceUri> for PushValue {
    fn from(uri: SourceUri) -> Self {
        PushValue::Uri(uri)
    }
}

impl From<SourceRef> for PushValue {
    fn from(r: SourceRef) -> Self {
        PushValue::Source(r)
    }
}

impl From<LiteralValue> for PushValue {
    fn from(lit: LiteralValue) -> Self {
        PushValue::Literal(lit.text)
    }
}

impl From<ParsedLiteral> for PushValue {
    fn from(p: ParsedLiteral) -> Self {
        PushValue::Literal(p.encode())
    }
}
