//! Unsaved identity map
//!
//! Within one editing session, two mentions of the same not-yet-persisted
//! URI must resolve to the same in-memory source, so that saving assigns
//! one row and both mentions see its id. The map interns unsaved sources
//! by URI and hands out aliasing handles.

use crate::object::SourceRef;
use crate::source::Source;
use crate::uri::SourceUri;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct UnsavedIdentityMap {
    entries: HashMap<String, SourceRef>,
}

impl UnsavedIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session handle for a URI, interning a fresh unsaved source on miss
    pub fn resolve(&mut self, uri: &SourceUri) -> SourceRef {
        self.entries
            .entry(uri.as_str().to_string())
            .or_insert_with(|| SourceRef::new(Source::new(uri.clone())))
            .clone()
    }

    /// The session handle for a URI, if one was interned
    pub fn lookup(&self, uri: &SourceUri) -> Option<SourceRef> {
        self.entries.get(uri.as_str()).cloned()
    }

    /// Register a handle, returning the canonical one for its URI.
    ///
    /// If the URI was already interned the existing handle wins and the
    /// argument is dropped; otherwise the argument becomes canonical.
    pub fn register(&mut self, source: SourceRef) -> SourceRef {
        self.entries
            .entry(source.uri().into_string())
            .or_insert(source)
            .clone()
    }

    pub fn contains(&self, uri: &SourceUri) -> bool {
        self.entries.contains_key(uri.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
