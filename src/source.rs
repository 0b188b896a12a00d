//! Sources - the entities of the semantic layer
//!
//! A source is a URI-identified entity whose attributes are open-ended
//! predicate/value lists. Attribute state lives in per-predicate
//! collection caches; nothing touches the stores until a read forces a
//! load or a save flushes the edits. Saving writes the relational rows
//! first and then reconciles the RDF side for every touched predicate.

use crate::collection::PredicateCollection;
use crate::identity::UnsavedIdentityMap;
use crate::literal::LiteralValue;
use crate::object::{PushValue, SemanticObject, SemanticValue, SourceRef};
use crate::rdf::sync::{self, SyncMode};
use crate::rdf::{Term, TriplePattern};
use crate::registry::{PredicateRegistry, TYPE_PREDICATE};
use crate::semantic::SemanticStore;
use crate::triple::SourceRecord;
use crate::uri::SourceUri;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A semantic entity with lazily loaded attribute collections
#[derive(Debug)]
pub struct Source {
    id: Option<i64>,
    uri: SourceUri,
    kind: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    prefetched: bool,
    collections: HashMap<String, PredicateCollection>,
}

impl Source {
    /// A fresh, unsaved source with the default kind
    pub fn new(uri: SourceUri) -> Self {
        Self {
            id: None,
            uri,
            kind: "source".to_string(),
            created_at: None,
            updated_at: None,
            prefetched: false,
            collections: HashMap::new(),
        }
    }

    /// Builder form of [`Source::set_kind`]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Rehydrate a source from its stored row
    pub fn from_record(record: SourceRecord) -> Self {
        Self {
            id: Some(record.id),
            uri: record.uri,
            kind: record.kind,
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
            prefetched: false,
            collections: HashMap::new(),
        }
    }

    pub fn uri(&self) -> &SourceUri {
        &self.uri
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
    }

    /// Whether this source has never been saved
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    // ========== Collection Cache ==========

    fn collection_entry(
        &mut self,
        registry: &PredicateRegistry,
        predicate: &str,
    ) -> &mut PredicateCollection {
        let prefetched = self.prefetched;
        let reference_only = registry.is_reference_only(predicate);
        self.collections
            .entry(predicate.to_string())
            .or_insert_with(|| {
                let mut collection = PredicateCollection::new(predicate, reference_only);
                if prefetched {
                    // The batch query already proved this predicate empty
                    collection.mark_loaded();
                }
                collection
            })
    }

    pub(crate) fn inject_fat(
        &mut self,
        registry: &PredicateRegistry,
        predicate: &str,
        rows: Vec<crate::triple::FatRow>,
    ) {
        self.collection_entry(registry, predicate).inject_fat(rows);
    }

    pub(crate) fn mark_prefetched(&mut self) {
        self.prefetched = true;
        for collection in self.collections.values_mut() {
            if !collection.is_loaded() {
                collection.mark_loaded();
            }
        }
    }

    pub(crate) fn sync_collections(
        &mut self,
    ) -> impl Iterator<Item = &mut PredicateCollection> {
        self.collections.values_mut()
    }

    // ========== Attribute Reads ==========

    /// All values for a predicate, stored order first
    pub fn values(&mut self, ctx: &SemanticStore, predicate: &str) -> Result<Vec<SemanticValue>> {
        let subject_id = self.id;
        let collection = self.collection_entry(ctx.registry(), predicate);
        collection.ensure_loaded(ctx.relational(), subject_id)?;
        collection.values(ctx.relational())
    }

    /// The first value for a predicate, if any
    pub fn value(&mut self, ctx: &SemanticStore, predicate: &str) -> Result<Option<SemanticValue>> {
        self.get(ctx, predicate, 0)
    }

    /// The value at an index for a predicate
    pub fn get(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        index: usize,
    ) -> Result<Option<SemanticValue>> {
        let subject_id = self.id;
        let collection = self.collection_entry(ctx.registry(), predicate);
        collection.ensure_loaded(ctx.relational(), subject_id)?;
        collection.get(ctx.relational(), index)
    }

    /// Value count for a predicate without loading the collection
    pub fn count_values(&mut self, ctx: &SemanticStore, predicate: &str) -> Result<u64> {
        let subject_id = self.id;
        let collection = self.collection_entry(ctx.registry(), predicate);
        collection.len(ctx.relational(), subject_id)
    }

    // ========== Attribute Writes ==========

    /// Buffer a value for a predicate; persisted on the next save
    pub fn push(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        value: impl Into<PushValue>,
    ) -> Result<()> {
        self.push_with(ctx, predicate, value.into(), None)
    }

    /// Like [`Source::push`], resolving unsaved URIs through a session's
    /// identity map so repeated mentions converge on one handle
    pub fn push_in(
        &mut self,
        ctx: &SemanticStore,
        session: &mut UnsavedIdentityMap,
        predicate: &str,
        value: impl Into<PushValue>,
    ) -> Result<()> {
        self.push_with(ctx, predicate, value.into(), Some(session))
    }

    fn push_with(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        value: PushValue,
        session: Option<&mut UnsavedIdentityMap>,
    ) -> Result<()> {
        if ctx.registry().is_single_valued(predicate) && self.count_values(ctx, predicate)? >= 1 {
            return Err(Error::InvalidArgument(format!(
                "predicate is single-valued: {predicate}"
            )));
        }
        let object = resolve_push(ctx, predicate, value, session)?;
        self.collection_entry(ctx.registry(), predicate).push(object);
        Ok(())
    }

    /// Replace all values with a single one
    pub fn set(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        value: impl Into<PushValue>,
    ) -> Result<()> {
        self.replace_with(ctx, predicate, vec![value.into()], None)
    }

    /// Replace the value list wholesale, keeping rows that match.
    ///
    /// Values already present keep their relation rows; only the
    /// difference is removed and inserted.
    pub fn replace(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        values: Vec<PushValue>,
    ) -> Result<()> {
        self.replace_with(ctx, predicate, values, None)
    }

    /// Like [`Source::replace`] with session identity resolution
    pub fn replace_in(
        &mut self,
        ctx: &SemanticStore,
        session: &mut UnsavedIdentityMap,
        predicate: &str,
        values: Vec<PushValue>,
    ) -> Result<()> {
        self.replace_with(ctx, predicate, values, Some(session))
    }

    fn replace_with(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        values: Vec<PushValue>,
        mut session: Option<&mut UnsavedIdentityMap>,
    ) -> Result<()> {
        if values.len() > 1 && ctx.registry().is_single_valued(predicate) {
            return Err(Error::InvalidArgument(format!(
                "predicate is single-valued: {predicate}"
            )));
        }
        let subject_id = self.id;
        let mut remaining: Vec<Option<PushValue>> = values.into_iter().map(Some).collect();
        {
            let store = ctx.relational();
            let collection = self.collection_entry(ctx.registry(), predicate);
            collection.ensure_loaded(store, subject_id)?;
            // Walk back to front so removals don't shift pending indexes
            for index in (0..collection.item_count()).rev() {
                let Some(value) = collection.get(store, index)? else {
                    continue;
                };
                let slot = remaining
                    .iter_mut()
                    .find(|slot| slot.as_ref().is_some_and(|pv| pv.matches(&value)));
                match slot {
                    Some(slot) => *slot = None,
                    None => collection.remove_index(index),
                }
            }
        }
        let mut objects = Vec::new();
        for value in remaining.into_iter().flatten() {
            objects.push(resolve_push(ctx, predicate, value, session.as_deref_mut())?);
        }
        if !objects.is_empty() {
            let collection = self.collection_entry(ctx.registry(), predicate);
            for object in objects {
                collection.push(object);
            }
        }
        Ok(())
    }

    /// Remove the first value matching `value`; the row goes on the next
    /// save. Returns whether anything matched.
    pub fn remove_value(
        &mut self,
        ctx: &SemanticStore,
        predicate: &str,
        value: impl Into<PushValue>,
    ) -> Result<bool> {
        let subject_id = self.id;
        let target = value.into();
        let collection = self.collection_entry(ctx.registry(), predicate);
        collection.ensure_loaded(ctx.relational(), subject_id)?;
        collection.remove_first(ctx.relational(), &target)
    }

    /// Drop every value for a predicate immediately, in both stores
    pub fn remove_all(&mut self, ctx: &mut SemanticStore, predicate: &str) -> Result<()> {
        let subject_id = self.id;
        let uri = self.uri.clone();
        let (store, rdf, registry) = ctx.parts_mut();
        let collection = self.collection_entry(registry, predicate);
        collection.remove_all(store, rdf, subject_id.map(|id| (id, &uri)))
    }

    // ========== Type Sugar ==========

    /// The source's rdf:type URIs
    pub fn types(&mut self, ctx: &SemanticStore) -> Result<Vec<SourceUri>> {
        let values = self.values(ctx, TYPE_PREDICATE)?;
        Ok(values.iter().filter_map(|v| v.as_uri()).collect())
    }

    /// Add an rdf:type
    pub fn add_type(&mut self, ctx: &SemanticStore, type_uri: SourceUri) -> Result<()> {
        self.push(ctx, TYPE_PREDICATE, type_uri)
    }

    // ========== Persistence ==========

    /// Persist the source and its buffered edits, then reconcile RDF.
    ///
    /// The relational row is written first, every dirty collection is
    /// flushed, and touched predicates sync to the triple store when
    /// autosync is on. The collection cache is dropped afterwards, so a
    /// save with no edits in between touches neither store's data.
    pub fn save(&mut self, ctx: &mut SemanticStore) -> Result<()> {
        let was_new = self.id.is_none();
        if was_new {
            let id = ctx.relational().insert_source(&self.uri, &self.kind)?;
            self.id = Some(id);
        }
        let id = match self.id {
            Some(id) => id,
            None => return Err(Error::NotFound(format!("source row for {}", self.uri))),
        };

        for collection in self.collections.values_mut() {
            if collection.is_dirty() {
                collection.ensure_loaded(ctx.relational(), Some(id))?;
                collection.flush(ctx.relational(), id)?;
            }
        }
        if !was_new {
            ctx.relational().update_source(id, &self.kind)?;
        }

        if ctx.autosync() {
            let mode = if was_new {
                SyncMode::Create
            } else {
                SyncMode::Incremental
            };
            let (store, rdf, _) = ctx.parts_mut();
            sync::sync_source(rdf, store, self, mode)?;
        }

        if let Some(record) = ctx.relational().get_source(&self.uri)? {
            self.created_at = Some(record.created_at);
            self.updated_at = Some(record.updated_at);
        }
        self.collections.clear();
        self.prefetched = false;
        tracing::debug!(uri = %self.uri, "saved source");
        Ok(())
    }

    /// Delete the source from both stores, cascading into owned values.
    ///
    /// Relations on either side go with it. Values of owned-dependent
    /// predicates are destroyed recursively; a visited set keeps ownership
    /// cycles from recursing forever.
    pub fn destroy(self, ctx: &mut SemanticStore) -> Result<()> {
        let mut visited = HashSet::new();
        self.destroy_inner(ctx, &mut visited)
    }

    fn destroy_inner(mut self, ctx: &mut SemanticStore, visited: &mut HashSet<String>) -> Result<()> {
        if !visited.insert(self.uri.as_str().to_string()) {
            return Ok(());
        }
        if self.id.is_some() {
            for predicate in ctx.registry().owned_predicates() {
                for value in self.values(&*ctx, &predicate)? {
                    let Some(child_uri) = value.as_uri() else {
                        continue;
                    };
                    if visited.contains(child_uri.as_str()) {
                        continue;
                    }
                    if let Some(child) = ctx.try_get(child_uri.as_str())? {
                        child.destroy_inner(ctx, visited)?;
                    }
                }
            }
        }
        if let Some(id) = self.id {
            ctx.relational().delete_relations_for_source(id)?;
            ctx.relational().delete_source(id)?;
            let rdf = ctx.rdf_mut();
            rdf.remove(&TriplePattern::for_subject(self.uri.clone()))?;
            rdf.remove(&TriplePattern::for_object(Term::Resource(self.uri.clone())))?;
        }
        tracing::debug!(uri = %self.uri, "destroyed source");
        Ok(())
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Turn a push value into a collection object, consulting the store for
/// existing rows and the session map for unsaved handles
fn resolve_push(
    ctx: &SemanticStore,
    predicate: &str,
    value: PushValue,
    mut session: Option<&mut UnsavedIdentityMap>,
) -> Result<SemanticObject> {
    let reference_only = ctx.registry().is_reference_only(predicate);
    match value {
        PushValue::Uri(uri) => {
            if reference_only {
                return Ok(SemanticObject::Class(uri));
            }
            if let Some(record) = ctx.relational().get_source(&uri)? {
                return Ok(SemanticObject::Source(SourceRef::new(Source::from_record(
                    record,
                ))));
            }
            let handle = match session.as_deref_mut() {
                Some(session) => session.resolve(&uri),
                None => SourceRef::new(Source::new(uri)),
            };
            Ok(SemanticObject::Source(handle))
        }
        PushValue::Source(handle) => {
            let handle = match session.as_deref_mut() {
                Some(session) if !handle.is_persisted() => session.register(handle),
                _ => handle,
            };
            Ok(SemanticObject::Source(handle))
        }
        PushValue::Literal(text) => Ok(SemanticObject::Literal(LiteralValue::new(text)?)),
    }
}
