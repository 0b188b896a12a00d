//! Per-predicate attribute collections
//!
//! A source's values for one predicate live in a [`PredicateCollection`]:
//! a lazy cache over the relation rows plus buffered edits. Nothing is
//! fetched until a read needs it, and nothing is written until the owning
//! source saves. The loaded/dirty pair drives the RDF sync: a collection
//! that was never touched is clean and costs no triple-store traffic.

use crate::literal::LiteralValue;
use crate::object::{ObjectRef, PushValue, SemanticObject, SemanticValue};
use crate::rdf::{Term, TriplePattern, TripleStore};
use crate::source::Source;
use crate::storage::RelationStore;
use crate::triple::{FatObject, FatRow, Triple};
use crate::uri::SourceUri;
use crate::{Error, Result};

// ========== Collection Items ==========

/// One value slot in a collection.
///
/// Items fetched lean carry only the stored reference and resolve their
/// object on first access; items from fat rows or fresh pushes carry the
/// object up front.
#[derive(Debug)]
pub struct CollectionItem {
    relation_id: Option<i64>,
    rel_order: Option<i64>,
    raw: Option<ObjectRef>,
    resolved: Option<SemanticObject>,
}

impl CollectionItem {
    /// Item from a lean relation row; object resolved on demand
    pub fn from_triple(triple: &Triple) -> Self {
        Self {
            relation_id: Some(triple.id),
            rel_order: triple.rel_order,
            raw: Some(triple.object),
            resolved: None,
        }
    }

    /// Item from a fat row; object payload is already here
    pub fn from_fat(row: FatRow, reference_only: bool) -> Self {
        let (raw, resolved) = match row.object {
            FatObject::Source(record) => {
                let raw = ObjectRef::Source(record.id);
                let resolved = if reference_only {
                    SemanticObject::Class(record.uri.clone())
                } else {
                    SemanticObject::Source(crate::object::SourceRef::new(Source::from_record(
                        record,
                    )))
                };
                (Some(raw), Some(resolved))
            }
            FatObject::Literal(literal) => {
                (literal.id.map(ObjectRef::Literal), Some(SemanticObject::Literal(literal)))
            }
        };
        Self {
            relation_id: Some(row.relation_id),
            rel_order: row.rel_order,
            raw,
            resolved,
        }
    }

    /// Item for a freshly pushed value, not yet persisted
    pub fn fresh(object: SemanticObject) -> Self {
        Self {
            relation_id: None,
            rel_order: None,
            raw: None,
            resolved: Some(object),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.relation_id.is_some()
    }

    pub fn relation_id(&self) -> Option<i64> {
        self.relation_id
    }

    /// The item's object, resolving and memoizing it on first access
    pub fn object(
        &mut self,
        store: &RelationStore,
        reference_only: bool,
    ) -> Result<SemanticObject> {
        if let Some(resolved) = &self.resolved {
            return Ok(resolved.clone());
        }
        let object = match self.raw {
            Some(ObjectRef::Literal(id)) => {
                let literal = store
                    .get_literal(id)?
                    .ok_or_else(|| Error::NotFound(format!("literal row {id}")))?;
                SemanticObject::Literal(literal)
            }
            Some(ObjectRef::Source(id)) => {
                let record = store
                    .get_source_by_id(id)?
                    .ok_or_else(|| Error::NotFound(format!("source row {id}")))?;
                if reference_only {
                    SemanticObject::Class(record.uri.clone())
                } else {
                    SemanticObject::Source(crate::object::SourceRef::new(Source::from_record(
                        record,
                    )))
                }
            }
            None => return Err(Error::NotFound("detached collection item".to_string())),
        };
        self.resolved = Some(object.clone());
        Ok(object)
    }

    /// The item's value form, literals parsed and reference-only sources
    /// narrowed to their URI
    pub fn value(&mut self, store: &RelationStore, reference_only: bool) -> Result<SemanticValue> {
        let value = match self.object(store, reference_only)? {
            SemanticObject::Source(r) if reference_only => SemanticValue::Class(r.uri()),
            SemanticObject::Source(r) => SemanticValue::Source(r),
            SemanticObject::Class(uri) => SemanticValue::Class(uri),
            SemanticObject::Literal(literal) => SemanticValue::Literal(literal.parsed()),
        };
        Ok(value)
    }
}

// ========== Predicate Collection ==========

/// The cached value list for one subject and predicate.
///
/// State machine: `loaded` flips on first fetch (or fat-row injection),
/// `dirty` on any buffered edit. `is_clean()` means the RDF side has
/// nothing to reconcile for this predicate.
#[derive(Debug)]
pub struct PredicateCollection {
    predicate: String,
    reference_only: bool,
    items: Vec<CollectionItem>,
    removed: Vec<CollectionItem>,
    loaded: bool,
    dirty: bool,
}

impl PredicateCollection {
    pub fn new(predicate: impl Into<String>, reference_only: bool) -> Self {
        Self {
            predicate: predicate.into(),
            reference_only,
            items: Vec::new(),
            removed: Vec::new(),
            loaded: false,
            dirty: false,
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether this collection never touched the store and has no edits
    pub fn is_clean(&self) -> bool {
        !(self.loaded || self.dirty)
    }

    /// Mark as loaded without fetching; for subjects known to have no rows
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Fetch the stored rows if not yet loaded.
    ///
    /// Values pushed before the first read stay buffered and are kept
    /// after the stored ones.
    pub fn ensure_loaded(
        &mut self,
        store: &RelationStore,
        subject_id: Option<i64>,
    ) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        if let Some(subject_id) = subject_id {
            let triples = store.relations_for(subject_id, &self.predicate)?;
            let mut fetched: Vec<CollectionItem> =
                triples.iter().map(CollectionItem::from_triple).collect();
            fetched.append(&mut self.items);
            self.items = fetched;
        }
        self.loaded = true;
        Ok(())
    }

    /// Accept pre-fetched fat rows instead of querying.
    ///
    /// No-op when already loaded; buffered pushes are kept after the
    /// injected rows.
    pub(crate) fn inject_fat(&mut self, rows: Vec<FatRow>) {
        if self.loaded {
            return;
        }
        let reference_only = self.reference_only;
        let mut fetched: Vec<CollectionItem> = rows
            .into_iter()
            .map(|row| CollectionItem::from_fat(row, reference_only))
            .collect();
        fetched.append(&mut self.items);
        self.items = fetched;
        self.loaded = true;
    }

    /// All values, in stored order then push order. Call after loading.
    pub fn values(&mut self, store: &RelationStore) -> Result<Vec<SemanticValue>> {
        let reference_only = self.reference_only;
        self.items
            .iter_mut()
            .map(|item| item.value(store, reference_only))
            .collect()
    }

    /// The value at an index, if present. Call after loading.
    pub fn get(&mut self, store: &RelationStore, index: usize) -> Result<Option<SemanticValue>> {
        let reference_only = self.reference_only;
        match self.items.get_mut(index) {
            Some(item) => Ok(Some(item.value(store, reference_only)?)),
            None => Ok(None),
        }
    }

    /// Value count without forcing a load: stored rows are counted with
    /// one aggregate query, buffered pushes added on top.
    pub fn len(&self, store: &RelationStore, subject_id: Option<i64>) -> Result<u64> {
        if self.loaded {
            return Ok(self.items.len() as u64);
        }
        let stored = match subject_id {
            Some(subject_id) => store.count_relations(subject_id, &self.predicate)?,
            None => 0,
        };
        Ok(stored + self.items.len() as u64)
    }

    /// Number of in-memory items; meaningful once loaded
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Buffer a new value for the next save
    pub fn push(&mut self, object: SemanticObject) {
        self.items.push(CollectionItem::fresh(object));
        self.dirty = true;
    }

    /// Remove the first value matching `target`, deferring the row
    /// deletion to the next save. Call after loading.
    pub fn remove_first(
        &mut self,
        store: &RelationStore,
        target: &PushValue,
    ) -> Result<bool> {
        let reference_only = self.reference_only;
        for index in 0..self.items.len() {
            let matched = {
                let value = self.items[index].value(store, reference_only)?;
                target.matches(&value)
            };
            if matched {
                self.remove_index(index);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Remove by position; persisted items move to the removal buffer
    pub(crate) fn remove_index(&mut self, index: usize) {
        let item = self.items.remove(index);
        if item.is_persisted() {
            self.removed.push(item);
        }
        self.dirty = true;
    }

    /// Drop every value for this predicate, immediately, in both stores.
    ///
    /// Unlike single-value removal this is write-through: rows and triples
    /// are gone when it returns. `subject` is the owning row and URI, or
    /// `None` when the subject was never saved.
    pub fn remove_all(
        &mut self,
        store: &RelationStore,
        rdf: &mut dyn TripleStore,
        subject: Option<(i64, &SourceUri)>,
    ) -> Result<()> {
        if let Some((subject_id, subject_uri)) = subject {
            store.delete_relations(subject_id, &self.predicate)?;
            rdf.remove(&TriplePattern::for_subject_predicate(
                subject_uri.clone(),
                &self.predicate,
            ))?;
        }
        self.items.clear();
        self.removed.clear();
        self.loaded = true;
        self.dirty = false;
        Ok(())
    }

    /// Write buffered edits to the relational store.
    ///
    /// Deferred removals are deleted first, then every unpersisted item is
    /// inserted at its list position. Source values without a row get a
    /// bare row here, and the id lands in the shared handle.
    pub fn flush(&mut self, store: &RelationStore, subject_id: i64) -> Result<()> {
        let predicate = self.predicate.clone();
        for item in std::mem::take(&mut self.removed) {
            if let (Some(relation_id), Some(raw)) = (item.relation_id, item.raw) {
                store.delete_relation(relation_id, &raw)?;
            }
        }
        for (position, item) in self.items.iter_mut().enumerate() {
            if item.relation_id.is_some() {
                continue;
            }
            let raw = match item.resolved.as_mut() {
                Some(SemanticObject::Literal(literal)) => {
                    let id = match literal.id {
                        Some(id) => id,
                        None => store.insert_literal(&literal.text)?,
                    };
                    literal.id = Some(id);
                    ObjectRef::Literal(id)
                }
                Some(SemanticObject::Source(source_ref)) => {
                    let id = match source_ref.id() {
                        Some(id) => id,
                        None => {
                            let uri = source_ref.uri();
                            let kind = source_ref.borrow().kind().to_string();
                            let id = ensure_source_row(store, &uri, &kind)?;
                            source_ref.borrow_mut().set_id(id);
                            id
                        }
                    };
                    ObjectRef::Source(id)
                }
                Some(SemanticObject::Class(uri)) => {
                    let id = match store.get_source(uri)?.map(|record| record.id) {
                        Some(id) => id,
                        None => ensure_source_row(store, uri, "source")?,
                    };
                    ObjectRef::Source(id)
                }
                None => continue,
            };
            let relation_id =
                store.insert_relation(subject_id, &predicate, &raw, Some(position as i64))?;
            item.relation_id = Some(relation_id);
            item.raw = Some(raw);
            item.rel_order = Some(position as i64);
        }
        self.dirty = false;
        Ok(())
    }

    /// The collection's values as RDF terms, for the sync pass
    pub fn terms(&mut self, store: &RelationStore) -> Result<Vec<Term>> {
        let reference_only = self.reference_only;
        self.items
            .iter_mut()
            .map(|item| {
                let term = match item.object(store, reference_only)? {
                    SemanticObject::Source(r) => Term::Resource(r.uri()),
                    SemanticObject::Class(uri) => Term::Resource(uri),
                    SemanticObject::Literal(literal) => Term::Literal(literal.text.clone()),
                };
                Ok(term)
            })
            .collect()
    }
}

/// Insert a bare source row, adopting the existing row on a URI collision
fn ensure_source_row(store: &RelationStore, uri: &SourceUri, kind: &str) -> Result<i64> {
    match store.insert_source(uri, kind) {
        Ok(id) => Ok(id),
        Err(Error::Validation(_)) => store
            .get_source(uri)?
            .map(|record| record.id)
            .ok_or_else(|| Error::NotFound(format!("source row for {uri}"))),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SourceRef;
    use crate::rdf::MemoryTripleStore;

    fn uri(s: &str) -> SourceUri {
        SourceUri::parse(s).unwrap()
    }

    fn sample_store() -> (RelationStore, i64) {
        let store = RelationStore::open_in_memory().unwrap();
        let id = store
            .insert_source(&uri("http://example.org/subject"), "source")
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_clean_until_touched() {
        let (store, subject) = sample_store();
        let mut collection = PredicateCollection::new("http://example.org/p", false);
        assert!(collection.is_clean());

        collection.ensure_loaded(&store, Some(subject)).unwrap();
        assert!(!collection.is_clean());
        assert!(!collection.is_dirty());
    }

    #[test]
    fn test_push_marks_dirty_without_loading() {
        let (_, _) = sample_store();
        let mut collection = PredicateCollection::new("http://example.org/p", false);
        collection.push(SemanticObject::Literal(LiteralValue::new("v").unwrap()));
        assert!(collection.is_dirty());
        assert!(!collection.is_loaded());
        assert!(!collection.is_clean());
    }

    #[test]
    fn test_stored_values_come_before_buffered() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/p";
        let l = store.insert_literal("stored").unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Literal(l), Some(0))
            .unwrap();

        let mut collection = PredicateCollection::new(pred, false);
        collection.push(SemanticObject::Literal(LiteralValue::new("buffered").unwrap()));
        collection.ensure_loaded(&store, Some(subject)).unwrap();

        let values = collection.values(&store).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].to_string(), "stored");
        assert_eq!(values[1].to_string(), "buffered");
    }

    #[test]
    fn test_len_without_loading() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/p";
        let l = store.insert_literal("stored").unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Literal(l), None)
            .unwrap();

        let mut collection = PredicateCollection::new(pred, false);
        collection.push(SemanticObject::Literal(LiteralValue::new("buffered").unwrap()));

        assert_eq!(collection.len(&store, Some(subject)).unwrap(), 2);
        assert!(!collection.is_loaded());
    }

    #[test]
    fn test_flush_persists_buffered_values() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/p";
        let mut collection = PredicateCollection::new(pred, false);
        collection.ensure_loaded(&store, Some(subject)).unwrap();
        collection.push(SemanticObject::Literal(LiteralValue::new("one").unwrap()));
        collection.push(SemanticObject::Class(uri("http://example.org/other")));

        collection.flush(&store, subject).unwrap();
        assert!(!collection.is_dirty());

        let triples = store.relations_for(subject, pred).unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].rel_order, Some(0));
        assert_eq!(triples[1].rel_order, Some(1));
        // The class value got a bare source row
        assert!(store.get_source(&uri("http://example.org/other")).unwrap().is_some());
    }

    #[test]
    fn test_flush_adopts_existing_source_row() {
        let (store, subject) = sample_store();
        let existing = store
            .insert_source(&uri("http://example.org/other"), "source")
            .unwrap();

        let mut collection = PredicateCollection::new("http://example.org/p", false);
        collection.ensure_loaded(&store, Some(subject)).unwrap();
        collection.push(SemanticObject::Source(SourceRef::new(Source::new(uri(
            "http://example.org/other",
        )))));
        collection.flush(&store, subject).unwrap();

        let triples = store.relations_for(subject, "http://example.org/p").unwrap();
        assert_eq!(triples[0].object, ObjectRef::Source(existing));
    }

    #[test]
    fn test_flush_assigns_id_through_shared_handle() {
        let (store, subject) = sample_store();
        let handle = SourceRef::new(Source::new(uri("http://example.org/new")));
        let mut collection = PredicateCollection::new("http://example.org/p", false);
        collection.ensure_loaded(&store, Some(subject)).unwrap();
        collection.push(SemanticObject::Source(handle.clone()));

        assert_eq!(handle.id(), None);
        collection.flush(&store, subject).unwrap();
        assert!(handle.id().is_some());
    }

    #[test]
    fn test_remove_first_defers_deletion() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/p";
        let l = store.insert_literal("hello^^s@en").unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Literal(l), None)
            .unwrap();

        let mut collection = PredicateCollection::new(pred, false);
        collection.ensure_loaded(&store, Some(subject)).unwrap();

        // Suffix order in the probe differs from the stored text
        let removed = collection
            .remove_first(&store, &PushValue::literal("hello@en^^s"))
            .unwrap();
        assert!(removed);
        assert!(collection.values(&store).unwrap().is_empty());
        // Still in the store until flush
        assert_eq!(store.relations_for(subject, pred).unwrap().len(), 1);

        collection.flush(&store, subject).unwrap();
        assert!(store.relations_for(subject, pred).unwrap().is_empty());
        assert!(store.get_literal(l).unwrap().is_none());
    }

    #[test]
    fn test_remove_all_is_write_through() {
        let (store, subject) = sample_store();
        let subject_uri = uri("http://example.org/subject");
        let pred = "http://example.org/p";
        let l = store.insert_literal("v").unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Literal(l), None)
            .unwrap();

        let mut rdf = MemoryTripleStore::new();
        rdf.write(&subject_uri, pred, &Term::Literal("v".to_string()))
            .unwrap();

        let mut collection = PredicateCollection::new(pred, false);
        collection
            .remove_all(&store, &mut rdf, Some((subject, &subject_uri)))
            .unwrap();

        assert!(store.relations_for(subject, pred).unwrap().is_empty());
        assert_eq!(rdf.len(), 0);
        assert!(collection.is_loaded());
        assert!(!collection.is_dirty());
    }

    #[test]
    fn test_lean_item_resolves_on_demand() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/p";
        let other = store
            .insert_source(&uri("http://example.org/other"), "source")
            .unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Source(other), None)
            .unwrap();

        let mut collection = PredicateCollection::new(pred, false);
        collection.ensure_loaded(&store, Some(subject)).unwrap();

        let before = store.queries_issued();
        let values = collection.values(&store).unwrap();
        assert!(store.queries_issued() > before);
        match &values[0] {
            SemanticValue::Source(r) => {
                assert_eq!(r.uri().as_str(), "http://example.org/other")
            }
            other => panic!("expected source value, got {other:?}"),
        }

        // Second read is memoized
        let before = store.queries_issued();
        collection.values(&store).unwrap();
        assert_eq!(store.queries_issued(), before);
    }

    #[test]
    fn test_reference_only_narrows_to_class() {
        let (store, subject) = sample_store();
        let pred = "http://example.org/type";
        let other = store
            .insert_source(&uri("http://example.org/types/Book"), "source")
            .unwrap();
        store
            .insert_relation(subject, pred, &ObjectRef::Source(other), None)
            .unwrap();

        let mut collection = PredicateCollection::new(pred, true);
        collection.ensure_loaded(&store, Some(subject)).unwrap();
        let values = collection.values(&store).unwrap();
        assert!(matches!(
            &values[0],
            SemanticValue::Class(u) if u.as_str() == "http://example.org/types/Book"
        ));
    }
}
