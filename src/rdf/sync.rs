//! Relational-to-RDF reconciliation
//!
//! The relational store is authoritative; the triple store follows it.
//! Saves reconcile per predicate: remove what the subject said, write
//! what it says now, and never touch predicates the session left clean.
//! There is no cross-store transaction, so a crash between the relational
//! commit and the triple writes can leave the RDF side behind; resync is
//! the repair tool for exactly that.

use super::{Term, TriplePattern, TripleStore};
use crate::object::ObjectRef;
use crate::source::Source;
use crate::storage::RelationStore;
use crate::triple::SourceRecord;
use crate::uri::SourceUri;
use crate::{Error, Result};

/// How much of the subject's triple state to assume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Remove-then-write per touched predicate
    Incremental,
    /// The subject is new, nothing to remove
    Create,
    /// Ignore session state; rebuild from the relational rows
    Force,
}

/// Reconcile one source's triples after a save.
///
/// In the incremental modes only non-clean collections are visited, so
/// an untouched predicate costs nothing.
pub fn sync_source(
    rdf: &mut dyn TripleStore,
    store: &RelationStore,
    source: &mut Source,
    mode: SyncMode,
) -> Result<()> {
    if mode == SyncMode::Force {
        let record = store
            .get_source(source.uri())?
            .ok_or_else(|| Error::NotFound(format!("source {}", source.uri())))?;
        return force_sync(rdf, store, &record);
    }

    let subject = source.uri().clone();
    for collection in source.sync_collections() {
        if collection.is_clean() {
            continue;
        }
        let predicate = collection.predicate().to_string();
        if mode == SyncMode::Incremental {
            rdf.remove(&TriplePattern::for_subject_predicate(
                subject.clone(),
                &predicate,
            ))?;
        }
        for term in collection.terms(store)? {
            rdf.write(&subject, &predicate, &term)?;
        }
    }
    Ok(())
}

/// Rebuild a subject's triples from its relational rows alone
pub fn force_sync(
    rdf: &mut dyn TripleStore,
    store: &RelationStore,
    record: &SourceRecord,
) -> Result<()> {
    rdf.remove(&TriplePattern::for_subject(record.uri.clone()))?;
    for predicate in store.predicates_for(record.id)? {
        for triple in store.relations_for(record.id, &predicate)? {
            let term = match triple.object {
                ObjectRef::Source(id) => store
                    .get_source_by_id(id)?
                    .map(|r| Term::Resource(r.uri)),
                ObjectRef::Literal(id) => {
                    store.get_literal(id)?.map(|l| Term::Literal(l.text))
                }
            };
            if let Some(term) = term {
                rdf.write(&record.uri, &predicate, &term)?;
            }
        }
    }
    tracing::debug!(uri = %record.uri, "rebuilt triples");
    Ok(())
}

/// Rebuild one source's triples by URI
pub fn resync(rdf: &mut dyn TripleStore, store: &RelationStore, uri: &SourceUri) -> Result<()> {
    let record = store
        .get_source(uri)?
        .ok_or_else(|| Error::NotFound(format!("source {uri}")))?;
    force_sync(rdf, store, &record)
}

/// Wipe the triple store and re-export every source.
///
/// Returns the number of sources exported.
pub fn resync_all(rdf: &mut dyn TripleStore, store: &RelationStore) -> Result<usize> {
    rdf.remove(&TriplePattern::all())?;
    let records = store.all_sources()?;
    for record in &records {
        force_sync(rdf, store, record)?;
    }
    tracing::debug!(count = records.len(), "rebuilt triple store");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::MemoryTripleStore;

    fn uri(s: &str) -> SourceUri {
        SourceUri::parse(s).unwrap()
    }

    #[test]
    fn test_force_sync_rebuilds_from_rows() {
        let store = RelationStore::open_in_memory().unwrap();
        let s = store.insert_source(&uri("http://example.org/s"), "source").unwrap();
        let o = store.insert_source(&uri("http://example.org/o"), "source").unwrap();
        let l = store.insert_literal("v@en").unwrap();
        store
            .insert_relation(s, "http://example.org/p", &ObjectRef::Literal(l), None)
            .unwrap();
        store
            .insert_relation(s, "http://example.org/q", &ObjectRef::Source(o), None)
            .unwrap();

        let mut rdf = MemoryTripleStore::new();
        // Stale triple that the rows no longer back
        rdf.write(
            &uri("http://example.org/s"),
            "http://example.org/gone",
            &Term::Literal("stale".to_string()),
        )
        .unwrap();

        let record = store.get_source(&uri("http://example.org/s")).unwrap().unwrap();
        force_sync(&mut rdf, &store, &record).unwrap();

        assert_eq!(rdf.len(), 2);
        let p = rdf
            .query(&TriplePattern::for_subject_predicate(
                uri("http://example.org/s"),
                "http://example.org/p",
            ))
            .unwrap();
        assert_eq!(p[0].term, Term::Literal("v@en".to_string()));
        let q = rdf
            .query(&TriplePattern::for_subject_predicate(
                uri("http://example.org/s"),
                "http://example.org/q",
            ))
            .unwrap();
        assert_eq!(q[0].term, Term::Resource(uri("http://example.org/o")));
    }

    #[test]
    fn test_resync_unknown_uri_is_not_found() {
        let store = RelationStore::open_in_memory().unwrap();
        let mut rdf = MemoryTripleStore::new();
        let err = resync(&mut rdf, &store, &uri("http://example.org/missing"));
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_resync_all_clears_foreign_subjects() {
        let store = RelationStore::open_in_memory().unwrap();
        let s = store.insert_source(&uri("http://example.org/s"), "source").unwrap();
        let l = store.insert_literal("v").unwrap();
        store
            .insert_relation(s, "http://example.org/p", &ObjectRef::Literal(l), None)
            .unwrap();

        let mut rdf = MemoryTripleStore::new();
        rdf.write(
            &uri("http://example.org/foreign"),
            "http://example.org/p",
            &Term::Literal("x".to_string()),
        )
        .unwrap();

        let exported = resync_all(&mut rdf, &store).unwrap();
        assert_eq!(exported, 1);
        assert_eq!(rdf.len(), 1);
    }
}
