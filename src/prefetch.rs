//! Batched attribute prefetch
//!
//! Hydrating N sources one wrapper at a time costs one query per subject
//! and predicate. Prefetch pulls every relation for a batch of subjects
//! with a single fat-row query and injects the groups into the sources'
//! collection caches, so later reads are free.

use crate::registry::PredicateRegistry;
use crate::source::Source;
use crate::storage::RelationStore;
use crate::triple::FatRow;
use crate::{Error, Result};
use std::collections::HashMap;

/// Default cap on how many sources one prefetch call may carry
pub const DEFAULT_PREFETCH_LIMIT: usize = 1024;

/// Prefetch all attributes for a batch of saved sources.
///
/// Collections that were already loaded keep what they have; everything
/// else ends up loaded, including predicates with no rows at all. The
/// batch must be within `limit` and every source must be saved.
pub fn prefetch(
    store: &RelationStore,
    registry: &PredicateRegistry,
    sources: &mut [Source],
    limit: usize,
) -> Result<()> {
    if sources.is_empty() {
        return Ok(());
    }
    if sources.len() > limit {
        return Err(Error::BatchTooLarge {
            size: sources.len(),
            limit,
        });
    }

    let mut index_by_id: HashMap<i64, usize> = HashMap::new();
    let mut ids = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let id = source.id().ok_or_else(|| {
            Error::InvalidArgument(format!("cannot prefetch unsaved source {}", source.uri()))
        })?;
        ids.push(id);
        if index_by_id.insert(id, index).is_some() {
            return Err(Error::InvalidArgument(format!(
                "duplicate source in prefetch batch: {}",
                source.uri()
            )));
        }
    }

    let mut groups: HashMap<(i64, String), Vec<FatRow>> = HashMap::new();
    for row in store.fetch_fat_rows(&ids)? {
        groups
            .entry((row.subject_id, row.predicate.clone()))
            .or_default()
            .push(row);
    }

    for ((subject_id, predicate), rows) in groups {
        if let Some(&index) = index_by_id.get(&subject_id) {
            sources[index].inject_fat(registry, &predicate, rows);
        }
    }

    for source in sources.iter_mut() {
        source.mark_prefetched();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::SourceUri;

    fn uri(s: &str) -> SourceUri {
        SourceUri::parse(s).unwrap()
    }

    fn saved_source(store: &RelationStore, s: &str) -> Source {
        store.insert_source(&uri(s), "source").unwrap();
        let record = store.get_source(&uri(s)).unwrap().unwrap();
        Source::from_record(record)
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let store = RelationStore::open_in_memory().unwrap();
        let registry = PredicateRegistry::new();
        let before = store.queries_issued();
        prefetch(&store, &registry, &mut [], 8).unwrap();
        assert_eq!(store.queries_issued(), before);
    }

    #[test]
    fn test_batch_over_limit_rejected() {
        let store = RelationStore::open_in_memory().unwrap();
        let registry = PredicateRegistry::new();
        let mut sources = vec![
            saved_source(&store, "http://example.org/a"),
            saved_source(&store, "http://example.org/b"),
            saved_source(&store, "http://example.org/c"),
        ];
        let err = prefetch(&store, &registry, &mut sources, 2);
        assert!(matches!(
            err,
            Err(Error::BatchTooLarge { size: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_unsaved_source_rejected() {
        let store = RelationStore::open_in_memory().unwrap();
        let registry = PredicateRegistry::new();
        let mut sources = vec![Source::new(uri("http://example.org/unsaved"))];
        let err = prefetch(&store, &registry, &mut sources, 8);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let store = RelationStore::open_in_memory().unwrap();
        let registry = PredicateRegistry::new();
        store.insert_source(&uri("http://example.org/a"), "source").unwrap();
        let record = store.get_source(&uri("http://example.org/a")).unwrap().unwrap();
        let mut sources = vec![
            Source::from_record(record.clone()),
            Source::from_record(record),
        ];
        let err = prefetch(&store, &registry, &mut sources, 8);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_prefetch_is_one_query() {
        let store = RelationStore::open_in_memory().unwrap();
        let registry = PredicateRegistry::new();
        let mut sources = vec![
            saved_source(&store, "http://example.org/a"),
            saved_source(&store, "http://example.org/b"),
        ];
        let pred = "http://example.org/p";
        let l = store.insert_literal("v").unwrap();
        store
            .insert_relation(
                sources[0].id().unwrap(),
                pred,
                &crate::object::ObjectRef::Literal(l),
                None,
            )
            .unwrap();

        let before = store.queries_issued();
        prefetch(&store, &registry, &mut sources, 8).unwrap();
        assert_eq!(store.queries_issued(), before + 1);
    }
}
