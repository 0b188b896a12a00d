//! The semantic store facade
//!
//! One handle owning both backends: the relational system of record and
//! the RDF triple store, plus the predicate registry and the policy
//! knobs (autosync, prefetch limit). Sources are created and fetched
//! here and carry the handle into their attribute operations.

use crate::prefetch;
use crate::rdf::sync;
use crate::rdf::{MemoryTripleStore, TripleStore};
use crate::registry::PredicateRegistry;
use crate::source::Source;
use crate::storage::{QueryOptions, RelationStore};
use crate::uri::SourceUri;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

pub struct SemanticStore {
    relational: RelationStore,
    rdf: Box<dyn TripleStore>,
    registry: PredicateRegistry,
    autosync: bool,
    prefetch_limit: usize,
}

impl SemanticStore {
    /// Open against a database file and a triple store
    pub fn open(
        db_path: &Path,
        rdf: Box<dyn TripleStore>,
        registry: PredicateRegistry,
    ) -> Result<Self> {
        Ok(Self {
            relational: RelationStore::open(db_path)?,
            rdf,
            registry,
            autosync: true,
            prefetch_limit: prefetch::DEFAULT_PREFETCH_LIMIT,
        })
    }

    /// In-memory store with an in-memory triple side (for testing)
    pub fn open_in_memory(registry: PredicateRegistry) -> Result<Self> {
        Ok(Self {
            relational: RelationStore::open_in_memory()?,
            rdf: Box::new(MemoryTripleStore::new()),
            registry,
            autosync: true,
            prefetch_limit: prefetch::DEFAULT_PREFETCH_LIMIT,
        })
    }

    pub fn relational(&self) -> &RelationStore {
        &self.relational
    }

    pub fn rdf(&self) -> &dyn TripleStore {
        self.rdf.as_ref()
    }

    pub fn rdf_mut(&mut self) -> &mut dyn TripleStore {
        self.rdf.as_mut()
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PredicateRegistry {
        &mut self.registry
    }

    /// Whether saves mirror into the triple store
    pub fn autosync(&self) -> bool {
        self.autosync
    }

    pub fn set_autosync(&mut self, autosync: bool) {
        self.autosync = autosync;
    }

    pub fn prefetch_limit(&self) -> usize {
        self.prefetch_limit
    }

    pub fn set_prefetch_limit(&mut self, limit: usize) {
        self.prefetch_limit = limit;
    }

    /// Split borrows for operations that need both backends at once
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&RelationStore, &mut dyn TripleStore, &PredicateRegistry) {
        (&self.relational, self.rdf.as_mut(), &self.registry)
    }

    // ========== Source Lifecycle ==========

    /// A fresh, unsaved source; nothing is stored until it saves
    pub fn create(&self, uri: &str) -> Result<Source> {
        Ok(Source::new(SourceUri::parse(uri)?))
    }

    /// A fresh, unsaved source with a kind
    pub fn create_with_kind(&self, uri: &str, kind: &str) -> Result<Source> {
        Ok(Source::new(SourceUri::parse(uri)?).with_kind(kind))
    }

    /// Fetch a saved source by URI
    pub fn get(&self, uri: &str) -> Result<Source> {
        self.try_get(uri)?
            .ok_or_else(|| Error::NotFound(format!("source {uri}")))
    }

    /// Fetch a saved source by URI, `None` when absent
    pub fn try_get(&self, uri: &str) -> Result<Option<Source>> {
        let parsed = SourceUri::parse(uri)?;
        Ok(self
            .relational
            .get_source(&parsed)?
            .map(Source::from_record))
    }

    pub fn exists(&self, uri: &str) -> Result<bool> {
        self.relational.source_exists(&SourceUri::parse(uri)?)
    }

    // ========== Finders ==========

    /// Sources holding `predicate -> value`
    pub fn find_through(
        &self,
        predicate: &str,
        value: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Source>> {
        let records = self.relational.find_through(predicate, value, options)?;
        Ok(records.into_iter().map(Source::from_record).collect())
    }

    /// Source values a subject points at through a predicate
    pub fn find_through_inverse(
        &self,
        predicate: &str,
        subject_uri: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Source>> {
        let parsed = SourceUri::parse(subject_uri)?;
        let records = self
            .relational
            .find_through_inverse(predicate, &parsed, options)?;
        Ok(records.into_iter().map(Source::from_record).collect())
    }

    /// Sources typed with `type_uri`
    pub fn find_by_type(&self, type_uri: &str, options: &QueryOptions) -> Result<Vec<Source>> {
        let parsed = SourceUri::parse(type_uri)?;
        let records = self.relational.find_by_type(&parsed, options)?;
        Ok(records.into_iter().map(Source::from_record).collect())
    }

    /// Generic source listing; honors raw join/condition fragments
    pub fn find_sources(&self, options: &QueryOptions) -> Result<Vec<Source>> {
        let records = self.relational.find_sources(options)?;
        Ok(records.into_iter().map(Source::from_record).collect())
    }

    // ========== Batch and Sync ==========

    /// Prefetch all attributes for a batch of saved sources in one query
    pub fn prefetch(&self, sources: &mut [Source]) -> Result<()> {
        prefetch::prefetch(&self.relational, &self.registry, sources, self.prefetch_limit)
    }

    /// Rebuild one source's triples from its relational rows
    pub fn resync(&mut self, uri: &str) -> Result<()> {
        let parsed = SourceUri::parse(uri)?;
        let (store, rdf, _) = self.parts_mut();
        sync::resync(rdf, store, &parsed)
    }

    /// Wipe the triple store and rebuild it from the relational rows.
    ///
    /// Returns how many sources were exported.
    pub fn resync_all(&mut self) -> Result<usize> {
        let (store, rdf, _) = self.parts_mut();
        sync::resync_all(rdf, store)
    }

    // ========== Transactions ==========

    pub fn begin_transaction(&self) -> Result<()> {
        self.relational.begin_transaction()
    }

    pub fn commit(&self) -> Result<()> {
        self.relational.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.relational.rollback()
    }

    // ========== Statistics ==========

    pub fn stats(&self) -> Result<SemanticStats> {
        let store = self.relational.stats()?;
        Ok(SemanticStats {
            sources: store.sources,
            relations: store.relations,
            literals: store.literals,
            triples: self.rdf.len() as u64,
            queries: self.relational.queries_issued(),
        })
    }
}

/// Counters across both stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticStats {
    pub sources: u64,
    pub relations: u64,
    pub literals: u64,
    pub triples: u64,
    pub queries: u64,
}

impl fmt::Display for SemanticStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources, {} relations, {} literals, {} triples",
            self.sources, self.relations, self.literals, self.triples
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UnsavedIdentityMap;
    use crate::object::{ObjectKind, PushValue};
    use crate::rdf::TriplePattern;

    fn sample_ctx() -> SemanticStore {
        SemanticStore::open_in_memory(PredicateRegistry::new()).unwrap()
    }

    fn mem(ctx: &SemanticStore) -> &MemoryTripleStore {
        ctx.rdf().as_any().downcast_ref::<MemoryTripleStore>().unwrap()
    }

    fn u(s: &str) -> SourceUri {
        SourceUri::parse(s).unwrap()
    }

    #[test]
    fn test_get_not_found_names_the_uri() {
        let ctx = sample_ctx();
        let err = ctx.get("http://example.org/missing").unwrap_err();
        assert!(err.to_string().contains("http://example.org/missing"));
    }

    #[test]
    fn test_save_mirrors_into_rdf() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/title";
        let mut source = ctx.create("http://example.org/a").unwrap();
        source.push(&ctx, pred, PushValue::literal("hello@en")).unwrap();
        source.save(&mut ctx).unwrap();

        let triples = ctx
            .rdf()
            .query(&TriplePattern::for_subject(u("http://example.org/a")))
            .unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].predicate, pred);
    }

    #[test]
    fn test_untouched_resave_writes_no_triples() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/title";
        let mut source = ctx.create("http://example.org/a").unwrap();
        source.push(&ctx, pred, PushValue::literal("v")).unwrap();
        source.save(&mut ctx).unwrap();

        let writes = mem(&ctx).write_count();
        let removes = mem(&ctx).remove_count();

        // Same instance again: the collection cache was dropped on save
        source.save(&mut ctx).unwrap();
        // And a freshly fetched instance with no touched attributes
        let mut fresh = ctx.get("http://example.org/a").unwrap();
        fresh.save(&mut ctx).unwrap();

        assert_eq!(mem(&ctx).write_count(), writes);
        assert_eq!(mem(&ctx).remove_count(), removes);
    }

    #[test]
    fn test_incremental_sync_leaves_other_predicates_alone() {
        let mut ctx = sample_ctx();
        let pred_a = "http://example.org/a";
        let pred_b = "http://example.org/b";
        let mut source = ctx.create("http://example.org/s").unwrap();
        source.push(&ctx, pred_a, PushValue::literal("one")).unwrap();
        source.push(&ctx, pred_b, PushValue::literal("stable")).unwrap();
        source.save(&mut ctx).unwrap();

        let mut source = ctx.get("http://example.org/s").unwrap();
        source.push(&ctx, pred_a, PushValue::literal("two")).unwrap();
        source.save(&mut ctx).unwrap();

        let a_triples = ctx
            .rdf()
            .query(&TriplePattern::for_subject_predicate(
                u("http://example.org/s"),
                pred_a,
            ))
            .unwrap();
        let b_triples = ctx
            .rdf()
            .query(&TriplePattern::for_subject_predicate(
                u("http://example.org/s"),
                pred_b,
            ))
            .unwrap();
        assert_eq!(a_triples.len(), 2);
        assert_eq!(b_triples.len(), 1);
    }

    #[test]
    fn test_prefetch_matches_lazy_reads_with_one_query() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/tag";
        for (uri, tags) in [
            ("http://example.org/a", vec!["x", "y"]),
            ("http://example.org/b", vec!["z"]),
            ("http://example.org/c", vec![]),
        ] {
            let mut source = ctx.create(uri).unwrap();
            for tag in tags {
                source.push(&ctx, pred, PushValue::literal(tag)).unwrap();
            }
            source.save(&mut ctx).unwrap();
        }

        // Lazy path, one instance per source
        let mut lazy: Vec<Vec<String>> = Vec::new();
        for uri in ["http://example.org/a", "http://example.org/b", "http://example.org/c"] {
            let mut source = ctx.get(uri).unwrap();
            lazy.push(
                source
                    .values(&ctx, pred)
                    .unwrap()
                    .iter()
                    .map(|v| v.to_string())
                    .collect(),
            );
        }

        // Prefetched path: one query for the whole batch, none after
        let mut batch = vec![
            ctx.get("http://example.org/a").unwrap(),
            ctx.get("http://example.org/b").unwrap(),
            ctx.get("http://example.org/c").unwrap(),
        ];
        let before = ctx.relational().queries_issued();
        ctx.prefetch(&mut batch).unwrap();
        assert_eq!(ctx.relational().queries_issued(), before + 1);

        let before = ctx.relational().queries_issued();
        for (source, expected) in batch.iter_mut().zip(&lazy) {
            let values: Vec<String> = source
                .values(&ctx, pred)
                .unwrap()
                .iter()
                .map(|v| v.to_string())
                .collect();
            assert_eq!(&values, expected);
        }
        assert_eq!(ctx.relational().queries_issued(), before);
    }

    #[test]
    fn test_single_removal_deferred_bulk_removal_immediate() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/tag";
        let mut source = ctx.create("http://example.org/a").unwrap();
        source.push(&ctx, pred, PushValue::literal("x")).unwrap();
        source.push(&ctx, pred, PushValue::literal("y")).unwrap();
        source.save(&mut ctx).unwrap();

        // Deferred: another instance keeps seeing the value until save
        let mut editor = ctx.get("http://example.org/a").unwrap();
        assert!(editor.remove_value(&ctx, pred, PushValue::literal("x")).unwrap());
        let mut observer = ctx.get("http://example.org/a").unwrap();
        assert_eq!(observer.values(&ctx, pred).unwrap().len(), 2);
        editor.save(&mut ctx).unwrap();
        let mut observer = ctx.get("http://example.org/a").unwrap();
        assert_eq!(observer.values(&ctx, pred).unwrap().len(), 1);

        // Immediate: bulk removal is write-through in both stores
        let mut editor = ctx.get("http://example.org/a").unwrap();
        editor.remove_all(&mut ctx, pred).unwrap();
        let mut observer = ctx.get("http://example.org/a").unwrap();
        assert!(observer.values(&ctx, pred).unwrap().is_empty());
        assert!(ctx
            .rdf()
            .query(&TriplePattern::for_subject_predicate(
                u("http://example.org/a"),
                pred,
            ))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unsaved_identity_converges_to_one_row() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/knows";
        let shared = "http://example.org/shared";
        let mut session = UnsavedIdentityMap::new();

        let mut a = ctx.create("http://example.org/a").unwrap();
        a.push_in(&ctx, &mut session, pred, PushValue::uri(shared).unwrap())
            .unwrap();
        let mut b = ctx.create("http://example.org/b").unwrap();
        b.push_in(&ctx, &mut session, pred, PushValue::uri(shared).unwrap())
            .unwrap();

        a.save(&mut ctx).unwrap();
        b.save(&mut ctx).unwrap();

        let record = ctx.relational().get_source(&u(shared)).unwrap().unwrap();
        let a_rel = &ctx.relational().relations_for(a.id().unwrap(), pred).unwrap()[0];
        let b_rel = &ctx.relational().relations_for(b.id().unwrap(), pred).unwrap()[0];
        assert_eq!(a_rel.object.object_id(), record.id);
        assert_eq!(b_rel.object.object_id(), record.id);
    }

    #[test]
    fn test_autosync_off_then_resync() {
        let mut ctx = sample_ctx();
        ctx.set_autosync(false);
        let pred = "http://example.org/title";
        let mut source = ctx.create("http://example.org/a").unwrap();
        source.push(&ctx, pred, PushValue::literal("v")).unwrap();
        source.save(&mut ctx).unwrap();
        assert_eq!(ctx.rdf().len(), 0);

        ctx.resync("http://example.org/a").unwrap();
        assert_eq!(ctx.rdf().len(), 1);
    }

    #[test]
    fn test_resync_all_rebuilds_everything() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/title";
        for uri in ["http://example.org/a", "http://example.org/b"] {
            let mut source = ctx.create(uri).unwrap();
            source.push(&ctx, pred, PushValue::literal("v")).unwrap();
            source.save(&mut ctx).unwrap();
        }
        // Poison the triple side, then rebuild
        ctx.rdf_mut()
            .write(
                &u("http://example.org/stale"),
                "http://example.org/p",
                &crate::rdf::Term::Literal("junk".to_string()),
            )
            .unwrap();

        let exported = ctx.resync_all().unwrap();
        assert_eq!(exported, 2);
        assert!(ctx
            .rdf()
            .query(&TriplePattern::for_subject(u("http://example.org/stale")))
            .unwrap()
            .is_empty());
        assert_eq!(ctx.rdf().len(), 2);
    }

    #[test]
    fn test_find_through_returns_hydrated_sources() {
        let mut ctx = sample_ctx();
        let pred = "http://example.org/title";
        let mut source = ctx.create("http://example.org/a").unwrap();
        source.push(&ctx, pred, PushValue::literal("Moby Dick")).unwrap();
        source.save(&mut ctx).unwrap();

        let found = ctx
            .find_through(pred, "Moby Dick", &QueryOptions::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uri().as_str(), "http://example.org/a");
        assert!(!found[0].is_new());

        let none = ctx
            .find_through(
                pred,
                "Moby Dick",
                &QueryOptions::new().with_kind(ObjectKind::Source),
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_stats_counts_both_stores() {
        let mut ctx = sample_ctx();
        let mut source = ctx.create("http://example.org/a").unwrap();
        source
            .push(&ctx, "http://example.org/p", PushValue::literal("v"))
            .unwrap();
        source.save(&mut ctx).unwrap();

        let stats = ctx.stats().unwrap();
        assert_eq!(stats.sources, 1);
        assert_eq!(stats.relations, 1);
        assert_eq!(stats.literals, 1);
        assert_eq!(stats.triples, 1);
        assert!(stats.queries > 0);
    }
}
