//! RDF side of the dual store
//!
//! Every saved source is mirrored as triples in an external triple store
//! behind the [`TripleStore`] trait. The in-memory implementation here
//! doubles as the test double; [`file::FileTripleStore`] persists to disk.

pub mod file;
pub mod sync;

use crate::uri::SourceUri;
use crate::Result;
use std::any::Any;
use std::fmt;

// ========== Triple Model ==========

/// An RDF object term: a resource or a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Resource(SourceUri),
    Literal(String),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Resource(uri) => write!(f, "<{uri}>"),
            Term::Literal(text) => write!(f, "\"{text}\""),
        }
    }
}

/// One triple in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdfTriple {
    pub subject: SourceUri,
    pub predicate: String,
    pub term: Term,
}

impl fmt::Display for RdfTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {}", self.subject, self.predicate, self.term)
    }
}

/// A triple pattern; `None` positions match anything
#[derive(Debug, Clone, Default)]
pub struct TriplePattern {
    pub subject: Option<SourceUri>,
    pub predicate: Option<String>,
    pub object: Option<Term>,
}

impl TriplePattern {
    /// The wildcard pattern
    pub fn all() -> Self {
        Self::default()
    }

    /// Everything a subject says
    pub fn for_subject(subject: SourceUri) -> Self {
        Self {
            subject: Some(subject),
            predicate: None,
            object: None,
        }
    }

    /// One subject's values for one predicate
    pub fn for_subject_predicate(subject: SourceUri, predicate: impl Into<String>) -> Self {
        Self {
            subject: Some(subject),
            predicate: Some(predicate.into()),
            object: None,
        }
    }

    /// Every triple pointing at an object
    pub fn for_object(object: Term) -> Self {
        Self {
            subject: None,
            predicate: None,
            object: Some(object),
        }
    }

    pub fn matches(&self, triple: &RdfTriple) -> bool {
        if let Some(subject) = &self.subject {
            if *subject != triple.subject {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if *predicate != triple.predicate {
                return false;
            }
        }
        if let Some(object) = &self.object {
            if *object != triple.term {
                return false;
            }
        }
        true
    }
}

// ========== Store Trait ==========

/// A triple store the semantic layer can mirror into.
///
/// Writes are idempotent: writing a triple that already exists is a no-op
/// for the stored set.
pub trait TripleStore {
    /// Write one triple
    fn write(&mut self, subject: &SourceUri, predicate: &str, term: &Term) -> Result<()>;

    /// Remove every triple matching a pattern, returning how many went
    fn remove(&mut self, pattern: &TriplePattern) -> Result<usize>;

    /// All triples matching a pattern
    fn query(&self, pattern: &TriplePattern) -> Result<Vec<RdfTriple>>;

    /// Number of stored triples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downcasting hook for tests that need the concrete store
    fn as_any(&self) -> &dyn Any;
}

// ========== In-Memory Store ==========

/// Vec-backed triple store, also the test double.
///
/// Counts write and remove calls so tests can assert which saves touched
/// the store at all.
#[derive(Debug, Default)]
pub struct MemoryTripleStore {
    triples: Vec<RdfTriple>,
    writes: u64,
    removes: u64,
}

impl MemoryTripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls received (including duplicate writes)
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Number of remove calls received
    pub fn remove_count(&self) -> u64 {
        self.removes
    }
}

impl TripleStore for MemoryTripleStore {
    fn write(&mut self, subject: &SourceUri, predicate: &str, term: &Term) -> Result<()> {
        self.writes += 1;
        let triple = RdfTriple {
            subject: subject.clone(),
            predicate: predicate.to_string(),
            term: term.clone(),
        };
        if !self.triples.contains(&triple) {
            self.triples.push(triple);
        }
        Ok(())
    }

    fn remove(&mut self, pattern: &TriplePattern) -> Result<usize> {
        self.removes += 1;
        let before = self.triples.len();
        self.triples.retain(|t| !pattern.matches(t));
        Ok(before - self.triples.len())
    }

    fn query(&self, pattern: &TriplePattern) -> Result<Vec<RdfTriple>> {
        Ok(self
            .triples
            .iter()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect())
    }

    fn len(&self) -> usize {
        self.triples.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> SourceUri {
        SourceUri::parse(s).unwrap()
    }

    fn sample_store() -> MemoryTripleStore {
        let mut store = MemoryTripleStore::new();
        store
            .write(
                &uri("http://example.org/s"),
                "http://example.org/p",
                &Term::Literal("one".to_string()),
            )
            .unwrap();
        store
            .write(
                &uri("http://example.org/s"),
                "http://example.org/q",
                &Term::Resource(uri("http://example.org/o")),
            )
            .unwrap();
        store
            .write(
                &uri("http://example.org/t"),
                "http://example.org/p",
                &Term::Literal("two".to_string()),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_write_dedupes_but_counts() {
        let mut store = MemoryTripleStore::new();
        let s = uri("http://example.org/s");
        let term = Term::Literal("v".to_string());
        store.write(&s, "http://example.org/p", &term).unwrap();
        store.write(&s, "http://example.org/p", &term).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_query_by_subject() {
        let store = sample_store();
        let found = store
            .query(&TriplePattern::for_subject(uri("http://example.org/s")))
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_query_by_subject_predicate() {
        let store = sample_store();
        let found = store
            .query(&TriplePattern::for_subject_predicate(
                uri("http://example.org/s"),
                "http://example.org/p",
            ))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].term, Term::Literal("one".to_string()));
    }

    #[test]
    fn test_remove_by_object() {
        let mut store = sample_store();
        let removed = store
            .remove(&TriplePattern::for_object(Term::Resource(uri(
                "http://example.org/o",
            ))))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_wildcard_pattern_matches_all() {
        let mut store = sample_store();
        let removed = store.remove(&TriplePattern::all()).unwrap();
        assert_eq!(removed, 3);
        assert!(store.is_empty());
    }
}
