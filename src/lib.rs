//! # Semstore - Dual-Store Semantic Source Persistence
//!
//! A persistence layer for URI-identified "sources" that carry an open-ended
//! set of predicate/value attributes, kept in two backends at once:
//! - SQLite rows as the system of record (lookups, joins, transactional writes)
//! - an external RDF triple store behind a trait (graph view, standard export)
//!
//! Semstore provides:
//! - Lazily loaded, dirty-tracked per-predicate attribute caches
//! - Batched prefetching of all predicates for many sources in one query
//! - Diff-based triple-store synchronization that only touches dirty predicates
//! - A per-batch identity map deduplicating unsaved sources by URI
//! - A config-time predicate registry (reference-only, single-valued, owned)

pub mod uri;
pub mod literal;
pub mod object;
pub mod triple;
pub mod registry;
pub mod identity;
pub mod collection;
pub mod prefetch;
pub mod source;
pub mod semantic;
pub mod storage;
pub mod rdf;
pub mod import;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use uri::SourceUri;
pub use literal::{LiteralValue, ParsedLiteral};
pub use object::{ObjectKind, ObjectRef, PushValue, SemanticObject, SemanticValue, SourceRef};
pub use triple::{FatObject, FatRow, SourceRecord, Triple};
pub use registry::{PredicateRegistry, PredicateSpec, TYPE_PREDICATE};
pub use identity::UnsavedIdentityMap;
pub use collection::{CollectionItem, PredicateCollection};
pub use source::Source;
pub use semantic::{SemanticStats, SemanticStore};
pub use storage::{QueryOptions, RelationStore};
pub use rdf::{MemoryTripleStore, RdfTriple, Term, TriplePattern, TripleStore};
pub use import::{ImportMode, ImportRecord};

/// Result type alias for Semstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Semstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Batch of {size} sources exceeds the prefetch limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Import failed for {uri}: {source}")]
    Import {
        uri: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error as an import failure for the record identified by `uri`.
    pub fn import(uri: impl Into<String>, source: Error) -> Self {
        Error::Import {
            uri: uri.into(),
            source: Box::new(source),
        }
    }
}
