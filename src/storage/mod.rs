//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - sources(id, uri, kind, created_at, updated_at)
//! - relations(id, subject_id, predicate_uri, object_id, object_kind, rel_order)
//! - literal_values(id, text)

pub mod schema;
pub mod sqlite;

pub use sqlite::{QueryOptions, RelationStore, StoreStats};
