//! Stored row shapes: source records, relation triples and fat rows
//!
//! These are the structs the relational store reads and writes. Fat rows
//! are the batch-join shape used by prefetch, carrying the object payload
//! inline so hydrating a batch needs no follow-up queries.

use crate::literal::LiteralValue;
use crate::object::ObjectRef;
use crate::uri::SourceUri;
use serde::{Deserialize, Serialize};

/// A row from the `sources` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub uri: SourceUri,
    pub kind: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `relations` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub id: i64,
    pub subject_id: i64,
    pub predicate: String,
    pub object: ObjectRef,
    pub rel_order: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// The object payload of a fat row, joined in from its own table
#[derive(Debug, Clone)]
pub enum FatObject {
    Source(SourceRecord),
    Literal(LiteralValue),
}

/// A relation row with its object payload already joined in.
///
/// One batch query over a set of subjects yields these, grouped by
/// `(subject_id, predicate)` on the way into collection caches.
#[derive(Debug, Clone)]
pub struct FatRow {
    pub relation_id: i64,
    pub subject_id: i64,
    pub predicate: String,
    pub rel_order: Option<i64>,
    pub object: FatObject,
}
