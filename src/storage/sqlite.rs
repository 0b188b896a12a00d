//! SQLite storage implementation
//!
//! The relational store is the system of record: source rows, relation
//! rows and literal rows live here. Reads go through a query counter so
//! callers can observe how many round trips an operation cost.

use super::schema;
use crate::literal::LiteralValue;
use crate::object::{ObjectKind, ObjectRef};
use crate::registry::TYPE_PREDICATE;
use crate::triple::{FatObject, FatRow, SourceRecord, Triple};
use crate::uri::SourceUri;
use crate::{Error, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::cell::Cell;
use std::fmt;
use std::path::Path;

/// Options for the finder queries.
///
/// `join` and `condition` are raw SQL fragments and are only legal on
/// [`RelationStore::find_sources`]; the shaped finders reject them. `kind`
/// is consulted by `find_through` to pick the object table.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub kind: Option<ObjectKind>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub join: Option<String>,
    pub condition: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ObjectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn limit_param(&self) -> i64 {
        self.limit.map(|l| l as i64).unwrap_or(-1)
    }

    fn offset_param(&self) -> i64 {
        self.offset.unwrap_or(0) as i64
    }

    fn reject_custom_sql(&self, operation: &str) -> Result<()> {
        if self.join.is_some() || self.condition.is_some() {
            return Err(Error::InvalidArgument(format!(
                "custom join/condition cannot be combined with {operation}"
            )));
        }
        Ok(())
    }
}

/// SQLite-backed store for sources, relations and literal values
pub struct RelationStore {
    conn: Connection,
    // Read queries issued since open
    queries: Cell<u64>,
}

impl RelationStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            queries: Cell::new(0),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            queries: Cell::new(0),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn note_query(&self) {
        self.queries.set(self.queries.get() + 1);
    }

    /// Number of read queries issued since open
    pub fn queries_issued(&self) -> u64 {
        self.queries.get()
    }

    // ========== Source Operations ==========

    /// Insert a new source row, returning its id.
    ///
    /// A second insert for the same URI fails validation.
    pub fn insert_source(&self, uri: &SourceUri, kind: &str) -> Result<i64> {
        match self.conn.execute(
            "INSERT INTO sources (uri, kind) VALUES (?1, ?2)",
            params![uri.as_str(), kind],
        ) {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Validation(format!("source already exists: {uri}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a source row by URI
    pub fn get_source(&self, uri: &SourceUri) -> Result<Option<SourceRecord>> {
        self.note_query();
        self.conn
            .query_row(
                "SELECT id, uri, kind, created_at, updated_at FROM sources WHERE uri = ?1",
                [uri.as_str()],
                |row| self.row_to_record(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a source row by id
    pub fn get_source_by_id(&self, id: i64) -> Result<Option<SourceRecord>> {
        self.note_query();
        self.conn
            .query_row(
                "SELECT id, uri, kind, created_at, updated_at FROM sources WHERE id = ?1",
                [id],
                |row| self.row_to_record(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Whether a source row exists for a URI
    pub fn source_exists(&self, uri: &SourceUri) -> Result<bool> {
        self.note_query();
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sources WHERE uri = ?1",
                [uri.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Update a source row's kind and bump its timestamp
    pub fn update_source(&self, id: i64, kind: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sources SET kind = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![kind, id],
        )?;
        Ok(())
    }

    /// Delete a source row
    pub fn delete_source(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sources WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Count all source rows
    pub fn count_sources(&self) -> Result<u64> {
        self.note_query();
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// All source rows, in insertion order
    pub fn all_sources(&self) -> Result<Vec<SourceRecord>> {
        self.note_query();
        let mut stmt = self.conn.prepare(
            "SELECT id, uri, kind, created_at, updated_at FROM sources ORDER BY id",
        )?;
        let records = stmt
            .query_map([], |row| self.row_to_record(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    // ========== Relation Operations ==========

    /// Insert a relation row, returning its id
    pub fn insert_relation(
        &self,
        subject_id: i64,
        predicate: &str,
        object: &ObjectRef,
        rel_order: Option<i64>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO relations (subject_id, predicate_uri, object_id, object_kind, rel_order)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                subject_id,
                predicate,
                object.object_id(),
                object.kind().as_str(),
                rel_order,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Relations for one subject and predicate, ordered rows first
    pub fn relations_for(&self, subject_id: i64, predicate: &str) -> Result<Vec<Triple>> {
        self.note_query();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, subject_id, predicate_uri, object_id, object_kind, rel_order, created_at, updated_at
            FROM relations
            WHERE subject_id = ?1 AND predicate_uri = ?2
            ORDER BY rel_order IS NULL, rel_order, id
            "#,
        )?;
        let triples = stmt
            .query_map(params![subject_id, predicate], |row| self.row_to_triple(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(triples)
    }

    /// Count relations for one subject and predicate
    pub fn count_relations(&self, subject_id: i64, predicate: &str) -> Result<u64> {
        self.note_query();
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM relations WHERE subject_id = ?1 AND predicate_uri = ?2",
            params![subject_id, predicate],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete one relation row, and its literal row if the object is a literal
    pub fn delete_relation(&self, relation_id: i64, object: &ObjectRef) -> Result<()> {
        self.conn
            .execute("DELETE FROM relations WHERE id = ?1", [relation_id])?;
        if let ObjectRef::Literal(literal_id) = object {
            self.conn
                .execute("DELETE FROM literal_values WHERE id = ?1", [*literal_id])?;
        }
        Ok(())
    }

    /// Delete all relations for one subject and predicate.
    ///
    /// Literal rows referenced by the deleted relations are removed too.
    /// Returns the number of relations deleted.
    pub fn delete_relations(&self, subject_id: i64, predicate: &str) -> Result<usize> {
        self.conn.execute(
            r#"
            DELETE FROM literal_values WHERE id IN (
                SELECT object_id FROM relations
                WHERE subject_id = ?1 AND predicate_uri = ?2 AND object_kind = 'literal'
            )
            "#,
            params![subject_id, predicate],
        )?;
        let deleted = self.conn.execute(
            "DELETE FROM relations WHERE subject_id = ?1 AND predicate_uri = ?2",
            params![subject_id, predicate],
        )?;
        Ok(deleted)
    }

    /// Delete every relation a source participates in, on either side.
    ///
    /// Returns the number of relations deleted.
    pub fn delete_relations_for_source(&self, source_id: i64) -> Result<usize> {
        self.conn.execute(
            r#"
            DELETE FROM literal_values WHERE id IN (
                SELECT object_id FROM relations
                WHERE subject_id = ?1 AND object_kind = 'literal'
            )
            "#,
            [source_id],
        )?;
        let deleted = self.conn.execute(
            "DELETE FROM relations WHERE subject_id = ?1 OR (object_id = ?1 AND object_kind = 'source')",
            [source_id],
        )?;
        Ok(deleted)
    }

    /// Distinct predicates present on a subject
    pub fn predicates_for(&self, subject_id: i64) -> Result<Vec<String>> {
        self.note_query();
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT predicate_uri FROM relations WHERE subject_id = ?1 ORDER BY predicate_uri",
        )?;
        let predicates = stmt
            .query_map([subject_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(predicates)
    }

    // ========== Literal Operations ==========

    /// Insert a literal row, returning its id
    pub fn insert_literal(&self, text: &str) -> Result<i64> {
        self.conn
            .execute("INSERT INTO literal_values (text) VALUES (?1)", [text])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a literal row by id
    pub fn get_literal(&self, id: i64) -> Result<Option<LiteralValue>> {
        self.note_query();
        self.conn
            .query_row(
                "SELECT id, text FROM literal_values WHERE id = ?1",
                [id],
                |row| {
                    Ok(LiteralValue {
                        id: Some(row.get(0)?),
                        text: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    // ========== Finder Queries ==========

    /// Sources holding `predicate -> value`.
    ///
    /// The object table is picked by `options.kind`, or detected from the
    /// shape of `value` when unset. Custom join/condition fragments are
    /// rejected here.
    pub fn find_through(
        &self,
        predicate: &str,
        value: &str,
        options: &QueryOptions,
    ) -> Result<Vec<SourceRecord>> {
        options.reject_custom_sql("find_through")?;
        let kind = options.kind.unwrap_or_else(|| {
            if SourceUri::looks_like_uri(value) {
                ObjectKind::Source
            } else {
                ObjectKind::Literal
            }
        });
        self.note_query();
        let sql = match kind {
            ObjectKind::Source => {
                r#"
                SELECT DISTINCT s.id, s.uri, s.kind, s.created_at, s.updated_at
                FROM sources s
                JOIN relations r ON r.subject_id = s.id
                JOIN sources o ON o.id = r.object_id AND r.object_kind = 'source'
                WHERE r.predicate_uri = ?1 AND o.uri = ?2
                ORDER BY s.id
                LIMIT ?3 OFFSET ?4
                "#
            }
            ObjectKind::Literal => {
                r#"
                SELECT DISTINCT s.id, s.uri, s.kind, s.created_at, s.updated_at
                FROM sources s
                JOIN relations r ON r.subject_id = s.id
                JOIN literal_values l ON l.id = r.object_id AND r.object_kind = 'literal'
                WHERE r.predicate_uri = ?1 AND l.text = ?2
                ORDER BY s.id
                LIMIT ?3 OFFSET ?4
                "#
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(
                params![predicate, value, options.limit_param(), options.offset_param()],
                |row| self.row_to_record(row),
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    /// Source values a subject points at through a predicate.
    ///
    /// The mirror of [`RelationStore::find_through`]: given the subject,
    /// return the objects. Only source objects have identity, so asking
    /// for literals is an error.
    pub fn find_through_inverse(
        &self,
        predicate: &str,
        subject_uri: &SourceUri,
        options: &QueryOptions,
    ) -> Result<Vec<SourceRecord>> {
        options.reject_custom_sql("find_through_inverse")?;
        if options.kind == Some(ObjectKind::Literal) {
            return Err(Error::InvalidArgument(
                "find_through_inverse returns sources; literal objects have no identity"
                    .to_string(),
            ));
        }
        self.note_query();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT o.id, o.uri, o.kind, o.created_at, o.updated_at
            FROM sources o
            JOIN relations r ON r.object_id = o.id AND r.object_kind = 'source'
            JOIN sources s ON s.id = r.subject_id
            WHERE r.predicate_uri = ?1 AND s.uri = ?2
            ORDER BY o.id
            LIMIT ?3 OFFSET ?4
            "#,
        )?;
        let records = stmt
            .query_map(
                params![
                    predicate,
                    subject_uri.as_str(),
                    options.limit_param(),
                    options.offset_param(),
                ],
                |row| self.row_to_record(row),
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    /// Sources typed with `type_uri` via the rdf:type predicate
    pub fn find_by_type(
        &self,
        type_uri: &SourceUri,
        options: &QueryOptions,
    ) -> Result<Vec<SourceRecord>> {
        let forced = QueryOptions {
            kind: Some(ObjectKind::Source),
            ..options.clone()
        };
        self.find_through(TYPE_PREDICATE, type_uri.as_str(), &forced)
    }

    /// Generic source listing; the one finder where raw join/condition
    /// fragments are honored. `options.kind` is not consulted here.
    pub fn find_sources(&self, options: &QueryOptions) -> Result<Vec<SourceRecord>> {
        self.note_query();
        let mut sql = String::from(
            "SELECT DISTINCT s.id, s.uri, s.kind, s.created_at, s.updated_at FROM sources s",
        );
        if let Some(join) = &options.join {
            sql.push(' ');
            sql.push_str(join);
        }
        if let Some(condition) = &options.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql.push_str(" ORDER BY s.id LIMIT ?1 OFFSET ?2");
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![options.limit_param(), options.offset_param()],
                |row| self.row_to_record(row),
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    // ========== Fat Rows ==========

    /// All relations for a set of subjects, object payloads joined in.
    ///
    /// One query regardless of how many subjects are passed. Rows come
    /// back grouped by subject and predicate, ordered rows first within
    /// each group.
    pub fn fetch_fat_rows(&self, subject_ids: &[i64]) -> Result<Vec<FatRow>> {
        if subject_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.note_query();
        let placeholders = vec!["?"; subject_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT r.id, r.subject_id, r.predicate_uri, r.rel_order, r.object_kind,
                   s.id, s.uri, s.kind, s.created_at, s.updated_at,
                   l.id, l.text
            FROM relations r
            LEFT JOIN sources s ON r.object_kind = 'source' AND s.id = r.object_id
            LEFT JOIN literal_values l ON r.object_kind = 'literal' AND l.id = r.object_id
            WHERE r.subject_id IN ({placeholders})
            ORDER BY r.subject_id, r.predicate_uri, r.rel_order IS NULL, r.rel_order, r.id
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(subject_ids.iter()), |row| {
                self.row_to_fat(row)
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ========== Row Mapping ==========

    fn row_to_record(&self, row: &rusqlite::Row) -> rusqlite::Result<SourceRecord> {
        let uri_str: String = row.get(1)?;
        let uri = SourceUri::parse(&uri_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(SourceRecord {
            id: row.get(0)?,
            uri,
            kind: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn row_to_triple(&self, row: &rusqlite::Row) -> rusqlite::Result<Triple> {
        let object_id: i64 = row.get(3)?;
        let kind_str: String = row.get(4)?;
        let kind: ObjectKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let object = match kind {
            ObjectKind::Source => ObjectRef::Source(object_id),
            ObjectKind::Literal => ObjectRef::Literal(object_id),
        };
        Ok(Triple {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            predicate: row.get(2)?,
            object,
            rel_order: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn row_to_fat(&self, row: &rusqlite::Row) -> rusqlite::Result<FatRow> {
        let kind_str: String = row.get(4)?;
        let kind: ObjectKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let object = match kind {
            ObjectKind::Source => {
                let uri_str: String = row.get(6)?;
                let uri = SourceUri::parse(&uri_str).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                FatObject::Source(SourceRecord {
                    id: row.get(5)?,
                    uri,
                    kind: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                })
            }
            ObjectKind::Literal => FatObject::Literal(LiteralValue {
                id: Some(row.get(10)?),
                text: row.get(11)?,
            }),
        };
        Ok(FatRow {
            relation_id: row.get(0)?,
            subject_id: row.get(1)?,
            predicate: row.get(2)?,
            rel_order: row.get(3)?,
            object,
        })
    }

    // ========== Transactions ==========

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ========== Statistics ==========

    /// Row counts across the three tables
    pub fn stats(&self) -> Result<StoreStats> {
        self.note_query();
        let relations: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;
        let literals: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM literal_values", [], |row| row.get(0))?;
        Ok(StoreStats {
            sources: self.count_sources()?,
            relations: relations as u64,
            literals: literals as u64,
        })
    }
}

/// Row counts for the relational side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub sources: u64,
    pub relations: u64,
    pub literals: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources, {} relations, {} literals",
            self.sources, self.relations, self.literals
        )
    }
}
