//! Database schema definitions

/// SQL to create the sources table
pub const CREATE_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uri TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL DEFAULT 'source',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create the relations table
pub const CREATE_RELATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id INTEGER NOT NULL REFERENCES sources(id),
    predicate_uri TEXT NOT NULL,
    object_id INTEGER NOT NULL,
    object_kind TEXT NOT NULL CHECK (object_kind IN ('source', 'literal')),
    rel_order INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create the literal_values table
pub const CREATE_LITERAL_VALUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS literal_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL to create indexes for common queries
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_relations_subject ON relations(subject_id, predicate_uri)",
    "CREATE INDEX IF NOT EXISTS idx_relations_object ON relations(object_id, object_kind)",
    "CREATE INDEX IF NOT EXISTS idx_relations_predicate ON relations(predicate_uri)",
    "CREATE INDEX IF NOT EXISTS idx_sources_kind ON sources(kind)",
];

/// All schema statements in creation order
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SOURCES_TABLE,
        CREATE_RELATIONS_TABLE,
        CREATE_LITERAL_VALUES_TABLE,
    ];
    stmts.extend_from_slice(CREATE_INDEXES);
    stmts
}
