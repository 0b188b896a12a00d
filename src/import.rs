//! Batch import
//!
//! Imports read records of `uri + kind + attribute lists` and apply them
//! against the store under one of four modes. One relational transaction
//! and one unsaved-identity session span the whole batch; cross-record
//! mentions of the same new URI land on one row. The triple side is not
//! transactional, so callers that need a coherent RDF view after a failed
//! batch run a resync.

use crate::identity::UnsavedIdentityMap;
use crate::object::PushValue;
use crate::semantic::SemanticStore;
use crate::source::Source;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ========== Records ==========

/// One source in an import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
}

/// One predicate's values in an import record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub predicate: String,
    pub values: Vec<ValueSpec>,
}

/// A value in an import record: `{"uri": ...}` or `{"literal": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSpec {
    Uri(String),
    Literal(String),
}

impl ValueSpec {
    fn to_push_value(&self) -> Result<PushValue> {
        match self {
            ValueSpec::Uri(uri) => PushValue::uri(uri),
            ValueSpec::Literal(text) => Ok(PushValue::literal(text.clone())),
        }
    }
}

/// Read an import file (a JSON array of records)
pub fn read_records(path: &Path) -> Result<Vec<ImportRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ========== Modes and Policy ==========

/// What to do when an imported URI already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Leave existing sources untouched
    Skip,
    /// Append the record's values to whatever is there
    Add,
    /// Replace the value lists of the record's predicates only
    Update,
    /// Clear every stored predicate, then apply the record
    Overwrite,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Skip => "skip",
            ImportMode::Add => "add",
            ImportMode::Update => "update",
            ImportMode::Overwrite => "overwrite",
        }
    }
}

impl FromStr for ImportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(ImportMode::Skip),
            "add" => Ok(ImportMode::Add),
            "update" => Ok(ImportMode::Update),
            "overwrite" => Ok(ImportMode::Overwrite),
            _ => Err(Error::InvalidArgument(format!(
                "unknown import mode: {s} (expected skip, add, update or overwrite)"
            ))),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do with a record that fails to import
pub enum ErrorPolicy<'a> {
    /// Roll the batch back and return the first error
    FailFast,
    /// Collect errors and keep going
    Collect(&'a mut Vec<Error>),
}

/// Observer for batch progress
pub trait ProgressSink {
    fn begin(&mut self, _total: usize) {}
    fn advance(&mut self, _label: &str) {}
    fn finish(&mut self) {}
}

/// The no-op sink
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Outcome counters for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub failed: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} imported, {} failed", self.imported, self.failed)
    }
}

// ========== Import ==========

/// Apply one record under a mode, saving the touched source
pub fn import_record(
    ctx: &mut SemanticStore,
    session: &mut UnsavedIdentityMap,
    record: &ImportRecord,
    mode: ImportMode,
) -> Result<Source> {
    let existing = ctx.try_get(&record.uri)?;
    let is_existing = existing.is_some();
    let mut source = match existing {
        Some(source) => {
            if mode == ImportMode::Skip {
                return Ok(source);
            }
            source
        }
        None => match &record.kind {
            Some(kind) => ctx.create_with_kind(&record.uri, kind)?,
            None => ctx.create(&record.uri)?,
        },
    };

    if is_existing {
        if let Some(kind) = &record.kind {
            if matches!(mode, ImportMode::Update | ImportMode::Overwrite) {
                source.set_kind(kind);
            }
        }
        if mode == ImportMode::Overwrite {
            if let Some(id) = source.id() {
                for predicate in ctx.relational().predicates_for(id)? {
                    source.remove_all(ctx, &predicate)?;
                }
            }
        }
    }

    for attribute in &record.attributes {
        if is_existing && mode == ImportMode::Update {
            let mut values = Vec::with_capacity(attribute.values.len());
            for value in &attribute.values {
                values.push(value.to_push_value()?);
            }
            source.replace_in(&*ctx, session, &attribute.predicate, values)?;
        } else {
            for value in &attribute.values {
                source.push_in(&*ctx, session, &attribute.predicate, value.to_push_value()?)?;
            }
        }
    }

    source.save(ctx)?;
    Ok(source)
}

/// Apply a batch of records in one transaction and one identity session.
///
/// Under [`ErrorPolicy::FailFast`] the transaction rolls back and the
/// offending record's error comes back wrapped with its URI. Under
/// [`ErrorPolicy::Collect`] failed records are skipped and counted.
pub fn import_records(
    ctx: &mut SemanticStore,
    records: &[ImportRecord],
    mode: ImportMode,
    mut policy: ErrorPolicy<'_>,
    progress: &mut dyn ProgressSink,
) -> Result<ImportStats> {
    let mut session = UnsavedIdentityMap::new();
    let mut stats = ImportStats::default();

    ctx.begin_transaction()?;
    progress.begin(records.len());
    for record in records {
        match import_record(ctx, &mut session, record, mode) {
            Ok(_) => stats.imported += 1,
            Err(e) => {
                let wrapped = Error::import(&record.uri, e);
                match &mut policy {
                    ErrorPolicy::FailFast => {
                        ctx.rollback()?;
                        progress.finish();
                        return Err(wrapped);
                    }
                    ErrorPolicy::Collect(errors) => {
                        stats.failed += 1;
                        errors.push(wrapped);
                    }
                }
            }
        }
        progress.advance(&record.uri);
    }
    ctx.commit()?;
    progress.finish();

    tracing::info!(
        imported = stats.imported,
        failed = stats.failed,
        mode = %mode,
        "import finished"
    );
    Ok(stats)
}
