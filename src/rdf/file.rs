//! File-backed triple store
//!
//! Triples live in a JSON-lines file, one record per line, loaded whole
//! on open and rewritten after each mutation. Small-store simplicity;
//! swap in a real endpoint behind [`TripleStore`] when it outgrows this.

use super::{MemoryTripleStore, RdfTriple, Term, TriplePattern, TripleStore};
use crate::uri::SourceUri;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    subject: String,
    predicate: String,
    kind: String,
    value: String,
}

impl FileRecord {
    fn from_triple(triple: &RdfTriple) -> Self {
        let (kind, value) = match &triple.term {
            Term::Resource(uri) => ("resource", uri.as_str().to_string()),
            Term::Literal(text) => ("literal", text.clone()),
        };
        Self {
            subject: triple.subject.as_str().to_string(),
            predicate: triple.predicate.clone(),
            kind: kind.to_string(),
            value,
        }
    }

    fn into_triple(self) -> Result<RdfTriple> {
        let subject = SourceUri::parse(&self.subject)?;
        let term = match self.kind.as_str() {
            "resource" => Term::Resource(SourceUri::parse(&self.value)?),
            "literal" => Term::Literal(self.value),
            other => {
                return Err(Error::Validation(format!(
                    "unknown term kind in triple file: {other}"
                )))
            }
        };
        Ok(RdfTriple {
            subject,
            predicate: self.predicate,
            term,
        })
    }
}

/// JSON-lines triple store
pub struct FileTripleStore {
    path: PathBuf,
    mem: MemoryTripleStore,
}

impl FileTripleStore {
    /// Open a triple file, loading its records; a missing file starts empty
    pub fn open(path: &Path) -> Result<Self> {
        let mut mem = MemoryTripleStore::new();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: FileRecord = serde_json::from_str(line)?;
                let triple = record.into_triple()?;
                mem.write(&triple.subject, &triple.predicate, &triple.term)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            mem,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let mut buf = String::new();
        for triple in self.mem.query(&TriplePattern::all())? {
            let record = FileRecord::from_triple(&triple);
            buf.push_str(&serde_json::to_string(&record)?);
            buf.push('\n');
        }
        fs::write(&self.path, buf)?;
        Ok(())
    }
}

impl TripleStore for FileTripleStore {
    fn write(&mut self, subject: &SourceUri, predicate: &str, term: &Term) -> Result<()> {
        self.mem.write(subject, predicate, term)?;
        self.persist()
    }

    fn remove(&mut self, pattern: &TriplePattern) -> Result<usize> {
        let removed = self.mem.remove(pattern)?;
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    fn query(&self, pattern: &TriplePattern) -> Result<Vec<RdfTriple>> {
        self.mem.query(pattern)
    }

    fn len(&self) -> usize {
        self.mem.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
