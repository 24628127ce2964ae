//! # redb-backed Triple Storage
//!
//! A disk-backed triple store using the redb embedded database.
//!
//! - ACID transactions: every `WriteBatch` is one write transaction
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Rows of all scopes share one table keyed by `(scope_key, row_id)`, so a
//! scope is read with a single range scan.

use super::{
    BatchOutcome, ScopeWriter, StoredTriple, TripleRow, TripleStore, WriteBatch, free_index_in,
    live_rows, subject_uri, tagged_rows,
};
use crate::{Namespace, RatioError, RecordId, RecordInfo, Scope, Term};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Table for triples: (scope_key, row_id) -> postcard `TripleRow`
const TRIPLES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("triples");

/// Table for namespace bindings: prefix -> uri
const NAMESPACES: TableDefinition<&str, &str> = TableDefinition::new("namespaces");

/// Table for the record catalog: record id -> postcard `RecordInfo`
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Table for identities: name -> uri
const IDENTITIES: TableDefinition<&str, &str> = TableDefinition::new("identities");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_ROW_ID: &str = "next_row_id";
const NEXT_RECORD_ID: &str = "next_record_id";

fn io_err(e: impl std::fmt::Display) -> RatioError {
    RatioError::IoError(e.to_string())
}

fn encode_info(info: &RecordInfo) -> Result<Vec<u8>, RatioError> {
    postcard::to_stdvec(info).map_err(|e| RatioError::SerializationError(e.to_string()))
}

/// Rows of one scope, keyed by row id.
fn scope_rows<T>(table: &T, scope: Scope) -> Result<BTreeMap<u64, TripleRow>, RatioError>
where
    T: ReadableTable<(u64, u64), &'static [u8]>,
{
    let key = scope.key();
    let mut rows = BTreeMap::new();
    for entry in table
        .range((key, 0u64)..=(key, u64::MAX))
        .map_err(io_err)?
    {
        let (k, v) = entry.map_err(io_err)?;
        let (_, row_id) = k.value();
        rows.insert(row_id, TripleRow::decode(v.value())?);
    }
    Ok(rows)
}

/// A disk-backed triple store using redb.
pub struct RedbTripleStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbTripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbTripleStore")
            .field("rows", &self.row_count().unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl RedbTripleStore {
    /// Open or create a triple database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RatioError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(TRIPLES).map_err(io_err)?;
            let _ = write_txn.open_table(NAMESPACES).map_err(io_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(io_err)?;
            let _ = write_txn.open_table(IDENTITIES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Total number of rows over all scopes, tombstoned ones included.
    pub fn row_count(&self) -> Result<u64, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TRIPLES).map_err(io_err)?;
        table.len().map_err(io_err)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), RatioError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    fn read_scope(&self, scope: Scope) -> Result<BTreeMap<u64, TripleRow>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TRIPLES).map_err(io_err)?;
        scope_rows(&table, scope)
    }
}

impl TripleStore for RedbTripleStore {
    fn triples(&self, scope: Scope) -> Result<Vec<StoredTriple>, RatioError> {
        live_rows(self.read_scope(scope)?.values())
    }

    fn tombstoned(&self, scope: Scope, tag: &str) -> Result<Vec<StoredTriple>, RatioError> {
        tagged_rows(self.read_scope(scope)?.values(), tag)
    }

    fn free_index(
        &self,
        scope: Scope,
        subject: &Term,
        predicate: &Term,
    ) -> Result<u64, RatioError> {
        let rows = self.read_scope(scope)?;
        Ok(free_index_in(
            rows.values(),
            &subject.to_n3(),
            &predicate.to_n3(),
        ))
    }

    fn apply(&mut self, scope: Scope, batch: &WriteBatch) -> Result<BatchOutcome, RatioError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let write_txn = self.db.begin_write().map_err(io_err)?;
        let outcome = {
            let mut triples = write_txn.open_table(TRIPLES).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            let mut next_row_id = meta
                .get(NEXT_ROW_ID)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let mut rows = scope_rows(&triples, scope)?;

            let mut writer = ScopeWriter::new(&mut rows, &mut next_row_id);
            let outcome = writer.apply(batch)?;
            let touched = std::mem::take(&mut writer.touched);
            let removed = std::mem::take(&mut writer.removed);

            for row_id in &removed {
                triples
                    .remove((scope.key(), *row_id))
                    .map_err(io_err)?;
            }
            for row_id in &touched {
                if let Some(row) = rows.get(row_id) {
                    let bytes = row.encode()?;
                    triples
                        .insert((scope.key(), *row_id), bytes.as_slice())
                        .map_err(io_err)?;
                }
            }
            meta.insert(NEXT_ROW_ID, next_row_id).map_err(io_err)?;

            debug!(
                scope = scope.key(),
                written = touched.len(),
                removed = removed.len(),
                "applied write batch"
            );
            outcome
        };
        write_txn.commit().map_err(io_err)?;

        Ok(outcome)
    }

    fn replace(
        &mut self,
        scope: Scope,
        rows: &[StoredTriple],
        namespaces: Option<&[Namespace]>,
    ) -> Result<(), RatioError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut triples = write_txn.open_table(TRIPLES).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            let old: Vec<u64> = scope_rows(&triples, scope)?.into_keys().collect();
            for row_id in old {
                triples
                    .remove((scope.key(), row_id))
                    .map_err(io_err)?;
            }

            let mut next_row_id = meta
                .get(NEXT_ROW_ID)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            for row in rows {
                let bytes = TripleRow::from_stored(row).encode()?;
                triples
                    .insert((scope.key(), next_row_id), bytes.as_slice())
                    .map_err(io_err)?;
                next_row_id += 1;
            }
            meta.insert(NEXT_ROW_ID, next_row_id).map_err(io_err)?;

            if let Some(namespaces) = namespaces {
                let mut table = write_txn.open_table(NAMESPACES).map_err(io_err)?;
                let mut bound = Vec::new();
                for entry in table.iter().map_err(io_err)? {
                    let (prefix, _) = entry.map_err(io_err)?;
                    bound.push(prefix.value().to_string());
                }
                for prefix in &bound {
                    table.remove(prefix.as_str()).map_err(io_err)?;
                }
                for ns in namespaces {
                    table
                        .insert(ns.prefix.as_str(), ns.uri.as_str())
                        .map_err(io_err)?;
                }
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<Namespace>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NAMESPACES).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (prefix, uri) = entry.map_err(io_err)?;
            out.push(Namespace::new(prefix.value(), uri.value()));
        }
        Ok(out)
    }

    fn used_subjects(&self) -> Result<BTreeSet<String>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let mut used = BTreeSet::new();

        let triples = read_txn.open_table(TRIPLES).map_err(io_err)?;
        for entry in triples.iter().map_err(io_err)? {
            let (_, v) = entry.map_err(io_err)?;
            if let Some(uri) = subject_uri(&TripleRow::decode(v.value())?) {
                used.insert(uri);
            }
        }

        let identities = read_txn.open_table(IDENTITIES).map_err(io_err)?;
        for entry in identities.iter().map_err(io_err)? {
            let (_, uri) = entry.map_err(io_err)?;
            used.insert(uri.value().to_string());
        }
        Ok(used)
    }

    fn create_record(&mut self, name: &str) -> Result<RecordId, RatioError> {
        let bytes = encode_info(&RecordInfo::new(name))?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        let id = {
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            let id = meta
                .get(NEXT_RECORD_ID)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(1);
            meta.insert(NEXT_RECORD_ID, id + 1).map_err(io_err)?;

            let mut records = write_txn.open_table(RECORDS).map_err(io_err)?;
            records.insert(id, bytes.as_slice()).map_err(io_err)?;
            id
        };
        write_txn.commit().map_err(io_err)?;
        Ok(RecordId(id))
    }

    fn update_record(&mut self, id: RecordId, info: &RecordInfo) -> Result<(), RatioError> {
        let bytes = encode_info(info)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut records = write_txn.open_table(RECORDS).map_err(io_err)?;
            if records.get(id.0).map_err(io_err)?.is_none() {
                return Err(RatioError::RecordNotFound(id));
            }
            records.insert(id.0, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn record(&self, id: RecordId) -> Result<Option<RecordInfo>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;
        match table.get(id.0).map_err(io_err)? {
            Some(bytes) => postcard::from_bytes(bytes.value())
                .map(Some)
                .map_err(|e| RatioError::DeserializationError(e.to_string())),
            None => Ok(None),
        }
    }

    fn records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (id, bytes) = entry.map_err(io_err)?;
            let info: RecordInfo = postcard::from_bytes(bytes.value())
                .map_err(|e| RatioError::DeserializationError(e.to_string()))?;
            out.push((RecordId(id.value()), info));
        }
        Ok(out)
    }

    fn register_identity(&mut self, name: &str, uri: &str) -> Result<(), RatioError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(IDENTITIES).map_err(io_err)?;
            table.insert(name, uri).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn identities(&self) -> Result<Vec<(String, String)>, RatioError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(IDENTITIES).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (name, uri) = entry.map_err(io_err)?;
            out.push((name.value().to_string(), uri.value().to_string()));
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
