//! # Triple Storage
//!
//! Durable tables of triples scoped by graph, with no business rules.
//!
//! The `TripleStore` trait is the seam between the store and its backends:
//! - `MemoryTripleStore`: volatile, for tests and scratch sessions
//! - `RedbTripleStore`: disk-backed ACID storage using redb
//!
//! Every mutation goes through a `WriteBatch` that a backend applies inside
//! one write transaction. Index allocation (`WriteOp::Append`) and
//! tombstone/restore happen inside that transaction, so two writers can never
//! hand out the same property index or interleave half of a delete.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryTripleStore;
pub use redb_store::RedbTripleStore;

use crate::{Namespace, RatioError, RecordId, RecordInfo, Scope, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// ROWS
// =============================================================================

/// A live triple together with its ordering slot, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoredTriple {
    pub triple: Triple,
    pub index: Option<u64>,
}

impl StoredTriple {
    #[must_use]
    pub fn new(triple: Triple, index: Option<u64>) -> Self {
        Self { triple, index }
    }

    /// A triple without ordering slot.
    #[must_use]
    pub fn plain(triple: Triple) -> Self {
        Self::new(triple, None)
    }
}

/// The persisted form of one row. Terms are kept in canonical notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleRow {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub property_index: Option<u64>,
    pub tombstone: Option<String>,
}

impl TripleRow {
    #[must_use]
    pub fn from_stored(row: &StoredTriple) -> Self {
        Self {
            subject: row.triple.subject.to_n3(),
            predicate: row.triple.predicate.to_n3(),
            object: row.triple.object.to_n3(),
            property_index: row.index,
            tombstone: None,
        }
    }

    pub fn to_stored(&self) -> Result<StoredTriple, RatioError> {
        Ok(StoredTriple::new(
            Triple::new(
                Term::parse_n3(&self.subject)?,
                Term::parse_n3(&self.predicate)?,
                Term::parse_n3(&self.object)?,
            ),
            self.property_index,
        ))
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.tombstone.is_none()
    }

    fn matches(&self, subject: &str, predicate: &str) -> bool {
        self.subject == subject && self.predicate == predicate
    }

    pub fn encode(&self) -> Result<Vec<u8>, RatioError> {
        postcard::to_stdvec(self).map_err(|e| RatioError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RatioError> {
        postcard::from_bytes(bytes).map_err(|e| RatioError::DeserializationError(e.to_string()))
    }
}

// =============================================================================
// WRITE BATCH
// =============================================================================

/// One mutation inside a `WriteBatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert a row as given.
    Insert(StoredTriple),
    /// Insert `(subject, predicate, object)` at the free index of
    /// `(subject, predicate)`, allocated inside the transaction.
    Append {
        subject: Term,
        predicate: Term,
        object: Term,
    },
    /// Delete the live rows of `(subject, predicate)` carrying exactly `index`.
    Remove {
        subject: Term,
        predicate: Term,
        index: Option<u64>,
    },
    /// Tag every live row in which `node` is subject or object.
    Tombstone { node: Term, tag: String },
    /// Clear the tag on every row carrying it.
    Restore { tag: String },
}

/// An ordered list of mutations applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple, index: Option<u64>) -> &mut Self {
        self.ops.push(WriteOp::Insert(StoredTriple::new(triple, index)));
        self
    }

    pub fn append(&mut self, subject: Term, predicate: Term, object: Term) -> &mut Self {
        self.ops.push(WriteOp::Append {
            subject,
            predicate,
            object,
        });
        self
    }

    pub fn remove(&mut self, subject: Term, predicate: Term, index: Option<u64>) -> &mut Self {
        self.ops.push(WriteOp::Remove {
            subject,
            predicate,
            index,
        });
        self
    }

    pub fn tombstone(&mut self, node: Term, tag: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Tombstone {
            node,
            tag: tag.into(),
        });
        self
    }

    pub fn restore(&mut self, tag: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Restore { tag: tag.into() });
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// What a batch did, in operation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Index allocated by each `Append`.
    pub appended: Vec<u64>,
    /// Rows tagged by `Tombstone` ops.
    pub tombstoned: Vec<StoredTriple>,
    /// Rows whose tag was cleared by `Restore` ops.
    pub restored: Vec<StoredTriple>,
}

/// Applies a batch to the rows of one scope.
///
/// Shared by both backends: the in-memory store hands in its own maps, the
/// redb store hands in the rows it read inside the write transaction and
/// afterwards persists `touched` and deletes `removed`.
pub(crate) struct ScopeWriter<'a> {
    rows: &'a mut BTreeMap<u64, TripleRow>,
    next_row_id: &'a mut u64,
    pub(crate) touched: BTreeSet<u64>,
    pub(crate) removed: BTreeSet<u64>,
}

impl<'a> ScopeWriter<'a> {
    pub(crate) fn new(rows: &'a mut BTreeMap<u64, TripleRow>, next_row_id: &'a mut u64) -> Self {
        Self {
            rows,
            next_row_id,
            touched: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    pub(crate) fn apply(&mut self, batch: &WriteBatch) -> Result<BatchOutcome, RatioError> {
        let mut outcome = BatchOutcome::default();

        for op in batch.ops() {
            match op {
                WriteOp::Insert(row) => {
                    self.push(TripleRow::from_stored(row));
                }
                WriteOp::Append {
                    subject,
                    predicate,
                    object,
                } => {
                    let index = free_index_in(
                        self.rows.values(),
                        &subject.to_n3(),
                        &predicate.to_n3(),
                    );
                    let triple = Triple::new(subject.clone(), predicate.clone(), object.clone());
                    self.push(TripleRow::from_stored(&StoredTriple::new(
                        triple,
                        Some(index),
                    )));
                    outcome.appended.push(index);
                }
                WriteOp::Remove {
                    subject,
                    predicate,
                    index,
                } => {
                    let (s, p) = (subject.to_n3(), predicate.to_n3());
                    let ids: Vec<u64> = self
                        .rows
                        .iter()
                        .filter(|(_, row)| {
                            row.is_live() && row.matches(&s, &p) && row.property_index == *index
                        })
                        .map(|(id, _)| *id)
                        .collect();
                    for id in ids {
                        self.rows.remove(&id);
                        self.touched.remove(&id);
                        self.removed.insert(id);
                    }
                }
                WriteOp::Tombstone { node, tag } => {
                    let node = node.to_n3();
                    for (id, row) in self.rows.iter_mut() {
                        if row.is_live() && (row.subject == node || row.object == node) {
                            row.tombstone = Some(tag.clone());
                            self.touched.insert(*id);
                            outcome.tombstoned.push(row.to_stored()?);
                        }
                    }
                }
                WriteOp::Restore { tag } => {
                    for (id, row) in self.rows.iter_mut() {
                        if row.tombstone.as_deref() == Some(tag.as_str()) {
                            row.tombstone = None;
                            self.touched.insert(*id);
                            outcome.restored.push(row.to_stored()?);
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn push(&mut self, row: TripleRow) {
        let id = *self.next_row_id;
        *self.next_row_id += 1;
        self.rows.insert(id, row);
        self.touched.insert(id);
    }
}

/// Max `property_index` over the given rows of `(subject, predicate)` plus one,
/// tombstoned rows included, or 0 when there is none.
pub(crate) fn free_index_in<'a>(
    rows: impl Iterator<Item = &'a TripleRow>,
    subject: &str,
    predicate: &str,
) -> u64 {
    rows.filter(|row| row.matches(subject, predicate))
        .filter_map(|row| row.property_index)
        .max()
        .map_or(0, |max| max + 1)
}

/// Live rows of a scope as stored triples.
pub(crate) fn live_rows<'a>(
    rows: impl Iterator<Item = &'a TripleRow>,
) -> Result<Vec<StoredTriple>, RatioError> {
    rows.filter(|row| row.is_live())
        .map(TripleRow::to_stored)
        .collect()
}

/// Rows carrying `tag`, as stored triples.
pub(crate) fn tagged_rows<'a>(
    rows: impl Iterator<Item = &'a TripleRow>,
    tag: &str,
) -> Result<Vec<StoredTriple>, RatioError> {
    rows.filter(|row| row.tombstone.as_deref() == Some(tag))
        .map(TripleRow::to_stored)
        .collect()
}

/// The URI a row subject names, if it names one.
pub(crate) fn subject_uri(row: &TripleRow) -> Option<String> {
    row.subject
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .map(str::to_string)
}

// =============================================================================
// TRIPLE STORE TRAIT
// =============================================================================

/// Persistence of scoped triples, namespaces, the record catalog and the
/// identity table.
pub trait TripleStore {
    /// All live rows of a scope.
    fn triples(&self, scope: Scope) -> Result<Vec<StoredTriple>, RatioError>;

    /// Rows of a scope tombstoned with `tag`.
    fn tombstoned(&self, scope: Scope, tag: &str) -> Result<Vec<StoredTriple>, RatioError>;

    /// Next unused index of `(subject, predicate)`. Indices of tombstoned
    /// rows count as used.
    fn free_index(&self, scope: Scope, subject: &Term, predicate: &Term)
    -> Result<u64, RatioError>;

    /// Apply a batch in one write transaction.
    fn apply(&mut self, scope: Scope, batch: &WriteBatch) -> Result<BatchOutcome, RatioError>;

    /// Delete every row of the scope (tombstoned ones included) and insert
    /// `rows`. With `namespaces`, the namespace table is replaced as well.
    fn replace(
        &mut self,
        scope: Scope,
        rows: &[StoredTriple],
        namespaces: Option<&[Namespace]>,
    ) -> Result<(), RatioError>;

    /// Bound `(prefix, uri)` pairs, sorted by prefix.
    fn namespaces(&self) -> Result<Vec<Namespace>, RatioError>;

    /// Every subject URI of every scope, tombstoned rows included, plus
    /// every registered identity URI.
    fn used_subjects(&self) -> Result<BTreeSet<String>, RatioError>;

    /// Register a new record. Ids start at 1.
    fn create_record(&mut self, name: &str) -> Result<RecordId, RatioError>;

    /// Overwrite the catalog entry of an existing record.
    fn update_record(&mut self, id: RecordId, info: &RecordInfo) -> Result<(), RatioError>;

    fn record(&self, id: RecordId) -> Result<Option<RecordInfo>, RatioError>;

    /// Every catalog entry, deleted ones included, by id.
    fn records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError>;

    /// The entry of `id`, or `RecordNotFound`.
    fn existing_record(&self, id: RecordId) -> Result<RecordInfo, RatioError> {
        self.record(id)?.ok_or(RatioError::RecordNotFound(id))
    }

    fn rename_record(&mut self, id: RecordId, name: &str) -> Result<(), RatioError> {
        let mut info = self.existing_record(id)?;
        info.name = name.to_string();
        self.update_record(id, &info)
    }

    /// Hide a record. Its triples are kept.
    fn delete_record(&mut self, id: RecordId) -> Result<(), RatioError> {
        let mut info = self.existing_record(id)?;
        info.deleted = true;
        self.update_record(id, &info)
    }

    fn restore_record(&mut self, id: RecordId) -> Result<(), RatioError> {
        let mut info = self.existing_record(id)?;
        info.deleted = false;
        self.update_record(id, &info)
    }

    fn set_finished(&mut self, id: RecordId, finished: bool) -> Result<(), RatioError> {
        let mut info = self.existing_record(id)?;
        info.finished = finished;
        self.update_record(id, &info)
    }

    /// Bind `name` to `uri` in the identity table.
    fn register_identity(&mut self, name: &str, uri: &str) -> Result<(), RatioError>;

    /// `(name, uri)` pairs, sorted by name.
    fn identities(&self) -> Result<Vec<(String, String)>, RatioError>;
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Storage backend of a session.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile storage.
    InMemory(MemoryTripleStore),
    /// Disk-backed ACID storage.
    Persistent(RedbTripleStore),
}

impl StorageBackend {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::InMemory(MemoryTripleStore::new())
    }

    /// Open or create a redb database at `path`.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, RatioError> {
        Ok(Self::Persistent(RedbTripleStore::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn inner(&self) -> &dyn TripleStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TripleStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl TripleStore for StorageBackend {
    fn triples(&self, scope: Scope) -> Result<Vec<StoredTriple>, RatioError> {
        self.inner().triples(scope)
    }

    fn tombstoned(&self, scope: Scope, tag: &str) -> Result<Vec<StoredTriple>, RatioError> {
        self.inner().tombstoned(scope, tag)
    }

    fn free_index(
        &self,
        scope: Scope,
        subject: &Term,
        predicate: &Term,
    ) -> Result<u64, RatioError> {
        self.inner().free_index(scope, subject, predicate)
    }

    fn apply(&mut self, scope: Scope, batch: &WriteBatch) -> Result<BatchOutcome, RatioError> {
        self.inner_mut().apply(scope, batch)
    }

    fn replace(
        &mut self,
        scope: Scope,
        rows: &[StoredTriple],
        namespaces: Option<&[Namespace]>,
    ) -> Result<(), RatioError> {
        self.inner_mut().replace(scope, rows, namespaces)
    }

    fn namespaces(&self) -> Result<Vec<Namespace>, RatioError> {
        self.inner().namespaces()
    }

    fn used_subjects(&self) -> Result<BTreeSet<String>, RatioError> {
        self.inner().used_subjects()
    }

    fn create_record(&mut self, name: &str) -> Result<RecordId, RatioError> {
        self.inner_mut().create_record(name)
    }

    fn update_record(&mut self, id: RecordId, info: &RecordInfo) -> Result<(), RatioError> {
        self.inner_mut().update_record(id, info)
    }

    fn record(&self, id: RecordId) -> Result<Option<RecordInfo>, RatioError> {
        self.inner().record(id)
    }

    fn records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError> {
        self.inner().records()
    }

    fn register_identity(&mut self, name: &str, uri: &str) -> Result<(), RatioError> {
        self.inner_mut().register_identity(name, uri)
    }

    fn identities(&self) -> Result<Vec<(String, String)>, RatioError> {
        self.inner().identities()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(s: &str, p: &str, o: &str, index: Option<u64>) -> TripleRow {
        TripleRow::from_stored(&StoredTriple::new(
            Triple::new(
                Term::uri(format!("http://ex.org/{s}")),
                Term::uri(format!("http://ex.org/{p}")),
                Term::literal(o),
            ),
            index,
        ))
    }

    fn term(s: &str) -> Term {
        Term::uri(format!("http://ex.org/{s}"))
    }

    #[test]
    fn row_encoding_round_trips() {
        let original = row("a", "p", "v", Some(3));
        let bytes = original.encode().expect("encode");
        let decoded = TripleRow::decode(&bytes).expect("decode");
        assert_eq!(decoded, original);
        assert_eq!(decoded.to_stored().expect("terms").index, Some(3));
    }

    #[test]
    fn free_index_counts_tombstoned_rows() {
        let mut rows = BTreeMap::new();
        rows.insert(0, row("a", "p", "x", Some(0)));
        let mut dead = row("a", "p", "y", Some(4));
        dead.tombstone = Some("<http://ex.org/a>".to_string());
        rows.insert(1, dead);

        let s = term("a").to_n3();
        let p = term("p").to_n3();
        assert_eq!(free_index_in(rows.values(), &s, &p), 5);
        assert_eq!(free_index_in(rows.values(), &s, "<http://ex.org/q>"), 0);
    }

    #[test]
    fn writer_appends_at_free_index() {
        let mut rows = BTreeMap::new();
        let mut next = 0;
        let mut batch = WriteBatch::new();
        batch
            .append(term("a"), term("p"), Term::empty())
            .append(term("a"), term("p"), Term::empty());

        let mut writer = ScopeWriter::new(&mut rows, &mut next);
        let outcome = writer.apply(&batch).expect("apply");

        assert_eq!(outcome.appended, vec![0, 1]);
        assert_eq!(next, 2);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn writer_tombstones_and_restores() {
        let mut rows = BTreeMap::new();
        rows.insert(0, row("a", "p", "x", None));
        rows.insert(1, row("b", "p", "y", None));
        let mut next = 2;

        let mut delete = WriteBatch::new();
        delete.tombstone(term("a"), "tag");
        let outcome = ScopeWriter::new(&mut rows, &mut next)
            .apply(&delete)
            .expect("tombstone");
        assert_eq!(outcome.tombstoned.len(), 1);
        assert_eq!(live_rows(rows.values()).expect("live").len(), 1);
        assert_eq!(tagged_rows(rows.values(), "tag").expect("tagged").len(), 1);

        let mut undo = WriteBatch::new();
        undo.restore("tag");
        let outcome = ScopeWriter::new(&mut rows, &mut next)
            .apply(&undo)
            .expect("restore");
        assert_eq!(outcome.restored.len(), 1);
        assert_eq!(live_rows(rows.values()).expect("live").len(), 2);
    }

    #[test]
    fn writer_remove_matches_exact_index() {
        let mut rows = BTreeMap::new();
        rows.insert(0, row("a", "p", "x", Some(0)));
        rows.insert(1, row("a", "p", "y", Some(1)));
        let mut next = 2;

        let mut batch = WriteBatch::new();
        batch.remove(term("a"), term("p"), Some(1));
        let mut writer = ScopeWriter::new(&mut rows, &mut next);
        writer.apply(&batch).expect("remove");

        assert!(writer.removed.contains(&1));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn subject_uri_ignores_blank_nodes() {
        let mut blank = row("a", "p", "x", None);
        blank.subject = "_:b0".to_string();
        assert_eq!(subject_uri(&blank), None);
        assert_eq!(
            subject_uri(&row("a", "p", "x", None)).as_deref(),
            Some("http://ex.org/a")
        );
    }
}
