//! # In-Memory Triple Store
//!
//! Volatile backend. Everything is lost when the store is dropped.

use super::{
    BatchOutcome, ScopeWriter, StoredTriple, TripleRow, TripleStore, WriteBatch, free_index_in,
    live_rows, subject_uri, tagged_rows,
};
use crate::{Namespace, RatioError, RecordId, RecordInfo, Scope, Term};
use std::collections::{BTreeMap, BTreeSet};

/// Triple store kept entirely in `BTreeMap`s.
#[derive(Debug, Clone)]
pub struct MemoryTripleStore {
    scopes: BTreeMap<Scope, BTreeMap<u64, TripleRow>>,
    next_row_id: u64,
    namespaces: BTreeMap<String, String>,
    records: BTreeMap<RecordId, RecordInfo>,
    next_record_id: u64,
    identities: BTreeMap<String, String>,
}

impl Default for MemoryTripleStore {
    fn default() -> Self {
        Self {
            scopes: BTreeMap::new(),
            next_row_id: 0,
            namespaces: BTreeMap::new(),
            records: BTreeMap::new(),
            next_record_id: 1,
            identities: BTreeMap::new(),
        }
    }
}

impl MemoryTripleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self, scope: Scope) -> impl Iterator<Item = &TripleRow> {
        self.scopes.get(&scope).into_iter().flat_map(BTreeMap::values)
    }
}

impl TripleStore for MemoryTripleStore {
    fn triples(&self, scope: Scope) -> Result<Vec<StoredTriple>, RatioError> {
        live_rows(self.rows(scope))
    }

    fn tombstoned(&self, scope: Scope, tag: &str) -> Result<Vec<StoredTriple>, RatioError> {
        tagged_rows(self.rows(scope), tag)
    }

    fn free_index(
        &self,
        scope: Scope,
        subject: &Term,
        predicate: &Term,
    ) -> Result<u64, RatioError> {
        Ok(free_index_in(
            self.rows(scope),
            &subject.to_n3(),
            &predicate.to_n3(),
        ))
    }

    fn apply(&mut self, scope: Scope, batch: &WriteBatch) -> Result<BatchOutcome, RatioError> {
        // Work on a copy so a failing op leaves the scope untouched.
        let mut rows = self.scopes.get(&scope).cloned().unwrap_or_default();
        let mut next_row_id = self.next_row_id;
        let outcome = ScopeWriter::new(&mut rows, &mut next_row_id).apply(batch)?;
        self.scopes.insert(scope, rows);
        self.next_row_id = next_row_id;
        Ok(outcome)
    }

    fn replace(
        &mut self,
        scope: Scope,
        rows: &[StoredTriple],
        namespaces: Option<&[Namespace]>,
    ) -> Result<(), RatioError> {
        let mut fresh = BTreeMap::new();
        for row in rows {
            fresh.insert(self.next_row_id, TripleRow::from_stored(row));
            self.next_row_id += 1;
        }
        self.scopes.insert(scope, fresh);

        if let Some(namespaces) = namespaces {
            self.namespaces = namespaces
                .iter()
                .map(|ns| (ns.prefix.clone(), ns.uri.clone()))
                .collect();
        }
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<Namespace>, RatioError> {
        Ok(self
            .namespaces
            .iter()
            .map(|(prefix, uri)| Namespace::new(prefix, uri))
            .collect())
    }

    fn used_subjects(&self) -> Result<BTreeSet<String>, RatioError> {
        let mut used: BTreeSet<String> = self
            .scopes
            .values()
            .flat_map(BTreeMap::values)
            .filter_map(subject_uri)
            .collect();
        used.extend(self.identities.values().cloned());
        Ok(used)
    }

    fn create_record(&mut self, name: &str) -> Result<RecordId, RatioError> {
        let id = RecordId(self.next_record_id);
        self.next_record_id += 1;
        self.records.insert(id, RecordInfo::new(name));
        Ok(id)
    }

    fn update_record(&mut self, id: RecordId, info: &RecordInfo) -> Result<(), RatioError> {
        let entry = self
            .records
            .get_mut(&id)
            .ok_or(RatioError::RecordNotFound(id))?;
        *entry = info.clone();
        Ok(())
    }

    fn record(&self, id: RecordId) -> Result<Option<RecordInfo>, RatioError> {
        Ok(self.records.get(&id).cloned())
    }

    fn records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError> {
        Ok(self
            .records
            .iter()
            .map(|(id, info)| (*id, info.clone()))
            .collect())
    }

    fn register_identity(&mut self, name: &str, uri: &str) -> Result<(), RatioError> {
        self.identities.insert(name.to_string(), uri.to_string());
        Ok(())
    }

    fn identities(&self) -> Result<Vec<(String, String)>, RatioError> {
        Ok(self
            .identities
            .iter()
            .map(|(name, uri)| (name.clone(), uri.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Triple;

    fn uri(s: &str) -> Term {
        Term::uri(format!("http://ex.org/{s}"))
    }

    #[test]
    fn record_ids_start_at_one() {
        let mut store = MemoryTripleStore::new();
        assert_eq!(store.create_record("first").expect("create"), RecordId(1));
        assert_eq!(store.create_record("second").expect("create"), RecordId(2));
        assert_eq!(store.records().expect("records").len(), 2);
        assert!(store.record(RecordId(3)).expect("lookup").is_none());
    }

    #[test]
    fn record_flags_are_updated_in_place() {
        let mut store = MemoryTripleStore::new();
        let id = store.create_record("first").expect("create");

        store.rename_record(id, "renamed").expect("rename");
        store.set_finished(id, true).expect("finish");
        store.delete_record(id).expect("delete");

        let info = store.record(id).expect("lookup").expect("entry");
        assert_eq!(info.name, "renamed");
        assert!(info.finished && info.deleted);

        store.restore_record(id).expect("restore");
        assert!(!store.record(id).expect("lookup").expect("entry").deleted);
        assert!(matches!(
            store.rename_record(RecordId(9), "x"),
            Err(RatioError::RecordNotFound(RecordId(9)))
        ));
    }

    #[test]
    fn scopes_are_isolated() {
        let mut store = MemoryTripleStore::new();
        let mut batch = WriteBatch::new();
        batch.insert(Triple::new(uri("a"), uri("p"), Term::literal("x")), None);
        store.apply(Scope::Record(RecordId(1)), &batch).expect("apply");

        assert_eq!(store.triples(Scope::Record(RecordId(1))).expect("rows").len(), 1);
        assert!(store.triples(Scope::Record(RecordId(2))).expect("rows").is_empty());
        assert!(store.triples(Scope::Schema).expect("rows").is_empty());
    }

    #[test]
    fn replace_drops_tombstoned_rows_and_rebinds_namespaces() {
        let mut store = MemoryTripleStore::new();
        let scope = Scope::Record(RecordId(1));
        let mut batch = WriteBatch::new();
        batch
            .insert(Triple::new(uri("a"), uri("p"), Term::literal("x")), Some(0))
            .tombstone(uri("a"), "t");
        store.apply(scope, &batch).expect("apply");
        assert_eq!(store.free_index(scope, &uri("a"), &uri("p")).expect("free"), 1);

        store
            .replace(scope, &[], Some(&[Namespace::new("ex", "http://ex.org/")]))
            .expect("replace");

        assert_eq!(store.free_index(scope, &uri("a"), &uri("p")).expect("free"), 0);
        assert_eq!(store.namespaces().expect("ns")[0].prefix, "ex");
    }

    #[test]
    fn used_subjects_include_tombstoned_rows_and_identities() {
        let mut store = MemoryTripleStore::new();
        let mut batch = WriteBatch::new();
        batch
            .insert(Triple::new(uri("gone"), uri("p"), Term::literal("x")), None)
            .tombstone(uri("gone"), "t");
        store.apply(Scope::Record(RecordId(1)), &batch).expect("apply");
        store
            .register_identity("alice", "http://ex.org/alice")
            .expect("identity");

        let used = store.used_subjects().expect("used");
        assert!(used.contains("http://ex.org/gone"));
        assert!(used.contains("http://ex.org/alice"));
    }
}
