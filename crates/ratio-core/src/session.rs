//! # Session Module
//!
//! A `Session` owns everything one unit of work needs: the storage backend,
//! the schema catalog and the record graphs opened so far. Nothing is shared
//! between sessions; callers build one per request or command.
//!
//! `Session::record(id)` hands out a `RecordHandle` that borrows all three and
//! forwards to `GraphStore`/`SchemaCatalog` with the store and catalog
//! injected, so no operation reaches for hidden global state.

use crate::export::ExportOptions;
use crate::formats::RdfFormat;
use crate::knowledge::GraphStore;
use crate::materialize::{Entity, Field, FieldOption};
use crate::schema::SchemaCatalog;
use crate::storage::{StorageBackend, TripleStore};
use crate::{RatioError, RecordId, RecordInfo, Term, Validity};
use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Store, catalog and open records of one unit of work.
#[derive(Debug)]
pub struct Session {
    backend: StorageBackend,
    schema: SchemaCatalog,
    records: BTreeMap<RecordId, GraphStore>,
    /// URI of the acting user, recorded as creator of schema options.
    identity: Option<String>,
}

impl Session {
    /// Open a session over `backend`, loading its schema.
    pub fn open(backend: StorageBackend) -> Result<Self, RatioError> {
        let schema = SchemaCatalog::open(&backend)?;
        Ok(Self {
            backend,
            schema,
            records: BTreeMap::new(),
            identity: None,
        })
    }

    /// A session over a fresh in-memory store.
    pub fn in_memory() -> Result<Self, RatioError> {
        Self::open(StorageBackend::in_memory())
    }

    /// A session over a redb database at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, RatioError> {
        Self::open(StorageBackend::open_redb(path)?)
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaCatalog {
        &self.schema
    }

    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Replace the schema. Open records rebuild their trees on next read.
    pub fn load_schema(&mut self, data: &str, format: RdfFormat) -> Result<usize, RatioError> {
        self.schema.load_schema(&mut self.backend, data, format)
    }

    /// Register the acting user so minted URIs never collide with it.
    pub fn register_identity(&mut self, name: &str, uri: &str) -> Result<(), RatioError> {
        Term::parse_uri(uri)?;
        self.backend.register_identity(name, uri)?;
        self.identity = Some(uri.to_string());
        Ok(())
    }

    /// Records that are not deleted, by id.
    pub fn records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError> {
        let mut records = self.backend.records()?;
        records.retain(|(_, info)| !info.deleted);
        Ok(records)
    }

    pub fn deleted_records(&self) -> Result<Vec<(RecordId, RecordInfo)>, RatioError> {
        let mut records = self.backend.records()?;
        records.retain(|(_, info)| info.deleted);
        Ok(records)
    }

    pub fn rename_record(&mut self, id: RecordId, name: &str) -> Result<(), RatioError> {
        self.backend.rename_record(id, name)?;
        info!(record = %id, name, "record renamed");
        Ok(())
    }

    pub fn set_finished(&mut self, id: RecordId, finished: bool) -> Result<(), RatioError> {
        self.backend.set_finished(id, finished)?;
        info!(record = %id, finished, "record status changed");
        Ok(())
    }

    /// Hide a record from listings and refuse to open it until restored.
    pub fn delete_record(&mut self, id: RecordId) -> Result<(), RatioError> {
        self.backend.delete_record(id)?;
        self.records.remove(&id);
        info!(record = %id, "record deleted");
        Ok(())
    }

    pub fn restore_record(&mut self, id: RecordId) -> Result<(), RatioError> {
        self.backend.restore_record(id)?;
        info!(record = %id, "record restored");
        Ok(())
    }

    /// Create a record, seeded from `template` when given.
    pub fn create_record(
        &mut self,
        name: &str,
        template: Option<&str>,
    ) -> Result<RecordId, RatioError> {
        let id = self.backend.create_record(name)?;
        info!(record = %id, name, "record created");
        if let Some(script) = template {
            self.record(id)?.execute_instructions(script)?;
        }
        Ok(id)
    }

    /// Borrow record `id`, opening it on first use.
    pub fn record(&mut self, id: RecordId) -> Result<RecordHandle<'_>, RatioError> {
        let graph = match self.records.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(GraphStore::open(&self.backend, id)?),
        };
        Ok(RecordHandle {
            store: &mut self.backend,
            schema: &mut self.schema,
            graph,
            identity: self.identity.as_deref(),
        })
    }
}

/// One record with the store and catalog injected.
#[derive(Debug)]
pub struct RecordHandle<'a> {
    store: &'a mut StorageBackend,
    schema: &'a mut SchemaCatalog,
    graph: &'a mut GraphStore,
    identity: Option<&'a str>,
}

impl RecordHandle<'_> {
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.graph.id()
    }

    #[must_use]
    pub fn graph(&self) -> &GraphStore {
        self.graph
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaCatalog {
        self.schema
    }

    #[must_use]
    pub fn root_uri(&self) -> Option<Term> {
        self.graph.root_uri()
    }

    pub fn root(&mut self) -> Result<&Entity, RatioError> {
        self.graph.root(&*self.schema)
    }

    pub fn entity(&mut self, uri: &Term) -> Result<Cow<'_, Entity>, RatioError> {
        self.graph.entity(&*self.schema, uri)
    }

    pub fn field(&mut self, entity: &Term, property: &Term) -> Result<Field, RatioError> {
        self.graph.field(&*self.schema, entity, property)
    }

    pub fn free_index(&self, entity: &Term, property: &Term) -> Result<u64, RatioError> {
        self.graph.free_index(&*self.store, entity, property)
    }

    #[must_use]
    pub fn sorted_values(&self, entity: &Term, property: &Term) -> Vec<(u64, Term)> {
        self.graph.sorted_values(entity, property)
    }

    #[must_use]
    pub fn is_individual_deletable(&self, uri: &Term) -> bool {
        self.graph.is_individual_deletable(&*self.schema, uri)
    }

    pub fn set_root(&mut self, uri: &Term) -> Result<(), RatioError> {
        self.graph.set_root(&mut *self.store, uri)
    }

    pub fn new_root(&mut self, class: &Term, label: &str) -> Result<Entity, RatioError> {
        self.graph.new_root(&mut *self.store, &*self.schema, class, label)
    }

    pub fn new_value(&mut self, entity: &Term, property: &Term) -> Result<u64, RatioError> {
        self.graph.new_value(&mut *self.store, &*self.schema, entity, property)
    }

    pub fn change_value(
        &mut self,
        entity: &Term,
        property: &Term,
        index: u64,
        raw: &str,
    ) -> Result<Validity, RatioError> {
        self.graph
            .change_value(&mut *self.store, &*self.schema, entity, property, index, raw)
    }

    pub fn change_label(&mut self, entity: &Term, label: &str) -> Result<(), RatioError> {
        self.graph.change_label(&mut *self.store, entity, label)
    }

    pub fn new_individual(
        &mut self,
        class: &Term,
        label: &str,
        parent: Option<(&Term, &Term)>,
    ) -> Result<(Entity, BTreeSet<Term>), RatioError> {
        self.graph
            .new_individual(&mut *self.store, &*self.schema, class, label, parent)
    }

    /// A custom option kept in this record.
    pub fn new_option(
        &mut self,
        class: &Term,
        label: &str,
    ) -> Result<(FieldOption, BTreeSet<Term>), RatioError> {
        self.graph.new_option(&mut *self.store, &*self.schema, class, label)
    }

    /// A custom option added to the schema, created by the session identity.
    pub fn new_schema_option(
        &mut self,
        class: &Term,
        label: &str,
    ) -> Result<(FieldOption, BTreeSet<Term>), RatioError> {
        self.schema
            .new_option(&mut *self.store, class, label, self.identity)
    }

    pub fn delete_individual_recursive(
        &mut self,
        uri: &Term,
    ) -> Result<BTreeSet<Term>, RatioError> {
        self.graph
            .delete_individual_recursive(&mut *self.store, &*self.schema, uri)
    }

    pub fn undo_delete_individual(&mut self, uri: &Term) -> Result<usize, RatioError> {
        self.graph.undo_delete_individual(&mut *self.store, uri)
    }

    pub fn load_data(&mut self, data: &str, format: RdfFormat) -> Result<usize, RatioError> {
        self.graph.load_data(&mut *self.store, &*self.schema, data, format)
    }

    pub fn execute_instructions(
        &mut self,
        script: &str,
    ) -> Result<BTreeMap<String, Term>, RatioError> {
        self.graph
            .execute_instructions(&mut *self.store, &*self.schema, script)
    }

    pub fn export(&self, options: &ExportOptions) -> Result<String, RatioError> {
        self.graph.export(&*self.schema, options)
    }
}

// =============================================================================
// TESTS
// =============================================================================
