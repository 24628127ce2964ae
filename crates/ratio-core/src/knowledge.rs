//! # Record Graph Store
//!
//! `GraphStore` mirrors the live triples of one record in memory and keeps
//! that mirror in step with the backing `TripleStore`. Every mutation is
//! written as one `WriteBatch` (one transaction) before the mirror changes.
//!
//! ## Materialization Cache
//!
//! The materialized root is memoized together with the record generation and
//! the schema generation it was built from. Every mutation bumps the record
//! generation, so the next read after a write rebuilds the tree exactly once.
//!
//! ## Soft Delete
//!
//! Deletes cascade along described edges only. All rows touched by one
//! delete call carry the same tombstone tag (the deleted root's canonical
//! notation), and undo restores exactly that group.

use crate::export::{ExportOptions, export_graph};
use crate::formats::{RdfFormat, parse_rdf};
use crate::graph::TripleGraph;
use crate::instructions::InstructionInterpreter;
use crate::materialize::{Entity, Field, FieldOption};
use crate::schema::{SchemaCatalog, literal_bool};
use crate::storage::{StoredTriple, TripleStore, WriteBatch};
use crate::validate::ValueCheck;
use crate::vocab::{
    OWL_NAMED_INDIVIDUAL, RATIO_IS_CUSTOM, RATIO_IS_ROOT, RDF_TYPE, RDFS_DOMAIN, RDFS_LABEL,
    XSD_BOOLEAN,
};
use crate::{RatioError, RecordId, Scope, Term, Triple, Validity};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct CachedRoot {
    entity: Entity,
    generation: u64,
    schema_generation: u64,
}

/// One record's live triples.
#[derive(Debug, Clone)]
pub struct GraphStore {
    id: RecordId,
    graph: TripleGraph,
    generation: u64,
    cache: Option<CachedRoot>,
}

impl GraphStore {
    /// Load the live triples of record `id`.
    pub fn open(store: &dyn TripleStore, id: RecordId) -> Result<Self, RatioError> {
        if store.record(id)?.is_none_or(|info| info.deleted) {
            return Err(RatioError::RecordNotFound(id));
        }
        let graph = TripleGraph::from_rows(store.triples(Scope::Record(id))?);
        debug!(record = %id, triples = graph.len(), "opened record graph");
        Ok(Self {
            id,
            graph,
            generation: 0,
            cache: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    #[must_use]
    pub fn graph(&self) -> &TripleGraph {
        &self.graph
    }

    /// Changes on every mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn scope(&self) -> Scope {
        Scope::Record(self.id)
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    // =========================================================================
    // ROOT
    // =========================================================================

    /// The individual carrying the root marker.
    #[must_use]
    pub fn root_uri(&self) -> Option<Term> {
        self.root_candidates().into_iter().next()
    }

    fn root_candidates(&self) -> Vec<Term> {
        let marker = Term::uri(RATIO_IS_ROOT);
        let mut roots: BTreeSet<Term> = BTreeSet::new();
        for value in [Term::typed("true", XSD_BOOLEAN), Term::literal("true")] {
            roots.extend(self.graph.subjects(&marker, &value).into_iter().cloned());
        }
        roots.into_iter().collect()
    }

    /// Move the root marker to `uri`.
    pub fn set_root(&mut self, store: &mut dyn TripleStore, uri: &Term) -> Result<(), RatioError> {
        if !self.graph.has_subject(uri) {
            return Err(RatioError::EntityNotFound(uri.lexical().to_string()));
        }
        let marker = Term::uri(RATIO_IS_ROOT);
        let flag = Triple::new(uri.clone(), marker.clone(), Term::typed("true", XSD_BOOLEAN));

        let previous = self.root_candidates();
        let mut batch = WriteBatch::new();
        for old in &previous {
            batch.remove(old.clone(), marker.clone(), None);
        }
        batch.insert(flag.clone(), None);
        store.apply(self.scope(), &batch)?;

        for old in &previous {
            self.graph.remove_objects(old, &marker);
        }
        self.graph.insert(flag);
        self.touch();
        debug!(record = %self.id, root = %uri, "root set");
        Ok(())
    }

    /// Create an individual of `class` and mark it as the root.
    pub fn new_root(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        class: &Term,
        label: &str,
    ) -> Result<Entity, RatioError> {
        let (mut entity, _) = self.new_individual(store, schema, class, label, None)?;
        self.set_root(store, &entity.uri)?;
        entity.deletable = false;
        Ok(entity)
    }

    /// Rebuild the cached root unless it is current.
    fn refresh(&mut self, schema: &SchemaCatalog) -> Result<(), RatioError> {
        let current = self.cache.as_ref().is_some_and(|c| {
            c.generation == self.generation && c.schema_generation == schema.generation()
        });
        if current {
            return Ok(());
        }
        self.cache = None;
        let Some(root) = self.root_uri() else {
            return Ok(());
        };
        let mut entity = Entity::from_knowledge(schema, &self.graph, &root)?;
        entity.deletable = false;
        debug!(record = %self.id, generation = self.generation, "root materialized");
        self.cache = Some(CachedRoot {
            entity,
            generation: self.generation,
            schema_generation: schema.generation(),
        });
        Ok(())
    }

    /// The materialized root, rebuilt only after a mutation.
    pub fn root(&mut self, schema: &SchemaCatalog) -> Result<&Entity, RatioError> {
        self.refresh(schema)?;
        let id = self.id;
        self.cache
            .as_ref()
            .map(|c| &c.entity)
            .ok_or_else(|| RatioError::EntityNotFound(format!("root of record {id}")))
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// An entity of this record: borrowed from the cached tree when it is
    /// part of it, materialized on its own otherwise.
    pub fn entity(
        &mut self,
        schema: &SchemaCatalog,
        uri: &Term,
    ) -> Result<Cow<'_, Entity>, RatioError> {
        self.refresh(schema)?;
        if let Some(found) = self.cache.as_ref().and_then(|c| c.entity.find(uri)) {
            return Ok(Cow::Borrowed(found));
        }
        if !self.graph.has_subject(uri) {
            return Err(RatioError::EntityNotFound(uri.lexical().to_string()));
        }
        let mut entity = Entity::from_knowledge(schema, &self.graph, uri)?;
        entity.deletable = self.is_individual_deletable(schema, uri);
        Ok(Cow::Owned(entity))
    }

    /// One materialized field of an entity.
    pub fn field(
        &mut self,
        schema: &SchemaCatalog,
        entity: &Term,
        property: &Term,
    ) -> Result<Field, RatioError> {
        let found = self.entity(schema, entity)?;
        found
            .field(property)
            .cloned()
            .ok_or_else(|| field_not_found(entity, property))
    }

    /// The field of `property` on `entity`, built straight from the graph.
    fn require_field(
        &self,
        schema: &SchemaCatalog,
        entity: &Term,
        property: &Term,
    ) -> Result<Field, RatioError> {
        if !self.graph.has_subject(entity) {
            return Err(RatioError::EntityNotFound(entity.lexical().to_string()));
        }
        if !schema.is_property(property) {
            return Err(RatioError::PropertyNotFound(property.lexical().to_string()));
        }
        let class = schema
            .class_of(&self.graph, entity)
            .ok_or_else(|| RatioError::UntypedIndividual(entity.lexical().to_string()))?;
        if !schema.child_properties(&class).contains(property) {
            return Err(field_not_found(entity, property));
        }
        Field::from_knowledge(schema, &self.graph, entity, property)
    }

    /// Next unused index of `(entity, property)`, tombstoned values included.
    pub fn free_index(
        &self,
        store: &dyn TripleStore,
        entity: &Term,
        property: &Term,
    ) -> Result<u64, RatioError> {
        store.free_index(self.scope(), entity, property)
    }

    /// Live values of `(entity, property)` in ascending index order.
    #[must_use]
    pub fn sorted_values(&self, entity: &Term, property: &Term) -> Vec<(u64, Term)> {
        self.graph
            .values(entity, property)
            .map(|values| values.iter().map(|(i, t)| (*i, t.clone())).collect())
            .unwrap_or_default()
    }

    /// False for the root and for entities held by a non-deletable
    /// described property.
    #[must_use]
    pub fn is_individual_deletable(&self, schema: &SchemaCatalog, uri: &Term) -> bool {
        if self.root_uri().as_ref() == Some(uri) {
            return false;
        }
        !self
            .graph
            .incoming(uri)
            .into_iter()
            .any(|(_, p)| schema.is_described(p) && !schema.is_deletable(p))
    }

    // =========================================================================
    // VALUES
    // =========================================================================

    /// Append an unset placeholder and return its index.
    pub fn new_value(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        entity: &Term,
        property: &Term,
    ) -> Result<u64, RatioError> {
        self.require_field(schema, entity, property)?;

        let mut batch = WriteBatch::new();
        batch.append(entity.clone(), property.clone(), Term::empty());
        let outcome = store.apply(self.scope(), &batch)?;
        let Some(&index) = outcome.appended.first() else {
            return Err(RatioError::IoError("append allocated no index".to_string()));
        };

        self.graph.insert_indexed(
            Triple::new(entity.clone(), property.clone(), Term::empty()),
            index,
        );
        self.touch();
        debug!(record = %self.id, entity = %entity, property = %property, index, "value added");
        Ok(index)
    }

    /// Validate `raw` and store it at `index`.
    ///
    /// A rejected input leaves the record unchanged and comes back as
    /// `Validity::Invalid`.
    pub fn change_value(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        entity: &Term,
        property: &Term,
        index: u64,
        raw: &str,
    ) -> Result<Validity, RatioError> {
        let field = self.require_field(schema, entity, property)?;
        if !field.values.contains_key(&index) {
            return Err(RatioError::ValueNotFound {
                entity: entity.lexical().to_string(),
                property: property.lexical().to_string(),
                index,
            });
        }

        let term = match field.check_value(raw)? {
            ValueCheck::Accepted(term) => term,
            ValueCheck::Rejected(message) => {
                debug!(entity = %entity, property = %property, %message, "value rejected");
                return Ok(Validity::Invalid(message));
            }
        };

        let triple = Triple::new(entity.clone(), property.clone(), term);
        let mut batch = WriteBatch::new();
        batch
            .remove(entity.clone(), property.clone(), Some(index))
            .insert(triple.clone(), Some(index));
        store.apply(self.scope(), &batch)?;

        self.graph.insert_indexed(triple, index);
        self.touch();
        debug!(record = %self.id, entity = %entity, property = %property, index, "value changed");
        Ok(Validity::Valid)
    }

    /// Replace the label of `entity`.
    pub fn change_label(
        &mut self,
        store: &mut dyn TripleStore,
        entity: &Term,
        label: &str,
    ) -> Result<(), RatioError> {
        if !self.graph.has_subject(entity) {
            return Err(RatioError::EntityNotFound(entity.lexical().to_string()));
        }
        let predicate = Term::uri(RDFS_LABEL);
        let triple = Triple::new(entity.clone(), predicate.clone(), Term::literal(label));

        let mut batch = WriteBatch::new();
        batch
            .remove(entity.clone(), predicate.clone(), None)
            .insert(triple.clone(), None);
        store.apply(self.scope(), &batch)?;

        self.graph.remove_objects(entity, &predicate);
        self.graph.insert(triple);
        self.touch();
        debug!(record = %self.id, entity = %entity, label, "label changed");
        Ok(())
    }

    // =========================================================================
    // INDIVIDUALS
    // =========================================================================

    fn individual_triples(uri: &Term, class: &Term, label: &str) -> Vec<Triple> {
        let rdf_type = Term::uri(RDF_TYPE);
        vec![
            Triple::new(uri.clone(), rdf_type.clone(), Term::uri(OWL_NAMED_INDIVIDUAL)),
            Triple::new(uri.clone(), rdf_type, class.clone()),
            Triple::new(uri.clone(), Term::uri(RDFS_LABEL), Term::literal(label)),
        ]
    }

    /// Create an individual of `class`, attached to `(parent, property)` at
    /// the parent's free index when given. Only described properties of the
    /// parent can own it.
    ///
    /// Returns the skeleton entity and the non-described properties of
    /// entities in this record whose option lists now include it.
    pub fn new_individual(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        class: &Term,
        label: &str,
        parent: Option<(&Term, &Term)>,
    ) -> Result<(Entity, BTreeSet<Term>), RatioError> {
        if !schema.is_class(class) {
            return Err(RatioError::ClassNotFound(class.lexical().to_string()));
        }
        if let Some((parent, property)) = parent {
            if !self.require_field(schema, parent, property)?.is_described {
                return Err(RatioError::NotAllowed(format!(
                    "{} does not own individuals",
                    property.lexical()
                )));
            }
        }

        let uri = schema.mint_uri(&*store, class, Some(self.id))?;
        let triples = Self::individual_triples(&uri, class, label);

        let mut batch = WriteBatch::new();
        for triple in &triples {
            batch.insert(triple.clone(), None);
        }
        if let Some((parent, property)) = parent {
            batch.append(parent.clone(), property.clone(), uri.clone());
        }
        let outcome = store.apply(self.scope(), &batch)?;

        for triple in triples {
            self.graph.insert(triple);
        }
        if let (Some((parent, property)), Some(&index)) = (parent, outcome.appended.first()) {
            self.graph
                .insert_indexed(Triple::new(parent.clone(), property.clone(), uri.clone()), index);
        }
        self.touch();

        let mut entity = Entity::new(schema, &self.graph, class, &uri, label);
        if let Some((_, property)) = parent {
            entity.deletable = schema.is_deletable(property);
        }

        let domain = Term::uri(RDFS_DOMAIN);
        let open_fields = schema
            .option_fields(class)
            .into_iter()
            .filter(|p| {
                schema
                    .graph()
                    .objects(p, &domain)
                    .into_iter()
                    .any(|d| !schema.tokens_in(&self.graph, d).is_empty())
            })
            .collect();

        info!(record = %self.id, uri = %uri, class = %class, "individual created");
        Ok((entity, open_fields))
    }

    /// Create a custom option of `class` in this record. The option is not
    /// linked into the tree; it only becomes selectable.
    pub fn new_option(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        class: &Term,
        label: &str,
    ) -> Result<(FieldOption, BTreeSet<Term>), RatioError> {
        if !schema.is_class(class) {
            return Err(RatioError::ClassNotFound(class.lexical().to_string()));
        }
        let uri = schema.mint_uri(&*store, class, Some(self.id))?;
        let mut triples = Self::individual_triples(&uri, class, label);
        triples.push(Triple::new(
            uri.clone(),
            Term::uri(RATIO_IS_CUSTOM),
            Term::typed("true", XSD_BOOLEAN),
        ));

        let mut batch = WriteBatch::new();
        for triple in &triples {
            batch.insert(triple.clone(), None);
        }
        store.apply(self.scope(), &batch)?;
        for triple in triples {
            self.graph.insert(triple);
        }
        self.touch();

        debug!(record = %self.id, uri = %uri, class = %class, "custom option created");
        let option = FieldOption::from_knowledge(schema, &self.graph, &uri)?;
        Ok((option, schema.option_fields(class)))
    }

    /// Whether `uri` is a custom option created in this record.
    #[must_use]
    pub fn is_custom(&self, uri: &Term) -> bool {
        self.graph
            .object(uri, &Term::uri(RATIO_IS_CUSTOM))
            .and_then(literal_bool)
            .unwrap_or(false)
    }

    // =========================================================================
    // DELETE / UNDO
    // =========================================================================

    /// Soft-delete `uri` and its described subtree.
    ///
    /// Returns the deleted URIs. Plain references are neither followed nor
    /// deleted.
    pub fn delete_individual_recursive(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        uri: &Term,
    ) -> Result<BTreeSet<Term>, RatioError> {
        if !self.graph.has_subject(uri) {
            return Err(RatioError::EntityNotFound(uri.lexical().to_string()));
        }
        let nodes = self.graph.walk(uri, |p| schema.is_described(p));
        let tag = uri.to_n3();

        let mut batch = WriteBatch::new();
        for node in &nodes {
            batch.tombstone(node.clone(), tag.clone());
        }
        let outcome = store.apply(self.scope(), &batch)?;

        for node in &nodes {
            self.graph.remove_node(node);
        }
        self.touch();

        info!(
            record = %self.id,
            uri = %uri,
            individuals = nodes.len(),
            triples = outcome.tombstoned.len(),
            "individual deleted"
        );
        Ok(nodes.into_iter().collect())
    }

    /// Restore everything deleted by `delete_individual_recursive(uri)`.
    ///
    /// Returns the number of restored triples; 0 when there is nothing to
    /// restore.
    pub fn undo_delete_individual(
        &mut self,
        store: &mut dyn TripleStore,
        uri: &Term,
    ) -> Result<usize, RatioError> {
        let mut batch = WriteBatch::new();
        batch.restore(uri.to_n3());
        let outcome = store.apply(self.scope(), &batch)?;

        let restored = outcome.restored.len();
        if restored > 0 {
            for row in outcome.restored {
                self.graph.insert_stored(row);
            }
            self.touch();
        }
        info!(record = %self.id, uri = %uri, triples = restored, "delete undone");
        Ok(restored)
    }

    // =========================================================================
    // BULK
    // =========================================================================

    /// Replace the record's triples with `data`.
    ///
    /// Values of schema properties get sequential indices per
    /// `(subject, predicate)` in first-seen order. The root marker is kept
    /// when the data has none and the old root is still present.
    pub fn load_data(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        data: &str,
        format: RdfFormat,
    ) -> Result<usize, RatioError> {
        let doc = parse_rdf(data, format)?;

        let mut seen = BTreeSet::new();
        let mut counters: BTreeMap<(Term, Term), u64> = BTreeMap::new();
        let mut rows = Vec::new();
        for triple in doc.triples {
            if !seen.insert(triple.clone()) {
                continue;
            }
            if schema.is_property(&triple.predicate) {
                let counter = counters
                    .entry((triple.subject.clone(), triple.predicate.clone()))
                    .or_insert(0);
                rows.push(StoredTriple::new(triple, Some(*counter)));
                *counter += 1;
            } else {
                rows.push(StoredTriple::plain(triple));
            }
        }

        let marker = Term::uri(RATIO_IS_ROOT);
        let has_marker = rows.iter().any(|r| r.triple.predicate == marker);
        let kept_root = self
            .root_uri()
            .filter(|root| !has_marker && rows.iter().any(|r| r.triple.subject == *root));
        if let Some(root) = kept_root {
            rows.push(StoredTriple::plain(Triple::new(
                root,
                marker,
                Term::typed("true", XSD_BOOLEAN),
            )));
        }

        store.replace(self.scope(), &rows, None)?;
        let count = rows.len();
        self.graph = TripleGraph::from_rows(rows);
        self.cache = None;
        self.touch();

        info!(record = %self.id, triples = count, %format, "record data loaded");
        Ok(count)
    }

    /// Run a template script against this record.
    ///
    /// Returns the names the script bound.
    pub fn execute_instructions(
        &mut self,
        store: &mut dyn TripleStore,
        schema: &SchemaCatalog,
        script: &str,
    ) -> Result<BTreeMap<String, Term>, RatioError> {
        let mut interpreter = InstructionInterpreter::new(self.id, schema.namespaces());
        interpreter.run(self, store, schema, script)?;
        Ok(interpreter.into_names())
    }

    /// Serialize the record without internal bookkeeping.
    pub fn export(
        &self,
        schema: &SchemaCatalog,
        options: &ExportOptions,
    ) -> Result<String, RatioError> {
        export_graph(schema, &self.graph, self.root_uri().as_ref(), options)
    }
}

fn field_not_found(entity: &Term, property: &Term) -> RatioError {
    RatioError::FieldNotFound {
        entity: entity.lexical().to_string(),
        property: property.lexical().to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::materialize::FieldValue;
    use crate::storage::MemoryTripleStore;
    use crate::testing::{ex, schema_store};

    fn record() -> (MemoryTripleStore, SchemaCatalog, GraphStore) {
        let (mut store, schema) = schema_store();
        let id = store.create_record("trial").unwrap();
        let graph = GraphStore::open(&store, id).unwrap();
        (store, schema, graph)
    }

    /// A trial root with one arm, returning (trial, arm).
    fn trial_with_arm(
        store: &mut MemoryTripleStore,
        schema: &SchemaCatalog,
        graph: &mut GraphStore,
    ) -> (Term, Term) {
        let trial = graph.new_root(store, schema, &ex("Trial"), "Trial").unwrap();
        let (arm, _) = graph
            .new_individual(store, schema, &ex("Arm"), "Arm A", Some((&trial.uri, &ex("hasArm"))))
            .unwrap();
        (trial.uri, arm.uri)
    }

    #[test]
    fn unknown_record_is_a_lookup_error() {
        let (store, _) = schema_store();
        let err = GraphStore::open(&store, RecordId(9)).unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn root_is_materialized_and_not_deletable() {
        let (mut store, schema, mut graph) = record();
        let (trial, arm) = trial_with_arm(&mut store, &schema, &mut graph);

        assert_eq!(graph.root_uri(), Some(trial.clone()));
        let root = graph.root(&schema).unwrap();
        assert!(!root.deletable);
        assert!(root.find(&arm).is_some());
        assert!(!graph.is_individual_deletable(&schema, &trial));
        assert!(graph.is_individual_deletable(&schema, &arm));
    }

    #[test]
    fn cache_is_rebuilt_after_mutation() {
        let (mut store, schema, mut graph) = record();
        let (trial, _) = trial_with_arm(&mut store, &schema, &mut graph);

        assert_eq!(graph.root(&schema).unwrap().label, "Trial");
        graph.change_label(&mut store, &trial, "Renamed").unwrap();
        assert_eq!(graph.root(&schema).unwrap().label, "Renamed");
    }

    #[test]
    fn values_append_at_free_index() {
        let (mut store, schema, mut graph) = record();
        let (trial, _) = trial_with_arm(&mut store, &schema, &mut graph);
        let site = ex("site");

        assert_eq!(graph.new_value(&mut store, &schema, &trial, &site).unwrap(), 0);
        assert_eq!(graph.new_value(&mut store, &schema, &trial, &site).unwrap(), 1);
        assert_eq!(graph.free_index(&store, &trial, &site).unwrap(), 2);

        let values = graph.sorted_values(&trial, &site);
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|(_, t)| t.is_unset()));
    }

    #[test]
    fn change_value_validates_before_writing() {
        let (mut store, schema, mut graph) = record();
        let (trial, _) = trial_with_arm(&mut store, &schema, &mut graph);
        let participants = ex("participants");
        let index = graph
            .new_value(&mut store, &schema, &trial, &participants)
            .unwrap();

        let outcome = graph
            .change_value(&mut store, &schema, &trial, &participants, index, "0")
            .unwrap();
        assert_eq!(outcome.message(), Some("0 is not a positive integer."));
        assert!(graph.sorted_values(&trial, &participants)[0].1.is_unset());

        let outcome = graph
            .change_value(&mut store, &schema, &trial, &participants, index, "40")
            .unwrap();
        assert!(outcome.is_valid());

        let field = graph.field(&schema, &trial, &participants).unwrap();
        assert!(matches!(&field.values[&index], FieldValue::Literal(l) if l.value == "40"));

        let reopened = GraphStore::open(&store, graph.id()).unwrap();
        assert_eq!(
            reopened.sorted_values(&trial, &participants),
            graph.sorted_values(&trial, &participants)
        );
    }

    #[test]
    fn missing_value_and_field_are_lookup_errors() {
        let (mut store, schema, mut graph) = record();
        let (trial, _) = trial_with_arm(&mut store, &schema, &mut graph);

        let err = graph
            .change_value(&mut store, &schema, &trial, &ex("title"), 7, "x")
            .unwrap_err();
        assert!(matches!(err, RatioError::ValueNotFound { index: 7, .. }));

        let err = graph
            .new_value(&mut store, &schema, &trial, &ex("dose"))
            .unwrap_err();
        assert!(matches!(err, RatioError::FieldNotFound { .. }));

        let err = graph
            .new_individual(&mut store, &schema, &ex("Nope"), "x", None)
            .unwrap_err();
        assert!(matches!(err, RatioError::ClassNotFound(_)));
    }

    #[test]
    fn individuals_get_distinct_uris() {
        let (mut store, schema, mut graph) = record();
        let (trial, first) = trial_with_arm(&mut store, &schema, &mut graph);
        let (second, _) = graph
            .new_individual(
                &mut store,
                &schema,
                &ex("Arm"),
                "Arm B",
                Some((&trial, &ex("hasArm"))),
            )
            .unwrap();

        assert_ne!(first, second.uri);
        let indices: Vec<u64> = graph
            .sorted_values(&trial, &ex("hasArm"))
            .iter()
            .map(|(i, _)| *i)
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn attaching_through_a_plain_property_is_refused() {
        let (mut store, schema, mut graph) = record();
        let (_, arm) = trial_with_arm(&mut store, &schema, &mut graph);
        let before = graph.graph().rows();

        let result = graph.new_individual(
            &mut store,
            &schema,
            &ex("Drug"),
            "Orphan",
            Some((&arm, &ex("drug"))),
        );
        assert!(matches!(result, Err(RatioError::NotAllowed(_))));
        assert_eq!(graph.graph().rows(), before);
        assert!(graph.sorted_values(&arm, &ex("drug")).is_empty());

        let deleted = graph
            .delete_individual_recursive(&mut store, &schema, &arm)
            .unwrap();
        assert_eq!(deleted, BTreeSet::from([arm]));
        assert!(
            graph
                .graph()
                .subjects(&Term::uri(RDF_TYPE), &ex("Drug"))
                .is_empty()
        );
    }

    #[test]
    fn delete_follows_described_edges_only() {
        let (mut store, schema, mut graph) = record();
        let (trial, arm) = trial_with_arm(&mut store, &schema, &mut graph);
        let (group, _) = graph
            .new_individual(&mut store, &schema, &ex("Group"), "G", Some((&arm, &ex("hasGroup"))))
            .unwrap();
        let (option, _) = graph
            .new_option(&mut store, &schema, &ex("Drug"), "Boldine")
            .unwrap();
        let index = graph.new_value(&mut store, &schema, &arm, &ex("drug")).unwrap();
        graph
            .change_value(&mut store, &schema, &arm, &ex("drug"), index, option.uri.lexical())
            .unwrap();

        let before = graph.graph().rows();
        let deleted = graph
            .delete_individual_recursive(&mut store, &schema, &arm)
            .unwrap();

        assert_eq!(deleted, BTreeSet::from([arm.clone(), group.uri.clone()]));
        assert!(!graph.graph().has_subject(&arm));
        assert!(!graph.graph().has_subject(&group.uri));
        assert!(graph.graph().has_subject(&option.uri));
        assert!(graph.sorted_values(&trial, &ex("hasArm")).is_empty());

        assert!(graph.undo_delete_individual(&mut store, &arm).unwrap() > 0);
        assert_eq!(graph.graph().rows(), before);
        assert_eq!(graph.undo_delete_individual(&mut store, &arm).unwrap(), 0);
        assert_eq!(graph.graph().rows(), before);
    }

    #[test]
    fn custom_options_become_selectable() {
        let (mut store, schema, mut graph) = record();
        let (_, arm) = trial_with_arm(&mut store, &schema, &mut graph);
        let (option, fields) = graph
            .new_option(&mut store, &schema, &ex("Antibiotic"), "Amoxicillin")
            .unwrap();

        assert!(option.custom);
        assert!(graph.is_custom(&option.uri));
        assert!(fields.contains(&ex("drug")));

        let index = graph.new_value(&mut store, &schema, &arm, &ex("drug")).unwrap();
        let outcome = graph
            .change_value(&mut store, &schema, &arm, &ex("drug"), index, option.uri.lexical())
            .unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn load_data_assigns_sequential_indices_and_keeps_root() {
        let (mut store, schema, mut graph) = record();
        let (trial, _) = trial_with_arm(&mut store, &schema, &mut graph);
        let data = format!(
            "@prefix ex: <http://ex.org/schema#> .\n\
             @prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
             @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
             {t} a owl:NamedIndividual, ex:Trial ; rdfs:label \"Loaded\" ;\n\
                 ex:title \"T1\", \"T2\" .\n",
            t = trial.to_n3()
        );

        let count = graph
            .load_data(&mut store, &schema, &data, RdfFormat::Turtle)
            .unwrap();
        assert_eq!(count, 6);
        assert_eq!(graph.root_uri(), Some(trial.clone()));

        let titles = graph.sorted_values(&trial, &ex("title"));
        assert_eq!(titles[0], (0, Term::literal("T1")));
        assert_eq!(titles[1], (1, Term::literal("T2")));
        assert_eq!(graph.root(&schema).unwrap().label, "Loaded");
    }
}
