//! # In-Memory Triple Graph
//!
//! The mutable mirror of one scope's live triples.
//!
//! Plain triples are indexed subject → predicate → objects. Values of ordered
//! multi-valued properties live in a side index keyed by `(subject, predicate)`
//! that maps each `property_index` to its object, which restores the ordering
//! an unordered triple relation cannot express. A reverse object index serves
//! "who points at this node" lookups for cascading deletes.
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering.

use crate::storage::StoredTriple;
use crate::{Term, Triple};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Live triples of one scope.
#[derive(Debug, Clone, Default)]
pub struct TripleGraph {
    /// Unindexed triples: subject -> predicate -> objects
    spo: BTreeMap<Term, BTreeMap<Term, BTreeSet<Term>>>,

    /// Reverse lookup: object -> (subject, predicate), indexed or not
    osp: BTreeMap<Term, BTreeSet<(Term, Term)>>,

    /// Ordered values: (subject, predicate) -> index -> object
    properties: BTreeMap<(Term, Term), BTreeMap<u64, Term>>,
}

impl TripleGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from stored rows.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = StoredTriple>) -> Self {
        let mut graph = Self::new();
        for row in rows {
            graph.insert_stored(row);
        }
        graph
    }

    /// Insert a row, honouring its property index.
    pub fn insert_stored(&mut self, row: StoredTriple) {
        match row.index {
            Some(index) => self.insert_indexed(row.triple, index),
            None => {
                self.insert(row.triple);
            }
        }
    }

    /// Insert an unindexed triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        let Triple {
            subject,
            predicate,
            object,
        } = triple;
        let inserted = self
            .spo
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        self.osp
            .entry(object)
            .or_default()
            .insert((subject, predicate));
        inserted
    }

    /// Insert or replace the value at `index` of `(subject, predicate)`.
    pub fn insert_indexed(&mut self, triple: Triple, index: u64) {
        let Triple {
            subject,
            predicate,
            object,
        } = triple;
        let key = (subject, predicate);
        let previous = self
            .properties
            .entry(key.clone())
            .or_default()
            .insert(index, object.clone());
        if let Some(previous) = previous {
            self.forget_reverse_if_unused(&key, &previous);
        }
        self.osp.entry(object).or_default().insert(key);
    }

    /// Remove an unindexed triple. Returns false if it was absent.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        let removed = self
            .spo
            .get_mut(&triple.subject)
            .and_then(|preds| preds.get_mut(&triple.predicate))
            .is_some_and(|objects| objects.remove(&triple.object));
        if removed {
            self.prune_spo(&triple.subject, &triple.predicate);
            let key = (triple.subject.clone(), triple.predicate.clone());
            self.forget_reverse_if_unused(&key, &triple.object);
        }
        removed
    }

    /// Remove every unindexed object of `(subject, predicate)`.
    pub fn remove_objects(&mut self, subject: &Term, predicate: &Term) -> Vec<Term> {
        let objects: Vec<Term> = self.plain_objects(subject, predicate).cloned().collect();
        for object in &objects {
            self.remove(&Triple::new(subject.clone(), predicate.clone(), object.clone()));
        }
        objects
    }

    /// Remove the value at `index` of `(subject, predicate)`.
    pub fn remove_indexed(&mut self, subject: &Term, predicate: &Term, index: u64) -> Option<Term> {
        let key = (subject.clone(), predicate.clone());
        let values = self.properties.get_mut(&key)?;
        let removed = values.remove(&index)?;
        if values.is_empty() {
            self.properties.remove(&key);
        }
        self.forget_reverse_if_unused(&key, &removed);
        Some(removed)
    }

    /// Remove every triple in which `node` is the subject or the object.
    ///
    /// Returns the removed triples together with their indices.
    pub fn remove_node(&mut self, node: &Term) -> Vec<StoredTriple> {
        let mut removed = Vec::new();

        // Outgoing
        for (predicate, object, index) in self.outgoing_with_index(node) {
            removed.push(StoredTriple::new(
                Triple::new(node.clone(), predicate, object),
                index,
            ));
        }
        // Incoming
        for (subject, predicate) in self.osp.get(node).cloned().unwrap_or_default() {
            let plain = self
                .spo
                .get(&subject)
                .and_then(|preds| preds.get(&predicate))
                .is_some_and(|objects| objects.contains(node));
            if plain {
                removed.push(StoredTriple::new(
                    Triple::new(subject.clone(), predicate.clone(), node.clone()),
                    None,
                ));
            }
            if let Some(values) = self.properties.get(&(subject.clone(), predicate.clone())) {
                for (index, value) in values {
                    if value == node {
                        removed.push(StoredTriple::new(
                            Triple::new(subject.clone(), predicate.clone(), node.clone()),
                            Some(*index),
                        ));
                    }
                }
            }
        }

        for row in &removed {
            match row.index {
                Some(index) => {
                    self.remove_indexed(&row.triple.subject, &row.triple.predicate, index);
                }
                None => {
                    self.remove(&row.triple);
                }
            }
        }
        removed.sort();
        removed.dedup();
        removed
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    fn plain_objects(&self, subject: &Term, predicate: &Term) -> impl Iterator<Item = &Term> {
        self.spo
            .get(subject)
            .and_then(|preds| preds.get(predicate))
            .into_iter()
            .flatten()
    }

    /// All objects of `(subject, predicate)`: plain ones first, then ordered
    /// values in index order.
    #[must_use]
    pub fn objects(&self, subject: &Term, predicate: &Term) -> Vec<&Term> {
        let mut out: Vec<&Term> = self.plain_objects(subject, predicate).collect();
        if let Some(values) = self.properties.get(&(subject.clone(), predicate.clone())) {
            out.extend(values.values());
        }
        out
    }

    /// The first object of `(subject, predicate)`, if any.
    #[must_use]
    pub fn object(&self, subject: &Term, predicate: &Term) -> Option<&Term> {
        self.objects(subject, predicate).into_iter().next()
    }

    /// Subjects `s` with a triple `(s, predicate, object)`.
    #[must_use]
    pub fn subjects(&self, predicate: &Term, object: &Term) -> Vec<&Term> {
        self.osp
            .get(object)
            .into_iter()
            .flatten()
            .filter(|(_, p)| p == predicate)
            .map(|(s, _)| s)
            .collect()
    }

    /// `(subject, predicate)` pairs pointing at `object`.
    #[must_use]
    pub fn incoming(&self, object: &Term) -> Vec<(&Term, &Term)> {
        self.osp
            .get(object)
            .into_iter()
            .flatten()
            .map(|(s, p)| (s, p))
            .collect()
    }

    /// Whether the unindexed triple or any ordered value matches.
    #[must_use]
    pub fn contains(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        self.objects(subject, predicate).contains(&object)
    }

    /// Whether `node` is the subject of any triple.
    #[must_use]
    pub fn has_subject(&self, node: &Term) -> bool {
        self.spo.contains_key(node) || self.properties.keys().any(|(s, _)| s == node)
    }

    /// Whether `node` is the object of any triple.
    #[must_use]
    pub fn is_referenced(&self, node: &Term) -> bool {
        self.osp.contains_key(node)
    }

    /// The ordered values of `(subject, predicate)` in ascending index order.
    #[must_use]
    pub fn values(&self, subject: &Term, predicate: &Term) -> Option<&BTreeMap<u64, Term>> {
        self.properties
            .get(&(subject.clone(), predicate.clone()))
    }

    /// `(predicate, object)` pairs leaving `subject`, plain and ordered.
    #[must_use]
    pub fn outgoing(&self, subject: &Term) -> Vec<(&Term, &Term)> {
        let mut out: Vec<(&Term, &Term)> = self
            .spo
            .get(subject)
            .into_iter()
            .flat_map(|preds| {
                preds
                    .iter()
                    .flat_map(|(p, objects)| objects.iter().map(move |o| (p, o)))
            })
            .collect();
        for ((s, p), values) in self.properties.range(
            (subject.clone(), Term::Uri(String::new()))..,
        ) {
            if s != subject {
                break;
            }
            out.extend(values.values().map(|o| (p, o)));
        }
        out
    }

    fn outgoing_with_index(&self, subject: &Term) -> Vec<(Term, Term, Option<u64>)> {
        let mut out: Vec<(Term, Term, Option<u64>)> = self
            .spo
            .get(subject)
            .into_iter()
            .flat_map(|preds| {
                preds.iter().flat_map(|(p, objects)| {
                    objects.iter().map(move |o| (p.clone(), o.clone(), None))
                })
            })
            .collect();
        for ((s, p), values) in &self.properties {
            if s == subject {
                out.extend(
                    values
                        .iter()
                        .map(|(index, o)| (p.clone(), o.clone(), Some(*index))),
                );
            }
        }
        out
    }

    /// Every live triple with its index, in deterministic order.
    #[must_use]
    pub fn rows(&self) -> Vec<StoredTriple> {
        let mut rows: Vec<StoredTriple> = self
            .spo
            .iter()
            .flat_map(|(s, preds)| {
                preds.iter().flat_map(move |(p, objects)| {
                    objects.iter().map(move |o| {
                        StoredTriple::new(Triple::new(s.clone(), p.clone(), o.clone()), None)
                    })
                })
            })
            .collect();
        for ((s, p), values) in &self.properties {
            rows.extend(values.iter().map(|(index, o)| {
                StoredTriple::new(Triple::new(s.clone(), p.clone(), o.clone()), Some(*index))
            }));
        }
        rows
    }

    /// Number of live triples.
    #[must_use]
    pub fn len(&self) -> usize {
        let plain: usize = self
            .spo
            .values()
            .flat_map(|preds| preds.values())
            .map(BTreeSet::len)
            .sum();
        let indexed: usize = self.properties.values().map(BTreeMap::len).sum();
        plain + indexed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spo.is_empty() && self.properties.is_empty()
    }

    // =========================================================================
    // TREE WALK
    // =========================================================================

    /// Breadth-first walk from `start` along edges whose predicate satisfies
    /// `follow`. Only URI and blank node objects are entered. Each node is
    /// visited once, so cycles terminate.
    ///
    /// Returns the visited nodes in visiting order, `start` first.
    pub fn walk<F>(&self, start: &Term, follow: F) -> Vec<Term>
    where
        F: Fn(&Term) -> bool,
    {
        let mut visited: BTreeSet<Term> = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(current) = queue.pop_front() {
            for (predicate, object) in self.outgoing(&current) {
                if !follow(predicate) || matches!(object, Term::Literal(_)) {
                    continue;
                }
                if visited.insert(object.clone()) {
                    queue.push_back(object.clone());
                }
            }
            order.push(current);
        }

        order
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn prune_spo(&mut self, subject: &Term, predicate: &Term) {
        if let Some(preds) = self.spo.get_mut(subject) {
            if preds.get(predicate).is_some_and(BTreeSet::is_empty) {
                preds.remove(predicate);
            }
            if preds.is_empty() {
                self.spo.remove(subject);
            }
        }
    }

    /// Drop `(s, p)` from the reverse index of `object` unless another plain
    /// triple or ordered value of `(s, p)` still points at it.
    fn forget_reverse_if_unused(&mut self, key: &(Term, Term), object: &Term) {
        let still_plain = self
            .spo
            .get(&key.0)
            .and_then(|preds| preds.get(&key.1))
            .is_some_and(|objects| objects.contains(object));
        let still_indexed = self
            .properties
            .get(key)
            .is_some_and(|values| values.values().any(|v| v == object));
        if still_plain || still_indexed {
            return;
        }
        if let Some(refs) = self.osp.get_mut(object) {
            refs.remove(key);
            if refs.is_empty() {
                self.osp.remove(object);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Term {
        Term::uri(format!("http://ex.org/{s}"))
    }

    fn triple(s: &str, p: &str, o: Term) -> Triple {
        Triple::new(uri(s), uri(p), o)
    }

    #[test]
    fn insert_and_lookup_plain() {
        let mut graph = TripleGraph::new();
        assert!(graph.insert(triple("a", "label", Term::literal("A"))));
        assert!(!graph.insert(triple("a", "label", Term::literal("A"))));

        assert_eq!(graph.object(&uri("a"), &uri("label")), Some(&Term::literal("A")));
        assert_eq!(graph.len(), 1);
        assert!(graph.has_subject(&uri("a")));
    }

    #[test]
    fn ordered_values_keep_index_order() {
        let mut graph = TripleGraph::new();
        graph.insert_indexed(triple("a", "p", Term::literal("third")), 7);
        graph.insert_indexed(triple("a", "p", Term::literal("first")), 0);
        graph.insert_indexed(triple("a", "p", Term::literal("second")), 3);

        let values = graph.values(&uri("a"), &uri("p")).expect("values");
        let indices: Vec<u64> = values.keys().copied().collect();
        assert_eq!(indices, vec![0, 3, 7]);
        assert_eq!(graph.objects(&uri("a"), &uri("p")).len(), 3);
    }

    #[test]
    fn duplicate_placeholders_survive_single_removal() {
        let mut graph = TripleGraph::new();
        graph.insert_indexed(triple("a", "p", Term::empty()), 0);
        graph.insert_indexed(triple("a", "p", Term::empty()), 1);

        assert_eq!(graph.remove_indexed(&uri("a"), &uri("p"), 0), Some(Term::empty()));
        assert!(graph.contains(&uri("a"), &uri("p"), &Term::empty()));
        assert_eq!(graph.subjects(&uri("p"), &Term::empty()), vec![&uri("a")]);
    }

    #[test]
    fn replacing_indexed_value_updates_reverse_index() {
        let mut graph = TripleGraph::new();
        graph.insert_indexed(triple("a", "p", uri("x")), 0);
        graph.insert_indexed(triple("a", "p", uri("y")), 0);

        assert!(!graph.is_referenced(&uri("x")));
        assert!(graph.is_referenced(&uri("y")));
    }

    #[test]
    fn remove_node_removes_both_directions() {
        let mut graph = TripleGraph::new();
        graph.insert_indexed(triple("parent", "has", uri("child")), 0);
        graph.insert(triple("child", "label", Term::literal("C")));
        graph.insert(triple("other", "label", Term::literal("O")));

        let removed = graph.remove_node(&uri("child"));

        assert_eq!(removed.len(), 2);
        assert!(removed.iter().any(|row| row.index == Some(0)));
        assert_eq!(graph.len(), 1);
        assert!(!graph.is_referenced(&uri("child")));
        assert!(graph.values(&uri("parent"), &uri("has")).is_none());
    }

    #[test]
    fn remove_objects_clears_predicate() {
        let mut graph = TripleGraph::new();
        graph.insert(triple("a", "label", Term::literal("one")));
        graph.insert(triple("a", "label", Term::literal("two")));

        let removed = graph.remove_objects(&uri("a"), &uri("label"));

        assert_eq!(removed.len(), 2);
        assert!(graph.is_empty());
    }

    #[test]
    fn walk_follows_selected_edges_and_terminates_on_cycles() {
        let mut graph = TripleGraph::new();
        graph.insert_indexed(triple("a", "owns", uri("b")), 0);
        graph.insert_indexed(triple("b", "owns", uri("c")), 0);
        graph.insert_indexed(triple("c", "owns", uri("a")), 0);
        graph.insert(triple("b", "refers", uri("d")));

        let owned = graph.walk(&uri("a"), |p| *p == uri("owns"));
        assert_eq!(owned, vec![uri("a"), uri("b"), uri("c")]);

        let all = graph.walk(&uri("a"), |_| true);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn rows_round_trip_through_from_rows() {
        let mut graph = TripleGraph::new();
        graph.insert(triple("a", "label", Term::literal("A")));
        graph.insert_indexed(triple("a", "p", Term::literal("v")), 4);

        let rebuilt = TripleGraph::from_rows(graph.rows());

        assert_eq!(rebuilt.rows(), graph.rows());
        assert_eq!(rebuilt.len(), 2);
    }
}
