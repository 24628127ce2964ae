//! # Schema Catalog
//!
//! Read-mostly view over the schema graph: class and property metadata,
//! hierarchy closure and URI minting.
//!
//! The catalog is built once per session from the persisted schema scope.
//! Every change (`load_schema`, `new_option`) bumps `generation`, which
//! invalidates materialized trees built against an older catalog.

use crate::formats::{RdfFormat, parse_rdf};
use crate::graph::TripleGraph;
use crate::materialize::FieldOption;
use crate::storage::{StoredTriple, TripleStore, WriteBatch};
use crate::vocab::{
    DEFAULT_BASE, DEFAULT_ORDER, DEFAULT_WIDTH, OWL_CLASS, OWL_DATATYPE_PROPERTY,
    OWL_FUNCTIONAL_PROPERTY, OWL_NAMED_INDIVIDUAL, OWL_OBJECT_PROPERTY, OWL_ONE_OF,
    RATIO_CONFIGURATION, RATIO_CREATOR, RATIO_CUSTOM_OPTION_ALLOWED, RATIO_DELETABLE,
    RATIO_DESCRIBED, RATIO_HAS_BASE, RATIO_ORDER, RATIO_SHOW_LABEL, RATIO_SUBHEADING,
    RATIO_WIDTH, RDF_FIRST, RDF_NIL, RDF_REST, RDF_TYPE, RDFS_COMMENT, RDFS_DOMAIN,
    RDFS_LABEL, RDFS_RANGE, RDFS_SUBCLASS_OF, STANDARD_PREFIXES,
};
use crate::{Namespace, RatioError, RecordId, Scope, Term, Triple};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info};

/// How a property is rendered and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Values are individuals (options or described entities).
    Object,
    /// Values are literals.
    Datatype,
    /// A section heading without values.
    Subheading,
}

/// Truth value of a flag literal (`true`, `"True"^^xsd:boolean`, `1`).
pub(crate) fn literal_bool(term: &Term) -> Option<bool> {
    let lit = term.as_literal()?;
    match lit.value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// The schema graph and its bound prefixes.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    graph: TripleGraph,
    namespaces: Vec<Namespace>,
    generation: u64,
}

impl SchemaCatalog {
    /// Load the schema scope and namespace table.
    pub fn open(store: &dyn TripleStore) -> Result<Self, RatioError> {
        let graph = TripleGraph::from_rows(store.triples(Scope::Schema)?);
        let namespaces = with_standard_prefixes(store.namespaces()?);
        debug!(triples = graph.len(), "opened schema catalog");
        Ok(Self {
            graph,
            namespaces,
            generation: 0,
        })
    }

    /// Replace the whole schema with `data` and rebind prefixes.
    ///
    /// Returns the number of schema triples.
    pub fn load_schema(
        &mut self,
        store: &mut dyn TripleStore,
        data: &str,
        format: RdfFormat,
    ) -> Result<usize, RatioError> {
        let doc = parse_rdf(data, format)?;
        let unique: BTreeSet<Triple> = doc.triples.into_iter().collect();
        let rows: Vec<StoredTriple> = unique.into_iter().map(StoredTriple::plain).collect();
        let namespaces = with_standard_prefixes(doc.namespaces);

        store.replace(Scope::Schema, &rows, Some(&namespaces))?;

        self.graph = TripleGraph::from_rows(rows);
        self.namespaces = namespaces;
        self.generation += 1;

        info!(
            triples = self.graph.len(),
            prefixes = self.namespaces.len(),
            %format,
            "schema loaded"
        );
        Ok(self.graph.len())
    }

    #[must_use]
    pub fn graph(&self) -> &TripleGraph {
        &self.graph
    }

    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Changes on every schema mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // =========================================================================
    // NAMES
    // =========================================================================

    /// `prefix:local` using the longest matching namespace, or the uri itself.
    #[must_use]
    pub fn compact(&self, uri: &str) -> String {
        self.namespaces
            .iter()
            .filter(|ns| uri.len() > ns.uri.len() && uri.starts_with(&ns.uri))
            .max_by_key(|ns| ns.uri.len())
            .map(|ns| format!("{}:{}", ns.prefix, &uri[ns.uri.len()..]))
            .unwrap_or_else(|| uri.to_string())
    }

    /// Inverse of [`compact`](Self::compact): accepts `prefix:local`,
    /// `<uri>` or a full URI.
    pub fn expand(&self, name: &str) -> Result<Term, RatioError> {
        let name = name.trim();
        if let Some(inner) = name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
            return Term::parse_uri(inner);
        }
        let bound = name.split_once(':').and_then(|(prefix, local)| {
            self.namespaces
                .iter()
                .find(|ns| ns.prefix == prefix)
                .map(|ns| format!("{}{}", ns.uri, local))
        });
        Term::parse_uri(bound.as_deref().unwrap_or(name))
    }

    /// The local part of the compact name.
    #[must_use]
    pub fn local_name(&self, uri: &str) -> String {
        let compact = self.compact(uri);
        if compact != uri {
            return compact
                .split_once(':')
                .map(|(_, local)| local.to_string())
                .unwrap_or(compact);
        }
        uri.trim_end_matches(['#', '/'])
            .rsplit(['#', '/'])
            .next()
            .unwrap_or(uri)
            .to_string()
    }

    /// `rdfs:label` of a schema term, falling back to its local name.
    #[must_use]
    pub fn label(&self, term: &Term) -> String {
        match self.graph.object(term, &Term::uri(RDFS_LABEL)) {
            Some(label) => label.lexical().to_string(),
            None => match term {
                Term::Uri(uri) => self.local_name(uri),
                other => other.lexical().to_string(),
            },
        }
    }

    #[must_use]
    pub fn comment(&self, term: &Term) -> Option<String> {
        self.graph
            .object(term, &Term::uri(RDFS_COMMENT))
            .map(|c| c.lexical().to_string())
    }

    // =========================================================================
    // CLASSES
    // =========================================================================

    #[must_use]
    pub fn is_class(&self, term: &Term) -> bool {
        self.graph
            .contains(term, &Term::uri(RDF_TYPE), &Term::uri(OWL_CLASS))
    }

    /// Every declared class, in term order.
    #[must_use]
    pub fn classes(&self) -> Vec<Term> {
        self.graph
            .subjects(&Term::uri(RDF_TYPE), &Term::uri(OWL_CLASS))
            .into_iter()
            .cloned()
            .collect()
    }

    /// `class` and all its transitive subclasses.
    #[must_use]
    pub fn subclasses(&self, class: &Term) -> BTreeSet<Term> {
        let sub_class_of = Term::uri(RDFS_SUBCLASS_OF);
        self.closure(class, |c| {
            self.graph
                .subjects(&sub_class_of, c)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// `class` and all its transitive superclasses.
    #[must_use]
    pub fn superclasses(&self, class: &Term) -> BTreeSet<Term> {
        let sub_class_of = Term::uri(RDFS_SUBCLASS_OF);
        self.closure(class, |c| {
            self.graph
                .objects(c, &sub_class_of)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    fn closure<F>(&self, start: &Term, next: F) -> BTreeSet<Term>
    where
        F: Fn(&Term) -> Vec<Term>,
    {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(next(&current));
        }
        seen
    }

    /// Individuals typed as `class` or one of its subclasses, in `graph`.
    #[must_use]
    pub fn tokens_in(&self, graph: &TripleGraph, class: &Term) -> BTreeSet<Term> {
        let rdf_type = Term::uri(RDF_TYPE);
        self.subclasses(class)
            .iter()
            .flat_map(|c| graph.subjects(&rdf_type, c))
            .cloned()
            .collect()
    }

    /// Schema individuals typed as `class` or one of its subclasses.
    #[must_use]
    pub fn tokens(&self, class: &Term) -> BTreeSet<Term> {
        self.tokens_in(&self.graph, class)
    }

    /// The first asserted type of `individual` in `graph` that is a schema class.
    #[must_use]
    pub fn class_of(&self, graph: &TripleGraph, individual: &Term) -> Option<Term> {
        graph
            .objects(individual, &Term::uri(RDF_TYPE))
            .into_iter()
            .find(|t| self.is_class(t))
            .cloned()
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    #[must_use]
    pub fn property_kind(&self, property: &Term) -> Option<PropertyKind> {
        let types = self.graph.objects(property, &Term::uri(RDF_TYPE));
        let has = |uri: &str| types.iter().any(|t| t.as_uri() == Some(uri));
        if has(RATIO_SUBHEADING) {
            Some(PropertyKind::Subheading)
        } else if has(OWL_OBJECT_PROPERTY) {
            Some(PropertyKind::Object)
        } else if has(OWL_DATATYPE_PROPERTY) {
            Some(PropertyKind::Datatype)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_property(&self, property: &Term) -> bool {
        self.property_kind(property).is_some()
    }

    #[must_use]
    pub fn ranges(&self, property: &Term) -> Vec<&Term> {
        self.graph.objects(property, &Term::uri(RDFS_RANGE))
    }

    #[must_use]
    pub fn range(&self, property: &Term) -> Option<&Term> {
        self.graph.object(property, &Term::uri(RDFS_RANGE))
    }

    fn int_attr(&self, subject: &Term, predicate: &str) -> Option<i64> {
        self.graph
            .object(subject, &Term::uri(predicate))
            .and_then(|o| o.lexical().trim().parse().ok())
    }

    fn flag(&self, subject: &Term, predicate: &str) -> Option<bool> {
        self.graph
            .object(subject, &Term::uri(predicate))
            .and_then(literal_bool)
    }

    #[must_use]
    pub fn order(&self, property: &Term) -> i64 {
        self.int_attr(property, RATIO_ORDER).unwrap_or(DEFAULT_ORDER)
    }

    #[must_use]
    pub fn width(&self, property: &Term) -> i64 {
        self.int_attr(property, RATIO_WIDTH).unwrap_or(DEFAULT_WIDTH)
    }

    #[must_use]
    pub fn show_label(&self, property: &Term) -> bool {
        self.flag(property, RATIO_SHOW_LABEL).unwrap_or(true)
    }

    #[must_use]
    pub fn is_functional(&self, property: &Term) -> bool {
        self.graph.contains(
            property,
            &Term::uri(RDF_TYPE),
            &Term::uri(OWL_FUNCTIONAL_PROPERTY),
        )
    }

    #[must_use]
    pub fn is_described(&self, property: &Term) -> bool {
        self.flag(property, RATIO_DESCRIBED).unwrap_or(false)
    }

    #[must_use]
    pub fn is_deletable(&self, property: &Term) -> bool {
        self.flag(property, RATIO_DELETABLE).unwrap_or(true)
    }

    #[must_use]
    pub fn allows_custom_options(&self, property: &Term) -> bool {
        self.flag(property, RATIO_CUSTOM_OPTION_ALLOWED)
            .unwrap_or(false)
    }

    /// Properties declared with `class` as domain, in display order.
    #[must_use]
    pub fn child_properties(&self, class: &Term) -> Vec<Term> {
        let mut props: Vec<Term> = self
            .graph
            .subjects(&Term::uri(RDFS_DOMAIN), class)
            .into_iter()
            .filter(|p| self.is_property(p))
            .cloned()
            .collect();
        props.sort_by_key(|p| (self.order(p), p.clone()));
        props
    }

    /// Properties whose range is `class` or one of its superclasses.
    #[must_use]
    pub fn parent_properties(&self, class: &Term) -> BTreeSet<Term> {
        let range = Term::uri(RDFS_RANGE);
        self.superclasses(class)
            .iter()
            .flat_map(|c| self.graph.subjects(&range, c))
            .filter(|p| self.is_property(p))
            .cloned()
            .collect()
    }

    /// Members of the `owl:oneOf` list of an enumerated range.
    ///
    /// A malformed (cyclic or dangling) list ends the walk early.
    #[must_use]
    pub fn one_of(&self, range: &Term) -> Option<Vec<Term>> {
        let head = self.graph.object(range, &Term::uri(OWL_ONE_OF))?;
        let (first, rest, nil) = (
            Term::uri(RDF_FIRST),
            Term::uri(RDF_REST),
            Term::uri(RDF_NIL),
        );

        let mut members = Vec::new();
        let mut visited = BTreeSet::new();
        let mut node = head.clone();
        while node != nil && visited.insert(node.clone()) {
            if let Some(member) = self.graph.object(&node, &first) {
                members.push(member.clone());
            }
            match self.graph.object(&node, &rest) {
                Some(next) => node = next.clone(),
                None => break,
            }
        }
        Some(members)
    }

    // =========================================================================
    // MINTING
    // =========================================================================

    /// Base for minted URIs.
    #[must_use]
    pub fn base(&self) -> String {
        self.graph
            .object(
                &Term::uri(RATIO_CONFIGURATION),
                &Term::uri(RATIO_HAS_BASE),
            )
            .map(|b| b.lexical().to_string())
            .unwrap_or_else(|| DEFAULT_BASE.to_string())
    }

    /// A URI `base + ClassName + "_" [+ record + "_"] + n` not used as a
    /// subject anywhere in the store, with the smallest positive `n`.
    pub fn mint_uri(
        &self,
        store: &dyn TripleStore,
        class: &Term,
        record: Option<RecordId>,
    ) -> Result<Term, RatioError> {
        let class_name = self.local_name(class.lexical());
        let stem = match record {
            Some(id) => format!("{}{}_{}_", self.base(), class_name, id),
            None => format!("{}{}_", self.base(), class_name),
        };

        let used = store.used_subjects()?;
        let mut n: u64 = 1;
        while used.contains(&format!("{stem}{n}")) {
            n += 1;
        }
        Ok(Term::uri(format!("{stem}{n}")))
    }

    /// Create a schema-level option of `class`.
    ///
    /// Returns the option and the non-described properties whose option list
    /// now includes it.
    pub fn new_option(
        &mut self,
        store: &mut dyn TripleStore,
        class: &Term,
        label: &str,
        creator: Option<&str>,
    ) -> Result<(FieldOption, BTreeSet<Term>), RatioError> {
        let uri = self.mint_uri(&*store, class, None)?;
        let rdf_type = Term::uri(RDF_TYPE);

        let mut triples = vec![
            Triple::new(uri.clone(), rdf_type.clone(), Term::uri(OWL_NAMED_INDIVIDUAL)),
            Triple::new(uri.clone(), rdf_type, class.clone()),
            Triple::new(uri.clone(), Term::uri(RDFS_LABEL), Term::literal(label)),
        ];
        if let Some(creator) = creator {
            triples.push(Triple::new(
                uri.clone(),
                Term::uri(RATIO_CREATOR),
                Term::uri(creator),
            ));
        }

        let mut batch = WriteBatch::new();
        for triple in &triples {
            batch.insert(triple.clone(), None);
        }
        store.apply(Scope::Schema, &batch)?;
        for triple in triples {
            self.graph.insert(triple);
        }
        self.generation += 1;

        let option_fields = self.option_fields(class);
        debug!(uri = %uri, class = %class, "schema option created");

        let option = FieldOption {
            uri,
            label: label.to_string(),
            class_uri: class.clone(),
            custom: true,
            comment: None,
        };
        Ok((option, option_fields))
    }

    /// Non-described properties that list individuals of `class` as options.
    #[must_use]
    pub fn option_fields(&self, class: &Term) -> BTreeSet<Term> {
        self.parent_properties(class)
            .into_iter()
            .filter(|p| {
                self.property_kind(p) == Some(PropertyKind::Object) && !self.is_described(p)
            })
            .collect()
    }
}

/// Bind the well-known prefixes a document did not declare itself.
fn with_standard_prefixes(mut namespaces: Vec<Namespace>) -> Vec<Namespace> {
    for (prefix, uri) in STANDARD_PREFIXES {
        if !namespaces.iter().any(|ns| ns.prefix == prefix || ns.uri == uri) {
            namespaces.push(Namespace::new(prefix, uri));
        }
    }
    namespaces.sort();
    namespaces.dedup_by(|a, b| a.prefix == b.prefix);
    namespaces
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryTripleStore;
    use crate::testing::{ex, schema_store as loaded};

    #[test]
    fn labels_fall_back_to_local_names() {
        let (_, schema) = loaded();
        assert_eq!(schema.label(&ex("Trial")), "Trial");
        assert_eq!(schema.label(&ex("Arm")), "Arm");
        assert_eq!(schema.compact("http://ex.org/schema#Arm"), "ex:Arm");
        assert_eq!(schema.local_name("http://other.org/things/Widget"), "Widget");
    }

    #[test]
    fn expand_inverts_compact() {
        let (_, schema) = loaded();
        assert_eq!(schema.expand("ex:Arm").unwrap(), ex("Arm"));
        assert_eq!(schema.expand("<http://ex.org/schema#Arm>").unwrap(), ex("Arm"));
        assert_eq!(schema.expand("http://ex.org/schema#Arm").unwrap(), ex("Arm"));
        assert!(schema.expand("not a uri").is_err());
    }

    #[test]
    fn property_attributes_and_defaults() {
        let (_, schema) = loaded();
        assert_eq!(schema.property_kind(&ex("hasArm")), Some(PropertyKind::Object));
        assert_eq!(schema.property_kind(&ex("title")), Some(PropertyKind::Datatype));
        assert!(schema.is_described(&ex("hasArm")));
        assert!(!schema.is_described(&ex("drug")));
        assert!(schema.is_functional(&ex("title")));
        assert_eq!(schema.width(&ex("title")), 100);
        assert_eq!(schema.width(&ex("hasArm")), DEFAULT_WIDTH);
        assert!(!schema.show_label(&ex("phase")));
        assert!(schema.show_label(&ex("title")));
        assert!(!schema.is_deletable(&ex("phase")));
        assert!(schema.is_deletable(&ex("hasArm")));
        assert!(schema.allows_custom_options(&ex("drug")));
    }

    #[test]
    fn child_properties_follow_order() {
        let (_, schema) = loaded();
        assert_eq!(
            schema.child_properties(&ex("Trial")),
            vec![
                ex("title"),
                ex("hasArm"),
                ex("phase"),
                ex("site"),
                ex("participants"),
                ex("blinded")
            ]
        );
    }

    #[test]
    fn tokens_include_subclass_individuals() {
        let (_, schema) = loaded();
        let tokens = schema.tokens(&ex("Drug"));
        assert!(tokens.contains(&ex("penicillin")));
        assert!(tokens.contains(&ex("aspirin")));
        assert_eq!(schema.tokens(&ex("Antibiotic")).len(), 1);
    }

    #[test]
    fn parent_properties_use_superclasses() {
        let (_, schema) = loaded();
        let parents = schema.parent_properties(&ex("Antibiotic"));
        assert!(parents.contains(&ex("drug")));
        assert_eq!(schema.option_fields(&ex("Arm")), BTreeSet::new());
        assert_eq!(schema.property_kind(&ex("details")), Some(PropertyKind::Subheading));
    }

    #[test]
    fn one_of_reads_rdf_list() {
        let (_, schema) = loaded();
        let members = schema.one_of(&ex("Phase")).expect("enumeration");
        let values: Vec<&str> = members.iter().map(Term::lexical).collect();
        assert_eq!(values, vec!["I", "II", "III"]);
        assert!(schema.one_of(&ex("Drug")).is_none());
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let mut store = MemoryTripleStore::new();
        let mut schema = SchemaCatalog::open(&store).expect("open");
        let data = "@prefix ex: <http://ex.org/> .\n\
                    @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
                    ex:A rdfs:subClassOf ex:B . ex:B rdfs:subClassOf ex:A .\n";
        schema
            .load_schema(&mut store, data, RdfFormat::Turtle)
            .expect("load");
        assert_eq!(schema.subclasses(&Term::uri("http://ex.org/A")).len(), 2);
        assert_eq!(schema.superclasses(&Term::uri("http://ex.org/B")).len(), 2);
    }

    #[test]
    fn minting_skips_used_subjects() {
        let (mut store, schema) = loaded();
        let first = schema
            .mint_uri(&store, &ex("Arm"), Some(RecordId(4)))
            .expect("mint");
        assert_eq!(first, Term::uri("http://ex.org/data#Arm_4_1"));

        let mut batch = WriteBatch::new();
        batch.insert(
            Triple::new(first.clone(), Term::uri(RDF_TYPE), ex("Arm")),
            None,
        );
        store.apply(Scope::Record(RecordId(4)), &batch).expect("apply");

        let second = schema
            .mint_uri(&store, &ex("Arm"), Some(RecordId(4)))
            .expect("mint");
        assert_eq!(second, Term::uri("http://ex.org/data#Arm_4_2"));
    }

    #[test]
    fn new_option_is_persisted_and_reported() {
        let (mut store, mut schema) = loaded();
        let generation = schema.generation();

        let (option, fields) = schema
            .new_option(&mut store, &ex("Antibiotic"), "Amoxicillin", Some("http://ex.org/u/alice"))
            .expect("option");

        assert_eq!(option.uri, Term::uri("http://ex.org/data#Antibiotic_1"));
        assert!(fields.contains(&ex("drug")));
        assert!(schema.tokens(&ex("Drug")).contains(&option.uri));
        assert!(schema.generation() > generation);

        let reopened = SchemaCatalog::open(&store).expect("reopen");
        assert_eq!(reopened.label(&option.uri), "Amoxicillin");
    }

    #[test]
    fn standard_prefixes_are_bound() {
        let store = MemoryTripleStore::new();
        let schema = SchemaCatalog::open(&store).expect("open");
        assert_eq!(
            schema.compact("http://www.w3.org/2001/XMLSchema#integer"),
            "xsd:integer"
        );
        assert_eq!(schema.base(), DEFAULT_BASE);
    }
}
