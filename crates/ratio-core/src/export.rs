//! # Clean Export
//!
//! Serializes a record without its internal bookkeeping:
//! - the root marker
//! - unset placeholders (empty literals)
//! - custom options nothing in the root's tree refers to
//!
//! Output is deterministic: triples are written in term order, grouped by
//! subject in Turtle.

use crate::graph::TripleGraph;
use crate::schema::{SchemaCatalog, literal_bool};
use crate::vocab::{RATIO_IS_CUSTOM, RATIO_IS_ROOT, RDF_TYPE};
use crate::{RatioError, Term, Triple};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::debug;

/// Output syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Turtle,
    NTriples,
}

impl FromStr for ExportFormat {
    type Err = RatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            other => Err(RatioError::SerializationError(format!(
                "unknown export format: {other}"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Turtle => "turtle",
            Self::NTriples => "ntriples",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Merge the schema graph into the output.
    pub include_schema: bool,
}

/// The triples of `graph` that survive cleaning.
#[must_use]
pub fn clean_triples(graph: &TripleGraph, root: Option<&Term>) -> BTreeSet<Triple> {
    let marker = Term::uri(RATIO_IS_ROOT);
    let custom = Term::uri(RATIO_IS_CUSTOM);

    let reachable: BTreeSet<Term> = root
        .map(|r| graph.walk(r, |_| true).into_iter().collect())
        .unwrap_or_default();
    let unused: BTreeSet<Term> = graph
        .rows()
        .into_iter()
        .filter(|row| {
            row.triple.predicate == custom && literal_bool(&row.triple.object) == Some(true)
        })
        .map(|row| row.triple.subject)
        .filter(|s| !reachable.contains(s))
        .collect();

    graph
        .rows()
        .into_iter()
        .map(|row| row.triple)
        .filter(|t| t.predicate != marker)
        .filter(|t| !t.object.is_unset())
        .filter(|t| !unused.contains(&t.subject) && !unused.contains(&t.object))
        .collect()
}

/// Serialize a record graph.
pub fn export_graph(
    schema: &SchemaCatalog,
    graph: &TripleGraph,
    root: Option<&Term>,
    options: &ExportOptions,
) -> Result<String, RatioError> {
    let mut triples = clean_triples(graph, root);
    if options.include_schema {
        triples.extend(schema.graph().rows().into_iter().map(|row| row.triple));
    }
    debug!(triples = triples.len(), format = %options.format, "exporting record");

    match options.format {
        ExportFormat::NTriples => write_ntriples(&triples),
        ExportFormat::Turtle => write_turtle(schema, &triples),
    }
}

fn write_ntriples(triples: &BTreeSet<Triple>) -> Result<String, RatioError> {
    let mut out = String::new();
    for triple in triples {
        writeln!(out, "{triple}").map_err(|e| RatioError::SerializationError(e.to_string()))?;
    }
    Ok(out)
}

fn write_turtle(schema: &SchemaCatalog, triples: &BTreeSet<Triple>) -> Result<String, RatioError> {
    let fmt_err = |e: fmt::Error| RatioError::SerializationError(e.to_string());
    let mut out = String::new();

    for ns in schema.namespaces() {
        writeln!(out, "@prefix {}: <{}> .", ns.prefix, ns.uri).map_err(fmt_err)?;
    }

    let mut subjects: BTreeMap<&Term, BTreeMap<&Term, Vec<&Term>>> = BTreeMap::new();
    for t in triples {
        subjects
            .entry(&t.subject)
            .or_default()
            .entry(&t.predicate)
            .or_default()
            .push(&t.object);
    }

    for (subject, predicates) in subjects {
        writeln!(out).map_err(fmt_err)?;
        write!(out, "{}", turtle_term(schema, subject)).map_err(fmt_err)?;
        let count = predicates.len();
        for (i, (predicate, objects)) in predicates.into_iter().enumerate() {
            let predicate = if predicate.as_uri() == Some(RDF_TYPE) {
                "a".to_string()
            } else {
                turtle_term(schema, predicate)
            };
            let objects: Vec<String> = objects.iter().map(|o| turtle_term(schema, o)).collect();
            let end = if i + 1 == count { " ." } else { " ;" };
            let sep = if i == 0 { " " } else { "    " };
            writeln!(out, "{sep}{predicate} {}{end}", objects.join(", ")).map_err(fmt_err)?;
        }
    }
    Ok(out)
}

/// A prefixed name when the local part is safe to write bare, else the
/// canonical notation.
fn turtle_term(schema: &SchemaCatalog, term: &Term) -> String {
    let Term::Uri(uri) = term else {
        return term.to_n3();
    };
    let compact = schema.compact(uri);
    match compact.split_once(':') {
        Some((_, local)) if compact != *uri && is_plain_local(local) => compact,
        _ => term.to_n3(),
    }
}

fn is_plain_local(local: &str) -> bool {
    !local.is_empty()
        && !local.starts_with(['-', '.'])
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::formats::{RdfFormat, parse_rdf};
    use crate::knowledge::GraphStore;
    use crate::storage::{MemoryTripleStore, TripleStore};
    use crate::testing::{TEMPLATE, ex, schema_store};

    fn seeded() -> (MemoryTripleStore, SchemaCatalog, GraphStore, BTreeMap<String, Term>) {
        let (mut store, schema) = schema_store();
        let id = store.create_record("t").unwrap();
        let mut graph = GraphStore::open(&store, id).unwrap();
        let names = graph
            .execute_instructions(&mut store, &schema, TEMPLATE)
            .unwrap();
        (store, schema, graph, names)
    }

    #[test]
    fn bookkeeping_is_stripped() {
        let (mut store, schema, mut graph, names) = seeded();
        let trial = &names["trial"];
        let arm = &names["arm"];
        graph.new_value(&mut store, &schema, trial, &ex("title")).unwrap();

        let (used, _) = graph.new_option(&mut store, &schema, &ex("Drug"), "Used").unwrap();
        let (unused, _) = graph.new_option(&mut store, &schema, &ex("Drug"), "Unused").unwrap();
        let index = graph.new_value(&mut store, &schema, arm, &ex("drug")).unwrap();
        graph
            .change_value(&mut store, &schema, arm, &ex("drug"), index, used.uri.lexical())
            .unwrap();

        let clean = clean_triples(graph.graph(), graph.root_uri().as_ref());
        assert!(clean.iter().all(|t| t.predicate != Term::uri(RATIO_IS_ROOT)));
        assert!(clean.iter().all(|t| !t.object.is_unset()));
        assert!(clean.iter().any(|t| t.subject == used.uri));
        assert!(clean.iter().all(|t| t.subject != unused.uri));
    }

    #[test]
    fn turtle_output_parses_back() {
        let (_, schema, graph, _) = seeded();
        let options = ExportOptions::default();
        let turtle = graph.export(&schema, &options).unwrap();

        assert!(turtle.contains("@prefix ex: <http://ex.org/schema#> ."));
        let doc = parse_rdf(&turtle, RdfFormat::Turtle).unwrap();
        let clean = clean_triples(graph.graph(), graph.root_uri().as_ref());
        assert_eq!(doc.triples.into_iter().collect::<BTreeSet<_>>(), clean);
    }

    #[test]
    fn ntriples_with_schema() {
        let (_, schema, graph, _) = seeded();
        let options = ExportOptions {
            format: ExportFormat::NTriples,
            include_schema: true,
        };
        let nt = graph.export(&schema, &options).unwrap();
        let doc = parse_rdf(&nt, RdfFormat::NTriples).unwrap();
        assert!(doc.triples.len() > schema.graph().len());
        assert_eq!(nt.lines().count(), doc.triples.len());
    }

    #[test]
    fn local_names() {
        assert!(is_plain_local("Trial_1_2"));
        assert!(!is_plain_local("a/b"));
        assert!(!is_plain_local("end."));
        assert_eq!("nt".parse::<ExportFormat>().unwrap(), ExportFormat::NTriples);
        assert!("json".parse::<ExportFormat>().is_err());
    }
}
