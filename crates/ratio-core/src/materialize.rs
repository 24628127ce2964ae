//! # Materializer
//!
//! Read-only Entity/Field/Option trees built from the schema catalog and one
//! record's triples. Trees are rendered by callers and back value
//! validation; they are never written back.
//!
//! Following only described edges from a record's root yields a tree, which
//! bounds materialization by the size of that subtree. A repeated node
//! (a broken record) is logged and skipped instead of recursed into.

use crate::graph::TripleGraph;
use crate::schema::{PropertyKind, SchemaCatalog, literal_bool};
use crate::validate::{ValueCheck, check_property_value};
use crate::vocab::{RATIO_CREATOR, RATIO_IS_CUSTOM, RDFS_COMMENT, RDFS_LABEL, XSD_BOOLEAN};
use crate::{Literal, RatioError, Term};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

// =============================================================================
// OPTION
// =============================================================================

/// A referenceable individual selectable in a non-described object field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub uri: Term,
    pub label: String,
    pub class_uri: Term,
    /// Created by a user rather than shipped with the schema.
    pub custom: bool,
    pub comment: Option<String>,
}

impl FieldOption {
    /// Build the option for `uri`, looking in the record graph first.
    pub fn from_knowledge(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        uri: &Term,
    ) -> Result<Self, RatioError> {
        let class_uri = schema
            .class_of(graph, uri)
            .or_else(|| schema.class_of(schema.graph(), uri))
            .ok_or_else(|| RatioError::UntypedIndividual(uri.lexical().to_string()))?;

        let label_pred = Term::uri(RDFS_LABEL);
        let label = graph
            .object(uri, &label_pred)
            .map(|l| l.lexical().to_string())
            .unwrap_or_else(|| schema.label(uri));

        let custom = graph
            .object(uri, &Term::uri(RATIO_IS_CUSTOM))
            .and_then(literal_bool)
            .unwrap_or(false)
            || schema.graph().object(uri, &Term::uri(RATIO_CREATOR)).is_some();

        let comment = graph
            .object(uri, &Term::uri(RDFS_COMMENT))
            .map(|c| c.lexical().to_string())
            .or_else(|| schema.comment(uri));

        Ok(Self {
            uri: uri.clone(),
            label,
            class_uri,
            custom,
            comment,
        })
    }
}

// =============================================================================
// FIELD
// =============================================================================

/// The selectable values of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum FieldOptions {
    /// Individuals of the range class, sorted by label.
    Individuals(Vec<FieldOption>),
    /// Members of an enumerated literal range.
    Literals(Vec<Literal>),
}

/// One value slot of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// The empty placeholder.
    Unset,
    Literal(Literal),
    Option(FieldOption),
    Entity(Box<Entity>),
}

/// One property of an entity with its values in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub property_uri: Term,
    pub label: String,
    pub comment: Option<String>,
    pub kind: PropertyKind,
    pub is_described: bool,
    pub is_functional: bool,
    pub is_deletable: bool,
    pub allows_custom_options: bool,
    pub show_label: bool,
    pub range_uri: Option<Term>,
    pub range_label: String,
    pub order: i64,
    pub width: i64,
    pub values: BTreeMap<u64, FieldValue>,
    pub options: Option<FieldOptions>,
}

impl Field {
    /// An empty field of `property` (no values yet).
    ///
    /// `graph` is the record graph; its custom individuals count as options.
    #[must_use]
    pub fn new(schema: &SchemaCatalog, graph: &TripleGraph, property: &Term) -> Self {
        let kind = schema
            .property_kind(property)
            .unwrap_or(PropertyKind::Datatype);
        let ranges = schema.ranges(property);
        if ranges.len() > 1 {
            warn!(
                property = %property,
                ranges = ranges.len(),
                "property has several ranges, using the first"
            );
        }
        let range_uri = ranges.first().map(|r| (*r).clone());
        let range_label = match &range_uri {
            Some(range @ Term::Uri(_)) => schema.label(range),
            _ => "Literal".to_string(),
        };
        let is_described = kind == PropertyKind::Object && schema.is_described(property);

        let options = match (&kind, &range_uri) {
            (PropertyKind::Object, Some(range)) if !is_described => {
                Some(FieldOptions::Individuals(individual_options(schema, graph, range)))
            }
            (PropertyKind::Datatype, Some(range)) => literal_options(schema, range),
            _ => None,
        };

        Self {
            property_uri: property.clone(),
            label: schema.label(property),
            comment: schema.comment(property),
            kind,
            is_described,
            is_functional: schema.is_functional(property),
            is_deletable: schema.is_deletable(property),
            allows_custom_options: schema.allows_custom_options(property),
            show_label: schema.show_label(property),
            range_uri,
            range_label,
            order: schema.order(property),
            width: schema.width(property),
            values: BTreeMap::new(),
            options,
        }
    }

    /// The field of `property` on `individual` with its current values.
    pub fn from_knowledge(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        individual: &Term,
        property: &Term,
    ) -> Result<Self, RatioError> {
        let mut visited = BTreeSet::from([individual.clone()]);
        Self::build(schema, graph, individual, property, &mut visited)
    }

    fn build(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        individual: &Term,
        property: &Term,
        visited: &mut BTreeSet<Term>,
    ) -> Result<Self, RatioError> {
        let mut field = Self::new(schema, graph, property);
        if field.kind == PropertyKind::Subheading {
            return Ok(field);
        }

        let Some(values) = graph.values(individual, property) else {
            return Ok(field);
        };

        for (index, term) in values {
            let value = if term.is_unset() {
                FieldValue::Unset
            } else if field.is_described {
                if !visited.insert(term.clone()) {
                    warn!(
                        entity = %individual,
                        property = %property,
                        value = %term,
                        "described value already materialized, skipping"
                    );
                    continue;
                }
                FieldValue::Entity(Box::new(Entity::build(
                    schema,
                    graph,
                    term,
                    field.is_deletable,
                    visited,
                )?))
            } else {
                match term {
                    Term::Literal(lit) => FieldValue::Literal(lit.clone()),
                    other if field.kind == PropertyKind::Object => {
                        FieldValue::Option(FieldOption::from_knowledge(schema, graph, other)?)
                    }
                    other => FieldValue::Literal(Literal::plain(other.lexical())),
                }
            };
            field.values.insert(*index, value);
        }

        Ok(field)
    }

    /// Values in ascending index order.
    #[must_use]
    pub fn sorted_values(&self) -> Vec<(u64, &FieldValue)> {
        self.values.iter().map(|(i, v)| (*i, v)).collect()
    }

    /// Whether the field holds at least one value slot.
    #[must_use]
    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }

    /// Validate a raw input for this field.
    pub fn check_value(&self, raw: &str) -> Result<ValueCheck, RatioError> {
        check_property_value(self, raw)
    }
}

fn individual_options(
    schema: &SchemaCatalog,
    graph: &TripleGraph,
    range: &Term,
) -> Vec<FieldOption> {
    let mut tokens = schema.tokens(range);
    tokens.extend(schema.tokens_in(graph, range));

    let mut options: Vec<FieldOption> = tokens
        .iter()
        .filter_map(|uri| match FieldOption::from_knowledge(schema, graph, uri) {
            Ok(option) => Some(option),
            Err(e) => {
                warn!(uri = %uri, error = %e, "skipping option");
                None
            }
        })
        .collect();
    options.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.uri.cmp(&b.uri)));
    options
}

fn literal_options(schema: &SchemaCatalog, range: &Term) -> Option<FieldOptions> {
    if let Some(members) = schema.one_of(range) {
        let literals = members
            .into_iter()
            .filter_map(|m| match m {
                Term::Literal(lit) => Some(lit),
                _ => None,
            })
            .collect();
        return Some(FieldOptions::Literals(literals));
    }
    if range.as_uri() == Some(XSD_BOOLEAN) {
        return Some(FieldOptions::Literals(vec![
            Literal::typed("true", XSD_BOOLEAN),
            Literal::typed("false", XSD_BOOLEAN),
        ]));
    }
    None
}

// =============================================================================
// ENTITY
// =============================================================================

/// A materialized individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub uri: Term,
    pub label: String,
    pub comment: Option<String>,
    pub class_uri: Term,
    pub class_label: String,
    /// Fields in display order.
    pub fields: Vec<Field>,
    /// Whether the entity may be deleted or relabelled.
    pub deletable: bool,
}

impl Entity {
    /// A skeleton for an individual of `class` without values.
    #[must_use]
    pub fn new(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        class: &Term,
        uri: &Term,
        label: &str,
    ) -> Self {
        let fields: Vec<Field> = schema
            .child_properties(class)
            .iter()
            .map(|p| Field::new(schema, graph, p))
            .collect();
        check_order(uri, &fields);

        Self {
            uri: uri.clone(),
            label: label.to_string(),
            comment: schema.comment(class),
            class_uri: class.clone(),
            class_label: schema.label(class),
            fields,
            deletable: true,
        }
    }

    /// Materialize `uri` and its described subtree.
    pub fn from_knowledge(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        uri: &Term,
    ) -> Result<Self, RatioError> {
        let mut visited = BTreeSet::from([uri.clone()]);
        Self::build(schema, graph, uri, true, &mut visited)
    }

    fn build(
        schema: &SchemaCatalog,
        graph: &TripleGraph,
        uri: &Term,
        deletable: bool,
        visited: &mut BTreeSet<Term>,
    ) -> Result<Self, RatioError> {
        let class_uri = schema
            .class_of(graph, uri)
            .ok_or_else(|| RatioError::UntypedIndividual(uri.lexical().to_string()))?;

        let label = graph
            .object(uri, &Term::uri(RDFS_LABEL))
            .map(|l| l.lexical().to_string())
            .unwrap_or_else(|| schema.label(uri));

        let mut fields = Vec::new();
        for property in schema.child_properties(&class_uri) {
            fields.push(Field::build(schema, graph, uri, &property, visited)?);
        }
        check_order(uri, &fields);

        Ok(Self {
            uri: uri.clone(),
            label,
            comment: schema.comment(&class_uri),
            class_label: schema.label(&class_uri),
            class_uri,
            fields,
            deletable,
        })
    }

    #[must_use]
    pub fn field(&self, property: &Term) -> Option<&Field> {
        self.fields.iter().find(|f| f.property_uri == *property)
    }

    /// Find `uri` in this entity's described subtree.
    #[must_use]
    pub fn find(&self, uri: &Term) -> Option<&Entity> {
        let mut stack = vec![self];
        while let Some(entity) = stack.pop() {
            if entity.uri == *uri {
                return Some(entity);
            }
            for field in &entity.fields {
                for value in field.values.values() {
                    if let FieldValue::Entity(child) = value {
                        stack.push(child);
                    }
                }
            }
        }
        None
    }

    /// The entity and every described descendant, depth first.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Entity> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(entity) = stack.pop() {
            out.push(entity);
            for field in entity.fields.iter().rev() {
                for value in field.values.values().rev() {
                    if let FieldValue::Entity(child) = value {
                        stack.push(child);
                    }
                }
            }
        }
        out
    }
}

/// Log a field order that is not exactly `1..=n`.
fn check_order(uri: &Term, fields: &[Field]) {
    let dense = fields
        .iter()
        .zip(1_i64..)
        .all(|(field, expected)| field.order == expected);
    if !dense {
        let orders: Vec<(i64, &str)> = fields.iter().map(|f| (f.order, f.label.as_str())).collect();
        warn!(entity = %uri, ?orders, "field order is not dense");
    }
}

// =============================================================================
// TESTS
// =============================================================================
