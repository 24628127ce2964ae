//! # Vocabulary
//!
//! IRIs the store interprets, and the defaults applied when the schema is
//! silent about a property attribute.
//!
//! Only these terms carry meaning for the catalog. Everything else in the
//! schema graph is stored and exported untouched.

// =============================================================================
// W3C NAMESPACES
// =============================================================================

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_LITERAL: &str = "http://www.w3.org/2000/01/rdf-schema#Literal";

pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
pub const OWL_FUNCTIONAL_PROPERTY: &str = "http://www.w3.org/2002/07/owl#FunctionalProperty";
pub const OWL_NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
pub const OWL_ONE_OF: &str = "http://www.w3.org/2002/07/owl#oneOf";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const XSD_LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const XSD_NON_NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonNegativeInteger";
pub const XSD_POSITIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#positiveInteger";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

// =============================================================================
// APPLICATION NAMESPACE
// =============================================================================

pub const RATIO: &str = "http://www.example.org/ratio-tool#";

/// Object property whose values are owned, nested entities.
pub const RATIO_DESCRIBED: &str = "http://www.example.org/ratio-tool#described";
/// `false` forbids adding/removing entities through this property.
pub const RATIO_DELETABLE: &str = "http://www.example.org/ratio-tool#deletable";
pub const RATIO_ORDER: &str = "http://www.example.org/ratio-tool#order";
pub const RATIO_WIDTH: &str = "http://www.example.org/ratio-tool#width";
pub const RATIO_SHOW_LABEL: &str = "http://www.example.org/ratio-tool#show_label";
pub const RATIO_CUSTOM_OPTION_ALLOWED: &str =
    "http://www.example.org/ratio-tool#addCustomOptionAllowed";
/// Type marker for properties rendered as section headings without values.
pub const RATIO_SUBHEADING: &str = "http://www.example.org/ratio-tool#Subheading";
pub const RATIO_CONFIGURATION: &str = "http://www.example.org/ratio-tool#Configuration";
pub const RATIO_HAS_BASE: &str = "http://www.example.org/ratio-tool#hasBase";
pub const RATIO_CREATOR: &str = "http://www.example.org/ratio-tool#creator";
pub const RATIO_IS_CUSTOM: &str = "http://www.example.org/ratio-tool#isCustom";
/// Marks the designated root individual of a record.
pub const RATIO_IS_ROOT: &str = "http://www.example.org/ratio-tool#isRoot";

// =============================================================================
// DEFAULTS
// =============================================================================

/// Display order of a property without `ratio:order`.
pub const DEFAULT_ORDER: i64 = 0;

/// Display width (percent) of a property without `ratio:width`.
pub const DEFAULT_WIDTH: i64 = 50;

/// Base for minted URIs when the schema has no `ratio:hasBase`.
pub const DEFAULT_BASE: &str = RATIO;

/// Well-known prefixes bound when the loaded data declares none for them.
pub const STANDARD_PREFIXES: [(&str, &str); 5] = [
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("owl", OWL),
    ("xsd", XSD),
    ("ratio", RATIO),
];
