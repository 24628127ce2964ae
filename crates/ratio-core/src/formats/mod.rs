//! # Formats
//!
//! RDF syntaxes the store reads (schema and seed data) and writes (export).

pub mod rdf;

pub use rdf::{RdfFormat, RdfDocument, parse_rdf};
