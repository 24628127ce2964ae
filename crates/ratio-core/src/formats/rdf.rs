//! # RDF Reader
//!
//! Parses Turtle, N-Triples and RDF/XML documents into store triples using
//! sophia. Prefix declarations are collected separately so loading a schema
//! can rebind the namespace table.
//!
//! Literals typed `xsd:string` are read as plain literals (the two are the
//! same value in RDF 1.1), so labels compare equal regardless of the syntax
//! they were written in.

use crate::vocab::XSD_STRING;
use crate::{Namespace, RatioError, Term, Triple};
use sophia::api::prelude::*;
use sophia::api::triple::Triple as _;
use std::fmt;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::str::FromStr;

/// Supported input syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    Turtle,
    NTriples,
    RdfXml,
}

impl RdfFormat {
    /// Guess the syntax from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ttl" | "turtle" => Some(Self::Turtle),
            "nt" => Some(Self::NTriples),
            "owl" | "rdf" | "xml" => Some(Self::RdfXml),
            _ => None,
        }
    }
}

impl FromStr for RdfFormat {
    type Err = RatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            "rdfxml" | "rdf/xml" | "xml" | "owl" => Ok(Self::RdfXml),
            other => Err(RatioError::RdfParse(format!("unknown RDF format: {other}"))),
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Turtle => "turtle",
            Self::NTriples => "ntriples",
            Self::RdfXml => "rdfxml",
        })
    }
}

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdfDocument {
    /// Triples in document order.
    pub triples: Vec<Triple>,
    /// Prefixes declared by the document, in declaration order.
    pub namespaces: Vec<Namespace>,
}

fn read_triple(s: &str, p: &str, o: &str) -> Result<Triple, RatioError> {
    let object = match Term::parse_n3(o)? {
        Term::Literal(mut lit) if lit.datatype.as_deref() == Some(XSD_STRING) => {
            lit.datatype = None;
            Term::Literal(lit)
        }
        other => other,
    };
    Ok(Triple::new(Term::parse_n3(s)?, Term::parse_n3(p)?, object))
}

/// Parse `data` in the given syntax.
pub fn parse_rdf(data: &str, format: RdfFormat) -> Result<RdfDocument, RatioError> {
    let reader = BufReader::new(Cursor::new(data.as_bytes()));
    let mut triples = Vec::new();

    match format {
        RdfFormat::Turtle => {
            let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RatioError> {
                    triples.push(read_triple(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    )?);
                    Ok(())
                })
                .map_err(|e| RatioError::RdfParse(format!("failed to parse Turtle: {e}")))?;
        }
        RdfFormat::NTriples => {
            let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RatioError> {
                    triples.push(read_triple(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    )?);
                    Ok(())
                })
                .map_err(|e| RatioError::RdfParse(format!("failed to parse N-Triples: {e}")))?;
        }
        RdfFormat::RdfXml => {
            let mut parser = sophia::xml::parser::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RatioError> {
                    triples.push(read_triple(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    )?);
                    Ok(())
                })
                .map_err(|e| RatioError::RdfParse(format!("failed to parse RDF/XML: {e}")))?;
        }
    }

    let namespaces = match format {
        RdfFormat::Turtle => turtle_prefixes(data),
        RdfFormat::RdfXml => xml_prefixes(data),
        RdfFormat::NTriples => Vec::new(),
    };

    Ok(RdfDocument {
        triples,
        namespaces,
    })
}

// =============================================================================
// PREFIX SCANNING
// =============================================================================

/// `@prefix p: <uri> .` and SPARQL-style `PREFIX p: <uri>` lines.
fn turtle_prefixes(data: &str) -> Vec<Namespace> {
    let mut out = Vec::new();
    for line in data.lines() {
        let line = line.trim_start();
        let rest = if let Some(rest) = line.strip_prefix("@prefix") {
            rest
        } else if line.len() >= 6 && line[..6].eq_ignore_ascii_case("prefix") {
            &line[6..]
        } else {
            continue;
        };
        let Some((prefix, tail)) = rest.split_once(':') else {
            continue;
        };
        let Some(uri) = tail
            .split_once('<')
            .and_then(|(_, t)| t.split_once('>'))
            .map(|(uri, _)| uri)
        else {
            continue;
        };
        out.push(Namespace::new(prefix.trim(), uri));
    }
    out
}

/// `xmlns:p="uri"` attributes.
fn xml_prefixes(data: &str) -> Vec<Namespace> {
    let mut out = Vec::new();
    let mut rest = data;
    while let Some(pos) = rest.find("xmlns:") {
        rest = &rest[pos + "xmlns:".len()..];
        let Some((prefix, tail)) = rest.split_once('=') else {
            break;
        };
        let tail = tail.trim_start();
        let Some(quote) = tail.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        if let Some((uri, _)) = tail[1..].split_once(quote) {
            let prefix = prefix.trim();
            if !prefix.is_empty() && !prefix.contains(char::is_whitespace) {
                out.push(Namespace::new(prefix, uri));
            }
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
