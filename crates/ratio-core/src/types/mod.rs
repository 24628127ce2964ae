//! # Core Type Definitions
//!
//! This module contains the identifiers and error types shared by every layer
//! of the Ratio store:
//! - Record and scope identifiers (`RecordId`, `Scope`)
//! - Namespace bindings (`Namespace`)
//! - Validation outcomes (`Validity`)
//! - Error types (`RatioError`)
//!
//! ## Error Model
//!
//! - Validation failures are values (`Validity::Invalid`), shown inline by callers
//! - Lookup, parse and storage failures are `RatioError` and propagate with `?`
//! - Structural schema problems are logged, never returned

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of one record (one editable instance of the schema).
///
/// Record ids are handed out by the store starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The graph a triple belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// The ontology: classes, properties and schema-defined individuals.
    Schema,
    /// The knowledge triples of one record.
    Record(RecordId),
}

impl Scope {
    /// Key used by persistent backends. The schema graph owns key 0.
    #[must_use]
    pub const fn key(self) -> u64 {
        match self {
            Self::Schema => 0,
            Self::Record(RecordId(id)) => id,
        }
    }
}

/// A `(prefix, uri)` binding used for compact names and serialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

impl Namespace {
    #[must_use]
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// Catalog entry for a record.
///
/// A deleted record keeps its triples and its entry; it is only hidden from
/// listings and refused when opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub name: String,
    pub finished: bool,
    pub deleted: bool,
}

impl RecordInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            finished: false,
            deleted: false,
        }
    }
}

// =============================================================================
// VALIDATION OUTCOME
// =============================================================================

/// Result of a value change that passed lookup.
///
/// `Invalid` carries the message a form shows next to the input; the stored
/// state is unchanged in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The inline error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Ratio store.
///
/// - No silent failures
/// - Use `Result<T, RatioError>` for fallible operations
/// - The store never panics; bad user input is reported through `Validity`
#[derive(Debug, Error)]
pub enum RatioError {
    /// No entity with this URI exists in the record.
    #[error("No entity with URI {0} found")]
    EntityNotFound(String),

    /// The class is not declared in the schema.
    #[error("No class with URI {0} found")]
    ClassNotFound(String),

    /// The entity's class has no such property.
    #[error("No field with URI {property} found on entity {entity}")]
    FieldNotFound { entity: String, property: String },

    /// The property is not declared in the schema.
    #[error("Unknown property: {0}")]
    PropertyNotFound(String),

    /// There is no value at the given index.
    #[error("No value with index {index} for {property} on {entity}")]
    ValueNotFound {
        entity: String,
        property: String,
        index: u64,
    },

    /// The record does not exist.
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    /// The individual has no type that is a class declared in the schema.
    #[error("No type found for individual {0}")]
    UntypedIndividual(String),

    /// The range of a property is a datatype the validator does not know.
    #[error("Unknown Datatype: {0}")]
    UnknownDatatype(String),

    /// A stored term is not in canonical notation.
    #[error("{0} cannot be parsed")]
    TermParse(String),

    /// A user supplied URI is malformed.
    #[error("Malformed URI: {0}")]
    MalformedUri(String),

    /// RDF input could not be parsed.
    #[error("RDF parse error: {0}")]
    RdfParse(String),

    /// A template script line could not be interpreted.
    #[error("Instruction error on line {line} ({text}): {message}")]
    Instruction {
        line: usize,
        text: String,
        message: String,
    },

    /// A caller-side check refused the operation.
    #[error("{0}")]
    NotAllowed(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage engine error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl RatioError {
    /// Whether this error reports a missing entity, field, value or record.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound(_)
                | Self::ClassNotFound(_)
                | Self::FieldNotFound { .. }
                | Self::PropertyNotFound(_)
                | Self::ValueNotFound { .. }
                | Self::RecordNotFound(_)
                | Self::UntypedIndividual(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_scope_owns_key_zero() {
        assert_eq!(Scope::Schema.key(), 0);
        assert_eq!(Scope::Record(RecordId(7)).key(), 7);
    }

    #[test]
    fn validity_message() {
        assert!(Validity::Valid.is_valid());
        assert_eq!(Validity::Valid.message(), None);

        let invalid = Validity::Invalid("Choose an option from the list.".to_string());
        assert!(!invalid.is_valid());
        assert_eq!(invalid.message(), Some("Choose an option from the list."));
    }

    #[test]
    fn lookup_classification() {
        assert!(RatioError::EntityNotFound("x".into()).is_lookup());
        assert!(RatioError::RecordNotFound(RecordId(3)).is_lookup());
        assert!(!RatioError::TermParse("x".into()).is_lookup());
        assert!(!RatioError::UnknownDatatype("x".into()).is_lookup());
    }

    #[test]
    fn term_parse_message_names_fragment() {
        let err = RatioError::TermParse("<broken".to_string());
        assert_eq!(err.to_string(), "<broken cannot be parsed");
    }
}
