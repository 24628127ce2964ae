//! # Value Validation
//!
//! Checks a raw form input against a field and turns it into the term that
//! gets stored.
//!
//! | field | accepted input |
//! |---|---|
//! | any | empty string (stored as the unset placeholder) |
//! | described object property | any well-formed URI |
//! | other object property | the URI of a current option |
//! | enumerated literal range (`owl:oneOf`, `xsd:boolean`) | a listed value |
//! | `xsd:string`, `rdfs:Literal`, no range | anything |
//! | `xsd:integer`, `xsd:int`, `xsd:long` | an integer |
//! | `xsd:nonNegativeInteger` | an integer `>= 0` |
//! | `xsd:positiveInteger` | an integer `> 0` |
//! | `xsd:float`, `xsd:double`, `xsd:decimal` | a finite number |
//!
//! A rejected input is a value (`ValueCheck::Rejected`) carrying the message
//! shown next to the form input. An unknown datatype is an error.

use crate::materialize::{Field, FieldOptions};
use crate::schema::PropertyKind;
use crate::vocab::{
    RDF_LANG_STRING, RDFS_LITERAL, XSD_DECIMAL, XSD_DOUBLE, XSD_FLOAT, XSD_INT, XSD_INTEGER,
    XSD_LONG, XSD_NON_NEGATIVE_INTEGER, XSD_POSITIVE_INTEGER, XSD_STRING,
};
use crate::{RatioError, Term};

/// Message for inputs outside an enumeration.
pub const CHOOSE_OPTION: &str = "Choose an option from the list.";

/// Outcome of checking one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueCheck {
    /// The term to store.
    Accepted(Term),
    /// The inline error message.
    Rejected(String),
}

impl ValueCheck {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

enum IntegerBound {
    Any,
    NonNegative,
    Positive,
}

/// Check `raw` against `field`. Only the empty string unsets; the input is
/// stored as given.
pub fn check_property_value(field: &Field, raw: &str) -> Result<ValueCheck, RatioError> {
    if raw.is_empty() {
        return Ok(ValueCheck::Accepted(Term::empty()));
    }

    match field.kind {
        PropertyKind::Subheading => Ok(ValueCheck::Rejected(format!(
            "{} does not hold values.",
            field.label
        ))),
        PropertyKind::Object if field.is_described => {
            Term::parse_uri(raw).map(ValueCheck::Accepted)
        }
        PropertyKind::Object => {
            let found = match &field.options {
                Some(FieldOptions::Individuals(options)) => options
                    .iter()
                    .find(|option| option.uri.as_uri() == Some(raw))
                    .map(|option| option.uri.clone()),
                _ => None,
            };
            Ok(found.map_or_else(
                || ValueCheck::Rejected(CHOOSE_OPTION.to_string()),
                ValueCheck::Accepted,
            ))
        }
        PropertyKind::Datatype => check_literal(field, raw),
    }
}

fn check_literal(field: &Field, raw: &str) -> Result<ValueCheck, RatioError> {
    if let Some(FieldOptions::Literals(options)) = &field.options {
        return Ok(options
            .iter()
            .find(|lit| lit.value == raw)
            .map_or_else(
                || ValueCheck::Rejected(CHOOSE_OPTION.to_string()),
                |lit| ValueCheck::Accepted(Term::Literal(lit.clone())),
            ));
    }

    let range = match &field.range_uri {
        None => return Ok(ValueCheck::Accepted(Term::literal(raw))),
        Some(Term::Uri(uri)) => uri.as_str(),
        Some(other) => return Err(RatioError::UnknownDatatype(other.to_n3())),
    };

    match range {
        XSD_STRING | RDFS_LITERAL | RDF_LANG_STRING => Ok(ValueCheck::Accepted(Term::literal(raw))),
        XSD_INTEGER | XSD_INT | XSD_LONG => Ok(check_integer(raw, range, IntegerBound::Any)),
        XSD_NON_NEGATIVE_INTEGER => Ok(check_integer(raw, range, IntegerBound::NonNegative)),
        XSD_POSITIVE_INTEGER => Ok(check_integer(raw, range, IntegerBound::Positive)),
        XSD_FLOAT | XSD_DOUBLE | XSD_DECIMAL => Ok(match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => ValueCheck::Accepted(Term::typed(raw, range)),
            _ => ValueCheck::Rejected(format!("{raw} is not a valid float.")),
        }),
        other => Err(RatioError::UnknownDatatype(other.to_string())),
    }
}

fn check_integer(raw: &str, datatype: &str, bound: IntegerBound) -> ValueCheck {
    let Ok(value) = raw.parse::<i128>() else {
        return ValueCheck::Rejected(format!("{raw} is not a valid integer."));
    };
    match bound {
        IntegerBound::NonNegative if value < 0 => {
            ValueCheck::Rejected(format!("{raw} is not a non-negative integer."))
        }
        IntegerBound::Positive if value <= 0 => {
            ValueCheck::Rejected(format!("{raw} is not a positive integer."))
        }
        _ => ValueCheck::Accepted(Term::typed(value.to_string(), datatype)),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::materialize::FieldOption;
    use crate::{Literal, vocab};
    use std::collections::BTreeMap;

    fn field(kind: PropertyKind, range: Option<&str>) -> Field {
        Field {
            property_uri: Term::uri("http://ex.org/p"),
            label: "p".to_string(),
            comment: None,
            kind,
            is_described: false,
            is_functional: false,
            is_deletable: true,
            allows_custom_options: false,
            show_label: true,
            range_uri: range.map(Term::uri),
            range_label: "range".to_string(),
            order: 1,
            width: 50,
            values: BTreeMap::new(),
            options: None,
        }
    }

    fn accepted(check: ValueCheck) -> Term {
        match check {
            ValueCheck::Accepted(term) => term,
            ValueCheck::Rejected(msg) => panic!("rejected: {msg}"),
        }
    }

    fn rejected(check: ValueCheck) -> String {
        match check {
            ValueCheck::Accepted(term) => panic!("accepted: {term}"),
            ValueCheck::Rejected(msg) => msg,
        }
    }

    #[test]
    fn empty_input_is_always_unset() {
        for kind in [PropertyKind::Object, PropertyKind::Datatype, PropertyKind::Subheading] {
            let f = field(kind, Some(vocab::XSD_INTEGER));
            assert!(accepted(check_property_value(&f, "").expect("check")).is_unset());
        }
    }

    #[test]
    fn whitespace_is_kept() {
        let f = field(PropertyKind::Datatype, Some(vocab::XSD_STRING));
        assert_eq!(
            accepted(check_property_value(&f, "  padded\t").expect("check")),
            Term::literal("  padded\t")
        );
        assert_eq!(
            accepted(check_property_value(&f, "   ").expect("check")),
            Term::literal("   ")
        );

        let f = field(PropertyKind::Datatype, Some(vocab::XSD_INTEGER));
        assert!(!check_property_value(&f, " 4").expect("check").is_accepted());
    }

    #[test]
    fn integers() {
        let f = field(PropertyKind::Datatype, Some(vocab::XSD_INTEGER));
        assert_eq!(
            accepted(check_property_value(&f, "+007").expect("check")),
            Term::typed("7", vocab::XSD_INTEGER)
        );
        assert_eq!(
            rejected(check_property_value(&f, "4.5").expect("check")),
            "4.5 is not a valid integer."
        );

        let f = field(PropertyKind::Datatype, Some(vocab::XSD_POSITIVE_INTEGER));
        assert_eq!(
            rejected(check_property_value(&f, "0").expect("check")),
            "0 is not a positive integer."
        );
        assert!(check_property_value(&f, "12").expect("check").is_accepted());

        let f = field(PropertyKind::Datatype, Some(vocab::XSD_NON_NEGATIVE_INTEGER));
        assert!(check_property_value(&f, "0").expect("check").is_accepted());
        assert_eq!(
            rejected(check_property_value(&f, "-1").expect("check")),
            "-1 is not a non-negative integer."
        );
    }

    #[test]
    fn floats() {
        let f = field(PropertyKind::Datatype, Some(vocab::XSD_FLOAT));
        assert_eq!(
            accepted(check_property_value(&f, "2.5e3").expect("check")),
            Term::typed("2.5e3", vocab::XSD_FLOAT)
        );
        assert_eq!(
            rejected(check_property_value(&f, "abc").expect("check")),
            "abc is not a valid float."
        );
        assert!(!check_property_value(&f, "inf").expect("check").is_accepted());
    }

    #[test]
    fn strings_and_missing_range_accept_anything() {
        let f = field(PropertyKind::Datatype, Some(vocab::XSD_STRING));
        assert_eq!(
            accepted(check_property_value(&f, "free text").expect("check")),
            Term::literal("free text")
        );
        let f = field(PropertyKind::Datatype, None);
        assert!(check_property_value(&f, "x").expect("check").is_accepted());
    }

    #[test]
    fn unknown_datatype_is_an_error() {
        let f = field(PropertyKind::Datatype, Some("http://ex.org/Mystery"));
        assert!(matches!(
            check_property_value(&f, "x"),
            Err(RatioError::UnknownDatatype(_))
        ));
    }

    #[test]
    fn literal_enumeration() {
        let mut f = field(PropertyKind::Datatype, Some("http://ex.org/Color"));
        f.options = Some(FieldOptions::Literals(vec![
            Literal::plain("x"),
            Literal::plain("y"),
        ]));
        assert_eq!(rejected(check_property_value(&f, "z").expect("check")), CHOOSE_OPTION);
        assert_eq!(
            accepted(check_property_value(&f, "x").expect("check")),
            Term::literal("x")
        );
    }

    #[test]
    fn object_options() {
        let mut f = field(PropertyKind::Object, Some("http://ex.org/Drug"));
        f.options = Some(FieldOptions::Individuals(vec![FieldOption {
            uri: Term::uri("http://ex.org/aspirin"),
            label: "Aspirin".to_string(),
            class_uri: Term::uri("http://ex.org/Drug"),
            custom: false,
            comment: None,
        }]));
        assert!(
            check_property_value(&f, "http://ex.org/aspirin")
                .expect("check")
                .is_accepted()
        );
        assert_eq!(
            rejected(check_property_value(&f, "http://ex.org/other").expect("check")),
            CHOOSE_OPTION
        );
    }

    #[test]
    fn described_values_need_a_uri() {
        let mut f = field(PropertyKind::Object, Some("http://ex.org/Arm"));
        f.is_described = true;
        assert!(
            check_property_value(&f, "http://ex.org/arm_1")
                .expect("check")
                .is_accepted()
        );
        assert!(matches!(
            check_property_value(&f, "not a uri"),
            Err(RatioError::MalformedUri(_))
        ));
    }
}
