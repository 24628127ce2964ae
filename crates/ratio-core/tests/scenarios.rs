//! # Record Scenarios
//!
//! End-to-end behaviour of one record through the `Session` API:
//! - A: enumerated literal fields reject values outside the list
//! - B: recursive delete follows described edges only and undo restores it
//! - C: back-to-back individuals mint distinct URIs
//! - template seeding and clean export

use ratio_core::{
    CHOOSE_OPTION, ExportFormat, ExportOptions, FieldOptions, FieldValue, RatioError, RdfFormat,
    RecordId, Session, Term, Validity,
};
use std::collections::BTreeSet;

const SCHEMA: &str = include_str!("fixtures/trial.ttl");
const TEMPLATE: &str = include_str!("fixtures/trial.template");

fn ex(local: &str) -> Term {
    Term::uri(format!("http://ex.org/schema#{local}"))
}

fn session() -> Session {
    let mut session = Session::in_memory().expect("session");
    session
        .load_schema(SCHEMA, RdfFormat::Turtle)
        .expect("schema");
    session
}

/// A seeded record; returns its id, root and arm.
fn seeded(session: &mut Session) -> (RecordId, Term, Term) {
    let id = session
        .create_record("trial", Some(TEMPLATE))
        .expect("record");
    let record = session.record(id).expect("open");
    let root = record.root_uri().expect("root");
    let arm = record.sorted_values(&root, &ex("hasArm"))[0].1.clone();
    (id, root, arm)
}

// =============================================================================
// SCENARIO A: ENUMERATED LITERALS
// =============================================================================

mod scenario_a {
    use super::*;

    #[test]
    fn value_outside_enumeration_is_rejected() {
        let mut session = session();
        let id = session.create_record("a", None).expect("record");
        let mut record = session.record(id).expect("open");

        let (foo, _) = record
            .new_individual(&ex("Arm"), "Foo", None)
            .expect("individual");
        let index = record.new_value(&foo.uri, &ex("color")).expect("value");

        let field = record.field(&foo.uri, &ex("color")).expect("field");
        assert!(matches!(field.options, Some(FieldOptions::Literals(ref l)) if l.len() == 2));

        let rejected = record
            .change_value(&foo.uri, &ex("color"), index, "z")
            .expect("change");
        assert_eq!(rejected, Validity::Invalid(CHOOSE_OPTION.to_string()));
        assert!(record.sorted_values(&foo.uri, &ex("color"))[0].1.is_unset());

        let accepted = record
            .change_value(&foo.uri, &ex("color"), index, "x")
            .expect("change");
        assert!(accepted.is_valid());
        assert_eq!(
            record.sorted_values(&foo.uri, &ex("color")),
            vec![(index, Term::literal("x"))]
        );
    }

    #[test]
    fn empty_input_resets_to_unset() {
        let mut session = session();
        let (id, root, _) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        let index = record.new_value(&root, &ex("title")).expect("value");
        record
            .change_value(&root, &ex("title"), index, "Study")
            .expect("change");
        record
            .change_value(&root, &ex("title"), index, "")
            .expect("change");

        let field = record.field(&root, &ex("title")).expect("field");
        assert_eq!(field.values.get(&index), Some(&FieldValue::Unset));
    }
}

// =============================================================================
// SCENARIO B: DELETE AND UNDO
// =============================================================================

mod scenario_b {
    use super::*;

    #[test]
    fn delete_spares_plain_references_and_undo_restores() {
        let mut session = session();
        let (id, root, arm) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        let (child, _) = record
            .new_individual(&ex("Group"), "C", Some((&arm, &ex("hasGroup"))))
            .expect("child");
        let (reference, _) = record
            .new_option(&ex("Drug"), "R")
            .expect("option");
        let index = record.new_value(&arm, &ex("drug")).expect("value");
        record
            .change_value(&arm, &ex("drug"), index, reference.uri.lexical())
            .expect("change");

        let before = record.graph().graph().rows();
        let reference_rows: Vec<_> = before
            .iter()
            .filter(|r| r.triple.subject == reference.uri)
            .cloned()
            .collect();

        let deleted = record.delete_individual_recursive(&arm).expect("delete");
        assert_eq!(deleted, BTreeSet::from([arm.clone(), child.uri.clone()]));

        let live = record.graph().graph();
        assert!(!live.has_subject(&child.uri));
        assert!(!live.is_referenced(&child.uri));
        let remaining: Vec<_> = live
            .rows()
            .into_iter()
            .filter(|r| r.triple.subject == reference.uri)
            .collect();
        assert_eq!(remaining, reference_rows);
        assert!(record.root().expect("root").find(&arm).is_none());

        record.undo_delete_individual(&arm).expect("undo");
        assert_eq!(record.graph().graph().rows(), before);
        assert!(record.root().expect("root").find(&child.uri).is_some());
        assert_eq!(record.sorted_values(&root, &ex("hasArm")).len(), 1);
    }

    #[test]
    fn undo_twice_is_a_no_op() {
        let mut session = session();
        let (id, _, arm) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        record.delete_individual_recursive(&arm).expect("delete");
        assert!(record.undo_delete_individual(&arm).expect("undo") > 0);
        let after = record.graph().graph().rows();
        assert_eq!(record.undo_delete_individual(&arm).expect("undo"), 0);
        assert_eq!(record.graph().graph().rows(), after);
    }

    #[test]
    fn deleted_index_is_not_reused() {
        let mut session = session();
        let (id, root, arm) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        record.delete_individual_recursive(&arm).expect("delete");
        let (second, _) = record
            .new_individual(&ex("Arm"), "B", Some((&root, &ex("hasArm"))))
            .expect("arm");

        let values = record.sorted_values(&root, &ex("hasArm"));
        assert_eq!(values, vec![(1, second.uri)]);
    }

    #[test]
    fn unknown_entity_is_a_lookup_error() {
        let mut session = session();
        let (id, _, _) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        let err = record
            .delete_individual_recursive(&Term::uri("http://ex.org/data#nobody"))
            .expect_err("unknown");
        assert!(matches!(err, RatioError::EntityNotFound(_)));
    }
}

// =============================================================================
// SCENARIO C: MINTING
// =============================================================================

mod scenario_c {
    use super::*;

    #[test]
    fn back_to_back_individuals_are_distinct() {
        let mut session = session();
        let (id, _, _) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        let (first, _) = record
            .new_individual(&ex("Arm"), "One", None)
            .expect("first");
        let (second, _) = record
            .new_individual(&ex("Arm"), "Two", None)
            .expect("second");
        assert_ne!(first.uri, second.uri);
    }

    #[test]
    fn uris_are_unique_across_records() {
        let mut session = session();
        let (first, _, arm_one) = seeded(&mut session);
        let (second, _, arm_two) = seeded(&mut session);

        assert_ne!(first, second);
        assert_ne!(arm_one, arm_two);
        assert!(arm_one.lexical().starts_with("http://ex.org/data#Arm_1_"));
        assert!(arm_two.lexical().starts_with("http://ex.org/data#Arm_2_"));
    }
}

// =============================================================================
// SEEDING AND EXPORT
// =============================================================================

mod seeding {
    use super::*;

    #[test]
    fn template_builds_the_tree() {
        let mut session = session();
        let (id, _, arm) = seeded(&mut session);
        let mut record = session.record(id).expect("open");

        let root = record.root().expect("root");
        assert_eq!(root.label, format!("Trial {id}"));
        assert!(!root.deletable);
        assert_eq!(root.find(&arm).expect("arm").label, "Arm A");
        assert!(record.is_individual_deletable(&arm));
    }

    #[test]
    fn load_data_then_export_round_trips() {
        let mut session = session();
        let (id, _, _) = seeded(&mut session);
        let exported = session
            .record(id)
            .expect("open")
            .export(&ExportOptions::default())
            .expect("export");

        let copy = session.create_record("copy", None).expect("record");
        let mut record = session.record(copy).expect("open");
        record.load_data(&exported, RdfFormat::Turtle).expect("load");
        let again = record
            .export(&ExportOptions {
                format: ExportFormat::Turtle,
                include_schema: false,
            })
            .expect("export");
        assert_eq!(again, exported);
    }
}
