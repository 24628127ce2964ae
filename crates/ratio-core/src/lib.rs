//! # ratio-core
//!
//! The ontology-driven knowledge graph store behind Ratio.
//!
//! Facts about a record (for example a clinical trial) are kept as triples
//! instead of fixed columns. The shape of every form, the options of every
//! field and the rules for every value are read from a loaded schema.
//!
//! ## Layers
//!
//! Leaves first:
//! - `storage`: scoped triple persistence (in-memory or redb), atomic batches
//! - `schema`: `SchemaCatalog` over the schema graph, URI minting
//! - `knowledge`: `GraphStore` for one record, soft delete and undo, seeding
//! - `materialize`: read-only Entity/Field/Option trees and validation
//! - `instructions`: the template script interpreter
//!
//! `Session` wires them together for one unit of work.
//!
//! ## Constraints
//!
//! - Synchronous and in-process; no network
//! - Deterministic iteration (`BTreeMap`/`BTreeSet` only)
//! - No authorization checks; callers gate mutating calls

// =============================================================================
// MODULES
// =============================================================================

pub mod export;
pub mod formats;
pub mod graph;
pub mod instructions;
pub mod knowledge;
pub mod materialize;
pub mod schema;
pub mod session;
pub mod storage;
pub mod term;
pub mod types;
pub mod validate;
pub mod vocab;

#[cfg(test)]
mod testing;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use term::{Literal, Term, Triple};
pub use types::{Namespace, RatioError, RecordId, RecordInfo, Scope, Validity};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use export::{ExportFormat, ExportOptions};
pub use formats::{RdfDocument, RdfFormat, parse_rdf};
pub use graph::TripleGraph;
pub use instructions::InstructionInterpreter;
pub use knowledge::GraphStore;
pub use materialize::{Entity, Field, FieldOption, FieldOptions, FieldValue};
pub use schema::{PropertyKind, SchemaCatalog};
pub use session::{RecordHandle, Session};
pub use storage::{
    BatchOutcome, MemoryTripleStore, RedbTripleStore, StorageBackend, StoredTriple, TripleStore,
    WriteBatch, WriteOp,
};
pub use validate::{CHOOSE_OPTION, ValueCheck, check_property_value};
