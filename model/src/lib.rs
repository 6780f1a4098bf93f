//! The Approxsim scenario object tree.
//!
//! Scenario objects form a tree of typed, named nodes validated against the
//! protocol schema held by an `approxsim-schema` registry. This crate
//! provides the tree itself ([`ObjectTree`]) with mutation events and
//! listeners, scoped [`Reference`]s with resolution, the type-directed
//! [`ObjectFactory`], and the streaming XML [importer](import_document) and
//! [exporter](write_document).
//!
//! Everything here is single-threaded and synchronous; confine a tree and
//! the registries it is validated against to one thread at a time.

pub mod error;
pub mod event;
pub mod export;
pub mod factory;
pub mod import;
pub mod object;
pub mod reference;
pub mod value;

pub use error::{
    Diagnostic, DiagnosticList, FactoryError, ImportFailure, ModelError, Severity,
};
pub use event::{Event, EventKind, EventListener, ListenerId};
pub use export::write_document;
pub use factory::{Constructor, ObjectFactory, VectorBuilder};
pub use import::{import_document, ImportOutcome};
pub use object::{ObjectId, ObjectKind, ObjectNode, ObjectTree};
pub use reference::{find_unresolved, Reference};
pub use value::{SimpleValue, SymbolCode, ValueError};
