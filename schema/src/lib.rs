//! Type model and registry for the Approxsim simulation protocol schema.
//!
//! The schema describes a tree of typed, named scenario objects. This crate
//! holds the declarative side of that: [`TypeDefinition`]s with base-type
//! derivation and ordered sub-element [`Declaration`]s, a process-lifetime
//! [`TypeRegistry`] keyed by qualified name, the built-in primitive types,
//! and a [reader](read_schema) that constructs the registry from the
//! protocol's XSD document. The object tree itself lives in the companion
//! `approxsim-model` crate.

pub mod builtins;
pub mod declaration;
pub mod error;
pub mod reader;
pub mod registry;
pub mod type_def;
pub mod xstypes;

pub use declaration::{Declaration, MaxOccurs};
pub use error::SchemaError;
pub use reader::{read_schema, SchemaWarning};
pub use registry::{ConstructionTypeTable, TypeRegistry};
pub use type_def::{Ancestors, TypeDefinition, TypeRef};
pub use xstypes::QName;
