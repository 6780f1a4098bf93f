use std::fmt;

use approxsim_schema::{QName, SchemaError};
use thiserror::Error;

/// Tree mutation failures. These indicate a caller error or a schema/data
/// inconsistency; the tree is left unchanged when one is returned.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("a {actual} cannot occupy the {expected} slot {tag:?}")]
    NotSubstitutable {
        tag: String,
        expected: QName,
        actual: QName,
    },
    #[error("parent already has a child named {0:?}")]
    DuplicateIdentifier(String),
    #[error("no child named {0:?}")]
    NoSuchChild(String),
    #[error("the slot {tag:?} admits at most {max} occupants")]
    SlotFull { tag: String, max: u64 },
    #[error("node is already attached to a parent")]
    AlreadyAttached,
    #[error("node has no parent")]
    NoParent,
    #[error("node does not hold a simple value")]
    NotASimpleValue,
    #[error("value kind does not match the node's value kind")]
    ValueKindMismatch,
    #[error("node cannot hold children")]
    NotAComposite,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Raised by the object factory; `IncompleteConstruction` is the one the
/// importer re-wraps with line/column context and collects.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("no constructor registered for type {0} or any of its ancestors")]
    UnsupportedType(QName),
    #[error("cannot instantiate abstract type {0}")]
    AbstractType(QName),
    #[error("could not build object of type {type_name} from tag {tag:?}: {reason}")]
    IncompleteConstruction {
        type_name: QName,
        tag: String,
        reason: String,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One import finding with position context. Line and column are 1-based.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u64,
    pub column: u64,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line, self.column, self.severity, self.message
        )
    }
}

/// The ordered collection of non-fatal findings gathered during one import.
/// The importer caps it at [`DiagnosticList::MAX_COLLECTED`] entries; the
/// finding that would exceed the cap aborts the parse instead.
#[derive(Debug, Default)]
pub struct DiagnosticList {
    entries: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub const MAX_COLLECTED: usize = 99;

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.len() >= Self::MAX_COLLECTED
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        debug_assert!(!self.is_full());
        self.entries.push(diagnostic);
    }
}

impl fmt::Display for DiagnosticList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

/// Why an import produced no document tree at all. Collected (non-fatal)
/// findings travel inside; fatal XML errors carry only themselves.
#[derive(Debug, Error)]
pub enum ImportFailure {
    #[error("XML error at {line}:{column}: {source}")]
    Fatal {
        line: u64,
        column: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("too many errors ({} collected), import aborted", .0.len())]
    TooManyErrors(DiagnosticList),
    #[error("no document root could be built ({} findings collected)", .0.len())]
    NoRoot(DiagnosticList),
}
