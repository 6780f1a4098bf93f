use thiserror::Error;

use crate::xstypes::QName;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to resolve prefix {0:?} to a namespace URI")]
    PrefixNotResolved(String),
    #[error("unknown type {0}")]
    UnknownType(QName),
    #[error("type {type_name} declares no sub-element {tag:?}")]
    UnknownSubElement { type_name: QName, tag: String },
    #[error("duplicate definition of type {0}")]
    DuplicateType(QName),
    #[error("<{element}> is missing the required attribute {attribute:?}")]
    MissingAttribute { element: String, attribute: String },
    #[error("<{element}> is missing its <{child}> content")]
    MissingContent { element: String, child: String },
    #[error("the document root is not a schema element")]
    NotASchema,
    #[error("invalid occurrence bound {0:?}")]
    InvalidOccurs(String),
    #[error("type table left unfinished by the schema reader")]
    UnfinishedTypeTable,
}
