use lazy_static::lazy_static;

use crate::declaration::{Declaration, MaxOccurs};
use crate::error::SchemaError;
use crate::registry::ConstructionTypeTable;
use crate::type_def::TypeDefinition;
use crate::xstypes::QName;

/// Namespace of the simulation protocol schema.
pub const APPROXSIM_NAMESPACE: &str = "http://pdc.kth.se/stratmasNamespace";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

lazy_static! {
    /// The universal base type; every registered type derives from it.
    pub static ref VALUE_TYPE_NAME: QName = protocol_name("ValueType");
    pub static ref DOUBLE_NAME: QName = protocol_name("Double");
    pub static ref NON_NEGATIVE_DOUBLE_NAME: QName = protocol_name("NonNegativeDouble");
    pub static ref STRING_NAME: QName = protocol_name("String");
    pub static ref IDENTIFIER_NAME: QName = protocol_name("Identifier");
    pub static ref BOOLEAN_NAME: QName = protocol_name("Boolean");
    pub static ref TIMESTAMP_NAME: QName = protocol_name("Timestamp");
    pub static ref DURATION_NAME: QName = protocol_name("Duration");
    pub static ref POINT_NAME: QName = protocol_name("Point");
    pub static ref REFERENCE_NAME: QName = protocol_name("Reference");
    pub static ref SYMBOL_ID_CODE_NAME: QName = protocol_name("SymbolIDCode");
    /// Canonical wrapper type of every imported document.
    pub static ref ROOT_NAME: QName = protocol_name("Root");
}

fn protocol_name(local: &str) -> QName {
    QName::with_namespace(APPROXSIM_NAMESPACE, local)
}

pub fn is_builtin_name(name: &QName) -> bool {
    [
        &*VALUE_TYPE_NAME,
        &*DOUBLE_NAME,
        &*NON_NEGATIVE_DOUBLE_NAME,
        &*STRING_NAME,
        &*IDENTIFIER_NAME,
        &*BOOLEAN_NAME,
        &*TIMESTAMP_NAME,
        &*DURATION_NAME,
        &*POINT_NAME,
        &*REFERENCE_NAME,
        &*SYMBOL_ID_CODE_NAME,
        &*ROOT_NAME,
    ]
    .into_iter()
    .any(|n| n == name)
}

/// Registers the built-in types the object model special-cases. Called by
/// the schema reader before any schema-defined type is mapped.
pub fn register_builtins(table: &mut ConstructionTypeTable) -> Result<(), SchemaError> {
    let value_type = table.create(TypeDefinition {
        name: VALUE_TYPE_NAME.clone(),
        base: None,
        abstract_: true,
        declarations: vec![],
    })?;

    let leaf = |name: &QName, base| TypeDefinition {
        name: name.clone(),
        base: Some(base),
        abstract_: false,
        declarations: vec![],
    };

    let double = table.create(leaf(&DOUBLE_NAME, value_type))?;
    table.create(leaf(&NON_NEGATIVE_DOUBLE_NAME, double))?;
    let string = table.create(leaf(&STRING_NAME, value_type))?;
    table.create(leaf(&IDENTIFIER_NAME, string))?;
    table.create(leaf(&BOOLEAN_NAME, value_type))?;
    table.create(leaf(&TIMESTAMP_NAME, value_type))?;
    table.create(leaf(&DURATION_NAME, value_type))?;
    table.create(leaf(&REFERENCE_NAME, value_type))?;

    // A symbol code element carries its 15-character code in a nested
    // <value>; absent means "unset" (all fillers).
    table.create(TypeDefinition {
        name: SYMBOL_ID_CODE_NAME.clone(),
        base: Some(value_type),
        abstract_: false,
        declarations: vec![Declaration::new("value", string).with_occurs(0, MaxOccurs::Count(1))],
    })?;

    table.create(TypeDefinition {
        name: POINT_NAME.clone(),
        base: Some(value_type),
        abstract_: false,
        declarations: vec![
            Declaration::new("lat", double),
            Declaration::new("lon", double),
        ],
    })?;

    table.create(TypeDefinition {
        name: ROOT_NAME.clone(),
        base: Some(value_type),
        abstract_: false,
        declarations: vec![
            Declaration::new("identifiables", value_type).with_occurs(0, MaxOccurs::Unbounded),
        ],
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_builtins_without_crashing() {
        let mut table = ConstructionTypeTable::new();
        register_builtins(&mut table).unwrap();
        let registry = table.freeze().unwrap();

        let point = registry.get(&POINT_NAME).unwrap();
        let value_type = registry.get(&VALUE_TYPE_NAME).unwrap();
        assert!(registry.can_substitute(point, value_type));
        assert!(registry.sub_element(point, "lat").is_ok());
    }

    #[test]
    fn identifier_substitutes_for_string() {
        let mut table = ConstructionTypeTable::new();
        register_builtins(&mut table).unwrap();
        let registry = table.freeze().unwrap();

        let identifier = registry.get(&IDENTIFIER_NAME).unwrap();
        let string = registry.get(&STRING_NAME).unwrap();
        assert!(registry.can_substitute(identifier, string));
        assert!(!registry.can_substitute(string, identifier));
    }
}
