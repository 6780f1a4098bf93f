use std::collections::HashMap;

use crate::declaration::Declaration;
use crate::error::SchemaError;
use crate::type_def::{Ancestors, TypeDefinition, TypeRef};
use crate::xstypes::QName;

/// Mutable type table used while a schema is being read.
///
/// Named slots are reserved up front so declarations may refer to types that
/// are defined later in the document; the definitions are inserted in a
/// second pass and the table is then [frozen](Self::freeze) into an
/// immutable [`TypeRegistry`].
#[derive(Default)]
pub struct ConstructionTypeTable {
    types: Vec<Option<TypeDefinition>>,
    lookup: HashMap<QName, TypeRef>,
}

impl ConstructionTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an absent slot and registers `name` to point at it.
    pub fn reserve(&mut self, name: QName) -> Result<TypeRef, SchemaError> {
        if self.lookup.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        self.types.push(None);
        let ref_ = TypeRef::from_index(self.types.len() - 1);
        self.lookup.insert(name, ref_);
        Ok(ref_)
    }

    /// Inserts the definition into the slot pointed to by `ref_`.
    /// Returns `ref_` for convenience.
    pub fn insert(&mut self, ref_: TypeRef, value: TypeDefinition) -> TypeRef {
        let slot = self
            .types
            .get_mut(ref_.index())
            .expect("invalid type reference (out-of-bounds)");
        *slot = Some(value);
        ref_
    }

    /// Shorthand for `insert(reserve(name), value)`.
    pub fn create(&mut self, value: TypeDefinition) -> Result<TypeRef, SchemaError> {
        let ref_ = self.reserve(value.name.clone())?;
        Ok(self.insert(ref_, value))
    }

    pub fn get(&self, name: &QName) -> Option<TypeRef> {
        self.lookup.get(name).copied()
    }

    /// Converts this table into a read-only registry. Fails if any reserved
    /// slot was never filled in.
    pub fn freeze(self) -> Result<TypeRegistry, SchemaError> {
        let mut types = Vec::with_capacity(self.types.len());
        for slot in self.types {
            types.push(slot.ok_or(SchemaError::UnfinishedTypeTable)?);
        }
        Ok(TypeRegistry {
            types: types.into_boxed_slice(),
            lookup: self.lookup,
        })
    }
}

/// The process-lifetime registry of schema types, keyed by qualified name.
///
/// Built once by the schema reader and immutable thereafter. All type
/// queries the object model needs — slot lookup, substitutability, derived
/// enumeration — go through here.
pub struct TypeRegistry {
    types: Box<[TypeDefinition]>,
    lookup: HashMap<QName, TypeRef>,
}

impl TypeRegistry {
    pub fn get(&self, name: &QName) -> Result<TypeRef, SchemaError> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownType(name.clone()))
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn resolve(&self, ref_: TypeRef) -> &TypeDefinition {
        self.types
            .get(ref_.index())
            .expect("invalid type reference (out-of-bounds)")
    }

    /// All registered types, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = TypeRef> + '_ {
        (0..self.types.len()).map(TypeRef::from_index)
    }

    /// The ancestors of `type_`, nearest base first.
    pub fn ancestors(&self, type_: TypeRef) -> Ancestors<'_> {
        Ancestors::new(self.resolve(type_).base, self)
    }

    /// Whether a value of type `actual` may occupy a slot declared with
    /// `expected`: true iff `expected` equals `actual` or is one of its
    /// ancestors. Reflexive and transitive.
    pub fn can_substitute(&self, actual: TypeRef, expected: TypeRef) -> bool {
        actual == expected || self.ancestors(actual).any(|a| a == expected)
    }

    /// The slot `type_` declares for `tag`, considering inherited
    /// declarations. Own declarations shadow a base's declaration with the
    /// same tag.
    pub fn sub_element(&self, type_: TypeRef, tag: &str) -> Result<&Declaration, SchemaError> {
        std::iter::once(type_)
            .chain(self.ancestors(type_))
            .find_map(|t| self.resolve(t).own_sub_element(tag))
            .ok_or_else(|| SchemaError::UnknownSubElement {
                type_name: self.resolve(type_).name.clone(),
                tag: tag.into(),
            })
    }

    /// Every declaration of `type_` in construction order: inherited slots
    /// first (outermost base first), then own slots, with shadowed
    /// declarations suppressed.
    pub fn all_declarations(&self, type_: TypeRef) -> Vec<&Declaration> {
        let mut chain: Vec<TypeRef> = std::iter::once(type_).chain(self.ancestors(type_)).collect();
        chain.reverse();
        let mut result: Vec<&Declaration> = Vec::new();
        for t in chain {
            for decl in &self.resolve(t).declarations {
                if let Some(existing) = result.iter_mut().find(|d| d.name == decl.name) {
                    *existing = decl;
                } else {
                    result.push(decl);
                }
            }
        }
        result
    }

    /// All types transitively derived from `type_`, in registration order.
    /// The enumeration is recomputed per call and is stable for a fixed
    /// registry.
    pub fn expanded_derived(&self, type_: TypeRef) -> Vec<TypeRef> {
        self.iter()
            .filter(|&t| t != type_ && self.ancestors(t).any(|a| a == type_))
            .collect()
    }

    /// [`Self::expanded_derived`] restricted to instantiable types. This is
    /// what populates "choose a concrete type" selections.
    pub fn concrete_derived(&self, type_: TypeRef) -> Vec<TypeRef> {
        self.expanded_derived(type_)
            .into_iter()
            .filter(|&t| !self.resolve(t).abstract_)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use crate::xstypes::QName;

    fn name(local: &str) -> QName {
        QName::with_namespace("urn:test", local)
    }

    fn registry() -> TypeRegistry {
        // ValueType <- Element <- MilitaryUnit <- InfantryUnit
        //          \<- Shape (abstract)
        let mut table = ConstructionTypeTable::new();
        let value_type = table
            .create(TypeDefinition {
                name: name("ValueType"),
                base: None,
                abstract_: true,
                declarations: vec![],
            })
            .unwrap();
        let element = table
            .create(TypeDefinition {
                name: name("Element"),
                base: Some(value_type),
                abstract_: true,
                declarations: vec![Declaration::new("location", value_type)],
            })
            .unwrap();
        let unit = table
            .create(TypeDefinition {
                name: name("MilitaryUnit"),
                base: Some(element),
                abstract_: false,
                declarations: vec![Declaration::new("strength", value_type)],
            })
            .unwrap();
        table
            .create(TypeDefinition {
                name: name("InfantryUnit"),
                base: Some(unit),
                abstract_: false,
                declarations: vec![],
            })
            .unwrap();
        table
            .create(TypeDefinition {
                name: name("Shape"),
                base: Some(value_type),
                abstract_: true,
                declarations: vec![],
            })
            .unwrap();
        table.freeze().unwrap()
    }

    #[test]
    fn substitution_is_reflexive_and_transitive() {
        let registry = registry();
        let value_type = registry.get(&name("ValueType")).unwrap();
        let unit = registry.get(&name("MilitaryUnit")).unwrap();
        let infantry = registry.get(&name("InfantryUnit")).unwrap();

        assert!(registry.can_substitute(unit, unit));
        assert!(registry.can_substitute(infantry, unit));
        assert!(registry.can_substitute(infantry, value_type));
    }

    #[test]
    fn substitution_does_not_run_downwards_or_sideways() {
        let registry = registry();
        let value_type = registry.get(&name("ValueType")).unwrap();
        let unit = registry.get(&name("MilitaryUnit")).unwrap();
        let shape = registry.get(&name("Shape")).unwrap();

        assert!(!registry.can_substitute(value_type, unit));
        assert!(!registry.can_substitute(shape, unit));
    }

    #[test]
    fn sub_element_sees_inherited_slots() {
        let registry = registry();
        let infantry = registry.get(&name("InfantryUnit")).unwrap();

        assert!(registry.sub_element(infantry, "location").is_ok());
        assert!(registry.sub_element(infantry, "strength").is_ok());
        assert!(matches!(
            registry.sub_element(infantry, "nosuch"),
            Err(SchemaError::UnknownSubElement { .. })
        ));
    }

    #[test]
    fn all_declarations_run_base_first() {
        let registry = registry();
        let unit = registry.get(&name("MilitaryUnit")).unwrap();
        let decls: Vec<_> = registry
            .all_declarations(unit)
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(decls, vec!["location".to_string(), "strength".to_string()]);
    }

    #[test]
    fn expanded_derived_is_transitive_and_ordered() {
        let registry = registry();
        let value_type = registry.get(&name("ValueType")).unwrap();
        let element = registry.get(&name("Element")).unwrap();
        let derived = registry.expanded_derived(value_type);
        assert_eq!(derived.len(), 4);
        // Registration order, not hierarchy order.
        assert_eq!(derived[0], element);

        let concrete = registry.concrete_derived(value_type);
        assert_eq!(concrete.len(), 2);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut table = ConstructionTypeTable::new();
        table.reserve(name("Element")).unwrap();
        assert!(matches!(
            table.reserve(name("Element")),
            Err(SchemaError::DuplicateType(_))
        ));
    }

    #[test]
    fn freeze_fails_on_unfilled_slot() {
        let mut table = ConstructionTypeTable::new();
        table.reserve(name("Element")).unwrap();
        assert!(matches!(
            table.freeze(),
            Err(SchemaError::UnfinishedTypeTable)
        ));
    }
}
