use std::collections::HashMap;

use approxsim_schema::builtins::{
    BOOLEAN_NAME, DOUBLE_NAME, DURATION_NAME, POINT_NAME, REFERENCE_NAME, ROOT_NAME, STRING_NAME,
    SYMBOL_ID_CODE_NAME, TIMESTAMP_NAME,
};
use approxsim_schema::{Declaration, QName, TypeRef, TypeRegistry};

use crate::error::FactoryError;
use crate::object::{ObjectId, ObjectTree};
use crate::reference::Reference;
use crate::value::{SimpleValue, SymbolCode};

/// The concrete node shape built for a type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Constructor {
    Double,
    String,
    Boolean,
    Timestamp,
    Duration,
    Point,
    Reference,
    SymbolCode,
    Complex,
}

/// Type-directed construction of scenario objects.
///
/// A registration table maps types to [`Constructor`]s; lookup walks the
/// base-type chain, so a schema type restricting `Double` builds a double
/// leaf without its own entry. Types with no entry anywhere on the chain
/// fall back to complex construction when they declare sub-elements, and
/// are unsupported otherwise.
pub struct ObjectFactory {
    constructors: HashMap<TypeRef, Constructor>,
}

impl ObjectFactory {
    /// A factory with the built-in constructors registered.
    pub fn new(registry: &TypeRegistry) -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };
        let mut builtin = |name: &QName, constructor| {
            if let Ok(type_) = registry.get(name) {
                factory.constructors.insert(type_, constructor);
            }
        };
        builtin(&DOUBLE_NAME, Constructor::Double);
        builtin(&STRING_NAME, Constructor::String);
        builtin(&BOOLEAN_NAME, Constructor::Boolean);
        builtin(&TIMESTAMP_NAME, Constructor::Timestamp);
        builtin(&DURATION_NAME, Constructor::Duration);
        builtin(&POINT_NAME, Constructor::Point);
        builtin(&REFERENCE_NAME, Constructor::Reference);
        builtin(&SYMBOL_ID_CODE_NAME, Constructor::SymbolCode);
        builtin(&ROOT_NAME, Constructor::Complex);
        factory
    }

    pub fn register(&mut self, type_: TypeRef, constructor: Constructor) {
        self.constructors.insert(type_, constructor);
    }

    /// Resolves the constructor for `type_`: its own entry, else the
    /// nearest registered ancestor's, else the complex fallback for types
    /// that declare sub-elements.
    pub fn constructor_for(
        &self,
        registry: &TypeRegistry,
        type_: TypeRef,
    ) -> Result<Constructor, FactoryError> {
        for t in std::iter::once(type_).chain(registry.ancestors(type_)) {
            if let Some(constructor) = self.constructors.get(&t) {
                return Ok(*constructor);
            }
        }
        if !registry.all_declarations(type_).is_empty() {
            return Ok(Constructor::Complex);
        }
        Err(FactoryError::UnsupportedType(
            registry.resolve(type_).name.clone(),
        ))
    }

    /// Constructs a zero/default-valued node for the declared slot: an
    /// empty list for list slots, otherwise a leaf with its default value
    /// or a composite with one default child per declared slot.
    pub fn default_create(
        &self,
        tree: &mut ObjectTree,
        registry: &TypeRegistry,
        declaration: &Declaration,
    ) -> Result<ObjectId, FactoryError> {
        if declaration.is_list() {
            return Ok(tree.create_list(declaration.clone()));
        }
        self.default_create_single(tree, registry, declaration.name.clone(), declaration.type_)
    }

    fn default_create_single(
        &self,
        tree: &mut ObjectTree,
        registry: &TypeRegistry,
        identifier: String,
        type_: TypeRef,
    ) -> Result<ObjectId, FactoryError> {
        let definition = registry.resolve(type_);
        if definition.abstract_ {
            return Err(FactoryError::AbstractType(definition.name.clone()));
        }
        let node = match self.constructor_for(registry, type_)? {
            Constructor::Double => tree.create_simple(type_, identifier, SimpleValue::Double(0.0)),
            Constructor::String => {
                tree.create_simple(type_, identifier, SimpleValue::String(String::new()))
            }
            Constructor::Boolean => {
                tree.create_simple(type_, identifier, SimpleValue::Boolean(false))
            }
            Constructor::Timestamp => {
                tree.create_simple(type_, identifier, SimpleValue::Timestamp(0))
            }
            Constructor::Duration => {
                tree.create_simple(type_, identifier, SimpleValue::Duration(0.0))
            }
            Constructor::Point => {
                tree.create_simple(type_, identifier, SimpleValue::Point { lat: 0.0, lon: 0.0 })
            }
            Constructor::Reference => tree.create_simple(
                type_,
                identifier,
                SimpleValue::Reference(Reference::to_identifier("")),
            ),
            Constructor::SymbolCode => tree.create_simple(
                type_,
                identifier,
                SimpleValue::SymbolCode(SymbolCode::default()),
            ),
            Constructor::Complex => {
                let node = tree.create_complex(type_, identifier);
                let declarations: Vec<Declaration> = registry
                    .all_declarations(type_)
                    .into_iter()
                    .cloned()
                    .collect();
                for declaration in &declarations {
                    let child = self.default_create(tree, registry, declaration)?;
                    tree.add(registry, node, child)?;
                }
                node
            }
        };
        Ok(node)
    }

    /// A builder that accumulates already-constructed children and
    /// finalizes them into a node of the declared type.
    pub fn vector_create(&self, declaration: &Declaration) -> VectorBuilder<'_> {
        VectorBuilder {
            factory: self,
            identifier: declaration.name.clone(),
            declaration: declaration.clone(),
            children: Vec::new(),
            list: false,
        }
    }

    /// Like [`Self::vector_create`], but produces the list node for a
    /// list-valued slot with the accumulated children as members.
    pub fn vector_create_list(&self, declaration: &Declaration) -> VectorBuilder<'_> {
        VectorBuilder {
            factory: self,
            identifier: declaration.name.clone(),
            declaration: declaration.clone(),
            children: Vec::new(),
            list: true,
        }
    }
}

pub struct VectorBuilder<'a> {
    factory: &'a ObjectFactory,
    declaration: Declaration,
    identifier: String,
    children: Vec<ObjectId>,
    list: bool,
}

impl VectorBuilder<'_> {
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn push(&mut self, child: ObjectId) {
        self.children.push(child);
    }

    /// Validates that the accumulated children collectively satisfy the
    /// target type's slot and multiplicity constraints and produces the
    /// node.
    pub fn finish(
        self,
        tree: &mut ObjectTree,
        registry: &TypeRegistry,
    ) -> Result<ObjectId, FactoryError> {
        let type_name = registry.resolve(self.declaration.type_).name.clone();
        let incomplete = |reason: String| FactoryError::IncompleteConstruction {
            type_name: type_name.clone(),
            tag: self.declaration.name.clone(),
            reason,
        };

        if self.list {
            let count = self.children.len() as u64;
            if !self.declaration.admits_count(count) {
                return Err(incomplete(format!(
                    "{count} occupants do not satisfy the slot's multiplicity"
                )));
            }
            let node = tree.create_list(self.declaration.clone());
            for child in self.children {
                tree.add(registry, node, child)
                    .map_err(|e| incomplete(e.to_string()))?;
            }
            return Ok(node);
        }

        let type_ = self.declaration.type_;
        let definition = registry.resolve(type_);
        if definition.abstract_ {
            return Err(FactoryError::AbstractType(definition.name.clone()));
        }
        match self.factory.constructor_for(registry, type_)? {
            Constructor::Complex => {
                let node = tree.create_complex(type_, self.identifier.clone());
                for child in &self.children {
                    tree.add(registry, node, *child)
                        .map_err(|e| incomplete(e.to_string()))?;
                }
                let declarations: Vec<Declaration> = registry
                    .all_declarations(type_)
                    .into_iter()
                    .cloned()
                    .collect();
                for declaration in &declarations {
                    let count = match tree.child(node, &declaration.name) {
                        None => 0,
                        Some(occupant) if declaration.is_list() => {
                            tree.children(occupant).count() as u64
                        }
                        Some(_) => 1,
                    };
                    if !declaration.admits_count(count) {
                        return Err(incomplete(format!(
                            "slot {:?} holds {count} occupants, declared {}..{}",
                            declaration.name,
                            declaration.min_occurs,
                            match declaration.max_occurs {
                                approxsim_schema::MaxOccurs::Unbounded => "unbounded".to_string(),
                                approxsim_schema::MaxOccurs::Count(max) => max.to_string(),
                            }
                        )));
                    }
                }
                Ok(node)
            }
            Constructor::SymbolCode => {
                // The placeholder's only meaningful child is the <value>
                // string; it is consumed here, not attached.
                let mut code = SymbolCode::default();
                for child in &self.children {
                    if tree.identifier(*child) == "value" {
                        if let Some(SimpleValue::String(text)) = tree.value(*child) {
                            code = SymbolCode::parse(text).map_err(|e| incomplete(e.to_string()))?;
                        }
                    }
                }
                Ok(tree.create_simple(type_, self.identifier, SimpleValue::SymbolCode(code)))
            }
            _ => Err(incomplete("type is not a composite".to_string())),
        }
    }
}
