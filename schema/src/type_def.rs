use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};

use crate::declaration::Declaration;
use crate::registry::TypeRegistry;
use crate::xstypes::{QName, Sequence};

/// A reference to a [`TypeDefinition`] stored in a [`TypeRegistry`].
///
/// References are plain handles; dereferencing one against a registry it was
/// not created by is a logic error and panics.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef(NonZeroU32);

impl TypeRef {
    pub(crate) fn from_index(index: usize) -> Self {
        let size = NonZeroUsize::new(index + 1).unwrap();
        let id: NonZeroU32 = size.try_into().expect("type id did not fit into 32 bits");
        Self(id)
    }

    pub(crate) fn index(self) -> usize {
        let size: NonZeroUsize = self
            .0
            .try_into()
            .expect("could not convert type reference to usize index");
        usize::from(size) - 1
    }

    pub fn get(self, registry: &TypeRegistry) -> &TypeDefinition {
        registry.resolve(self)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<type #{}>", self.0)
    }
}

/// A named schema type: an optional base type, an abstract flag and an
/// ordered list of sub-element declarations.
///
/// The base-type graph is a tree rooted at the universal value type;
/// substitutability is the reflexive, transitive walk along it.
#[derive(Clone, Debug)]
pub struct TypeDefinition {
    pub name: QName,
    pub base: Option<TypeRef>,
    pub abstract_: bool,
    pub declarations: Sequence<Declaration>,
}

impl TypeDefinition {
    /// The slot this type declares for `tag`, not considering inherited
    /// declarations. Most callers want [`TypeRegistry::sub_element`].
    pub fn own_sub_element(&self, tag: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == tag)
    }
}

/// Iterator over a type's ancestors, nearest base first.
///
/// Unlike the infinite self-rooted walk some schema languages define, the
/// universal base here has no base of its own, so the iterator terminates.
pub struct Ancestors<'a> {
    current: Option<TypeRef>,
    registry: &'a TypeRegistry,
}

impl<'a> Ancestors<'a> {
    pub(crate) fn new(start: Option<TypeRef>, registry: &'a TypeRegistry) -> Self {
        Self {
            current: start,
            registry,
        }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = TypeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.get(self.registry).base;
        Some(current)
    }
}
