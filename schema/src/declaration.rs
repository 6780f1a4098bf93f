use crate::type_def::TypeRef;
use crate::xstypes::NCName;

/// Upper occurrence bound of a [`Declaration`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaxOccurs {
    Unbounded,
    Count(u64),
}

impl MaxOccurs {
    pub fn admits(&self, count: u64) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Count(max) => count <= *max,
        }
    }
}

/// A named, typed, multiplicity-constrained slot for a child element within
/// its owning type.
///
/// The declaration order within a type is significant: default construction
/// creates children in this order, and the exporter emits them in this order.
#[derive(Clone, Debug)]
pub struct Declaration {
    pub name: NCName,
    pub type_: TypeRef,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
}

impl Declaration {
    pub fn new(name: impl Into<NCName>, type_: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_,
            min_occurs: 1,
            max_occurs: MaxOccurs::Count(1),
        }
    }

    /// A slot is list-valued unless its upper bound is exactly one; an
    /// optional singular slot (`0..1`) is not a list.
    pub fn is_list(&self) -> bool {
        self.max_occurs != MaxOccurs::Count(1)
    }

    /// Clone with a substituted (more specific) type. Used when a derived
    /// type is chosen for this slot.
    pub fn with_type(&self, type_: TypeRef) -> Self {
        Self {
            type_,
            ..self.clone()
        }
    }

    /// Clone with overridden multiplicity. Used when constructing a root
    /// element, which is always a single occupant regardless of how the
    /// slot was declared.
    pub fn with_occurs(&self, min_occurs: u64, max_occurs: MaxOccurs) -> Self {
        Self {
            min_occurs,
            max_occurs,
            ..self.clone()
        }
    }

    pub fn admits_count(&self, count: u64) -> bool {
        count >= self.min_occurs && self.max_occurs.admits(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_def::TypeRef;

    fn dummy_ref() -> TypeRef {
        TypeRef::from_index(0)
    }

    #[test]
    fn singular_slot_is_not_a_list() {
        let decl = Declaration::new("population", dummy_ref());
        assert!(!decl.is_list());
    }

    #[test]
    fn unbounded_slot_is_a_list() {
        let decl = Declaration::new("units", dummy_ref()).with_occurs(0, MaxOccurs::Unbounded);
        assert!(decl.is_list());
        assert!(decl.admits_count(0));
        assert!(decl.admits_count(1000));
    }

    #[test]
    fn bounded_slot_rejects_counts_outside_range() {
        let decl = Declaration::new("corner", dummy_ref()).with_occurs(2, MaxOccurs::Count(4));
        assert!(!decl.admits_count(1));
        assert!(decl.admits_count(2));
        assert!(decl.admits_count(4));
        assert!(!decl.admits_count(5));
    }
}
