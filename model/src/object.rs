use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::rc::Rc;

use approxsim_schema::{Declaration, MaxOccurs, TypeRef, TypeRegistry};

use crate::error::ModelError;
use crate::event::{Event, EventKind, EventListener, ListenerId, ListenerSet};
use crate::reference::Reference;
use crate::value::SimpleValue;

/// A reference to a node stored in an [`ObjectTree`].
///
/// Ids are plain handles; dereferencing one against a tree it was not
/// created by is a logic error and panics.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(NonZeroU32);

impl ObjectId {
    fn from_index(index: usize) -> Self {
        let size = NonZeroUsize::new(index + 1).unwrap();
        let id: NonZeroU32 = size.try_into().expect("node id did not fit into 32 bits");
        Self(id)
    }

    fn index(self) -> usize {
        let size: NonZeroUsize = self
            .0
            .try_into()
            .expect("could not convert node id to usize index");
        usize::from(size) - 1
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<node #{}>", self.0)
    }
}

/// The variant-specific payload of a node.
pub enum ObjectKind {
    /// A leaf carrying one primitive value.
    Simple(SimpleValue),
    /// A composite with named children, one per declared slot.
    Complex { children: Vec<ObjectId> },
    /// The occupants of one list-valued slot. The node's identifier is the
    /// slot tag; the members carry their own identifiers.
    List {
        declaration: Declaration,
        children: Vec<ObjectId>,
    },
}

/// One typed element of the scenario object tree: a type, an identifier
/// unique among its siblings (empty = anonymous), a back-reference to its
/// parent and the variant payload. Ownership flows parent to child; the
/// parent link is just a handle.
pub struct ObjectNode {
    type_: TypeRef,
    identifier: String,
    parent: Option<ObjectId>,
    kind: ObjectKind,
    listeners: ListenerSet,
}

impl ObjectNode {
    pub fn type_(&self) -> TypeRef {
        self.type_
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn value(&self) -> Option<&SimpleValue> {
        match &self.kind {
            ObjectKind::Simple(value) => Some(value),
            _ => None,
        }
    }
}

/// Arena of scenario objects. All structural operations go through the
/// tree; nodes are addressed by [`ObjectId`].
///
/// Detached nodes stay addressable until the tree itself is dropped, so
/// handles held by listeners never dangle.
///
/// Mutations fire [`Event`]s synchronously, to a snapshot of the affected
/// node's listener list. A listener must not mutate the tree from its
/// callback; the tree is single-threaded by design.
#[derive(Default)]
pub struct ObjectTree {
    nodes: Vec<ObjectNode>,
    next_listener: u64,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: ObjectId) -> &ObjectNode {
        self.nodes
            .get(id.index())
            .expect("invalid node id (out-of-bounds)")
    }

    fn node_mut(&mut self, id: ObjectId) -> &mut ObjectNode {
        self.nodes
            .get_mut(id.index())
            .expect("invalid node id (out-of-bounds)")
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn identifier(&self, id: ObjectId) -> &str {
        self.node(id).identifier()
    }

    pub fn type_of(&self, id: ObjectId) -> TypeRef {
        self.node(id).type_
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.node(id).parent
    }

    pub fn value(&self, id: ObjectId) -> Option<&SimpleValue> {
        self.node(id).value()
    }

    // ----- construction ---------------------------------------------------

    fn create(&mut self, node: ObjectNode) -> ObjectId {
        self.nodes.push(node);
        ObjectId::from_index(self.nodes.len() - 1)
    }

    pub fn create_simple(
        &mut self,
        type_: TypeRef,
        identifier: impl Into<String>,
        value: SimpleValue,
    ) -> ObjectId {
        self.create(ObjectNode {
            type_,
            identifier: identifier.into(),
            parent: None,
            kind: ObjectKind::Simple(value),
            listeners: ListenerSet::default(),
        })
    }

    pub fn create_complex(&mut self, type_: TypeRef, identifier: impl Into<String>) -> ObjectId {
        self.create(ObjectNode {
            type_,
            identifier: identifier.into(),
            parent: None,
            kind: ObjectKind::Complex {
                children: Vec::new(),
            },
            listeners: ListenerSet::default(),
        })
    }

    /// Creates an empty list node for one list-valued slot. The node's type
    /// is the slot's element type, so the list itself passes the slot's
    /// substitutability check.
    pub fn create_list(&mut self, declaration: Declaration) -> ObjectId {
        self.create(ObjectNode {
            type_: declaration.type_,
            identifier: declaration.name.clone(),
            parent: None,
            kind: ObjectKind::List {
                declaration,
                children: Vec::new(),
            },
            listeners: ListenerSet::default(),
        })
    }

    // ----- queries --------------------------------------------------------

    fn children_slice(&self, id: ObjectId) -> &[ObjectId] {
        match &self.node(id).kind {
            ObjectKind::Simple(_) => &[],
            ObjectKind::Complex { children } | ObjectKind::List { children, .. } => children,
        }
    }

    pub fn child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.children_slice(parent)
            .iter()
            .copied()
            .find(|&c| self.identifier(c) == name)
    }

    pub fn has_child(&self, parent: ObjectId, name: &str) -> bool {
        self.child(parent, name).is_some()
    }

    /// The children in order: insertion order for lists, construction order
    /// (declaration order when factory-built) for composites.
    pub fn children(&self, parent: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.children_slice(parent).iter().copied()
    }

    /// Lazy filtered view of the children; recomputed on every call by
    /// walking the full child collection.
    pub fn filtered_children<'a, P>(
        &'a self,
        parent: ObjectId,
        predicate: P,
    ) -> impl Iterator<Item = ObjectId> + 'a
    where
        P: Fn(&ObjectNode) -> bool + 'a,
    {
        self.children(parent)
            .filter(move |&c| predicate(self.node(c)))
    }

    /// True iff `ancestor` is reached by walking parent links from
    /// `descendant`. A node is not its own ancestor.
    pub fn is_ancestor(&self, ancestor: ObjectId, descendant: ObjectId) -> bool {
        let mut current = self.parent(descendant);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// The absolute path to `id`: its own identifier innermost, then every
    /// ancestor's identifier outward to the root.
    pub fn reference_to(&self, id: ObjectId) -> Reference {
        let mut components = vec![self.identifier(id).to_string()];
        let mut current = self.parent(id);
        while let Some(node) = current {
            components.push(self.identifier(node).to_string());
            current = self.parent(node);
        }
        Reference::new(components)
    }

    // ----- mutation -------------------------------------------------------

    /// Attaches `child` under `parent`.
    ///
    /// The child must be detached, its type must substitute for the slot
    /// the parent's type declares for the child's identifier (for lists,
    /// the list's element declaration), and its identifier must not collide
    /// with a sibling. Anonymous children are exempt from the collision
    /// check, since they cannot be referenced by name.
    ///
    /// On success fires `Added` to `parent`'s listeners with the child as
    /// argument; on failure the tree is unchanged.
    pub fn add(
        &mut self,
        registry: &TypeRegistry,
        parent: ObjectId,
        child: ObjectId,
    ) -> Result<(), ModelError> {
        if self.parent(child).is_some() {
            return Err(ModelError::AlreadyAttached);
        }
        let child_type = self.type_of(child);
        let child_identifier = self.identifier(child).to_string();

        match &self.node(parent).kind {
            ObjectKind::Simple(_) => return Err(ModelError::NotAComposite),
            ObjectKind::Complex { .. } => {
                let parent_type = self.type_of(parent);
                let declaration = registry.sub_element(parent_type, &child_identifier)?;
                if !registry.can_substitute(child_type, declaration.type_) {
                    return Err(ModelError::NotSubstitutable {
                        tag: child_identifier,
                        expected: registry.resolve(declaration.type_).name.clone(),
                        actual: registry.resolve(child_type).name.clone(),
                    });
                }
                if !child_identifier.is_empty() && self.has_child(parent, &child_identifier) {
                    return Err(ModelError::DuplicateIdentifier(child_identifier));
                }
            }
            ObjectKind::List {
                declaration,
                children,
            } => {
                if !registry.can_substitute(child_type, declaration.type_) {
                    return Err(ModelError::NotSubstitutable {
                        tag: declaration.name.clone(),
                        expected: registry.resolve(declaration.type_).name.clone(),
                        actual: registry.resolve(child_type).name.clone(),
                    });
                }
                if !declaration.max_occurs.admits(children.len() as u64 + 1) {
                    let max = match declaration.max_occurs {
                        MaxOccurs::Count(max) => max,
                        MaxOccurs::Unbounded => unreachable!(),
                    };
                    return Err(ModelError::SlotFull {
                        tag: declaration.name.clone(),
                        max,
                    });
                }
                if !child_identifier.is_empty() && self.has_child(parent, &child_identifier) {
                    return Err(ModelError::DuplicateIdentifier(child_identifier));
                }
            }
        }

        match &mut self.node_mut(parent).kind {
            ObjectKind::Complex { children } | ObjectKind::List { children, .. } => {
                children.push(child)
            }
            ObjectKind::Simple(_) => unreachable!(),
        }
        self.node_mut(child).parent = Some(parent);
        self.fire(
            parent,
            Event {
                kind: EventKind::Added,
                source: parent,
                argument: Some(child),
            },
        );
        Ok(())
    }

    /// Like [`Self::add`], but on an identifier collision mutates the
    /// child's identifier (`name-2`, `name-3`, …) until it is unique among
    /// the siblings.
    pub fn add_with_unique_identifier(
        &mut self,
        registry: &TypeRegistry,
        parent: ObjectId,
        child: ObjectId,
    ) -> Result<(), ModelError> {
        let identifier = self.identifier(child).to_string();
        if !identifier.is_empty() && self.has_child(parent, &identifier) {
            let mut suffix = 2u64;
            let unique = loop {
                let candidate = format!("{identifier}-{suffix}");
                if !self.has_child(parent, &candidate) {
                    break candidate;
                }
                suffix += 1;
            };
            self.node_mut(child).identifier = unique;
        }
        self.add(registry, parent, child)
    }

    /// Detaches `id` from its parent and fires `Removed` to the removed
    /// node's own listeners — callers that want to stop listening do so in
    /// response to that event. The node stays addressable.
    pub fn remove(&mut self, id: ObjectId) -> Result<(), ModelError> {
        let parent = self.parent(id).ok_or(ModelError::NoParent)?;
        match &mut self.node_mut(parent).kind {
            ObjectKind::Complex { children } | ObjectKind::List { children, .. } => {
                children.retain(|&c| c != id)
            }
            ObjectKind::Simple(_) => unreachable!("child of a leaf"),
        }
        self.node_mut(id).parent = None;
        self.fire(
            id,
            Event {
                kind: EventKind::Removed,
                source: id,
                argument: None,
            },
        );
        Ok(())
    }

    /// Swaps `old` for `new` at the same slot of `old`'s parent.
    ///
    /// In a composite the slot is named by `old`'s identifier, and `new`
    /// takes that identifier over; in a list `new` keeps its own. Fires
    /// `Replaced` to the old node's listeners with `new` as argument.
    /// Listeners are NOT migrated; callers re-register on the replacement.
    pub fn replace(
        &mut self,
        registry: &TypeRegistry,
        old: ObjectId,
        new: ObjectId,
    ) -> Result<(), ModelError> {
        let parent = self.parent(old).ok_or(ModelError::NoParent)?;
        if self.parent(new).is_some() {
            return Err(ModelError::AlreadyAttached);
        }
        let new_type = self.type_of(new);

        let rename = match &self.node(parent).kind {
            ObjectKind::Simple(_) => unreachable!("child of a leaf"),
            ObjectKind::Complex { .. } => {
                let slot_tag = self.identifier(old).to_string();
                let declaration = registry.sub_element(self.type_of(parent), &slot_tag)?;
                if !registry.can_substitute(new_type, declaration.type_) {
                    return Err(ModelError::NotSubstitutable {
                        tag: slot_tag,
                        expected: registry.resolve(declaration.type_).name.clone(),
                        actual: registry.resolve(new_type).name.clone(),
                    });
                }
                Some(slot_tag)
            }
            ObjectKind::List { declaration, .. } => {
                if !registry.can_substitute(new_type, declaration.type_) {
                    return Err(ModelError::NotSubstitutable {
                        tag: declaration.name.clone(),
                        expected: registry.resolve(declaration.type_).name.clone(),
                        actual: registry.resolve(new_type).name.clone(),
                    });
                }
                let identifier = self.identifier(new).to_string();
                if !identifier.is_empty() {
                    if let Some(existing) = self.child(parent, &identifier) {
                        if existing != old {
                            return Err(ModelError::DuplicateIdentifier(identifier));
                        }
                    }
                }
                None
            }
        };
        if let Some(identifier) = rename {
            self.node_mut(new).identifier = identifier;
        }

        match &mut self.node_mut(parent).kind {
            ObjectKind::Complex { children } | ObjectKind::List { children, .. } => {
                let slot = children
                    .iter()
                    .position(|&c| c == old)
                    .expect("parent does not contain its child");
                children[slot] = new;
            }
            ObjectKind::Simple(_) => unreachable!(),
        }
        self.node_mut(old).parent = None;
        self.node_mut(new).parent = Some(parent);
        self.fire(
            old,
            Event {
                kind: EventKind::Replaced,
                source: old,
                argument: Some(new),
            },
        );
        Ok(())
    }

    /// Overwrites a leaf's value with one of the same kind and fires
    /// `ValueChanged`.
    pub fn set_value(&mut self, id: ObjectId, value: SimpleValue) -> Result<(), ModelError> {
        match &mut self.node_mut(id).kind {
            ObjectKind::Simple(current) => {
                if !current.same_kind(&value) {
                    return Err(ModelError::ValueKindMismatch);
                }
                *current = value;
            }
            _ => return Err(ModelError::NotASimpleValue),
        }
        self.fire(
            id,
            Event {
                kind: EventKind::ValueChanged,
                source: id,
                argument: None,
            },
        );
        Ok(())
    }

    // ----- listeners ------------------------------------------------------

    pub fn add_event_listener(
        &mut self,
        id: ObjectId,
        listener: Rc<dyn EventListener>,
    ) -> ListenerId {
        let listener_id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.node_mut(id).listeners.add(listener_id, listener);
        listener_id
    }

    pub fn remove_event_listener(&mut self, id: ObjectId, listener: ListenerId) -> bool {
        self.node_mut(id).listeners.remove(listener)
    }

    fn fire(&self, target: ObjectId, event: Event) {
        let listeners = &self.node(target).listeners;
        if listeners.is_empty() {
            return;
        }
        for listener in listeners.snapshot() {
            listener.event_occurred(&event);
        }
    }
}
