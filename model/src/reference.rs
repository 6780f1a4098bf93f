use std::fmt;

use crate::object::{ObjectId, ObjectTree};

/// A scoped path to a named object: an ordered sequence of identifiers with
/// the referenced object's own name at index 0 and the enclosing scopes
/// following outward.
///
/// References are value types; storing one clones it. Equality and hashing
/// are component-wise.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    components: Vec<String>,
}

impl Reference {
    /// Builds a reference from components, innermost first. Parsed
    /// references never contain empty components; programmatic construction
    /// is not policed, so a default-constructed placeholder may.
    pub fn new(components: Vec<String>) -> Self {
        debug_assert!(!components.is_empty());
        Self { components }
    }

    pub fn to_identifier(identifier: impl Into<String>) -> Self {
        Self::new(vec![identifier.into()])
    }

    /// The referenced object's own name.
    pub fn identifier(&self) -> &str {
        &self.components[0]
    }

    /// All components, innermost first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The enclosing scopes, innermost first.
    pub fn scope_chain(&self) -> &[String] {
        &self.components[1..]
    }

    /// Parses the textual form: components separated by `:` with the
    /// innermost first, `\:` for a literal colon and `\\` for a literal
    /// backslash. Returns `None` for the empty string, for any empty
    /// component (`a::b`) and for a trailing separator (`a:`).
    pub fn parse(source: &str) -> Option<Self> {
        if source.is_empty() {
            return None;
        }
        let mut components = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        for c in source.chars() {
            if escaped {
                if c == ':' || c == '\\' {
                    current.push(c);
                } else {
                    current.push('\\');
                    current.push(c);
                }
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == ':' {
                if current.is_empty() {
                    return None;
                }
                components.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }
        if escaped {
            current.push('\\');
        }
        if current.is_empty() {
            // Trailing separator.
            return None;
        }
        components.push(current);
        Some(Self::new(components))
    }

    /// Resolves this reference against the tree, walking upward from
    /// `scope`. At each ancestor the outermost component is anchored by
    /// direct-child lookup, falling back to the ancestor's own identifier;
    /// once anchored, the remaining components are followed inward as
    /// direct-child lookups only. A failed inward step ends the resolution
    /// — the outward walk does not resume past a committed anchor.
    pub fn resolve(&self, tree: &ObjectTree, scope: ObjectId) -> Option<ObjectId> {
        let outermost = self
            .components
            .last()
            .expect("references have at least one component");

        let mut ancestor = Some(scope);
        while let Some(node) = ancestor {
            let anchor = tree.child(node, outermost).or_else(|| {
                if tree.identifier(node) == outermost {
                    Some(node)
                } else {
                    None
                }
            });
            if let Some(anchor) = anchor {
                let mut current = anchor;
                for component in self.components[..self.components.len() - 1].iter().rev() {
                    current = tree.child(current, component)?;
                }
                return Some(current);
            }
            ancestor = tree.parent(node);
        }
        None
    }
}

/// Sweeps the subtree under `root` and returns every reference-valued leaf
/// that does not resolve in its own scope, in document order. Resolution
/// failure is an expected outcome, not an error; this is the checker that
/// makes it visible.
pub fn find_unresolved(tree: &ObjectTree, root: ObjectId) -> Vec<ObjectId> {
    let mut unresolved = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(crate::value::SimpleValue::Reference(reference)) = tree.value(node) {
            let scope = tree.parent(node).unwrap_or(node);
            if reference.resolve(tree, scope).is_none() {
                unresolved.push(node);
            }
        }
        let children: Vec<ObjectId> = tree.children(node).collect();
        stack.extend(children.into_iter().rev());
    }
    unresolved
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            for c in component.chars() {
                if c == ':' || c == '\\' {
                    write!(f, "\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_components_innermost_first() {
        let reference = Reference::parse("a:b:c").unwrap();
        assert_eq!(reference.identifier(), "a");
        assert_eq!(reference.scope_chain(), ["b", "c"]);
    }

    #[test]
    fn rejects_degenerate_forms() {
        assert!(Reference::parse("").is_none());
        assert!(Reference::parse(":").is_none());
        assert!(Reference::parse("a:").is_none());
        assert!(Reference::parse("a::b").is_none());
    }

    #[test]
    fn escaped_colons_do_not_split() {
        let reference = Reference::parse(r"task\:force:hq").unwrap();
        assert_eq!(reference.identifier(), "task:force");
        assert_eq!(reference.scope_chain(), ["hq"]);
    }

    #[test]
    fn display_round_trips() {
        for source in ["a", "a:b:c", r"task\:force:hq", r"back\\slash"] {
            let reference = Reference::parse(source).unwrap();
            let reparsed = Reference::parse(&reference.to_string()).unwrap();
            assert_eq!(reference, reparsed);
        }
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            Reference::parse("a:b").unwrap(),
            Reference::new(vec!["a".into(), "b".into()])
        );
        assert_ne!(
            Reference::parse("a:b").unwrap(),
            Reference::parse("b:a").unwrap()
        );
    }
}
