//! Static type descriptors with a single-parent ancestry chain
//!
//! Component kinds and event kinds are [`Kind`] constants. A kind may name a
//! parent kind, forming a chain known at compile time:
//!
//! ```
//! use tabletop_engine::ecs::kind::Kind;
//!
//! const COMBAT: Kind = Kind::root("CombatEvent");
//! const ATTACK: Kind = Kind::derived("AttackEvent", &COMBAT);
//!
//! let chain: Vec<_> = ATTACK.ancestry().map(Kind::name).collect();
//! assert_eq!(chain, ["AttackEvent", "CombatEvent"]);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

/// A named kind with an optional parent.
///
/// Two kinds are equal when their names are equal, so names must be unique
/// within their domain (all component kinds, all event kinds).
#[derive(Debug, Clone, Copy)]
pub struct Kind {
    name: &'static str,
    parent: Option<&'static Kind>,
}

impl Kind {
    /// A kind with no parent
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// A kind derived from `parent`
    pub const fn derived(name: &'static str, parent: &'static Self) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Kind name
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Immediate parent, if any
    pub const fn parent(&self) -> Option<&'static Self> {
        self.parent
    }

    /// This kind, then its parent, and so on up to the root.
    pub fn ancestry(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |kind| kind.parent)
    }

    /// Is `self` the same kind as `other`, or derived from it?
    pub fn is_a(&self, other: &Self) -> bool {
        self.ancestry().any(|kind| kind == other)
    }

    /// Number of ancestors above this kind
    pub fn depth(&self) -> usize {
        self.ancestry().count() - 1
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Kind = Kind::root("Base");
    const MIDDLE: Kind = Kind::derived("Middle", &BASE);
    const LEAF: Kind = Kind::derived("Leaf", &MIDDLE);
    const OTHER: Kind = Kind::root("Other");

    #[test]
    fn test_ancestry_most_derived_first() {
        let names: Vec<_> = LEAF.ancestry().map(Kind::name).collect();
        assert_eq!(names, vec!["Leaf", "Middle", "Base"]);
        assert_eq!(LEAF.depth(), 2);
        assert_eq!(BASE.depth(), 0);
    }

    #[test]
    fn test_is_a() {
        assert!(LEAF.is_a(&BASE));
        assert!(LEAF.is_a(&LEAF));
        assert!(!BASE.is_a(&LEAF));
        assert!(!LEAF.is_a(&OTHER));
    }

    #[test]
    fn test_equality_by_name() {
        let copy = Kind::root("Base");
        assert_eq!(copy, BASE);
        assert_ne!(BASE, OTHER);
    }
}
