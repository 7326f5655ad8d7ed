//! Shared life-cycle state machine
//!
//! `Invalid → Creating → Alive → Destroying → Dead`
//!
//! Components, entities and systems all move through these states. Creation
//! and destruction are staged: `create`/`destroy` only record intent, and the
//! owning manager's sweeps commit it once per tick.

use std::collections::BTreeSet;
use std::fmt;

/// Where an object is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LifeCycle {
    /// Never initialized
    #[default]
    Invalid,
    /// Created, waiting for the next creation sweep
    Creating,
    /// Live and enabled
    Alive,
    /// Marked for removal at the next destruction sweep
    Destroying,
    /// Gone. Terminal.
    Dead,
}

impl LifeCycle {
    /// Only `Alive` objects are enabled for queries and dispatch.
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Alive)
    }

    /// Tag used on life-cycle events
    pub const fn event_tag(self) -> i64 {
        match self {
            Self::Invalid => 0,
            Self::Creating => 1,
            Self::Alive => 2,
            Self::Destroying => 3,
            Self::Dead => 4,
        }
    }
}

impl fmt::Display for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "INVALID",
            Self::Creating => "CREATING",
            Self::Alive => "ALIVE",
            Self::Destroying => "DESTROYING",
            Self::Dead => "DEAD",
        };
        f.write_str(name)
    }
}

/// Ids staged for the next creation or destruction sweep.
///
/// Ordered sets keep the sweeps deterministic: objects are promoted and
/// evicted in id order.
#[derive(Debug)]
pub struct Staged<I: Ord> {
    create: BTreeSet<I>,
    destroy: BTreeSet<I>,
}

impl<I: Ord> Default for Staged<I> {
    fn default() -> Self {
        Self {
            create: BTreeSet::new(),
            destroy: BTreeSet::new(),
        }
    }
}

impl<I: Ord + Copy> Staged<I> {
    /// Stage an id for the next creation sweep
    pub fn stage_create(&mut self, id: I) {
        self.create.insert(id);
    }

    /// Stage an id for the next destruction sweep
    pub fn stage_destroy(&mut self, id: I) {
        self.destroy.insert(id);
    }

    /// Take every id staged for creation
    pub fn take_create(&mut self) -> BTreeSet<I> {
        std::mem::take(&mut self.create)
    }

    /// Take every id staged for destruction
    pub fn take_destroy(&mut self) -> BTreeSet<I> {
        std::mem::take(&mut self.destroy)
    }

    /// Is `id` waiting on a sweep?
    pub fn is_staged(&self, id: I) -> bool {
        self.create.contains(&id) || self.destroy.contains(&id)
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.create.clear();
        self.destroy.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_alive_is_enabled() {
        assert!(LifeCycle::Alive.is_enabled());
        assert!(!LifeCycle::Creating.is_enabled());
        assert!(!LifeCycle::Destroying.is_enabled());
        assert!(!LifeCycle::Dead.is_enabled());
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(LifeCycle::Invalid < LifeCycle::Creating);
        assert!(LifeCycle::Creating < LifeCycle::Alive);
        assert!(LifeCycle::Alive < LifeCycle::Destroying);
        assert!(LifeCycle::Destroying < LifeCycle::Dead);
    }

    #[test]
    fn test_staged_take_clears() {
        let mut staged: Staged<u32> = Staged::default();
        staged.stage_create(3);
        staged.stage_create(1);
        staged.stage_destroy(2);
        assert!(staged.is_staged(1));

        let created: Vec<_> = staged.take_create().into_iter().collect();
        assert_eq!(created, vec![1, 3]);
        assert!(staged.take_create().is_empty());
        assert!(staged.is_staged(2));
    }
}
