//! Monotonic identifiers for components, entities and systems
//!
//! Each id kind has its own generator. Ids start at 1, increase by one per
//! allocation and are never reused. `0` is the invalid sentinel.

use std::fmt;
use std::marker::PhantomData;

/// Common behaviour of the monotonic id newtypes.
pub trait MonotonicId: Copy + Eq + Ord + std::hash::Hash + fmt::Debug + fmt::Display {
    /// The "no id" sentinel
    const INVALID: Self;

    /// Wrap a raw value
    fn from_raw(raw: u64) -> Self;

    /// Raw value
    fn raw(self) -> u64;

    /// True for anything but [`INVALID`](Self::INVALID)
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! monotonic_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// The "no id" sentinel
            pub const INVALID: Self = Self(0);

            /// Raw value
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl MonotonicId for $name {
            const INVALID: Self = Self(0);

            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            fn raw(self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0 == 0 {
                    write!(f, "{}:INVALID", stringify!($name))
                } else {
                    write!(f, "{}:{:03}", stringify!($name), self.0)
                }
            }
        }
    };
}

monotonic_id!(
    /// Handle to a component owned by the `ComponentManager`
    ComponentId
);
monotonic_id!(
    /// Handle to an entity owned by the `EntityManager`
    EntityId
);
monotonic_id!(
    /// Handle to a system owned by the `SystemManager`
    SystemId
);

/// Hands out strictly increasing ids of one kind.
#[derive(Debug)]
pub struct IdGenerator<I: MonotonicId> {
    last: u64,
    _kind: PhantomData<I>,
}

impl<I: MonotonicId> Default for IdGenerator<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MonotonicId> IdGenerator<I> {
    /// Create a generator whose first id will be 1
    pub const fn new() -> Self {
        Self {
            last: 0,
            _kind: PhantomData,
        }
    }

    /// Allocate the next id
    pub fn next(&mut self) -> I {
        self.last += 1;
        I::from_raw(self.last)
    }

    /// Last id handed out, or `INVALID` if none yet
    pub fn peek(&self) -> I {
        I::from_raw(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let mut gen: IdGenerator<EntityId> = IdGenerator::new();
        assert_eq!(gen.peek(), EntityId::INVALID);

        let a = gen.next();
        let b = gen.next();
        assert!(a.is_valid());
        assert!(b > a);
        assert_eq!(a.raw(), 1);
        assert_eq!(gen.peek(), b);
    }

    #[test]
    fn test_generators_are_independent() {
        let mut comps: IdGenerator<ComponentId> = IdGenerator::new();
        let mut systems: IdGenerator<SystemId> = IdGenerator::new();
        comps.next();
        comps.next();
        assert_eq!(systems.next().raw(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityId::from_raw(3).to_string(), "EntityId:003");
        assert_eq!(ComponentId::INVALID.to_string(), "ComponentId:INVALID");
        assert!(!SystemId::default().is_valid());
    }
}
