//! The contract every ECS manager implements

use bitflags::bitflags;

use super::health::Health;

/// Minimal manager interface: report health, accept shut-down.
pub trait EcsManager {
    /// Manager name, for logs
    fn name(&self) -> &'static str;

    /// Current health
    fn health(&self) -> Health;

    /// End-of-game shut-down. Releases everything the manager owns and
    /// returns `Health::Apoptosis` once it has.
    fn apoptosis(&mut self) -> Health;
}

bitflags! {
    /// A set of managers, e.g. the ones a system needs to be healthy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ManagerSet: u8 {
        /// `TimeManager`
        const TIME      = 1 << 0;
        /// `EventManager`
        const EVENT     = 1 << 1;
        /// `ComponentManager`
        const COMPONENT = 1 << 2;
        /// `EntityManager`
        const ENTITY    = 1 << 3;
        /// `SystemManager`
        const SYSTEM    = 1 << 4;
    }
}
