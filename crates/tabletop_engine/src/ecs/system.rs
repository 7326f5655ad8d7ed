//! The `System` trait and the per-tick context handed to systems
//!
//! A system declares the ticks it wants, the component kinds it acts on and
//! the managers it needs. The `SystemManager` calls [`System::update_tick`]
//! for each wanted tick; the default implementation forwards to one hook per
//! tick.

use super::component::ComponentManager;
use super::entity::{EntityManager, EntityView};
use super::error::{EcsError, TickError};
use super::health::Health;
use super::kind::Kind;
use super::manager::ManagerSet;
use super::tick::{SystemPriority, SystemTick};
use super::time::TimeManager;
use crate::events::EventManager;

/// Life-cycle transitions of systems. Tag is the new life cycle.
pub const SYSTEM_LIFE_EVENT: Kind = Kind::root("SystemLifeEvent");

/// What a system gets to work with for one tick
pub struct SystemContext<'a> {
    tick: SystemTick,
    time: &'a TimeManager,
    components: &'a mut ComponentManager,
    entities: &'a mut EntityManager,
}

impl<'a> SystemContext<'a> {
    /// Bundle the managers for a tick
    pub fn new(
        tick: SystemTick,
        time: &'a TimeManager,
        components: &'a mut ComponentManager,
        entities: &'a mut EntityManager,
    ) -> Self {
        Self {
            tick,
            time,
            components,
            entities,
        }
    }

    /// Tick being run
    pub const fn tick(&self) -> SystemTick {
        self.tick
    }

    /// Time manager
    pub const fn time(&self) -> &TimeManager {
        self.time
    }

    /// Component manager
    pub fn components(&self) -> &ComponentManager {
        &*self.components
    }

    /// Component manager, for creating and destroying
    pub fn components_mut(&mut self) -> &mut ComponentManager {
        &mut *self.components
    }

    /// Entity manager
    pub fn entities(&self) -> &EntityManager {
        &*self.entities
    }

    /// Both managers at once, for entity creation
    pub fn managers_mut(&mut self) -> (&mut ComponentManager, &mut EntityManager) {
        (&mut *self.components, &mut *self.entities)
    }

    /// Enabled entities with every one (`require_all`) or any one of `kinds`.
    pub fn wanted<'s>(&'s self, kinds: &'s [Kind], require_all: bool) -> Box<dyn Iterator<Item = EntityView<'s>> + 's> {
        if require_all {
            Box::new(self.entities.each_with(kinds, &*self.components))
        } else {
            Box::new(self.entities.each_with_any(kinds, &*self.components))
        }
    }
}

/// A game system.
///
/// Only [`name`](System::name) and [`ticks`](System::ticks) are required.
/// Override the hook for each tick listed in `ticks`; a wanted tick without
/// a hook fails with [`TickError::Unhandled`].
pub trait System {
    /// Unique, human-readable name
    fn name(&self) -> &'static str;

    /// Scheduling priority; lower runs earlier
    fn priority(&self) -> i32 {
        SystemPriority::LOW
    }

    /// Ticks this system runs on
    fn ticks(&self) -> SystemTick;

    /// Does this system run on `tick`?
    fn wants_update_tick(&self, tick: SystemTick) -> bool {
        self.ticks().has_any(tick)
    }

    /// Component kinds an entity needs for this system to act on it
    fn required(&self) -> &[Kind] {
        &[]
    }

    /// True if [`required`](System::required) means "all of these", false
    /// for "any of these"
    fn require_all(&self) -> bool {
        true
    }

    /// Managers this system can't be healthy without
    fn required_managers(&self) -> ManagerSet {
        ManagerSet::empty()
    }

    /// Current health
    fn health(&self) -> Health {
        Health::Healthy
    }

    /// Register life-long event subscriptions. Called once, during
    /// `MITOSIS` or right after creation if that has already passed.
    fn subscribe(&mut self, _events: &EventManager) -> Result<Health, EcsError> {
        Ok(Health::Healthy)
    }

    /// End of the game; release whatever the system holds.
    fn apoptosis(&mut self) -> Health {
        Health::Apoptosis
    }

    /// Run one tick. Forwards to the hook for `ctx.tick()`.
    fn update_tick(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        let tick = ctx.tick();
        if tick == SystemTick::SYNTHESIS {
            self.update_synthesis(ctx)
        } else if tick == SystemTick::MITOSIS {
            self.update_mitosis(ctx)
        } else if tick == SystemTick::TIME {
            self.update_time(ctx)
        } else if tick == SystemTick::CREATION {
            self.update_creation(ctx)
        } else if tick == SystemTick::PRE {
            self.update_pre(ctx)
        } else if tick == SystemTick::STANDARD {
            self.update(ctx)
        } else if tick == SystemTick::POST {
            self.update_post(ctx)
        } else if tick == SystemTick::DESTRUCTION {
            self.update_destruction(ctx)
        } else if tick == SystemTick::AUTOPHAGY {
            self.update_autophagy(ctx)
        } else if tick == SystemTick::APOPTOSIS {
            self.update_apoptosis(ctx)
        } else if tick == SystemTick::NECROSIS {
            self.update_necrosis(ctx)
        } else if tick == SystemTick::FUNERAL {
            self.update_funeral(ctx)
        } else {
            Err(self.unhandled(tick))
        }
    }

    /// Load what the system needs; may take several ticks
    fn update_synthesis(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// System-to-system set-up
    fn update_mitosis(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// Start of the game loop. The clock has just moved.
    fn update_time(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// New components and entities have just come alive
    fn update_creation(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// Just before the main work
    fn update_pre(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// Main work
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// Just after the main work
    fn update_post(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// End of the game loop; destruction sweeps follow
    fn update_destruction(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Err(self.unhandled(ctx.tick()))
    }

    /// Graceful shut-down; return `Autophagy` while still working on it
    fn update_autophagy(&mut self, _ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Ok(Health::AutophagySuccessful)
    }

    /// Forced shut-down; return `Apoptosis` while still working on it
    fn update_apoptosis(&mut self, _ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Ok(Health::ApoptosisDone)
    }

    /// Confirmed dead
    fn update_necrosis(&mut self, _ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Ok(Health::Necrosis)
    }

    /// Last tick ever
    fn update_funeral(&mut self, _ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        Ok(Health::Necrosis)
    }

    /// Error for a wanted tick with no hook
    fn unhandled(&self, tick: SystemTick) -> TickError {
        TickError::Unhandled {
            system: self.name().to_string(),
            tick: tick.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentData;

    #[derive(Debug)]
    struct Marker;
    impl ComponentData for Marker {
        const KIND: Kind = Kind::root("Marker");
    }

    struct Counter {
        required: Vec<Kind>,
        seen: usize,
    }

    impl System for Counter {
        fn name(&self) -> &'static str {
            "Counter"
        }

        fn ticks(&self) -> SystemTick {
            SystemTick::STANDARD | SystemTick::POST
        }

        fn required(&self) -> &[Kind] {
            &self.required
        }

        fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
            self.seen += ctx.wanted(&self.required, true).count();
            Ok(Health::Healthy)
        }
    }

    #[test]
    fn test_dispatch_to_hooks() {
        let time = TimeManager::default();
        let mut comps = ComponentManager::default();
        let mut ents = EntityManager::default();
        let marker = comps.create(Marker);
        ents.create("thing", &[marker], &comps);
        comps.creation(&time);
        ents.creation(&time);

        let mut system = Counter {
            required: vec![Marker::KIND],
            seen: 0,
        };
        assert!(system.wants_update_tick(SystemTick::STANDARD));
        assert!(!system.wants_update_tick(SystemTick::PRE));

        let mut ctx = SystemContext::new(SystemTick::STANDARD, &time, &mut comps, &mut ents);
        assert_eq!(system.update_tick(&mut ctx).ok(), Some(Health::Healthy));
        assert_eq!(system.seen, 1);

        // Wanted, but no hook.
        let mut ctx = SystemContext::new(SystemTick::POST, &time, &mut comps, &mut ents);
        assert!(matches!(
            system.update_tick(&mut ctx),
            Err(TickError::Unhandled { tick: "POST", .. })
        ));

        // Death hooks default to a clean shut-down.
        let mut ctx = SystemContext::new(SystemTick::FUNERAL, &time, &mut comps, &mut ents);
        assert_eq!(system.update_tick(&mut ctx).ok(), Some(Health::Necrosis));
    }
}
