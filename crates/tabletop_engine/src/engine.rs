//! The engine: owns one of each manager and drives the tick loop
//!
//! A run has three stages:
//!
//! 1. **Birth**: `SYNTHESIS`, then `MITOSIS`, each repeated until every
//!    system reports it is ready (bounded by a tick cap and a timeout).
//! 2. **Life**: [`Engine::tick`] over and over until [`Engine::stop`] is
//!    called or health becomes unrecoverable.
//! 3. **Death**: `AUTOPHAGY`, `APOPTOSIS`, `NECROSIS`, `FUNERAL`, then every
//!    manager is shut down in dependency order.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use thiserror::Error;

use crate::core::config::{ConfigError, Configuration};
use crate::ecs::component::ComponentManager;
use crate::ecs::context::Context;
use crate::ecs::entity::EntityManager;
use crate::ecs::error::EcsError;
use crate::ecs::health::Health;
use crate::ecs::identity::SystemId;
use crate::ecs::life_cycle::LifeCycle;
use crate::ecs::manager::EcsManager;
use crate::ecs::meeting::Meeting;
use crate::ecs::scheduler::SystemManager;
use crate::ecs::system::System;
use crate::ecs::tick::{tick_healthy, DebugFlag, SystemTick};
use crate::ecs::time::{LogMeter, TimeManager};
use crate::events::EventManager;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine can't be built without a configuration
    #[error("Engine requires a configuration")]
    MissingConfiguration,

    /// Configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Misuse of the ECS
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A tick failed and errors are being raised
    #[error("Tick {tick_num} failed: {source}")]
    Tick {
        /// Tick count when it failed
        tick_num: u64,
        /// What failed
        #[source]
        source: EcsError,
    },
}

/// Builder for [`Engine`]
#[derive(Debug, Default)]
pub struct EngineBuilder {
    configuration: Option<Configuration>,
    debug: DebugFlag,
}

impl EngineBuilder {
    /// Start with nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the configuration. Required.
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Add debug flags on top of the configured ones
    pub fn debug(mut self, debug: DebugFlag) -> Self {
        self.debug |= debug;
        self
    }

    /// Validate the configuration and wire up every manager.
    pub fn build(self) -> Result<Engine, EngineError> {
        let configuration = self.configuration.ok_or(EngineError::MissingConfiguration)?;
        configuration.validate()?;
        let debug = configuration.engine.debug_flags()? | self.debug;

        let time = Rc::new(RefCell::new(TimeManager::from_settings(&configuration.engine)?));
        let events = Rc::new(EventManager::new());
        let components = Rc::new(RefCell::new(ComponentManager::new(Some(Rc::clone(&events)))));
        let entities = Rc::new(RefCell::new(EntityManager::new(Some(Rc::clone(&events)))));
        let systems = Rc::new(RefCell::new(SystemManager::new(Some(Rc::clone(&events)), debug)));

        let meeting = Meeting::builder()
            .time(Rc::clone(&time))
            .event(Rc::clone(&events))
            .component(Rc::clone(&components))
            .entity(Rc::clone(&entities))
            .system(&systems)
            .debug(debug)
            .build();

        log::info!(
            "Engine: built (tick {}s, debug {:?})",
            configuration.engine.tick_seconds,
            debug
        );

        Ok(Engine {
            configuration,
            time,
            events,
            components,
            entities,
            systems,
            meeting,
            debug,
            life_cycle: LifeCycle::Creating,
            health: Health::Pending,
            stop: StopHandle::default(),
            meter: LogMeter::default(),
        })
    }
}

/// Shared stop request. Clone it into a system to let the system end the
/// game.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    /// Ask the engine to stop at the top of its next tick
    pub fn stop(&self) {
        self.0.set(true);
    }

    /// Has a stop been requested?
    pub fn is_stopped(&self) -> bool {
        self.0.get()
    }
}

/// The tabletop engine
#[derive(Debug)]
pub struct Engine {
    configuration: Configuration,
    time: Rc<RefCell<TimeManager>>,
    events: Rc<EventManager>,
    components: Rc<RefCell<ComponentManager>>,
    entities: Rc<RefCell<EntityManager>>,
    systems: Rc<RefCell<SystemManager>>,
    meeting: Meeting,
    debug: DebugFlag,
    life_cycle: LifeCycle,
    health: Health,
    stop: StopHandle,
    meter: LogMeter,
}

impl Engine {
    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The configuration the engine was built from
    pub const fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Manager references, as handed to systems
    pub const fn meeting(&self) -> &Meeting {
        &self.meeting
    }

    /// The event bus
    pub const fn events(&self) -> &Rc<EventManager> {
        &self.events
    }

    /// Debug flags in effect
    pub const fn debug(&self) -> DebugFlag {
        self.debug
    }

    /// The engine's own life-cycle state
    pub const fn life_cycle(&self) -> LifeCycle {
        self.life_cycle
    }

    /// Health as of the last tick
    pub const fn engine_health(&self) -> Health {
        self.health
    }

    /// Ticks stepped so far
    pub fn tick_num(&self) -> u64 {
        self.time.try_borrow().map_or(0, |time| time.tick_num())
    }

    /// A handle that can stop the engine from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop at the top of the next tick
    pub fn stop(&self) {
        log::info!("Engine: stop requested");
        self.stop.stop();
    }

    /// Has a stop been requested?
    pub fn should_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    // -------------------------------------------------------------------------
    // Game objects
    // -------------------------------------------------------------------------

    /// Create a system. `build` gets the new id, the meeting and `context`.
    pub fn create_system<S, F>(&self, context: Option<&Context>, build: F) -> Result<SystemId, EngineError>
    where
        S: System + 'static,
        F: FnOnce(SystemId, &Meeting, Option<&Context>) -> Result<S, EcsError>,
    {
        let mut systems = borrow_mut(&self.systems, "SystemManager")?;
        Ok(systems.create(&self.meeting, context, build)?)
    }

    /// Mark a system for destruction
    pub fn destroy_system(&self, id: SystemId) -> Result<(), EngineError> {
        borrow_mut(&self.systems, "SystemManager")?.destroy(id);
        Ok(())
    }

    /// Run `f` with the component manager
    pub fn with_components<R>(&self, f: impl FnOnce(&mut ComponentManager) -> R) -> Result<R, EngineError> {
        Ok(self.meeting.with_components(f)?)
    }

    /// Run `f` with the entity and component managers
    pub fn with_entities<R>(
        &self,
        f: impl FnOnce(&mut EntityManager, &mut ComponentManager) -> R,
    ) -> Result<R, EngineError> {
        Ok(self.meeting.with_entities(f)?)
    }

    /// Run `f` with the system manager
    pub fn with_systems<R>(&self, f: impl FnOnce(&mut SystemManager) -> R) -> Result<R, EngineError> {
        let mut systems = borrow_mut(&self.systems, "SystemManager")?;
        Ok(f(&mut systems))
    }

    // -------------------------------------------------------------------------
    // Running
    // -------------------------------------------------------------------------

    /// Birth, life until stopped, then death. Returns the final health.
    pub fn run(&mut self) -> Result<Health, EngineError> {
        let born = self.run_birth()?;
        if born.in_best_health() {
            while !self.should_stop() {
                self.tick()?;
            }
        } else {
            log::error!("Engine: birth ended in {}; skipping straight to death", born);
        }
        self.run_death()
    }

    /// Run the birth ticks. Returns the health the engine was born with.
    pub fn run_birth(&mut self) -> Result<Health, EngineError> {
        log::info!("Engine: birth");
        let max_ticks = self.configuration.engine.max_birth_ticks;

        let mut health = Health::Healthy;
        for tick in [SystemTick::SYNTHESIS, SystemTick::MITOSIS] {
            borrow_mut(&self.time, "TimeManager")?.start_timeout(TimeManager::DEFAULT_TIMER);
            if tick == SystemTick::MITOSIS {
                let reading = borrow_mut(&self.systems, "SystemManager")?.subscribe(&self.events)?;
                health = Health::worse(Health::Healthy, reading);
            }

            let mut attempts = 0;
            loop {
                attempts += 1;
                health = Health::merge(health, self.guarded(tick, Self::birth_tick)?);
                health = Health::merge(health, self.check_health()?);

                if health.in_best_health() {
                    break;
                }
                if !tick_healthy(tick, health) {
                    log::error!("Engine: {} failed with {}", tick.name(), health);
                    self.health = health;
                    return Ok(health);
                }
                if attempts >= max_ticks || self.birth_timed_out()? || self.should_stop() {
                    log::warn!(
                        "Engine: {} gave up after {} tick(s) in {}",
                        tick.name(),
                        attempts,
                        health
                    );
                    self.health = health;
                    return Ok(health);
                }
                health = Health::Healthy;
            }
        }

        borrow_mut(&self.time, "TimeManager")?.end_timeout(TimeManager::DEFAULT_TIMER);
        self.life_cycle = LifeCycle::Alive;
        self.health = health;
        log::info!("Engine: alive");
        Ok(health)
    }

    fn birth_timed_out(&self) -> Result<bool, EcsError> {
        Ok(borrow(&self.time, "TimeManager")?.is_timed_out(TimeManager::DEFAULT_TIMER, None))
    }

    fn birth_tick(&self, tick: SystemTick) -> Result<Health, EcsError> {
        let mut health = self.creation_sweeps(true)?;
        health = Health::merge(health, self.dispatch(tick)?);
        Ok(Health::merge(health, self.flush(tick)?))
    }

    /// Run one life tick: every life phase in order, then the health check.
    /// Returns the engine's health afterward.
    pub fn tick(&mut self) -> Result<Health, EngineError> {
        if self.should_stop() {
            return Ok(self.health);
        }

        let tick_health = self.guarded(SystemTick::TIME, Self::life_tick)?;
        let health = Health::merge(tick_health, self.check_health()?);
        self.health = health;

        if !health.in_best_health() {
            let time = borrow(&self.time, "TimeManager")?;
            if time.metered(&mut self.meter) {
                log::warn!("Engine: degraded health {} at tick {}", health, time.tick_num());
            }
        }
        if health.should_die() {
            log::error!("Engine: health {} is unrecoverable; stopping", health);
            self.stop();
        }
        Ok(health)
    }

    fn life_tick(&self, _tick: SystemTick) -> Result<Health, EcsError> {
        let now = borrow_mut(&self.time, "TimeManager")?.step();
        if self.debug.contains(DebugFlag::LOG_TICK) {
            log::debug!("Engine: tick {} at {:?} in-fiction", self.tick_num(), now);
        }

        let mut health = Health::Invalid;
        for tick in SystemTick::LIFE_ORDER {
            if tick == SystemTick::TIME {
                health = Health::merge(health, self.system_creation_sweep()?);
            } else if tick == SystemTick::CREATION {
                health = Health::merge(health, self.creation_sweeps(false)?);
            } else if tick == SystemTick::DESTRUCTION {
                health = Health::merge(health, self.destruction_sweeps()?);
            }
            health = Health::merge(health, self.dispatch(tick)?);
            health = Health::merge(health, self.flush(tick)?);
        }
        Ok(health)
    }

    /// Run the death ticks, then shut every manager down. Returns the final
    /// health: `Necrosis` for a clean funeral.
    pub fn run_death(&mut self) -> Result<Health, EngineError> {
        log::info!("Engine: death");
        self.life_cycle = LifeCycle::Destroying;
        let max_ticks = self.configuration.engine.max_death_ticks;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let health = self.guarded(SystemTick::AUTOPHAGY, Self::death_tick)?;
            if health != Health::Autophagy {
                break;
            }
            if attempts >= max_ticks {
                log::warn!("Engine: autophagy still running after {} tick(s); forcing apoptosis", attempts);
                break;
            }
        }

        let apoptosis = self.guarded(SystemTick::APOPTOSIS, Self::death_tick)?;
        if !tick_healthy(SystemTick::APOPTOSIS, apoptosis) {
            log::warn!("Engine: apoptosis tick reported {}", apoptosis);
        }
        let necrosis = self.guarded(SystemTick::NECROSIS, Self::death_tick)?;
        if !tick_healthy(SystemTick::NECROSIS, necrosis) {
            log::warn!("Engine: necrosis tick reported {}", necrosis);
        }
        let funeral = Health::Necrosis.update([self.guarded(SystemTick::FUNERAL, Self::death_tick)?]);
        if !tick_healthy(SystemTick::FUNERAL, funeral) {
            log::error!("Engine: funeral reported {} instead of {}", funeral, Health::Necrosis);
        }

        self.apoptosis()?;
        self.life_cycle = LifeCycle::Dead;
        self.health = funeral;
        log::info!("Engine: dead ({})", funeral);
        Ok(funeral)
    }

    fn death_tick(&self, tick: SystemTick) -> Result<Health, EcsError> {
        let health = self.dispatch(tick)?;
        self.flush(tick)?;
        Ok(health)
    }

    /// Shut down every manager in dependency order: time, events,
    /// components, entities, systems.
    pub fn apoptosis(&mut self) -> Result<Health, EngineError> {
        let readings = [
            ("TimeManager", borrow_mut(&self.time, "TimeManager")?.apoptosis()),
            ("EventManager", self.events.shut_down()),
            ("ComponentManager", borrow_mut(&self.components, "ComponentManager")?.apoptosis()),
            ("EntityManager", borrow_mut(&self.entities, "EntityManager")?.apoptosis()),
            ("SystemManager", borrow_mut(&self.systems, "SystemManager")?.apoptosis()),
        ];

        let mut health = Health::Apoptosis;
        for (name, reading) in readings {
            if reading != Health::Apoptosis {
                log::error!("Engine: {} apoptosis reported {}", name, reading);
                health = Health::worse(health, reading);
            }
        }
        Ok(health)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Run one phase, logging a failure and re-raising it only under
    /// `RAISE_ERRORS`.
    fn guarded(
        &self,
        tick: SystemTick,
        phase: fn(&Self, SystemTick) -> Result<Health, EcsError>,
    ) -> Result<Health, EngineError> {
        match phase(self, tick) {
            Ok(health) => Ok(health),
            Err(source) => {
                let tick_num = self.tick_num();
                log::error!("Engine: {} failed at tick {}: {}", tick.name(), tick_num, source);
                if self.debug.contains(DebugFlag::RAISE_ERRORS) {
                    Err(EngineError::Tick { tick_num, source })
                } else {
                    Ok(Health::Invalid)
                }
            }
        }
    }

    fn dispatch(&self, tick: SystemTick) -> Result<Health, EcsError> {
        {
            let mut time = borrow_mut(&self.time, "TimeManager")?;
            time.set_tick(tick);
            time.set_next_tick(following(tick));
        }
        if self.debug.contains(DebugFlag::LOG_TICK) {
            log::trace!("Engine: dispatching {}", tick.name());
        }

        let time = borrow(&self.time, "TimeManager")?;
        let mut components = borrow_mut(&self.components, "ComponentManager")?;
        let mut entities = borrow_mut(&self.entities, "EntityManager")?;
        let mut systems = borrow_mut(&self.systems, "SystemManager")?;
        systems.update(tick, &time, &mut components, &mut entities)
    }

    fn flush(&self, tick: SystemTick) -> Result<Health, EcsError> {
        let time = borrow(&self.time, "TimeManager")?;
        Ok(self.events.update(tick, &time))
    }

    fn system_creation_sweep(&self) -> Result<Health, EcsError> {
        let time = borrow(&self.time, "TimeManager")?;
        Ok(borrow_mut(&self.systems, "SystemManager")?.creation(&time))
    }

    fn creation_sweeps(&self, include_systems: bool) -> Result<Health, EcsError> {
        let mut health = Health::Invalid;
        if include_systems {
            health = self.system_creation_sweep()?;
        }
        let time = borrow(&self.time, "TimeManager")?;
        let components = borrow_mut(&self.components, "ComponentManager")?.creation(&time);
        let entities = borrow_mut(&self.entities, "EntityManager")?.creation(&time);
        Ok(health.update([components, entities]))
    }

    fn destruction_sweeps(&self) -> Result<Health, EcsError> {
        let time = borrow(&self.time, "TimeManager")?;
        let components = borrow_mut(&self.components, "ComponentManager")?.destruction(&time);
        let entities = borrow_mut(&self.entities, "EntityManager")?.destruction(&time);
        let systems = borrow_mut(&self.systems, "SystemManager")?.destruction(&time);
        Ok(Health::Invalid.update([components, entities, systems]))
    }

    fn check_health(&self) -> Result<Health, EcsError> {
        let systems = borrow_mut(&self.systems, "SystemManager")?.health_check(&self.meeting);
        let managers = [
            borrow(&self.time, "TimeManager")?.health(),
            self.events.health(),
            borrow(&self.components, "ComponentManager")?.health(),
            borrow(&self.entities, "EntityManager")?.health(),
        ];
        Ok(systems.update(managers))
    }
}

/// The tick expected after `tick`.
fn following(tick: SystemTick) -> SystemTick {
    const ORDER: [SystemTick; 12] = [
        SystemTick::SYNTHESIS,
        SystemTick::MITOSIS,
        SystemTick::TIME,
        SystemTick::CREATION,
        SystemTick::PRE,
        SystemTick::STANDARD,
        SystemTick::POST,
        SystemTick::DESTRUCTION,
        SystemTick::AUTOPHAGY,
        SystemTick::APOPTOSIS,
        SystemTick::NECROSIS,
        SystemTick::FUNERAL,
    ];
    if tick == SystemTick::DESTRUCTION {
        return SystemTick::TIME;
    }
    ORDER
        .iter()
        .position(|candidate| *candidate == tick)
        .and_then(|index| ORDER.get(index + 1))
        .copied()
        .unwrap_or(SystemTick::empty())
}

fn borrow<'a, T>(cell: &'a RefCell<T>, name: &'static str) -> Result<Ref<'a, T>, EcsError> {
    cell.try_borrow().map_err(|_| EcsError::ManagerBusy(name))
}

fn borrow_mut<'a, T>(cell: &'a RefCell<T>, name: &'static str) -> Result<RefMut<'a, T>, EcsError> {
    cell.try_borrow_mut().map_err(|_| EcsError::ManagerBusy(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineSettings;

    #[test]
    fn test_configuration_required() {
        assert!(matches!(
            Engine::builder().build(),
            Err(EngineError::MissingConfiguration)
        ));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let settings = EngineSettings::new().with_tick_seconds(-1.0);
        let result = Engine::builder()
            .configuration(Configuration::new().with_engine(settings))
            .build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_oversized_tick_rejected() {
        let settings = EngineSettings::new().with_tick_seconds(1e30);
        let result = Engine::builder()
            .configuration(Configuration::new().with_engine(settings))
            .build();
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_debug_flags_combine() {
        let settings = EngineSettings::new().with_debug(DebugFlag::LOG_TICK);
        let engine = Engine::builder()
            .configuration(Configuration::new().with_engine(settings))
            .debug(DebugFlag::RAISE_ERRORS)
            .build()
            .unwrap();
        assert_eq!(engine.debug(), DebugFlag::UNIT_TESTS);
        assert!(engine.meeting().debug_flagged(DebugFlag::RAISE_ERRORS));
    }

    #[test]
    fn test_empty_engine_lives_and_dies() {
        let mut engine = Engine::builder().configuration(Configuration::new()).build().unwrap();
        assert_eq!(engine.life_cycle(), LifeCycle::Creating);

        assert_eq!(engine.run_birth().unwrap(), Health::Healthy);
        assert_eq!(engine.life_cycle(), LifeCycle::Alive);

        assert_eq!(engine.tick().unwrap(), Health::Healthy);
        assert_eq!(engine.tick().unwrap(), Health::Healthy);
        assert_eq!(engine.tick_num(), 2);

        engine.stop();
        assert_eq!(engine.tick().unwrap(), Health::Healthy);
        assert_eq!(engine.tick_num(), 2);

        assert_eq!(engine.run_death().unwrap(), Health::Necrosis);
        assert_eq!(engine.life_cycle(), LifeCycle::Dead);
    }

    #[test]
    fn test_following_ticks() {
        assert_eq!(following(SystemTick::SYNTHESIS), SystemTick::MITOSIS);
        assert_eq!(following(SystemTick::MITOSIS), SystemTick::TIME);
        assert_eq!(following(SystemTick::DESTRUCTION), SystemTick::TIME);
        assert_eq!(following(SystemTick::NECROSIS), SystemTick::FUNERAL);
        assert_eq!(following(SystemTick::FUNERAL), SystemTick::empty());
    }
}
