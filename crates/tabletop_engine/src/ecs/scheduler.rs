//! System scheduling
//!
//! The `SystemManager` owns every system and decides the order they run in.
//! Execution is single threaded and deterministic: the schedule is the set
//! of tracked systems sorted by priority (lower first), ties broken by id.
//! The schedule is rebuilt lazily, only when a creation or destruction sweep
//! has changed the set and a rescheduling tick comes around.
//!
//! Every system call is isolated. A returned error or a panic is caught,
//! logged and, unless `DebugFlag::RAISE_ERRORS` is set, the phase carries on
//! with the next system.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::component::ComponentManager;
use super::context::Context;
use super::entity::EntityManager;
use super::error::{EcsError, TickError};
use super::health::Health;
use super::identity::{IdGenerator, MonotonicId, SystemId};
use super::life_cycle::{LifeCycle, Staged};
use super::manager::EcsManager;
use super::meeting::Meeting;
use super::system::{System, SystemContext, SYSTEM_LIFE_EVENT};
use super::tick::{DebugFlag, SystemTick};
use super::time::TimeManager;
use crate::events::{EventManager, Owner};

struct SystemRecord {
    id: SystemId,
    name: &'static str,
    priority: i32,
    life_cycle: LifeCycle,
    subscribed: bool,
    system: Box<dyn System>,
}

/// Owns all systems, their life cycles and the execution order
pub struct SystemManager {
    ids: IdGenerator<SystemId>,
    staged: Staged<SystemId>,
    by_id: BTreeMap<SystemId, SystemRecord>,
    schedule: Vec<SystemId>,
    reschedule: bool,
    events: Option<Rc<EventManager>>,
    subscriptions_open: bool,
    debug: DebugFlag,
    health: Health,
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.by_id.values().map(|record| record.name).collect();
        f.debug_struct("SystemManager")
            .field("systems", &names)
            .field("schedule", &self.schedule)
            .field("reschedule", &self.reschedule)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Default for SystemManager {
    fn default() -> Self {
        Self::new(None, DebugFlag::empty())
    }
}

impl SystemManager {
    /// Create a manager. Life-cycle events go to `events`, if given.
    pub fn new(events: Option<Rc<EventManager>>, debug: DebugFlag) -> Self {
        Self {
            ids: IdGenerator::new(),
            staged: Staged::default(),
            by_id: BTreeMap::new(),
            schedule: Vec::new(),
            reschedule: false,
            events,
            subscriptions_open: false,
            debug,
            health: Health::Healthy,
        }
    }

    /// Build a system and start its life cycle.
    ///
    /// `build` receives the new system's id, the meeting and an optional
    /// context. The system is `Creating` until the next creation sweep.
    /// A second system with an existing name is rejected.
    pub fn create<S, F>(&mut self, meeting: &Meeting, context: Option<&Context>, build: F) -> Result<SystemId, EcsError>
    where
        S: System + 'static,
        F: FnOnce(SystemId, &Meeting, Option<&Context>) -> Result<S, EcsError>,
    {
        let id = self.ids.next();
        let system = build(id, meeting, context)?;
        self.insert(id, Box::new(system))
    }

    /// Start the life cycle of an already built system
    pub fn create_boxed(&mut self, system: Box<dyn System>) -> Result<SystemId, EcsError> {
        let id = self.ids.next();
        self.insert(id, system)
    }

    fn insert(&mut self, id: SystemId, system: Box<dyn System>) -> Result<SystemId, EcsError> {
        let name = system.name();
        if self.by_id.values().any(|record| record.name == name) {
            return Err(EcsError::DuplicateSystem(name.to_string()));
        }

        log::debug!("SystemManager: created {} '{}' (priority {})", id, name, system.priority());
        self.by_id.insert(
            id,
            SystemRecord {
                id,
                name,
                priority: system.priority(),
                life_cycle: LifeCycle::Creating,
                subscribed: false,
                system,
            },
        );
        self.staged.stage_create(id);
        self.life_event(id, LifeCycle::Creating);
        Ok(id)
    }

    /// Mark a system for destruction at the next destruction sweep.
    /// Unknown ids are ignored.
    pub fn destroy(&mut self, id: SystemId) {
        let Some(record) = self.by_id.get_mut(&id) else {
            return;
        };
        record.life_cycle = LifeCycle::Destroying;
        self.staged.stage_destroy(id);

        log::debug!("SystemManager: destroying {} '{}'", id, record.name);
        self.life_event(id, LifeCycle::Destroying);
    }

    /// Look up a system
    pub fn get(&self, id: SystemId) -> Option<&dyn System> {
        self.by_id.get(&id).map(|record| record.system.as_ref())
    }

    /// Look up a system mutably
    pub fn get_mut(&mut self, id: SystemId) -> Option<&mut (dyn System + 'static)> {
        self.by_id.get_mut(&id).map(|record| record.system.as_mut())
    }

    /// Find a system by name
    pub fn find(&self, name: &str) -> Option<SystemId> {
        self.by_id.values().find(|record| record.name == name).map(|record| record.id)
    }

    /// Life-cycle state of `id`. Evicted systems read as `Dead`, ids never
    /// handed out as `Invalid`.
    pub fn life_cycle(&self, id: SystemId) -> LifeCycle {
        match self.by_id.get(&id) {
            Some(record) => record.life_cycle,
            None if id.is_valid() && id <= self.ids.peek() => LifeCycle::Dead,
            None => LifeCycle::Invalid,
        }
    }

    /// Current execution order
    pub fn schedule(&self) -> &[SystemId] {
        &self.schedule
    }

    /// Number of tracked systems
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if there are no systems
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Let every alive system register its event subscriptions, and keep
    /// subscribing systems that come alive later.
    pub fn subscribe(&mut self, events: &EventManager) -> Result<Health, EcsError> {
        self.subscriptions_open = true;
        let mut health = Health::Healthy;
        for record in self.by_id.values_mut() {
            if record.life_cycle == LifeCycle::Alive {
                health = Health::worse(health, Self::subscribe_one(record, events)?);
            }
        }
        Ok(health)
    }

    fn subscribe_one(record: &mut SystemRecord, events: &EventManager) -> Result<Health, EcsError> {
        if record.subscribed {
            return Ok(Health::Healthy);
        }
        record.subscribed = true;
        log::trace!("SystemManager: subscribing {} '{}'", record.id, record.name);
        record.system.subscribe(events)
    }

    /// Promote every staged system still `Creating` to `Alive`.
    pub fn creation(&mut self, time: &TimeManager) -> Health {
        let mut health = Health::Healthy;
        for id in self.staged.take_create() {
            let Some(record) = self.by_id.get_mut(&id) else {
                continue;
            };
            if record.life_cycle != LifeCycle::Creating {
                continue;
            }
            record.life_cycle = LifeCycle::Alive;
            self.reschedule = true;
            log::debug!("SystemManager: {} '{}' alive (tick {})", id, record.name, time.tick_num());

            if self.subscriptions_open {
                if let Some(events) = self.events.clone() {
                    match Self::subscribe_one(record, &events) {
                        Ok(reading) => health = Health::worse(health, reading),
                        Err(err) => {
                            log::error!("SystemManager: {} '{}' failed to subscribe: {}", id, record.name, err);
                            health = Health::worse(health, Health::Unhealthy);
                        }
                    }
                }
            }
            self.life_event(id, LifeCycle::Alive);
        }
        health
    }

    /// Evict every staged system that isn't `Alive`.
    pub fn destruction(&mut self, time: &TimeManager) -> Health {
        for id in self.staged.take_destroy() {
            match self.by_id.get(&id) {
                None => continue,
                Some(record) if record.life_cycle == LifeCycle::Alive => continue,
                Some(_) => {}
            }
            if let Some(record) = self.by_id.remove(&id) {
                log::debug!("SystemManager: {} '{}' dead (tick {})", id, record.name, time.tick_num());
            }
            self.schedule.retain(|scheduled| *scheduled != id);
            self.reschedule = true;
            self.life_event(id, LifeCycle::Dead);
        }
        Health::Healthy
    }

    fn rebuild_schedule(&mut self) {
        let mut order: Vec<(i32, SystemId)> = self.by_id.values().map(|record| (record.priority, record.id)).collect();
        order.sort_unstable();
        self.schedule = order.into_iter().map(|(_, id)| id).collect();
        self.reschedule = false;
        log::trace!("SystemManager: rescheduled {} systems", self.schedule.len());
    }

    /// Run `tick` on every alive system that wants it, in schedule order.
    ///
    /// Returns the merged health of the systems that ran, or `Invalid` if
    /// none did. A failing system is logged and skipped; with
    /// `DebugFlag::RAISE_ERRORS` its error is returned instead.
    pub fn update(
        &mut self,
        tick: SystemTick,
        time: &TimeManager,
        components: &mut ComponentManager,
        entities: &mut EntityManager,
    ) -> Result<Health, EcsError> {
        let rescheduling = tick.has_any(SystemTick::RESCHEDULE_SYSTEMS) || !tick.has_any(SystemTick::TICKS_LIFE);
        if self.reschedule && rescheduling {
            self.rebuild_schedule();
        }

        let mut health = Health::Invalid;
        for index in 0..self.schedule.len() {
            let id = self.schedule[index];
            let Some(record) = self.by_id.get_mut(&id) else {
                continue;
            };
            if record.life_cycle != LifeCycle::Alive || !record.system.wants_update_tick(tick) {
                continue;
            }

            let mut ctx = SystemContext::new(tick, time, components, entities);
            let system = &mut record.system;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| system.update_tick(&mut ctx)))
                .unwrap_or_else(|payload| {
                    Err(TickError::Panicked {
                        system: record.name.to_string(),
                        tick: tick.name(),
                        message: panic_message(payload.as_ref()),
                    })
                });

            match outcome {
                Ok(reading) => health = Health::merge(health, reading),
                Err(err) => {
                    log::error!(
                        "SystemManager: {} '{}' failed {} on tick {}: {}",
                        id,
                        record.name,
                        tick.name(),
                        time.tick_num(),
                        err
                    );
                    if self.debug.contains(DebugFlag::RAISE_ERRORS) {
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(health)
    }

    /// Merged health of every alive system, including the attendance of the
    /// managers each one requires.
    pub fn health_check(&mut self, meeting: &Meeting) -> Health {
        let readings = self
            .by_id
            .values()
            .filter(|record| record.life_cycle == LifeCycle::Alive)
            .map(|record| {
                Health::worse(
                    record.system.health(),
                    meeting.healthy(record.system.required_managers()),
                )
            });
        self.health = Health::Healthy.update(readings);
        self.health
    }

    fn life_event(&self, id: SystemId, life_cycle: LifeCycle) {
        if let Some(events) = &self.events {
            events.create(
                SYSTEM_LIFE_EVENT,
                Owner::System(id),
                life_cycle.event_tag(),
                None,
                false,
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl EcsManager for SystemManager {
    fn name(&self) -> &'static str {
        "SystemManager"
    }

    fn health(&self) -> Health {
        self.health
    }

    fn apoptosis(&mut self) -> Health {
        for record in self.by_id.values_mut() {
            let reading = record.system.apoptosis();
            if reading != Health::Apoptosis {
                log::warn!("SystemManager: '{}' apoptosis reported {}", record.name, reading);
            }
        }
        let ids: Vec<SystemId> = self.by_id.keys().copied().collect();
        for id in ids {
            self.destroy(id);
        }
        for id in self.staged.take_destroy() {
            self.by_id.remove(&id);
            self.life_event(id, LifeCycle::Dead);
        }
        self.staged.clear();
        self.schedule.clear();
        self.reschedule = false;
        self.health = Health::Apoptosis;
        Health::Apoptosis
    }
}
