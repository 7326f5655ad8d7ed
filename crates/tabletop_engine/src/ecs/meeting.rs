//! The `Meeting`: who's here, who's coming, who isn't
//!
//! Every system and manager is handed a `Meeting` at construction instead of
//! reaching for global state. Each manager's attendance is three-state:
//! present, pending (not wired in yet), or explicitly absent. Only explicit
//! absence of a required manager makes a system unhealthy; pending just
//! holds it in limbo.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::component::ComponentManager;
use super::context::Context;
use super::entity::EntityManager;
use super::error::EcsError;
use super::health::Health;
use super::identity::{ComponentId, EntityId};
use super::manager::ManagerSet;
use super::scheduler::SystemManager;
use super::tick::DebugFlag;
use super::time::TimeManager;
use crate::events::EventManager;

/// Is a manager at the meeting?
#[derive(Debug)]
pub enum Attendance<T> {
    /// Here
    Present(T),
    /// Not wired in yet
    Pending,
    /// Will never be here
    ExplicitlyAbsent,
}

impl<T> Default for Attendance<T> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<T: Clone> Clone for Attendance<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Present(value) => Self::Present(value.clone()),
            Self::Pending => Self::Pending,
            Self::ExplicitlyAbsent => Self::ExplicitlyAbsent,
        }
    }
}

impl<T> Attendance<T> {
    /// The manager, if present
    pub const fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Pending | Self::ExplicitlyAbsent => None,
        }
    }

    /// Health contribution of this attendance to someone who requires it
    pub const fn health(&self) -> Health {
        match self {
            Self::Present(_) => Health::Healthy,
            Self::Pending => Health::Pending,
            Self::ExplicitlyAbsent => Health::Unhealthy,
        }
    }
}

/// Manager references shared with every system.
///
/// While the engine dispatches a tick it holds the component, entity and
/// system managers, so [`with_components`](Self::with_components) and
/// [`with_entities`](Self::with_entities) return [`EcsError::ManagerBusy`]
/// from inside a system's update hooks. Systems reach those managers through
/// their [`SystemContext`](super::system::SystemContext) instead. Event
/// handlers run during a flush, outside dispatch, and may use the meeting.
#[derive(Debug, Clone, Default)]
pub struct Meeting {
    time: Attendance<Rc<RefCell<TimeManager>>>,
    event: Attendance<Rc<EventManager>>,
    component: Attendance<Rc<RefCell<ComponentManager>>>,
    entity: Attendance<Rc<RefCell<EntityManager>>>,
    system: Attendance<Weak<RefCell<SystemManager>>>,
    debug: DebugFlag,
}

impl Meeting {
    /// Start building a meeting. Every manager starts out pending.
    pub fn builder() -> MeetingBuilder {
        MeetingBuilder::default()
    }

    /// Health of the managers in `required`: the worst of their attendance.
    pub fn healthy(&self, required: ManagerSet) -> Health {
        let attendance = [
            (ManagerSet::TIME, self.time.health()),
            (ManagerSet::EVENT, self.event.health()),
            (ManagerSet::COMPONENT, self.component.health()),
            (ManagerSet::ENTITY, self.entity.health()),
            (ManagerSet::SYSTEM, self.system_health()),
        ];
        attendance
            .into_iter()
            .filter(|(manager, _)| required.contains(*manager))
            .fold(Health::Healthy, |health, (_, reading)| Health::worse(health, reading))
    }

    /// Debug flags
    pub const fn debug(&self) -> DebugFlag {
        self.debug
    }

    /// Is `flag` set?
    pub const fn debug_flagged(&self, flag: DebugFlag) -> bool {
        self.debug.contains(flag)
    }

    /// Time manager attendance
    pub const fn time(&self) -> &Attendance<Rc<RefCell<TimeManager>>> {
        &self.time
    }

    /// Event manager attendance
    pub const fn event(&self) -> &Attendance<Rc<EventManager>> {
        &self.event
    }

    /// Component manager attendance
    pub const fn component(&self) -> &Attendance<Rc<RefCell<ComponentManager>>> {
        &self.component
    }

    /// Entity manager attendance
    pub const fn entity(&self) -> &Attendance<Rc<RefCell<EntityManager>>> {
        &self.entity
    }

    /// Event manager, if present
    pub fn events(&self) -> Option<&Rc<EventManager>> {
        self.event.present()
    }

    /// System manager, if present and still alive
    pub fn systems(&self) -> Option<Rc<RefCell<SystemManager>>> {
        self.system.present().and_then(Weak::upgrade)
    }

    /// Run `f` with the time manager
    pub fn with_time<R>(&self, f: impl FnOnce(&TimeManager) -> R) -> Result<R, EcsError> {
        let time = Self::attending(&self.time, "TimeManager")?;
        let time = time.try_borrow().map_err(|_| EcsError::ManagerBusy("TimeManager"))?;
        Ok(f(&time))
    }

    /// Run `f` with the component manager, mutably
    pub fn with_components<R>(&self, f: impl FnOnce(&mut ComponentManager) -> R) -> Result<R, EcsError> {
        let components = Self::attending(&self.component, "ComponentManager")?;
        let mut components = components
            .try_borrow_mut()
            .map_err(|_| EcsError::ManagerBusy("ComponentManager"))?;
        Ok(f(&mut components))
    }

    /// Run `f` with the entity and component managers, mutably
    pub fn with_entities<R>(
        &self,
        f: impl FnOnce(&mut EntityManager, &mut ComponentManager) -> R,
    ) -> Result<R, EcsError> {
        let entities = Self::attending(&self.entity, "EntityManager")?;
        let components = Self::attending(&self.component, "ComponentManager")?;
        let mut entities = entities
            .try_borrow_mut()
            .map_err(|_| EcsError::ManagerBusy("EntityManager"))?;
        let mut components = components
            .try_borrow_mut()
            .map_err(|_| EcsError::ManagerBusy("ComponentManager"))?;
        Ok(f(&mut entities, &mut components))
    }

    /// Create a component with a registered factory and attach it to an
    /// entity.
    pub fn create_attach(
        &self,
        entity: EntityId,
        factory: &str,
        context: Option<&Context>,
    ) -> Result<ComponentId, EcsError> {
        self.with_entities(|entities, components| {
            if entities.get(entity).is_none() {
                return Err(EcsError::Entity(format!("cannot attach '{factory}' to unknown {entity}")));
            }
            let id = components.create_by_name(factory, context)?;
            entities.add(entity, &[id], components)?;
            Ok(id)
        })?
    }

    fn system_health(&self) -> Health {
        match &self.system {
            Attendance::Present(weak) if weak.strong_count() == 0 => Health::Pending,
            attendance => attendance.health(),
        }
    }

    fn attending<'a, T>(attendance: &'a Attendance<Rc<T>>, name: &'static str) -> Result<&'a Rc<T>, EcsError> {
        attendance.present().ok_or(EcsError::ManagerMissing(name))
    }
}

/// Builder for [`Meeting`]
#[derive(Debug, Default)]
pub struct MeetingBuilder {
    meeting: Meeting,
}

impl MeetingBuilder {
    /// Seat the time manager
    pub fn time(mut self, time: Rc<RefCell<TimeManager>>) -> Self {
        self.meeting.time = Attendance::Present(time);
        self
    }

    /// Seat the event manager
    pub fn event(mut self, event: Rc<EventManager>) -> Self {
        self.meeting.event = Attendance::Present(event);
        self
    }

    /// Seat the component manager
    pub fn component(mut self, component: Rc<RefCell<ComponentManager>>) -> Self {
        self.meeting.component = Attendance::Present(component);
        self
    }

    /// Seat the entity manager
    pub fn entity(mut self, entity: Rc<RefCell<EntityManager>>) -> Self {
        self.meeting.entity = Attendance::Present(entity);
        self
    }

    /// Seat the system manager. Held weakly; the engine owns it.
    pub fn system(mut self, system: &Rc<RefCell<SystemManager>>) -> Self {
        self.meeting.system = Attendance::Present(Rc::downgrade(system));
        self
    }

    /// Declare managers that will never attend
    pub fn absent(mut self, managers: ManagerSet) -> Self {
        if managers.contains(ManagerSet::TIME) {
            self.meeting.time = Attendance::ExplicitlyAbsent;
        }
        if managers.contains(ManagerSet::EVENT) {
            self.meeting.event = Attendance::ExplicitlyAbsent;
        }
        if managers.contains(ManagerSet::COMPONENT) {
            self.meeting.component = Attendance::ExplicitlyAbsent;
        }
        if managers.contains(ManagerSet::ENTITY) {
            self.meeting.entity = Attendance::ExplicitlyAbsent;
        }
        if managers.contains(ManagerSet::SYSTEM) {
            self.meeting.system = Attendance::ExplicitlyAbsent;
        }
        self
    }

    /// Set debug flags
    pub const fn debug(mut self, debug: DebugFlag) -> Self {
        self.meeting.debug = debug;
        self
    }

    /// Finish
    pub fn build(self) -> Meeting {
        self.meeting
    }
}
