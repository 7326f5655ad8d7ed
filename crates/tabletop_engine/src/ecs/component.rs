//! Components and the `ComponentManager`
//!
//! Components are plain data. The manager owns every component and walks
//! each one through the shared life cycle; entities only hold
//! [`ComponentId`]s. Don't hold on to `&Component` across ticks: keep the id
//! and ask the manager again.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use super::context::Context;
use super::error::EcsError;
use super::health::Health;
use super::identity::{ComponentId, IdGenerator};
use super::kind::Kind;
use super::life_cycle::{LifeCycle, Staged};
use super::manager::EcsManager;
use super::time::TimeManager;
use crate::events::{EventManager, Owner};

/// Life-cycle transitions of components. Tag is the new [`LifeCycle`].
pub const COMPONENT_LIFE_EVENT: Kind = Kind::root("ComponentLifeEvent");

/// Data a component carries.
///
/// ```
/// use tabletop_engine::ecs::component::ComponentData;
/// use tabletop_engine::ecs::kind::Kind;
///
/// #[derive(Debug)]
/// struct HitPoints {
///     current: i32,
///     max: i32,
/// }
///
/// impl ComponentData for HitPoints {
///     const KIND: Kind = Kind::root("HitPoints");
/// }
/// ```
pub trait ComponentData: Any + fmt::Debug {
    /// Kind of this component. May derive from a broader kind.
    const KIND: Kind;
}

/// Object-safe view of any [`ComponentData`].
pub trait DynComponent: fmt::Debug {
    /// Kind of this component
    fn kind(&self) -> Kind;
    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;
    /// Upcast for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ComponentData> DynComponent for T {
    fn kind(&self) -> Kind {
        T::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A component instance owned by the [`ComponentManager`].
///
/// Has no back-reference to the entity (or entities) using it.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    life_cycle: LifeCycle,
    data: Box<dyn DynComponent>,
}

impl Component {
    /// Component id
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Current life-cycle state
    pub const fn life_cycle(&self) -> LifeCycle {
        self.life_cycle
    }

    /// Only `Alive` components are enabled
    pub const fn enabled(&self) -> bool {
        self.life_cycle.is_enabled()
    }

    /// Kind of the carried data
    pub fn kind(&self) -> Kind {
        self.data.kind()
    }

    /// Carried data
    pub fn data(&self) -> &dyn DynComponent {
        self.data.as_ref()
    }

    /// Carried data as `T`, if it is one
    pub fn downcast_ref<T: ComponentData>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }

    /// Carried data as `T`, if it is one
    pub fn downcast_mut<T: ComponentData>(&mut self) -> Option<&mut T> {
        self.data.as_any_mut().downcast_mut::<T>()
    }
}

/// Builds a component from context data.
pub type ComponentFactory = Box<dyn Fn(Option<&Context>) -> Result<Box<dyn DynComponent>, EcsError>>;

/// Owns all components and manages their life cycles
pub struct ComponentManager {
    ids: IdGenerator<ComponentId>,
    staged: Staged<ComponentId>,
    by_id: BTreeMap<ComponentId, Component>,
    by_kind: HashMap<&'static str, BTreeSet<ComponentId>>,
    factories: HashMap<String, ComponentFactory>,
    events: Option<Rc<EventManager>>,
    health: Health,
}

impl fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManager")
            .field("components", &self.by_id.len())
            .field("factories", &self.factories.len())
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ComponentManager {
    /// Create a manager. Life-cycle events go to `events`, if given.
    pub fn new(events: Option<Rc<EventManager>>) -> Self {
        Self {
            ids: IdGenerator::new(),
            staged: Staged::default(),
            by_id: BTreeMap::new(),
            by_kind: HashMap::new(),
            factories: HashMap::new(),
            events,
            health: Health::Healthy,
        }
    }

    /// Create a component. It starts in `Creating` and becomes `Alive` at
    /// the next creation sweep.
    pub fn create<T: ComponentData>(&mut self, data: T) -> ComponentId {
        self.create_boxed(Box::new(data))
    }

    /// Create a component from already-boxed data
    pub fn create_boxed(&mut self, data: Box<dyn DynComponent>) -> ComponentId {
        let id = self.ids.next();
        let kind = data.kind();
        self.by_id.insert(
            id,
            Component {
                id,
                life_cycle: LifeCycle::Creating,
                data,
            },
        );
        self.by_kind.entry(kind.name()).or_default().insert(id);
        self.staged.stage_create(id);

        log::trace!("ComponentManager: created {} ({})", id, kind);
        self.life_event(id, LifeCycle::Creating);
        id
    }

    /// Register a named factory for [`create_by_name`](Self::create_by_name).
    /// Replaces any factory already under that name.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&Context>) -> Result<Box<dyn DynComponent>, EcsError> + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            log::warn!("ComponentManager: replaced component factory '{}'", name);
        }
    }

    /// Is a factory registered under `name`?
    pub fn has_factory(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Create a component with a registered factory
    pub fn create_by_name(&mut self, name: &str, context: Option<&Context>) -> Result<ComponentId, EcsError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EcsError::UnknownFactory(name.to_string()))?;
        let data = factory(context).map_err(|error| {
            log::error!("ComponentManager: factory '{}' failed: {}", name, error);
            EcsError::Component(format!("factory '{name}' failed: {error}"))
        })?;
        Ok(self.create_boxed(data))
    }

    /// Mark a component for destruction at the next destruction sweep.
    /// Unknown ids are ignored.
    pub fn destroy(&mut self, id: ComponentId) {
        let Some(component) = self.by_id.get_mut(&id) else {
            return;
        };
        component.life_cycle = LifeCycle::Destroying;
        self.staged.stage_destroy(id);

        log::trace!("ComponentManager: destroying {}", id);
        self.life_event(id, LifeCycle::Destroying);
    }

    /// Component by id, in any life-cycle state
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.by_id.get(&id)
    }

    /// Component by id, in any life-cycle state
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.by_id.get_mut(&id)
    }

    /// Typed data of a component, in any life-cycle state
    pub fn data<T: ComponentData>(&self, id: ComponentId) -> Option<&T> {
        self.get(id)?.downcast_ref::<T>()
    }

    /// Typed data of a component, in any life-cycle state
    pub fn data_mut<T: ComponentData>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.get_mut(id)?.downcast_mut::<T>()
    }

    /// Every component of `kind` and of each of its super-kinds, in that
    /// order.
    pub fn each_of_kind<'a>(&'a self, kind: &'a Kind) -> impl Iterator<Item = &'a Component> + 'a {
        kind.ancestry()
            .filter_map(|k| self.by_kind.get(k.name()))
            .flatten()
            .filter_map(|id| self.by_id.get(id))
    }

    /// Number of components in the pool, in any state
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Promote every staged component still `Creating` to `Alive`.
    pub fn creation(&mut self, time: &TimeManager) -> Health {
        for id in self.staged.take_create() {
            let Some(component) = self.by_id.get_mut(&id) else {
                continue;
            };
            if component.life_cycle != LifeCycle::Creating {
                continue;
            }
            component.life_cycle = LifeCycle::Alive;
            log::trace!("ComponentManager: {} alive (tick {})", id, time.tick_num());
            self.life_event(id, LifeCycle::Alive);
        }
        Health::Healthy
    }

    /// Evict every staged component that isn't `Alive`.
    pub fn destruction(&mut self, time: &TimeManager) -> Health {
        for id in self.staged.take_destroy() {
            match self.by_id.get(&id) {
                None => continue,
                Some(component) if component.life_cycle == LifeCycle::Alive => continue,
                Some(_) => {}
            }
            self.remove(id);
            log::trace!("ComponentManager: {} dead (tick {})", id, time.tick_num());
            self.life_event(id, LifeCycle::Dead);
        }
        Health::Healthy
    }

    fn remove(&mut self, id: ComponentId) {
        let Some(mut component) = self.by_id.remove(&id) else {
            return;
        };
        component.life_cycle = LifeCycle::Dead;
        let kind = component.kind();
        if let Some(ids) = self.by_kind.get_mut(kind.name()) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_kind.remove(kind.name());
            }
        }
    }

    fn life_event(&self, id: ComponentId, life_cycle: LifeCycle) {
        if let Some(events) = &self.events {
            events.create(
                COMPONENT_LIFE_EVENT,
                Owner::Component(id),
                life_cycle.event_tag(),
                None,
                false,
            );
        }
    }
}

impl EcsManager for ComponentManager {
    fn name(&self) -> &'static str {
        "ComponentManager"
    }

    fn health(&self) -> Health {
        self.health
    }

    fn apoptosis(&mut self) -> Health {
        let ids: Vec<ComponentId> = self.by_id.keys().copied().collect();
        for id in ids {
            self.destroy(id);
        }
        for id in self.staged.take_destroy() {
            self.remove(id);
            self.life_event(id, LifeCycle::Dead);
        }
        self.staged.clear();
        self.health = Health::Apoptosis;
        Health::Apoptosis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, Mailbox};

    const STAT: Kind = Kind::root("Stat");

    #[derive(Debug, PartialEq)]
    struct Strength(i32);

    impl ComponentData for Strength {
        const KIND: Kind = Kind::derived("Strength", &STAT);
    }

    #[derive(Debug)]
    struct Generic;

    impl ComponentData for Generic {
        const KIND: Kind = STAT;
    }

    #[derive(Debug)]
    struct Name(String);

    impl ComponentData for Name {
        const KIND: Kind = Kind::root("Name");
    }

    #[test]
    fn test_create_then_creation_sweep() {
        let time = TimeManager::default();
        let mut comps = ComponentManager::default();
        let id = comps.create(Strength(14));

        let component = comps.get(id).expect("exists");
        assert_eq!(component.life_cycle(), LifeCycle::Creating);
        assert!(!component.enabled());
        assert_eq!(component.kind(), Strength::KIND);

        comps.creation(&time);
        assert_eq!(comps.get(id).map(Component::life_cycle), Some(LifeCycle::Alive));
        assert_eq!(comps.data::<Strength>(id), Some(&Strength(14)));
        assert!(comps.data::<Name>(id).is_none());
    }

    #[test]
    fn test_destroy_then_destruction_sweep() {
        let time = TimeManager::default();
        let mut comps = ComponentManager::default();
        let id = comps.create(Strength(10));
        comps.creation(&time);

        comps.destroy(id);
        assert_eq!(comps.get(id).map(Component::life_cycle), Some(LifeCycle::Destroying));

        comps.destruction(&time);
        assert!(comps.get(id).is_none());
        assert!(comps.is_empty());
    }

    #[test]
    fn test_destroy_before_alive() {
        let time = TimeManager::default();
        let mut comps = ComponentManager::default();
        let id = comps.create(Strength(10));
        comps.destroy(id);

        // Creation skips it; destruction evicts it.
        comps.creation(&time);
        assert_eq!(comps.get(id).map(Component::life_cycle), Some(LifeCycle::Destroying));
        comps.destruction(&time);
        assert!(comps.get(id).is_none());
    }

    #[test]
    fn test_destroy_unknown_is_noop() {
        let time = TimeManager::default();
        let mut comps = ComponentManager::default();
        let id = comps.create(Strength(10));
        comps.creation(&time);

        comps.destroy(ComponentId::INVALID);
        comps.destruction(&time);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps.get(id).map(Component::life_cycle), Some(LifeCycle::Alive));
    }

    #[test]
    fn test_each_of_kind_walks_super_kinds() {
        let mut comps = ComponentManager::default();
        let strength = comps.create(Strength(12));
        let generic = comps.create(Generic);
        comps.create(Name("Jeff".to_string()));

        let ids: Vec<_> = comps.each_of_kind(&Strength::KIND).map(Component::id).collect();
        assert_eq!(ids, vec![strength, generic]);

        let ids: Vec<_> = comps.each_of_kind(&STAT).map(Component::id).collect();
        assert_eq!(ids, vec![generic]);
    }

    #[test]
    fn test_factory() {
        let mut comps = ComponentManager::default();
        comps.register_factory("strength", |ctx: Option<&Context>| {
            let value = ctx
                .and_then(|c| c.get("value"))
                .and_then(toml::Value::as_integer)
                .ok_or_else(|| EcsError::Component("missing 'value'".to_string()))?;
            let value = i32::try_from(value).map_err(|e| EcsError::Component(e.to_string()))?;
            Ok(Box::new(Strength(value)) as Box<dyn DynComponent>)
        });
        assert!(comps.has_factory("strength"));

        let ctx = Context::new("test").with("value", 16);
        let id = comps.create_by_name("strength", Some(&ctx)).expect("created");
        assert_eq!(comps.data::<Strength>(id), Some(&Strength(16)));

        assert!(matches!(comps.create_by_name("strength", None), Err(EcsError::Component(_))));
        assert!(matches!(comps.create_by_name("dexterity", None), Err(EcsError::UnknownFactory(_))));
    }

    #[test]
    fn test_life_events() {
        let time = TimeManager::default();
        let events = Rc::new(EventManager::new());
        let mailbox = Mailbox::new();
        events.subscribe(COMPONENT_LIFE_EVENT, mailbox.clone());

        let mut comps = ComponentManager::new(Some(Rc::clone(&events)));
        let id = comps.create(Strength(1));
        comps.creation(&time);
        comps.destroy(id);
        comps.destruction(&time);
        events.publish();

        let tags: Vec<_> = mailbox.drain().iter().map(Event::tag).collect();
        assert_eq!(
            tags,
            vec![
                LifeCycle::Creating.event_tag(),
                LifeCycle::Alive.event_tag(),
                LifeCycle::Destroying.event_tag(),
                LifeCycle::Dead.event_tag(),
            ]
        );
    }

    #[test]
    fn test_apoptosis_empties_pool() {
        let mut comps = ComponentManager::default();
        comps.create(Strength(1));
        comps.create(Name("Jill".to_string()));
        assert_eq!(comps.apoptosis(), Health::Apoptosis);
        assert!(comps.is_empty());
        assert_eq!(comps.each_of_kind(&STAT).count(), 0);
    }
}
