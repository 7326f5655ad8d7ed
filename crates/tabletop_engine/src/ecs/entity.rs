//! Entities and the `EntityManager`
//!
//! An entity is an id, a type tag and a map from component kind to
//! [`ComponentId`]. It owns none of its components; lookups go through an
//! [`EntityView`] that pairs the entity with the `ComponentManager`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::component::{Component, ComponentData, ComponentManager};
use super::error::EcsError;
use super::health::Health;
use super::identity::{ComponentId, EntityId, IdGenerator};
use super::kind::Kind;
use super::life_cycle::{LifeCycle, Staged};
use super::manager::EcsManager;
use super::time::TimeManager;
use crate::events::{EventManager, Owner};

/// Life-cycle transitions of entities. Tag is the new [`LifeCycle`].
pub const ENTITY_LIFE_EVENT: Kind = Kind::root("EntityLifeEvent");
/// Components attached to or detached from an entity. Tag is an
/// [`EntityEventType`].
pub const ENTITY_EVENT: Kind = Kind::derived("EntityEvent", &ENTITY_LIFE_EVENT);

/// What happened to an entity's components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventType {
    /// Component(s) attached
    ComponentAttach,
    /// Component(s) detached
    ComponentDetach,
}

impl EntityEventType {
    /// Tag used on [`ENTITY_EVENT`]s
    pub const fn event_tag(self) -> i64 {
        match self {
            Self::ComponentAttach => 10,
            Self::ComponentDetach => 11,
        }
    }
}

/// Coarse classification of an entity, e.g. `"player"` or `"monster"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(String);

impl EntityType {
    /// Create a type tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to ask an entity for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKey {
    /// The component of this kind (or of a kind derived from it)
    Kind(Kind),
    /// This exact component, if the entity has it
    Id(ComponentId),
}

impl From<Kind> for ComponentKey {
    fn from(kind: Kind) -> Self {
        Self::Kind(kind)
    }
}

impl From<ComponentId> for ComponentKey {
    fn from(id: ComponentId) -> Self {
        Self::Id(id)
    }
}

/// An entity: a named bundle of component references
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    entity_type: EntityType,
    life_cycle: LifeCycle,
    components: BTreeMap<&'static str, ComponentId>,
}

impl Entity {
    /// Entity id
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Type tag
    pub const fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Current life-cycle state
    pub const fn life_cycle(&self) -> LifeCycle {
        self.life_cycle
    }

    /// Only `Alive` entities show up in queries
    pub const fn enabled(&self) -> bool {
        self.life_cycle.is_enabled()
    }

    /// Id of the component of exactly `kind`, if attached
    pub fn component_id(&self, kind: &Kind) -> Option<ComponentId> {
        self.components.get(kind.name()).copied()
    }

    /// Every attached component id
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.values().copied()
    }

    /// Is this component attached?
    pub fn owns(&self, id: ComponentId) -> bool {
        self.components.values().any(|owned| *owned == id)
    }

    /// Pair with a component manager for lookups
    pub const fn view<'a>(&'a self, components: &'a ComponentManager) -> EntityView<'a> {
        EntityView {
            entity: self,
            components,
        }
    }

    fn attach(&mut self, component: &Component) -> Option<ComponentId> {
        let kind = component.kind();
        let previous = self.components.insert(kind.name(), component.id());
        if let Some(previous) = previous.filter(|prev| *prev != component.id()) {
            log::warn!(
                "{}: already had a '{}' component ({}); replaced with {}",
                self.id,
                kind,
                previous,
                component.id()
            );
        }
        previous
    }
}

/// An entity plus the component manager, for component lookups.
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'a> {
    entity: &'a Entity,
    components: &'a ComponentManager,
}

impl<'a> EntityView<'a> {
    /// The entity
    pub const fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// Entity id
    pub const fn id(&self) -> EntityId {
        self.entity.id
    }

    /// Enabled component for `key`
    pub fn get(&self, key: impl Into<ComponentKey>) -> Option<&'a Component> {
        self.get_with(key, false)
    }

    /// Component for `key`.
    ///
    /// A kind key checks the entity's own map first, then falls back to any
    /// attached component whose kind derives from the requested one. Either
    /// way the component must belong to this entity. Disabled (not `Alive`)
    /// components are hidden unless `allow_disabled`.
    pub fn get_with(&self, key: impl Into<ComponentKey>, allow_disabled: bool) -> Option<&'a Component> {
        let found = match key.into() {
            ComponentKey::Id(id) => self
                .entity
                .owns(id)
                .then(|| self.components.get(id))
                .flatten(),
            ComponentKey::Kind(kind) => self
                .entity
                .component_id(&kind)
                .and_then(|id| self.components.get(id))
                .or_else(|| {
                    self.entity
                        .component_ids()
                        .filter_map(|id| self.components.get(id))
                        .find(|component| component.kind().is_a(&kind))
                }),
        }?;

        (allow_disabled || found.enabled()).then_some(found)
    }

    /// Typed data of the enabled component of kind `T::KIND`
    pub fn data<T: ComponentData>(&self) -> Option<&'a T> {
        self.get(T::KIND)?.downcast_ref::<T>()
    }

    /// True iff every kind resolves to an enabled component
    pub fn contains(&self, kinds: &[Kind]) -> bool {
        kinds.iter().all(|kind| self.get(*kind).is_some())
    }

    /// True iff any kind resolves to an enabled component
    pub fn contains_any(&self, kinds: &[Kind]) -> bool {
        kinds.iter().any(|kind| self.get(*kind).is_some())
    }
}

/// Owns all entities and manages their life cycles
#[derive(Debug)]
pub struct EntityManager {
    ids: IdGenerator<EntityId>,
    staged: Staged<EntityId>,
    by_id: BTreeMap<EntityId, Entity>,
    events: Option<Rc<EventManager>>,
    health: Health,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EntityManager {
    /// Create a manager. Life-cycle events go to `events`, if given.
    pub fn new(events: Option<Rc<EventManager>>) -> Self {
        Self {
            ids: IdGenerator::new(),
            staged: Staged::default(),
            by_id: BTreeMap::new(),
            events,
            health: Health::Healthy,
        }
    }

    /// Create an entity with initial components. It starts in `Creating` and
    /// becomes `Alive` at the next creation sweep. Unknown component ids are
    /// skipped with a warning.
    pub fn create(
        &mut self,
        entity_type: impl Into<EntityType>,
        components: &[ComponentId],
        component_manager: &ComponentManager,
    ) -> EntityId {
        let id = self.ids.next();
        let mut entity = Entity {
            id,
            entity_type: entity_type.into(),
            life_cycle: LifeCycle::Creating,
            components: BTreeMap::new(),
        };
        for cid in components {
            match component_manager.get(*cid) {
                Some(component) => {
                    entity.attach(component);
                }
                None => log::warn!("EntityManager: {} created without unknown {}", id, cid),
            }
        }

        log::trace!("EntityManager: created {} '{}'", id, entity.entity_type);
        self.by_id.insert(id, entity);
        self.staged.stage_create(id);
        self.life_event(id, LifeCycle::Creating);
        id
    }

    /// Mark an entity for destruction at the next destruction sweep.
    /// Unknown ids are ignored. Its components are left to their owner.
    pub fn destroy(&mut self, id: EntityId) {
        let Some(entity) = self.by_id.get_mut(&id) else {
            return;
        };
        entity.life_cycle = LifeCycle::Destroying;
        self.staged.stage_destroy(id);

        log::trace!("EntityManager: destroying {}", id);
        self.life_event(id, LifeCycle::Destroying);
    }

    /// Entity by id, in any life-cycle state
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.by_id.get(&id)
    }

    /// Attach components to an entity. A second component of an already
    /// attached kind replaces the first.
    pub fn add(
        &mut self,
        id: EntityId,
        components: &[ComponentId],
        component_manager: &ComponentManager,
    ) -> Result<(), EcsError> {
        let entity = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| EcsError::Entity(format!("cannot add components to unknown {id}")))?;

        let mut resolved = Vec::with_capacity(components.len());
        for cid in components {
            let component = component_manager
                .get(*cid)
                .ok_or_else(|| EcsError::Component(format!("cannot attach unknown {cid} to {id}")))?;
            resolved.push(component);
        }
        for component in resolved {
            entity.attach(component);
        }

        self.entity_event(id, EntityEventType::ComponentAttach);
        Ok(())
    }

    /// Detach components of the given kinds from an entity. Returns the
    /// detached ids; the components themselves are not destroyed.
    pub fn remove(&mut self, id: EntityId, kinds: &[Kind]) -> Result<Vec<ComponentId>, EcsError> {
        let entity = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| EcsError::Entity(format!("cannot remove components from unknown {id}")))?;

        let removed: Vec<ComponentId> = kinds
            .iter()
            .filter_map(|kind| entity.components.remove(kind.name()))
            .collect();

        self.entity_event(id, EntityEventType::ComponentDetach);
        Ok(removed)
    }

    /// Enabled entities whose components include every one of `kinds`
    pub fn each_with<'a>(
        &'a self,
        kinds: &'a [Kind],
        component_manager: &'a ComponentManager,
    ) -> impl Iterator<Item = EntityView<'a>> + 'a {
        self.enabled_views(component_manager)
            .filter(move |view| view.contains(kinds))
    }

    /// Enabled entities with at least one of `kinds`
    pub fn each_with_any<'a>(
        &'a self,
        kinds: &'a [Kind],
        component_manager: &'a ComponentManager,
    ) -> impl Iterator<Item = EntityView<'a>> + 'a {
        self.enabled_views(component_manager)
            .filter(move |view| view.contains_any(kinds))
    }

    /// Number of entities in the pool, in any state
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Promote every staged entity still `Creating` to `Alive`.
    pub fn creation(&mut self, time: &TimeManager) -> Health {
        for id in self.staged.take_create() {
            let Some(entity) = self.by_id.get_mut(&id) else {
                continue;
            };
            if entity.life_cycle != LifeCycle::Creating {
                continue;
            }
            entity.life_cycle = LifeCycle::Alive;
            log::trace!("EntityManager: {} alive (tick {})", id, time.tick_num());
            self.life_event(id, LifeCycle::Alive);
        }
        Health::Healthy
    }

    /// Evict every staged entity that isn't `Alive`.
    pub fn destruction(&mut self, time: &TimeManager) -> Health {
        for id in self.staged.take_destroy() {
            match self.by_id.get(&id) {
                None => continue,
                Some(entity) if entity.life_cycle == LifeCycle::Alive => continue,
                Some(_) => {}
            }
            self.by_id.remove(&id);
            log::trace!("EntityManager: {} dead (tick {})", id, time.tick_num());
            self.life_event(id, LifeCycle::Dead);
        }
        Health::Healthy
    }

    fn enabled_views<'a>(
        &'a self,
        component_manager: &'a ComponentManager,
    ) -> impl Iterator<Item = EntityView<'a>> + 'a {
        self.by_id
            .values()
            .filter(|entity| entity.enabled())
            .map(move |entity| entity.view(component_manager))
    }

    fn life_event(&self, id: EntityId, life_cycle: LifeCycle) {
        if let Some(events) = &self.events {
            events.create(ENTITY_LIFE_EVENT, Owner::Entity(id), life_cycle.event_tag(), None, false);
        }
    }

    fn entity_event(&self, id: EntityId, event_type: EntityEventType) {
        if let Some(events) = &self.events {
            events.create(ENTITY_EVENT, Owner::Entity(id), event_type.event_tag(), None, false);
        }
    }
}

impl EcsManager for EntityManager {
    fn name(&self) -> &'static str {
        "EntityManager"
    }

    fn health(&self) -> Health {
        self.health
    }

    fn apoptosis(&mut self) -> Health {
        let ids: Vec<EntityId> = self.by_id.keys().copied().collect();
        for id in ids {
            self.destroy(id);
        }
        for id in self.staged.take_destroy() {
            if self.by_id.remove(&id).is_some() {
                self.life_event(id, LifeCycle::Dead);
            }
        }
        self.staged.clear();
        self.health = Health::Apoptosis;
        Health::Apoptosis
    }
}
