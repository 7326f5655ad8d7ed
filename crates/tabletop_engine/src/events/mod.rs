//! Publish/subscribe event bus
//!
//! Key principles:
//! - Events are immutable once built
//! - Handlers subscribe to a [`Kind`]; they also receive every kind derived
//!   from it (the ancestry chain is walked most-derived first)
//! - Queued delivery in FIFO order on [`EventManager::publish`], or immediate
//!   delivery from [`EventManager::notify`]
//!
//! The manager is shared as `Rc<EventManager>` and only needs `&self`, so a
//! handler may notify or subscribe while an event is being delivered.

pub mod data;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::ecs::context::Context;
use crate::ecs::health::Health;
use crate::ecs::identity::{ComponentId, EntityId, SystemId};
use crate::ecs::kind::Kind;
use crate::ecs::manager::EcsManager;
use crate::ecs::tick::SystemTick;
use crate::ecs::time::TimeManager;

/// Who an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Owner {
    /// Nobody in particular
    #[default]
    None,
    /// An entity
    Entity(EntityId),
    /// A component
    Component(ComponentId),
    /// A system
    System(SystemId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Owner:None"),
            Self::Entity(id) => write!(f, "{id}"),
            Self::Component(id) => write!(f, "{id}"),
            Self::System(id) => write!(f, "{id}"),
        }
    }
}

/// Free-form discriminator within an event kind
pub type EventTag = i64;

/// An immutable event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: Kind,
    owner: Owner,
    tag: EventTag,
    context: Option<Context>,
}

impl Event {
    /// Create an event with no context
    pub const fn new(kind: Kind, owner: Owner, tag: EventTag) -> Self {
        Self {
            kind,
            owner,
            tag,
            context: None,
        }
    }

    /// Attach a context (builder pattern)
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Event kind
    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Owner
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Tag
    pub const fn tag(&self) -> EventTag {
        self.tag
    }

    /// Context, if any
    pub const fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}, tag: {}]", self.kind, self.owner, self.tag)
    }
}

/// Event handler trait
pub trait EventHandler {
    /// Handle an event
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventHandler for F {
    fn on_event(&mut self, event: &Event) {
        self(event);
    }
}

/// A handler shared between its owner and the event bus
pub type SharedHandler = Rc<RefCell<dyn EventHandler>>;

/// Collects delivered events for later processing.
///
/// Systems keep a clone and drain it during their own tick; the bus holds the
/// other clone.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    inbox: Rc<RefCell<VecDeque<Event>>>,
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything received so far, oldest first
    pub fn drain(&self) -> Vec<Event> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    /// Number of undelivered events
    pub fn len(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.inbox.borrow().is_empty()
    }
}

impl EventHandler for Mailbox {
    fn on_event(&mut self, event: &Event) {
        self.inbox.borrow_mut().push_back(event.clone());
    }
}

/// Handle returned by [`EventManager::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    handler: SharedHandler,
}

/// Event manager with subscription and queuing
pub struct EventManager {
    subscribers: RefCell<HashMap<&'static str, Vec<Subscriber>>>,
    queue: RefCell<VecDeque<Event>>,
    next_subscription: Cell<u64>,
    health: Cell<Health>,
    closed: Cell<bool>,
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("kinds", &self.subscribers.borrow().len())
            .field("queued", &self.queue.borrow().len())
            .field("health", &self.health.get())
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    /// Create an empty event manager
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(HashMap::new()),
            queue: RefCell::new(VecDeque::new()),
            next_subscription: Cell::new(0),
            health: Cell::new(Health::Healthy),
            closed: Cell::new(false),
        }
    }

    /// Subscribe `handler` to `kind` and every kind derived from it
    pub fn subscribe(&self, kind: Kind, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.subscribe_shared(kind, Rc::new(RefCell::new(handler)))
    }

    /// Subscribe a handler the caller keeps a handle to
    pub fn subscribe_shared(&self, kind: Kind, handler: SharedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get() + 1);
        self.next_subscription.set(id.0);

        log::debug!("EventManager: subscription {:?} to '{}'", id, kind);
        self.subscribers
            .borrow_mut()
            .entry(kind.name())
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    /// Remove a subscription. Returns false if it wasn't found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let mut found = false;
        for handlers in subscribers.values_mut() {
            let before = handlers.len();
            handlers.retain(|sub| sub.id != id);
            found |= handlers.len() != before;
        }
        subscribers.retain(|_, handlers| !handlers.is_empty());
        found
    }

    /// Is anyone subscribed to exactly `kind`?
    pub fn has_subscribers(&self, kind: &Kind) -> bool {
        self.subscribers.borrow().contains_key(kind.name())
    }

    /// Queue an event, or deliver it right now if `immediate`. Ignored once
    /// the manager has shut down.
    pub fn notify(&self, event: Event, immediate: bool) {
        if self.closed.get() {
            log::debug!("EventManager: shut down, dropping {}", event);
            return;
        }
        if immediate {
            self.push(&event);
        } else {
            self.queue.borrow_mut().push_back(event);
        }
    }

    /// Build and notify an event in one call
    pub fn create(
        &self,
        kind: Kind,
        owner: Owner,
        tag: EventTag,
        context: Option<Context>,
        immediate: bool,
    ) {
        let event = Event {
            kind,
            owner,
            tag,
            context,
        };
        self.notify(event, immediate);
    }

    /// Number of queued events
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Deliver queued events in FIFO order until the queue is empty. Events
    /// a handler queues while this runs are delivered in the same publish.
    /// Returns the number of events delivered.
    pub fn publish(&self) -> usize {
        let mut count = 0;
        loop {
            // The borrow must end before delivery so handlers can notify.
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            self.push(&event);
            count += 1;
        }
        count
    }

    /// True once [`shut_down`](Self::shut_down) has run
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Per-tick hook: flush the queue.
    pub fn update(&self, tick: SystemTick, time: &TimeManager) -> Health {
        let published = self.publish();
        if published > 0 {
            log::trace!(
                "EventManager: published {} event(s) during {} (tick {})",
                published,
                tick.name(),
                time.tick_num()
            );
        }
        self.health.get()
    }

    /// Deliver whatever is still queued, then drop every subscriber and stop
    /// accepting events.
    pub fn shut_down(&self) -> Health {
        if self.closed.get() {
            return self.health.get();
        }
        let delivered = self.publish();
        if delivered > 0 {
            log::debug!("EventManager: delivered {} event(s) before shutting down", delivered);
        }
        self.closed.set(true);
        self.queue.borrow_mut().clear();
        self.subscribers.borrow_mut().clear();
        self.health.set(Health::Apoptosis);
        Health::Apoptosis
    }

    /// Deliver one event to every handler along its kind's ancestry.
    fn push(&self, event: &Event) {
        for kind in event.kind().ancestry() {
            // Snapshot so handlers can subscribe/unsubscribe mid-delivery.
            let handlers: Vec<SharedHandler> = self
                .subscribers
                .borrow()
                .get(kind.name())
                .map(|subs| subs.iter().map(|sub| Rc::clone(&sub.handler)).collect())
                .unwrap_or_default();

            for handler in handlers {
                match handler.try_borrow_mut() {
                    Ok(mut handler) => handler.on_event(event),
                    Err(_) => log::warn!(
                        "EventManager: handler for '{}' is already handling an event; skipped {}",
                        kind,
                        event
                    ),
                }
            }
        }
    }
}

impl EcsManager for EventManager {
    fn name(&self) -> &'static str {
        "EventManager"
    }

    fn health(&self) -> Health {
        self.health.get()
    }

    fn apoptosis(&mut self) -> Health {
        self.shut_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Kind = Kind::root("TestBase");
    const DERIVED: Kind = Kind::derived("TestDerived", &BASE);
    const UNRELATED: Kind = Kind::root("TestUnrelated");

    struct TestHandler {
        received: Rc<RefCell<Vec<EventTag>>>,
    }

    impl EventHandler for TestHandler {
        fn on_event(&mut self, event: &Event) {
            self.received.borrow_mut().push(event.tag());
        }
    }

    fn recorder() -> (TestHandler, Rc<RefCell<Vec<EventTag>>>) {
        let received = Rc::new(RefCell::new(Vec::new()));
        (
            TestHandler {
                received: Rc::clone(&received),
            },
            received,
        )
    }

    #[test]
    fn test_queued_fifo() {
        let events = EventManager::new();
        let (handler, received) = recorder();
        events.subscribe(BASE, handler);

        for tag in 1..=5 {
            events.notify(Event::new(BASE, Owner::None, tag), false);
        }
        assert!(received.borrow().is_empty());
        assert_eq!(events.queued(), 5);

        assert_eq!(events.publish(), 5);
        assert_eq!(*received.borrow(), vec![1, 2, 3, 4, 5]);
        assert_eq!(events.queued(), 0);
    }

    #[test]
    fn test_immediate_skips_queue() {
        let events = EventManager::new();
        let (handler, received) = recorder();
        events.subscribe(BASE, handler);

        events.notify(Event::new(BASE, Owner::None, 1), false);
        events.notify(Event::new(BASE, Owner::None, 2), true);
        assert_eq!(*received.borrow(), vec![2]);

        events.publish();
        assert_eq!(*received.borrow(), vec![2, 1]);
    }

    #[test]
    fn test_base_handler_receives_derived() {
        let events = EventManager::new();
        let (base_handler, base_received) = recorder();
        let (derived_handler, derived_received) = recorder();
        let (other_handler, other_received) = recorder();
        events.subscribe(BASE, base_handler);
        events.subscribe(DERIVED, derived_handler);
        events.subscribe(UNRELATED, other_handler);

        events.notify(Event::new(DERIVED, Owner::None, 7), false);
        events.notify(Event::new(BASE, Owner::None, 8), false);
        events.publish();

        assert_eq!(*base_received.borrow(), vec![7, 8]);
        assert_eq!(*derived_received.borrow(), vec![7]);
        assert!(other_received.borrow().is_empty());
    }

    #[test]
    fn test_most_derived_first() {
        let events = EventManager::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let base_order = Rc::clone(&order);
        let derived_order = Rc::clone(&order);
        events.subscribe(BASE, move |_: &Event| base_order.borrow_mut().push("base"));
        events.subscribe(DERIVED, move |_: &Event| derived_order.borrow_mut().push("derived"));

        events.notify(Event::new(DERIVED, Owner::None, 0), true);
        assert_eq!(*order.borrow(), vec!["derived", "base"]);
    }

    #[test]
    fn test_notify_during_publish_same_flush() {
        let events = Rc::new(EventManager::new());
        let (handler, received) = recorder();
        events.subscribe(UNRELATED, handler);

        let bus = Rc::clone(&events);
        events.subscribe(BASE, move |event: &Event| {
            bus.notify(Event::new(UNRELATED, event.owner(), event.tag() * 10), false);
        });

        events.notify(Event::new(BASE, Owner::None, 3), false);
        events.notify(Event::new(BASE, Owner::None, 4), false);
        assert_eq!(events.publish(), 4);
        assert_eq!(*received.borrow(), vec![30, 40]);
        assert_eq!(events.queued(), 0);
        assert_eq!(events.publish(), 0);

        // Break the Rc cycle through the closure.
        events.shut_down();
    }

    #[test]
    fn test_unsubscribe() {
        let events = EventManager::new();
        let (handler, received) = recorder();
        let id = events.subscribe(BASE, handler);
        assert!(events.has_subscribers(&BASE));

        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        assert!(!events.has_subscribers(&BASE));

        events.notify(Event::new(BASE, Owner::None, 1), true);
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn test_mailbox() {
        let events = EventManager::new();
        let mailbox = Mailbox::new();
        events.subscribe(BASE, mailbox.clone());

        events.create(
            DERIVED,
            Owner::Entity(EntityId::INVALID),
            4,
            Some(Context::new("test").with("hp", 12)),
            false,
        );
        events.publish();

        let delivered = mailbox.drain();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind(), &DERIVED);
        assert_eq!(
            delivered[0].context().and_then(|ctx| ctx.get("hp")).and_then(toml::Value::as_integer),
            Some(12)
        );
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_shut_down_delivers_queue() {
        let mut events = EventManager::new();
        let mailbox = Mailbox::new();
        events.subscribe(BASE, mailbox.clone());
        events.notify(Event::new(BASE, Owner::None, 1), false);
        events.notify(Event::new(DERIVED, Owner::None, 2), false);

        assert_eq!(events.apoptosis(), Health::Apoptosis);
        let tags: Vec<EventTag> = mailbox.drain().iter().map(Event::tag).collect();
        assert_eq!(tags, vec![1, 2]);
        assert_eq!(events.queued(), 0);
        assert!(events.is_closed());
        assert_eq!(events.health(), Health::Apoptosis);
    }

    #[test]
    fn test_closed_ignores_notify() {
        let events = EventManager::new();
        let (handler, received) = recorder();
        events.subscribe(BASE, handler);
        events.shut_down();

        events.notify(Event::new(BASE, Owner::None, 1), false);
        events.notify(Event::new(BASE, Owner::None, 2), true);
        assert_eq!(events.queued(), 0);
        assert_eq!(events.publish(), 0);
        assert!(received.borrow().is_empty());
        assert_eq!(events.shut_down(), Health::Apoptosis);
    }
}
