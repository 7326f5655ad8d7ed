//! Integration tests for events flowing between managers, systems and the
//! data-layer contract

use std::rc::Rc;

use toml::{Table, Value};

use crate::core::config::Configuration;
use crate::ecs::component::{ComponentData, COMPONENT_LIFE_EVENT};
use crate::ecs::error::{EcsError, TickError};
use crate::ecs::health::Health;
use crate::ecs::kind::Kind;
use crate::ecs::life_cycle::LifeCycle;
use crate::ecs::system::{System, SystemContext};
use crate::ecs::tick::{SystemPriority, SystemTick};
use crate::engine::Engine;
use crate::events::data::{self, DATA_EVENT, DATA_LOADED, DATA_LOAD_REQUEST};
use crate::events::{Event, EventManager, Mailbox, Owner};
use crate::foundation::{dotted, logging};

#[derive(Debug)]
struct Torch;
impl ComponentData for Torch {
    const KIND: Kind = Kind::root("Torch");
}

/// Answers load requests out of the saved-game tree
struct Repository {
    saved: Table,
    events: Rc<EventManager>,
    requests: Mailbox,
}

impl System for Repository {
    fn name(&self) -> &'static str {
        "Repository"
    }

    fn priority(&self) -> i32 {
        SystemPriority::DATA_REPO
    }

    fn ticks(&self) -> SystemTick {
        SystemTick::STANDARD
    }

    fn subscribe(&mut self, events: &EventManager) -> Result<Health, EcsError> {
        events.subscribe(DATA_LOAD_REQUEST, self.requests.clone());
        Ok(Health::Healthy)
    }

    fn update(&mut self, _ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        for request in self.requests.drain() {
            let path = data::path(&request)
                .ok_or_else(|| TickError::Failed(format!("load request without a path: {request}")))?;
            let payload = dotted::lookup(&self.saved, path)
                .and_then(Value::as_table)
                .cloned()
                .unwrap_or_default();
            self.events.notify(data::loaded(&request, payload), false);
        }
        Ok(Health::Healthy)
    }
}

fn engine(configuration: Configuration) -> Engine {
    logging::init_for_tests();
    Engine::builder().configuration(configuration).build().unwrap()
}

#[test]
fn test_component_life_events_follow_sweeps() {
    let mut engine = engine(Configuration::new());
    let mailbox = Mailbox::default();
    engine.events().subscribe(COMPONENT_LIFE_EVENT, mailbox.clone());

    let torch = engine.with_components(|components| components.create(Torch)).unwrap();
    engine.tick().unwrap();
    let tags: Vec<i64> = mailbox.drain().iter().map(Event::tag).collect();
    assert_eq!(tags, vec![LifeCycle::Creating.event_tag(), LifeCycle::Alive.event_tag()]);

    engine.with_components(|components| components.destroy(torch)).unwrap();
    engine.tick().unwrap();
    let events = mailbox.drain();
    let tags: Vec<i64> = events.iter().map(Event::tag).collect();
    assert_eq!(tags, vec![LifeCycle::Destroying.event_tag(), LifeCycle::Dead.event_tag()]);
    assert!(events.iter().all(|event| event.owner() == Owner::Component(torch)));
}

#[test]
fn test_load_request_round_trip() {
    let saved: Table = toml::from_str(
        r#"
        [party]
        gold = 150
        members = 4
        "#,
    )
    .unwrap();
    let mut engine = engine(Configuration::new().with_saved(saved));

    let repository_saved = engine.configuration().saved.clone();
    engine
        .create_system(None, move |_, meeting, _| {
            let events = meeting
                .events()
                .cloned()
                .ok_or(EcsError::ManagerMissing("EventManager"))?;
            Ok(Repository {
                saved: repository_saved,
                events,
                requests: Mailbox::default(),
            })
        })
        .unwrap();
    assert_eq!(engine.run_birth().unwrap(), Health::Healthy);

    // Subscribed to the base kind: sees the request and the reply.
    let observer = Mailbox::default();
    engine.events().subscribe(DATA_EVENT, observer.clone());
    engine.events().notify(data::load_request(Owner::None, 7, "party"), false);

    engine.tick().unwrap();

    let seen = observer.drain();
    let kinds: Vec<&str> = seen.iter().map(|event| event.kind().name()).collect();
    assert_eq!(kinds, vec![DATA_LOAD_REQUEST.name(), DATA_LOADED.name()]);

    let reply = &seen[1];
    assert_eq!(reply.tag(), 7);
    assert_eq!(data::path(reply), Some("party"));
    let gold = data::payload(reply).and_then(|party| party.get("gold")).and_then(Value::as_integer);
    assert_eq!(gold, Some(150));
}

#[test]
fn test_immediate_events_skip_the_queue() {
    let engine = engine(Configuration::new());
    let mailbox = Mailbox::default();
    engine.events().subscribe(DATA_EVENT, mailbox.clone());

    engine.events().notify(data::load_request(Owner::None, 1, "queued"), false);
    engine.events().notify(data::load_request(Owner::None, 2, "now"), true);
    assert_eq!(mailbox.len(), 1);

    engine.events().publish();
    let tags: Vec<i64> = mailbox.drain().iter().map(Event::tag).collect();
    assert_eq!(tags, vec![2, 1]);
}

#[test]
fn test_apoptosis_delivers_pending_events() {
    let mut engine = engine(Configuration::new());
    let mailbox = Mailbox::default();
    engine.events().subscribe(DATA_EVENT, mailbox.clone());
    engine.events().notify(data::load_request(Owner::None, 3, "party"), false);

    assert_eq!(engine.apoptosis().unwrap(), Health::Apoptosis);
    let tags: Vec<i64> = mailbox.drain().iter().map(Event::tag).collect();
    assert_eq!(tags, vec![3]);

    assert!(engine.events().is_closed());
    engine.events().notify(data::load_request(Owner::None, 4, "party"), false);
    assert_eq!(engine.events().queued(), 0);
}

#[test]
fn test_handler_reply_arrives_in_same_flush() {
    let engine = engine(Configuration::new());
    let observer = Mailbox::default();
    engine.events().subscribe(DATA_LOADED, observer.clone());

    let bus = Rc::downgrade(engine.events());
    engine.events().subscribe(DATA_LOAD_REQUEST, move |request: &Event| {
        if let Some(bus) = bus.upgrade() {
            bus.notify(data::loaded(request, Table::new()), false);
        }
    });

    engine.events().notify(data::load_request(Owner::None, 5, "party"), false);
    assert_eq!(engine.events().publish(), 2);
    let tags: Vec<i64> = observer.drain().iter().map(Event::tag).collect();
    assert_eq!(tags, vec![5]);
}
