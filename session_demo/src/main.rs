//! Session demo
//!
//! Runs a tiny skirmish on the tabletop engine: an initiative system orders
//! the combatants during `PRE`, a combat system trades blows during
//! `STANDARD`, and the fallen are swept away at the end of each round. The
//! engine stops when one side is left standing.
//!
//! Usage: `session_demo [config.toml|config.ron]`

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tabletop_engine::ecs::entity::ENTITY_LIFE_EVENT;
use tabletop_engine::events::Event;
use tabletop_engine::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Config error: {0}")]
    Config(#[from] tabletop_engine::core::ConfigError),
}

#[derive(Debug)]
struct HitPoints(i64);
impl ComponentData for HitPoints {
    const KIND: Kind = Kind::root("HitPoints");
}

#[derive(Debug)]
struct Attack {
    initiative: i64,
    damage: i64,
    side: &'static str,
}
impl ComponentData for Attack {
    const KIND: Kind = Kind::root("Attack");
}

/// Orders combatants by initiative, highest first
struct Initiative {
    required: [Kind; 1],
    order: Rc<RefCell<Vec<EntityId>>>,
}

impl System for Initiative {
    fn name(&self) -> &'static str {
        "Initiative"
    }

    fn priority(&self) -> i32 {
        SystemPriority::HIGH
    }

    fn ticks(&self) -> SystemTick {
        SystemTick::PRE
    }

    fn required(&self) -> &[Kind] {
        &self.required
    }

    fn update_pre(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        let mut order: Vec<(i64, EntityId)> = ctx
            .wanted(&self.required, true)
            .filter_map(|view| view.data::<Attack>().map(|attack| (attack.initiative, view.id())))
            .collect();
        order.sort_by(|a, b| b.cmp(a));
        *self.order.borrow_mut() = order.into_iter().map(|(_, id)| id).collect();
        Ok(Health::Healthy)
    }
}

/// Each combatant hits the first living enemy, in initiative order
struct Combat {
    required: [Kind; 2],
    order: Rc<RefCell<Vec<EntityId>>>,
    stop: StopHandle,
}

impl Combat {
    fn standing(ctx: &SystemContext<'_>, id: EntityId) -> Option<(&'static str, i64, ComponentId)> {
        let entity = ctx.entities().get(id)?;
        if !entity.enabled() {
            return None;
        }
        let view = entity.view(ctx.components());
        let attack = view.data::<Attack>()?;
        let hp = view.get(HitPoints::KIND)?;
        let points = hp.downcast_ref::<HitPoints>()?.0;
        (points > 0).then_some((attack.side, attack.damage, hp.id()))
    }
}

impl System for Combat {
    fn name(&self) -> &'static str {
        "Combat"
    }

    fn priority(&self) -> i32 {
        SystemPriority::MEDIUM
    }

    fn ticks(&self) -> SystemTick {
        SystemTick::STANDARD
    }

    fn required(&self) -> &[Kind] {
        &self.required
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
        let order = self.order.borrow().clone();
        for attacker in &order {
            let Some((side, damage, _)) = Self::standing(ctx, *attacker) else {
                continue;
            };
            let target = order
                .iter()
                .filter_map(|id| Self::standing(ctx, *id).map(|found| (*id, found)))
                .find(|(_, (target_side, _, _))| *target_side != side);
            let Some((target, (_, _, hp))) = target else {
                continue;
            };

            let (components, entities) = ctx.managers_mut();
            let Some(points) = components.data_mut::<HitPoints>(hp) else {
                continue;
            };
            points.0 -= damage;
            log::info!("{} hits {} for {} ({} left)", attacker, target, damage, points.0.max(0));
            if points.0 <= 0 {
                log::info!("{} falls", target);
                entities.destroy(target);
            }
        }

        let sides: Vec<&'static str> = order
            .iter()
            .filter_map(|id| Self::standing(ctx, *id).map(|(side, _, _)| side))
            .collect();
        if sides.windows(2).all(|pair| pair[0] == pair[1]) {
            log::info!("Round {}: '{}' holds the field", ctx.time().tick_num(), sides.first().unwrap_or(&"nobody"));
            self.stop.stop();
        }
        Ok(Health::Healthy)
    }
}

fn spawn(engine: &Engine, name: &str, side: &'static str, hp: i64, initiative: i64, damage: i64) -> Result<EntityId, DemoError> {
    let id = engine.with_entities(|entities, components| {
        let hp = components.create(HitPoints(hp));
        let attack = components.create(Attack {
            initiative,
            damage,
            side,
        });
        entities.create(name, &[hp, attack], components)
    })?;
    log::info!("{} joins the '{}' side as {}", name, side, id);
    Ok(id)
}

fn main() -> Result<(), DemoError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let configuration = match std::env::args().nth(1) {
        Some(path) => Configuration::load_from_file(path)?,
        None => Configuration::new(),
    };
    let mut engine = Engine::builder().configuration(configuration).build()?;

    let fallen = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&fallen);
    engine.events().subscribe(ENTITY_LIFE_EVENT, move |event: &Event| {
        if event.tag() == LifeCycle::Dead.event_tag() {
            counter.set(counter.get() + 1);
        }
    });

    spawn(&engine, "fighter", "party", 12, 14, 5)?;
    spawn(&engine, "cleric", "party", 9, 8, 3)?;
    spawn(&engine, "goblin", "raiders", 7, 12, 4)?;
    spawn(&engine, "ogre", "raiders", 20, 4, 6)?;

    let order: Rc<RefCell<Vec<EntityId>>> = Rc::default();
    let initiative_order = Rc::clone(&order);
    engine.create_system(None, move |_, _, _| {
        Ok(Initiative {
            required: [Attack::KIND],
            order: initiative_order,
        })
    })?;
    let stop = engine.stop_handle();
    engine.create_system(None, move |_, _, _| {
        Ok(Combat {
            required: [Attack::KIND, HitPoints::KIND],
            order,
            stop,
        })
    })?;

    let health = engine.run()?;
    log::info!(
        "Session over after {} round(s): {} fallen, engine {}",
        engine.tick_num(),
        fallen.get(),
        health
    );
    Ok(())
}
