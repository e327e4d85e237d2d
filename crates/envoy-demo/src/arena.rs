//! # Arena
//!
//! A toy game world wired entirely through the bus:
//!
//! - `PlayerSpawned` / `DamageDealt` are delivered immediately
//! - `FrameEnded` is deferred by default and re-dispatches itself, so one
//!   frame is processed per tick
//! - `PlayerId -> Option<PlayerStats>` and `() -> Difficulty` are responders

use envoy_bus::{DeliveryMode, EventManager, EventManagerBuilder, Listener, MessageType};
use envoy_telemetry::log_message_event;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

const BASE_HEALTH: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub id: PlayerId,
    pub health: i32,
    pub hits_taken: u32,
}

/// Health multiplier applied to newly spawned players.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Difficulty(pub f32);

#[derive(Debug, Clone)]
pub struct PlayerSpawned {
    pub id: PlayerId,
}

#[derive(Debug, Clone)]
pub struct DamageDealt {
    pub target: PlayerId,
    pub amount: i32,
}

#[derive(Debug, Clone)]
pub struct PlayerDefeated {
    pub id: PlayerId,
}

#[derive(Debug, Clone)]
pub struct FrameEnded {
    pub frame: u64,
}

/// Register the arena's per-type delivery modes on a builder.
pub fn configure(builder: EventManagerBuilder) -> EventManagerBuilder {
    builder.mode::<FrameEnded>(DeliveryMode::NextTick)
}

#[derive(Debug, Default)]
struct ArenaState {
    players: BTreeMap<PlayerId, PlayerStats>,
    frames: u64,
    defeated: Vec<PlayerId>,
}

/// Listeners and responders owned by the arena.
pub struct Arena {
    bus: Weak<EventManager>,
    state: Rc<RefCell<ArenaState>>,
    on_spawn: Listener<PlayerSpawned>,
    on_damage: Listener<DamageDealt>,
    on_defeat: Listener<PlayerDefeated>,
    on_frame: Listener<FrameEnded>,
}

impl Arena {
    /// Create the arena and attach it to `bus`.
    pub fn attach(bus: &Rc<EventManager>, difficulty: Difficulty) -> Self {
        let state = Rc::new(RefCell::new(ArenaState::default()));
        let weak = Rc::downgrade(bus);

        let on_spawn = {
            let state = Rc::clone(&state);
            let bus = weak.clone();
            Listener::new(move |e: &PlayerSpawned| {
                let multiplier = match bus.upgrade() {
                    Some(bus) => bus.request_unit::<Difficulty>()?.0,
                    None => 1.0,
                };
                let health = (BASE_HEALTH * multiplier).round() as i32;
                state.borrow_mut().players.insert(
                    e.id,
                    PlayerStats {
                        id: e.id,
                        health,
                        hits_taken: 0,
                    },
                );
                info!(player = e.id.0, health, "Player spawned");
                Ok(())
            })
        };

        let on_damage = {
            let state = Rc::clone(&state);
            let bus = weak.clone();
            Listener::new(move |e: &DamageDealt| {
                let defeated = {
                    let mut state = state.borrow_mut();
                    let Some(player) = state.players.get_mut(&e.target) else {
                        debug!(player = e.target.0, "Damage to unknown player ignored");
                        return Ok(());
                    };
                    let was_alive = player.health > 0;
                    player.health -= e.amount;
                    player.hits_taken += 1;
                    was_alive && player.health <= 0
                };
                if defeated {
                    if let Some(bus) = bus.upgrade() {
                        bus.dispatch(PlayerDefeated { id: e.target })?;
                    }
                }
                Ok(())
            })
        };

        let on_defeat = {
            let state = Rc::clone(&state);
            Listener::new(move |e: &PlayerDefeated| {
                state.borrow_mut().defeated.push(e.id);
                info!(player = e.id.0, "Player defeated");
                Ok(())
            })
        };

        let on_frame = {
            let state = Rc::clone(&state);
            let bus = weak.clone();
            Listener::new(move |e: &FrameEnded| {
                state.borrow_mut().frames += 1;
                log_message_event!(
                    trace,
                    "arena",
                    "Frame ended",
                    MessageType::of::<FrameEnded>(),
                    frame = e.frame
                );
                if let Some(bus) = bus.upgrade() {
                    bus.dispatch(FrameEnded { frame: e.frame + 1 })?;
                }
                Ok(())
            })
        };

        bus.add_listener(&on_spawn);
        bus.add_listener(&on_damage);
        bus.add_listener(&on_defeat);
        bus.add_listener(&on_frame);

        bus.add_unit_responder(move || difficulty);
        {
            let state = Rc::clone(&state);
            bus.add_responder(move |id: PlayerId| state.borrow().players.get(&id).cloned());
        }

        Self {
            bus: weak,
            state,
            on_spawn,
            on_damage,
            on_defeat,
            on_frame,
        }
    }

    /// Remove everything [`attach`](Self::attach) registered.
    pub fn detach(&self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        bus.remove_listener(&self.on_spawn);
        bus.remove_listener(&self.on_damage);
        bus.remove_listener(&self.on_defeat);
        bus.remove_listener(&self.on_frame);
        bus.remove_unit_responder::<Difficulty>();
        bus.remove_responder::<PlayerId, Option<PlayerStats>>();
        debug!("Arena detached");
    }

    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }

    pub fn defeated(&self) -> Vec<PlayerId> {
        self.state.borrow().defeated.clone()
    }

    pub fn player_count(&self) -> usize {
        self.state.borrow().players.len()
    }
}
