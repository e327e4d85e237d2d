//! # Envoy Bus - Typed In-Process Messaging
//!
//! A type-indexed publish/subscribe bus combined with a single-responder
//! service locator.
//!
//! ## Messaging
//!
//! ```text
//! ┌──────────────┐                          ┌──────────────┐
//! │  Producer    │   dispatch::<M>(payload)  │  Listener    │
//! │              │ ──────┐                   │  (type M)    │
//! └──────────────┘       │                   └──────────────┘
//!                        ▼                          ↑
//!                 ┌──────────────┐   Now            │
//!                 │ DispatchTable│ ─────────────────┤
//!                 │  M → Channel │                  │
//!                 └──────────────┘   NextTick       │
//!                        │  queue ── flush_deferred()┘
//! ```
//!
//! - **Now:** listeners run, in registration order, before `dispatch` returns
//! - **NextTick:** payloads wait for the host's next `flush_deferred()`;
//!   each flush delivers exactly the payloads queued before it started
//!
//! ## Service Locator
//!
//! At most one responder per `(argument type, return type)` pair.
//! `request` on an empty pair is an error; every other missing registration
//! is a silent no-op.
//!
//! ## Diagnostics
//!
//! Duplicate registrations and leaks found at teardown are reported through a
//! [`DiagnosticSink`] and never interrupt control flow.
//!
//! ## Example
//!
//! ```rust
//! use envoy_bus::{DeliveryMode, EventManager, Listener};
//!
//! struct ScoreChanged(u32);
//!
//! let bus = EventManager::builder()
//!     .mode::<ScoreChanged>(DeliveryMode::NextTick)
//!     .build();
//!
//! let on_score = Listener::new(|e: &ScoreChanged| {
//!     assert_eq!(e.0, 10);
//!     Ok(())
//! });
//! bus.add_listener(&on_score);
//! bus.dispatch(ScoreChanged(10)).unwrap();
//! assert_eq!(bus.flush_deferred().unwrap(), 1);
//!
//! bus.add_responder(|name: &'static str| name.len());
//! assert_eq!(bus.request::<&'static str, usize>("envoy").unwrap(), 5);
//!
//! bus.remove_listener(&on_score);
//! bus.remove_responder::<&'static str, usize>();
//! assert!(bus.teardown().is_clean());
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod listener;
pub mod manager;
pub mod message;
pub mod responder;
pub mod table;
pub mod tick;

// Re-export main types
pub use channel::{Channel, ChannelState};
pub use config::{BusConfig, DispatchModeSource, DispatchModeTable};
pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, Severity, TracingSink};
pub use error::{BusError, BusResult};
pub use listener::{Listener, ListenerKey, ListenerResult};
pub use manager::{BusStats, EventManager, EventManagerBuilder, TeardownReport};
pub use message::{DeliveryMode, Message, MessageType};
pub use responder::{ResponderKey, ResponderRegistry};
pub use table::DispatchTable;
pub use tick::{TickDriver, TickSummary, DEFAULT_TICK_INTERVAL, MIN_TICK_INTERVAL};
