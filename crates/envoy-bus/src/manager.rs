//! # Event Manager
//!
//! The facade hosts talk to: a message bus ([`DispatchTable`]) and a service
//! locator ([`ResponderRegistry`]) sharing one diagnostic sink.
//!
//! ## Lifecycle
//!
//! ```text
//!   build ──→ add_listener / add_responder
//!                 │
//!                 ▼
//!   dispatch(Now) ──→ listeners run before dispatch returns
//!   dispatch(NextTick) ──→ queued ──→ flush_deferred() (once per tick)
//!                 │
//!                 ▼
//!   teardown() ──→ everything detached, leaks reported
//! ```
//!
//! The manager is single-threaded (`!Send`). Listeners and responders may
//! call back into it freely.

use crate::config::{BusConfig, DispatchModeSource, DispatchModeTable};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::BusResult;
use crate::listener::Listener;
use crate::message::{DeliveryMode, Message, MessageType};
use crate::responder::{ResponderKey, ResponderRegistry};
use crate::table::DispatchTable;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Running counters kept by an [`EventManager`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Immediate dispatches that completed without a listener failure,
    /// including those with no listener attached.
    pub dispatched_now: u64,
    /// Messages queued for a later tick.
    pub enqueued: u64,
    /// Queued messages consumed by flushes.
    pub flushed: u64,
    /// Completed `flush_deferred` calls.
    pub ticks: u64,
}

/// What a teardown found still registered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub leaked_listeners: Vec<MessageType>,
    pub leaked_responders: Vec<ResponderKey>,
}

impl TeardownReport {
    /// `true` when nothing was left registered.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.leaked_listeners.is_empty() && self.leaked_responders.is_empty()
    }
}

/// Message bus plus service locator.
pub struct EventManager {
    table: DispatchTable,
    responders: ResponderRegistry,
    report_leaks: bool,
    torn_down: Cell<bool>,
    stats: Cell<BusStats>,
}

impl EventManager {
    /// Manager with no per-type modes that logs diagnostics via `tracing`.
    #[must_use]
    pub fn new() -> Self {
        EventManagerBuilder::new().build()
    }

    /// Manager configured from `config`.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidDeliveryMode` if `config` names an unknown mode.
    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        EventManagerBuilder::new().config(config).try_build()
    }

    #[must_use]
    pub fn builder() -> EventManagerBuilder {
        EventManagerBuilder::new()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Attach `listener` to messages of type `M`.
    ///
    /// Adding the same handle twice is ignored and reported.
    pub fn add_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        self.revive();
        self.table.add_listener(listener)
    }

    /// Detach `listener`. Does nothing if it was never attached.
    pub fn remove_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        self.table.remove_listener(listener)
    }

    #[must_use]
    pub fn has_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        self.table.has_listener(listener)
    }

    /// Dispatch using the type's configured default mode.
    ///
    /// # Errors
    ///
    /// `BusError::Listener` if a listener fails during immediate delivery.
    pub fn dispatch<M: Message>(&self, payload: M) -> BusResult<()> {
        self.dispatch_with(payload, DeliveryMode::Default)
    }

    /// Dispatch with an explicit mode.
    ///
    /// # Errors
    ///
    /// `BusError::Listener` if a listener fails during immediate delivery.
    pub fn dispatch_with<M: Message>(&self, payload: M, mode: DeliveryMode) -> BusResult<()> {
        self.revive();
        match self.table.dispatch(payload, mode)? {
            DeliveryMode::NextTick => self.bump(|s| s.enqueued += 1),
            _ => self.bump(|s| s.dispatched_now += 1),
        }
        Ok(())
    }

    /// Deliver everything queued before this call. Call once per tick.
    ///
    /// # Errors
    ///
    /// `BusError::Listener` if a listener fails; undelivered entries stay
    /// queued.
    pub fn flush_deferred(&self) -> BusResult<usize> {
        let flushed = self.table.flush_deferred();
        if let Ok(count) = flushed {
            self.bump(|s| {
                s.flushed += count as u64;
                s.ticks += 1;
            });
        }
        flushed
    }

    #[must_use]
    pub fn listener_count<M: Message>(&self) -> usize {
        self.table.listener_count::<M>()
    }

    #[must_use]
    pub fn pending_count<M: Message>(&self) -> usize {
        self.table.pending_count::<M>()
    }

    /// Direct access to the dispatch table.
    #[must_use]
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    // ------------------------------------------------------------------
    // Responders
    // ------------------------------------------------------------------

    /// Register the responder for requests taking `A` and returning `R`.
    ///
    /// Rejected (and reported) if one is already registered.
    pub fn add_responder<A, R, F>(&self, handler: F) -> bool
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + 'static,
    {
        self.revive();
        self.responders.add(handler)
    }

    /// Register the responder for argument-less requests returning `R`.
    pub fn add_unit_responder<R, F>(&self, handler: F) -> bool
    where
        R: 'static,
        F: Fn() -> R + 'static,
    {
        self.revive();
        self.responders.add_unit(handler)
    }

    pub fn remove_responder<A: 'static, R: 'static>(&self) -> bool {
        self.responders.remove::<A, R>()
    }

    pub fn remove_unit_responder<R: 'static>(&self) -> bool {
        self.responders.remove_unit::<R>()
    }

    /// Request an `R` computed from `argument`.
    ///
    /// # Errors
    ///
    /// `BusError::ResponderNotFound` if no responder handles `(A, R)`.
    pub fn request<A: 'static, R: 'static>(&self, argument: A) -> BusResult<R> {
        self.responders.request(argument)
    }

    /// Request an `R` from an argument-less responder.
    ///
    /// # Errors
    ///
    /// `BusError::ResponderNotFound` if no responder handles `R`.
    pub fn request_unit<R: 'static>(&self) -> BusResult<R> {
        self.responders.request_unit()
    }

    #[must_use]
    pub fn has_responder<A: 'static, R: 'static>(&self) -> bool {
        self.responders.contains::<A, R>()
    }

    #[must_use]
    pub fn responders(&self) -> &ResponderRegistry {
        &self.responders
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Detach all listeners, drop all responders and report leaks.
    ///
    /// The manager stays usable afterwards; registering again starts a new
    /// lifetime.
    pub fn teardown(&self) -> TeardownReport {
        let report = TeardownReport {
            leaked_listeners: self.table.teardown(self.report_leaks),
            leaked_responders: self.responders.teardown(self.report_leaks),
        };
        self.torn_down.set(true);
        info!(
            leaked_listeners = report.leaked_listeners.len(),
            leaked_responders = report.leaked_responders.len(),
            "Event manager torn down"
        );
        report
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.stats.get()
    }

    fn revive(&self) {
        self.torn_down.set(false);
    }

    fn bump(&self, update: impl FnOnce(&mut BusStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        if !self.torn_down.get() {
            debug!("Event manager dropped without teardown");
            self.teardown();
        }
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("table", &self.table)
            .field("responders", &self.responders)
            .field("stats", &self.stats.get())
            .finish()
    }
}

/// Builder for [`EventManager`].
pub struct EventManagerBuilder {
    modes: DispatchModeTable,
    source: Option<Rc<dyn DispatchModeSource>>,
    sink: Rc<dyn DiagnosticSink>,
    config: BusConfig,
}

impl EventManagerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            modes: DispatchModeTable::new(),
            source: None,
            sink: Rc::new(TracingSink),
            config: BusConfig::default(),
        }
    }

    /// Static per-type default modes.
    #[must_use]
    pub fn dispatch_modes(mut self, modes: DispatchModeTable) -> Self {
        self.modes = modes;
        self
    }

    /// Default mode for `M`.
    #[must_use]
    pub fn mode<M: Message>(mut self, mode: DeliveryMode) -> Self {
        self.modes.register::<M>(mode);
        self
    }

    /// Replace the mode table with a custom source. Name overrides from the
    /// config are ignored in that case.
    #[must_use]
    pub fn mode_source(mut self, source: Rc<dyn DispatchModeSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Build, validating config overrides.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidDeliveryMode` if an override names an unknown mode.
    pub fn try_build(self) -> BusResult<EventManager> {
        let source: Rc<dyn DispatchModeSource> = match self.source {
            Some(source) => source,
            None => Rc::new(self.config.mode_table(self.modes)?),
        };
        Ok(Self::assemble(source, self.sink, &self.config))
    }

    /// Build, skipping config overrides if any of them is invalid.
    ///
    /// Use [`try_build`](Self::try_build) to surface that error instead.
    #[must_use]
    pub fn build(self) -> EventManager {
        let source: Rc<dyn DispatchModeSource> = match self.source {
            Some(source) => source,
            None => match self.config.mode_table(self.modes.clone()) {
                Ok(table) => Rc::new(table),
                Err(e) => {
                    warn!(error = %e, "Ignoring dispatch mode overrides");
                    Rc::new(self.modes)
                }
            },
        };
        Self::assemble(source, self.sink, &self.config)
    }

    fn assemble(
        source: Rc<dyn DispatchModeSource>,
        sink: Rc<dyn DiagnosticSink>,
        config: &BusConfig,
    ) -> EventManager {
        EventManager {
            table: DispatchTable::new(source, Rc::clone(&sink)),
            responders: ResponderRegistry::new(sink),
            report_leaks: config.report_leaks,
            torn_down: Cell::new(false),
            stats: Cell::new(BusStats::default()),
        }
    }
}

impl Default for EventManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
