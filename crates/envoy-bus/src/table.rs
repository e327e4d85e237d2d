//! # Dispatch Table
//!
//! Maps message types to channels. Channels are created on first use with a
//! default mode taken from the [`DispatchModeSource`], and live until
//! teardown even when their last listener leaves.

use crate::channel::Channel;
use crate::config::DispatchModeSource;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::BusResult;
use crate::listener::Listener;
use crate::message::{DeliveryMode, Message, MessageType};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

#[derive(Default)]
struct TableInner {
    lookup: HashMap<TypeId, Rc<Channel>>,
    /// Creation order, used for flushing.
    order: Vec<Rc<Channel>>,
}

/// Message type → channel map.
pub struct DispatchTable {
    inner: RefCell<TableInner>,
    modes: Rc<dyn DispatchModeSource>,
    sink: Rc<dyn DiagnosticSink>,
}

impl DispatchTable {
    pub fn new(modes: Rc<dyn DispatchModeSource>, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            inner: RefCell::new(TableInner::default()),
            modes,
            sink,
        }
    }

    /// Existing channel for `message_type`, or a fresh one.
    pub fn get_or_create(&self, message_type: MessageType) -> Rc<Channel> {
        if let Some(channel) = self.get(&message_type) {
            return channel;
        }

        let mode = self
            .modes
            .default_mode(&message_type)
            .unwrap_or(DeliveryMode::Now);
        let channel = Rc::new(Channel::new(message_type, mode));

        let mut inner = self.inner.borrow_mut();
        inner
            .lookup
            .insert(message_type.id(), Rc::clone(&channel));
        inner.order.push(Rc::clone(&channel));
        debug!(
            message_type = %message_type,
            default_mode = %channel.default_mode(),
            "Channel created"
        );
        channel
    }

    /// Existing channel for `message_type`, without creating one.
    #[must_use]
    pub fn get(&self, message_type: &MessageType) -> Option<Rc<Channel>> {
        self.inner.borrow().lookup.get(&message_type.id()).cloned()
    }

    /// Attach `listener` to messages of type `M`.
    ///
    /// Returns `false` and reports a duplicate if this handle is already
    /// attached.
    pub fn add_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        let message_type = MessageType::of::<M>();
        let channel = self.get_or_create(message_type);
        if !channel.add_listener(listener.key(), listener.erase()) {
            self.sink
                .report(Diagnostic::DuplicateListener { message_type });
            return false;
        }
        true
    }

    /// Detach `listener`. Unknown listeners are ignored.
    pub fn remove_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        self.get(&MessageType::of::<M>())
            .is_some_and(|channel| channel.remove_listener(&listener.key()))
    }

    #[must_use]
    pub fn has_listener<M: Message>(&self, listener: &Listener<M>) -> bool {
        self.get(&MessageType::of::<M>())
            .is_some_and(|channel| channel.has_listener(&listener.key()))
    }

    /// Route `payload` to the channel for `M`. Returns the mode used.
    ///
    /// # Errors
    ///
    /// `BusError::Listener` if a listener fails during immediate delivery.
    pub fn dispatch<M: Message>(&self, payload: M, mode: DeliveryMode) -> BusResult<DeliveryMode> {
        let channel = self.get_or_create(MessageType::of::<M>());
        channel.dispatch(Box::new(payload), mode)
    }

    /// Flush every channel known when the flush began, in creation order.
    ///
    /// Returns the number of payloads consumed.
    ///
    /// # Errors
    ///
    /// The first listener failure stops the flush; channels not yet reached
    /// keep their queues for the next tick.
    pub fn flush_deferred(&self) -> BusResult<usize> {
        let channels = self.inner.borrow().order.clone();
        let mut flushed = 0;
        for channel in channels {
            flushed += channel.flush_deferred()?;
        }
        Ok(flushed)
    }

    /// Detach every listener and forget every channel.
    ///
    /// Returns the message types that still had listeners, in channel
    /// creation order, and reports them if `report_leaks` is set.
    pub fn teardown(&self, report_leaks: bool) -> Vec<MessageType> {
        let channels = {
            let mut inner = self.inner.borrow_mut();
            inner.lookup.clear();
            std::mem::take(&mut inner.order)
        };

        let mut leaked = Vec::new();
        for channel in channels {
            if channel.remove_all_listeners() > 0 {
                leaked.push(channel.message_type());
            }
            channel.clear_pending();
        }

        if report_leaks && !leaked.is_empty() {
            self.sink.report(Diagnostic::LeakedListeners {
                message_types: leaked.clone(),
            });
        }
        leaked
    }

    #[must_use]
    pub fn listener_count<M: Message>(&self) -> usize {
        self.get(&MessageType::of::<M>())
            .map_or(0, |channel| channel.listener_count())
    }

    #[must_use]
    pub fn pending_count<M: Message>(&self) -> usize {
        self.get(&MessageType::of::<M>())
            .map_or(0, |channel| channel.pending_count())
    }

    /// Total payloads queued across all channels.
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.inner
            .borrow()
            .order
            .iter()
            .map(|channel| channel.pending_count())
            .sum()
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.borrow().order.len()
    }

    #[must_use]
    pub fn contains<M: Message>(&self) -> bool {
        self.inner
            .borrow()
            .lookup
            .contains_key(&TypeId::of::<M>())
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("channels", &self.channel_count())
            .finish()
    }
}
