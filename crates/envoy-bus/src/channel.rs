//! # Channel
//!
//! One channel per message type: its listeners plus the queue of payloads
//! waiting for the next tick.
//!
//! State lives behind a `RefCell` and is never borrowed while listener code
//! runs, so listeners may add/remove listeners or dispatch again.

use crate::error::{BusError, BusResult};
use crate::listener::{ErasedListener, ListenerKey, ListenerRegistry};
use crate::message::{DeliveryMode, MessageType};
use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::trace;

/// Whether any listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No listeners. Pending payloads may still be queued.
    Idle,
    /// At least one listener.
    Active,
}

struct ChannelInner {
    listeners: ListenerRegistry,
    pending: VecDeque<Box<dyn Any>>,
}

/// Listener set and deferred queue for a single message type.
pub struct Channel {
    message_type: MessageType,
    default_mode: DeliveryMode,
    inner: RefCell<ChannelInner>,
}

impl Channel {
    /// Create a channel. A `Default` mode is stored as `Now`.
    pub(crate) fn new(message_type: MessageType, default_mode: DeliveryMode) -> Self {
        Self {
            message_type,
            default_mode: default_mode.concrete(),
            inner: RefCell::new(ChannelInner {
                listeners: ListenerRegistry::new(),
                pending: VecDeque::new(),
            }),
        }
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Mode used when a dispatch asks for [`DeliveryMode::Default`].
    #[must_use]
    pub fn default_mode(&self) -> DeliveryMode {
        self.default_mode
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        if self.inner.borrow().listeners.is_empty() {
            ChannelState::Idle
        } else {
            ChannelState::Active
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub(crate) fn add_listener(&self, key: ListenerKey, adapter: ErasedListener) -> bool {
        self.inner.borrow_mut().listeners.insert(key, adapter)
    }

    pub(crate) fn remove_listener(&self, key: &ListenerKey) -> bool {
        self.inner.borrow_mut().listeners.remove(key)
    }

    pub(crate) fn has_listener(&self, key: &ListenerKey) -> bool {
        self.inner.borrow().listeners.contains(key)
    }

    /// Route `payload` according to `mode` (or this channel's default).
    ///
    /// Returns the mode that was actually used.
    pub(crate) fn dispatch(
        &self,
        payload: Box<dyn Any>,
        mode: DeliveryMode,
    ) -> BusResult<DeliveryMode> {
        let effective = mode.or(self.default_mode);
        match effective {
            DeliveryMode::Now => self.dispatch_now(payload.as_ref())?,
            DeliveryMode::NextTick => self.enqueue_deferred(payload),
            DeliveryMode::Default => {
                return Err(BusError::InvalidDeliveryMode {
                    value: effective.to_string(),
                })
            }
        }
        Ok(effective)
    }

    /// Invoke every listener, in registration order, with `payload`.
    ///
    /// The listener list is snapshotted first; registrations made by a
    /// listener take effect from the next dispatch. The first failure stops
    /// delivery and is returned.
    pub(crate) fn dispatch_now(&self, payload: &dyn Any) -> BusResult<()> {
        let listeners = self.inner.borrow().listeners.snapshot();
        if listeners.is_empty() {
            return Ok(());
        }

        trace!(
            message_type = %self.message_type,
            listeners = listeners.len(),
            "Delivering message"
        );

        for listener in listeners {
            listener(payload).map_err(|source| BusError::Listener {
                message_type: self.message_type,
                source,
            })?;
        }
        Ok(())
    }

    pub(crate) fn enqueue_deferred(&self, payload: Box<dyn Any>) {
        self.inner.borrow_mut().pending.push_back(payload);
    }

    /// Deliver the payloads that were queued when the flush began.
    ///
    /// Exactly that many entries are consumed, with or without listeners.
    /// Payloads queued by listeners during the flush wait for the next one.
    /// On a listener failure the failing payload is consumed and the rest of
    /// this generation stays queued.
    pub(crate) fn flush_deferred(&self) -> BusResult<usize> {
        let generation = self.inner.borrow().pending.len();
        if generation == 0 {
            return Ok(0);
        }

        // A listener may flush re-entrantly and consume part of this
        // generation; only payloads popped here are counted.
        let mut delivered = 0;
        for _ in 0..generation {
            let Some(payload) = self.inner.borrow_mut().pending.pop_front() else {
                break;
            };
            delivered += 1;
            self.dispatch_now(payload.as_ref())?;
        }

        trace!(
            message_type = %self.message_type,
            delivered,
            "Flushed deferred messages"
        );
        Ok(delivered)
    }

    /// Detach every listener and return how many there were.
    pub(crate) fn remove_all_listeners(&self) -> usize {
        self.inner.borrow_mut().listeners.clear()
    }

    /// Drop queued payloads without delivering them.
    pub(crate) fn clear_pending(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.pending.len();
        inner.pending.clear();
        dropped
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("message_type", &self.message_type)
            .field("default_mode", &self.default_mode)
            .field("listeners", &self.listener_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}
