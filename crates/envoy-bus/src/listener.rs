//! # Listeners
//!
//! A [`Listener`] is the caller-facing handle; its allocation is its identity.
//! The bus never stores the handle itself. It stores a type-erased adapter
//! keyed by the handle's [`ListenerKey`], so callers can later remove exactly
//! what they added.

use crate::message::Message;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Outcome of a single listener invocation.
pub type ListenerResult = anyhow::Result<()>;

/// Type-erased invocation adapter stored by channels.
pub(crate) type ErasedListener = Rc<dyn Fn(&dyn Any) -> ListenerResult>;

/// A cloneable listener handle for messages of type `M`.
///
/// Clones share identity: adding a clone of an already added listener is a
/// duplicate, and removing any clone removes the registration.
pub struct Listener<M: Message> {
    inner: Rc<dyn Fn(&M) -> ListenerResult>,
}

impl<M: Message> Listener<M> {
    /// Wrap a closure that receives the payload.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&M) -> ListenerResult + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Wrap a closure that only cares that a message of type `M` arrived.
    pub fn unit<F>(f: F) -> Self
    where
        F: Fn() -> ListenerResult + 'static,
    {
        Self::new(move |_: &M| f())
    }

    /// Identity of this handle (shared by all clones).
    #[must_use]
    pub fn key(&self) -> ListenerKey {
        ListenerKey(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Invoke the listener directly, bypassing the bus.
    pub fn call(&self, message: &M) -> ListenerResult {
        (self.inner)(message)
    }

    /// Build the adapter a channel stores for this handle.
    ///
    /// Payloads of any other type are ignored; channels only ever hand the
    /// adapter payloads of their own message type.
    pub(crate) fn erase(&self) -> ErasedListener {
        let inner = Rc::clone(&self.inner);
        Rc::new(move |payload: &dyn Any| match payload.downcast_ref::<M>() {
            Some(message) => inner(message),
            None => Ok(()),
        })
    }
}

impl<M: Message> Clone for Listener<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: Message> fmt::Debug for Listener<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("message_type", &std::any::type_name::<M>())
            .field("key", &self.key())
            .finish()
    }
}

/// Opaque identity of a [`Listener`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(usize);

/// Ordered listener set with identity lookup.
///
/// Invocation order is registration order. The side map gives O(1)
/// duplicate detection and adapter lookup by identity.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    order: Vec<ListenerKey>,
    adapters: HashMap<ListenerKey, ErasedListener>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under `key`. Returns `false` if `key` is present.
    pub(crate) fn insert(&mut self, key: ListenerKey, adapter: ErasedListener) -> bool {
        if self.adapters.contains_key(&key) {
            return false;
        }
        self.adapters.insert(key, adapter);
        self.order.push(key);
        true
    }

    /// Remove the adapter registered under `key`. Returns `false` if absent.
    pub(crate) fn remove(&mut self, key: &ListenerKey) -> bool {
        if self.adapters.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }

    pub(crate) fn contains(&self, key: &ListenerKey) -> bool {
        self.adapters.contains_key(key)
    }

    /// Adapters in registration order, detached from the registry.
    pub(crate) fn snapshot(&self) -> Vec<ErasedListener> {
        self.order
            .iter()
            .filter_map(|key| self.adapters.get(key).cloned())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop every registration, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.order.len();
        self.order.clear();
        self.adapters.clear();
        removed
    }
}
