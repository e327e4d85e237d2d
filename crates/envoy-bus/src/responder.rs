//! # Responder Registry
//!
//! A service locator keyed by `(return type, argument type)`. At most one
//! responder may occupy a key; a second registration is rejected and
//! reported, and the first keeps answering.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{BusError, BusResult};
use crate::message::MessageType;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

type ArgResponder<A, R> = Rc<dyn Fn(A) -> R>;
type UnitResponder<R> = Rc<dyn Fn() -> R>;

/// Identity of a responder slot. The argument type is `None` for responders
/// that take no argument.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponderKey {
    return_type: MessageType,
    argument_type: Option<MessageType>,
}

impl ResponderKey {
    /// Key for a responder taking `A` and returning `R`.
    #[must_use]
    pub fn new<A: 'static, R: 'static>() -> Self {
        Self {
            return_type: MessageType::of::<R>(),
            argument_type: Some(MessageType::of::<A>()),
        }
    }

    /// Key for a responder taking no argument and returning `R`.
    #[must_use]
    pub fn unit<R: 'static>() -> Self {
        Self {
            return_type: MessageType::of::<R>(),
            argument_type: None,
        }
    }

    #[must_use]
    pub fn return_type(&self) -> MessageType {
        self.return_type
    }

    #[must_use]
    pub fn argument_type(&self) -> Option<MessageType> {
        self.argument_type
    }

    /// Argument type name, or `null` for argument-less responders.
    #[must_use]
    pub fn argument_label(&self) -> String {
        self.argument_type
            .map_or_else(|| "null".to_string(), |ty| ty.to_string())
    }

    fn not_found(&self) -> BusError {
        BusError::ResponderNotFound {
            return_type: self.return_type,
            argument_type: self.argument_type,
        }
    }
}

impl fmt::Debug for ResponderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponderKey({self})")
    }
}

impl fmt::Display for ResponderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "argument type: '{}', return type: '{}'",
            self.argument_label(),
            self.return_type
        )
    }
}

/// Single-responder-per-key registry.
///
/// Handlers are stored type-erased as `Box<dyn Any>` holding an
/// `Rc<dyn Fn(A) -> R>` (or `Rc<dyn Fn() -> R>`); the key guarantees the
/// concrete type, so recovery only fails if that guarantee is broken.
pub struct ResponderRegistry {
    responders: RefCell<HashMap<ResponderKey, Box<dyn Any>>>,
    sink: Rc<dyn DiagnosticSink>,
}

impl ResponderRegistry {
    pub fn new(sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            responders: RefCell::new(HashMap::new()),
            sink,
        }
    }

    /// Register a responder taking `A` and returning `R`.
    ///
    /// Returns `false` (and reports a duplicate) if the key is taken.
    pub fn add<A, R, F>(&self, handler: F) -> bool
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + 'static,
    {
        let handler: ArgResponder<A, R> = Rc::new(handler);
        self.insert(ResponderKey::new::<A, R>(), Box::new(handler))
    }

    /// Register a responder taking no argument and returning `R`.
    pub fn add_unit<R, F>(&self, handler: F) -> bool
    where
        R: 'static,
        F: Fn() -> R + 'static,
    {
        let handler: UnitResponder<R> = Rc::new(handler);
        self.insert(ResponderKey::unit::<R>(), Box::new(handler))
    }

    fn insert(&self, key: ResponderKey, handler: Box<dyn Any>) -> bool {
        let mut responders = self.responders.borrow_mut();
        if responders.contains_key(&key) {
            drop(responders);
            self.sink.report(Diagnostic::DuplicateResponder { key });
            return false;
        }
        responders.insert(key, handler);
        debug!(responder = %key, "Responder registered");
        true
    }

    /// Remove the responder taking `A` and returning `R`, if any.
    pub fn remove<A: 'static, R: 'static>(&self) -> bool {
        self.remove_key(&ResponderKey::new::<A, R>())
    }

    /// Remove the argument-less responder returning `R`, if any.
    pub fn remove_unit<R: 'static>(&self) -> bool {
        self.remove_key(&ResponderKey::unit::<R>())
    }

    fn remove_key(&self, key: &ResponderKey) -> bool {
        self.responders.borrow_mut().remove(key).is_some()
    }

    /// Ask the responder for `(A, R)` to compute a value.
    ///
    /// # Errors
    ///
    /// - `BusError::ResponderNotFound` if nothing is registered for `(A, R)`
    /// - `BusError::ResponderTypeMismatch` if the stored handler has another shape
    pub fn request<A: 'static, R: 'static>(&self, argument: A) -> BusResult<R> {
        let key = ResponderKey::new::<A, R>();
        let handler = self.lookup::<ArgResponder<A, R>>(&key)?;
        Ok(handler(argument))
    }

    /// Ask the argument-less responder for `R` to compute a value.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub fn request_unit<R: 'static>(&self) -> BusResult<R> {
        let key = ResponderKey::unit::<R>();
        let handler = self.lookup::<UnitResponder<R>>(&key)?;
        Ok(handler())
    }

    /// Clone the handler out so no borrow is held while it runs.
    fn lookup<H: Clone + 'static>(&self, key: &ResponderKey) -> BusResult<H> {
        let found = {
            let responders = self.responders.borrow();
            let stored = responders.get(key).ok_or_else(|| key.not_found())?;
            stored.downcast_ref::<H>().cloned()
        };

        found.ok_or_else(|| {
            self.sink.report(Diagnostic::ResponderInvocation {
                key: *key,
                reason: "stored handler has an unexpected signature".to_string(),
            });
            BusError::ResponderTypeMismatch {
                return_type: key.return_type,
                argument_type: key.argument_type,
            }
        })
    }

    #[must_use]
    pub fn contains<A: 'static, R: 'static>(&self) -> bool {
        self.responders
            .borrow()
            .contains_key(&ResponderKey::new::<A, R>())
    }

    #[must_use]
    pub fn contains_unit<R: 'static>(&self) -> bool {
        self.responders
            .borrow()
            .contains_key(&ResponderKey::unit::<R>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responders.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responders.borrow().is_empty()
    }

    /// Drop every responder. Keys still registered are returned and, if
    /// `report_leaks` is set, reported as a leak.
    pub fn teardown(&self, report_leaks: bool) -> Vec<ResponderKey> {
        let drained = std::mem::take(&mut *self.responders.borrow_mut());
        let leaked: Vec<ResponderKey> = drained.into_keys().collect();

        if report_leaks && !leaked.is_empty() {
            self.sink.report(Diagnostic::LeakedResponders {
                keys: leaked.clone(),
            });
        }
        leaked
    }
}

impl fmt::Debug for ResponderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponderRegistry")
            .field("responders", &self.len())
            .finish()
    }
}
