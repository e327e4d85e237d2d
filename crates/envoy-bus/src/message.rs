//! # Message Types
//!
//! Type identity for payloads and the delivery modes a dispatch can request.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Marker for anything that can travel through the bus.
///
/// Blanket-implemented for every `'static` type; the bus only cares about
/// type identity, never about payload contents.
pub trait Message: 'static {}

impl<T: 'static> Message for T {}

/// Stable identity of a message (or responder argument/return) type.
///
/// Equality and hashing use the [`TypeId`] only; the name is carried for
/// diagnostics and for name-based configuration lookups.
#[derive(Clone, Copy)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// Identity of `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, e.g. `my_game::events::ScoreChanged`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with the module path stripped, e.g. `ScoreChanged`.
    ///
    /// Generic arguments are kept as written.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let head_end = self.name.find('<').unwrap_or(self.name.len());
        let start = self.name[..head_end].rfind("::").map_or(0, |i| i + 2);
        &self.name[start..]
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// When a dispatched message reaches its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Use the channel's configured mode, falling back to [`DeliveryMode::Now`].
    #[default]
    Default,
    /// Deliver synchronously before `dispatch` returns.
    Now,
    /// Queue until the next tick's flush.
    NextTick,
}

impl DeliveryMode {
    /// Collapse `Default` onto `fallback`.
    #[must_use]
    pub fn or(self, fallback: DeliveryMode) -> DeliveryMode {
        match self {
            DeliveryMode::Default => fallback,
            other => other,
        }
    }

    /// Resolve to a concrete mode: `Default` means `Now`.
    #[must_use]
    pub fn concrete(self) -> DeliveryMode {
        self.or(DeliveryMode::Now)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Default => "default",
            DeliveryMode::Now => "now",
            DeliveryMode::NextTick => "next_tick",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(DeliveryMode::Default),
            "now" | "immediate" => Ok(DeliveryMode::Now),
            "next_tick" | "nexttick" | "next_frame" | "nextframe" | "deferred" => {
                Ok(DeliveryMode::NextTick)
            }
            _ => Err(BusError::InvalidDeliveryMode {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<u8> for DeliveryMode {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeliveryMode::Default),
            1 => Ok(DeliveryMode::Now),
            2 => Ok(DeliveryMode::NextTick),
            other => Err(BusError::InvalidDeliveryMode {
                value: other.to_string(),
            }),
        }
    }
}
