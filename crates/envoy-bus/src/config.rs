//! # Bus Configuration
//!
//! Per-type default delivery modes and bus-wide switches.
//!
//! Modes come from two places:
//!
//! - [`DispatchModeTable::register`]: static registration in code, by type.
//! - [`BusConfig::dispatch_modes`]: name-keyed overrides loaded from the
//!   environment or JSON, e.g. `ENVOY_DISPATCH_MODES="ScoreChanged=next_tick"`.
//!
//! A name matches either the full type path or its last segment. A type
//! registered in code keeps its mode even if a name override also matches.

use crate::error::{BusError, BusResult};
use crate::message::{DeliveryMode, Message, MessageType};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::env;

/// Supplies a channel's default delivery mode when the channel is created.
pub trait DispatchModeSource {
    /// `None` means "no preference" (the channel delivers immediately).
    fn default_mode(&self, message_type: &MessageType) -> Option<DeliveryMode>;
}

/// Static type → mode mapping, with optional name-keyed overrides.
#[derive(Debug, Clone, Default)]
pub struct DispatchModeTable {
    by_type: HashMap<TypeId, DeliveryMode>,
    by_name: HashMap<String, DeliveryMode>,
}

impl DispatchModeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default mode for messages of type `M`.
    pub fn register<M: Message>(&mut self, mode: DeliveryMode) -> &mut Self {
        self.by_type.insert(TypeId::of::<M>(), mode);
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with<M: Message>(mut self, mode: DeliveryMode) -> Self {
        self.register::<M>(mode);
        self
    }

    /// Set the default mode for a type by name.
    pub fn register_name(&mut self, name: impl Into<String>, mode: DeliveryMode) -> &mut Self {
        self.by_name.insert(name.into(), mode);
        self
    }

    /// Parse and apply `name -> mode` overrides.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidDeliveryMode` if any value is not a known mode.
    /// Nothing is applied in that case.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> BusResult<()> {
        let parsed = overrides
            .iter()
            .map(|(name, mode)| mode.parse::<DeliveryMode>().map(|m| (name.clone(), m)))
            .collect::<BusResult<Vec<_>>>()?;
        self.by_name.extend(parsed);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len() + self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DispatchModeSource for DispatchModeTable {
    fn default_mode(&self, message_type: &MessageType) -> Option<DeliveryMode> {
        if let Some(mode) = self.by_type.get(&message_type.id()) {
            return Some(*mode);
        }
        self.by_name
            .get(message_type.name())
            .or_else(|| self.by_name.get(message_type.short_name()))
            .copied()
    }
}

/// Bus-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Report listeners/responders still registered at teardown.
    pub report_leaks: bool,

    /// Type name → delivery mode (`now`, `next_tick`, ...).
    pub dispatch_modes: HashMap<String, String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            report_leaks: true,
            dispatch_modes: HashMap::new(),
        }
    }
}

impl BusConfig {
    /// Read configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ENVOY_REPORT_LEAKS`: Report leaks at teardown (default: true)
    /// - `ENVOY_DISPATCH_MODES`: Comma-separated `TypeName=mode` pairs
    ///
    /// # Errors
    ///
    /// `BusError::Config` if `ENVOY_DISPATCH_MODES` has an entry without `=`.
    pub fn from_env() -> BusResult<Self> {
        let report_leaks = env::var("ENVOY_REPORT_LEAKS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let dispatch_modes = match env::var("ENVOY_DISPATCH_MODES") {
            Ok(raw) => parse_mode_list(&raw)?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            report_leaks,
            dispatch_modes,
        })
    }

    /// Parse configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// `BusError::Config` if the document is malformed.
    pub fn from_json(json: &str) -> BusResult<Self> {
        serde_json::from_str(json).map_err(|e| BusError::Config(e.to_string()))
    }

    /// Combine the name-keyed overrides with a static table.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidDeliveryMode` if an override names an unknown mode.
    pub fn mode_table(&self, mut table: DispatchModeTable) -> BusResult<DispatchModeTable> {
        table.apply_overrides(&self.dispatch_modes)?;
        Ok(table)
    }
}

fn parse_mode_list(raw: &str) -> BusResult<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(name, mode)| (name.trim().to_string(), mode.trim().to_string()))
                .ok_or_else(|| BusError::Config(format!("expected TypeName=mode, got '{entry}'")))
        })
        .collect()
}
