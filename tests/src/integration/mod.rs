//! Cross-module scenarios run against the public `envoy_bus` API only.

pub mod lifecycle;
