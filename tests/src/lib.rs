//! # Envoy Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── dispatch_benchmarks.rs   # criterion: dispatch, flush, request
//! └── src/
//!     └── integration/
//!         ├── flows.rs             # delivery, registration and lookup rules
//!         └── lifecycle.rs         # config, tick driver and teardown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p envoy-tests
//!
//! # By category
//! cargo test -p envoy-tests integration::flows::
//! cargo test -p envoy-tests integration::lifecycle::
//!
//! # Benchmarks
//! cargo bench -p envoy-tests
//! ```

pub mod integration;
