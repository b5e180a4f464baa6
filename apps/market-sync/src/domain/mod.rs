//! Domain layer
//!
//! Core market-data types and synchronization state with no transport
//! dependencies.

/// Per-symbol quotes and scanner alerts.
pub mod market;

/// Typed stream events and upstream commands.
pub mod events;

/// Observer registry and symbol interest tracking.
pub mod subscription;

/// Snapshot/stream reconciliation store.
pub mod store;
