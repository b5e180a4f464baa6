//! Application layer
//!
//! Use cases orchestrating the domain over the infrastructure
//! adapters.
//!
//! - `sync`: the market synchronization facade wiring the snapshot
//!   loader, stream client, reconciliation store and status publisher
//!   together.

/// Market synchronization facade.
pub mod sync;
