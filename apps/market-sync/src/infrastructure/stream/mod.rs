//! Stream Connection Infrastructure
//!
//! Owns the single persistent WebSocket connection: lifecycle state
//! machine, automatic reconnection with backoff, message decode and
//! dispatch into the subscription registry, and upstream
//! subscribe/unsubscribe commands.

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;

pub use client::{ConnectionState, StreamClient, StreamClientConfig, StreamClientError};
pub use codec::{CodecError, JsonCodec};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
