//! Infrastructure layer
//!
//! Adapters for the outside world: configuration, logging, the REST
//! backend, the persistent stream connection and derived status.

/// Configuration loading.
pub mod config;

/// Tracing initialization.
pub mod telemetry;

/// REST API client and snapshot loader.
pub mod rest;

/// Persistent stream connection management.
pub mod stream;

/// Connectivity status derivation and broadcast.
pub mod status;
