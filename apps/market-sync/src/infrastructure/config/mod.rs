//! Configuration
//!
//! Environment-driven settings for the sync core.

mod settings;

pub use settings::{
    BackendSettings, BearerToken, ConfigError, StoreSettings, StreamSettings, SyncConfig,
};
