mod config;

pub use config::{ConfigError, ProvisionConfig, RingConfig};
