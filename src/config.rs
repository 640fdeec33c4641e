//! Runtime configuration
//!
//! Every setting has a default and can be overridden from the environment:
//!
//! - `TELEMETRY_BIND`: listen address (default `0.0.0.0:4000`)
//! - `TELEMETRY_BATCH_SIZE`: points per size-triggered drain (default 100)
//! - `TELEMETRY_FLUSH_INTERVAL_MS`: flush scheduler period (default 1000)
//! - `TELEMETRY_MAX_BUFFER`: absolute cap on buffered points (default 5000)
//! - `TELEMETRY_DATA_DIR`: directory for the JSONL store; unset keeps points in memory
//! - `TELEMETRY_SIMULATE`: generate demo data (default false)
//! - `TELEMETRY_SIM_INTERVAL_MS`: demo tick period (default 100)
//! - `TELEMETRY_CATALOG`: JSON file with stream definitions for the simulator
//! - `TELEMETRY_CHANNEL_CAPACITY`: outbound queue length per connection (default 1024)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_buffer: usize,
    pub data_dir: Option<PathBuf>,
    pub simulate: bool,
    pub simulation_interval: Duration,
    pub catalog_path: Option<PathBuf>,
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            batch_size: 100,
            flush_interval: Duration::from_millis(1000),
            max_buffer: 5000,
            data_dir: None,
            simulate: false,
            simulation_interval: Duration::from_millis(100),
            catalog_path: None,
            channel_capacity: 1024,
        }
    }
}

impl RelayConfig {
    /// Build config from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(&lookup, key, default.as_millis() as u64))
        };

        Self {
            bind_addr: parse_or(&lookup, "TELEMETRY_BIND", defaults.bind_addr),
            batch_size: parse_or(&lookup, "TELEMETRY_BATCH_SIZE", defaults.batch_size),
            flush_interval: millis("TELEMETRY_FLUSH_INTERVAL_MS", defaults.flush_interval),
            max_buffer: parse_or(&lookup, "TELEMETRY_MAX_BUFFER", defaults.max_buffer),
            data_dir: non_empty(&lookup, "TELEMETRY_DATA_DIR").map(PathBuf::from),
            simulate: parse_or(&lookup, "TELEMETRY_SIMULATE", defaults.simulate),
            simulation_interval: millis("TELEMETRY_SIM_INTERVAL_MS", defaults.simulation_interval),
            catalog_path: non_empty(&lookup, "TELEMETRY_CATALOG").map(PathBuf::from),
            channel_capacity: parse_or(&lookup, "TELEMETRY_CHANNEL_CAPACITY", defaults.channel_capacity),
        }
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        if self.max_buffer == 0 {
            return Err(ConfigError::Zero("max_buffer"));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Zero("flush_interval"));
        }
        if self.simulation_interval.is_zero() {
            return Err(ConfigError::Zero("simulation_interval"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero("channel_capacity"));
        }
        Ok(())
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparsable setting, using default");
            default
        }),
        None => default,
    }
}
