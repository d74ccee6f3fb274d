//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Default iteration bound for the square-root workload.
pub const DEFAULT_ITERATIONS: u64 = 1_000_000_000;

/// Offload demo configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OffloadConfig {
    /// Iteration bound for the square-root sum.
    pub iterations: u64,
    /// Liveness loop tick interval.
    pub tick_interval: Duration,
    /// Numbers sent to the worker in the start message.
    pub payload: Vec<f64>,
    /// How long the host keeps ticking after the outcome arrives.
    pub linger: Duration,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            tick_interval: Duration::from_secs(1),
            payload: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            linger: Duration::ZERO,
        }
    }
}

impl OffloadConfig {
    /// Build the configuration from `OFFLOAD_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let iterations = match lookup("OFFLOAD_ITERATIONS") {
            Some(raw) => parse_u64("OFFLOAD_ITERATIONS", &raw)?,
            None => defaults.iterations,
        };

        let tick_interval = match lookup("OFFLOAD_TICK_MS") {
            Some(raw) => {
                let ms = parse_u64("OFFLOAD_TICK_MS", &raw)?;
                if ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "OFFLOAD_TICK_MS".to_string(),
                        message: "interval must be greater than zero".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => defaults.tick_interval,
        };

        let payload = match lookup("OFFLOAD_PAYLOAD") {
            Some(raw) => parse_payload(&raw)?,
            None => defaults.payload,
        };

        let linger = match lookup("OFFLOAD_LINGER_MS") {
            Some(raw) => Duration::from_millis(parse_u64("OFFLOAD_LINGER_MS", &raw)?),
            None => defaults.linger,
        };

        Ok(Self {
            iterations,
            tick_interval,
            payload,
            linger,
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .replace('_', "")
        .parse()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}

/// Parse a comma-separated list of finite numbers. Empty input yields an
/// empty payload.
fn parse_payload(raw: &str) -> Result<Vec<f64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let value: f64 = s.parse().map_err(|e| ConfigError::InvalidValue {
                key: "OFFLOAD_PAYLOAD".to_string(),
                message: format!("{s:?}: {e}"),
            })?;
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    key: "OFFLOAD_PAYLOAD".to_string(),
                    message: format!("{s:?} is not finite"),
                });
            }
            Ok(value)
        })
        .collect()
}
