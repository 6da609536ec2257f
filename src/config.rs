//! Fakes Configuration
//!
//! Shared fault and clock settings, read from the environment so a failing
//! run can be replayed:
//!
//! ```bash
//! FAKES_SEED=12345 FAKES_FAILURE_PROBABILITY=0.2 cargo test
//! ```

use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::SimClock;
use crate::constants::{
    ENV_FAILURE_PROBABILITY, ENV_LATENCY_MS, ENV_SEED, ENV_START_TIME, START_TIME_DEFAULT_MS,
};
use crate::error::FakeResult;
use crate::fault::{millis, FaultPolicy};

// =============================================================================
// Errors
// =============================================================================

/// A configuration value could not be used
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
        /// Parse or range failure
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// FakesConfig
// =============================================================================

/// Settings shared by every fake in one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FakesConfig {
    /// Seed of the fault policy's generator; `None` uses the shared one
    pub seed: Option<u64>,
    /// Probability in `[0, 1]` that an operation fails
    pub failure_probability: f64,
    /// Delay applied to every operation
    pub latency: Option<Duration>,
    /// Initial time of the simulated clock
    pub start_time: DateTime<Utc>,
}

impl Default for FakesConfig {
    fn default() -> Self {
        Self {
            seed: None,
            failure_probability: 0.0,
            latency: None,
            start_time: DateTime::from_timestamp_millis(START_TIME_DEFAULT_MS).unwrap_or_default(),
        }
    }
}

impl FakesConfig {
    /// Read `FAKES_SEED`, `FAKES_FAILURE_PROBABILITY`, `FAKES_LATENCY_MS` and
    /// `FAKES_START_TIME` (RFC 3339). Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_SEED) {
            let seed = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(ENV_SEED, &raw, e))?;
            config.seed = Some(seed);
        }

        if let Some(raw) = lookup(ENV_FAILURE_PROBABILITY) {
            let probability = raw
                .trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::invalid(ENV_FAILURE_PROBABILITY, &raw, e))?;
            if !(0.0..=1.0).contains(&probability) {
                return Err(ConfigError::invalid(
                    ENV_FAILURE_PROBABILITY,
                    &raw,
                    "must be within [0, 1]",
                ));
            }
            config.failure_probability = probability;
        }

        if let Some(raw) = lookup(ENV_LATENCY_MS) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(ENV_LATENCY_MS, &raw, e))?;
            config.latency = Some(Duration::from_millis(ms));
        }

        if let Some(raw) = lookup(ENV_START_TIME) {
            let start = DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|e| ConfigError::invalid(ENV_START_TIME, &raw, e))?;
            config.start_time = start.with_timezone(&Utc);
        }

        tracing::debug!(
            seed = ?config.seed,
            failure_probability = config.failure_probability,
            latency_ms = config.latency.map(millis),
            start_time = %config.start_time,
            "fakes config loaded"
        );

        Ok(config)
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the failure probability; checked by [`fault_policy`](Self::fault_policy).
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability;
        self
    }

    /// Set the latency.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the clock's start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Build the fault policy these settings describe.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the failure probability is outside `[0, 1]`.
    pub fn fault_policy(&self) -> FakeResult<FaultPolicy> {
        let mut builder = FaultPolicy::builder().failure_probability(self.failure_probability);
        if let Some(latency) = self.latency {
            builder = builder.latency(latency);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }

    /// A fresh simulated clock at `start_time`.
    pub fn clock(&self) -> SimClock {
        SimClock::at(self.start_time)
    }
}

// =============================================================================
// Tests
// =============================================================================
