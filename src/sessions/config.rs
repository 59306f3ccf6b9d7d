//! Configuration for a [`MatchCoordinator`](crate::MatchCoordinator).
//!
//! | Preset | Purpose |
//! |--------|---------|
//! | [`CoordinatorConfig::casual()`] | Defaults for a public server |
//! | [`CoordinatorConfig::testing()`] | Reproducible codes and coin flips |
//! | [`CoordinatorConfig::deterministic()`] | Defaults with a fixed RNG seed |
//!
//! ```
//! use rook_relay::CoordinatorConfig;
//! use std::time::Duration;
//!
//! let config = CoordinatorConfig {
//!     tick_interval: Duration::from_millis(500),
//!     ..CoordinatorConfig::casual()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::error::RelayError;

/// Seed used by [`CoordinatorConfig::testing()`].
pub const TESTING_RNG_SEED: u64 = 0x00C0_FFEE;

/// Settings for a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "CoordinatorConfig has no effect unless passed to CoordinatorBuilder::with_config()"]
pub struct CoordinatorConfig {
    /// Period of the ambient clock refresh sent to both peers of an active
    /// session.
    ///
    /// Default: 1s
    pub tick_interval: Duration,

    /// Number of base-36 characters in a join code.
    ///
    /// Default: 6
    pub code_length: usize,

    /// Largest accepted `timeControlMinutes`.
    ///
    /// Default: 180
    pub max_time_control_minutes: u32,

    /// Consecutive code collisions tolerated during allocation before a
    /// registry warning is reported. Allocation keeps retrying regardless.
    ///
    /// Default: 8
    pub collision_warning_threshold: u32,

    /// Optional seed for code generation and color coin flips. `None` seeds
    /// from process entropy.
    ///
    /// Default: `None`
    pub rng_seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            code_length: 6,
            max_time_control_minutes: 180,
            collision_warning_threshold: 8,
            rng_seed: None,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new `CoordinatorConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for a public server.
    pub fn casual() -> Self {
        Self::default()
    }

    /// Fixed seed, so join codes and random color assignments repeat from run
    /// to run.
    pub fn testing() -> Self {
        Self::deterministic(TESTING_RNG_SEED)
    }

    /// Defaults with a fixed RNG seed.
    ///
    /// ```
    /// use rook_relay::CoordinatorConfig;
    ///
    /// let config = CoordinatorConfig::deterministic(42);
    /// assert_eq!(config.rng_seed, Some(42));
    /// ```
    pub fn deterministic(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.tick_interval < Duration::from_millis(10)
            || self.tick_interval > Duration::from_secs(60)
        {
            return Err(RelayError::InvalidConfig {
                field: "tick_interval",
                reason: format!(
                    "must be between 10ms and 60s, got {}ms",
                    self.tick_interval.as_millis()
                ),
            });
        }

        // Below 4 characters the code space is small enough to exhaust.
        if !(4..=16).contains(&self.code_length) {
            return Err(RelayError::InvalidConfig {
                field: "code_length",
                reason: format!("must be between 4 and 16, got {}", self.code_length),
            });
        }

        if !(1..=1440).contains(&self.max_time_control_minutes) {
            return Err(RelayError::InvalidConfig {
                field: "max_time_control_minutes",
                reason: format!(
                    "must be between 1 and 1440, got {}",
                    self.max_time_control_minutes
                ),
            });
        }

        if self.collision_warning_threshold == 0 {
            return Err(RelayError::InvalidConfig {
                field: "collision_warning_threshold",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(())
    }
}
