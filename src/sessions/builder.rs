//! Fluent construction of a [`MatchCoordinator`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::RelayError;
use crate::network::transport::Transport;
use crate::sessions::config::CoordinatorConfig;
use crate::sessions::coordinator::MatchCoordinator;
use crate::telemetry::ViolationObserver;
use crate::Config;

/// Builds a [`MatchCoordinator`].
///
/// Individual setters never fail; the assembled configuration is validated
/// once, in [`build`](Self::build).
///
/// ```
/// # #[cfg(feature = "chess")]
/// # {
/// use rook_relay::chess::ChessRules;
/// use rook_relay::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Club;
/// impl Config for Club {
///     type Peer = String;
///     type Rules = ChessRules;
/// }
///
/// let coordinator = CoordinatorBuilder::<Club>::new()
///     .with_tick_interval(Duration::from_millis(250))
///     .with_code_length(8)
///     .build(ChessRules::new(), Arc::new(ChannelTransport::<Club>::new()))
///     .unwrap();
/// assert_eq!(coordinator.config().code_length, 8);
/// # }
/// ```
#[must_use = "CoordinatorBuilder must be consumed by calling build()"]
pub struct CoordinatorBuilder<T>
where
    T: Config,
{
    config: CoordinatorConfig,
    /// Optional observer for violations; `None` logs through `tracing`.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
    _config: std::marker::PhantomData<fn() -> T>,
}

impl<T: Config> std::fmt::Debug for CoordinatorBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            config,
            violation_observer,
            _config,
        } = self;

        f.debug_struct("CoordinatorBuilder")
            .field("config", config)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl<T: Config> Default for CoordinatorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> CoordinatorBuilder<T> {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            violation_observer: None,
            _config: std::marker::PhantomData,
        }
    }

    /// Replaces every setting at once, typically with a preset.
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Period of the `timeUpdate` broadcast. Default is 1s.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Join code length in characters. Default is 6.
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.config.code_length = length;
        self
    }

    /// Largest time control a creator may request, in minutes. Default is 180.
    pub fn with_max_time_control_minutes(mut self, minutes: u32) -> Self {
        self.config.max_time_control_minutes = minutes;
        self
    }

    /// Seeds code generation and color coin flips.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Routes violations (unknown peers, code collisions, undecodable frames,
    /// broken invariants) to `observer` instead of `tracing`.
    ///
    /// ```
    /// # #[cfg(feature = "chess")]
    /// # {
    /// use rook_relay::chess::ChessRules;
    /// use rook_relay::prelude::*;
    /// use rook_relay::telemetry::CollectingObserver;
    /// use std::sync::Arc;
    ///
    /// struct Club;
    /// impl Config for Club {
    ///     type Peer = u16;
    ///     type Rules = ChessRules;
    /// }
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let coordinator = CoordinatorBuilder::<Club>::new()
    ///     .with_violation_observer(observer.clone())
    ///     .build(ChessRules::new(), Arc::new(ChannelTransport::<Club>::new()))
    ///     .unwrap();
    /// assert!(coordinator.handle_frame(&1, "not json").is_err());
    /// assert_eq!(observer.len(), 1);
    /// # }
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Consumes the builder to construct a [`MatchCoordinator`].
    ///
    /// # Errors
    /// - Returns [`RelayError::InvalidConfig`] if any setting is out of range.
    pub fn build(
        self,
        rules: T::Rules,
        transport: Arc<dyn Transport<T>>,
    ) -> Result<MatchCoordinator<T>, RelayError> {
        self.config.validate()?;
        Ok(MatchCoordinator::new(
            rules,
            transport,
            self.config,
            self.violation_observer,
        ))
    }
}
