//! Dual countdown clock with turn-based accrual.
//!
//! Every observation of the clock, whether triggered by a move or by the
//! ambient ticker, charges the real time elapsed since the previous
//! observation to the side that held the turn during that interval. There is
//! exactly one accounting path, so a move arriving between two ticks is never
//! charged twice.
//!
//! ```
//! use rook_relay::clock::MatchClock;
//! use rook_relay::Side;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let mut clock = MatchClock::new(Duration::from_secs(300));
//! let t0 = Instant::now();
//! clock.start(t0);
//!
//! // White thinks for 4 seconds, then moves: black is now on the move.
//! let reading = clock.tick(t0 + Duration::from_secs(4), Side::Black, true);
//! assert_eq!(reading.time_left.white, Duration::from_secs(296));
//! assert_eq!(reading.time_left.black, Duration::from_secs(300));
//! assert_eq!(reading.flagged, None);
//! ```

use std::ops::ControlFlow;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::Side;

/// Remaining time for both sides.
///
/// On the wire each side is a number of seconds with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLeft {
    /// Remaining time for white.
    #[serde(with = "secs_f64")]
    pub white: Duration,
    /// Remaining time for black.
    #[serde(with = "secs_f64")]
    pub black: Duration,
}

impl TimeLeft {
    /// Both sides start with the same budget.
    #[must_use]
    pub const fn uniform(per_side: Duration) -> Self {
        Self {
            white: per_side,
            black: per_side,
        }
    }

    /// Remaining time for `side`.
    #[must_use]
    pub const fn get(&self, side: Side) -> Duration {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut Duration {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// The first side (white checked first) whose time has run out.
    #[must_use]
    pub fn exhausted(&self) -> Option<Side> {
        Side::ALL.into_iter().find(|side| self.get(*side).is_zero())
    }
}

mod secs_f64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_millis() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        // Validates sign and range; the value itself is rebuilt at millisecond precision.
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)?;
        Ok(Duration::from_millis((secs * 1000.0).round() as u64))
    }
}

/// The result of observing the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Remaining time after the charge was applied.
    pub time_left: TimeLeft,
    /// The side whose time has run out, if any.
    pub flagged: Option<Side>,
}

/// Per-session countdown clock.
///
/// The clock is either stopped or running; while running it remembers when it
/// was last observed. The ambient [`Ticker`] that keeps peers' displays live is
/// owned by the clock so that stopping (or dropping) the clock always cancels
/// it.
#[derive(Debug)]
pub struct MatchClock {
    time_left: TimeLeft,
    last_tick: Option<Instant>,
    ticker: Option<Ticker>,
}

impl MatchClock {
    /// Creates a stopped clock with `per_side` on both sides.
    #[must_use]
    pub fn new(per_side: Duration) -> Self {
        Self {
            time_left: TimeLeft::uniform(per_side),
            last_tick: None,
            ticker: None,
        }
    }

    /// Remaining time for both sides, as of the last observation.
    #[must_use]
    pub const fn time_left(&self) -> TimeLeft {
        self.time_left
    }

    /// Whether the clock is accruing time.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.last_tick.is_some()
    }

    /// Whether an ambient ticker is attached.
    #[must_use]
    pub const fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    /// Starts accruing time from `now`. Returns `false` (and changes nothing)
    /// if the clock was already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.last_tick.is_some() {
            return false;
        }
        self.last_tick = Some(now);
        true
    }

    /// Hands ownership of the ambient ticker to the clock. A previously
    /// attached ticker is cancelled.
    pub fn attach_ticker(&mut self, ticker: Ticker) {
        self.ticker = Some(ticker);
    }

    /// Observes the clock at `now`.
    ///
    /// When `turn_switched` is true a move has just been made, so the interval
    /// is charged to the side that moved (the opponent of `side_to_move`);
    /// otherwise it is charged to `side_to_move`. A stopped clock charges
    /// nothing.
    pub fn tick(&mut self, now: Instant, side_to_move: Side, turn_switched: bool) -> ClockReading {
        if let Some(last) = self.last_tick {
            let charged = if turn_switched {
                side_to_move.opposite()
            } else {
                side_to_move
            };
            let elapsed = now.saturating_duration_since(last);
            let remaining = self.time_left.get_mut(charged);
            *remaining = remaining.saturating_sub(elapsed);
            self.last_tick = Some(now);
        }
        ClockReading {
            time_left: self.time_left,
            flagged: self.time_left.exhausted(),
        }
    }

    /// Stops the clock and cancels its ticker. Returns `false` if it was
    /// already stopped; calling it again is harmless.
    pub fn stop(&mut self) -> bool {
        let was_running = self.last_tick.take().is_some();
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        was_running
    }
}

impl InvariantChecker for MatchClock {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.ticker.is_some() && self.last_tick.is_none() {
            return Err(InvariantViolation::new(
                "MatchClock",
                "ticker attached to a stopped clock",
            ));
        }
        Ok(())
    }
}

/// Background task that invokes a callback at a fixed period.
///
/// The callback returns [`ControlFlow::Break`] to end the task, e.g. when the
/// session it serves no longer exists. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns the ticker on the current tokio runtime. The first call happens
    /// one `period` from now. Returns `None` when called outside a runtime.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Option<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });
        Some(Self { handle })
    }

    /// Aborts the task. Safe to call more than once.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the task has exited (finished or aborted).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
