//! Per-frame callback pump for lobbywire.
//!
//! The SDK only delivers callbacks from inside `SteamAPI_RunCallbacks`, so
//! the game has to call it regularly, usually once per frame. A
//! [`CallbackPump`] owns that cadence: it decides whether a poll is due,
//! runs the dispatcher, measures how long delivery took against a budget,
//! and keeps metrics.
//!
//! # Rate-limited mode
//!
//! When `rate_hz` is 0 (the default) every poll pumps. Otherwise polls
//! that arrive before the next deadline are skipped; a poll that arrives
//! late pumps once and reports how many intervals it `missed`. It never
//! pumps twice to catch up.
//!
//! # Integration
//!
//! No threads, no timers. The host drives it from its frame loop:
//!
//! ```ignore
//! loop {
//!     pump.poll(Instant::now(), &*dispatcher);
//!     render_frame();
//! }
//! ```
//!
//! Callers that must not hold a lock across delivery split the poll in
//! two: [`CallbackPump::due`], run the dispatcher, then
//! [`CallbackPump::record`].

use std::time::{Duration, Instant};

use lobbywire_dispatch::CallbackDispatcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the callback pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Pump rate in Hz. 0 = pump on every poll.
    pub rate_hz: u32,
    /// Time budget for one delivery, in microseconds. 0 = one pump
    /// interval, or no budget monitoring when `rate_hz` is 0. Both
    /// default to 0, so an unconfigured pump never throttles or warns.
    pub budget_us: u64,
    /// Fraction of the budget (0.0–1.0) above which a warning is logged.
    pub budget_warn_threshold: f64,
    /// Fraction of the budget (0.0–1.0) above which delivery counts as
    /// over budget.
    pub budget_critical_threshold: f64,
    /// Track average and maximum delivery time.
    pub metrics_enabled: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            rate_hz: 0,
            budget_us: 0,
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
        }
    }
}

impl PumpConfig {
    /// Highest supported pump rate.
    pub const MAX_RATE_HZ: u32 = 240;

    /// A config pumping at `rate_hz` with default budgets.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`CallbackPump::new`].
    ///
    /// - `rate_hz` capped to [`Self::MAX_RATE_HZ`].
    /// - Thresholds clamped to `0.0..=1.0`, warn ≤ critical.
    pub fn validated(mut self) -> Self {
        if self.rate_hz > Self::MAX_RATE_HZ {
            warn!(
                rate = self.rate_hz,
                max = Self::MAX_RATE_HZ,
                "rate_hz exceeds maximum, clamping"
            );
            self.rate_hz = Self::MAX_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// Time between pumps, or `None` when every poll pumps.
    pub fn interval(&self) -> Option<Duration> {
        if self.rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.rate_hz)))
        }
    }

    /// Delivery budget, or `None` when nothing is monitored.
    pub fn budget(&self) -> Option<Duration> {
        if self.budget_us > 0 {
            Some(Duration::from_micros(self.budget_us))
        } else {
            self.interval()
        }
    }
}

// ---------------------------------------------------------------------------
// Per-pump results
// ---------------------------------------------------------------------------

/// A pump that [`CallbackPump::due`] decided should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the ticket to CallbackPump::record after running callbacks"]
pub struct PumpTicket {
    /// Sequence number of this pump, starting at 1.
    pub pump: u64,
    /// Whole intervals that passed without a poll before this one.
    pub missed: u64,
}

/// Information about a completed pump.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpInfo {
    /// Sequence number, starting at 1.
    pub pump: u64,
    /// Wall-clock time spent delivering callbacks.
    pub elapsed: Duration,
    /// Whole intervals skipped because the host polled late.
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the pump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpMetrics {
    /// Pumps run.
    pub total_pumps: u64,
    /// Polls that were not due and did nothing.
    pub skipped_polls: u64,
    /// Intervals missed because the host polled late.
    pub total_missed: u64,
    /// Pumps at or above the critical budget threshold.
    pub total_over_budget: u64,
    /// Exponential moving average of delivery time (α = 0.1).
    pub avg_dispatch_time: Duration,
    /// Longest delivery observed.
    pub max_dispatch_time: Duration,
    /// Last delivery time divided by the budget. >1.0 means over budget.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

/// Drives a [`CallbackDispatcher`] at a configured cadence.
#[derive(Debug)]
pub struct CallbackPump {
    config: PumpConfig,
    interval: Option<Duration>,
    budget: Option<Duration>,
    pump_count: u64,
    /// When the next pump is due. `None` until the first poll.
    next_due: Option<Instant>,
    paused: bool,
    metrics: PumpMetrics,
}

impl CallbackPump {
    /// Creates a pump from config.
    pub fn new(config: PumpConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();
        let budget = config.budget();

        debug!(
            rate_hz = config.rate_hz,
            budget_us = budget.map(|b| b.as_micros() as u64),
            "callback pump created"
        );

        Self {
            config,
            interval,
            budget,
            pump_count: 0,
            next_due: None,
            paused: false,
            metrics: PumpMetrics::default(),
        }
    }

    /// A pump at `rate_hz` with default settings.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(PumpConfig::with_rate(rate_hz))
    }

    /// Runs `dispatcher` if a pump is due at `now`.
    ///
    /// Returns `None` when paused or when the poll came before the next
    /// deadline.
    pub fn poll<D>(&mut self, now: Instant, dispatcher: &D) -> Option<PumpInfo>
    where
        D: CallbackDispatcher + ?Sized,
    {
        let ticket = self.due(now)?;
        let start = Instant::now();
        dispatcher.run_callbacks();
        Some(self.record(ticket, start.elapsed()))
    }

    /// First half of [`poll`](Self::poll): decides whether a pump is due
    /// at `now` and, if so, advances the schedule.
    pub fn due(&mut self, now: Instant) -> Option<PumpTicket> {
        if self.paused {
            return None;
        }

        let mut missed = 0u64;
        if let Some(interval) = self.interval {
            match self.next_due {
                Some(next) if now < next => {
                    self.metrics.skipped_polls += 1;
                    return None;
                }
                Some(next) => {
                    let late_by = now.saturating_duration_since(next);
                    missed = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if missed > 0 {
                        warn!(
                            pump = self.pump_count + 1,
                            missed,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "callback pump polled late, skipping ahead"
                        );
                    }
                }
                None => {}
            }
            // Schedule from now, not from the missed deadline.
            self.next_due = Some(now + interval);
        }

        self.pump_count += 1;
        self.metrics.total_missed += missed;
        Some(PumpTicket {
            pump: self.pump_count,
            missed,
        })
    }

    /// Second half of [`poll`](Self::poll): records how long delivery
    /// for `ticket` took, warns on budget overruns and updates metrics.
    pub fn record(&mut self, ticket: PumpTicket, elapsed: Duration) -> PumpInfo {
        self.metrics.total_pumps += 1;

        if let Some(budget) = self.budget {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.metrics.budget_utilization = utilization;

            if utilization >= self.config.budget_critical_threshold {
                self.metrics.total_over_budget += 1;
                warn!(
                    pump = ticket.pump,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    utilization_pct = format!("{:.1}", utilization * 100.0),
                    "CRITICAL: callback delivery exceeded budget"
                );
            } else if utilization >= self.config.budget_warn_threshold {
                warn!(
                    pump = ticket.pump,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    utilization_pct = format!("{:.1}", utilization * 100.0),
                    "callback delivery approaching budget"
                );
            }
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_dispatch_time {
                self.metrics.max_dispatch_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_dispatch_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_dispatch_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }

        trace!(pump = ticket.pump, missed = ticket.missed, "callbacks pumped");

        PumpInfo {
            pump: ticket.pump,
            elapsed,
            missed: ticket.missed,
        }
    }

    /// Stops pumping until [`resume`](Self::resume). Idempotent.
    ///
    /// Events keep queueing inside the SDK while paused.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(pump = self.pump_count, "callback pump paused");
        }
    }

    /// Resumes after a pause. The next poll pumps immediately and time
    /// spent paused does not count as missed intervals.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_due = None;
            debug!(pump = self.pump_count, "callback pump resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `true` when every poll pumps.
    pub fn is_unthrottled(&self) -> bool {
        self.interval.is_none()
    }

    /// Pumps run so far.
    pub fn pump_count(&self) -> u64 {
        self.pump_count
    }

    pub fn metrics(&self) -> &PumpMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PumpConfig {
        &self.config
    }

    /// Time between pumps, or `None` when every poll pumps.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Default for CallbackPump {
    fn default() -> Self {
        Self::new(PumpConfig::default())
    }
}
