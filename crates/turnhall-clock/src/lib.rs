//! Suspendable countdown timers for Turnhall.
//!
//! Provides [`PausableTimer`], a countdown that can be paused, resumed,
//! topped up, and stopped without losing its remaining time, and
//! [`MatchClock`], two such timers paired into a standard match clock
//! (exactly one side counting down at a time during play).
//!
//! # Integration
//!
//! A timer does not schedule callbacks. Instead it exposes an awaitable
//! expiry future designed to sit inside a room actor's `tokio::select!`
//! loop; while the timer is paused or stopped the future pends forever,
//! so the other branches keep running:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         flagged = clock.expired() => { /* the `flagged` side ran out */ }
//!     }
//! }
//! ```
//!
//! Built on `tokio::time`, so tests drive expiry deterministically with a
//! paused runtime clock — no real sleeping.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};
use turnhall_protocol::{Color, TimerState};

// ---------------------------------------------------------------------------
// PausableTimer
// ---------------------------------------------------------------------------

/// A suspendable countdown.
///
/// State is just the remaining duration plus, while counting down, the
/// instant counting started. There is no background task: `time_left` is
/// computed at the instant of query, and expiry is observed by awaiting
/// [`expired`](Self::expired).
///
/// A freshly created timer is stopped; arm it with `start(Some(dur))`.
#[derive(Debug)]
pub struct PausableTimer {
    /// Remaining time as of `started_at` (or as of the last pause).
    remaining: Duration,
    /// `Some` while actively counting down.
    started_at: Option<Instant>,
    /// Terminal flag: a stopped (or fired) timer will not resume without
    /// an explicit new duration.
    stopped: bool,
}

impl PausableTimer {
    /// Creates a stopped timer with no time on it.
    pub fn new() -> Self {
        Self {
            remaining: Duration::ZERO,
            started_at: None,
            stopped: true,
        }
    }

    /// Begins or resumes the countdown.
    ///
    /// With `Some(duration)` the remaining time is (re)initialized and
    /// the timer is re-armed even if it was stopped or had fired. With
    /// `None` the countdown resumes from the last known remaining time;
    /// this is a no-op while already running (idempotent) and on a
    /// stopped timer.
    pub fn start(&mut self, duration: Option<Duration>) {
        match duration {
            Some(d) => {
                self.remaining = d;
                self.started_at = Some(Instant::now());
                self.stopped = false;
                debug!(remaining_ms = d.as_millis() as u64, "timer armed");
            }
            None => {
                if self.started_at.is_some() {
                    return;
                }
                if self.stopped {
                    trace!("resume on stopped timer ignored");
                    return;
                }
                self.started_at = Some(Instant::now());
                trace!(remaining_ms = self.remaining.as_millis() as u64, "timer resumed");
            }
        }
    }

    /// Freezes the remaining time without giving up the timer's identity.
    /// Safe to call when not running.
    pub fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.remaining = self.remaining.saturating_sub(started.elapsed());
            trace!(remaining_ms = self.remaining.as_millis() as u64, "timer paused");
        }
    }

    /// Cancels the countdown permanently: no expiry will be observed and
    /// `start(None)` will not resume. The remaining time freezes at its
    /// current value for snapshot purposes.
    pub fn stop(&mut self) {
        self.pause();
        self.stopped = true;
    }

    /// Adds time, whether running, paused, or stopped.
    pub fn add_time(&mut self, delta: Duration) {
        self.remaining += delta;
    }

    /// Remaining time at the instant of query.
    pub fn time_left(&self) -> Duration {
        match self.started_at {
            Some(started) => self.remaining.saturating_sub(started.elapsed()),
            None => self.remaining,
        }
    }

    /// Whether the timer is actively counting down right now.
    pub fn is_going(&self) -> bool {
        self.started_at.is_some()
    }

    /// The instant this timer will expire, if it is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|started| started + self.remaining)
    }

    /// Resolves when the countdown reaches zero; pends forever while the
    /// timer is paused or stopped.
    ///
    /// Expiry is observed exactly once: on resolution the timer becomes
    /// inert (stopped, zero remaining) until restarted with an explicit
    /// duration. Dropping the future before it resolves leaves the timer
    /// untouched, so it is safe to recreate inside a `select!` loop.
    pub async fn expired(&mut self) {
        match self.deadline() {
            Some(deadline) => {
                time::sleep_until(deadline).await;
                self.remaining = Duration::ZERO;
                self.started_at = None;
                self.stopped = true;
                debug!("timer expired");
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for PausableTimer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MatchClock
// ---------------------------------------------------------------------------

/// Two [`PausableTimer`]s paired into a match clock.
///
/// Exactly one side is ever counting down during play. A completed move
/// switches sides: the mover's clock pauses and the opponent's starts.
/// A clock starting for the very first time is initialized to the full
/// initial duration with no increment; a clock *resuming* on a switch is
/// first credited the increment — which means each player collects the
/// increment for a completed move when their clock next starts.
#[derive(Debug)]
pub struct MatchClock {
    white: PausableTimer,
    black: PausableTimer,
    initial: Duration,
    increment: Duration,
    /// Which sides have ever counted down (drives first-start handling).
    has_run: [bool; 2],
}

impl MatchClock {
    /// Creates a clock with both sides idle and holding the full
    /// initial time, so snapshots of a side that has not started yet
    /// read `initial` rather than zero.
    pub fn new(initial: Duration, increment: Duration) -> Self {
        let mut white = PausableTimer::new();
        white.add_time(initial);
        let mut black = PausableTimer::new();
        black.add_time(initial);
        Self {
            white,
            black,
            initial,
            increment,
            has_run: [false, false],
        }
    }

    fn timer(&self, color: Color) -> &PausableTimer {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn timer_mut(&mut self, color: Color) -> &mut PausableTimer {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    fn mark_run(&mut self, color: Color) {
        self.has_run[color as usize] = true;
    }

    fn has_run(&self, color: Color) -> bool {
        self.has_run[color as usize]
    }

    /// Starts the first mover's countdown at the full initial time.
    pub fn start(&mut self, first_mover: Color) {
        let initial = self.initial;
        self.timer_mut(first_mover).start(Some(initial));
        self.mark_run(first_mover);
        debug!(side = %first_mover, "match clock started");
    }

    /// The side currently counting down, if any.
    pub fn running(&self) -> Option<Color> {
        if self.white.is_going() {
            Some(Color::White)
        } else if self.black.is_going() {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Switches sides after a completed move: pauses the running clock
    /// and starts the opponent's (crediting the increment on a resume).
    /// Does nothing if no side is running.
    pub fn switch(&mut self) {
        let Some(side) = self.running() else {
            warn!("clock switch with no side running — ignoring");
            return;
        };
        self.timer_mut(side).pause();

        let next = side.opposite();
        if self.has_run(next) {
            let increment = self.increment;
            self.timer_mut(next).add_time(increment);
            self.timer_mut(next).start(None);
        } else {
            let initial = self.initial;
            self.timer_mut(next).start(Some(initial));
            self.mark_run(next);
        }
        trace!(side = %next, "clock switched");
    }

    /// Freezes both sides; remaining time survives and play can resume.
    pub fn pause_all(&mut self) {
        self.white.pause();
        self.black.pause();
    }

    /// Stops both sides for good — the game is over.
    pub fn stop_all(&mut self) {
        self.white.stop();
        self.black.stop();
    }

    /// Remaining time on one side at the instant of query.
    pub fn time_left(&self, color: Color) -> Duration {
        self.timer(color).time_left()
    }

    /// Read-only snapshot of both sides, in milliseconds.
    pub fn snapshot(&self) -> TimerState {
        TimerState {
            white_ms: self.white.time_left().as_millis() as u64,
            black_ms: self.black.time_left().as_millis() as u64,
        }
    }

    /// Resolves with the side whose countdown reached zero; pends forever
    /// while neither side is running.
    pub async fn expired(&mut self) -> Color {
        tokio::select! {
            () = self.white.expired() => Color::White,
            () = self.black.expired() => Color::Black,
        }
    }
}
