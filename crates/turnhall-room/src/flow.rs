//! The `GameFlow` trait — the extension point for game types.
//!
//! The room actor is a fixed lifecycle engine: it owns membership,
//! connection state, grace and inactivity timers, broadcast fan-out, and
//! the forward-only status machine. Everything game-specific — seating,
//! turn order, clocks, terminal conditions, persistence — lives behind
//! this strategy trait. Supplying a different implementation (plus an
//! equivalent state container) is how any other game type is added.

use std::future::Future;

use turnhall_protocol::{
    Color, GameStateDto, GameStatus, Recipient, Resolution, RoomEvent, RoomId, UserId,
};

use crate::{GameError, SaveError};

// ---------------------------------------------------------------------------
// Roster — the membership view handed to the strategy
// ---------------------------------------------------------------------------

/// One member as the strategy sees it. An id-based read-only view: the
/// session map itself is owned exclusively by the room actor.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub user_id: UserId,
    pub connected: bool,
    pub is_player: bool,
    pub color: Option<Color>,
    /// Monotonic join order within the room (0 = the host).
    pub joined_seq: u64,
}

/// Read-only membership snapshot.
#[derive(Debug, Clone)]
pub struct Roster {
    host: UserId,
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(host: UserId, entries: Vec<RosterEntry>) -> Self {
        Self { host, entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn get(&self, user_id: UserId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.user_id == user_id)
    }

    pub fn host(&self) -> Option<&RosterEntry> {
        self.get(self.host)
    }
}

// ---------------------------------------------------------------------------
// Strategy outputs
// ---------------------------------------------------------------------------

/// A non-player the strategy wants promoted to a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub user_id: UserId,
    pub color: Color,
}

/// How a finished game ended. The engine uses this to commit the status
/// transition and cancel every outstanding timer; the strategy keeps the
/// authoritative copy for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub resolution: Resolution,
    pub winner: Option<UserId>,
}

/// The result of one strategy step: events to fan out, and an outcome if
/// this step finished the game.
#[derive(Debug, Default)]
pub struct StepOutput {
    pub events: Vec<(Recipient, RoomEvent)>,
    pub outcome: Option<GameOutcome>,
}

impl StepOutput {
    pub fn events(events: Vec<(Recipient, RoomEvent)>) -> Self {
        Self {
            events,
            outcome: None,
        }
    }

    pub fn finished(events: Vec<(Recipient, RoomEvent)>, outcome: GameOutcome) -> Self {
        Self {
            events,
            outcome: Some(outcome),
        }
    }
}

// ---------------------------------------------------------------------------
// GameFlow
// ---------------------------------------------------------------------------

/// Game-specific behavior plugged into the room engine.
///
/// All methods run on the room actor's single logical thread; a step
/// always runs to completion before the next inbound event or timer
/// expiry is processed, so implementations need no internal locking.
pub trait GameFlow: Send + 'static {
    /// Inspects the roster while the game is `NotStarted` and decides
    /// whether play can begin. Returns the non-player to promote into
    /// the second seat, or `None` if the starting conditions are not met
    /// yet. Called after every membership change before the game starts.
    fn set_up_before_start(&mut self, roster: &Roster) -> Option<Promotion>;

    /// Seats the players and begins play (the promotion returned by
    /// [`set_up_before_start`](Self::set_up_before_start) has already
    /// been applied to the roster). Starts the first mover's clock when
    /// timers are enabled.
    fn start_game(&mut self, roster: &Roster) -> StepOutput;

    /// Applies a move from a seated player. Rejections must leave the
    /// game (and clocks) completely untouched.
    fn handle_move(&mut self, user_id: UserId, mov: &str) -> Result<StepOutput, GameError>;

    /// A seated player forfeits.
    fn handle_resign(&mut self, user_id: UserId) -> Result<StepOutput, GameError>;

    /// A disconnected player's grace window expired: the game is over
    /// and the opponent wins.
    fn on_player_quit(&mut self, user_id: UserId) -> StepOutput;

    /// Resolves with the side whose clock ran out. Pends forever while
    /// no clock is running, so the engine can keep it in its `select!`
    /// loop unconditionally. Default: never resolves (untimed games).
    ///
    /// Declared as `impl Future + Send` (implementors may still write
    /// `async fn`) so the room actor stays spawnable.
    fn clock_expired(&mut self) -> impl Future<Output = Color> + Send {
        std::future::pending()
    }

    /// The flagged side loses on time.
    fn on_clock_expired(&mut self, flagged: Color) -> StepOutput;

    /// Whether the game has reached a terminal state.
    fn is_finished(&self) -> bool;

    /// The game portion of a room snapshot. `status` is the engine's
    /// authoritative status field.
    fn game_state(&self, status: GameStatus) -> GameStateDto;

    /// Hands the finished game to the persistence collaborator. Called
    /// at most once, after the finished state is committed; a failure is
    /// logged by the engine and never retried. Default: nothing to save.
    fn save_finished(&self, _room_id: RoomId) -> impl Future<Output = Result<(), SaveError>> + Send {
        std::future::ready(Ok(()))
    }
}
