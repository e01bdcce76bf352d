//! Snapshot DTOs: immutable views of room state sent to clients.
//!
//! A [`RoomDto`] is produced once per join (the full picture for a newly
//! connected client); the smaller DTOs ride inside incremental events.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Color, GameStatus, Resolution, TimerState, User, UserId};

// ---------------------------------------------------------------------------
// GameRules
// ---------------------------------------------------------------------------

/// Per-room game configuration, fixed at room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRules {
    /// Whether the per-player countdown clocks are active.
    pub timer_enabled: bool,
    /// Starting time on each clock.
    pub initial_time: Duration,
    /// Time credited per completed move (see the clock crate for when
    /// the credit lands).
    pub increment: Duration,
    /// The host's preferred color; drawn at random when `None`.
    pub host_color: Option<Color>,
    /// Whether the finished game is handed to the persistence store.
    /// Synthetic/test rooms switch this off.
    pub persist: bool,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            timer_enabled: true,
            initial_time: Duration::from_secs(300),
            increment: Duration::from_secs(5),
            host_color: None,
            persist: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Member / game / room snapshots
// ---------------------------------------------------------------------------

/// One member as seen by other clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub user: User,
    pub connected: bool,
    pub is_player: bool,
    pub color: Option<Color>,
}

/// The current game, composed on demand from room status plus the game
/// strategy's internal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateDto {
    pub status: GameStatus,
    pub resolution: Option<Resolution>,
    /// Winner of a finished game. `None` while unfinished and for drawn
    /// resolutions — there is no sentinel id.
    pub winner: Option<UserId>,
    /// Side to move, present once the game has seats.
    pub turn: Option<Color>,
    /// Move history in the rules oracle's portable serialized form.
    pub moves: String,
    pub timers: Option<TimerState>,
}

/// Full room snapshot sent to a joining connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDto {
    pub id: crate::RoomId,
    pub host: UserId,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    pub rules: GameRules,
    pub members: Vec<MemberDto>,
    pub game: GameStateDto,
}
