//! Core identity and game-state types shared by every Turnhall layer.
//!
//! Everything here is serde-serializable: these types appear inside room
//! snapshots and outbound events, so their JSON shape is part of the
//! contract with clients.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user, issued by the identity collaborator.
///
/// Newtype over `u64` so a `UserId` can never be confused with a
/// [`RoomId`]. `#[serde(transparent)]` keeps the wire form a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a room (one game session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// External identity plus display attributes, supplied by the embedding
/// application. Immutable from the room's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Display name shown to other members.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// One side of a two-player game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other side. `opposite` is its own inverse.
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a room's game.
///
/// Transitions are strictly forward — no skipping, never backward:
///
/// ```text
/// NotStarted → InProgress → Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl GameStatus {
    /// The next status in the forward-only chain, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::InProgress),
            Self::InProgress => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal forward step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Why a finished game ended.
///
/// `Stalemate` and `Draw` carry no winner; every other resolution names
/// one of the two seated players as the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The side that just moved delivered mate.
    Checkmate,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Any other drawing condition reported by the rules oracle.
    Draw,
    /// A seated player forfeited explicitly.
    Resignation,
    /// A clock reached zero.
    OutOfTime,
    /// A disconnected player's grace window expired.
    PlayerQuit,
}

impl Resolution {
    /// Whether this resolution is a draw-like outcome with no winner.
    pub fn is_drawn(self) -> bool {
        matches!(self, Self::Stalemate | Self::Draw)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive an outbound room event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every member with a live connection.
    All,
    /// One specific member.
    Member(UserId),
    /// Everyone except the named member (e.g. "user X joined").
    AllExcept(UserId),
}

// ---------------------------------------------------------------------------
// TimerState
// ---------------------------------------------------------------------------

/// Read-only snapshot of the two countdown clocks, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub white_ms: u64,
    pub black_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
        assert_eq!(UserId(7).to_string(), "U-7");
    }

    #[test]
    fn test_color_opposite_is_involution() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
        assert_eq!(Color::White.opposite().opposite(), Color::White);
    }

    #[test]
    fn test_game_status_next_follows_strict_order() {
        assert_eq!(GameStatus::NotStarted.next(), Some(GameStatus::InProgress));
        assert_eq!(GameStatus::InProgress.next(), Some(GameStatus::Finished));
        assert_eq!(GameStatus::Finished.next(), None);
    }

    #[test]
    fn test_game_status_can_transition_to() {
        assert!(GameStatus::NotStarted.can_transition_to(GameStatus::InProgress));
        assert!(!GameStatus::NotStarted.can_transition_to(GameStatus::Finished));
        assert!(!GameStatus::Finished.can_transition_to(GameStatus::InProgress));
        assert!(!GameStatus::InProgress.can_transition_to(GameStatus::NotStarted));
    }

    #[test]
    fn test_resolution_is_drawn() {
        assert!(Resolution::Stalemate.is_drawn());
        assert!(Resolution::Draw.is_drawn());
        assert!(!Resolution::Checkmate.is_drawn());
        assert!(!Resolution::OutOfTime.is_drawn());
        assert!(!Resolution::PlayerQuit.is_drawn());
    }

    #[test]
    fn test_timer_state_round_trip() {
        let t = TimerState {
            white_ms: 300_000,
            black_ms: 299_500,
        };
        let bytes = serde_json::to_vec(&t).unwrap();
        let decoded: TimerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(t, decoded);
    }
}
