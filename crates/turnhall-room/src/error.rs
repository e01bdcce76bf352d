//! Error types for the room layer.

use turnhall_protocol::{RoomId, UserId};

/// Errors returned on room operation reply channels.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The user already has a live connection in this room.
    #[error("user {0} is already connected")]
    AlreadyConnected(UserId),

    /// The user has no session in this room.
    #[error("user {0} is not a member of this room")]
    UnknownMember(UserId),

    /// The room does not exist (or was already destroyed).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room's command channel is closed or full.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

/// A rejected game action. Reported to the acting connection only; no
/// state is mutated and no other member observes anything.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The game has not started or is already over.
    #[error("game is not in progress")]
    NotInProgress,

    /// The sender is not seated at the board.
    #[error("user {0} is not a player")]
    NotAPlayer(UserId),

    /// The sender's color does not match the side to move.
    #[error("not your turn")]
    NotYourTurn,

    /// The rules oracle rejected the move.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// A persistence failure surfaced by a game strategy. Logged on the
/// completion path; the in-memory result is already final and is never
/// rolled back.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SaveError(pub String);
