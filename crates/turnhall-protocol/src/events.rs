//! Inbound actions and outbound room events.
//!
//! Internally tagged (`#[serde(tag = "type")]`) so the JSON is
//! `{ "type": "MoveApplied", ... }` — flat and easy to dispatch on in a
//! client without a wrapper object.

use serde::{Deserialize, Serialize};

use crate::{MemberDto, Resolution, RoomDto, TimerState, UserId};

// ---------------------------------------------------------------------------
// ClientAction — what a connection can ask of a running game
// ---------------------------------------------------------------------------

/// A game action submitted by a connected member.
///
/// Connection lifecycle (connect/disconnect) is not an action — the
/// transport reports it out of band through the room handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientAction {
    /// Submit a move in the rules oracle's notation.
    Move {
        #[serde(rename = "move")]
        mov: String,
    },
    /// Forfeit the game.
    Resign,
}

// ---------------------------------------------------------------------------
// RoomEvent — everything the room fans out to connections
// ---------------------------------------------------------------------------

/// An outbound event delivered on a member's event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    /// Full room snapshot, sent to the joining connection only.
    Snapshot { room: RoomDto },

    /// A new member joined the room.
    MemberJoined { member: MemberDto },

    /// An existing member's state changed (reconnected, disconnected,
    /// promoted to player).
    MemberStateChanged { member: MemberDto },

    /// A non-player left; their session is gone.
    MemberLeft { user_id: UserId },

    /// Both seats are filled and play has begun.
    GameStarted {
        white: UserId,
        black: UserId,
        timers: Option<TimerState>,
    },

    /// A legal move was applied.
    MoveApplied {
        by: UserId,
        #[serde(rename = "move")]
        mov: String,
        timers: Option<TimerState>,
    },

    /// The game is over.
    GameEnded {
        resolution: Resolution,
        winner: Option<UserId>,
        timers: Option<TimerState>,
    },

    /// A rejected action, delivered to the acting connection only.
    Error { message: String },
}
