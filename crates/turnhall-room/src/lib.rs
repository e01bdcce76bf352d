//! Room lifecycle management for Turnhall.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! member sessions, lifecycle status, and game strategy. The actor
//! serializes commands, disconnect-grace expiries, clock expiries, and
//! the inactivity timeout through one loop.
//!
//! # Key types
//!
//! - [`GameFlow`] — the strategy trait games implement
//! - [`RoomManager`] — creates rooms and reaps destroyed ones
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomConfig`] — grace and inactivity windows

mod config;
mod error;
mod flow;
mod manager;
mod room;

pub use config::RoomConfig;
pub use error::{GameError, RoomError, SaveError};
pub use flow::{GameFlow, GameOutcome, Promotion, Roster, RosterEntry, StepOutput};
pub use manager::RoomManager;
pub use room::{EventSender, RoomHandle, RoomInfo};
