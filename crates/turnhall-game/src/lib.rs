//! # Turnhall game strategy
//!
//! The two-player turn game built on the room engine: seating, move
//! attribution, chess clocks, ending detection, and persistence.
//!
//! The strategy itself knows no game rules. It delegates legality and
//! terminal questions to a [`RulesOracle`] and finished games to a
//! [`GameStore`], so any alternating-turn board game slots in by
//! implementing the oracle.
//!
//! # Key types
//!
//! - [`TurnGame`] — the [`GameFlow`](turnhall_room::GameFlow) implementation
//! - [`RulesOracle`] — the rules collaborator
//! - [`GameStore`] / [`GameRecord`] — the persistence collaborator

mod game;
mod oracle;
mod store;

pub use game::TurnGame;
pub use oracle::RulesOracle;
pub use store::{GameRecord, GameStore, MemoryStore, NullStore, StoreError};
