//! The rules oracle: the collaborator that knows the actual game rules.
//!
//! The strategy in this crate runs seating, clocks, and endings, but it
//! never inspects a board. Everything rules-shaped — move legality,
//! whose turn it is, terminal detection — is answered by a
//! [`RulesOracle`]. Plugging in a different oracle yields a different
//! turn game with the same session machinery.

use turnhall_protocol::Color;

/// Answers rules questions about one game in progress.
///
/// The oracle owns the authoritative position. It is consulted strictly
/// in this order per move: [`current_turn`](Self::current_turn) to
/// attribute the move, [`apply_move`](Self::apply_move) to validate and
/// commit it, then the terminal probes against the resulting position.
/// A rejected move must leave the position untouched.
pub trait RulesOracle: Send + Sync + 'static {
    /// The side to move in the current position.
    fn current_turn(&self) -> Color;

    /// Validates and applies an encoded move. `Err` carries a
    /// human-readable reason and commits nothing.
    fn apply_move(&mut self, mov: &str) -> Result<(), String>;

    /// Whether the side to move is checkmated (the previous mover won).
    fn is_checkmate(&self) -> bool;

    /// Whether the side to move is stalemated (drawn, no winner).
    fn is_stalemate(&self) -> bool;

    /// Whether the position is drawn by rule (repetition, dead
    /// position, move-count rules — whatever the oracle implements).
    fn is_draw(&self) -> bool;

    /// The move history in the oracle's own encoding, for snapshots and
    /// persistence.
    fn history(&self) -> String;
}
