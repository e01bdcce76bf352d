//! The two-player turn game strategy.
//!
//! `TurnGame` plugs into a room and runs everything between "two people
//! showed up" and "the result hit storage": seating the challenger,
//! attributing and validating moves through the rules oracle, flipping
//! the chess clock, detecting every ending, and handing the finished
//! record to the store. It holds no connection or membership state —
//! the room owns that.

use turnhall_clock::MatchClock;
use turnhall_protocol::{
    Color, GameRules, GameStateDto, GameStatus, Recipient, Resolution, RoomEvent, RoomId,
    TimerState, UserId,
};
use turnhall_room::{
    GameError, GameFlow, GameOutcome, Promotion, Roster, SaveError, StepOutput,
};

use crate::{GameRecord, GameStore, RulesOracle};

/// Who sits where, fixed for the whole game at start.
#[derive(Debug, Clone, Copy)]
struct Seats {
    white: UserId,
    black: UserId,
}

impl Seats {
    fn color_of(&self, user_id: UserId) -> Option<Color> {
        if user_id == self.white {
            Some(Color::White)
        } else if user_id == self.black {
            Some(Color::Black)
        } else {
            None
        }
    }

    fn holder(&self, color: Color) -> UserId {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }
}

/// A two-player turn game with optional chess clocks.
///
/// Generic over the rules oracle (what game this is) and the store
/// (where finished games go).
pub struct TurnGame<R: RulesOracle, S: GameStore> {
    oracle: R,
    store: S,
    rules: GameRules,
    seats: Option<Seats>,
    clock: Option<MatchClock>,
    outcome: Option<GameOutcome>,
}

impl<R: RulesOracle, S: GameStore> TurnGame<R, S> {
    pub fn new(oracle: R, store: S, rules: GameRules) -> Self {
        Self {
            oracle,
            store,
            rules,
            seats: None,
            clock: None,
            outcome: None,
        }
    }

    fn timers(&self) -> Option<TimerState> {
        self.clock.as_ref().map(MatchClock::snapshot)
    }

    /// Freezes the clocks and records the ending. The winner, if any,
    /// is resolved from the seat map.
    fn finish(&mut self, resolution: Resolution, winning_side: Option<Color>) -> GameOutcome {
        if let Some(clock) = &mut self.clock {
            clock.stop_all();
        }
        let winner = winning_side.and_then(|c| self.seats.map(|s| s.holder(c)));
        let outcome = GameOutcome { resolution, winner };
        self.outcome = Some(outcome);
        tracing::info!(?resolution, ?winner, "turn game over");
        outcome
    }

    fn ended_event(&self, outcome: GameOutcome) -> RoomEvent {
        RoomEvent::GameEnded {
            resolution: outcome.resolution,
            winner: outcome.winner,
            timers: self.timers(),
        }
    }

    /// Probes the oracle for a terminal position after a committed
    /// move. Checkmate credits the side that just moved.
    fn terminal_after_move(&self, mover: Color) -> Option<(Resolution, Option<Color>)> {
        if self.oracle.is_checkmate() {
            Some((Resolution::Checkmate, Some(mover)))
        } else if self.oracle.is_stalemate() {
            Some((Resolution::Stalemate, None))
        } else if self.oracle.is_draw() {
            Some((Resolution::Draw, None))
        } else {
            None
        }
    }
}

impl<R: RulesOracle, S: GameStore> GameFlow for TurnGame<R, S> {
    /// Ready once the host is connected and at least one other member is
    /// around to take the second seat. The most recent joiner wins the
    /// seat and gets the color the host didn't take.
    fn set_up_before_start(&mut self, roster: &Roster) -> Option<Promotion> {
        let host = roster.host()?;
        if !host.connected {
            return None;
        }
        let host_color = host.color?;
        let challenger = roster
            .entries()
            .iter()
            .filter(|e| !e.is_player && e.connected)
            .max_by_key(|e| e.joined_seq)?;
        Some(Promotion {
            user_id: challenger.user_id,
            color: host_color.opposite(),
        })
    }

    fn start_game(&mut self, roster: &Roster) -> StepOutput {
        let mut white = None;
        let mut black = None;
        for entry in roster.entries() {
            match entry.color {
                Some(Color::White) => white = Some(entry.user_id),
                Some(Color::Black) => black = Some(entry.user_id),
                None => {}
            }
        }
        let (Some(white), Some(black)) = (white, black) else {
            debug_assert!(false, "start without two seated players");
            tracing::error!("game started without two seated players");
            return StepOutput::default();
        };
        self.seats = Some(Seats { white, black });

        if self.rules.timer_enabled {
            let mut clock = MatchClock::new(self.rules.initial_time, self.rules.increment);
            clock.start(self.oracle.current_turn());
            self.clock = Some(clock);
        }

        tracing::info!(%white, %black, timed = self.rules.timer_enabled, "turn game started");
        StepOutput::events(vec![(Recipient::All, RoomEvent::GameStarted {
            white,
            black,
            timers: self.timers(),
        })])
    }

    fn handle_move(&mut self, user_id: UserId, mov: &str) -> Result<StepOutput, GameError> {
        let seats = self.seats.ok_or(GameError::NotInProgress)?;
        let color = seats.color_of(user_id).ok_or(GameError::NotAPlayer(user_id))?;
        if color != self.oracle.current_turn() {
            return Err(GameError::NotYourTurn);
        }
        self.oracle
            .apply_move(mov)
            .map_err(GameError::IllegalMove)?;

        if let Some((resolution, winning_side)) = self.terminal_after_move(color) {
            let outcome = self.finish(resolution, winning_side);
            let applied = RoomEvent::MoveApplied {
                by: user_id,
                mov: mov.to_string(),
                timers: self.timers(),
            };
            let ended = self.ended_event(outcome);
            return Ok(StepOutput::finished(
                vec![(Recipient::All, applied), (Recipient::All, ended)],
                outcome,
            ));
        }

        // The game goes on: the mover's clock pauses and the opponent's
        // resumes with the increment (or starts fresh on their first
        // turn).
        if let Some(clock) = &mut self.clock {
            clock.switch();
        }
        Ok(StepOutput::events(vec![(
            Recipient::All,
            RoomEvent::MoveApplied {
                by: user_id,
                mov: mov.to_string(),
                timers: self.timers(),
            },
        )]))
    }

    fn handle_resign(&mut self, user_id: UserId) -> Result<StepOutput, GameError> {
        let seats = self.seats.ok_or(GameError::NotInProgress)?;
        let color = seats.color_of(user_id).ok_or(GameError::NotAPlayer(user_id))?;
        let outcome = self.finish(Resolution::Resignation, Some(color.opposite()));
        Ok(StepOutput::finished(
            vec![(Recipient::All, self.ended_event(outcome))],
            outcome,
        ))
    }

    fn on_player_quit(&mut self, user_id: UserId) -> StepOutput {
        let winning_side = self
            .seats
            .and_then(|s| s.color_of(user_id))
            .map(Color::opposite);
        let outcome = self.finish(Resolution::PlayerQuit, winning_side);
        StepOutput::finished(
            vec![(Recipient::All, self.ended_event(outcome))],
            outcome,
        )
    }

    async fn clock_expired(&mut self) -> Color {
        match self.clock.as_mut() {
            Some(clock) => clock.expired().await,
            None => std::future::pending().await,
        }
    }

    fn on_clock_expired(&mut self, flagged: Color) -> StepOutput {
        let outcome = self.finish(Resolution::OutOfTime, Some(flagged.opposite()));
        StepOutput::finished(
            vec![(Recipient::All, self.ended_event(outcome))],
            outcome,
        )
    }

    fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn game_state(&self, status: GameStatus) -> GameStateDto {
        GameStateDto {
            status,
            resolution: self.outcome.map(|o| o.resolution),
            winner: self.outcome.and_then(|o| o.winner),
            turn: (status == GameStatus::InProgress).then(|| self.oracle.current_turn()),
            moves: self.oracle.history(),
            timers: self.timers(),
        }
    }

    async fn save_finished(&self, room_id: RoomId) -> Result<(), SaveError> {
        if !self.rules.persist {
            tracing::debug!(%room_id, "persistence disabled, skipping save");
            return Ok(());
        }
        let (Some(outcome), Some(seats)) = (self.outcome, self.seats) else {
            // Nothing to record: the game never seated two players.
            return Ok(());
        };
        let record = GameRecord {
            room_id,
            white: seats.white,
            black: seats.black,
            moves: self.oracle.history(),
            resolution: outcome.resolution,
            winner: outcome
                .winner
                .and_then(|user_id| seats.color_of(user_id)),
            timer_enabled: self.rules.timer_enabled,
            initial_time: self.rules.initial_time,
            increment: self.rules.increment,
        };
        self.store
            .save(record)
            .await
            .map_err(|e| SaveError(e.to_string()))
    }
}
