//! Nim over Turnhall: two in-process bots play misère-free Nim (take
//! 1-3 sticks from a pile of 21; whoever takes the last stick wins)
//! inside a room, with clocks running and the finished game landing in
//! the in-memory store.
//!
//! Run with `RUST_LOG=info cargo run -p nim` to watch the room engine
//! at work.

use std::time::Duration;

use tokio::sync::mpsc;
use turnhall_game::{MemoryStore, RulesOracle, TurnGame};
use turnhall_protocol::{ClientAction, Color, GameRules, GameStatus, RoomEvent, User, UserId};
use turnhall_room::{RoomConfig, RoomManager};

// ---------------------------------------------------------------------------
// Rules oracle
// ---------------------------------------------------------------------------

const PILE: u32 = 21;
const MAX_TAKE: u32 = 3;

/// Nim as a rules oracle: a move is the decimal take ("1", "2", "3").
/// Taking the last stick wins, which maps onto the checkmate probe —
/// the side to move in an empty-pile position has lost.
struct NimOracle {
    pile: u32,
    turn: Color,
    history: Vec<u32>,
}

impl NimOracle {
    fn new() -> Self {
        Self {
            pile: PILE,
            turn: Color::White,
            history: Vec::new(),
        }
    }
}

impl RulesOracle for NimOracle {
    fn current_turn(&self) -> Color {
        self.turn
    }

    fn apply_move(&mut self, mov: &str) -> Result<(), String> {
        let take: u32 = mov
            .parse()
            .map_err(|_| format!("'{mov}' is not a number of sticks"))?;
        if take == 0 || take > MAX_TAKE {
            return Err(format!("must take between 1 and {MAX_TAKE} sticks"));
        }
        if take > self.pile {
            return Err(format!("only {} sticks left", self.pile));
        }
        self.pile -= take;
        self.turn = self.turn.opposite();
        self.history.push(take);
        Ok(())
    }

    fn is_checkmate(&self) -> bool {
        self.pile == 0
    }

    fn is_stalemate(&self) -> bool {
        false
    }

    fn is_draw(&self) -> bool {
        false
    }

    fn history(&self) -> String {
        self.history
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The winning strategy where it exists: leave a multiple of 4.
fn best_take(pile: u32) -> u32 {
    match pile % (MAX_TAKE + 1) {
        0 => 1,
        n => n,
    }
}

// ---------------------------------------------------------------------------
// Bots
// ---------------------------------------------------------------------------

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);

/// Logs a member's event stream until it closes.
fn spawn_observer(name: &'static str, mut rx: mpsc::UnboundedReceiver<RoomEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RoomEvent::GameStarted { white, black, .. } => {
                    tracing::info!(%name, %white, %black, "game on");
                }
                RoomEvent::MoveApplied { by, mov, .. } => {
                    tracing::info!(%name, %by, take = %mov, "sticks taken");
                }
                RoomEvent::GameEnded {
                    resolution, winner, ..
                } => {
                    tracing::info!(%name, ?resolution, ?winner, "game over");
                }
                _ => {}
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let rules = GameRules {
        timer_enabled: true,
        initial_time: Duration::from_secs(60),
        increment: Duration::from_secs(1),
        host_color: Some(Color::White),
        persist: true,
    };

    let store = MemoryStore::new();
    let game = TurnGame::new(NimOracle::new(), store.clone(), rules.clone());

    let mut manager = RoomManager::new(RoomConfig::default());
    let room_id = manager.create_room(
        User {
            id: ALICE,
            name: "alice".into(),
        },
        rules,
        game,
    );
    let handle = manager.room(room_id)?;

    let (alice_tx, alice_rx) = mpsc::unbounded_channel();
    let (bob_tx, bob_rx) = mpsc::unbounded_channel();
    spawn_observer("alice", alice_rx);
    spawn_observer("bob", bob_rx);

    handle
        .connect(
            User {
                id: ALICE,
                name: "alice".into(),
            },
            alice_tx,
        )
        .await?;
    handle
        .connect(
            User {
                id: BOB,
                name: "bob".into(),
            },
            bob_tx,
        )
        .await?;

    // Drive both sides from the room's own snapshots until the pile is
    // gone.
    let mut pile = PILE;
    loop {
        let dto = handle.dto().await?;
        if dto.game.status == GameStatus::Finished {
            break;
        }
        let mover = match dto.game.turn {
            Some(Color::White) => ALICE,
            Some(Color::Black) => BOB,
            None => break,
        };
        let take = best_take(pile);
        pile -= take;
        handle
            .action(mover, ClientAction::Move {
                mov: take.to_string(),
            })
            .await?;
    }

    let record = store
        .get(room_id)
        .await
        .ok_or("finished game was not stored")?;
    tracing::info!(
        moves = %record.moves,
        ?record.resolution,
        winner = ?record.winner,
        "match record"
    );

    manager.destroy_room(room_id).await?;
    Ok(())
}
