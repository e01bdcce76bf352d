//! Integration tests for the room actor: admission, reconnection,
//! grace windows, inactivity destruction, and the status machine.
//!
//! Uses a minimal two-player duel strategy so the engine can be
//! exercised without real game rules. Time-dependent tests run on the
//! paused Tokio clock.

use std::time::Duration;

use tokio::sync::mpsc;
use turnhall_protocol::{
    ClientAction, Color, GameRules, GameStateDto, GameStatus, Recipient, Resolution, RoomEvent,
    User, UserId,
};
use turnhall_room::{
    GameError, GameFlow, GameOutcome, Promotion, RoomConfig, RoomError, RoomManager, Roster,
    StepOutput,
};

// ---------------------------------------------------------------------------
// Test strategy
// ---------------------------------------------------------------------------

/// Barebones two-player game: any string is a legal move except "bad",
/// and "mate" wins on the spot. No clocks.
struct DuelGame {
    white: Option<UserId>,
    black: Option<UserId>,
    moves: Vec<String>,
    outcome: Option<GameOutcome>,
}

impl DuelGame {
    fn new() -> Self {
        Self {
            white: None,
            black: None,
            moves: Vec::new(),
            outcome: None,
        }
    }

    fn opponent_of(&self, user_id: UserId) -> Option<UserId> {
        match (self.white, self.black) {
            (Some(w), Some(b)) if w == user_id => Some(b),
            (Some(w), Some(b)) if b == user_id => Some(w),
            _ => None,
        }
    }

    fn finish(&mut self, resolution: Resolution, winner: Option<UserId>) -> StepOutput {
        let outcome = GameOutcome { resolution, winner };
        self.outcome = Some(outcome);
        StepOutput::finished(
            vec![(Recipient::All, RoomEvent::GameEnded {
                resolution,
                winner,
                timers: None,
            })],
            outcome,
        )
    }
}

impl GameFlow for DuelGame {
    fn set_up_before_start(&mut self, roster: &Roster) -> Option<Promotion> {
        let host = roster.host()?;
        if !host.connected {
            return None;
        }
        let challenger = roster
            .entries()
            .iter()
            .filter(|e| !e.is_player && e.connected)
            .max_by_key(|e| e.joined_seq)?;
        Some(Promotion {
            user_id: challenger.user_id,
            color: host.color?.opposite(),
        })
    }

    fn start_game(&mut self, roster: &Roster) -> StepOutput {
        for entry in roster.entries() {
            match entry.color {
                Some(Color::White) => self.white = Some(entry.user_id),
                Some(Color::Black) => self.black = Some(entry.user_id),
                None => {}
            }
        }
        let (white, black) = (self.white.unwrap(), self.black.unwrap());
        StepOutput::events(vec![(Recipient::All, RoomEvent::GameStarted {
            white,
            black,
            timers: None,
        })])
    }

    fn handle_move(&mut self, user_id: UserId, mov: &str) -> Result<StepOutput, GameError> {
        if self.opponent_of(user_id).is_none() {
            return Err(GameError::NotAPlayer(user_id));
        }
        if mov == "bad" {
            return Err(GameError::IllegalMove(mov.to_string()));
        }
        self.moves.push(mov.to_string());
        if mov == "mate" {
            return Ok(self.finish(Resolution::Checkmate, Some(user_id)));
        }
        Ok(StepOutput::events(vec![(
            Recipient::All,
            RoomEvent::MoveApplied {
                by: user_id,
                mov: mov.to_string(),
                timers: None,
            },
        )]))
    }

    fn handle_resign(&mut self, user_id: UserId) -> Result<StepOutput, GameError> {
        let opponent = self
            .opponent_of(user_id)
            .ok_or(GameError::NotAPlayer(user_id))?;
        Ok(self.finish(Resolution::Resignation, Some(opponent)))
    }

    fn on_player_quit(&mut self, user_id: UserId) -> StepOutput {
        let winner = self.opponent_of(user_id);
        self.finish(Resolution::PlayerQuit, winner)
    }

    fn on_clock_expired(&mut self, flagged: Color) -> StepOutput {
        let winner = match flagged {
            Color::White => self.black,
            Color::Black => self.white,
        };
        self.finish(Resolution::OutOfTime, winner)
    }

    fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn game_state(&self, status: GameStatus) -> GameStateDto {
        GameStateDto {
            status,
            resolution: self.outcome.map(|o| o.resolution),
            winner: self.outcome.and_then(|o| o.winner),
            turn: None,
            moves: self.moves.join(" "),
            timers: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn user(id: u64, name: &str) -> User {
    User {
        id: UserId(id),
        name: name.to_string(),
    }
}

fn rules() -> GameRules {
    GameRules {
        timer_enabled: false,
        host_color: Some(Color::White),
        ..GameRules::default()
    }
}

fn config() -> RoomConfig {
    RoomConfig {
        inactivity_timeout: Duration::from_secs(60),
        disconnect_grace: Duration::from_secs(30),
        channel_size: 16,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Creates a room with a connected host and one connected challenger,
/// which auto-starts the duel. Returns the manager, handle, and both
/// event receivers with their backlogs drained.
async fn started_room() -> (
    RoomManager,
    turnhall_room::RoomHandle,
    mpsc::UnboundedReceiver<RoomEvent>,
    mpsc::UnboundedReceiver<RoomEvent>,
) {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), host_tx).await.unwrap();
    handle.connect(user(2, "bob"), guest_tx).await.unwrap();

    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::InProgress);
    drain(&mut host_rx);
    drain(&mut guest_rx);
    (manager, handle, host_rx, guest_rx)
}

// ---------------------------------------------------------------------------
// Admission and snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_joiner_receives_snapshot() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let RoomEvent::Snapshot { room } = &events[0] else {
        panic!("expected snapshot, got {:?}", events[0]);
    };
    assert_eq!(room.id, room_id);
    assert_eq!(room.host, UserId(1));
    assert_eq!(room.game.status, GameStatus::NotStarted);
    assert_eq!(room.members.len(), 1);
    assert!(room.members[0].is_player);
    assert_eq!(room.members[0].color, Some(Color::White));
}

#[tokio::test]
async fn test_duplicate_connection_is_rejected() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (tx1, _rx1) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx1).await.unwrap();

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let err = handle.connect(user(1, "alice"), tx2).await.unwrap_err();
    assert!(matches!(err, RoomError::AlreadyConnected(UserId(1))));
}

#[tokio::test]
async fn test_second_member_triggers_game_start() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), host_tx).await.unwrap();
    drain(&mut host_rx);

    let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
    handle.connect(user(2, "bob"), guest_tx).await.unwrap();
    handle.info().await.unwrap(); // flush

    // Host sees the join, the promotion, and the start.
    let host_events = drain(&mut host_rx);
    assert!(matches!(&host_events[0], RoomEvent::MemberJoined { member } if member.user.id == UserId(2)));
    assert!(host_events.iter().any(|e| matches!(
        e,
        RoomEvent::MemberStateChanged { member }
            if member.user.id == UserId(2) && member.is_player && member.color == Some(Color::Black)
    )));
    assert!(host_events.iter().any(|e| matches!(
        e,
        RoomEvent::GameStarted { white: UserId(1), black: UserId(2), .. }
    )));

    // Guest sees their snapshot first, then start events (no join echo).
    let guest_events = drain(&mut guest_rx);
    assert!(matches!(&guest_events[0], RoomEvent::Snapshot { .. }));
    assert!(!guest_events
        .iter()
        .any(|e| matches!(e, RoomEvent::MemberJoined { .. })));
    assert!(guest_events
        .iter()
        .any(|e| matches!(e, RoomEvent::GameStarted { .. })));

    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::InProgress);
}

#[tokio::test]
async fn test_spectator_does_not_start_a_second_game() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.connect(user(3, "carol"), tx).await.unwrap();
    handle.info().await.unwrap();

    let events = drain(&mut rx);
    let RoomEvent::Snapshot { room } = &events[0] else {
        panic!("expected snapshot");
    };
    assert_eq!(room.members.len(), 3);
    assert!(!room.members[2].is_player);

    // No promotion or start reaches the players.
    assert!(!drain(&mut host_rx)
        .iter()
        .any(|e| matches!(e, RoomEvent::GameStarted { .. })));
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_move_is_broadcast_to_everyone() {
    let (_manager, handle, mut host_rx, mut guest_rx) = started_room().await;

    handle
        .action(UserId(1), ClientAction::Move { mov: "e4".into() })
        .await
        .unwrap();
    handle.info().await.unwrap();

    for rx in [&mut host_rx, &mut guest_rx] {
        let events = drain(rx);
        assert!(events.iter().any(|e| matches!(
            e,
            RoomEvent::MoveApplied { by: UserId(1), mov, .. } if mov == "e4"
        )));
    }
}

#[tokio::test]
async fn test_rejected_action_reaches_only_the_actor() {
    let (_manager, handle, mut host_rx, mut guest_rx) = started_room().await;

    handle
        .action(UserId(1), ClientAction::Move { mov: "bad".into() })
        .await
        .unwrap();
    handle.info().await.unwrap();

    let host_events = drain(&mut host_rx);
    assert!(host_events
        .iter()
        .any(|e| matches!(e, RoomEvent::Error { .. })));
    assert!(drain(&mut guest_rx).is_empty());
}

#[tokio::test]
async fn test_action_before_start_is_rejected() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx).await.unwrap();
    drain(&mut rx);

    handle
        .action(UserId(1), ClientAction::Move { mov: "e4".into() })
        .await
        .unwrap();
    handle.info().await.unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, RoomEvent::Error { .. })));
}

#[tokio::test]
async fn test_action_after_finish_is_rejected() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    handle
        .action(UserId(1), ClientAction::Move { mov: "mate".into() })
        .await
        .unwrap();
    handle
        .action(UserId(2), ClientAction::Move { mov: "e5".into() })
        .await
        .unwrap();
    handle.info().await.unwrap();

    let events = drain(&mut host_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::GameEnded { resolution: Resolution::Checkmate, winner: Some(UserId(1)), .. }
    )));

    let dto = handle.dto().await.unwrap();
    assert_eq!(dto.game.status, GameStatus::Finished);
    // The late move was refused, not applied.
    assert_eq!(dto.game.moves, "mate");
}

#[tokio::test]
async fn test_resignation_ends_the_game() {
    let (_manager, handle, _host_rx, mut guest_rx) = started_room().await;

    handle.action(UserId(2), ClientAction::Resign).await.unwrap();
    handle.info().await.unwrap();

    let events = drain(&mut guest_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::GameEnded { resolution: Resolution::Resignation, winner: Some(UserId(1)), .. }
    )));
}

// ---------------------------------------------------------------------------
// Disconnects, grace, reconnection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_spectator_disconnect_removes_them() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    let (tx, _rx) = mpsc::unbounded_channel();
    handle.connect(user(3, "carol"), tx).await.unwrap();
    handle.disconnect(UserId(3), "closed").await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.member_count, 2);

    let events = drain(&mut host_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, RoomEvent::MemberLeft { user_id: UserId(3) })));

    // Their session is gone, so a repeat disconnect is unknown.
    let err = handle.disconnect(UserId(3), "closed").await.unwrap_err();
    assert!(matches!(err, RoomError::UnknownMember(UserId(3))));
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_forfeits_the_game() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    handle.disconnect(UserId(2), "connection reset").await.unwrap();
    handle.info().await.unwrap();
    let events = drain(&mut host_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::MemberStateChanged { member } if member.user.id == UserId(2) && !member.connected
    )));

    // Just inside the window: still playing.
    tokio::time::advance(Duration::from_secs(29)).await;
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::InProgress);

    tokio::time::advance(Duration::from_secs(2)).await;
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::Finished);

    let events = drain(&mut host_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::GameEnded { resolution: Resolution::PlayerQuit, winner: Some(UserId(1)), .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_cancels_forfeit() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    handle.disconnect(UserId(2), "connection reset").await.unwrap();
    handle.info().await.unwrap();
    drain(&mut host_rx);

    tokio::time::advance(Duration::from_secs(20)).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.connect(user(2, "bob"), tx).await.unwrap();

    // The old window must not fire.
    tokio::time::advance(Duration::from_secs(60)).await;
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::InProgress);

    // The returning player keeps their seat and color.
    let events = drain(&mut rx);
    let RoomEvent::Snapshot { room } = &events[0] else {
        panic!("expected snapshot");
    };
    let bob = room.members.iter().find(|m| m.user.id == UserId(2)).unwrap();
    assert!(bob.is_player);
    assert_eq!(bob.color, Some(Color::Black));

    let host_events = drain(&mut host_rx);
    assert!(host_events.iter().any(|e| matches!(
        e,
        RoomEvent::MemberStateChanged { member } if member.user.id == UserId(2) && member.connected
    )));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_disconnect_keeps_the_grace_deadline() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    handle.disconnect(UserId(2), "connection reset").await.unwrap();
    handle.info().await.unwrap();
    drain(&mut host_rx);

    // A second disconnect for the same player is a no-op: it must not
    // restart the window or re-broadcast the state change.
    tokio::time::advance(Duration::from_secs(20)).await;
    handle.disconnect(UserId(2), "connection reset").await.unwrap();
    handle.info().await.unwrap();
    assert!(drain(&mut host_rx).is_empty());

    // The forfeit fires 30s after the first disconnect, not the second.
    tokio::time::advance(Duration::from_secs(11)).await;
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::Finished);

    let events = drain(&mut host_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        RoomEvent::GameEnded { resolution: Resolution::PlayerQuit, winner: Some(UserId(1)), .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_actions_from_disconnected_players_are_ignored() {
    let (_manager, handle, mut host_rx, _guest_rx) = started_room().await;

    handle.disconnect(UserId(2), "connection reset").await.unwrap();
    handle.info().await.unwrap();
    drain(&mut host_rx);

    // The seat survives the disconnect, but its actions do not count
    // until the player reconnects.
    handle.action(UserId(2), ClientAction::Resign).await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::InProgress);
    assert!(drain(&mut host_rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_player_disconnect_before_start_has_no_grace() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx).await.unwrap();
    handle.disconnect(UserId(1), "closed").await.unwrap();

    // The host keeps their session, and nothing forfeits.
    tokio::time::advance(Duration::from_secs(35)).await;
    let info = handle.info().await.unwrap();
    assert_eq!(info.status, GameStatus::NotStarted);
    assert_eq!(info.member_count, 1);
    assert_eq!(info.connected_count, 0);
}

// ---------------------------------------------------------------------------
// Inactivity destruction
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_unused_room_self_destructs() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    assert_eq!(manager.room_count(), 1);

    // Nobody connects; the paused clock auto-advances to the timeout.
    let destroyed = manager.next_destroyed().await;
    assert_eq!(destroyed, room_id);
    assert_eq!(manager.room_count(), 0);
    assert!(matches!(
        manager.room(room_id),
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_connection_cancels_inactivity_countdown() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    tokio::time::advance(Duration::from_secs(55)).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx).await.unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(handle.info().await.is_ok());
    assert_eq!(manager.reap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_not_started_room_restarts_countdown() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());
    let handle = manager.room(room_id).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    handle.connect(user(1, "alice"), tx).await.unwrap();
    handle.disconnect(UserId(1), "closed").await.unwrap();
    handle.info().await.unwrap();

    let destroyed = manager.next_destroyed().await;
    assert_eq!(destroyed, room_id);
}

#[tokio::test(start_paused = true)]
async fn test_finished_empty_room_is_destroyed_immediately() {
    let (mut manager, handle, _host_rx, _guest_rx) = started_room().await;
    let room_id = handle.room_id();

    handle
        .action(UserId(1), ClientAction::Move { mov: "mate".into() })
        .await
        .unwrap();
    handle.disconnect(UserId(1), "closed").await.unwrap();
    handle.disconnect(UserId(2), "closed").await.unwrap();

    let destroyed = manager.next_destroyed().await;
    assert_eq!(destroyed, room_id);
    assert!(matches!(
        handle.info().await,
        Err(RoomError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_explicit_destroy_removes_the_room() {
    let mut manager = RoomManager::new(config());
    let room_id = manager.create_room(user(1, "alice"), rules(), DuelGame::new());

    manager.destroy_room(room_id).await.unwrap();
    assert_eq!(manager.room_count(), 0);
    assert!(matches!(
        manager.destroy_room(room_id).await,
        Err(RoomError::NotFound(_))
    ));
}
