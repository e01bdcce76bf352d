//! Room actor: an isolated Tokio task that owns one game session.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc command channel — no shared mutable state, just
//! message passing. Inbound commands, grace-timer expiries, clock
//! expiries, and the inactivity timeout are all serialized through one
//! `select!` loop, so every mutation runs to completion before the next
//! is processed and no timer callback can interleave with an in-flight
//! handler.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use turnhall_clock::PausableTimer;
use turnhall_protocol::{
    ClientAction, Color, GameRules, GameStatus, MemberDto, Recipient, RoomDto, RoomEvent, RoomId,
    User, UserId,
};

use crate::{GameFlow, GameOutcome, RoomConfig, RoomError, Roster, RosterEntry, StepOutput};

/// Channel sender for delivering outbound events to one connection.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its channel. The `oneshot`
/// senders are reply channels for request/response operations.
pub(crate) enum RoomCommand {
    /// A connection arrived with an authenticated identity.
    Connect {
        user: User,
        sender: EventSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection dropped.
    Disconnect {
        user_id: UserId,
        reason: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A game action from a connected member (fire-and-forget;
    /// rejections go back on the member's event channel).
    Action { user_id: UserId, action: ClientAction },

    /// Request room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Request the full room snapshot.
    GetDto { reply: oneshot::Sender<RoomDto> },

    /// Shut the room down unconditionally.
    Shutdown,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub status: GameStatus,
    pub member_count: usize,
    pub connected_count: usize,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone — just an
/// `mpsc::Sender` wrapper. The `RoomManager` holds one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Admits a connection for `user`, delivering events on `sender`.
    ///
    /// Fails with [`RoomError::AlreadyConnected`] if the user already
    /// has a live connection; succeeding reactivates an existing session
    /// or creates a fresh non-player one, and the joining connection
    /// receives the full room snapshot.
    pub async fn connect(&self, user: User, sender: EventSender) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Connect {
                user,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Reports a dropped connection. Fails with
    /// [`RoomError::UnknownMember`] if the user has no session here.
    pub async fn disconnect(&self, user_id: UserId, reason: impl Into<String>) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Disconnect {
                user_id,
                reason: reason.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Submits a game action (fire-and-forget).
    pub async fn action(&self, user_id: UserId, action: ClientAction) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Action { user_id, action })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests current room metadata.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests the full room snapshot.
    pub async fn dto(&self) -> Result<RoomDto, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetDto { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// Member sessions
// ---------------------------------------------------------------------------

/// Server-side binding of a member to a live connection. One per user id
/// for the room's whole lifetime once they become a player; non-player
/// sessions are deleted on disconnect.
struct MemberSession {
    user: User,
    is_player: bool,
    color: Option<Color>,
    joined_seq: u64,
    /// `Some` while a connection is live.
    sender: Option<EventSender>,
    /// Disconnect-grace countdown; armed only for a player who drops
    /// mid-game.
    grace: PausableTimer,
}

impl MemberSession {
    fn connected(&self) -> bool {
        self.sender.is_some()
    }

    fn dto(&self) -> MemberDto {
        MemberDto {
            user: self.user.clone(),
            connected: self.connected(),
            is_player: self.is_player,
            color: self.color,
        }
    }
}

/// Resolves with the id of the session whose grace window expires first;
/// pends forever while no grace timer is armed. Recreated every loop
/// iteration, so cancelling a timer simply drops it from the scan.
async fn next_grace_expiry(sessions: &HashMap<UserId, MemberSession>) -> UserId {
    let mut next: Option<(Instant, UserId)> = None;
    for (user_id, session) in sessions {
        if let Some(deadline) = session.grace.deadline() {
            if next.is_none_or(|(d, _)| deadline < d) {
                next = Some((deadline, *user_id));
            }
        }
    }
    match next {
        Some((deadline, user_id)) => {
            time::sleep_until(deadline).await;
            user_id
        }
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<G: GameFlow> {
    room_id: RoomId,
    host_id: UserId,
    created_at_ms: u64,
    config: RoomConfig,
    rules: GameRules,
    status: GameStatus,
    /// Exclusively owned: nothing outside the actor ever holds a
    /// reference into this map.
    sessions: HashMap<UserId, MemberSession>,
    next_joined_seq: u64,
    inactivity: PausableTimer,
    game: G,
    receiver: mpsc::Receiver<RoomCommand>,
    destroy_tx: mpsc::UnboundedSender<RoomId>,
    destroying: bool,
}

impl<G: GameFlow> RoomActor<G> {
    /// Runs the actor loop until shutdown or self-destruction.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, host = %self.host_id, "room actor started");

        while !self.destroying {
            // Biased so a timer that is already due is served before any
            // queued command: a query arriving after a deadline has
            // passed always observes the expiry's effects.
            tokio::select! {
                biased;
                user_id = next_grace_expiry(&self.sessions) => {
                    self.handle_grace_expiry(user_id).await;
                }
                flagged = self.game.clock_expired(), if self.status == GameStatus::InProgress => {
                    tracing::info!(room_id = %self.room_id, side = %flagged, "clock flagged");
                    let output = self.game.on_clock_expired(flagged);
                    self.apply(output).await;
                }
                () = self.inactivity.expired() => {
                    tracing::info!(room_id = %self.room_id, "inactivity window elapsed");
                    self.destroying = true;
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Connect { user, sender, reply }) => {
                        let result = self.handle_connect(user, sender);
                        let admitted = result.is_ok();
                        let _ = reply.send(result);
                        if admitted {
                            self.try_start().await;
                        }
                    }
                    Some(RoomCommand::Disconnect { user_id, reason, reply }) => {
                        let _ = reply.send(self.handle_disconnect(user_id, &reason));
                    }
                    Some(RoomCommand::Action { user_id, action }) => {
                        self.handle_action(user_id, action).await;
                    }
                    Some(RoomCommand::GetInfo { reply }) => {
                        let _ = reply.send(self.info());
                    }
                    Some(RoomCommand::GetDto { reply }) => {
                        let _ = reply.send(self.dto());
                    }
                    Some(RoomCommand::Shutdown) | None => {
                        tracing::info!(room_id = %self.room_id, "room shutting down");
                        break;
                    }
                },
            }
        }

        // The registry observes this to drop the room from the live set.
        let _ = self.destroy_tx.send(self.room_id);
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    // -- Connection admission ---------------------------------------------

    fn handle_connect(&mut self, user: User, sender: EventSender) -> Result<(), RoomError> {
        if let Some(session) = self.sessions.get(&user.id) {
            if session.connected() {
                return Err(RoomError::AlreadyConnected(user.id));
            }
        }

        let user_id = user.id;
        match self.sessions.get_mut(&user_id) {
            Some(session) => {
                // Reactivation: the session (including any color
                // assignment) survives; a pending grace timer is moot.
                session.sender = Some(sender);
                session.grace.stop();
                let member = session.dto();
                tracing::info!(room_id = %self.room_id, %user_id, "member reconnected");
                self.dispatch(Recipient::AllExcept(user_id), RoomEvent::MemberStateChanged {
                    member,
                });
            }
            None => {
                let session = MemberSession {
                    user,
                    is_player: false,
                    color: None,
                    joined_seq: self.next_joined_seq,
                    sender: Some(sender),
                    grace: PausableTimer::new(),
                };
                self.next_joined_seq += 1;
                let member = session.dto();
                self.sessions.insert(user_id, session);
                tracing::info!(
                    room_id = %self.room_id,
                    %user_id,
                    members = self.sessions.len(),
                    "member joined"
                );
                self.dispatch(Recipient::AllExcept(user_id), RoomEvent::MemberJoined { member });
            }
        }

        // The joiner alone gets the full picture.
        let snapshot = RoomEvent::Snapshot { room: self.dto() };
        self.send_to(user_id, snapshot);

        self.inactivity.stop();
        Ok(())
    }

    fn handle_disconnect(&mut self, user_id: UserId, reason: &str) -> Result<(), RoomError> {
        let Some(session) = self.sessions.get_mut(&user_id) else {
            tracing::warn!(room_id = %self.room_id, %user_id, "disconnect for unknown member");
            return Err(RoomError::UnknownMember(user_id));
        };

        if !session.connected() {
            // A repeated disconnect must not restart a running grace
            // window or re-broadcast the state change.
            tracing::debug!(room_id = %self.room_id, %user_id, "duplicate disconnect ignored");
            return Ok(());
        }

        if session.is_player {
            // Players keep their session (and color); mid-game they get
            // one bounded window to come back.
            session.sender = None;
            if self.status == GameStatus::InProgress {
                session.grace.start(Some(self.config.disconnect_grace));
                tracing::info!(
                    room_id = %self.room_id,
                    %user_id,
                    reason,
                    grace_secs = self.config.disconnect_grace.as_secs(),
                    "player disconnected, grace window started"
                );
            } else {
                tracing::info!(room_id = %self.room_id, %user_id, reason, "player disconnected");
            }
            let member = session.dto();
            self.dispatch(Recipient::All, RoomEvent::MemberStateChanged { member });
        } else {
            self.sessions.remove(&user_id);
            tracing::info!(room_id = %self.room_id, %user_id, reason, "member left");
            self.dispatch(Recipient::All, RoomEvent::MemberLeft { user_id });
        }

        self.check_inactivity();
        Ok(())
    }

    // -- Game start -------------------------------------------------------

    /// Re-evaluates start readiness after a successful connection.
    async fn try_start(&mut self) {
        if self.status != GameStatus::NotStarted {
            return;
        }
        let Some(promotion) = self.game.set_up_before_start(&self.roster()) else {
            return;
        };

        let Some(session) = self.sessions.get_mut(&promotion.user_id) else {
            // The strategy may only promote roster members.
            debug_assert!(false, "promotion of unknown member");
            tracing::error!(
                room_id = %self.room_id,
                user_id = %promotion.user_id,
                "strategy promoted a user with no session — ignoring"
            );
            return;
        };
        session.is_player = true;
        session.color = Some(promotion.color);
        let member = session.dto();
        tracing::info!(
            room_id = %self.room_id,
            user_id = %promotion.user_id,
            color = %promotion.color,
            "member promoted to player"
        );
        self.dispatch(Recipient::All, RoomEvent::MemberStateChanged { member });

        self.advance_status(GameStatus::InProgress);
        let output = self.game.start_game(&self.roster());
        self.apply(output).await;
    }

    // -- Actions ----------------------------------------------------------

    async fn handle_action(&mut self, user_id: UserId, action: ClientAction) {
        match self.sessions.get(&user_id) {
            Some(session) if session.connected() => {}
            Some(_) => {
                tracing::warn!(
                    room_id = %self.room_id,
                    %user_id,
                    "action from disconnected member, ignoring"
                );
                return;
            }
            None => {
                tracing::warn!(room_id = %self.room_id, %user_id, "action from non-member, ignoring");
                return;
            }
        }
        if self.status != GameStatus::InProgress {
            self.reject(user_id, &crate::GameError::NotInProgress);
            return;
        }

        let result = match action {
            ClientAction::Move { mov } => self.game.handle_move(user_id, &mov),
            ClientAction::Resign => self.game.handle_resign(user_id),
        };

        match result {
            Ok(output) => self.apply(output).await,
            Err(err) => self.reject(user_id, &err),
        }
    }

    /// Reports a rejected action to the acting connection only.
    fn reject(&self, user_id: UserId, err: &crate::GameError) {
        tracing::debug!(room_id = %self.room_id, %user_id, %err, "action rejected");
        self.send_to(user_id, RoomEvent::Error {
            message: err.to_string(),
        });
    }

    // -- Timer expiries ---------------------------------------------------

    async fn handle_grace_expiry(&mut self, user_id: UserId) {
        if let Some(session) = self.sessions.get_mut(&user_id) {
            session.grace.stop();
        }
        tracing::info!(room_id = %self.room_id, %user_id, "grace window expired, player forfeits");
        let output = self.game.on_player_quit(user_id);
        self.apply(output).await;
    }

    // -- Step application and completion ----------------------------------

    async fn apply(&mut self, output: StepOutput) {
        for (recipient, event) in output.events {
            self.dispatch(recipient, event);
        }
        if let Some(outcome) = output.outcome {
            self.finish(outcome).await;
        }
    }

    /// Commits game completion: forward status transition, cancellation
    /// of every timer the result makes moot, persistence, and a fresh
    /// inactivity evaluation. The finished state is committed before the
    /// (asynchronous) persistence call is issued.
    async fn finish(&mut self, outcome: GameOutcome) {
        if !self.game.is_finished() {
            debug_assert!(false, "outcome from a strategy that is not finished");
            tracing::error!(room_id = %self.room_id, "strategy reported an outcome but is not finished");
        }
        self.advance_status(GameStatus::Finished);

        // Only one grace expiry can end a two-player game; the rest are
        // cancelled here, as are any still pending after other endings.
        for session in self.sessions.values_mut() {
            session.grace.stop();
        }

        tracing::info!(
            room_id = %self.room_id,
            resolution = ?outcome.resolution,
            winner = ?outcome.winner,
            "game finished"
        );

        if let Err(err) = self.game.save_finished(self.room_id).await {
            tracing::warn!(room_id = %self.room_id, %err, "failed to persist finished game");
        }

        self.check_inactivity();
    }

    fn advance_status(&mut self, target: GameStatus) {
        if !self.status.can_transition_to(target) {
            debug_assert!(false, "illegal status transition");
            tracing::error!(
                room_id = %self.room_id,
                from = %self.status,
                to = %target,
                "illegal status transition — ignoring"
            );
            return;
        }
        self.status = target;
        tracing::info!(room_id = %self.room_id, status = %target, "status advanced");
    }

    // -- Inactivity -------------------------------------------------------

    fn connected_count(&self) -> usize {
        self.sessions.values().filter(|s| s.connected()).count()
    }

    /// With zero connected members: a not-yet-started room gets a
    /// bounded countdown; a finished empty room is useless and dies now.
    fn check_inactivity(&mut self) {
        if self.connected_count() > 0 {
            return;
        }
        match self.status {
            GameStatus::NotStarted => {
                self.inactivity.start(Some(self.config.inactivity_timeout));
                tracing::debug!(
                    room_id = %self.room_id,
                    timeout_secs = self.config.inactivity_timeout.as_secs(),
                    "room empty, inactivity countdown started"
                );
            }
            GameStatus::Finished => {
                tracing::info!(room_id = %self.room_id, "finished room is empty, destroying");
                self.destroying = true;
            }
            GameStatus::InProgress => {
                // Grace timers decide what happens next.
            }
        }
    }

    // -- Fan-out ----------------------------------------------------------

    /// Fans an event to every session with a live connection, honoring
    /// the recipient filter. Silently skips disconnected sessions.
    fn dispatch(&self, recipient: Recipient, event: RoomEvent) {
        match recipient {
            Recipient::All => {
                for user_id in self.sessions.keys() {
                    self.send_to(*user_id, event.clone());
                }
            }
            Recipient::Member(user_id) => {
                self.send_to(user_id, event);
            }
            Recipient::AllExcept(excluded) => {
                for user_id in self.sessions.keys() {
                    if *user_id != excluded {
                        self.send_to(*user_id, event.clone());
                    }
                }
            }
        }
    }

    /// Sends one event to one member. Drops silently if the member has
    /// no live connection (state, not messages, is authoritative).
    fn send_to(&self, user_id: UserId, event: RoomEvent) {
        if let Some(session) = self.sessions.get(&user_id) {
            if let Some(sender) = &session.sender {
                let _ = sender.send(event);
            }
        }
    }

    // -- Snapshots --------------------------------------------------------

    fn roster(&self) -> Roster {
        let entries = self
            .sessions
            .values()
            .map(|s| RosterEntry {
                user_id: s.user.id,
                connected: s.connected(),
                is_player: s.is_player,
                color: s.color,
                joined_seq: s.joined_seq,
            })
            .collect();
        Roster::new(self.host_id, entries)
    }

    fn dto(&self) -> RoomDto {
        let mut members: Vec<&MemberSession> = self.sessions.values().collect();
        members.sort_by_key(|s| s.joined_seq);
        RoomDto {
            id: self.room_id,
            host: self.host_id,
            created_at_ms: self.created_at_ms,
            rules: self.rules.clone(),
            members: members.into_iter().map(MemberSession::dto).collect(),
            game: self.game.game_state(self.status),
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            status: self.status,
            member_count: self.sessions.len(),
            connected_count: self.connected_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawns a new room actor task and returns a handle to it.
///
/// The host immediately becomes a player with their preferred color (or
/// a random one), but is not connected until their connection arrives
/// through [`RoomHandle::connect`]. The room starts its inactivity
/// countdown right away; `destroy_tx` receives the room id when the
/// actor decides the room is no longer needed.
pub(crate) fn spawn_room<G: GameFlow>(
    room_id: RoomId,
    host: User,
    config: RoomConfig,
    rules: GameRules,
    game: G,
    destroy_tx: mpsc::UnboundedSender<RoomId>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let host_id = host.id;
    let host_color = rules.host_color.unwrap_or_else(|| {
        if rand::rng().random() {
            Color::White
        } else {
            Color::Black
        }
    });

    let mut sessions = HashMap::new();
    sessions.insert(host_id, MemberSession {
        user: host,
        is_player: true,
        color: Some(host_color),
        joined_seq: 0,
        sender: None,
        grace: PausableTimer::new(),
    });

    let created_at_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);

    let mut inactivity = PausableTimer::new();
    inactivity.start(Some(config.inactivity_timeout));

    let actor = RoomActor {
        room_id,
        host_id,
        created_at_ms,
        config,
        rules,
        status: GameStatus::NotStarted,
        sessions,
        next_joined_seq: 1,
        inactivity,
        game,
        receiver: rx,
        destroy_tx,
        destroying: false,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
