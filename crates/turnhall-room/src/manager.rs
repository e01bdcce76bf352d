//! Registry of live rooms.
//!
//! The manager owns a `RoomId -> RoomHandle` map and the destroy
//! channel that room actors report into when they shut themselves
//! down. It never touches room state directly — all interaction goes
//! through the handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use turnhall_protocol::{GameRules, RoomId, User};

use crate::{GameFlow, RoomConfig, RoomError, RoomHandle, room::spawn_room};

static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Creates and tracks room actors.
pub struct RoomManager {
    config: RoomConfig,
    rooms: HashMap<RoomId, RoomHandle>,
    destroy_tx: mpsc::UnboundedSender<RoomId>,
    destroyed_rx: mpsc::UnboundedReceiver<RoomId>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        let (destroy_tx, destroyed_rx) = mpsc::unbounded_channel();
        Self {
            config,
            rooms: HashMap::new(),
            destroy_tx,
            destroyed_rx,
        }
    }

    /// Spawns a new room with `host` as its (not yet connected) player
    /// and the given game strategy, and returns its id.
    pub fn create_room<G: GameFlow>(&mut self, host: User, rules: GameRules, game: G) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            host,
            self.config.clone(),
            rules,
            game,
            self.destroy_tx.clone(),
        );
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        room_id
    }

    /// Looks up a live room's handle.
    pub fn room(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Asks a room to shut down and drops it from the registry.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self.room(room_id)?;
        handle.shutdown().await?;
        self.rooms.remove(&room_id);
        tracing::info!(%room_id, rooms = self.rooms.len(), "room destroyed");
        Ok(())
    }

    /// Drains the destroy channel, dropping handles for rooms whose
    /// actors have already stopped. Call periodically or after awaiting
    /// [`Self::next_destroyed`].
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Ok(room_id) = self.destroyed_rx.try_recv() {
            if self.rooms.remove(&room_id).is_some() {
                reaped += 1;
                tracing::info!(%room_id, rooms = self.rooms.len(), "room reaped");
            }
        }
        reaped
    }

    /// Waits for the next self-destructed room and removes it from the
    /// registry, returning its id.
    pub async fn next_destroyed(&mut self) -> RoomId {
        loop {
            // The manager holds its own sender, so recv never returns None.
            let Some(room_id) = self.destroyed_rx.recv().await else {
                unreachable!("destroy channel closed while sender is held");
            };
            if self.rooms.remove(&room_id).is_some() {
                tracing::info!(%room_id, rooms = self.rooms.len(), "room reaped");
                return room_id;
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
