//! Persistence collaborator for finished games.
//!
//! The strategy hands over a [`GameRecord`] exactly once, after the
//! room has committed the finished state. Storage failures are the
//! engine's problem to log, never to retry — a lost record does not
//! un-finish a game.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use turnhall_protocol::{Color, Resolution, RoomId, UserId};

/// Everything worth keeping about a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub room_id: RoomId,
    pub white: UserId,
    pub black: UserId,
    /// The oracle's encoded move history.
    pub moves: String,
    pub resolution: Resolution,
    /// The winning side, if the resolution has one.
    pub winner: Option<Color>,
    pub timer_enabled: bool,
    pub initial_time: Duration,
    pub increment: Duration,
}

/// Storage error, opaque to callers.
#[derive(Debug, thiserror::Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Sink for finished-game records.
///
/// `save` is declared as `impl Future + Send` (implementors may still
/// write `async fn`) so it can be awaited from a spawned room task.
pub trait GameStore: Send + Sync + 'static {
    fn save(&self, record: GameRecord) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory store, keyed by room id. Useful for tests and demos;
/// clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<RoomId, GameRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, room_id: RoomId) -> Option<GameRecord> {
        self.records.lock().await.get(&room_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl GameStore for MemoryStore {
    async fn save(&self, record: GameRecord) -> Result<(), StoreError> {
        tracing::debug!(room_id = %record.room_id, "record stored");
        self.records.lock().await.insert(record.room_id, record);
        Ok(())
    }
}

/// Discards every record. For rooms created with persistence disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl GameStore for NullStore {
    async fn save(&self, _record: GameRecord) -> Result<(), StoreError> {
        Ok(())
    }
}
