//! Room configuration.
//!
//! [`RoomConfig`] holds the server-side timeouts the registry applies
//! identically to every room it creates. The per-room game settings
//! (clock times, host color, persistence flag) live in
//! `turnhall_protocol::GameRules`, fixed at room creation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine-level settings shared by every room instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long an empty, not-yet-started room survives before it is
    /// destroyed. Any successful connection cancels the countdown.
    pub inactivity_timeout: Duration,

    /// How long a player who disconnects mid-game has to reconnect
    /// before forfeiting.
    pub disconnect_grace: Duration,

    /// Capacity of the room actor's command channel (backpressure:
    /// senders wait when it is full).
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(60),
            disconnect_grace: Duration::from_secs(30),
            channel_size: 64,
        }
    }
}
