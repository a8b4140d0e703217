//! # Player Management
//!
//! This module handles the per-player state the module dispatcher touches:
//! identity, per-recvbyte throttling and the outbound frame queue.

use bytes::Bytes;
use otsrv_core::PlayerID;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Individual player
///
/// # Purpose
/// Shared handle to one connected player. The game world and scripts hold
/// it through `Arc<Player>`.
///
/// # Thread Safety
/// Mutable state is internally synchronized with `Mutex`.
pub struct Player {
    /// Unique player ID
    pub id: PlayerID,

    /// Display name
    name: String,

    /// Earliest time (ms) each recvbyte module may run again
    /// Key: recvbyte, Value: next allowed timestamp
    module_delays: Mutex<HashMap<u8, i64>>,

    /// Frames queued for the client
    outbox: Mutex<Vec<Bytes>>,
}

impl Player {
    /// Create a new player
    ///
    /// # Arguments
    /// * `id` - Unique player identifier
    /// * `name` - Display name
    #[inline]
    pub fn new(id: PlayerID, name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::debug!("Creating player {}: name={}", id.get(), name);

        Self {
            id,
            name,
            module_delays: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Display name, used in logs and exposed to scripts
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the module bound to `recvbyte` may run at `now`
    ///
    /// # Returns
    /// `true` if the module never ran for this player or its delay elapsed
    pub fn can_run_module(&self, recvbyte: u8, now: i64) -> bool {
        match self.module_delays.lock().get(&recvbyte) {
            Some(&next_allowed) => next_allowed <= now,
            None => true,
        }
    }

    /// Arm the throttle for `recvbyte`
    ///
    /// # Arguments
    /// * `recvbyte` - Module opcode
    /// * `now` - Current time in milliseconds
    /// * `delay` - Minimum interval until the next run, in milliseconds
    pub fn set_module_delay(&self, recvbyte: u8, now: i64, delay: i16) {
        let next_allowed = now + i64::from(delay.max(0));
        self.module_delays.lock().insert(recvbyte, next_allowed);
    }

    /// Queue a frame for the client
    pub fn send(&self, frame: Bytes) {
        self.outbox.lock().push(frame);
    }

    /// Drain queued frames
    pub fn take_outbox(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.outbox.lock())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
