//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player ID (32-bit unsigned, assigned by the game world on login)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerID(pub u32);

impl PlayerID {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PlayerID {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
