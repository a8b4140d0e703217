//! # OTSrv Game Layer
//!
//! The slice of the game object model that packet dispatch depends on.
//!
//! ## Modules
//!
//! - `player` - Player state, module throttling and outbound queue
//! - `manager` - Player collection management

pub mod player;
pub mod manager;

// Re-export commonly used types
pub use player::Player;
pub use manager::{PlayerManager, PlayerRegistry};
