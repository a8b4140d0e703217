//! Recvbyte modules
//!
//! A module binds a client message opcode to a script `onRecvbyte`
//! function, throttled per player.

mod bridge;
pub mod loader;
pub mod module;
pub mod registry;

pub use loader::{LoadSummary, ModuleLoader, MODULES_FILE, SCRIPTS_DIR};
pub use module::{Module, ModuleType};
pub use registry::{Modules, NodeOutcome, INTERFACE_NAME, SCRIPT_BASE_NAME};
