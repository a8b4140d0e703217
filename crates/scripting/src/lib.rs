//! # OTSrv Scripting System
//!
//! This crate runs server-side Lua modules that react to client messages.
//!
//! ## Features
//! - Lua 5.4 runtime with one environment table per script
//! - Recvbyte modules loaded from `modules.xml`
//! - Per-player throttling of module runs
//! - Bounded nesting of script calls
//!
//! ## Script API
//!
//! ### Player
//! - `getId()`, `getName()`
//! - Held strongly: a script may keep a player past the call
//!
//! ### NetworkMessage
//! - `getByte/getU16/getU32/getString`, `addByte/addU16/addU32/addString`
//! - `getLength`, `getPosition`, `skipBytes`, `reset`, `sendToPlayer`
//! - Held weakly: a kept message errors once the call returns

pub mod env;
pub mod error;
pub mod interface;
pub mod lua;
pub mod modules;

pub use env::{ScriptEnvGuard, ScriptEnvironment, ScriptEnvironments};
pub use error::{ModuleError, Result, ScriptError};
pub use interface::{InterfaceId, ScriptArg, ScriptCall, ScriptId, ScriptInterface};
pub use lua::LuaScriptInterface;
pub use modules::{LoadSummary, Module, ModuleLoader, ModuleType, Modules, NodeOutcome};
