//! Script runtime seam
//!
//! The dispatcher talks to a scripting runtime only through
//! [`ScriptInterface`]: reserve a call environment, tag it, build a call
//! frame of typed arguments, and invoke a previously loaded function by id.

use crate::env::{ScriptEnvGuard, ScriptEnvironments};
use crate::error::Result;
use otsrv_game::Player;
use otsrv_protocol::NetworkMessage;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Identifier of a loaded script entry function; 0 means unbound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub u32);

impl ScriptId {
    pub const UNBOUND: ScriptId = ScriptId(0);

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_INTERFACE_SERIAL: AtomicU32 = AtomicU32::new(1);

/// Identity of one runtime state
///
/// Module records hold this instead of a reference to the runtime. The
/// generation changes whenever the runtime state is rebuilt, so a record
/// bound before the rebuild no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    serial: u32,
    generation: u32,
}

impl InterfaceId {
    /// Allocate an identity for a new runtime
    pub fn allocate() -> Self {
        Self {
            serial: NEXT_INTERFACE_SERIAL.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }

    /// Identity of the same runtime after its state was rebuilt
    pub fn next_generation(self) -> Self {
        Self {
            serial: self.serial,
            generation: self.generation.wrapping_add(1),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One argument of a script call
pub enum ScriptArg<'a> {
    /// Strong userdata: the script shares ownership of the player
    Player(Arc<Player>),

    /// Weak userdata: valid only for the duration of the call
    NetworkMessage(&'a mut NetworkMessage),

    Number(i64),
}

/// Arguments pushed for a call to one script function
pub struct ScriptCall<'a> {
    script_id: ScriptId,
    args: Vec<ScriptArg<'a>>,
}

impl<'a> ScriptCall<'a> {
    pub fn new(script_id: ScriptId) -> Self {
        Self {
            script_id,
            args: Vec::with_capacity(3),
        }
    }

    pub fn push_player(&mut self, player: Arc<Player>) -> &mut Self {
        self.args.push(ScriptArg::Player(player));
        self
    }

    pub fn push_message(&mut self, msg: &'a mut NetworkMessage) -> &mut Self {
        self.args.push(ScriptArg::NetworkMessage(msg));
        self
    }

    pub fn push_number(&mut self, value: i64) -> &mut Self {
        self.args.push(ScriptArg::Number(value));
        self
    }

    pub fn script_id(&self) -> ScriptId {
        self.script_id
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[ScriptArg<'a>] {
        &self.args
    }

    pub fn into_args(self) -> Vec<ScriptArg<'a>> {
        self.args
    }
}

/// Capabilities a scripting runtime provides to the dispatcher
pub trait ScriptInterface {
    /// Human-readable name used in log lines
    fn interface_name(&self) -> &str;

    /// Identity of the current runtime state
    fn id(&self) -> InterfaceId;

    fn environments(&self) -> &ScriptEnvironments;

    /// Reserve a call environment; `None` when nesting is exhausted
    fn reserve_script_env(&self) -> Option<ScriptEnvGuard<'_>> {
        self.environments().reserve()
    }

    /// Load a script body and return the id of its `event_name` function
    fn load_script(&mut self, name: &str, source: &str, event_name: &str) -> Result<ScriptId>;

    /// Drop every loaded script and start from a fresh state
    fn reinit_state(&mut self);

    /// Invoke a loaded function, discarding results
    ///
    /// Errors raised by the script are logged here and never returned. The
    /// environment is released when the call completes.
    fn call_void_function(&self, env: ScriptEnvGuard<'_>, call: ScriptCall<'_>);
}
