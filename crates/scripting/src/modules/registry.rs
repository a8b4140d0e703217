//! # Module Registry
//!
//! Owns the script runtime and every recvbyte module, and routes inbound
//! client messages to them.
//!
//! # Loading
//!
//! Declarations and script bodies arrive in two passes. A declaration
//! registers an unbound record; a later registration for the same recvbyte
//! and type copies its script binding onto that record instead of replacing
//! it. A record that is already loaded cannot be rebound until `clear`.
//!
//! # Dispatch
//!
//! `dispatch` is the hot path: one map lookup, a throttle check, and a script
//! call. It never fails from the caller's point of view.

use super::bridge;
use super::module::{Module, ModuleType};
use crate::error::{Result, ScriptError};
use crate::interface::ScriptInterface;
use crate::lua::LuaScriptInterface;
use otsrv_config::ConfigNode;
use otsrv_core::{Clock, PlayerID};
use otsrv_game::PlayerRegistry;
use otsrv_protocol::NetworkMessage;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the runtime owned by the registry
pub const INTERFACE_NAME: &str = "Modules Interface";

/// Directory name module scripts live under
pub const SCRIPT_BASE_NAME: &str = "modules";

/// Result of offering a configuration node to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Tag is not `module`; nothing happened
    NotModule,

    /// Record inserted or merged into an existing placeholder
    Registered,

    /// Record was misconfigured or conflicts with a loaded one
    Rejected,
}

/// Recvbyte module registry
///
/// # Thread Safety
/// Not thread-safe. The registry and its runtime live on the game thread.
pub struct Modules<S: ScriptInterface = LuaScriptInterface> {
    /// Runtime shared by every module
    script_interface: S,

    /// Key: recvbyte, Value: module bound to it
    recvbyte_list: HashMap<u8, Module>,

    players: Arc<dyn PlayerRegistry>,
    clock: Arc<dyn Clock>,
}

impl Modules<LuaScriptInterface> {
    /// Create a registry backed by a fresh Lua runtime
    pub fn new(players: Arc<dyn PlayerRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self::with_interface(LuaScriptInterface::new(INTERFACE_NAME), players, clock)
    }

    /// Create a registry whose runtime allows `max_nested_calls` nested script calls
    pub fn with_max_nested_calls(
        players: Arc<dyn PlayerRegistry>,
        clock: Arc<dyn Clock>,
        max_nested_calls: usize,
    ) -> Self {
        Self::with_interface(
            LuaScriptInterface::with_max_nested_calls(INTERFACE_NAME, max_nested_calls),
            players,
            clock,
        )
    }
}

impl<S: ScriptInterface> Modules<S> {
    pub fn with_interface(
        script_interface: S,
        players: Arc<dyn PlayerRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::debug!("Creating Modules registry on '{}'", script_interface.interface_name());

        Self {
            script_interface,
            recvbyte_list: HashMap::new(),
            players,
            clock,
        }
    }

    /// Unbind every module and rebuild the runtime
    ///
    /// Records stay in place with their recvbyte, type and delay so a reload
    /// can bind them again.
    pub fn clear(&mut self) {
        for module in self.recvbyte_list.values_mut() {
            module.clear_binding();
        }

        self.script_interface.reinit_state();
    }

    pub fn script_interface(&self) -> &S {
        &self.script_interface
    }

    pub fn script_interface_mut(&mut self) -> &mut S {
        &mut self.script_interface
    }

    pub fn script_base_name(&self) -> &'static str {
        SCRIPT_BASE_NAME
    }

    /// Allocate an empty record if `node_name` is `module` (any case)
    pub fn create_module(&self, node_name: &str) -> Option<Module> {
        if !node_name.eq_ignore_ascii_case("module") {
            return None;
        }

        Some(Module::new(self.script_interface.id()))
    }

    /// Register the module declared by `node`, without a script body
    pub fn configure_from<N: ConfigNode>(&mut self, node: &N) -> NodeOutcome {
        let Some(mut module) = self.create_module(node.name()) else {
            return NodeOutcome::NotModule;
        };

        if let Err(err) = module.configure_from(node) {
            tracing::error!("{}", err);
        }

        if self.register(module) {
            NodeOutcome::Registered
        } else {
            NodeOutcome::Rejected
        }
    }

    /// Register the module declared by `node` with `source` as its script body
    ///
    /// # Returns
    /// `Ok(true)` if registered or merged, `Ok(false)` on conflict with a loaded module
    pub fn register_script<N: ConfigNode>(
        &mut self,
        node: &N,
        script_name: &str,
        source: &str,
    ) -> Result<bool> {
        let mut module = self
            .create_module(node.name())
            .ok_or_else(|| ScriptError::NotModuleNode(node.name().to_string()))?;
        module.configure_from(node)?;

        let script_id = self
            .script_interface
            .load_script(script_name, source, module.event_name())?;
        module.set_script(script_id)?;

        Ok(self.register(module))
    }

    /// Insert `module`, or merge its binding into an unloaded record of the same type
    ///
    /// # Returns
    /// `false` if the module has no type, is bound to a previous runtime
    /// state, or its recvbyte is taken by a loaded module or one of another type
    pub fn register(&mut self, module: Module) -> bool {
        if module.module_type() == ModuleType::None {
            tracing::error!("Trying to register event without type!");
            return false;
        }

        if module.is_loaded() && !module.is_bound_to(self.script_interface.id()) {
            tracing::error!(
                "Recvbyte {} is bound to a stale script state, not registering",
                module.recvbyte()
            );
            return false;
        }

        match self.recvbyte_list.entry(module.recvbyte()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if existing.is_loaded() || existing.module_type() != module.module_type() {
                    return false;
                }

                existing.copy_bind(&module);
                tracing::debug!("Bound recvbyte {} to script {}", module.recvbyte(), module.script_id());
                true
            }
            Entry::Vacant(entry) => {
                tracing::debug!("Registered recvbyte {} (delay {}ms)", module.recvbyte(), module.delay());
                entry.insert(module);
                true
            }
        }
    }

    /// Find the module for `recvbyte`
    ///
    /// With `require_loaded`, only modules bound to the current runtime state
    /// are returned.
    pub fn lookup(&self, recvbyte: u8, require_loaded: bool) -> Option<&Module> {
        let interface_id = self.script_interface.id();
        self.recvbyte_list
            .get(&recvbyte)
            .filter(|module| !require_loaded || module.is_bound_to(interface_id))
    }

    pub fn len(&self) -> usize {
        self.recvbyte_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recvbyte_list.is_empty()
    }

    /// All records, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.recvbyte_list.values()
    }

    /// Run the module bound to `recvbyte` for the sending player
    ///
    /// Unknown players and recvbytes without a runnable module are ignored.
    /// The player's throttle is armed only when the script call goes ahead.
    pub fn dispatch(&self, player_id: PlayerID, msg: &mut NetworkMessage, recvbyte: u8) {
        let Some(player) = self.players.player_by_id(player_id) else {
            return;
        };

        let now = self.clock.now_millis();
        let interface_id = self.script_interface.id();
        let Some(module) = self.recvbyte_list.get(&recvbyte).filter(|module| {
            module.module_type() == ModuleType::RecvByte
                && module.is_bound_to(interface_id)
                && player.can_run_module(recvbyte, now)
        }) else {
            return;
        };

        let Some(env) = bridge::reserve_env(&self.script_interface, &player) else {
            return;
        };

        player.set_module_delay(recvbyte, now, module.delay());
        bridge::execute_on_recvbyte(&self.script_interface, env, module, player, msg);
    }
}
