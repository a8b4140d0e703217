//! Lua implementation of [`ScriptInterface`]
//!
//! Each script file runs in its own environment table whose `__index` falls
//! back to the globals, so every file may define its own `onRecvbyte`. The
//! entry function is pinned in the Lua registry and addressed by script id.

mod userdata;

pub use userdata::{LuaMessage, LuaPlayer};

use crate::env::{ScriptEnvGuard, ScriptEnvironments};
use crate::error::{Result, ScriptError};
use crate::interface::{InterfaceId, ScriptArg, ScriptCall, ScriptId, ScriptInterface};
use mlua::{Function, Lua, MultiValue, RegistryKey, Value};

struct LoadedScript {
    name: String,
    function: RegistryKey,
}

/// Lua 5.4 script runtime
pub struct LuaScriptInterface {
    name: String,
    id: InterfaceId,
    lua: Lua,
    scripts: Vec<LoadedScript>,
    environments: ScriptEnvironments,
}

impl LuaScriptInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_max_nested_calls(name, ScriptEnvironments::DEFAULT_CAPACITY)
    }

    /// Create a runtime allowing at most `max_nested_calls` concurrent calls
    pub fn with_max_nested_calls(name: impl Into<String>, max_nested_calls: usize) -> Self {
        let name = name.into();
        tracing::debug!("Creating Lua interface '{}' (max nested calls {})", name, max_nested_calls);

        Self {
            name,
            id: InterfaceId::allocate(),
            lua: Lua::new(),
            scripts: Vec::new(),
            environments: ScriptEnvironments::new(max_nested_calls),
        }
    }

    /// Underlying Lua state, for registering host functions
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Name a script was loaded under
    pub fn script_name(&self, script_id: ScriptId) -> Option<&str> {
        self.script(script_id).ok().map(|s| s.name.as_str())
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    fn script(&self, script_id: ScriptId) -> Result<&LoadedScript> {
        script_id
            .0
            .checked_sub(1)
            .and_then(|index| self.scripts.get(index as usize))
            .ok_or(ScriptError::UnknownScript(script_id))
    }
}

impl ScriptInterface for LuaScriptInterface {
    fn interface_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> InterfaceId {
        self.id
    }

    fn environments(&self) -> &ScriptEnvironments {
        &self.environments
    }

    fn load_script(&mut self, name: &str, source: &str, event_name: &str) -> Result<ScriptId> {
        let lua = &self.lua;

        let env = lua.create_table()?;
        let meta = lua.create_table()?;
        meta.set("__index", lua.globals())?;
        env.set_metatable(Some(meta));

        lua.load(source)
            .set_name(name)
            .set_environment(env.clone())
            .exec()
            .map_err(|err| ScriptError::LoadError {
                name: name.to_string(),
                message: err.to_string(),
            })?;

        let function = match env.raw_get::<_, Value>(event_name)? {
            Value::Function(function) => function,
            _ => {
                return Err(ScriptError::EventNotFound {
                    name: name.to_string(),
                    event: event_name.to_string(),
                })
            }
        };

        let key = lua.create_registry_value(function)?;
        self.scripts.push(LoadedScript {
            name: name.to_string(),
            function: key,
        });

        let script_id = ScriptId(self.scripts.len() as u32);
        tracing::debug!("[{}] Loaded {} as script {}", self.name, name, script_id);
        Ok(script_id)
    }

    fn reinit_state(&mut self) {
        self.scripts.clear();
        self.lua = Lua::new();
        self.id = self.id.next_generation();
        tracing::debug!("[{}] Lua state reinitialized (generation {})", self.name, self.id.generation());
    }

    fn call_void_function(&self, env: ScriptEnvGuard<'_>, call: ScriptCall<'_>) {
        let script = match self.script(call.script_id()) {
            Ok(script) => script,
            Err(err) => {
                tracing::error!("[{}] {}", self.name, err);
                return;
            }
        };

        let lua = &self.lua;
        let result = lua.scope(|scope| {
            let function: Function = lua.registry_value(&script.function)?;

            let mut args = Vec::with_capacity(call.arity());
            for arg in call.into_args() {
                let value = match arg {
                    ScriptArg::Player(player) => Value::UserData(lua.create_userdata(LuaPlayer(player))?),
                    ScriptArg::NetworkMessage(msg) => {
                        Value::UserData(scope.create_nonstatic_userdata(LuaMessage(msg))?)
                    }
                    ScriptArg::Number(value) => Value::Integer(value),
                };
                args.push(value);
            }

            function.call::<_, ()>(MultiValue::from_vec(args))
        });

        if let Err(err) = result {
            let environment = env.environment();
            tracing::error!(
                "[{}] Error in {} (script id {}): {}",
                self.name,
                script.name,
                environment.script_id,
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otsrv_core::PlayerID;
    use otsrv_game::Player;
    use otsrv_protocol::NetworkMessage;
    use std::sync::Arc;

    const ECHO: &str = r#"
        function onRecvbyte(player, msg, recvbyte)
            last = { name = player:getName(), byte = msg:getByte(), recvbyte = recvbyte }
        end
    "#;

    fn call_with(interface: &LuaScriptInterface, script_id: ScriptId, msg: &mut NetworkMessage) {
        let player = Arc::new(Player::new(PlayerID::new(7), "Bob"));
        let env = interface.reserve_script_env().unwrap();
        env.set_script_id(script_id, interface.id());

        let mut call = ScriptCall::new(script_id);
        call.push_player(player).push_message(msg).push_number(42);
        interface.call_void_function(env, call);
    }

    #[test]
    fn test_load_assigns_sequential_ids() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let first = interface.load_script("a.lua", ECHO, "onRecvbyte").unwrap();
        let second = interface.load_script("b.lua", ECHO, "onRecvbyte").unwrap();

        assert_eq!(first, ScriptId(1));
        assert_eq!(second, ScriptId(2));
        assert_eq!(interface.script_name(second), Some("b.lua"));
        assert_eq!(interface.script_name(ScriptId::UNBOUND), None);
    }

    #[test]
    fn test_missing_event_function() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let err = interface.load_script("a.lua", "x = 1", "onRecvbyte").unwrap_err();
        assert!(matches!(err, ScriptError::EventNotFound { .. }));
        assert_eq!(interface.script_count(), 0);
    }

    #[test]
    fn test_syntax_error() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let err = interface.load_script("a.lua", "function (", "onRecvbyte").unwrap_err();
        assert!(matches!(err, ScriptError::LoadError { .. }));
    }

    #[test]
    fn test_scripts_do_not_clobber_each_other() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let a = interface
            .load_script("a.lua", "function onRecvbyte() result = 'a' end", "onRecvbyte")
            .unwrap();
        let b = interface
            .load_script("b.lua", "function onRecvbyte() result = 'b' end", "onRecvbyte")
            .unwrap();
        assert_ne!(a, b);

        // Globals stay reachable through the environment fallback
        interface.lua().globals().set("shared", 5).unwrap();
        let c = interface
            .load_script("c.lua", "function onRecvbyte() end\nassert(shared == 5)", "onRecvbyte")
            .unwrap();
        assert_eq!(c, ScriptId(3));
    }

    #[test]
    fn test_call_passes_typed_arguments() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        interface.lua().globals().set("seen", interface.lua().create_table().unwrap()).unwrap();
        let script_id = interface
            .load_script(
                "types.lua",
                r#"
                function onRecvbyte(player, msg, recvbyte)
                    seen.player = tostring(player)
                    seen.msg = tostring(msg)
                    seen.recvbyte = recvbyte
                    seen.byte = msg:getByte()
                end
                "#,
                "onRecvbyte",
            )
            .unwrap();

        let mut msg = NetworkMessage::from_bytes(&[0x2A]);
        call_with(&interface, script_id, &mut msg);

        let seen: mlua::Table = interface.lua().globals().get("seen").unwrap();
        assert_eq!(seen.get::<_, String>("player").unwrap(), "Player: Bob");
        assert_eq!(seen.get::<_, String>("msg").unwrap(), "NetworkMessage: 1 bytes");
        assert_eq!(seen.get::<_, i64>("recvbyte").unwrap(), 42);
        assert_eq!(seen.get::<_, u8>("byte").unwrap(), 0x2A);
        assert_eq!(msg.position(), 1);
        assert_eq!(interface.environments().depth(), 0);
    }

    #[test]
    fn test_script_error_is_contained() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let script_id = interface
            .load_script("boom.lua", "function onRecvbyte() error('boom') end", "onRecvbyte")
            .unwrap();

        let mut msg = NetworkMessage::new();
        call_with(&interface, script_id, &mut msg);
        assert_eq!(interface.environments().depth(), 0);
    }

    #[test]
    fn test_unknown_script_releases_env() {
        let interface = LuaScriptInterface::new("Test Interface");
        let mut msg = NetworkMessage::new();
        call_with(&interface, ScriptId(9), &mut msg);
        assert_eq!(interface.environments().depth(), 0);
        assert!(matches!(
            interface.script(ScriptId(9)),
            Err(ScriptError::UnknownScript(ScriptId(9)))
        ));
        assert!(matches!(
            interface.script(ScriptId::UNBOUND),
            Err(ScriptError::UnknownScript(_))
        ));
    }

    #[test]
    fn test_reinit_drops_scripts() {
        let mut interface = LuaScriptInterface::new("Test Interface");
        let before = interface.id();
        interface.load_script("a.lua", ECHO, "onRecvbyte").unwrap();
        interface.lua().globals().set("marker", true).unwrap();

        interface.reinit_state();

        assert_eq!(interface.script_count(), 0);
        assert_ne!(interface.id(), before);
        assert_eq!(interface.lua().globals().get::<_, Option<bool>>("marker").unwrap(), None);
        assert_eq!(interface.load_script("a.lua", ECHO, "onRecvbyte").unwrap(), ScriptId(1));
    }
}
